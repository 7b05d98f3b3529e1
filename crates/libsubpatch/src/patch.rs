use std::{
    fs, io,
    path::{Path, PathBuf},
};

use log::debug;

use crate::{
    config::Config,
    error::{Result, SubpatchError},
};

/// File extension that marks a patch artifact.
const PATCH_EXTENSION: &str = "patch";

/// Mail headers and message of a `git format-patch` artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchHeader {
    /// `From:` header, as `Name <email>`.
    pub author: Option<String>,
    /// `Date:` header.
    pub date: Option<String>,
    /// `Subject:` header without the `[PATCH …]` tag.
    pub subject: Option<String>,
    /// Commit message body between the headers and the `---` separator.
    pub body: String,
}

impl PatchHeader {
    /// Parse the mail headers at the top of `text`.
    ///
    /// Plain diffs without headers yield an empty header.
    pub fn parse(text: &str) -> Self {
        let mut header = Self::default();
        let mut lines = text.lines().peekable();

        let is_mail = lines
            .peek()
            .is_some_and(|line| line.starts_with("From ") || is_header_line(line));
        if !is_mail {
            return header;
        }

        let mut current: Option<(String, String)> = None;
        for line in lines.by_ref() {
            if line.is_empty() {
                break;
            }
            if line.starts_with([' ', '\t']) {
                if let Some((_, value)) = current.as_mut() {
                    value.push(' ');
                    value.push_str(line.trim());
                }
                continue;
            }
            if let Some((name, value)) = current.take() {
                header.set(&name, value);
            }
            if let Some((name, value)) = line.split_once(':') {
                current = Some((name.to_string(), value.trim().to_string()));
            }
        }
        if let Some((name, value)) = current.take() {
            header.set(&name, value);
        }

        let body: Vec<&str> = lines
            .take_while(|line| *line != "---" && !line.starts_with("diff --git "))
            .collect();
        header.body = body.join("\n").trim().to_string();
        header
    }

    /// Record a completed header field.
    fn set(&mut self, name: &str, value: String) {
        match name.to_ascii_lowercase().as_str() {
            "from" => self.author = Some(value),
            "date" => self.date = Some(value),
            "subject" => self.subject = Some(strip_patch_tag(&value).to_string()),
            _ => {}
        }
    }

    /// Split the `From:` header into `(name, email)`.
    pub fn author_identity(&self) -> Option<(&str, &str)> {
        let author = self.author.as_deref()?;
        let (name, rest) = author.split_once('<')?;
        let email = rest.strip_suffix('>')?;
        let name = name.trim().trim_matches('"');
        (!name.is_empty() && !email.is_empty()).then_some((name, email))
    }
}

/// Whether `line` looks like one of the mail headers `format-patch` emits.
fn is_header_line(line: &str) -> bool {
    ["From:", "Date:", "Subject:"]
        .iter()
        .any(|prefix| line.starts_with(prefix))
}

/// Remove a leading `[PATCH …]` tag from a subject.
fn strip_patch_tag(subject: &str) -> &str {
    if subject.starts_with("[PATCH")
        && let Some(end) = subject.find(']')
    {
        return subject[end + 1..].trim_start();
    }
    subject
}

/// One ordered patch artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patch {
    /// 1-based position in the queue.
    pub sequence: usize,
    /// File name inside the patch directory.
    pub name: String,
    /// Absolute path of the artifact.
    pub path: PathBuf,
    /// Raw diff contents, validated on load and fed to `git apply`.
    pub payload: Vec<u8>,
    /// Parsed mail headers, empty for plain diffs.
    pub header: PatchHeader,
}

impl Patch {
    /// Commit title: the mail subject, or a title derived from the file name.
    pub fn title(&self) -> String {
        match &self.header.subject {
            Some(subject) if !subject.is_empty() => subject.clone(),
            _ => title_from_file_name(&self.name),
        }
    }

    /// Full commit message for this patch.
    pub fn commit_message(&self) -> String {
        let title = self.title();
        if self.header.body.is_empty() {
            title
        } else {
            format!("{title}\n\n{}", self.header.body)
        }
    }
}

/// Derive a title from names like `0001-fix-a.patch`.
fn title_from_file_name(name: &str) -> String {
    let stem = name
        .strip_suffix(&format!(".{PATCH_EXTENSION}"))
        .unwrap_or(name);
    let without_number = stem
        .trim_start_matches(|c: char| c.is_ascii_digit())
        .trim_start_matches('-');
    let title = without_number.replace('-', " ");
    if title.trim().is_empty() {
        stem.to_string()
    } else {
        title
    }
}

/// Whether `payload` contains at least one diff header.
fn contains_diff(payload: &str) -> bool {
    payload
        .lines()
        .any(|line| line.starts_with("diff --git ") || line.starts_with("--- "))
}

/// The ordered set of patches applied on top of the baseline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchQueue {
    /// Patches in application order.
    patches: Vec<Patch>,
}

impl PatchQueue {
    /// Enumerate the patch directory named by `config`.
    pub fn load(config: &Config) -> Result<Self> {
        Self::from_dir(&config.patches_path())
    }

    /// Enumerate `dir`, ordering artifacts by file name.
    ///
    /// A missing directory is an error; an empty one is a valid, empty queue.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if matches!(e.kind(), io::ErrorKind::NotFound | io::ErrorKind::NotADirectory) => {
                return Err(SubpatchError::PatchDirMissing {
                    path: dir.to_path_buf(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            let is_patch = path
                .extension()
                .is_some_and(|ext| ext == PATCH_EXTENSION);
            if is_patch && entry.file_type()?.is_file() {
                paths.push(path);
            }
        }
        paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

        let mut patches = Vec::with_capacity(paths.len());
        for (index, path) in paths.into_iter().enumerate() {
            patches.push(read_patch(index + 1, path)?);
        }
        debug!("loaded {} patches from {}", patches.len(), dir.display());

        Ok(Self { patches })
    }

    /// Number of patches in the queue.
    pub fn len(&self) -> usize {
        self.patches.len()
    }

    /// Whether the queue holds no patches.
    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    /// Iterate over patches in application order.
    pub fn iter(&self) -> impl Iterator<Item = &Patch> {
        self.patches.iter()
    }
}

/// Read and validate the artifact at `path`.
fn read_patch(sequence: usize, path: PathBuf) -> Result<Patch> {
    let invalid = |name: String, message: &str| SubpatchError::PatchInvalid {
        sequence,
        name,
        message: message.to_string(),
    };

    let name = match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => name.to_string(),
        None => {
            return Err(invalid(
                path.to_string_lossy().into_owned(),
                "file name is not valid UTF-8",
            ));
        }
    };

    let payload = fs::read(&path)?;
    let text = String::from_utf8_lossy(&payload);
    if !contains_diff(&text) {
        return Err(invalid(name, "no diff found"));
    }
    let header = PatchHeader::parse(&text);

    Ok(Patch {
        sequence,
        name,
        path,
        payload,
        header,
    })
}
