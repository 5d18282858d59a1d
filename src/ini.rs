//! Ordered INI documents for the AWS config and credentials files.
//!
//! Both files are small sectioned key-value documents. [`IniFile`] keeps
//! sections and keys in file order so that rewriting a file after a single
//! mutation produces a minimal diff.
//!
//! Saving is atomic: content is written to a temporary file in the same
//! directory and renamed over the target, so a failed write never leaves a
//! truncated credentials file behind.

use crate::{BrokerError, Result};
use std::fmt;
use std::path::Path;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// A syntax error found while parsing an INI document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {message}")]
pub struct ParseError {
    /// 1-based line number
    pub line: usize,
    /// What was wrong with the line
    pub message: String,
}

impl ParseError {
    fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

/// An ordered mapping of key to string value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Section {
    entries: Vec<(String, String)>,
}

impl Section {
    /// Creates an empty section.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Returns true if `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Sets `key` to `value`, keeping the key's position if it already exists.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Appends every entry of `other` whose key is not already present.
    ///
    /// Existing keys are never overwritten.
    pub fn extend_missing(&mut self, other: &Section) {
        for (key, value) in other.iter() {
            if !self.contains_key(key) {
                self.entries.push((key.to_string(), value.to_string()));
            }
        }
    }

    /// Iterates entries in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Iterates keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the section has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Section {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut section = Section::new();
        for (k, v) in iter {
            section.set(k, v);
        }
        section
    }
}

/// An ordered collection of named sections.
///
/// # Example
///
/// ```
/// use ssobroker::ini::IniFile;
///
/// let text = "[profile work]\nregion = us-west-2\n\n";
/// let file = IniFile::parse(text).unwrap();
///
/// assert_eq!(file.section("profile work").unwrap().get("region"), Some("us-west-2"));
/// assert_eq!(file.to_string(), text);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IniFile {
    sections: Vec<(String, Section)>,
}

impl IniFile {
    /// Creates an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses INI text.
    ///
    /// Keys are lowercased and values trimmed. Full-line `#` and `;` comments
    /// are dropped. Indented lines continue the previous value.
    pub fn parse(text: &str) -> std::result::Result<Self, ParseError> {
        let mut file = IniFile::new();
        // key in the last section that an indented line continues
        let mut last_key: Option<String> = None;

        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim_end();
            let trimmed = line.trim_start();

            if trimmed.is_empty() {
                last_key = None;
                continue;
            }
            if trimmed.starts_with('#') || trimmed.starts_with(';') {
                continue;
            }

            let indented = line.len() != trimmed.len();
            if indented {
                if let (Some(key), Some((_, section))) = (&last_key, file.sections.last_mut()) {
                    let mut value = section.get(key).unwrap_or_default().to_string();
                    value.push('\n');
                    value.push_str(trimmed);
                    section.set(key.clone(), value);
                    continue;
                }
            }

            if trimmed.starts_with('[') && trimmed.ends_with(']') && trimmed.len() >= 2 {
                let name = trimmed[1..trimmed.len() - 1].trim();
                if name.is_empty() {
                    return Err(ParseError::new(line_no, "empty section name"));
                }
                if file.has_section(name) {
                    return Err(ParseError::new(
                        line_no,
                        format!("duplicate section [{}]", name),
                    ));
                }
                file.sections.push((name.to_string(), Section::new()));
                last_key = None;
                continue;
            }

            let Some((_, section)) = file.sections.last_mut() else {
                return Err(ParseError::new(line_no, "key outside of any section"));
            };

            let delim = trimmed
                .find(['=', ':'])
                .ok_or_else(|| ParseError::new(line_no, "expected `key = value`"))?;
            let key = trimmed[..delim].trim().to_lowercase();
            let value = trimmed[delim + 1..].trim();

            if key.is_empty() {
                return Err(ParseError::new(line_no, "empty key"));
            }
            if section.contains_key(&key) {
                return Err(ParseError::new(line_no, format!("duplicate key `{}`", key)));
            }

            section.set(key.clone(), value);
            last_key = Some(key);
        }

        Ok(file)
    }

    /// Returns the named section.
    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, s)| s)
    }

    /// Returns true if the named section exists.
    pub fn has_section(&self, name: &str) -> bool {
        self.section(name).is_some()
    }

    /// Iterates section names in order.
    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.sections.iter().map(|(n, _)| n.as_str())
    }

    /// Replaces the named section wholesale.
    ///
    /// An existing section keeps its position; nothing from its previous
    /// content survives. A new section is appended.
    pub fn replace_section(&mut self, name: impl Into<String>, section: Section) {
        let name = name.into();
        match self.sections.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = section,
            None => self.sections.push((name, section)),
        }
    }

    /// Loads a document from disk.
    ///
    /// A missing file yields an empty document.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::ConfigRead`] for I/O failures and
    /// [`BrokerError::Parse`] for syntax errors.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = match fs::read_to_string(path).await {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::new()),
            Err(e) => {
                return Err(BrokerError::ConfigRead {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };

        Self::parse(&text).map_err(|source| BrokerError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Atomically writes the document to disk.
    ///
    /// The existing file's permissions are carried over; new files are
    /// created with mode 0600 on Unix. A symlinked target is written through:
    /// the link stays in place and the file it points to is replaced. On
    /// failure the original file is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::ConfigWrite`] if any step fails.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let write_err = |source: std::io::Error| BrokerError::ConfigWrite {
            path: path.to_path_buf(),
            source,
        };

        let resolved = fs::canonicalize(path).await.ok();
        let target = resolved.as_deref().unwrap_or(path);

        let dir = match target.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => std::path::PathBuf::from("."),
        };
        fs::create_dir_all(&dir).await.map_err(write_err)?;

        let file_name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "ini".to_string());
        let tmp = dir.join(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4().simple()));

        let result = self.write_temp(&tmp, target).await;
        let result = match result {
            Ok(()) => fs::rename(&tmp, target).await,
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            let _ = fs::remove_file(&tmp).await;
            return Err(write_err(e));
        }

        Ok(())
    }

    async fn write_temp(&self, tmp: &Path, target: &Path) -> std::io::Result<()> {
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(tmp)
            .await?;

        match fs::metadata(target).await {
            Ok(meta) => fs::set_permissions(tmp, meta.permissions()).await?,
            #[cfg(unix)]
            Err(_) => {
                use std::os::unix::fs::PermissionsExt;
                fs::set_permissions(tmp, std::fs::Permissions::from_mode(0o600)).await?;
            }
            #[cfg(not(unix))]
            Err(_) => {}
        }

        file.write_all(self.to_string().as_bytes()).await?;
        file.flush().await?;
        file.sync_all().await?;
        Ok(())
    }
}

impl fmt::Display for IniFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, section) in &self.sections {
            writeln!(f, "[{}]", name)?;
            for (key, value) in section.iter() {
                let mut lines = value.split('\n');
                match lines.next() {
                    Some(first) if !first.is_empty() => write!(f, "{} = {}", key, first)?,
                    _ => write!(f, "{} =", key)?,
                }
                for line in lines {
                    write!(f, "\n\t{}", line)?;
                }
                writeln!(f)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
