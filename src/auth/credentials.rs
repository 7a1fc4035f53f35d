//! Credential storage
//!
//! Loads the colon-delimited password file once at startup into an
//! immutable username → password table.

use log::{info, warn};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::StartupError;

/// Immutable username → password mapping. Both fields are case-sensitive and
/// compared literally.
#[derive(Debug, Default, Clone)]
pub struct CredentialTable {
    entries: HashMap<String, String>,
}

impl CredentialTable {
    /// Reads and parses the password file at `path`.
    pub fn load(path: &Path) -> Result<Self, StartupError> {
        let text = fs::read_to_string(path).map_err(|source| StartupError::Credentials {
            path: path.to_path_buf(),
            source,
        })?;

        let table = Self::parse(&text);
        info!(
            "Loaded {} credential(s) from {}",
            table.len(),
            path.display()
        );
        Ok(table)
    }

    /// Parses `user:password` records, one per line.
    ///
    /// Lines without a colon or with an empty username are skipped. The
    /// password is everything after the first colon. On duplicate usernames the
    /// first record wins.
    pub fn parse(text: &str) -> Self {
        let mut entries = HashMap::new();

        for (number, line) in text.lines().enumerate() {
            let Some((username, password)) = line.split_once(':') else {
                continue;
            };
            if username.is_empty() {
                warn!("Skipping credential on line {} with empty username", number + 1);
                continue;
            }
            if entries.contains_key(username) {
                warn!(
                    "Ignoring duplicate credential for user {} on line {}",
                    username,
                    number + 1
                );
                continue;
            }
            entries.insert(username.to_string(), password.to_string());
        }

        Self { entries }
    }

    /// Returns the stored password for `username`.
    pub fn password_for(&self, username: &str) -> Option<&str> {
        self.entries.get(username).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<U: Into<String>, P: Into<String>> FromIterator<(U, P)> for CredentialTable {
    fn from_iter<I: IntoIterator<Item = (U, P)>>(iter: I) -> Self {
        let mut entries = HashMap::new();
        for (username, password) in iter {
            entries.entry(username.into()).or_insert_with(|| password.into());
        }
        Self { entries }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_records_and_skips_lines_without_colon() {
        let table = CredentialTable::parse("alice:wonder\nnot a record\n\nbob:builder\n");

        assert_eq!(table.len(), 2);
        assert_eq!(table.password_for("alice"), Some("wonder"));
        assert_eq!(table.password_for("bob"), Some("builder"));
        assert_eq!(table.password_for("not a record"), None);
    }

    #[test]
    fn password_keeps_everything_after_first_colon() {
        let table = CredentialTable::parse("carol:a:b:c\n");
        assert_eq!(table.password_for("carol"), Some("a:b:c"));
    }

    #[test]
    fn lookup_is_case_sensitive() {
        let table = CredentialTable::parse("Alice:Wonder\n");
        assert_eq!(table.password_for("alice"), None);
        assert_eq!(table.password_for("Alice"), Some("Wonder"));
    }

    #[test]
    fn strips_windows_line_endings_and_empty_usernames() {
        let table = CredentialTable::parse("dave:secret\r\n:orphan\r\n");
        assert_eq!(table.password_for("dave"), Some("secret"));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn first_duplicate_wins() {
        let table = CredentialTable::parse("erin:one\nerin:two\n");
        assert_eq!(table.password_for("erin"), Some("one"));
    }

    #[test]
    fn load_reads_file_and_reports_missing_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "alice:wonder").unwrap();

        let table = CredentialTable::load(file.path()).unwrap();
        assert_eq!(table.password_for("alice"), Some("wonder"));

        let missing = CredentialTable::load(Path::new("/definitely/not/here"));
        assert!(matches!(missing, Err(StartupError::Credentials { .. })));
    }
}
