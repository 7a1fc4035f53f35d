//! Filename validation
//!
//! Every client-supplied name must be a single path component inside the
//! root directory.

use crate::error::StorageError;

/// Accepts `filename` only if it names an entry directly under the root.
pub fn validate_filename(filename: &str) -> Result<&str, StorageError> {
    let traverses = filename == "." || filename == "..";
    let has_separator = filename.contains(['/', '\\', '\0']);

    if filename.is_empty() || traverses || has_separator {
        return Err(StorageError::InvalidFilename(filename.to_string()));
    }

    Ok(filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_names() {
        for name in ["hello.txt", "README", ".hidden", "a..b", "with space"] {
            assert_eq!(validate_filename(name).unwrap(), name);
        }
    }

    #[test]
    fn rejects_traversal_and_separators() {
        for name in ["", ".", "..", "../etc/passwd", "dir/file", "dir\\file", "nul\0"] {
            assert!(
                matches!(validate_filename(name), Err(StorageError::InvalidFilename(_))),
                "{name:?} should be rejected"
            );
        }
    }
}
