//! Storage result types
//!
//! Defines result structures returned by storage operations.

use std::fmt;

/// A regular file as exposed by `LIST`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct FileEntry {
    pub name: String,
    pub size: u64,
}

impl fmt::Display for FileEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.name, self.size)
    }
}
