//! File system storage management
//!
//! Handles file operations and filename validation for the served directory.

pub mod filesystem;
pub mod results;
pub mod validation;

pub use filesystem::{FileStore, UploadGuard};
pub use results::FileEntry;
pub use validation::validate_filename;
