//! File system operations
//!
//! `FileStore` exposes the regular files of a single root directory. Names are
//! validated as single path components before they touch the disk.

use log::{debug, info, warn};
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::fs::{self, File};

use crate::error::StorageError;
use crate::storage::results::FileEntry;
use crate::storage::validation::validate_filename;

type UploadSet = Arc<Mutex<HashSet<String>>>;

/// Handle to the served directory. Cheap to clone; clones share the set of
/// names currently being uploaded.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
    uploads: UploadSet,
}

/// Reservation of a filename for one writer. Released on drop.
#[derive(Debug)]
pub struct UploadGuard {
    name: String,
    uploads: UploadSet,
}

impl Drop for UploadGuard {
    fn drop(&mut self) {
        lock(&self.uploads).remove(&self.name);
    }
}

fn lock(uploads: &UploadSet) -> MutexGuard<'_, HashSet<String>> {
    uploads.lock().unwrap_or_else(PoisonError::into_inner)
}

impl FileStore {
    /// Opens a store rooted at `root`, which must be an existing directory.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();

        match std::fs::metadata(&root) {
            Ok(metadata) if metadata.is_dir() => {}
            Ok(_) => return Err(StorageError::NotADirectory(root)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::DirectoryNotFound(root));
            }
            Err(e) => return Err(StorageError::IoError(e)),
        }

        info!("Serving files from {}", root.display());

        Ok(Self {
            root,
            uploads: Arc::new(Mutex::new(HashSet::new())),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, StorageError> {
        Ok(self.root.join(validate_filename(name)?))
    }

    /// Snapshot of every regular file in the root, sorted by name.
    pub async fn list(&self) -> Result<Vec<FileEntry>, StorageError> {
        let mut entries = fs::read_dir(&self.root).await?;
        let mut files = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            // Follows symlinks so a link to a regular file is listed like one.
            match fs::metadata(entry.path()).await {
                Ok(metadata) if metadata.is_file() => files.push(FileEntry {
                    name: entry.file_name().to_string_lossy().into_owned(),
                    size: metadata.len(),
                }),
                Ok(_) => {}
                Err(e) => debug!("Skipping {}: {}", entry.path().display(), e),
            }
        }

        files.sort();
        Ok(files)
    }

    /// Whether `name` is a regular file in the root.
    pub async fn exists(&self, name: &str) -> Result<bool, StorageError> {
        let path = self.path_for(name)?;
        match fs::metadata(&path).await {
            Ok(metadata) => Ok(metadata.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::IoError(e)),
        }
    }

    /// Opens `name` for reading.
    pub async fn open(&self, name: &str) -> Result<File, StorageError> {
        if !self.exists(name).await? {
            return Err(StorageError::FileNotFound(name.to_string()));
        }
        File::open(self.path_for(name)?)
            .await
            .map_err(|e| not_found_or_io(e, name))
    }

    /// Reads the whole of `name` into memory.
    pub async fn read(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        if !self.exists(name).await? {
            return Err(StorageError::FileNotFound(name.to_string()));
        }
        fs::read(self.path_for(name)?)
            .await
            .map_err(|e| not_found_or_io(e, name))
    }

    /// Replaces the contents of `name` with `contents`.
    pub async fn write(&self, name: &str, contents: &[u8]) -> Result<(), StorageError> {
        let path = self.path_for(name)?;
        let _guard = self.reserve(name)?;
        fs::write(&path, contents).await?;
        Ok(())
    }

    /// Creates or truncates `name` for writing and reserves it for the caller.
    ///
    /// Fails with `UploadInProgress` while another guard for the same name is alive.
    pub async fn create(&self, name: &str) -> Result<(File, UploadGuard), StorageError> {
        let path = self.path_for(name)?;
        let guard = self.reserve(name)?;
        let file = File::create(&path).await?;
        Ok((file, guard))
    }

    /// Removes `name` from the root.
    pub async fn delete(&self, name: &str) -> Result<(), StorageError> {
        if !self.exists(name).await? {
            return Err(StorageError::FileNotFound(name.to_string()));
        }

        fs::remove_file(self.path_for(name)?)
            .await
            .map_err(|e| not_found_or_io(e, name))
    }

    fn reserve(&self, name: &str) -> Result<UploadGuard, StorageError> {
        let mut uploads = lock(&self.uploads);
        if !uploads.insert(name.to_string()) {
            warn!("Refusing concurrent upload of {}", name);
            return Err(StorageError::UploadInProgress(name.to_string()));
        }
        Ok(UploadGuard {
            name: name.to_string(),
            uploads: Arc::clone(&self.uploads),
        })
    }
}

/// A file removed between the existence check and the operation is reported
/// as missing, not as an I/O failure.
fn not_found_or_io(error: std::io::Error, name: &str) -> StorageError {
    if error.kind() == ErrorKind::NotFound {
        StorageError::FileNotFound(name.to_string())
    } else {
        StorageError::IoError(error)
    }
}
