//! Error types
//!
//! Defines domain-specific error types for each module of the file server.

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Protocol module errors: the client sent something the parser rejects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    UnknownCommand(String),
    MissingFilename(&'static str),
    MalformedLogin,
    LineTooLong(usize),
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::UnknownCommand(c) => write!(f, "Unknown command: {}", c),
            ProtocolError::MissingFilename(c) => write!(f, "{} requires exactly one filename", c),
            ProtocolError::MalformedLogin => write!(f, "USER requires a username and a password"),
            ProtocolError::LineTooLong(n) => write!(f, "Command line exceeds {} bytes", n),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Authentication module errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    UserNotFound(String),
    InvalidPassword(String),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::UserNotFound(u) => write!(f, "User not found: {}", u),
            AuthError::InvalidPassword(u) => write!(f, "Invalid password for user: {}", u),
        }
    }
}

impl std::error::Error for AuthError {}

/// Storage module errors
#[derive(Debug)]
pub enum StorageError {
    FileNotFound(String),
    DirectoryNotFound(PathBuf),
    NotADirectory(PathBuf),
    InvalidFilename(String),
    UploadInProgress(String),
    IoError(io::Error),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::FileNotFound(p) => write!(f, "File not found: {}", p),
            StorageError::DirectoryNotFound(p) => {
                write!(f, "Directory not found: {}", p.display())
            }
            StorageError::NotADirectory(p) => write!(f, "Not a directory: {}", p.display()),
            StorageError::InvalidFilename(p) => write!(f, "Invalid filename: {}", p),
            StorageError::UploadInProgress(p) => write!(f, "Upload already in progress: {}", p),
            StorageError::IoError(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for StorageError {
    fn from(error: io::Error) -> Self {
        StorageError::IoError(error)
    }
}

/// Client module errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    RegistryFull { capacity: usize, peer_addr: SocketAddr },
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::RegistryFull {
                capacity,
                peer_addr,
            } => write!(
                f,
                "Maximum number of client connections reached ({}), rejecting {}",
                capacity, peer_addr
            ),
        }
    }
}

impl std::error::Error for ClientError {}

/// Errors that abort server startup. `main` reports them and exits with status 1.
#[derive(Debug)]
pub enum StartupError {
    Config(config::ConfigError),
    Storage(StorageError),
    Credentials { path: PathBuf, source: io::Error },
    Bind { addr: SocketAddr, source: io::Error },
}

impl fmt::Display for StartupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartupError::Config(e) => write!(f, "Invalid configuration: {}", e),
            StartupError::Storage(StorageError::DirectoryNotFound(p)) => write!(
                f,
                "Provided directory does not exist or is invalid: {}",
                p.display()
            ),
            StartupError::Storage(e) => write!(f, "Storage error: {}", e),
            StartupError::Credentials { path, source } => write!(
                f,
                "Failed to open password file {}: {}",
                path.display(),
                source
            ),
            StartupError::Bind { addr, source } => {
                write!(f, "Failed to bind socket to {}: {}", addr, source)
            }
        }
    }
}

impl std::error::Error for StartupError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StartupError::Config(e) => Some(e),
            StartupError::Storage(e) => Some(e),
            StartupError::Credentials { source, .. } => Some(source),
            StartupError::Bind { source, .. } => Some(source),
        }
    }
}

impl From<config::ConfigError> for StartupError {
    fn from(error: config::ConfigError) -> Self {
        StartupError::Config(error)
    }
}

impl From<StorageError> for StartupError {
    fn from(error: StorageError) -> Self {
        StartupError::Storage(error)
    }
}
