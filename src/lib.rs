//! Sahar file server
//!
//! A multi-client file server speaking a line-oriented text protocol over
//! TCP. Clients log in with `USER`, then list, download, upload and delete
//! files in a single root directory.

pub mod auth;
pub mod cli;
pub mod client;
pub mod error;
pub mod protocol;
pub mod server;
pub mod storage;
pub mod transfer;

pub use crate::auth::CredentialTable;
pub use crate::cli::Cli;
pub use crate::error::StartupError;
pub use crate::server::{Server, ServerConfig, shutdown_signal};
