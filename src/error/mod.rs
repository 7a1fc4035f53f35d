//! Error handling
//!
//! Defines error types for the file server.

pub mod types;

pub use types::*;
