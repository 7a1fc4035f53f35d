//! Line protocol implementation
//!
//! Handles command parsing, stream framing, command dispatch and response
//! texts.

pub mod commands;
pub mod framer;
pub mod handlers;
pub mod responses;

pub use commands::{Command, parse_command};
pub use framer::{Framer, Payload};
pub use handlers::{
    CommandData, CommandResult, CommandStatus, handle_auth_command, handle_command,
    handle_upload_finished,
};
