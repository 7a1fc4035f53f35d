//! Client management system
//!
//! Per-connection session state, the session driver and the registry of live
//! sessions.

pub mod handler;
pub mod registry;
pub mod state;

pub use handler::handle_client;
pub use registry::{ConnectionRegistry, Registration, SessionHandle};
pub use state::Client;
