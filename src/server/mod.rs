//! Server core functionality
//!
//! Configuration, listener setup, the accept loop, shared state and shutdown
//! signals.

pub mod config;
pub mod core;
pub mod signal;
pub mod state;

pub use self::config::ServerConfig;
pub use self::core::Server;
pub use self::signal::shutdown_signal;
pub use self::state::SharedState;
