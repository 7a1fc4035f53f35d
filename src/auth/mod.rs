//! Authentication system
//!
//! Handles credential loading and login validation.

pub mod credentials;
pub mod validator;

pub use credentials::CredentialTable;
pub use validator::{MAX_LOGIN_ATTEMPTS, validate_login};
