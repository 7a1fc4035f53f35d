//! Authentication validator
//!
//! Checks a `USER <username> <password>` attempt against the credential table.

use super::credentials::CredentialTable;
use crate::error::AuthError;

/// Rejected `USER` attempts allowed before the session is closed.
pub const MAX_LOGIN_ATTEMPTS: u32 = 3;

/// Validates that `username` exists and `password` matches it exactly.
pub fn validate_login(
    credentials: &CredentialTable,
    username: &str,
    password: &str,
) -> Result<(), AuthError> {
    match credentials.password_for(username) {
        Some(stored) if stored == password => Ok(()),
        Some(_) => Err(AuthError::InvalidPassword(username.to_string())),
        None => Err(AuthError::UserNotFound(username.to_string())),
    }
}
