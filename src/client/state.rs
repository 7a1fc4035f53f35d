//! Module `state`
//!
//! Defines the `Client` struct holding one connection's authentication state:
//! the logged-in user and the count of rejected login attempts.

use std::net::SocketAddr;

/// Authentication state of a connected client.
///
/// The username is set exactly once, when login succeeds, so a client is
/// authenticated if and only if it has a username.
#[derive(Debug)]
pub struct Client {
    peer_addr: SocketAddr,
    username: Option<String>,
    failed_attempts: u32,
}

impl Client {
    pub fn new(peer_addr: SocketAddr) -> Self {
        Self {
            peer_addr,
            username: None,
            failed_attempts: 0,
        }
    }

    // --------------------
    // Getter methods
    // --------------------

    /// Returns whether the client has successfully logged in.
    pub fn is_logged_in(&self) -> bool {
        self.username.is_some()
    }

    /// Returns the logged-in username, if any.
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Number of rejected `USER` attempts so far.
    pub fn failed_attempts(&self) -> u32 {
        self.failed_attempts
    }

    // --------------------
    // State transitions
    // --------------------

    /// Marks the client authenticated as `username`. Ignored if already logged in.
    pub fn login(&mut self, username: impl Into<String>) {
        if self.username.is_none() {
            self.username = Some(username.into());
        }
    }

    /// Records a rejected login and returns the new count.
    pub fn record_failed_login(&mut self) -> u32 {
        self.failed_attempts += 1;
        self.failed_attempts
    }
}
