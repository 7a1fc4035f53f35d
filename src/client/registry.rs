//! Connection registry
//!
//! Tracks live sessions so the supervisor can bound concurrency and signal
//! every session at shutdown. All mutations go through one mutex that is
//! never held across I/O.

use log::debug;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;

use crate::error::ClientError;

/// What the registry knows about one live session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: u64,
    peer_addr: SocketAddr,
    shutdown: CancellationToken,
}

impl SessionHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Token the session watches; cancelled when the server shuts down.
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    pub fn request_shutdown(&self) {
        self.shutdown.cancel();
    }
}

/// Registry of live sessions with a fixed capacity
#[derive(Debug)]
pub struct ConnectionRegistry {
    sessions: Mutex<HashMap<u64, SessionHandle>>,
    capacity: usize,
    next_id: AtomicU64,
}

impl ConnectionRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            capacity,
            next_id: AtomicU64::new(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<u64, SessionHandle>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a session for `peer_addr`, or refuses it when the registry is
    /// full. The entry is removed when the returned `Registration` is dropped.
    pub fn add(self: &Arc<Self>, peer_addr: SocketAddr) -> Result<Registration, ClientError> {
        let mut sessions = self.lock();
        if sessions.len() >= self.capacity {
            return Err(ClientError::RegistryFull {
                capacity: self.capacity,
                peer_addr,
            });
        }

        let handle = SessionHandle {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            peer_addr,
            shutdown: CancellationToken::new(),
        };
        sessions.insert(handle.id, handle.clone());
        drop(sessions);

        Ok(Registration {
            handle,
            registry: Arc::clone(self),
        })
    }

    pub fn remove(&self, id: u64) -> Option<SessionHandle> {
        self.lock().remove(&id)
    }

    /// Copy of the live set, taken under the lock.
    pub fn snapshot(&self) -> Vec<SessionHandle> {
        self.lock().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Asks every live session to shut down. Returns how many were signalled.
    pub fn shutdown_all(&self) -> usize {
        let sessions = self.snapshot();
        for session in &sessions {
            debug!("Signalling shutdown to {}", session.peer_addr());
            session.request_shutdown();
        }
        sessions.len()
    }
}

/// Membership of one session in the registry. Dropping it unregisters the
/// session.
#[derive(Debug)]
pub struct Registration {
    handle: SessionHandle,
    registry: Arc<ConnectionRegistry>,
}

impl Registration {
    pub fn handle(&self) -> &SessionHandle {
        &self.handle
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.remove(self.handle.id());
    }
}
