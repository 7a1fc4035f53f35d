//! Shared server state
//!
//! The single value every session receives: configuration, credentials, the
//! file store and the connection registry. All of it is read-only after
//! startup except the registry, which locks internally.

use std::sync::Arc;

use crate::auth::CredentialTable;
use crate::client::ConnectionRegistry;
use crate::server::ServerConfig;
use crate::storage::FileStore;

#[derive(Debug)]
pub struct SharedState {
    pub config: ServerConfig,
    pub credentials: CredentialTable,
    pub store: FileStore,
    pub registry: Arc<ConnectionRegistry>,
}

impl SharedState {
    pub fn new(config: ServerConfig, credentials: CredentialTable, store: FileStore) -> Self {
        let registry = Arc::new(ConnectionRegistry::new(config.max_clients));
        Self {
            config,
            credentials,
            store,
            registry,
        }
    }
}
