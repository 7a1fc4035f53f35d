use log::{error, info, warn};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::task::{JoinError, JoinSet};

use crate::auth::CredentialTable;
use crate::client::handle_client;
use crate::server::ServerConfig;
use crate::error::StartupError;
use crate::server::SharedState;
use crate::storage::FileStore;

/// Pause after a failed `accept` so a persistent error does not spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

pub struct Server {
    listener: TcpListener,
    state: Arc<SharedState>,
}

impl Server {
    /// Checks the storage root and binds the listening socket.
    pub async fn bind(
        config: ServerConfig,
        credentials: CredentialTable,
    ) -> Result<Self, StartupError> {
        let store = FileStore::new(config.root_directory.clone())?;

        let addr = config.listen_socket();
        let listener = listen(addr, config.listen_backlog)
            .map_err(|source| StartupError::Bind { addr, source })?;

        info!("Server bound to {}", addr);
        info!("Server root directory: {}", store.root().display());
        info!("Loaded {} user(s)", credentials.len());

        Ok(Self {
            listener,
            state: Arc::new(SharedState::new(config, credentials, store)),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts clients until `shutdown` resolves, then tells every live
    /// session to say goodbye and waits for all of them to finish.
    pub async fn run<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let Server { listener, state } = self;
        let registry = Arc::clone(&state.registry);

        info!(
            "Starting file server on {} (max {} clients)",
            state.config.listen_socket(),
            registry.capacity()
        );

        let mut sessions = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, addr)) => admit(&mut sessions, &state, stream, addr),
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                },
                Some(finished) = sessions.join_next(), if !sessions.is_empty() => {
                    report_session_end(finished);
                }
            }
        }

        drop(listener);

        let signalled = registry.shutdown_all();
        info!("Sent shutdown notice to {} client(s)", signalled);

        while let Some(finished) = sessions.join_next().await {
            report_session_end(finished);
        }

        info!("Server stopped.");
    }
}

fn listen(addr: SocketAddr, backlog: u32) -> io::Result<TcpListener> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    socket.listen(backlog)
}

/// Registers and spawns a session, or drops the connection when the server is
/// at capacity.
fn admit(
    sessions: &mut JoinSet<()>,
    state: &Arc<SharedState>,
    stream: TcpStream,
    addr: SocketAddr,
) {
    let registration = match state.registry.add(addr) {
        Ok(registration) => registration,
        Err(e) => {
            warn!("{}", e);
            return;
        }
    };

    info!(
        "Accepted client {} ({}/{} clients)",
        addr,
        state.registry.len(),
        state.registry.capacity()
    );

    let state = Arc::clone(state);
    let shutdown = registration.handle().shutdown_token().clone();
    sessions.spawn(async move {
        let _registration = registration;
        handle_client(stream, addr, state, shutdown).await;
    });
}

fn report_session_end(finished: Result<(), JoinError>) {
    if let Err(e) = finished {
        if e.is_panic() {
            error!("Client session panicked: {}", e);
        } else {
            warn!("Client session aborted: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn config(root: &std::path::Path) -> ServerConfig {
        let mut config = ServerConfig::new(root, 0, "unused");
        config.bind_address = IpAddr::V4(Ipv4Addr::LOCALHOST);
        config
    }

    #[tokio::test]
    async fn bind_rejects_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");

        let err = Server::bind(config(&missing), CredentialTable::default())
            .await
            .err()
            .unwrap();
        assert!(
            err.to_string()
                .starts_with("Provided directory does not exist or is invalid"),
            "{err}"
        );
    }

    #[tokio::test]
    async fn bind_reports_port_in_use() {
        let dir = tempfile::tempdir().unwrap();
        let first = Server::bind(config(dir.path()), CredentialTable::default())
            .await
            .unwrap();
        let port = first.local_addr().unwrap().port();

        let mut second = config(dir.path());
        second.port = port;
        let err = Server::bind(second, CredentialTable::default())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, StartupError::Bind { .. }), "{err}");
    }

    #[tokio::test]
    async fn run_returns_once_shutdown_resolves() {
        let dir = tempfile::tempdir().unwrap();
        let server = Server::bind(config(dir.path()), CredentialTable::default())
            .await
            .unwrap();

        tokio::time::timeout(Duration::from_secs(5), server.run(async {}))
            .await
            .unwrap();
    }
}
