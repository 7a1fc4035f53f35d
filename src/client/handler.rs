use log::{debug, info, warn};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::client::Client;
use crate::error::ProtocolError;
use crate::protocol::responses::{GREETING, SHUTDOWN_NOTICE};
use crate::protocol::{
    CommandData, CommandResult, CommandStatus, Framer, Payload, handle_auth_command,
    handle_command, handle_upload_finished, parse_command,
};
use crate::server::SharedState;
use crate::transfer::{Upload, send_file};

/// Upper bound for delivering the shutdown notice to a stalled client.
const SHUTDOWN_WRITE_TIMEOUT: Duration = Duration::from_secs(1);

/// Which framing the next input bytes get.
#[derive(Debug, Default)]
enum Phase {
    #[default]
    Commands,
    Receiving(Upload),
}

enum Flow {
    Continue,
    Close,
    Shutdown,
}

/// Drives one client session until it quits, is locked out, disconnects,
/// hits a socket error, or `shutdown` is cancelled.
///
/// - Sends the greeting, then frames input with a `Framer`.
/// - Dispatches each line to `handle_auth_command` before login and to
///   `handle_command` after it.
/// - While a `PUT` is in progress, payload segments go straight to the file.
///
/// Cancellation is only observed while waiting on the socket, so a file write
/// that has started always completes.
///
/// Never returns an error: every failure ends only this session.
pub async fn handle_client<S>(
    mut stream: S,
    client_addr: SocketAddr,
    state: Arc<SharedState>,
    shutdown: CancellationToken,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if let Err(e) = write_message(&mut stream, GREETING).await {
        warn!("Failed to greet {}: {}", client_addr, e);
        return;
    }

    let mut session = Session::new(client_addr, state);

    loop {
        match session.advance(&mut stream, &shutdown).await {
            Ok(Flow::Continue) => continue,
            Ok(Flow::Close) => break,
            Ok(Flow::Shutdown) => {
                info!("Closing session {} for server shutdown", client_addr);
                match timeout(
                    SHUTDOWN_WRITE_TIMEOUT,
                    write_message(&mut stream, SHUTDOWN_NOTICE),
                )
                .await
                {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => debug!("Shutdown notice to {} failed: {}", client_addr, e),
                    Err(_) => debug!("Shutdown notice to {} timed out", client_addr),
                }
                break;
            }
            Err(e) => {
                warn!("Failed to communicate with {}: {}", client_addr, e);
                break;
            }
        }
    }

    session.close().await;
    let _ = timeout(SHUTDOWN_WRITE_TIMEOUT, stream.shutdown()).await;
    info!("Client {} disconnected", client_addr);
}

async fn write_message<S>(stream: &mut S, message: &str) -> io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    stream.write_all(message.as_bytes()).await?;
    stream.flush().await
}

struct Session {
    client: Client,
    phase: Phase,
    framer: Framer,
    read_buffer: Vec<u8>,
    state: Arc<SharedState>,
}

impl Session {
    fn new(client_addr: SocketAddr, state: Arc<SharedState>) -> Self {
        Self {
            client: Client::new(client_addr),
            phase: Phase::Commands,
            framer: Framer::new(state.config.max_line_length),
            read_buffer: vec![0; state.config.read_buffer_size],
            state,
        }
    }

    /// Handles one buffered frame, or reads more input when none is complete.
    async fn advance<S>(&mut self, stream: &mut S, shutdown: &CancellationToken) -> io::Result<Flow>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        if let Phase::Receiving(upload) = &mut self.phase {
            match self.framer.next_payload() {
                Some(Payload::Data(chunk)) => {
                    upload.write_chunk(&chunk).await;
                    return Ok(Flow::Continue);
                }
                Some(Payload::End) => {
                    let Phase::Receiving(upload) = std::mem::take(&mut self.phase) else {
                        return Ok(Flow::Continue);
                    };
                    let result = handle_upload_finished(&self.client, upload).await;
                    return self.respond(stream, result, shutdown).await;
                }
                None => {}
            }
        } else if let Some(line) = self.framer.next_line() {
            let result = self.dispatch(line).await;
            return self.respond(stream, result, shutdown).await;
        }

        let n = tokio::select! {
            biased;
            _ = shutdown.cancelled() => return Ok(Flow::Shutdown),
            read = stream.read(&mut self.read_buffer) => read?,
        };
        if n == 0 {
            info!("Connection closed by client {}", self.client.peer_addr());
            return Ok(Flow::Close);
        }

        self.framer.extend(&self.read_buffer[..n]);
        Ok(Flow::Continue)
    }

    /// Keeps an interrupted upload: payload already received is written and
    /// the partial file is flushed.
    async fn close(&mut self) {
        let Phase::Receiving(mut upload) = std::mem::take(&mut self.phase) else {
            return;
        };

        loop {
            match self.framer.next_payload() {
                Some(Payload::Data(chunk)) => upload.write_chunk(&chunk).await,
                Some(Payload::End) => {
                    let _ = handle_upload_finished(&self.client, upload).await;
                    return;
                }
                None => break,
            }
        }

        let rest = self.framer.take_remaining();
        if !rest.is_empty() {
            upload.write_chunk(&rest).await;
        }
        upload.abandon().await;
    }

    async fn dispatch(&mut self, line: Result<String, ProtocolError>) -> CommandResult {
        let command = line.and_then(|line| parse_command(&line));
        match &command {
            Ok(command) => debug!("Received from {}: {:?}", self.client.peer_addr(), command),
            Err(e) => debug!("Rejected line from {}: {}", self.client.peer_addr(), e),
        }

        if self.client.is_logged_in() {
            handle_command(&self.client, command, &self.state.store).await
        } else {
            handle_auth_command(&mut self.client, command, &self.state.credentials)
        }
    }

    /// Sends the response unless shutdown arrives first.
    async fn respond<S>(
        &mut self,
        stream: &mut S,
        result: CommandResult,
        shutdown: &CancellationToken,
    ) -> io::Result<Flow>
    where
        S: AsyncWrite + Unpin,
    {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => Ok(Flow::Shutdown),
            flow = self.apply(stream, result) => flow,
        }
    }

    /// Writes the response, starts any transfer, and decides whether the
    /// session continues.
    async fn apply<S>(&mut self, stream: &mut S, result: CommandResult) -> io::Result<Flow>
    where
        S: AsyncWrite + Unpin,
    {
        let CommandResult {
            status,
            message,
            data,
        } = result;

        // The upload is parked in the session before any await.
        let download = match data {
            Some(CommandData::Upload(upload)) => {
                self.framer.begin_payload();
                self.phase = Phase::Receiving(upload);
                None
            }
            Some(CommandData::Download(download)) => Some(download),
            None => None,
        };

        if let Some(message) = message {
            stream.write_all(message.as_bytes()).await?;
        }
        if let Some(download) = download {
            send_file(stream, download).await?;
        }

        stream.flush().await?;

        match status {
            CommandStatus::CloseConnection => Ok(Flow::Close),
            CommandStatus::Failure(reason) => {
                debug!(
                    "Command from {} failed: {}",
                    self.client.peer_addr(),
                    reason
                );
                Ok(Flow::Continue)
            }
            CommandStatus::Success => Ok(Flow::Continue),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::CredentialTable;
    use crate::server::ServerConfig;
    use crate::storage::FileStore;
    use tokio::io::{AsyncBufReadExt, BufReader, DuplexStream};
    use tokio::task::JoinHandle;

    struct Harness {
        _dir: tempfile::TempDir,
        store: FileStore,
        shutdown: CancellationToken,
        reader: BufReader<DuplexStream>,
        task: JoinHandle<()>,
    }

    fn start(max_line_length: usize) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        let mut config = ServerConfig::new(dir.path(), 0, "unused");
        config.max_line_length = max_line_length;
        let credentials: CredentialTable = [("alice", "wonder")].into_iter().collect();
        let state = Arc::new(SharedState::new(config, credentials, store.clone()));

        let (client_side, server_side) = tokio::io::duplex(256 * 1024);
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(handle_client(
            server_side,
            "127.0.0.1:40000".parse().unwrap(),
            state,
            shutdown.clone(),
        ));

        Harness {
            _dir: dir,
            store,
            shutdown,
            reader: BufReader::new(client_side),
            task,
        }
    }

    impl Harness {
        async fn send(&mut self, data: &str) {
            self.reader.get_mut().write_all(data.as_bytes()).await.unwrap();
        }

        async fn line(&mut self) -> String {
            let mut line = String::new();
            timeout(Duration::from_secs(5), self.reader.read_line(&mut line))
                .await
                .expect("timed out waiting for a line")
                .unwrap();
            line
        }

        async fn login(&mut self) {
            assert_eq!(self.line().await, GREETING);
            self.send("USER alice wonder\n").await;
            assert_eq!(self.line().await, "200 User alice granted to access.\n");
        }

        async fn assert_closed(mut self) {
            assert_eq!(self.line().await, "");
            timeout(Duration::from_secs(5), self.task)
                .await
                .expect("session did not finish")
                .unwrap();
        }
    }

    #[tokio::test]
    async fn greeting_then_quit() {
        let mut h = start(4096);
        assert_eq!(h.line().await, GREETING);
        h.send("quit\n").await;
        assert_eq!(h.line().await, "Goodbye!\n");
        h.assert_closed().await;
    }

    #[tokio::test]
    async fn pipelined_put_in_a_single_write() {
        let mut h = start(4096);
        h.login().await;

        h.send("PUT note.txt\nfirst\nsecond\n.\nGET note.txt\n").await;
        assert_eq!(
            h.line().await,
            "200 13 Byte note.txt file retrieved by server and was saved.\n"
        );
        assert_eq!(h.line().await, "first\n");
        assert_eq!(h.line().await, "second\n");
        assert_eq!(h.line().await, "\n");
        assert_eq!(h.line().await, ".\n");
        assert_eq!(h.store.read("note.txt").await.unwrap(), b"first\nsecond\n");
    }

    #[tokio::test]
    async fn payload_that_looks_like_commands_is_stored() {
        let mut h = start(4096);
        h.login().await;

        h.send("PUT script\nQUIT\nLIST\n.\nPING\n").await;
        assert_eq!(
            h.line().await,
            "200 10 Byte script file retrieved by server and was saved.\n"
        );
        assert_eq!(h.line().await, "PONG\n");
        assert_eq!(h.store.read("script").await.unwrap(), b"QUIT\nLIST\n");
    }

    #[tokio::test]
    async fn overlong_line_is_answered_in_state() {
        let mut h = start(32);
        assert_eq!(h.line().await, GREETING);

        h.send(&"A".repeat(100)).await;
        assert!(h.line().await.starts_with("401"));
        h.send("\nUSER alice wonder\n").await;
        assert_eq!(h.line().await, "200 User alice granted to access.\n");

        h.send(&format!("{}\nPING\n", "B".repeat(100))).await;
        assert_eq!(h.line().await, "400 Invalid command.\n");
        assert_eq!(h.line().await, "PONG\n");
    }

    #[tokio::test]
    async fn shutdown_notice_while_idle() {
        let mut h = start(4096);
        h.login().await;

        h.shutdown.cancel();
        assert_eq!(h.line().await, SHUTDOWN_NOTICE);
        h.assert_closed().await;
    }

    #[tokio::test]
    async fn disconnect_mid_upload_keeps_partial_file_and_frees_name() {
        let mut h = start(4096);
        h.login().await;

        h.send("PUT partial\nsome data\n").await;
        let Harness {
            _dir,
            store,
            reader,
            task,
            ..
        } = h;
        drop(reader);
        timeout(Duration::from_secs(5), task).await.unwrap().unwrap();

        assert_eq!(store.read("partial").await.unwrap(), b"some data\n");
        assert!(store.create("partial").await.is_ok());
    }

    #[tokio::test]
    async fn shutdown_mid_upload_keeps_every_received_byte() {
        let mut h = start(4096);
        h.login().await;

        let big = "u".repeat(20_000);
        let mut payload = String::new();
        for _ in 0..3 {
            payload.push_str(&big);
            payload.push('\n');
        }
        // Short enough to sit in the write buffer when shutdown lands.
        payload.push_str("tail\n");

        h.send("PUT interrupted.bin\n").await;
        h.send(&payload).await;
        tokio::time::sleep(Duration::from_millis(200)).await;

        h.shutdown.cancel();
        assert_eq!(h.line().await, SHUTDOWN_NOTICE);
        assert_eq!(h.line().await, "");
        let Harness {
            _dir, store, task, ..
        } = h;
        timeout(Duration::from_secs(5), task).await.unwrap().unwrap();

        assert_eq!(
            store.read("interrupted.bin").await.unwrap(),
            payload.as_bytes()
        );
        assert!(store.create("interrupted.bin").await.is_ok());
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn failed_upload_reads_to_terminator_then_rejects() {
        if !std::path::Path::new("/dev/full").exists() {
            return;
        }
        let mut h = start(4096);
        // Writes through this link fail with ENOSPC.
        std::os::unix::fs::symlink("/dev/full", h.store.root().join("sink")).unwrap();
        h.login().await;

        let line = "y".repeat(20_000);
        h.send(&format!("PUT sink\n{line}\nQUIT\n{line}\n.\nPING\n"))
            .await;
        assert_eq!(h.line().await, "400 File can not save on server side.\n");
        assert_eq!(h.line().await, "PONG\n");
    }

    #[tokio::test]
    async fn lockout_after_three_rejections() {
        let mut h = start(4096);
        assert_eq!(h.line().await, GREETING);

        for _ in 0..2 {
            h.send("USER bob wrong\n").await;
            assert_eq!(
                h.line().await,
                "400 User not found. Please try with another user.\n"
            );
        }
        h.send("USER bob wrong\n").await;
        assert_eq!(
            h.line().await,
            "400 User not found. Please try with another user.\n"
        );
        assert_eq!(
            h.line().await,
            "ERROR: Too many failed login attempts. Closing connection.\n"
        );
        h.assert_closed().await;
    }
}
