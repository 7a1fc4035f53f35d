//! Command handlers module for the file server.
//!
//! One handler per command. Handlers never touch the socket: they return a
//! `CommandResult` carrying the response line and, for `GET` and `PUT`, the
//! opened file the session streams from or into.

use log::{error, info, warn};

use crate::auth::{CredentialTable, MAX_LOGIN_ATTEMPTS, validate_login};
use crate::client::Client;
use crate::error::{ProtocolError, StorageError};
use crate::protocol::commands::Command;
use crate::protocol::responses;
use crate::storage::FileStore;
use crate::transfer::{Download, Upload};

/// Represents the outcome status of executing a command.
#[derive(Debug, PartialEq, Eq)]
pub enum CommandStatus {
    Success,
    Failure(String),
    CloseConnection,
}

/// Open file handed back to the session.
#[derive(Debug)]
pub enum CommandData {
    /// Stream this file, then the `\n.\n` trailer.
    Download(Download),
    /// Switch to payload mode and write into this file.
    Upload(Upload),
}

/// Struct encapsulating the full result of a command execution.
#[derive(Debug)]
pub struct CommandResult {
    pub status: CommandStatus,
    pub message: Option<String>,
    pub data: Option<CommandData>,
}

impl CommandResult {
    fn success(message: impl Into<String>) -> Self {
        Self {
            status: CommandStatus::Success,
            message: Some(message.into()),
            data: None,
        }
    }

    fn failure(reason: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: CommandStatus::Failure(reason.into()),
            message: Some(message.into()),
            data: None,
        }
    }

    fn close(message: impl Into<String>) -> Self {
        Self {
            status: CommandStatus::CloseConnection,
            message: Some(message.into()),
            data: None,
        }
    }

    fn with_data(data: CommandData) -> Self {
        Self {
            status: CommandStatus::Success,
            message: None,
            data: Some(data),
        }
    }
}

/// Dispatches a line received before login. Only `USER` and `QUIT` are
/// accepted; everything else is answered with `401`.
pub fn handle_auth_command(
    client: &mut Client,
    command: Result<Command, ProtocolError>,
    credentials: &CredentialTable,
) -> CommandResult {
    match command {
        Ok(Command::Quit) => handle_cmd_quit(client),
        Ok(Command::User { username, password }) => {
            handle_cmd_user(client, username, &password, credentials)
        }
        Err(ProtocolError::MalformedLogin) => {
            info!("Invalid login format received from {}", client.peer_addr());
            CommandResult::failure("Malformed USER", responses::INVALID_LOGIN_FORMAT)
        }
        _ => {
            info!(
                "Unauthorized access from {}. Please login first.",
                client.peer_addr()
            );
            CommandResult::failure("Not logged in", responses::UNAUTHORIZED)
        }
    }
}

/// Dispatches a line received after login.
pub async fn handle_command(
    client: &Client,
    command: Result<Command, ProtocolError>,
    store: &FileStore,
) -> CommandResult {
    match command {
        Ok(Command::Quit) => handle_cmd_quit(client),
        Ok(Command::Ping) => CommandResult::success(responses::PONG),
        Ok(Command::List) => handle_cmd_list(client, store).await,
        Ok(Command::Get(filename)) => handle_cmd_get(client, &filename, store).await,
        Ok(Command::Put(filename)) => handle_cmd_put(client, &filename, store).await,
        Ok(Command::Del(filename)) => handle_cmd_del(client, &filename, store).await,
        Ok(Command::User { .. }) => {
            CommandResult::failure("Already logged in", responses::INVALID_COMMAND)
        }
        Err(ProtocolError::MissingFilename(verb)) => {
            info!("Invalid {} command received from {}", verb, client.peer_addr());
            CommandResult::failure("Missing filename", responses::usage(verb))
        }
        Err(e) => {
            info!("Invalid command received from {}: {}", client.peer_addr(), e);
            CommandResult::failure(e.to_string(), responses::INVALID_COMMAND)
        }
    }
}

/// Completes a `PUT` once the terminator line has arrived.
pub async fn handle_upload_finished(client: &Client, upload: Upload) -> CommandResult {
    let filename = upload.name().to_string();

    match upload.finish().await {
        Ok(bytes) => {
            info!(
                "Client {} uploaded {} ({} bytes)",
                client.peer_addr(),
                filename,
                bytes
            );
            CommandResult::success(responses::upload_saved(bytes, &filename))
        }
        Err(e) => {
            error!("Failed to save file {}: {}", filename, e);
            CommandResult::failure(e.to_string(), responses::UPLOAD_REJECTED)
        }
    }
}

/// Handles the QUIT command: signals connection close.
fn handle_cmd_quit(client: &Client) -> CommandResult {
    info!("Client {} requested to quit", client.peer_addr());
    CommandResult::close(responses::GOODBYE)
}

/// Handles the USER command: checks the credentials and counts rejections.
///
/// The last permitted rejection closes the connection.
fn handle_cmd_user(
    client: &mut Client,
    username: String,
    password: &str,
    credentials: &CredentialTable,
) -> CommandResult {
    match validate_login(credentials, &username, password) {
        Ok(()) => {
            info!("User {} authenticated from {}", username, client.peer_addr());
            let message = responses::login_granted(&username);
            client.login(username);
            CommandResult::success(message)
        }
        Err(e) => {
            let attempts = client.record_failed_login();
            warn!(
                "Login rejected for {} ({}/{}): {}",
                client.peer_addr(),
                attempts,
                MAX_LOGIN_ATTEMPTS,
                e
            );

            if attempts >= MAX_LOGIN_ATTEMPTS {
                warn!(
                    "Too many failed login attempts from {}. Closing connection.",
                    client.peer_addr()
                );
                return CommandResult::close(format!(
                    "{}{}",
                    responses::LOGIN_REJECTED,
                    responses::TOO_MANY_ATTEMPTS
                ));
            }

            CommandResult::failure(e.to_string(), responses::LOGIN_REJECTED)
        }
    }
}

/// Handles the LIST command: one line per regular file, then the terminator.
async fn handle_cmd_list(client: &Client, store: &FileStore) -> CommandResult {
    match store.list().await {
        Ok(entries) => {
            info!(
                "Client {} listed {} file(s)",
                client.peer_addr(),
                entries.len()
            );
            CommandResult::success(responses::listing(&entries))
        }
        Err(e) => {
            error!("Failed to list {}: {}", store.root().display(), e);
            CommandResult::failure(e.to_string(), responses::INTERNAL_ERROR)
        }
    }
}

/// Handles the GET command: opens the file for the session to stream.
async fn handle_cmd_get(client: &Client, filename: &str, store: &FileStore) -> CommandResult {
    match store.open(filename).await {
        Ok(file) => {
            info!("Client {} requested {}", client.peer_addr(), filename);
            CommandResult::with_data(CommandData::Download(Download::new(filename, file)))
        }
        Err(StorageError::FileNotFound(_)) => {
            info!("File not found: {}", filename);
            CommandResult::failure("File not found", responses::get_not_found(filename))
        }
        Err(StorageError::InvalidFilename(_)) => {
            warn!("Client {} sent invalid filename {:?}", client.peer_addr(), filename);
            CommandResult::failure("Invalid filename", responses::invalid_filename(filename))
        }
        Err(e) => {
            error!("Failed to open file {}: {}", filename, e);
            CommandResult::failure(e.to_string(), responses::INTERNAL_ERROR)
        }
    }
}

/// Handles the PUT command: truncates the target and hands it to the session.
async fn handle_cmd_put(client: &Client, filename: &str, store: &FileStore) -> CommandResult {
    match store.create(filename).await {
        Ok((file, guard)) => {
            info!(
                "Client {} uploading {}",
                client.peer_addr(),
                filename
            );
            CommandResult::with_data(CommandData::Upload(Upload::new(filename, file, guard)))
        }
        Err(e) => {
            error!("Failed to open file for writing {}: {}", filename, e);
            CommandResult::failure(e.to_string(), responses::UPLOAD_REJECTED)
        }
    }
}

/// Handles the DEL command: deletes a specified file on the server.
async fn handle_cmd_del(client: &Client, filename: &str, store: &FileStore) -> CommandResult {
    match store.delete(filename).await {
        Ok(()) => {
            info!("Client {} deleted {}", client.peer_addr(), filename);
            CommandResult::success(responses::deleted(filename))
        }
        Err(StorageError::FileNotFound(_)) => {
            info!("File not found: {}", filename);
            CommandResult::failure("File not found", responses::del_not_found(filename))
        }
        Err(StorageError::InvalidFilename(_)) => {
            warn!("Client {} sent invalid filename {:?}", client.peer_addr(), filename);
            CommandResult::failure("Invalid filename", responses::invalid_filename(filename))
        }
        Err(e) => {
            error!("Failed to delete file {}: {}", filename, e);
            CommandResult::failure(e.to_string(), responses::INTERNAL_ERROR)
        }
    }
}
