//! Module `commands`
//!
//! Defines the client commands and the parser that turns one protocol line
//! into a `Command`. Keywords are case-insensitive; arguments keep their case.

use crate::error::ProtocolError;

/// A command parsed from one client line.
#[derive(PartialEq, Eq)]
pub enum Command {
    User { username: String, password: String },
    Quit,
    Ping,
    List,
    Get(String),
    Put(String),
    Del(String),
}

impl Command {
    /// Upper-case keyword, for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Command::User { .. } => "USER",
            Command::Quit => "QUIT",
            Command::Ping => "PING",
            Command::List => "LIST",
            Command::Get(_) => "GET",
            Command::Put(_) => "PUT",
            Command::Del(_) => "DEL",
        }
    }
}

// Hand-written so passwords never reach the logs.
impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::User { username, .. } => write!(f, "USER {} ****", username),
            Command::Get(name) | Command::Put(name) | Command::Del(name) => {
                write!(f, "{} {}", self.name(), name)
            }
            _ => f.write_str(self.name()),
        }
    }
}

/// Parses a line (without its terminator) into a `Command`.
///
/// `PING`, `LIST` and `QUIT` ignore extra arguments. `USER` needs exactly a
/// username and a password; `GET`, `PUT` and `DEL` exactly one filename.
pub fn parse_command(line: &str) -> Result<Command, ProtocolError> {
    let mut tokens = line.split_whitespace();
    let keyword = tokens.next().unwrap_or("");

    match keyword.to_ascii_uppercase().as_str() {
        "QUIT" => Ok(Command::Quit),
        "PING" => Ok(Command::Ping),
        "LIST" => Ok(Command::List),
        "USER" => match (tokens.next(), tokens.next(), tokens.next()) {
            (Some(username), Some(password), None) => Ok(Command::User {
                username: username.to_string(),
                password: password.to_string(),
            }),
            _ => Err(ProtocolError::MalformedLogin),
        },
        "GET" => single_filename("GET", tokens).map(Command::Get),
        "PUT" => single_filename("PUT", tokens).map(Command::Put),
        "DEL" => single_filename("DEL", tokens).map(Command::Del),
        _ => Err(ProtocolError::UnknownCommand(keyword.to_string())),
    }
}

fn single_filename<'a>(
    verb: &'static str,
    mut tokens: impl Iterator<Item = &'a str>,
) -> Result<String, ProtocolError> {
    match (tokens.next(), tokens.next()) {
        (Some(filename), None) => Ok(filename.to_string()),
        _ => Err(ProtocolError::MissingFilename(verb)),
    }
}
