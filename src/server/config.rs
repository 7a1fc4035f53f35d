//! Configuration management for the file server
//!
//! Startup configuration is assembled once from, lowest precedence first:
//! built-in defaults, an optional TOML file, `SAHAR_FS_*` environment
//! variables, and the command line. It is immutable afterwards.

use config::{Config, Environment, File};
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use crate::cli::Cli;

/// Registry capacity when nothing overrides it.
pub const DEFAULT_MAX_CLIENTS: usize = 100;
pub const DEFAULT_LISTEN_BACKLOG: u32 = 16;
pub const DEFAULT_READ_BUFFER_SIZE: usize = 1024;
pub const DEFAULT_MAX_LINE_LENGTH: usize = 4096;

/// Config file looked up in the working directory when `--config` is absent.
const DEFAULT_CONFIG_FILE: &str = "sahar-fs";
const ENV_PREFIX: &str = "SAHAR_FS";

/// Resolved server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Directory every file operation is scoped to
    pub root_directory: PathBuf,

    /// TCP port of the listening socket
    pub port: u16,

    /// `user:password` file loaded at startup
    pub credentials_path: PathBuf,

    /// Interface to listen on; all interfaces by default
    pub bind_address: IpAddr,

    /// Maximum concurrent sessions
    pub max_clients: usize,

    /// Pending-connection queue length handed to `listen`
    pub listen_backlog: u32,

    /// Bytes requested from the socket per read
    pub read_buffer_size: usize,

    /// Longest command line accepted before it is discarded
    pub max_line_length: usize,
}

impl ServerConfig {
    /// Builds a configuration with default tuning values.
    pub fn new(
        root_directory: impl Into<PathBuf>,
        port: u16,
        credentials_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            root_directory: root_directory.into(),
            port,
            credentials_path: credentials_path.into(),
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            max_clients: DEFAULT_MAX_CLIENTS,
            listen_backlog: DEFAULT_LISTEN_BACKLOG,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }

    /// Load configuration layered under the command-line values.
    ///
    /// An explicit `--config` file must exist; the default one is optional.
    pub fn load(cli: &Cli) -> Result<Self, config::ConfigError> {
        let file_source = match &cli.config {
            Some(path) => File::from(path.as_path()).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let settings = Config::builder()
            .set_default("bind_address", Ipv4Addr::UNSPECIFIED.to_string())?
            .set_default("max_clients", DEFAULT_MAX_CLIENTS as i64)?
            .set_default("listen_backlog", i64::from(DEFAULT_LISTEN_BACKLOG))?
            .set_default("read_buffer_size", DEFAULT_READ_BUFFER_SIZE as i64)?
            .set_default("max_line_length", DEFAULT_MAX_LINE_LENGTH as i64)?
            .add_source(file_source)
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .set_override("root_directory", path_value(&cli.directory))?
            .set_override("port", i64::from(cli.port))?
            .set_override("credentials_path", path_value(&cli.credentials))?
            .build()?;

        let config: ServerConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validation for all configuration values
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.port == 0 {
            return Err(config::ConfigError::Message(
                "Invalid port number. port should be between 1 and 65535".into(),
            ));
        }

        if self.root_directory.as_os_str().is_empty() {
            return Err(config::ConfigError::Message(
                "root_directory cannot be empty".into(),
            ));
        }

        if self.max_clients == 0 {
            return Err(config::ConfigError::Message(
                "max_clients must be greater than 0".into(),
            ));
        }

        if self.read_buffer_size == 0 {
            return Err(config::ConfigError::Message(
                "read_buffer_size must be greater than 0".into(),
            ));
        }

        if self.max_line_length < 16 {
            return Err(config::ConfigError::Message(
                "max_line_length must be at least 16 bytes".into(),
            ));
        }

        Ok(())
    }

    /// Address the listener binds to
    pub fn listen_socket(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }
}

fn path_value(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    fn cli(extra: &[&str]) -> Cli {
        let mut args = vec!["srv", "-d", "/srv/files", "-p", "1508", "-u", "users.txt"];
        args.extend_from_slice(extra);
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn command_line_values_with_defaults() {
        let config = ServerConfig::load(&cli(&[])).unwrap();

        assert_eq!(config.root_directory, PathBuf::from("/srv/files"));
        assert_eq!(config.port, 1508);
        assert_eq!(config.credentials_path, PathBuf::from("users.txt"));
        assert_eq!(config.max_clients, DEFAULT_MAX_CLIENTS);
        assert_eq!(config.listen_socket().to_string(), "0.0.0.0:1508");
    }

    #[test]
    fn config_file_tunes_but_cannot_override_command_line() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "max_clients = 7").unwrap();
        writeln!(file, "bind_address = \"127.0.0.1\"").unwrap();
        writeln!(file, "port = 9999").unwrap();
        let path = file.path().to_string_lossy().into_owned();

        let config = ServerConfig::load(&cli(&["--config", &path])).unwrap();

        assert_eq!(config.max_clients, 7);
        assert_eq!(config.port, 1508);
        assert_eq!(config.listen_socket().to_string(), "127.0.0.1:1508");
    }

    #[test]
    fn explicit_config_file_must_exist() {
        let result = ServerConfig::load(&cli(&["--config", "/definitely/not/here.toml"]));
        assert!(result.is_err());
    }

    #[test]
    fn validate_rejects_zero_capacity() {
        let mut config = ServerConfig::new("/srv", 1508, "users.txt");
        config.max_clients = 0;
        assert!(config.validate().is_err());
    }
}
