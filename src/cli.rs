//! Command-line interface
//!
//! The three startup options are required; everything else comes from the
//! optional configuration file or the environment.

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "sahar-file-server",
    about = "Authenticated multi-client file server speaking a line-oriented text protocol"
)]
pub struct Cli {
    /// Directory whose files are listed, served, stored and erased
    #[arg(short = 'd', value_name = "DIRECTORY")]
    pub directory: PathBuf,

    /// Server port number (1-65535)
    #[arg(short = 'p', value_name = "PORT", value_parser = clap::value_parser!(u16).range(1..))]
    pub port: u16,

    /// Password file with one `user:password` record per line
    #[arg(short = 'u', value_name = "PASSWORD_FILE")]
    pub credentials: PathBuf,

    /// Optional TOML file with tuning options
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_three_required_options() {
        let cli = Cli::try_parse_from(["srv", "-d", "/srv/files", "-p", "1508", "-u", "users.txt"])
            .unwrap();
        assert_eq!(cli.directory, PathBuf::from("/srv/files"));
        assert_eq!(cli.port, 1508);
        assert_eq!(cli.credentials, PathBuf::from("users.txt"));
        assert!(cli.config.is_none());
    }

    #[test]
    fn rejects_missing_option() {
        assert!(Cli::try_parse_from(["srv", "-d", "/srv/files", "-p", "1508"]).is_err());
    }

    #[test]
    fn rejects_out_of_range_ports() {
        for port in ["0", "65536", "-1", "http"] {
            let result = Cli::try_parse_from(["srv", "-d", "/tmp", "-p", port, "-u", "users.txt"]);
            assert!(result.is_err(), "port {port} should be rejected");
        }
    }
}
