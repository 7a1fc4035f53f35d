//! Protocol response texts
//!
//! Every line the server sends. Status prefixes (`200`, `400`, `401`, `404`,
//! `500`) are part of a human-readable line, not a separate code.

use crate::storage::FileEntry;

pub const GREETING: &str = "Welcome to Sahar's file server.\n";
pub const GOODBYE: &str = "Goodbye!\n";
pub const PONG: &str = "PONG\n";
pub const SHUTDOWN_NOTICE: &str = "Server is shutting down. Goodbye!\n";

pub const UNAUTHORIZED: &str =
    "401 Unauthorized access. Please login first using USER <username> <password>.\n";
pub const INVALID_LOGIN_FORMAT: &str = "400 Invalid format. Use: USER <username> <password>\n";
pub const LOGIN_REJECTED: &str = "400 User not found. Please try with another user.\n";
pub const TOO_MANY_ATTEMPTS: &str =
    "ERROR: Too many failed login attempts. Closing connection.\n";

pub const INVALID_COMMAND: &str = "400 Invalid command.\n";
pub const UPLOAD_REJECTED: &str = "400 File can not save on server side.\n";
pub const INTERNAL_ERROR: &str = "500 Internal server error.\n";

/// Terminator line closing a multi-line payload.
pub const TERMINATOR: &str = ".\n";

/// Appended after `GET` file contents.
pub const DOWNLOAD_TRAILER: &str = "\n.\n";

pub fn login_granted(username: &str) -> String {
    format!("200 User {} granted to access.\n", username)
}

pub fn usage(verb: &str) -> String {
    format!("400 Invalid command. Use: {} <filename>\n", verb)
}

pub fn invalid_filename(name: &str) -> String {
    format!("400 Invalid filename {}.\n", name)
}

pub fn get_not_found(name: &str) -> String {
    format!("404 File {} not found.\n", name)
}

pub fn del_not_found(name: &str) -> String {
    format!("404 File {} not on the server.\n", name)
}

pub fn deleted(name: &str) -> String {
    format!("200 File {} deleted.\n", name)
}

pub fn upload_saved(bytes: u64, name: &str) -> String {
    format!(
        "200 {} Byte {} file retrieved by server and was saved.\n",
        bytes, name
    )
}

/// One `<name> - <size>` line per entry, then the terminator line.
pub fn listing(entries: &[FileEntry]) -> String {
    let mut response = String::new();
    for entry in entries {
        response.push_str(&entry.to_string());
        response.push('\n');
    }
    response.push_str(TERMINATOR);
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_ends_with_terminator() {
        let entries = vec![
            FileEntry { name: "a.txt".into(), size: 3 },
            FileEntry { name: "b".into(), size: 0 },
        ];
        assert_eq!(listing(&entries), "a.txt - 3\nb - 0\n.\n");
        assert_eq!(listing(&[]), ".\n");
    }

    #[test]
    fn upload_line_reports_byte_count() {
        assert_eq!(
            upload_saved(0, "empty"),
            "200 0 Byte empty file retrieved by server and was saved.\n"
        );
    }
}
