//! Module `framer`
//!
//! Splits the inbound byte stream into protocol lines, and during `PUT` into
//! payload segments ending at a `.` terminator line. Partial reads are
//! buffered until a `\n` arrives.

use bytes::{Bytes, BytesMut};

use crate::error::ProtocolError;

/// Longest payload segment held back while waiting for a `\n`.
pub const PAYLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// One unit of `PUT` input.
#[derive(Debug, PartialEq, Eq)]
pub enum Payload {
    /// Bytes to append to the file, including any `\n`.
    Data(Bytes),
    /// The terminator line was received.
    End,
}

#[derive(Debug)]
pub struct Framer {
    buffer: BytesMut,
    max_line_length: usize,
    // Dropping the remainder of an over-long command line.
    discarding: bool,
    // A payload segment without `\n` was emitted, so the next bytes continue a line.
    mid_line: bool,
}

impl Framer {
    pub fn new(max_line_length: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(max_line_length.min(PAYLOAD_CHUNK_SIZE)),
            max_line_length,
            discarding: false,
            mid_line: false,
        }
    }

    /// Appends freshly read bytes.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Next complete command line with its `\n` (and a trailing `\r`) removed.
    ///
    /// Returns `Some(Err(LineTooLong))` once for a line that exceeds the limit;
    /// the rest of that line is dropped silently.
    pub fn next_line(&mut self) -> Option<Result<String, ProtocolError>> {
        loop {
            let Some(pos) = find_newline(&self.buffer) else {
                if self.buffer.len() > self.max_line_length {
                    self.buffer.clear();
                    if !self.discarding {
                        self.discarding = true;
                        return Some(Err(ProtocolError::LineTooLong(self.max_line_length)));
                    }
                }
                return None;
            };

            let line = self.buffer.split_to(pos + 1);
            if self.discarding {
                self.discarding = false;
                continue;
            }
            if pos > self.max_line_length {
                return Some(Err(ProtocolError::LineTooLong(self.max_line_length)));
            }
            return Some(Ok(decode_line(&line)));
        }
    }

    /// Resets payload tracking before the first `PUT` segment.
    pub fn begin_payload(&mut self) {
        self.mid_line = false;
    }

    /// Next `PUT` payload segment.
    ///
    /// Complete lines are returned whole. A line longer than
    /// `PAYLOAD_CHUNK_SIZE` is returned in pieces, and a piece boundary never
    /// turns the following bytes into a terminator line.
    pub fn next_payload(&mut self) -> Option<Payload> {
        if let Some(pos) = find_newline(&self.buffer) {
            let line = self.buffer.split_to(pos + 1).freeze();
            let at_line_start = !self.mid_line;
            self.mid_line = false;

            if at_line_start && is_terminator(&line) {
                return Some(Payload::End);
            }
            return Some(Payload::Data(line));
        }

        if self.buffer.len() >= PAYLOAD_CHUNK_SIZE {
            self.mid_line = true;
            return Some(Payload::Data(self.buffer.split().freeze()));
        }

        None
    }

    /// Everything still buffered, framed or not.
    pub fn take_remaining(&mut self) -> Bytes {
        self.mid_line = false;
        self.buffer.split().freeze()
    }
}

fn find_newline(buffer: &[u8]) -> Option<usize> {
    buffer.iter().position(|&b| b == b'\n')
}

fn is_terminator(line: &[u8]) -> bool {
    line == b".\n" || line == b".\r\n"
}

fn decode_line(line: &[u8]) -> String {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    String::from_utf8_lossy(line).into_owned()
}
