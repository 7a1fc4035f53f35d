//! Module `file_ops`
//!
//! Streams file contents to a client for `GET` and writes `PUT` payloads to
//! disk. Socket errors are returned to the caller; file errors are logged
//! and reported through the protocol.

use log::{error, info, warn};
use std::io;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};

use crate::error::StorageError;
use crate::protocol::responses::DOWNLOAD_TRAILER;
use crate::storage::UploadGuard;

const BUFFER_SIZE: usize = 8192; // 8KB buffer for better performance

/// A file opened for a `GET` response.
#[derive(Debug)]
pub struct Download {
    name: String,
    file: File,
}

impl Download {
    pub fn new(name: impl Into<String>, file: File) -> Self {
        Self {
            name: name.into(),
            file,
        }
    }
}

/// Copies the file behind `download` to `writer`, followed by the `\n.\n`
/// trailer.
///
/// A read failure part way through ends the contents early but still sends the
/// trailer. Only write failures are returned.
pub async fn send_file<W>(writer: &mut W, download: Download) -> io::Result<u64>
where
    W: AsyncWrite + Unpin,
{
    let Download { name, file } = download;
    let total_bytes_sent = copy_contents(file, writer, &name).await?;

    writer.write_all(DOWNLOAD_TRAILER.as_bytes()).await?;
    writer.flush().await?;

    info!("File {} sent ({} bytes)", name, total_bytes_sent);
    Ok(total_bytes_sent)
}

async fn copy_contents<R, W>(mut source: R, writer: &mut W, name: &str) -> io::Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buffer = [0u8; BUFFER_SIZE];
    let mut total = 0u64;

    loop {
        let n = match source.read(&mut buffer).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                error!("Read error on {} after {} bytes: {}", name, total, e);
                break;
            }
        };

        writer.write_all(&buffer[..n]).await?;
        total += n as u64;
    }

    Ok(total)
}

/// Destination of a `PUT` payload. Holds the filename reservation until
/// dropped.
#[derive(Debug)]
pub struct Upload {
    name: String,
    file: BufWriter<File>,
    bytes_written: u64,
    failure: Option<io::Error>,
    _guard: UploadGuard,
}

impl Upload {
    pub fn new(name: impl Into<String>, file: File, guard: UploadGuard) -> Self {
        Self {
            name: name.into(),
            file: BufWriter::with_capacity(BUFFER_SIZE, file),
            bytes_written: 0,
            failure: None,
            _guard: guard,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Appends a payload segment verbatim.
    ///
    /// After the first write error further segments are dropped; the error is
    /// reported by `finish`.
    pub async fn write_chunk(&mut self, data: &[u8]) {
        if self.failure.is_some() {
            return;
        }

        match self.file.write_all(data).await {
            Ok(()) => self.bytes_written += data.len() as u64,
            Err(e) => {
                error!("Failed to write to file {}: {}", self.name, e);
                self.failure = Some(e);
            }
        }
    }

    /// Flushes and closes the file, returning the number of bytes written.
    pub async fn finish(mut self) -> Result<u64, StorageError> {
        if let Some(e) = self.failure.take() {
            return Err(StorageError::IoError(e));
        }

        self.file.flush().await?;
        info!(
            "File {} saved. {} bytes transferred.",
            self.name, self.bytes_written
        );
        Ok(self.bytes_written)
    }

    /// Keeps whatever arrived before the client went away. Nothing is
    /// reported to the client.
    pub async fn abandon(mut self) {
        if self.failure.is_none() {
            if let Err(e) = self.file.flush().await {
                error!("Failed to flush partial file {}: {}", self.name, e);
            }
        }
        warn!(
            "Upload of {} abandoned after {} bytes",
            self.name, self.bytes_written
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::FileStore;

    #[tokio::test]
    async fn send_file_appends_trailer() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        store.write("hello.txt", b"hi\n").await.unwrap();

        let file = store.open("hello.txt").await.unwrap();
        let mut out = Vec::new();
        let sent = send_file(&mut out, Download::new("hello.txt", file))
            .await
            .unwrap();

        assert_eq!(sent, 3);
        assert_eq!(out, b"hi\n\n.\n");
    }

    #[tokio::test]
    async fn upload_counts_bytes_and_releases_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();

        let (file, guard) = store.create("up.bin").await.unwrap();
        let mut upload = Upload::new("up.bin", file, guard);
        upload.write_chunk(b"line one\n").await;
        upload.write_chunk(b"\x00\x01\n").await;

        assert_eq!(upload.finish().await.unwrap(), 12);
        assert_eq!(store.read("up.bin").await.unwrap(), b"line one\n\x00\x01\n");
        assert!(store.create("up.bin").await.is_ok());
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn write_failure_drops_later_chunks_and_fails_finish() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        // Every write to /dev/full fails with ENOSPC.
        let Ok(full) = tokio::fs::OpenOptions::new().write(true).open("/dev/full").await else {
            return;
        };

        let (_file, guard) = store.create("full.bin").await.unwrap();
        let mut upload = Upload::new("full.bin", full, guard);
        upload.write_chunk(&[b'x'; 2 * BUFFER_SIZE]).await;
        upload.write_chunk(b"after the failure\n").await;

        assert!(matches!(upload.finish().await, Err(StorageError::IoError(_))));
        assert!(store.create("full.bin").await.is_ok());
    }
}
