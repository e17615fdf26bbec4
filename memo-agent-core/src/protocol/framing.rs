//! Frame codecs for byte-stream transports.

use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Framing {
    /// One JSON document per line (the MCP stdio convention).
    #[default]
    #[serde(alias = "newline", alias = "lines")]
    NewlineDelimited,
    /// `Content-Length: N` header block followed by N bytes.
    ContentLength,
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid frame header: {0}")]
    InvalidHeader(String),
    #[error("frame of {0} bytes exceeds the size limit")]
    TooLarge(usize),
    #[error("frame is not valid UTF-8")]
    Utf8,
}

pub struct FrameReader<R> {
    reader: BufReader<R>,
    framing: Framing,
    max_frame_bytes: usize,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(reader: R, framing: Framing) -> Self {
        Self {
            reader: BufReader::new(reader),
            framing,
            max_frame_bytes: MAX_FRAME_BYTES,
        }
    }

    /// Overrides the per-frame size cap for both framings.
    pub fn with_max_frame_bytes(mut self, limit: usize) -> Self {
        self.max_frame_bytes = limit;
        self
    }

    /// Next complete frame, or `None` at a clean end of stream.
    pub async fn next_frame(&mut self) -> Result<Option<String>, FrameError> {
        match self.framing {
            Framing::NewlineDelimited => self.next_line_frame().await,
            Framing::ContentLength => self.next_length_frame().await,
        }
    }

    async fn next_line_frame(&mut self) -> Result<Option<String>, FrameError> {
        let limit = self.max_frame_bytes;
        let mut line = Vec::new();
        loop {
            line.clear();
            // One byte past the cap leaves room for the terminating newline.
            let read = (&mut self.reader)
                .take(limit as u64 + 1)
                .read_until(b'\n', &mut line)
                .await?;
            if read == 0 {
                return Ok(None);
            }
            if read > limit && line.last() != Some(&b'\n') {
                return Err(FrameError::TooLarge(read));
            }
            let text = std::str::from_utf8(&line).map_err(|_| FrameError::Utf8)?;
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                return Ok(Some(trimmed.to_string()));
            }
        }
    }

    async fn next_length_frame(&mut self) -> Result<Option<String>, FrameError> {
        let mut length = None;
        let mut saw_header = false;
        let mut line = String::new();
        loop {
            line.clear();
            let read = self.reader.read_line(&mut line).await?;
            if read == 0 {
                if saw_header {
                    return Err(FrameError::Io(io::ErrorKind::UnexpectedEof.into()));
                }
                return Ok(None);
            }
            let header = line.trim_end_matches(['\r', '\n']);
            if header.is_empty() {
                if saw_header {
                    break;
                }
                continue;
            }
            saw_header = true;
            let (name, value) = header
                .split_once(':')
                .ok_or_else(|| FrameError::InvalidHeader(header.to_string()))?;
            if name.trim().eq_ignore_ascii_case("content-length") {
                let parsed = value
                    .trim()
                    .parse::<usize>()
                    .map_err(|_| FrameError::InvalidHeader(header.to_string()))?;
                length = Some(parsed);
            }
        }

        let length =
            length.ok_or_else(|| FrameError::InvalidHeader("missing Content-Length".into()))?;
        if length > self.max_frame_bytes {
            return Err(FrameError::TooLarge(length));
        }
        let mut body = vec![0u8; length];
        self.reader.read_exact(&mut body).await?;
        String::from_utf8(body).map(Some).map_err(|_| FrameError::Utf8)
    }
}

pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    framing: Framing,
    payload: &str,
) -> io::Result<()> {
    match framing {
        Framing::NewlineDelimited => {
            writer.write_all(payload.as_bytes()).await?;
            writer.write_all(b"\n").await?;
        }
        Framing::ContentLength => {
            let header = format!("Content-Length: {}\r\n\r\n", payload.len());
            writer.write_all(header.as_bytes()).await?;
            writer.write_all(payload.as_bytes()).await?;
        }
    }
    writer.flush().await
}
