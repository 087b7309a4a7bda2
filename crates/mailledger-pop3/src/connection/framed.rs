//! Framed I/O for the POP3 protocol.
//!
//! POP3 is strictly request/response over CRLF-terminated lines. A reply is
//! either a single status line or, for `RETR`, `TOP`, `LIST` and `UIDL`, a
//! status line followed by dot-stuffed body lines and a lone `.` line.

#![allow(clippy::missing_errors_doc)]

use std::io;

use bytes::BytesMut;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use crate::command::Command;
use crate::parser::{is_terminator, parse_status_line, strip_line_ending, unstuff};
use crate::types::StatusLine;
use crate::{Error, Result};

/// Default buffer size for reading.
const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Maximum line length to prevent memory exhaustion.
const MAX_LINE_LENGTH: usize = 1024 * 1024; // 1 MB

/// Framed connection for the POP3 protocol.
pub struct FramedStream<S> {
    reader: BufReader<S>,
    write_buffer: BytesMut,
}

impl<S> FramedStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new framed stream.
    pub fn new(stream: S) -> Self {
        Self {
            reader: BufReader::with_capacity(DEFAULT_BUFFER_SIZE, stream),
            write_buffer: BytesMut::with_capacity(256),
        }
    }

    /// Writes a command and flushes it.
    pub async fn write_command(&mut self, command: &Command) -> Result<()> {
        tracing::debug!(?command, "C:");

        self.write_buffer.clear();
        self.write_buffer.extend_from_slice(&command.serialize());

        let stream = self.reader.get_mut();
        stream.write_all(&self.write_buffer).await?;
        stream.flush().await?;

        Ok(())
    }

    /// Writes a command and reads its status line.
    pub async fn command(&mut self, command: &Command) -> Result<StatusLine> {
        self.write_command(command).await?;
        self.read_status().await
    }

    /// Reads one status line.
    pub async fn read_status(&mut self) -> Result<StatusLine> {
        let line = self.read_line().await?;
        let status = parse_status_line(&line)?;
        tracing::debug!(status = ?status.status, text = %status.text, "S:");
        Ok(status)
    }

    /// Reads the body of a multiline response up to the terminator.
    ///
    /// Lines are dot-unstuffed and keep their line endings; the terminator
    /// is not included. With `top_lines` set, the headers up to and
    /// including the first empty line are kept, followed by at most that
    /// many lines. A message without an empty line is all body. Extra lines
    /// are still drained so the stream stays in sync.
    pub async fn read_body(&mut self, top_lines: Option<u32>) -> Result<Vec<u8>> {
        let lines = self.read_listing().await?;

        let keep = top_lines.map_or(lines.len(), |max| {
            let body_start = lines
                .iter()
                .position(|line| strip_line_ending(line).is_empty())
                .map_or(0, |separator| separator + 1);
            let max = usize::try_from(max).unwrap_or(usize::MAX);
            lines.len().min(body_start.saturating_add(max))
        });

        let dropped = lines.len() - keep;
        if dropped > 0 {
            tracing::warn!(dropped, "server sent more TOP body lines than requested");
        }

        Ok(lines[..keep].concat())
    }

    /// Reads the dot-unstuffed lines of a multiline response (`LIST`, `UIDL`).
    pub async fn read_listing(&mut self) -> Result<Vec<Vec<u8>>> {
        let mut lines = Vec::new();
        loop {
            let raw = self.read_line().await?;
            if is_terminator(&raw) {
                break;
            }
            lines.push(unstuff(&raw).to_vec());
        }
        Ok(lines)
    }

    /// Reads a single line including its line ending.
    async fn read_line(&mut self) -> Result<Vec<u8>> {
        let mut line = Vec::new();

        loop {
            let buf = self.reader.fill_buf().await?;
            if buf.is_empty() {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed",
                )));
            }

            if let Some(pos) = buf.iter().position(|&b| b == b'\n') {
                line.extend_from_slice(&buf[..=pos]);
                self.reader.consume(pos + 1);
                break;
            }

            let len = buf.len();
            line.extend_from_slice(buf);
            self.reader.consume(len);

            if line.len() > MAX_LINE_LENGTH {
                return Err(Error::Protocol("line too long".to_string()));
            }
        }

        Ok(line)
    }

    /// Shuts down the write half of the stream.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.reader.get_mut().shutdown().await?;
        Ok(())
    }
}
