//! Line Framing
//!
//! The endpoints emit one JSON value per `\n`-terminated line and send blank
//! lines as keep-alives. Response bodies arrive in arbitrary chunks, so
//! [`LineDecoder`] buffers bytes and yields complete lines, and
//! [`decode_line`] classifies each line.
//!
//! # Security
//!
//! - Maximum line size is enforced so a peer that never sends `\n` cannot
//!   exhaust memory; exceeding it is a framing error that kills the stream

use serde::de::DeserializeOwned;
use thiserror::Error;

/// Maximum line size (10 MB)
pub const MAX_LINE_SIZE: usize = 10 * 1024 * 1024;

/// Minimum buffer capacity for decoder
const MIN_BUFFER_CAPACITY: usize = 4096;

/// The byte stream can no longer be split into lines
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FramingError {
    /// No newline within [`MAX_LINE_SIZE`] bytes
    #[error("Line exceeds {max} bytes without a newline ({len} buffered)")]
    LineTooLong {
        /// Bytes buffered without a newline
        len: usize,
        /// Configured limit
        max: usize,
    },
}

/// What a single line turned out to be
#[derive(Debug)]
pub enum LineOutcome<T> {
    /// Blank keep-alive line
    Heartbeat,
    /// A decoded record
    Record(T),
    /// Not valid JSON for `T`; the line is dropped
    Malformed(serde_json::Error),
}

/// Trim a line and decode it as `T`
pub fn decode_line<T: DeserializeOwned>(line: &[u8]) -> LineOutcome<T> {
    let line = line.trim_ascii();
    if line.is_empty() {
        return LineOutcome::Heartbeat;
    }
    match serde_json::from_slice(line) {
        Ok(record) => LineOutcome::Record(record),
        Err(e) => LineOutcome::Malformed(e),
    }
}

/// Incremental splitter for `\n`-delimited byte streams
#[derive(Debug)]
pub struct LineDecoder {
    buffer: Vec<u8>,
    /// Position where we've consumed up to
    read_pos: usize,
    /// Bytes before this position are known not to contain `\n`
    scan_pos: usize,
    max_line: usize,
}

impl Default for LineDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl LineDecoder {
    /// Create a decoder with the default line limit
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_line(MAX_LINE_SIZE)
    }

    /// Create a decoder with a custom line limit
    #[must_use]
    pub fn with_max_line(max_line: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(MIN_BUFFER_CAPACITY),
            read_pos: 0,
            scan_pos: 0,
            max_line,
        }
    }

    /// Append bytes to the buffer
    pub fn push(&mut self, data: &[u8]) {
        // Compact buffer if we've consumed a lot
        if self.read_pos > self.buffer.len() / 2 && self.read_pos > MIN_BUFFER_CAPACITY {
            self.buffer.drain(..self.read_pos);
            self.scan_pos -= self.read_pos;
            self.read_pos = 0;
        }
        self.buffer.extend_from_slice(data);
    }

    /// Bytes buffered but not yet returned as a line
    #[must_use]
    pub fn available(&self) -> usize {
        self.buffer.len() - self.read_pos
    }

    /// Next complete line, without its terminating `\n`
    ///
    /// Returns:
    /// - `Ok(Some(line))` if a complete line is buffered
    /// - `Ok(None)` if more data is needed
    /// - `Err(FramingError::LineTooLong)` if the pending line exceeds the limit
    pub fn next_line(&mut self) -> Result<Option<&[u8]>, FramingError> {
        let start = self.read_pos;
        match self.buffer[self.scan_pos..].iter().position(|&b| b == b'\n') {
            Some(offset) => {
                let end = self.scan_pos + offset;
                self.read_pos = end + 1;
                self.scan_pos = self.read_pos;
                Ok(Some(&self.buffer[start..end]))
            }
            None => {
                self.scan_pos = self.buffer.len();
                let len = self.available();
                if len > self.max_line {
                    return Err(FramingError::LineTooLong {
                        len,
                        max: self.max_line,
                    });
                }
                Ok(None)
            }
        }
    }

    /// Drop everything buffered, including a partial line
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.read_pos = 0;
        self.scan_pos = 0;
    }
}
