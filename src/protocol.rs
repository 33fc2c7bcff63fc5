//! Wire-level pieces: the bounded line reader and the fixed response.
//!
//! The peer is expected to send one line terminated by a line-feed
//! byte (0x0A). Bytes at or below carriage-return (13) are consumed
//! from the stream but dropped from the assembled line; everything
//! above 13 is kept. The line's content never affects the response.

use bytes::{BufMut, BytesMut};
use std::io::{self, Read};

/// Line terminator byte (0x0A).
pub const LINE_FEED: u8 = 10;

/// Highest byte value stripped from the assembled line.
pub const CARRIAGE_RETURN: u8 = 13;

/// Maximum accumulated line length before the read is aborted.
pub const MAX_LINE_LEN: usize = 8 * 1024;

/// Read chunk size.
const READ_CHUNK: usize = 512;

/// The response sent to every client, byte for byte.
pub const RESPONSE: &str = "HTTP/1.1 200 OK\r\n\r\n Hello World!";

/// Outcome of scanning one chunk for the line terminator.
#[derive(Debug, PartialEq, Eq)]
pub enum Scan {
    /// Terminator found; the given number of chunk bytes were consumed,
    /// including the terminator itself.
    Complete(usize),
    /// Whole chunk consumed, no terminator yet.
    Partial,
}

/// Errors from reading a line off a stream.
#[derive(Debug)]
pub enum LineError {
    /// Underlying read failed.
    Io(io::Error),
    /// Peer closed the connection before sending the terminator.
    Closed,
    /// Accumulated line exceeded [`MAX_LINE_LEN`].
    TooLong(usize),
}

impl std::fmt::Display for LineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LineError::Io(e) => write!(f, "{}", e),
            LineError::Closed => write!(f, "connection closed before line terminator"),
            LineError::TooLong(len) => {
                write!(f, "line exceeded maximum length ({} of {} bytes)", len, MAX_LINE_LEN)
            }
        }
    }
}

impl std::error::Error for LineError {}

/// Scan a chunk of stream bytes, appending printable bytes to `line`.
///
/// Pure over its inputs: no I/O, so the filtering rule is testable on
/// its own. Bytes with value `> 13` are appended; bytes `<= 13` are
/// dropped; a line-feed stops the scan without being appended.
pub fn scan_line(chunk: &[u8], line: &mut BytesMut) -> Scan {
    for (i, &byte) in chunk.iter().enumerate() {
        if byte == LINE_FEED {
            return Scan::Complete(i + 1);
        }
        if byte > CARRIAGE_RETURN {
            line.put_u8(byte);
        }
    }
    Scan::Partial
}

/// Read one filtered line from the stream.
///
/// Reads in chunks rather than byte-at-a-time and enforces
/// [`MAX_LINE_LEN`] so a peer that never sends a line-feed cannot grow
/// memory without bound. Bytes buffered past the terminator are
/// discarded; the connection never reads a second line.
pub fn read_line<R: Read>(reader: &mut R) -> Result<String, LineError> {
    let mut line = BytesMut::with_capacity(READ_CHUNK);
    let mut chunk = [0u8; READ_CHUNK];

    loop {
        let n = reader.read(&mut chunk).map_err(LineError::Io)?;
        if n == 0 {
            return Err(LineError::Closed);
        }

        let scan = scan_line(&chunk[..n], &mut line);
        if line.len() > MAX_LINE_LEN {
            return Err(LineError::TooLong(line.len()));
        }
        if let Scan::Complete(_) = scan {
            return Ok(String::from_utf8_lossy(&line).into_owned());
        }
    }
}
