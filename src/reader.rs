//! Line framing over the current file handle.

use crate::error::Result;
use std::io::SeekFrom;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};
use tracing::trace;

const TERMINATOR: u8 = b'\n';

/// Splits whatever reader is currently installed into complete lines.
///
/// Bytes after the last terminator are kept between reads so a line written
/// in several pieces is emitted once complete. Reaching end-of-file is not
/// an error; the next read resumes at the same position.
pub(crate) struct LineReader {
    current: Option<BufReader<File>>,
    partial: Vec<u8>,
    position: u64,
}

impl LineReader {
    pub(crate) fn new() -> Self {
        Self {
            current: None,
            partial: Vec::new(),
            position: 0,
        }
    }

    /// Switches to a new file generation. Any partial line from the old one is dropped.
    pub(crate) fn install(&mut self, reader: BufReader<File>, position: u64) {
        self.discard_partial();
        self.current = Some(reader);
        self.position = position;
    }

    /// Closes the current handle, if any.
    pub(crate) fn release(&mut self) {
        self.discard_partial();
        self.current = None;
    }

    #[cfg(test)]
    pub(crate) fn is_attached(&self) -> bool {
        self.current.is_some()
    }

    /// Byte offset of the next unread byte, including any buffered partial line.
    pub(crate) fn position(&self) -> u64 {
        self.position
    }

    /// Reads up to `max_lines` complete lines that are available right now.
    ///
    /// Returns an empty batch when no handle is installed or no terminator
    /// has arrived yet.
    pub(crate) async fn read_lines(&mut self, max_lines: usize) -> Result<Vec<String>> {
        let mut lines = Vec::new();
        let Some(reader) = self.current.as_mut() else {
            return Ok(lines);
        };

        while lines.len() < max_lines {
            let read = reader.read_until(TERMINATOR, &mut self.partial).await?;
            if read == 0 {
                break;
            }
            self.position += read as u64;

            match complete_line(&mut self.partial) {
                Some(line) => lines.push(line),
                None => break,
            }
        }

        if !lines.is_empty() {
            trace!(count = lines.len(), position = self.position, "read lines");
        }
        Ok(lines)
    }

    /// Restarts the current handle from the beginning of the file.
    pub(crate) async fn rewind(&mut self) -> Result<()> {
        self.discard_partial();
        if let Some(reader) = self.current.as_mut() {
            reader.seek(SeekFrom::Start(0)).await?;
        }
        self.position = 0;
        Ok(())
    }

    fn discard_partial(&mut self) {
        if !self.partial.is_empty() {
            trace!(bytes = self.partial.len(), "discarding partial line");
            self.partial.clear();
        }
    }
}

/// Takes a terminated record out of `buf`, stripping the terminator.
///
/// Leaves `buf` untouched when it does not end in a terminator yet.
fn complete_line(buf: &mut Vec<u8>) -> Option<String> {
    if buf.last() != Some(&TERMINATOR) {
        return None;
    }
    buf.pop();
    let line = String::from_utf8_lossy(buf).into_owned();
    buf.clear();
    Some(line)
}
