/*!
 * Stdin Feeder
 * Non-blocking, chunked delivery of a payload to a child's stdin
 */

use std::io::{self, ErrorKind, Write};
use std::process::ChildStdin;
use tracing::debug;

/// Owns the child's stdin pipe and the part of the payload not yet written
pub struct StdinFeeder {
    pipe: Option<ChildStdin>,
    payload: Vec<u8>,
    offset: usize,
    chunk: usize,
}

impl StdinFeeder {
    /// Pipe must already be in non-blocking mode
    pub fn new(pipe: ChildStdin, payload: Vec<u8>, chunk: usize) -> Self {
        let mut feeder = Self {
            pipe: Some(pipe),
            payload,
            offset: 0,
            chunk: chunk.max(1),
        };
        if feeder.payload.is_empty() {
            feeder.close();
        }
        feeder
    }

    /// Write at most one chunk without blocking
    ///
    /// Closes the pipe once the payload is exhausted or the reader went away.
    /// Returns the number of bytes written.
    pub fn feed(&mut self) -> io::Result<usize> {
        let Some(pipe) = self.pipe.as_mut() else {
            return Ok(0);
        };

        let end = (self.offset + self.chunk).min(self.payload.len());
        match pipe.write(&self.payload[self.offset..end]) {
            Ok(n) => {
                self.offset += n;
                if self.offset >= self.payload.len() {
                    self.close();
                }
                Ok(n)
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::Interrupted => {
                Ok(0)
            }
            Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                debug!(
                    remaining = self.remaining(),
                    "Child closed stdin before the payload was delivered"
                );
                self.close();
                Ok(0)
            }
            Err(e) => {
                self.close();
                Err(e)
            }
        }
    }

    /// Close the pipe; later calls are no-ops
    pub fn close(&mut self) {
        if let Some(pipe) = self.pipe.take() {
            drop(pipe);
            debug!(written = self.offset, "Closed child stdin");
        }
    }

    pub fn is_open(&self) -> bool {
        self.pipe.is_some()
    }

    pub fn pipe(&self) -> Option<&ChildStdin> {
        self.pipe.as_ref()
    }

    pub fn written(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> usize {
        self.payload.len() - self.offset
    }
}
