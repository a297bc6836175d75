/*!
 * Job Capabilities
 * Tee sinks receiving a live copy of output, and quit predicates
 */

use parking_lot::Mutex;
use std::io::{self, Write};
use std::sync::Arc;

/// Secondary destination for captured output
///
/// Every `io::Write + Send` type is a tee sink.
pub trait TeeSink: Send {
    fn write_chunk(&mut self, data: &[u8]) -> io::Result<()>;

    fn flush_sink(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<W: Write + Send> TeeSink for W {
    fn write_chunk(&mut self, data: &[u8]) -> io::Result<()> {
        self.write_all(data)
    }

    fn flush_sink(&mut self) -> io::Result<()> {
        self.flush()
    }
}

/// Cooperative early-stop check, evaluated once per wait-loop tick
pub trait QuitPredicate: Send {
    fn should_quit(&mut self) -> bool;
}

impl<F: FnMut() -> bool + Send> QuitPredicate for F {
    fn should_quit(&mut self) -> bool {
        self()
    }
}

/// Cloneable in-memory sink; clones share one buffer
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> Vec<u8> {
        self.inner.lock().clone()
    }

    pub fn contents_lossy(&self) -> String {
        String::from_utf8_lossy(&self.inner.lock()).into_owned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_buffer_clones_share_storage() {
        let buffer = SharedBuffer::new();
        let mut writer = buffer.clone();
        writer.write_chunk(b"abc").unwrap();
        writer.write_chunk(b"def").unwrap();
        assert_eq!(buffer.contents(), b"abcdef");
        assert_eq!(buffer.len(), 6);
    }

    #[test]
    fn test_closure_is_quit_predicate() {
        let mut calls = 0;
        let mut predicate = move || {
            calls += 1;
            calls > 2
        };
        assert!(!predicate.should_quit());
        assert!(!predicate.should_quit());
        assert!(predicate.should_quit());
    }
}
