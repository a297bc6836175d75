/*!
 * Output Multiplexer
 *
 * Drains a child's stdout and stderr without ever blocking on a single pipe.
 * Each pump waits (bounded) for readiness on every open endpoint, then does
 * exactly one non-blocking read per ready endpoint. The stdin feeder shares
 * the same readiness set, so a child that writes output while we are still
 * writing its input can never deadlock against us.
 */

use super::sink::TeeSink;
use super::stdin::StdinFeeder;
use crate::core::{ExecError, ExecResult, Stream};
use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use std::io::{self, ErrorKind, Read};
use std::os::fd::AsFd;
use std::process::{ChildStderr, ChildStdout};
use std::time::Duration;
use tracing::{debug, warn};

/// Borrowed pipe endpoints of a running child
///
/// The job keeps ownership; the multiplexer only reads and writes through
/// these references for the duration of one call.
#[derive(Default)]
pub struct Endpoints<'a> {
    pub stdout: Option<&'a mut ChildStdout>,
    pub stderr: Option<&'a mut ChildStderr>,
    pub stdin: Option<&'a mut StdinFeeder>,
}

/// Bytes collected from both streams once multiplexing is over
#[derive(Debug, Default)]
pub struct CapturedOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Output(Stream),
    Input,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadStatus {
    Data(usize),
    Empty,
    Eof,
    Failed,
}

/// Per-stream capture state
struct Capture {
    stream: Stream,
    buffer: Vec<u8>,
    keep: bool,
    tee: Option<Box<dyn TeeSink>>,
    open: bool,
    bytes_read: u64,
    failure: Option<String>,
}

impl Capture {
    fn new(stream: Stream) -> Self {
        Self {
            stream,
            buffer: Vec::new(),
            keep: true,
            tee: None,
            open: true,
            bytes_read: 0,
            failure: None,
        }
    }

    fn read_from(&mut self, pipe: &mut dyn Read, chunk: &mut [u8], flush: bool) -> ReadStatus {
        loop {
            return match pipe.read(chunk) {
                Ok(0) => {
                    self.open = false;
                    debug!(stream = %self.stream, bytes = self.bytes_read, "Reached end of stream");
                    ReadStatus::Eof
                }
                Ok(n) => {
                    self.absorb(&chunk[..n], flush);
                    ReadStatus::Data(n)
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == ErrorKind::WouldBlock => ReadStatus::Empty,
                Err(e) => {
                    warn!(stream = %self.stream, error = %e, "Read failed, no longer capturing stream");
                    self.open = false;
                    self.failure = Some(format!("{}: {}", self.stream, e));
                    ReadStatus::Failed
                }
            };
        }
    }

    fn absorb(&mut self, data: &[u8], flush: bool) {
        self.bytes_read += data.len() as u64;
        if self.keep {
            self.buffer.extend_from_slice(data);
        }
        if let Some(tee) = self.tee.as_mut() {
            let written = tee
                .write_chunk(data)
                .and_then(|_| if flush { tee.flush_sink() } else { Ok(()) });
            if let Err(e) = written {
                warn!(stream = %self.stream, error = %e, "Tee sink failed, detaching it");
                self.tee = None;
            }
        }
    }

    fn flush_tee(&mut self) {
        if let Some(tee) = self.tee.as_mut() {
            if let Err(e) = tee.flush_sink() {
                warn!(stream = %self.stream, error = %e, "Failed to flush tee sink");
            }
        }
    }
}

/// Readiness-driven reader for a child's output pipes
pub struct OutputMultiplexer {
    stdout: Capture,
    stderr: Capture,
    flush_tee: bool,
    chunk: Vec<u8>,
    errors: Vec<String>,
}

impl OutputMultiplexer {
    pub fn new(read_chunk: usize) -> Self {
        Self {
            stdout: Capture::new(Stream::Stdout),
            stderr: Capture::new(Stream::Stderr),
            flush_tee: false,
            chunk: vec![0; read_chunk.max(1)],
            errors: Vec::new(),
        }
    }

    /// Attach a sink that receives a live copy of one stream
    pub fn set_tee(&mut self, stream: Stream, sink: Box<dyn TeeSink>) {
        self.capture_mut(stream).tee = Some(sink);
    }

    /// Whether bytes of `stream` are kept in memory (tee sinks still receive them)
    pub fn set_capture(&mut self, stream: Stream, keep: bool) {
        self.capture_mut(stream).keep = keep;
    }

    /// Flush tee sinks after every chunk instead of only at the end
    pub fn set_flush_tee(&mut self, flush: bool) {
        self.flush_tee = flush;
    }

    pub fn is_open(&self, stream: Stream) -> bool {
        self.capture(stream).open
    }

    pub fn bytes_read(&self, stream: Stream) -> u64 {
        self.capture(stream).bytes_read
    }

    /// Whether any endpoint in `ep` is still worth a readiness wait
    pub fn has_open_endpoints(&self, ep: &Endpoints<'_>) -> bool {
        (self.stdout.open && ep.stdout.is_some())
            || (self.stderr.open && ep.stderr.is_some())
            || ep.stdin.as_deref().and_then(StdinFeeder::pipe).is_some()
    }

    fn capture(&self, stream: Stream) -> &Capture {
        match stream {
            Stream::Stdout => &self.stdout,
            Stream::Stderr => &self.stderr,
        }
    }

    fn capture_mut(&mut self, stream: Stream) -> &mut Capture {
        match stream {
            Stream::Stdout => &mut self.stdout,
            Stream::Stderr => &mut self.stderr,
        }
    }

    /// One readiness wait (at most `wait`) followed by one read per ready endpoint
    ///
    /// Returns the number of endpoints that were ready. When no endpoint is
    /// left to watch, sleeps for `wait` instead so callers still tick.
    pub fn pump(&mut self, ep: &mut Endpoints<'_>, wait: Duration) -> ExecResult<usize> {
        let mut fds: Vec<PollFd<'_>> = Vec::with_capacity(3);
        let mut slots: Vec<Slot> = Vec::with_capacity(3);

        if self.stdout.open {
            if let Some(pipe) = ep.stdout.as_deref() {
                fds.push(PollFd::new(pipe.as_fd(), PollFlags::POLLIN));
                slots.push(Slot::Output(Stream::Stdout));
            }
        }
        if self.stderr.open {
            if let Some(pipe) = ep.stderr.as_deref() {
                fds.push(PollFd::new(pipe.as_fd(), PollFlags::POLLIN));
                slots.push(Slot::Output(Stream::Stderr));
            }
        }
        if let Some(pipe) = ep.stdin.as_deref().and_then(StdinFeeder::pipe) {
            fds.push(PollFd::new(pipe.as_fd(), PollFlags::POLLOUT));
            slots.push(Slot::Input);
        }

        if fds.is_empty() {
            std::thread::sleep(wait);
            return Ok(0);
        }

        let millis = wait.as_millis().min(u16::MAX as u128) as u16;
        match poll(&mut fds, PollTimeout::from(millis)) {
            Ok(0) => return Ok(0),
            Ok(_) => {}
            Err(Errno::EINTR) => return Ok(0),
            Err(e) => {
                return Err(ExecError::io(
                    "waiting for pipe readiness",
                    io::Error::from(e),
                ))
            }
        }

        let ready: Vec<(Slot, PollFlags)> = fds
            .iter()
            .zip(slots.iter())
            .filter_map(|(fd, slot)| {
                fd.revents()
                    .filter(|revents| !revents.is_empty())
                    .map(|revents| (*slot, revents))
            })
            .collect();
        drop(fds);

        for (slot, revents) in &ready {
            match slot {
                Slot::Output(stream) => {
                    self.read_ready(*stream, ep);
                }
                Slot::Input => {
                    if !revents.intersects(
                        PollFlags::POLLOUT | PollFlags::POLLERR | PollFlags::POLLHUP,
                    ) {
                        continue;
                    }
                    if let Some(feeder) = ep.stdin.as_deref_mut() {
                        if let Err(e) = feeder.feed() {
                            warn!(error = %e, "Writing to stdin failed");
                            self.errors.push(format!("stdin: {}", e));
                        }
                    }
                }
            }
        }

        Ok(ready.len())
    }

    fn read_ready(&mut self, stream: Stream, ep: &mut Endpoints<'_>) -> ReadStatus {
        let flush = self.flush_tee;
        let chunk = &mut self.chunk;
        let (capture, pipe): (&mut Capture, Option<&mut dyn Read>) = match stream {
            Stream::Stdout => (
                &mut self.stdout,
                ep.stdout.as_deref_mut().map(|p| p as &mut dyn Read),
            ),
            Stream::Stderr => (
                &mut self.stderr,
                ep.stderr.as_deref_mut().map(|p| p as &mut dyn Read),
            ),
        };
        match pipe {
            Some(pipe) if capture.open => capture.read_from(pipe, chunk, flush),
            _ => ReadStatus::Eof,
        }
    }

    /// Final pass after the child exited: read until end of stream
    ///
    /// Stops early on would-block, which means a surviving descendant still
    /// holds the write end open.
    pub fn drain(&mut self, ep: &mut Endpoints<'_>) {
        for stream in [Stream::Stdout, Stream::Stderr] {
            while let ReadStatus::Data(_) = self.read_ready(stream, ep) {}
        }
    }

    /// Flush tee sinks and hand over the captured bytes
    pub fn finish(mut self) -> CapturedOutput {
        self.stdout.flush_tee();
        self.stderr.flush_tee();

        let mut errors = self.errors;
        errors.extend(self.stdout.failure.take());
        errors.extend(self.stderr.failure.take());

        CapturedOutput {
            stdout: self.stdout.buffer,
            stderr: self.stderr.buffer,
            errors,
        }
    }
}
