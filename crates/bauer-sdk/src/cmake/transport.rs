//! Framed JSON transport to a `cmake -E server` process.
//!
//! Every message travels as one frame:
//!
//! ```text
//!
//! [== "CMake Server" ==[
//! {"type":"hello", ...}
//! ]== "CMake Server" ==]
//! ```
//!
//! [`FrameWriter`] and [`FrameReader`] implement the framing over any byte
//! stream. [`ServerProcess`] owns the child process, writes to its stdin and
//! reads its stdout on a dedicated thread so that waits can be bounded by a
//! timeout or cancelled through a [`CancelToken`]. The child is killed when
//! the [`ServerProcess`] is dropped.

use std::collections::BTreeMap;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, trace, warn};

use super::error::TransportError;

/// Line opening every frame.
pub const START_MARKER: &str = "[== \"CMake Server\" ==[";
/// Line closing every frame.
pub const END_MARKER: &str = "]== \"CMake Server\" ==]";

/// Arguments that put cmake into server mode on stdin/stdout.
const SERVER_ARGS: [&str; 4] = ["-E", "server", "--experimental", "--debug"];

/// Granularity at which a blocked wait re-checks its cancel token.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Writes frames to an underlying byte sink.
pub struct FrameWriter<W: Write> {
    inner: W,
}

impl<W: Write> FrameWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Serializes `message` and writes it as a single frame, then flushes.
    pub fn write_frame(&mut self, message: &Value) -> Result<(), TransportError> {
        let body = serde_json::to_string(message)?;
        let frame = format!("\n{START_MARKER}\n{body}\n{END_MARKER}\n");
        self.inner.write_all(frame.as_bytes())?;
        self.inner.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

/// Reads frames from an underlying buffered byte source.
pub struct FrameReader<R: BufRead> {
    inner: R,
}

impl<R: BufRead> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Reads the next frame.
    ///
    /// Returns `Ok(None)` when the stream ends cleanly between frames. Blank
    /// lines between frames are skipped; any other text outside a frame is an
    /// error.
    pub fn read_frame(&mut self) -> Result<Option<Value>, TransportError> {
        let mut line = String::new();

        loop {
            line.clear();
            if self.inner.read_line(&mut line)? == 0 {
                return Ok(None);
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if trimmed == START_MARKER {
                break;
            }
            return Err(TransportError::MissingStartMarker(trimmed.to_string()));
        }

        let mut body = String::new();
        loop {
            line.clear();
            if self.inner.read_line(&mut line)? == 0 {
                return Err(TransportError::UnexpectedEof);
            }
            if line.trim() == END_MARKER {
                break;
            }
            body.push_str(&line);
        }

        Ok(Some(serde_json::from_str(&body)?))
    }
}

/// Shared flag that aborts a pending [`Transport::receive`].
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// How long a receive may block.
///
/// The default waits indefinitely, which is how the server protocol has
/// always been driven. A bound turns a stalled server into
/// [`TransportError::Timeout`].
#[derive(Debug, Clone, Default)]
pub struct Wait {
    timeout: Option<Duration>,
    cancel: CancelToken,
}

impl Wait {
    /// Waits until a message arrives or the token is cancelled.
    pub fn forever() -> Self {
        Self::default()
    }

    /// Waits at most `timeout` for each message.
    pub fn bounded(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            cancel: CancelToken::default(),
        }
    }

    /// Attaches a cancel token.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// A duplex channel of JSON messages, one round trip at a time.
pub trait Transport {
    /// Sends one message.
    fn send(&mut self, message: &Value) -> Result<(), TransportError>;

    /// Blocks for the next message according to `wait`.
    fn receive(&mut self, wait: &Wait) -> Result<Value, TransportError>;
}

/// A running `cmake -E server` child process.
pub struct ServerProcess {
    child: Child,
    writer: FrameWriter<ChildStdin>,
    frames: Receiver<Result<Value, TransportError>>,
}

impl ServerProcess {
    /// Spawns `executable` in server mode with `extra_env` added to the
    /// inherited environment.
    pub fn spawn(
        executable: &Path,
        extra_env: &BTreeMap<String, String>,
    ) -> Result<Self, TransportError> {
        debug!(executable = %executable.display(), "starting cmake server");

        let spawn_error = |source| TransportError::Spawn {
            executable: executable.to_path_buf(),
            source,
        };

        let mut child = Command::new(executable)
            .args(SERVER_ARGS)
            .envs(extra_env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(spawn_error)?;

        let pipes = child.stdin.take().zip(child.stdout.take());
        let Some((stdin, stdout)) = pipes else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(spawn_error(std::io::Error::other(
                "child process has no stdio pipes",
            )));
        };

        let (sender, frames) = mpsc::channel();
        let reader = thread::Builder::new()
            .name("cmake-server-reader".to_string())
            .spawn(move || {
                let mut reader = FrameReader::new(BufReader::new(stdout));
                loop {
                    let frame = match reader.read_frame() {
                        Ok(Some(frame)) => Ok(frame),
                        Ok(None) => Err(TransportError::Closed),
                        Err(e) => Err(e),
                    };
                    let last = frame.is_err();
                    if sender.send(frame).is_err() || last {
                        break;
                    }
                }
            });

        // The reader thread is detached; it ends once the child's stdout closes.
        if let Err(e) = reader {
            let _ = child.kill();
            let _ = child.wait();
            return Err(TransportError::Io(e));
        }

        Ok(Self {
            child,
            writer: FrameWriter::new(stdin),
            frames,
        })
    }

    /// Process id of the server, mostly useful in logs.
    pub fn id(&self) -> u32 {
        self.child.id()
    }
}

impl Transport for ServerProcess {
    fn send(&mut self, message: &Value) -> Result<(), TransportError> {
        trace!(%message, "-> cmake server");
        self.writer.write_frame(message)
    }

    fn receive(&mut self, wait: &Wait) -> Result<Value, TransportError> {
        let started = Instant::now();
        loop {
            if wait.is_cancelled() {
                return Err(TransportError::Cancelled);
            }

            let slice = match wait.timeout() {
                Some(limit) => {
                    let elapsed = started.elapsed();
                    if elapsed >= limit {
                        return Err(TransportError::Timeout(limit));
                    }
                    (limit - elapsed).min(POLL_INTERVAL)
                }
                None => POLL_INTERVAL,
            };

            match self.frames.recv_timeout(slice) {
                Ok(frame) => {
                    if let Ok(message) = &frame {
                        trace!(%message, "<- cmake server");
                    }
                    return frame;
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return Err(TransportError::Closed),
            }
        }
    }
}

impl Drop for ServerProcess {
    fn drop(&mut self) {
        match self.child.try_wait() {
            Ok(Some(status)) => debug!(%status, "cmake server already exited"),
            _ => {
                if let Err(e) = self.child.kill() {
                    warn!("failed to kill cmake server (pid {}): {}", self.child.id(), e);
                }
                let _ = self.child.wait();
            }
        }
    }
}
