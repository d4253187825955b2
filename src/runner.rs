//! Bounded execution of the external tool as a subprocess.
//!
//! Two invocation shapes:
//! - [`ProcessRunner::run_capture_impl`]: run to completion under a fixed
//!   deadline, capturing stdout and stderr into independently bounded
//!   buffers, and return the stdout text.
//! - [`ProcessRunner::spawn_streaming_impl`]: hand back a [`ToolStream`]
//!   over the live stdout pipe for line-by-line consumption, with stderr
//!   captured (bounded) in the background for failure diagnosis.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::error::Error;

/// Deadline for captured commands. Downloads bypass the capture path and are
/// not subject to it.
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Ceiling for the background stderr capture on streaming invocations.
const STREAM_STDERR_LIMIT: usize = 1024 * 1024;

/// Capture buffer with a hard ceiling. Writes past the ceiling are dropped
/// and the overflow is recorded, never surfaced as a caller-visible failure.
#[derive(Debug)]
pub struct BoundedBuffer {
    limit: usize,
    data: Vec<u8>,
    truncated: bool,
}

impl BoundedBuffer {
    pub fn new(limit: usize) -> Self {
        BoundedBuffer {
            limit,
            data: Vec::new(),
            truncated: false,
        }
    }

    /// Append as much of `chunk` as fits. Once the ceiling is reached the
    /// capacity error is an internal signal only; readers keep draining the
    /// pipe so the child never blocks on a full pipe.
    pub fn push(&mut self, chunk: &[u8]) -> Result<(), usize> {
        if self.data.len() >= self.limit {
            self.truncated = true;
            return Err(self.limit);
        }
        let remaining = self.limit - self.data.len();
        if chunk.len() > remaining {
            self.data.extend_from_slice(&chunk[..remaining]);
            self.truncated = true;
        } else {
            self.data.extend_from_slice(chunk);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }
}

/// Capture buffers are shared between the drain task and the awaiting
/// caller, so each sits behind its own lock.
type SharedBuffer = Arc<Mutex<BoundedBuffer>>;

fn shared_buffer(limit: usize) -> SharedBuffer {
    Arc::new(Mutex::new(BoundedBuffer::new(limit)))
}

/// Read a pipe to EOF, retaining at most the buffer's ceiling.
async fn drain_into<R: AsyncRead + Unpin>(mut reader: R, buffer: SharedBuffer) {
    let mut chunk = [0u8; 8192];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                // Capacity errors are swallowed; the pipe must still drain.
                let _ = buffer.lock().unwrap().push(&chunk[..n]);
            }
        }
    }
}

/// Live line-oriented view of a streaming invocation: the buffered stdout
/// pipe, the child handle, and the bounded stderr capture. Test code can
/// build one from canned bytes via [`ToolStream::from_reader`].
pub struct ToolStream {
    reader: Box<dyn AsyncBufRead + Unpin + Send>,
    child: Option<Child>,
    stderr: SharedBuffer,
    stderr_task: Option<tokio::task::JoinHandle<()>>,
}

impl ToolStream {
    fn from_child(mut child: Child) -> Result<Self, Error> {
        let stdout = child.stdout.take().expect("child stdout piped");
        let stderr = child.stderr.take().expect("child stderr piped");

        let stderr_buf = shared_buffer(STREAM_STDERR_LIMIT);
        let stderr_task = tokio::spawn(drain_into(stderr, stderr_buf.clone()));

        Ok(ToolStream {
            reader: Box::new(BufReader::new(stdout)),
            child: Some(child),
            stderr: stderr_buf,
            stderr_task: Some(stderr_task),
        })
    }

    /// Build a stream over arbitrary bytes, with no child process behind it.
    pub fn from_reader(reader: impl AsyncBufRead + Unpin + Send + 'static) -> Self {
        ToolStream {
            reader: Box::new(reader),
            child: None,
            stderr: shared_buffer(STREAM_STDERR_LIMIT),
            stderr_task: None,
        }
    }

    /// Next line of stdout, without the trailing newline. `None` at EOF.
    pub(crate) async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        let mut line = String::new();
        let n = self.reader.read_line(&mut line).await?;
        if n == 0 {
            return Ok(None);
        }
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(Some(line))
    }

    /// Kill the child without waiting for it. Used when a callback aborts
    /// the stream mid-listing.
    pub(crate) fn abort(&mut self) {
        if let Some(child) = &mut self.child {
            let _ = child.start_kill();
        }
    }

    /// Await the child after EOF and classify its exit. A stream built from
    /// canned bytes always finishes cleanly.
    pub(crate) async fn finish(mut self) -> Result<(), Error> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        let status = child.wait().await?;
        // The stderr pipe hits EOF once the child exits; wait for the drain
        // so the capture is complete before it is read.
        if let Some(task) = self.stderr_task.take() {
            let _ = task.await;
        }
        if !status.success() {
            let stderr = self.stderr.lock().unwrap().to_string_lossy();
            return Err(Error::ProcessFailure { status, stderr });
        }
        Ok(())
    }
}

/// Executes the external tool with a deadline and per-stream output
/// ceilings. One OS process per call; the deadline guarantees reclamation.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    tool: PathBuf,
    timeout: Duration,
}

impl ProcessRunner {
    pub fn new(tool: impl Into<PathBuf>) -> Self {
        ProcessRunner {
            tool: tool.into(),
            timeout: COMMAND_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn tool(&self) -> &Path {
        &self.tool
    }

    fn spawn(&self, args: &[String]) -> Result<Child, Error> {
        Command::new(&self.tool)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| Error::Spawn {
                tool: self.tool.display().to_string(),
                source,
            })
    }

    /// Run to completion or the deadline, returning the bounded stdout text.
    pub(crate) async fn run_capture_impl(
        &self,
        args: &[String],
        limit: usize,
    ) -> Result<String, Error> {
        debug!(tool = %self.tool.display(), ?args, limit, "executing external tool");

        let mut child = self.spawn(args)?;
        let stdout = child.stdout.take().expect("child stdout piped");
        let stderr = child.stderr.take().expect("child stderr piped");

        let out_buf = shared_buffer(limit);
        let err_buf = shared_buffer(limit);
        let out_task = tokio::spawn(drain_into(stdout, out_buf.clone()));
        let err_task = tokio::spawn(drain_into(stderr, err_buf.clone()));

        let status = match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(waited) => waited?,
            Err(_) => {
                let _ = child.start_kill();
                let _ = child.wait().await;
                warn!(tool = %self.tool.display(), timeout = ?self.timeout, "external tool timed out");
                return Err(Error::Timeout(self.timeout));
            }
        };

        // The pipes are closed once the child exits; both drains finish.
        let _ = out_task.await;
        let _ = err_task.await;

        if !status.success() {
            let stderr = err_buf.lock().unwrap().to_string_lossy();
            return Err(Error::ProcessFailure { status, stderr });
        }

        let out = out_buf.lock().unwrap();
        if out.is_truncated() {
            warn!(limit, "stdout capture truncated at ceiling");
        }
        Ok(out.to_string_lossy())
    }

    /// Spawn with a live stdout pipe for the streaming listing pipeline.
    pub(crate) async fn spawn_streaming_impl(&self, args: &[String]) -> Result<ToolStream, Error> {
        debug!(tool = %self.tool.display(), ?args, "spawning external tool for streaming");
        let child = self.spawn(args)?;
        ToolStream::from_child(child)
    }

    /// Run with inherited stdio and no deadline. Used for downloads, where
    /// the tool's own progress output goes straight to the terminal.
    pub(crate) async fn run_passthrough_impl(
        &self,
        args: &[String],
    ) -> Result<std::process::ExitStatus, Error> {
        debug!(tool = %self.tool.display(), ?args, "running external tool with inherited stdio");
        let mut child = Command::new(&self.tool)
            .args(args)
            .spawn()
            .map_err(|source| Error::Spawn {
                tool: self.tool.display().to_string(),
                source,
            })?;
        Ok(child.wait().await?)
    }
}
