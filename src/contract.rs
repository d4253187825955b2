//! Invocation contract between the client and the external tool.
//!
//! The client talks to the tool exclusively through [`Invoke`], so tests can
//! substitute canned output (via the generated mock) for the real
//! subprocess runner.

use async_trait::async_trait;

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

use crate::error::Error;
use crate::runner::{ProcessRunner, ToolStream};

/// The three invocation shapes the client needs: bounded capture, live
/// streaming, and passthrough (inherited stdio, used for downloads).
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Invoke: Send + Sync {
    /// Run to completion under the deadline; stdout and stderr each capped
    /// at `limit` bytes. Returns the captured stdout text.
    async fn run_capture(&self, args: Vec<String>, limit: usize) -> Result<String, Error>;

    /// Spawn with a live stdout pipe for line-by-line consumption.
    async fn spawn_streaming(&self, args: Vec<String>) -> Result<ToolStream, Error>;

    /// Run with inherited stdio and no deadline, returning the exit status.
    async fn run_passthrough(&self, args: Vec<String>) -> Result<std::process::ExitStatus, Error>;
}

#[async_trait]
impl Invoke for ProcessRunner {
    async fn run_capture(&self, args: Vec<String>, limit: usize) -> Result<String, Error> {
        self.run_capture_impl(&args, limit).await
    }

    async fn spawn_streaming(&self, args: Vec<String>) -> Result<ToolStream, Error> {
        self.spawn_streaming_impl(&args).await
    }

    async fn run_passthrough(&self, args: Vec<String>) -> Result<std::process::ExitStatus, Error> {
        self.run_passthrough_impl(&args).await
    }
}
