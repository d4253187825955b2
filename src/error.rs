use std::process::ExitStatus;
use std::time::Duration;

use thiserror::Error;

/// Failure taxonomy for driving the external tool.
///
/// Process- and transport-layer failures (`Timeout`, `ProcessFailure`,
/// `CallbackFailed`) are surfaced to callers with enough context to diagnose
/// without re-running at higher verbosity. Parse-layer failures
/// (`UnparsableSize`) are recovered locally by the parsers and never abort a
/// surrounding operation.
#[derive(Debug, Error)]
pub enum Error {
    /// The external tool did not exit before the deadline. The child is
    /// killed before this is returned, so no process outlives the call.
    #[error("external tool timed out after {0:?}")]
    Timeout(Duration),

    /// The external tool exited non-zero. Carries the bounded stderr capture.
    #[error("external tool failed ({status}): {}", .stderr.trim_end())]
    ProcessFailure { status: ExitStatus, stderr: String },

    /// The external tool binary could not be launched at all.
    #[error("failed to launch external tool `{tool}`: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    /// A size token matched none of the accepted formats. Callers treat the
    /// value as unknown and default to zero.
    #[error("unable to parse size token `{0}`")]
    UnparsableSize(String),

    /// A caller-supplied per-record or per-page handler returned an error;
    /// the stream was aborted immediately.
    #[error("record callback failed: {0}")]
    CallbackFailed(#[source] anyhow::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
