//! Error types for the freeze monitor.

use thiserror::Error;

/// Invalid monitor configuration. The monitor never starts with one of these.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A threshold, delay or count was zero.
    #[error("{field} must be greater than zero")]
    NotPositive { field: &'static str },

    /// Sampling would start after the event is already being logged.
    #[error("sampling threshold ({sampling_ms}ms) must not exceed logging threshold ({logging_ms}ms)")]
    SamplingAfterLogging { sampling_ms: u64, logging_ms: u64 },

    /// A filter entry could not be parsed as `class.method`.
    #[error("invalid filter entry '{0}': expected class.method")]
    InvalidFilter(String),
}

/// Errors returned by [`EventLoopMonitor`](crate::EventLoopMonitor) operations.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("invalid monitor configuration: {0}")]
    Config(#[from] ConfigError),

    /// Spawning the background thread failed.
    #[error("failed to spawn monitor thread: {0}")]
    Spawn(#[from] std::io::Error),

    /// `start`/`shutdown` must run on the GUI thread.
    #[error("operation must be called from the GUI thread")]
    WrongThread,

    /// The background thread panicked before it could be joined.
    #[error("monitor thread panicked")]
    ThreadPanicked,
}

/// Failure to capture a stack sample.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SampleError {
    /// The thread is gone (for the GUI thread: its display was disposed).
    #[error("thread {0} is no longer alive")]
    ThreadGone(u64),

    /// The sampler does not know this thread.
    #[error("unknown thread {0}")]
    UnknownThread(u64),

    #[error("stack capture failed: {0}")]
    Capture(String),
}

/// Failure reported by an [`EventLogger`](crate::EventLogger).
#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The receiving side of a channel output went away.
    #[error("receiver closed")]
    Closed,

    #[error("{0}")]
    Other(String),
}
