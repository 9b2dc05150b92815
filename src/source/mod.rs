//! Report source abstraction for receiving freeze reports.
//!
//! Reports reach tooling in a few ways: appended to a JSON lines file by
//! `Output::File`, pushed through an in-process channel by `Output::Channel`,
//! or streamed over TCP by `Output::Tcp`. Each has a [`ReportSource`] here.

mod channel;
mod file;
mod stream;

pub use channel::ChannelSource;
pub use file::FileSource;
pub use stream::StreamSource;

use std::fmt::Debug;

use freezewatch_types::LongEventReport;

/// Trait for receiving freeze reports from various sources.
///
/// # Example
///
/// ```
/// use freezewatch::{FileSource, ReportSource};
///
/// let mut source = FileSource::new("freezes.jsonl");
/// for report in source.poll() {
///     println!("{}ms freeze", report.duration.as_millis());
/// }
/// ```
pub trait ReportSource: Send + Debug {
    /// Return the reports that arrived since the last poll, oldest first.
    ///
    /// Never blocks.
    fn poll(&mut self) -> Vec<LongEventReport>;

    /// Human-readable description of the source.
    fn description(&self) -> &str;

    /// The problem hit during the last poll, if any.
    fn error(&self) -> Option<String>;
}
