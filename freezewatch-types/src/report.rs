//! LongEventReport - what a freeze monitor emits for one blocked stretch.

use alloc::vec::Vec;

use crate::{Milliseconds, SchemaVersion, ThreadStack};

/// Stacks captured at one instant while the event loop was blocked.
///
/// The GUI thread's stack is always at index 0 of `threads`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StackSample {
    /// Unix timestamp in milliseconds when the sample was taken.
    pub timestamp_ms: u64,

    pub threads: Vec<ThreadStack>,
}

impl StackSample {
    pub fn new(timestamp_ms: u64, threads: Vec<ThreadStack>) -> Self {
        Self {
            timestamp_ms,
            threads,
        }
    }

    /// The GUI thread's stack.
    pub fn gui_thread(&self) -> Option<&ThreadStack> {
        self.threads.first()
    }
}

/// A report describing one period during which the GUI thread failed to
/// return to its event loop within the logging threshold.
///
/// # Example
///
/// ```rust
/// use freezewatch_types::LongEventReport;
///
/// let report = LongEventReport::builder()
///     .start_time_ms(1_000)
///     .duration_ms(750)
///     .build();
///
/// assert_eq!(report.end_time_ms(), 1_750);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LongEventReport {
    /// Schema version for forward compatibility.
    #[cfg_attr(feature = "serde", serde(default))]
    pub version: SchemaVersion,

    /// Unix timestamp in milliseconds when the blocked work started.
    pub start_time_ms: u64,

    /// Total time the GUI thread was unresponsive.
    pub duration: Milliseconds,

    /// Samples in the order they were captured.
    #[cfg_attr(feature = "serde", serde(default))]
    pub samples: Vec<StackSample>,

    /// `true` when the report was emitted while the GUI thread was still
    /// blocked (a possible deadlock).
    #[cfg_attr(feature = "serde", serde(default))]
    pub still_running: bool,
}

impl LongEventReport {
    /// Create a report with no samples.
    pub fn new(start_time_ms: u64, duration: Milliseconds, still_running: bool) -> Self {
        Self {
            version: SchemaVersion::current(),
            start_time_ms,
            duration,
            samples: Vec::new(),
            still_running,
        }
    }

    pub fn builder() -> LongEventReportBuilder {
        LongEventReportBuilder::new()
    }

    /// Unix timestamp in milliseconds at which the event ended (or at which
    /// a still-running report was produced).
    pub fn end_time_ms(&self) -> u64 {
        self.start_time_ms + self.duration.as_millis()
    }

    /// Number of samples attached to the report.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Iterate over the GUI thread stacks of every sample.
    pub fn gui_stacks(&self) -> impl Iterator<Item = &ThreadStack> {
        self.samples.iter().filter_map(|s| s.gui_thread())
    }
}

/// Builder for constructing `LongEventReport` instances.
#[derive(Debug, Default)]
pub struct LongEventReportBuilder {
    start_time_ms: u64,
    duration: Milliseconds,
    samples: Vec<StackSample>,
    still_running: bool,
}

impl LongEventReportBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_time_ms(mut self, ts: u64) -> Self {
        self.start_time_ms = ts;
        self
    }

    pub fn duration_ms(mut self, millis: u64) -> Self {
        self.duration = Milliseconds::from_millis(millis);
        self
    }

    pub fn still_running(mut self, still_running: bool) -> Self {
        self.still_running = still_running;
        self
    }

    /// Add a sample whose thread stacks are built using a closure.
    pub fn sample<F>(mut self, timestamp_ms: u64, f: F) -> Self
    where
        F: FnOnce(StackSampleBuilder) -> StackSampleBuilder,
    {
        let sample = f(StackSampleBuilder::new(timestamp_ms)).build();
        self.samples.push(sample);
        self
    }

    pub fn stack_sample(mut self, sample: StackSample) -> Self {
        self.samples.push(sample);
        self
    }

    pub fn build(self) -> LongEventReport {
        LongEventReport {
            version: SchemaVersion::current(),
            start_time_ms: self.start_time_ms,
            duration: self.duration,
            samples: self.samples,
            still_running: self.still_running,
        }
    }
}

/// Builder for a single [`StackSample`].
#[derive(Debug)]
pub struct StackSampleBuilder {
    timestamp_ms: u64,
    threads: Vec<ThreadStack>,
}

impl StackSampleBuilder {
    fn new(timestamp_ms: u64) -> Self {
        Self {
            timestamp_ms,
            threads: Vec::new(),
        }
    }

    /// Add a thread stack. The first one added is the GUI thread.
    pub fn thread(mut self, stack: ThreadStack) -> Self {
        self.threads.push(stack);
        self
    }

    fn build(self) -> StackSample {
        StackSample::new(self.timestamp_ms, self.threads)
    }
}
