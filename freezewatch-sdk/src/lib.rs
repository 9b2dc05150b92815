//! # freezewatch-sdk
//!
//! Watchdog for GUI event loops. Reports events that keep the UI thread busy
//! long enough for users to notice, with stack samples taken while they ran.
//!
//! The host loop fires four hooks (dispatch begin/end, enter/exit idle). A
//! background thread notices when an event runs past a threshold, samples
//! the GUI thread's stack at intervals and, once the event completes, hands
//! a [`LongEventReport`] to every registered [`EventLogger`].
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use freezewatch_sdk::{EventLoopMonitor, ListenerSet, MonitorParameters, Output, ThreadRegistry};
//!
//! // The host loop embeds a ListenerSet and fires it around every event
//! let listeners = Arc::new(ListenerSet::new());
//!
//! // Threads publish their stacks through a registry
//! let registry = Arc::new(ThreadRegistry::new());
//! let gui = registry.register_current();
//!
//! let params = MonitorParameters::builder()
//!     .logging_threshold_ms(500)
//!     .filter_traces("app.Dialog.run")
//!     .build();
//!
//! let mut monitor =
//!     EventLoopMonitor::start(params, listeners.clone(), registry.clone(), gui.id()).unwrap();
//! monitor.add_logger(Arc::new(Output::file("freezes.jsonl")));
//!
//! listeners.fire_exit_idle();
//! listeners.fire_dispatch_begin();
//! {
//!     let _frame = gui.enter("app.Editor", "reflow");
//!     // ... handle the event ...
//! }
//! listeners.fire_dispatch_end();
//! listeners.fire_enter_idle();
//!
//! monitor.shutdown().unwrap();
//! # let _ = std::fs::remove_file("freezes.jsonl");
//! ```
//!
//! ## Features
//!
//! - **Non-blocking hooks**: The GUI thread only touches atomics
//! - **Bounded sampling**: Samples are evenly thinned, never unbounded
//! - **Deadlock detection**: A still-running event is reported once per stretch
//! - **Filters**: Suppress reports for known benign blocking calls
//! - **Isolated loggers**: A logger that fails is dropped, the monitor keeps going

mod decimate;
mod error;
mod filter;
mod listener;
mod logger;
mod monitor;
mod output;
mod params;
mod poller;
mod sampler;
mod state;

pub use decimate::decimate;
pub use error::{ConfigError, LoggerError, MonitorError, SampleError};
pub use filter::{FilterRule, FilterSet};
pub use listener::{EventDispatcher, EventLoopListener, ListenerId, ListenerSet};
pub use logger::{EventLogger, LoggerId, LoggerSet};
pub use monitor::{EventLoopMonitor, MONITOR_THREAD_NAME};
pub use output::{format_report, format_report_utc, Output};
pub use params::{MonitorParameters, MonitorParametersBuilder};
pub use sampler::{FrameGuard, LockGuard, StackSampler, ThreadProbe, ThreadRegistry};

// Re-export types for convenience
pub use freezewatch_types::{
    LockInfo, LongEventReport, Milliseconds, StackFrame, StackSample, ThreadStack, ThreadState,
};
