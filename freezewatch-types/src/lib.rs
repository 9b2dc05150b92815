//! # freezewatch-types
//!
//! Core types for UI freeze reports. This crate defines the schema that a
//! freeze monitor emits when a GUI event loop stops returning to idle, and
//! that loggers, log files and tooling consume.
//!
//! ## Design Goals
//!
//! - **Zero required dependencies**: Core types work without any serialization framework
//! - **Optional serialization**: Enable `serde` as needed
//! - **Toolkit agnostic**: Frames are plain `class.method` pairs, whatever the GUI stack
//! - **Versioned schema**: Reports include version info for forward compatibility
//! - **Ergonomic builders**: Fluent API for constructing reports in tests and tools
//!
//! ## Features
//!
//! - `std` (default): Standard library support
//! - `serde`: JSON/etc. serialization via serde
//! - `all`: Enable all serialization formats
//!
//! ## Example
//!
//! ```rust
//! use freezewatch_types::{LongEventReport, StackFrame, ThreadStack, ThreadState};
//!
//! let report = LongEventReport::builder()
//!     .start_time_ms(1_703_160_000_000)
//!     .duration_ms(1_250)
//!     .sample(1_703_160_000_400, |s| {
//!         s.thread(
//!             ThreadStack::new(1, "main")
//!                 .state(ThreadState::Runnable)
//!                 .frame(StackFrame::new("app.Editor", "reflow"))
//!                 .frame(StackFrame::new("app.Shell", "dispatch")),
//!         )
//!     })
//!     .build();
//!
//! assert_eq!(report.samples.len(), 1);
//! assert!(!report.still_running);
//! ```
//!
//! ## Schema Version
//!
//! The current schema version is **1**. The version is included in serialized
//! reports to allow consumers to handle format evolution gracefully.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod duration;
mod report;
mod stack;
mod version;

pub use duration::*;
pub use report::*;
pub use stack::*;
pub use version::*;

/// Current schema version.
///
/// Increment this when making breaking changes to the report format.
/// Consumers should check this version and handle older formats appropriately.
pub const SCHEMA_VERSION: u32 = 1;
