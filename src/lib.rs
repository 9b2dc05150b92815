//! # freezewatch
//!
//! Command-line tool and library for working with UI freeze reports.
//!
//! Reports are produced by `freezewatch-sdk`'s `EventLoopMonitor` whenever
//! a GUI event loop stays busy past its logging threshold. This crate reads
//! them back, classifies them and can drive a monitor with a scripted loop.
//!
//! ## Architecture
//!
//! ```text
//!  EventLoopMonitor ──▶ Output::File ───▶ FileSource ──┐
//!                   ──▶ Output::Tcp ────▶ StreamSource ├──▶ FreezeSummary ──▶ inspect / export
//!                   ──▶ Output::Channel ▶ ChannelSource┘
//! ```
//!
//! - **[`source`]**: The [`ReportSource`] trait with file, stream and channel implementations
//! - **[`data`]**: Duration parsing and severity classification ([`FreezeSummary`])
//! - **[`settings`]**: Layered configuration with the `config` crate
//! - **[`simulate`]**: A scripted GUI loop ([`Scenario`]) driving a real monitor
//!
//! ## Usage
//!
//! ```bash
//! # Summarize a report log
//! freezewatch inspect freezes.jsonl
//!
//! # Keep printing reports as they are appended
//! freezewatch inspect freezes.jsonl --follow
//!
//! # Receive reports from Output::Tcp
//! freezewatch listen 127.0.0.1:7878
//!
//! # Play a scenario against a live monitor
//! freezewatch simulate --config demos/monitor.toml
//! ```
//!
//! ### As a library
//!
//! ```
//! use freezewatch::{FreezeSummary, Thresholds};
//! use freezewatch_types::LongEventReport;
//!
//! let reports = vec![LongEventReport::builder().start_time_ms(1).duration_ms(2_500).build()];
//! let summary = FreezeSummary::from_reports(reports, &Thresholds::default());
//! assert_eq!(summary.len(), 1);
//! ```

pub mod data;
pub mod settings;
pub mod simulate;
pub mod source;

pub use data::{FreezeEntry, FreezeSummary, Severity, Thresholds};
pub use settings::{OutputSettings, Settings};
pub use simulate::{Scenario, Step};
pub use source::{ChannelSource, FileSource, ReportSource, StreamSource};
