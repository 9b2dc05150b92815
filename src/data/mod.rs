//! Report processing for the CLI.
//!
//! - [`duration`]: Parsing and formatting of duration strings (e.g., "2s", "500ms")
//! - [`summary`]: Severity classification and aggregation ([`FreezeSummary`], [`Severity`])

pub mod duration;
pub mod summary;

pub use summary::{FreezeEntry, FreezeSummary, Severity, Thresholds};
