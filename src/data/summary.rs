//! Freeze report classification and aggregation.
//!
//! Turns a list of raw reports into severity-annotated entries plus the
//! aggregate numbers `inspect` and `export` print.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use freezewatch_types::LongEventReport;
use serde::{Deserialize, Serialize};

use super::duration::{deserialize_duration, format_duration};
use crate::source::FileSource;

/// Thresholds for severity classification.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Events at least this long are freezes rather than delays.
    #[serde(deserialize_with = "deserialize_duration")]
    pub freeze: Duration,
    /// Events at least this long count as deadlocks even if they completed.
    #[serde(deserialize_with = "deserialize_duration")]
    pub deadlock: Duration,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            freeze: Duration::from_secs(2),
            deadlock: Duration::from_secs(10),
        }
    }
}

/// How bad a reported event was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Severity {
    /// Noticeable, but under the freeze threshold.
    Delay,
    Freeze,
    /// Still running when reported, or over the deadlock threshold.
    Deadlock,
}

impl Severity {
    /// Classify a report against `thresholds`.
    pub fn of(report: &LongEventReport, thresholds: &Thresholds) -> Self {
        let duration = report.duration.to_duration();
        if report.still_running || duration >= thresholds.deadlock {
            Severity::Deadlock
        } else if duration >= thresholds.freeze {
            Severity::Freeze
        } else {
            Severity::Delay
        }
    }

    /// Returns a short symbol for display.
    pub fn symbol(&self) -> &'static str {
        match self {
            Severity::Delay => "DELAY",
            Severity::Freeze => "FREEZE",
            Severity::Deadlock => "DEADLOCK",
        }
    }
}

/// One classified report.
#[derive(Debug, Clone)]
pub struct FreezeEntry {
    pub report: LongEventReport,
    pub severity: Severity,
    /// `class.method` of the GUI thread's top frame in the first sample.
    pub top_frame: Option<String>,
}

impl FreezeEntry {
    fn new(report: LongEventReport, thresholds: &Thresholds) -> Self {
        let severity = Severity::of(&report, thresholds);
        let top_frame = report
            .gui_stacks()
            .find_map(|stack| stack.top_frame())
            .map(|frame| format!("{}.{}", frame.class_name, frame.method_name));
        Self {
            report,
            severity,
            top_frame,
        }
    }
}

/// Classified reports, worst first, with aggregate statistics.
#[derive(Debug, Clone)]
pub struct FreezeSummary {
    pub entries: Vec<FreezeEntry>,
    pub thresholds: Thresholds,
}

impl FreezeSummary {
    /// Load every report from a JSON lines file.
    pub fn load(path: &Path, thresholds: &Thresholds) -> Result<Self> {
        let reports = FileSource::read_all(path)?;
        Ok(Self::from_reports(reports, thresholds))
    }

    pub fn from_reports(reports: Vec<LongEventReport>, thresholds: &Thresholds) -> Self {
        let mut entries: Vec<FreezeEntry> = reports
            .into_iter()
            .map(|report| FreezeEntry::new(report, thresholds))
            .collect();

        // Worst first, then longest, then oldest
        entries.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then_with(|| b.report.duration.cmp(&a.report.duration))
                .then_with(|| a.report.start_time_ms.cmp(&b.report.start_time_ms))
        });

        Self {
            entries,
            thresholds: thresholds.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.entries.iter().filter(|e| e.severity == severity).count()
    }

    /// Total time the UI was unresponsive across all reports.
    pub fn total_blocked(&self) -> Duration {
        self.entries
            .iter()
            .map(|e| e.report.duration.to_duration())
            .sum()
    }

    pub fn longest(&self) -> Option<&FreezeEntry> {
        self.entries.iter().max_by_key(|e| e.report.duration)
    }

    /// GUI top frames ranked by how many reports they appear in.
    pub fn hotspots(&self) -> Vec<(String, usize)> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for entry in &self.entries {
            if let Some(frame) = &entry.top_frame {
                *counts.entry(frame).or_default() += 1;
            }
        }

        let mut ranked: Vec<(String, usize)> = counts
            .into_iter()
            .map(|(frame, count)| (frame.to_string(), count))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked
    }

    /// Build the JSON document written by `freezewatch export`.
    pub fn to_export_json(&self) -> serde_json::Value {
        let reports: Vec<serde_json::Value> = self
            .entries
            .iter()
            .map(|e| {
                serde_json::json!({
                    "start_time_ms": e.report.start_time_ms,
                    "duration_ms": e.report.duration.as_millis(),
                    "still_running": e.report.still_running,
                    "severity": e.severity,
                    "top_frame": e.top_frame,
                    "samples": e.report.samples.len(),
                })
            })
            .collect();

        let hotspots: Vec<serde_json::Value> = self
            .hotspots()
            .into_iter()
            .map(|(frame, count)| serde_json::json!({ "frame": frame, "reports": count }))
            .collect();

        serde_json::json!({
            "summary": {
                "total_reports": self.len(),
                "delays": self.count(Severity::Delay),
                "freezes": self.count(Severity::Freeze),
                "deadlocks": self.count(Severity::Deadlock),
                "total_blocked_ms": self.total_blocked().as_millis() as u64,
                "longest_ms": self.longest().map(|e| e.report.duration.as_millis()),
            },
            "thresholds": {
                "freeze": format_duration(self.thresholds.freeze),
                "deadlock": format_duration(self.thresholds.deadlock),
            },
            "hotspots": hotspots,
            "reports": reports,
        })
    }
}
