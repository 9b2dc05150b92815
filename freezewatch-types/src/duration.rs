//! Duration representation for serialization.
//!
//! Freeze reports use milliseconds as the canonical unit: event loop
//! thresholds are configured in milliseconds and finer resolution carries
//! no diagnostic value.

use core::time::Duration;

/// Duration in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Milliseconds(pub u64);

impl Milliseconds {
    /// Create from milliseconds.
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Create from seconds.
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs * 1000)
    }

    /// Get the value in milliseconds.
    pub const fn as_millis(&self) -> u64 {
        self.0
    }

    /// Get the value in seconds (truncated).
    pub const fn as_secs(&self) -> u64 {
        self.0 / 1000
    }

    /// Get the value in fractional seconds.
    pub fn as_secs_f64(&self) -> f64 {
        self.0 as f64 / 1000.0
    }

    /// Convert to a standard Duration.
    pub const fn to_duration(&self) -> Duration {
        Duration::from_millis(self.0)
    }
}

impl From<Duration> for Milliseconds {
    fn from(d: Duration) -> Self {
        Self(d.as_millis() as u64)
    }
}

impl From<Milliseconds> for Duration {
    fn from(m: Milliseconds) -> Self {
        Duration::from_millis(m.0)
    }
}
