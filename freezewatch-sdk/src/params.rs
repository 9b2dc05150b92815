//! Monitor configuration.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Configuration for an [`EventLoopMonitor`](crate::EventLoopMonitor).
///
/// All thresholds are in milliseconds. Values are usually loaded by an
/// outer preferences layer (see the `freezewatch` CLI, which reads them
/// with the `config` crate) and handed to `EventLoopMonitor::start`.
///
/// # Example
///
/// ```rust
/// use freezewatch_sdk::MonitorParameters;
///
/// let params = MonitorParameters::builder()
///     .logging_threshold_ms(300)
///     .sampling_threshold_ms(200)
///     .max_stack_samples(5)
///     .filter_traces("app.Shell.readAndDispatch, app.Dialog.run")
///     .build();
///
/// assert!(params.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorParameters {
    /// Events lasting at least this long are reported.
    pub logging_threshold_ms: u64,

    /// Stack sampling starts once an event has run this long.
    pub sampling_threshold_ms: u64,

    /// Minimum delay between two stack samples.
    pub polling_delay_ms: u64,

    /// Maximum number of samples attached to a single report.
    pub max_stack_samples: usize,

    /// An event still running after this long is reported as a possible deadlock.
    pub deadlock_threshold_ms: u64,

    /// Capture every known thread, not just the GUI thread.
    pub dump_all_threads: bool,

    /// Deliver reports to the local tracing logger.
    pub log_locally: bool,

    /// Comma-separated `class.method` entries. A report whose GUI thread
    /// top frame matches one of them is suppressed.
    pub filter_traces: String,

    /// Comma-separated `class.method` entries. With `dump_all_threads`,
    /// non-GUI threads whose top frame matches are left out of samples.
    pub idle_thread_filter: String,

    /// Comma-separated `class.method` entries for native dispatch frames.
    /// When the GUI top frame is one of these, filters match the frame
    /// beneath it instead.
    pub dispatch_shims: String,
}

impl Default for MonitorParameters {
    fn default() -> Self {
        Self {
            logging_threshold_ms: 500,
            sampling_threshold_ms: 300,
            polling_delay_ms: 150,
            max_stack_samples: 3,
            deadlock_threshold_ms: 300_000,
            dump_all_threads: false,
            log_locally: true,
            filter_traces: String::new(),
            idle_thread_filter: String::new(),
            dispatch_shims: String::new(),
        }
    }
}

impl MonitorParameters {
    pub fn builder() -> MonitorParametersBuilder {
        MonitorParametersBuilder::default()
    }

    /// Check that every threshold and count is positive and that sampling
    /// starts no later than logging.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("logging threshold", self.logging_threshold_ms),
            ("sampling threshold", self.sampling_threshold_ms),
            ("polling delay", self.polling_delay_ms),
            ("max stack samples", self.max_stack_samples as u64),
            ("deadlock threshold", self.deadlock_threshold_ms),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::NotPositive { field });
            }
        }

        if self.sampling_threshold_ms > self.logging_threshold_ms {
            return Err(ConfigError::SamplingAfterLogging {
                sampling_ms: self.sampling_threshold_ms,
                logging_ms: self.logging_threshold_ms,
            });
        }

        Ok(())
    }
}

/// Builder for [`MonitorParameters`], starting from the defaults.
#[derive(Debug, Default)]
pub struct MonitorParametersBuilder {
    params: MonitorParameters,
}

impl MonitorParametersBuilder {
    pub fn logging_threshold_ms(mut self, ms: u64) -> Self {
        self.params.logging_threshold_ms = ms;
        self
    }

    pub fn sampling_threshold_ms(mut self, ms: u64) -> Self {
        self.params.sampling_threshold_ms = ms;
        self
    }

    pub fn polling_delay_ms(mut self, ms: u64) -> Self {
        self.params.polling_delay_ms = ms;
        self
    }

    pub fn max_stack_samples(mut self, count: usize) -> Self {
        self.params.max_stack_samples = count;
        self
    }

    pub fn deadlock_threshold_ms(mut self, ms: u64) -> Self {
        self.params.deadlock_threshold_ms = ms;
        self
    }

    pub fn dump_all_threads(mut self, enabled: bool) -> Self {
        self.params.dump_all_threads = enabled;
        self
    }

    pub fn log_locally(mut self, enabled: bool) -> Self {
        self.params.log_locally = enabled;
        self
    }

    pub fn filter_traces(mut self, filters: impl Into<String>) -> Self {
        self.params.filter_traces = filters.into();
        self
    }

    pub fn idle_thread_filter(mut self, filters: impl Into<String>) -> Self {
        self.params.idle_thread_filter = filters.into();
        self
    }

    pub fn dispatch_shims(mut self, shims: impl Into<String>) -> Self {
        self.params.dispatch_shims = shims.into();
        self
    }

    /// Build without validating; `EventLoopMonitor::start` validates.
    pub fn build(self) -> MonitorParameters {
        self.params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(MonitorParameters::default().validate().is_ok());
    }

    #[test]
    fn zero_values_are_rejected() {
        let cases = [
            (MonitorParameters::builder().logging_threshold_ms(0), "logging threshold"),
            (MonitorParameters::builder().sampling_threshold_ms(0), "sampling threshold"),
            (MonitorParameters::builder().polling_delay_ms(0), "polling delay"),
            (MonitorParameters::builder().max_stack_samples(0), "max stack samples"),
            (MonitorParameters::builder().deadlock_threshold_ms(0), "deadlock threshold"),
        ];

        for (builder, field) in cases {
            assert_eq!(
                builder.build().validate(),
                Err(ConfigError::NotPositive { field })
            );
        }
    }

    #[test]
    fn sampling_after_logging_is_rejected() {
        let params = MonitorParameters::builder()
            .logging_threshold_ms(100)
            .sampling_threshold_ms(101)
            .build();

        assert_eq!(
            params.validate(),
            Err(ConfigError::SamplingAfterLogging {
                sampling_ms: 101,
                logging_ms: 100
            })
        );
    }

    #[test]
    fn sampling_equal_to_logging_is_allowed() {
        let params = MonitorParameters::builder()
            .logging_threshold_ms(100)
            .sampling_threshold_ms(100)
            .build();

        assert!(params.validate().is_ok());
    }

    #[test]
    fn deserialize_fills_missing_fields_with_defaults() {
        let params: MonitorParameters =
            serde_json::from_str(r#"{"logging_threshold_ms": 900, "dump_all_threads": true}"#)
                .unwrap();

        assert_eq!(params.logging_threshold_ms, 900);
        assert!(params.dump_all_threads);
        assert_eq!(params.max_stack_samples, 3);
        assert!(params.log_locally);
    }

    #[test]
    fn error_messages_name_the_field() {
        let err = MonitorParameters::builder()
            .polling_delay_ms(0)
            .build()
            .validate()
            .unwrap_err();

        assert_eq!(err.to_string(), "polling delay must be greater than zero");
    }
}
