//! Layered configuration for the CLI.
//!
//! Settings come from an optional TOML/YAML/JSON file, then from
//! `FREEZEWATCH_*` environment variables (`__` separates nested keys, e.g.
//! `FREEZEWATCH_MONITOR__LOGGING_THRESHOLD_MS=800`).
//!
//! ```toml
//! [monitor]
//! logging_threshold_ms = 500
//! filter_traces = "app.Dialog.run"
//!
//! [thresholds]
//! freeze = "2s"
//! deadlock = "10s"
//!
//! [[scenario.steps]]
//! kind = "dispatch"
//! method = "app.Editor.reflow"
//! duration = "900ms"
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use freezewatch_sdk::MonitorParameters;
use serde::Deserialize;

use crate::data::Thresholds;
use crate::simulate::Scenario;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub monitor: MonitorParameters,
    pub thresholds: Thresholds,
    pub scenario: Scenario,
    pub outputs: OutputSettings,
}

/// Extra destinations for reports produced by `simulate`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    /// Append reports as JSON lines.
    pub file: Option<PathBuf>,
    /// Send reports to a `freezewatch listen` endpoint.
    pub tcp: Option<String>,
}

impl Settings {
    /// Load settings from `path` (if given) layered under the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        let config = builder
            .add_source(
                Environment::with_prefix("FREEZEWATCH")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("loading configuration")?;

        let settings: Settings = config
            .try_deserialize()
            .context("invalid configuration")?;
        settings.monitor.validate().context("invalid [monitor] section")?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults_without_a_file() {
        let settings = Settings::load(None).unwrap();
        assert_eq!(settings.monitor.logging_threshold_ms, 500);
        assert_eq!(settings.thresholds, Thresholds::default());
        assert!(settings.outputs.file.is_none());
    }

    #[test]
    fn file_values_override_defaults() {
        let file = write_config(
            r#"
            [monitor]
            logging_threshold_ms = 800
            sampling_threshold_ms = 400
            filter_traces = "app.Dialog.run"

            [thresholds]
            freeze = "1500ms"

            [outputs]
            file = "freezes.jsonl"

            [scenario]
            name = "typing"

            [[scenario.steps]]
            kind = "dispatch"
            method = "app.Editor.keystroke"
            duration = 5
            "#,
        );

        let settings = Settings::load(Some(file.path())).unwrap();
        assert_eq!(settings.monitor.logging_threshold_ms, 800);
        assert_eq!(settings.monitor.polling_delay_ms, 150);
        assert_eq!(settings.monitor.filter_traces, "app.Dialog.run");
        assert_eq!(settings.thresholds.freeze, Duration::from_millis(1_500));
        assert_eq!(settings.outputs.file, Some(PathBuf::from("freezes.jsonl")));
        assert_eq!(settings.scenario.name, "typing");
        assert_eq!(settings.scenario.steps.len(), 1);
    }

    #[test]
    fn invalid_monitor_section_is_rejected() {
        let file = write_config(
            r#"
            [monitor]
            logging_threshold_ms = 100
            sampling_threshold_ms = 200
            "#,
        );

        let err = Settings::load(Some(file.path())).unwrap_err();
        assert!(format!("{:#}", err).contains("sampling threshold"));
    }

    #[test]
    fn environment_overrides_file() {
        std::env::set_var("FREEZEWATCH_MONITOR__MAX_STACK_SAMPLES", "7");
        let settings = Settings::load(None);
        std::env::remove_var("FREEZEWATCH_MONITOR__MAX_STACK_SAMPLES");

        assert_eq!(settings.unwrap().monitor.max_stack_samples, 7);
    }
}
