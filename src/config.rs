use std::{path::Path, time::Duration};

use anyhow::Context;
use strum::IntoEnumIterator;

use crate::oracle::{Scenario, ScenarioLimits};

/// Everything a harness run is parameterised with. Read from a TOML file, every key is
/// optional.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Configuration {
    /// Path of the serial device the board is attached to
    pub port: String,
    pub baudrate: u32,
    /// Read timeout per response line
    pub timeout_ms: u64,
    pub handshake_attempts: u32,
    /// Log every frame and response line
    pub verbose: bool,
    pub log_path: String,
    pub latency_iterations: u32,
    pub latency_bound_ms: f64,
    pub elapsed_sleep_ms: u64,
    /// Run against the in-process reference device instead of `port`
    pub simulate: bool,
    /// Scenarios to run, all of them if empty
    pub scenarios: Vec<Scenario>,
}

impl Default for Configuration {
    fn default() -> Self {
        Configuration {
            port: "/dev/ttyACM0".into(),
            baudrate: 76800,
            timeout_ms: 2000,
            handshake_attempts: 10,
            verbose: false,
            log_path: "log".into(),
            latency_iterations: 100,
            latency_bound_ms: 5.0,
            elapsed_sleep_ms: 100,
            simulate: false,
            scenarios: Vec::new(),
        }
    }
}

impl Configuration {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(content)?;
        anyhow::ensure!(config.handshake_attempts > 0, "handshake_attempts must be at least 1");
        anyhow::ensure!(config.latency_iterations > 0, "latency_iterations must be at least 1");
        anyhow::ensure!(
            config.latency_bound_ms.is_finite() && config.latency_bound_ms > 0.0,
            "latency_bound_ms must be positive"
        );
        Ok(config)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn limits(&self) -> ScenarioLimits {
        ScenarioLimits {
            latency_iterations: self.latency_iterations,
            latency_bound: Duration::from_micros((self.latency_bound_ms * 1000.0).round() as u64),
            elapsed_sleep: Duration::from_millis(self.elapsed_sleep_ms),
        }
    }

    pub fn log_level(&self) -> log::LevelFilter {
        if self.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        }
    }

    pub fn selected_scenarios(&self) -> Vec<Scenario> {
        if self.scenarios.is_empty() {
            Scenario::iter().collect()
        } else {
            self.scenarios.clone()
        }
    }
}
