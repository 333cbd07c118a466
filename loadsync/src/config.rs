//! loadsync configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::events::DEFAULT_CHANNEL_CAPACITY;

/// Main loadsync configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Change notification bus
    pub events: EventsConfig,

    /// Affinity thread
    pub affinity: AffinityConfig,

    /// Simulated loaders for `loadsync demo` and `loadsync stress`
    pub demo: DemoConfig,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level", skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

impl Config {
    /// Validate configuration before use
    pub fn validate(&self) -> Result<()> {
        if self.events.capacity == 0 {
            return Err(eyre::eyre!("events.capacity must be greater than zero"));
        }
        if self.affinity.thread_name.trim().is_empty() {
            return Err(eyre::eyre!("affinity.thread-name must not be empty"));
        }
        for (name, rate) in [
            ("demo.failure-rate", self.demo.failure_rate),
            ("demo.interrupt-rate", self.demo.interrupt_rate),
        ] {
            if !(0.0..=1.0).contains(&rate) {
                return Err(eyre::eyre!("{} must be between 0.0 and 1.0, got {}", name, rate));
            }
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .loadsync.yml
        let local_config = PathBuf::from(".loadsync.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/loadsync/loadsync.yml
        if let Some(user_config) = user_config_path().filter(|path| path.exists()) {
            match Self::load_from_file(&user_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only the log level, before logging is set up
    ///
    /// Errors are swallowed: a broken config file is reported later by
    /// [`Config::load`], once there is a logger to report it to.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let candidates: Vec<PathBuf> = match config_path {
            Some(path) => vec![path.clone()],
            None => std::iter::once(PathBuf::from(".loadsync.yml"))
                .chain(user_config_path())
                .collect(),
        };
        candidates
            .iter()
            .find(|path| path.exists())
            .and_then(|path| Self::load_from_file(path).ok())
            .and_then(|config| config.log_level)
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("loadsync").join("loadsync.yml"))
}

/// Change notification bus configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Broadcast channel capacity (events)
    pub capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// Affinity thread configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AffinityConfig {
    /// Name given to the affinity thread
    #[serde(rename = "thread-name")]
    pub thread_name: String,
}

impl Default for AffinityConfig {
    fn default() -> Self {
        Self {
            thread_name: "loadsync-affinity".to_string(),
        }
    }
}

/// Simulated loader configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Number of loaders started concurrently
    pub loaders: usize,

    /// Items each loader produces when nothing goes wrong
    #[serde(rename = "items-per-loader")]
    pub items_per_loader: usize,

    /// Simulated latency per item in milliseconds
    #[serde(rename = "item-delay-ms")]
    pub item_delay_ms: u64,

    /// Items between batch commits (0 disables intermediate commits)
    #[serde(rename = "commit-every")]
    pub commit_every: usize,

    /// Probability that a loader fails
    #[serde(rename = "failure-rate")]
    pub failure_rate: f64,

    /// Probability that a loader gets interrupted mid-load
    #[serde(rename = "interrupt-rate")]
    pub interrupt_rate: f64,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            loaders: 8,
            items_per_loader: 20,
            item_delay_ms: 5,
            commit_every: 5,
            failure_rate: 0.2,
            interrupt_rate: 0.1,
        }
    }
}
