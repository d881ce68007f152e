use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::breath::BreathThresholds;
use crate::entry::EntrySettings;

/// Main configuration structure for the NaviCue engine
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Entry choreography tunables
    pub entry: EntryConfig,
    /// Stage lifecycle tunables
    pub stages: StagesConfig,
    /// Observability settings
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EntryConfig {
    /// Minimum reveal phase for timed patterns
    pub reveal_floor_ms: u64,
    /// Breath cycle detection thresholds
    pub breath: BreathThresholds,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StagesConfig {
    /// Delay between a compound trigger and the resonant stage
    pub resonance_delay_ms: u64,
    /// Delay between resonance and afterglow
    pub afterglow_delay_ms: u64,
    /// Sampling cadence for signal-threshold stages (one animation frame)
    pub frame_interval_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level used when RUST_LOG is not set
    pub log_level: String,
    /// Emit JSON log lines
    pub json_logs: bool,
}

impl Default for EntryConfig {
    fn default() -> Self {
        Self {
            reveal_floor_ms: 800,
            breath: BreathThresholds::default(),
        }
    }
}

impl Default for StagesConfig {
    fn default() -> Self {
        Self {
            resonance_delay_ms: 1500,
            afterglow_delay_ms: 5000,
            frame_interval_ms: 16,
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            entry: EntryConfig::default(),
            stages: StagesConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl EntryConfig {
    pub fn settings(&self) -> EntrySettings {
        EntrySettings {
            reveal_floor: Duration::from_millis(self.reveal_floor_ms),
            breath: self.breath,
        }
    }
}

impl StagesConfig {
    pub fn resonance_delay(&self) -> Duration {
        Duration::from_millis(self.resonance_delay_ms)
    }

    pub fn afterglow_delay(&self) -> Duration {
        Duration::from_millis(self.afterglow_delay_ms)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}

impl EngineConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration file (navicue.toml)
    /// 3. Environment variables (NAVICUE__ENTRY__REVEAL_FLOOR_MS and friends)
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("navicue.toml"))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&EngineConfig::default())?);

        if path.exists() {
            builder = builder.add_source(File::from(path));
        }

        builder = builder.add_source(
            Environment::with_prefix("NAVICUE")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: EngineConfig = builder.build()?.try_deserialize()?;
        config.entry.breath.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}
