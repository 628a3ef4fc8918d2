//! Node configuration.
//!
//! Read from an optional TOML file, then overridden by `GALLEY__*`
//! environment variables (`GALLEY__SERVER__BIND=127.0.0.1:8080`).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use config::{Config, Environment, File};
use galley_core::GalleyError;
use galley_orders::RefreshPolicy;
use serde::Deserialize;
use thiserror::Error;

/// Default location of the configuration file, without extension.
pub const DEFAULT_CONFIG_PATH: &str = "config/galley";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(#[from] GalleyError),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GalleyConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: default_bind() }
    }
}

fn default_bind() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 3000))
}

/// Thresholds of the refresh sweep and how often the scheduler runs it.
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshConfig {
    #[serde(default = "default_threshold_secs")]
    pub pending_to_preparing_secs: u64,
    #[serde(default = "default_threshold_secs")]
    pub preparing_to_served_secs: u64,
    #[serde(default)]
    pub served_to_paid_secs: Option<u64>,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_threshold_secs() -> u64 {
    60
}

fn default_sweep_interval_secs() -> u64 {
    15
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            pending_to_preparing_secs: default_threshold_secs(),
            preparing_to_served_secs: default_threshold_secs(),
            served_to_paid_secs: None,
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl RefreshConfig {
    pub fn policy(&self) -> Result<RefreshPolicy, GalleyError> {
        RefreshPolicy::from_secs(
            self.pending_to_preparing_secs,
            self.preparing_to_served_secs,
            self.served_to_paid_secs,
        )
    }

    pub fn sweep_interval(&self) -> Result<Duration, GalleyError> {
        if self.sweep_interval_secs == 0 {
            return Err(GalleyError::validation("refresh sweep interval must be positive"));
        }
        Ok(Duration::from_secs(self.sweep_interval_secs))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogConfig {
    /// JSON catalog loaded at start-up.
    #[serde(default)]
    pub seed_path: Option<PathBuf>,
}

impl GalleyConfig {
    /// Load from `config/galley.toml` (if present) and the environment.
    pub fn load() -> Result<Self, SettingsError> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load from `path` (if present) and the environment.
    pub fn load_from(path: &str) -> Result<Self, SettingsError> {
        let settings = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("GALLEY")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: GalleyConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<(), GalleyError> {
        self.refresh.policy()?;
        self.refresh.sweep_interval()?;
        Ok(())
    }
}
