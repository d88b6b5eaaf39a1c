//! Configuration management for FocusCrush
//!
//! This module provides:
//! - `ChainConfig`: chain options, bus layout and initial parameter values,
//!   serialized as TOML
//! - `ConfigManager`: the user-level config file under the platform config
//!   directory

use crate::domain::audio::BusLayout;
use crate::domain::chain::{supports_layout, ChainOptions, SignalChain};
use crate::domain::params::{ParamError, ParamId, ParamValues, ParameterStore};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, error, info, instrument};

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur during configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Parameter error: {0}")]
    Param(#[from] ParamError),
}

/// Everything needed to build a ready-to-prepare chain
///
/// ```toml
/// [options]
/// lofi_mode = "per-channel"
/// saturation_mode = "applied"
///
/// [layout]
/// inputs = 2
/// outputs = 2
///
/// [parameters]
/// lowPassCutoff = 8000.0
/// bitDepth = 6.0
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    pub options: ChainOptions,
    pub layout: BusLayout,
    pub parameters: ParamValues,
}

impl ChainConfig {
    /// Reject layouts the chain cannot run and non-finite parameter values
    ///
    /// Out-of-range values are accepted here; the parameter store clamps
    /// them on apply.
    pub fn validate(&self) -> Result<()> {
        if !supports_layout(&self.layout) {
            return Err(ConfigError::Invalid(format!(
                "unsupported layout {} in / {} out",
                self.layout.inputs, self.layout.outputs
            )));
        }
        for id in ParamId::ALL {
            let value = self.parameters.get(id);
            if !value.is_finite() {
                return Err(ParamError::NotFinite {
                    name: id.name(),
                    value,
                }
                .into());
            }
        }
        Ok(())
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Load configuration from TOML file
    #[instrument(skip(path))]
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        let contents = fs::read_to_string(path).await?;
        let config = Self::from_toml_str(&contents)?;

        debug!("Configuration loaded successfully");
        Ok(config)
    }

    /// Save configuration to TOML file
    #[instrument(skip(self, path))]
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        info!(path = %path.display(), "Saving configuration");

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        fs::write(path, self.to_toml_string()?).await?;

        debug!("Configuration saved successfully");
        Ok(())
    }

    /// Push the configured parameter values into a live store
    pub fn apply_parameters(&self, store: &ParameterStore) -> Result<()> {
        store.apply(&self.parameters)?;
        Ok(())
    }

    /// Build an unprepared chain with its own parameter store
    pub fn into_chain(self) -> Result<SignalChain> {
        self.validate()?;

        let store = Arc::new(ParameterStore::new());
        self.apply_parameters(&store)?;

        let mut chain = SignalChain::with_options(store, self.options);
        chain
            .set_bus_layout(self.layout)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(chain)
    }
}

/// Configuration file manager
///
/// Manages the configuration file at `~/.config/focuscrush/config.toml`.
pub struct ConfigManager {
    config_dir: PathBuf,
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a manager for `config_dir/config.toml`
    pub fn new(config_dir: PathBuf) -> Self {
        let config_path = config_dir.join("config.toml");

        Self {
            config_dir,
            config_path,
        }
    }

    /// Get the default config directory path
    ///
    /// Returns `~/.config/focuscrush` on Linux, the platform equivalent
    /// elsewhere.
    pub fn default_config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|p| p.join("focuscrush"))
            .ok_or_else(|| ConfigError::Invalid("Could not determine config directory".to_string()))
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Load configuration from file
    ///
    /// A missing file yields defaults. A file that fails to parse or
    /// validate is copied to `config.toml.corrupt` and defaults are used.
    #[instrument(skip(self))]
    pub async fn load(&self) -> ChainConfig {
        if !self.config_path.exists() {
            info!(
                path = %self.config_path.display(),
                "Config file not found, using defaults"
            );
            return ChainConfig::default();
        }

        match ChainConfig::load_from_file(&self.config_path).await {
            Ok(config) => config,
            Err(e) => {
                error!(
                    path = %self.config_path.display(),
                    error = %e,
                    "Failed to load config, using defaults"
                );

                let backup_path = self.config_path.with_extension("toml.corrupt");
                if let Err(copy_err) = fs::copy(&self.config_path, &backup_path).await {
                    error!(
                        path = %backup_path.display(),
                        error = %copy_err,
                        "Failed to backup corrupt config"
                    );
                }

                ChainConfig::default()
            }
        }
    }

    #[instrument(skip(self, config))]
    pub async fn save(&self, config: &ChainConfig) -> Result<()> {
        fs::create_dir_all(&self.config_dir).await?;

        config.save_to_file(&self.config_path).await
    }

    pub fn exists(&self) -> bool {
        self.config_path.exists()
    }
}
