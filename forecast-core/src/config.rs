use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{
    payload::FieldSet,
    pipeline::PipelineSettings,
    prediction::ModelId,
    retrieval::RetryPolicy,
    window::{DEFAULT_LOOKBACK_DAYS, MAX_LOOKBACK_DAYS},
};

const DEFAULT_SERVICE_URL: &str = "http://localhost:8000";

/// Where observation CSV files come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Base URL of the static-file endpoint (`{base_url}/data/{file}`).
    pub base_url: String,

    /// Read files from this directory instead of the endpoint.
    pub data_dir: Option<PathBuf>,

    /// File used for monthly charts.
    pub raw_file: String,

    /// File used for prediction windows.
    pub processed_file: String,

    pub max_attempts: u32,
    pub retry_delay_ms: u64,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_SERVICE_URL.to_string(),
            data_dir: None,
            raw_file: "weatherAUS.csv".to_string(),
            processed_file: "weatherAUS_processed.csv".to_string(),
            max_attempts: 3,
            retry_delay_ms: 250,
        }
    }
}

impl DataConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            delay: Duration::from_millis(self.retry_delay_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictionConfig {
    pub base_url: String,

    /// Model id, e.g. "linear", "ridge" or "lasso".
    pub default_model: Option<String>,

    pub lookback_days: u32,

    pub skip_empty_window: bool,

    /// Example TOML:
    /// fields = ["MinTemp", "MaxTemp", "Rainfall"]
    pub fields: FieldSet,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_SERVICE_URL.to_string(),
            default_model: None,
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            skip_empty_window: true,
            fields: FieldSet::default(),
        }
    }
}

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub data: DataConfig,
    pub prediction: PredictionConfig,
}

impl Config {
    /// The configured default model, or `linear` if none is set.
    pub fn default_model_id(&self) -> Result<ModelId> {
        match self.prediction.default_model.as_deref() {
            Some(s) => ModelId::try_from(s).with_context(|| {
                "Invalid default model in configuration.\n\
                 Hint: run `forecast configure --model <linear|ridge|lasso>`."
            }),
            None => Ok(ModelId::default()),
        }
    }

    pub fn set_default_model(&mut self, id: ModelId) {
        self.prediction.default_model = Some(id.as_str().to_string());
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            lookback_days: self.prediction.lookback_days,
            fields: self.prediction.fields.clone(),
            skip_empty_window: self.prediction.skip_empty_window,
        }
    }

    /// Load config from disk, or return the defaults if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, use defaults.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        if !(1..=MAX_LOOKBACK_DAYS).contains(&cfg.prediction.lookback_days) {
            return Err(anyhow!(
                "lookback_days must be between 1 and {MAX_LOOKBACK_DAYS} in config file: {}",
                path.display()
            ));
        }

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_file_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "forecast", "forecast-cli")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }
}
