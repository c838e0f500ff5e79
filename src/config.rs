use crate::error::AppError;
use crate::theme::ThemeSeed;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const MIN_TIMEOUT_SECS: f64 = 1.0;
pub const MAX_TIMEOUT_SECS: f64 = 120.0;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub python_path: Option<PathBuf>,
    #[serde(default = "default_execution_timeout_secs")]
    pub execution_timeout_secs: f64,
    #[serde(default)]
    pub theme: ThemeSeed,
    #[serde(default = "default_true")]
    pub telemetry_enabled: bool,
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    #[serde(default = "default_planner_max_retries")]
    pub planner_max_retries: u32,
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

fn default_execution_timeout_secs() -> f64 {
    30.0
}

fn default_log_filter() -> String {
    "info".to_string()
}

fn default_planner_max_retries() -> u32 {
    3
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            python_path: None,
            execution_timeout_secs: default_execution_timeout_secs(),
            theme: ThemeSeed::default(),
            telemetry_enabled: true,
            log_filter: default_log_filter(),
            planner_max_retries: default_planner_max_retries(),
            output_dir: None,
        }
    }
}

/// Clamp a timeout into the range the executor is allowed to use.
/// Non-finite input falls back to the default.
pub fn clamp_timeout_secs(secs: f64) -> f64 {
    if !secs.is_finite() {
        return default_execution_timeout_secs();
    }
    secs.clamp(MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS)
}

impl AppConfig {
    /// Get the path to the config file in the user's config dir
    pub fn config_path() -> Result<PathBuf, AppError> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| AppError::ConfigError("Cannot find config directory".into()))?;
        Ok(config_dir.join("chartgen-studio").join("config.json"))
    }

    /// Load config from disk, or return default if not found
    pub fn load() -> Result<Self, AppError> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, AppError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        serde_json::from_str(&contents).map_err(|e| AppError::ConfigError(e.to_string()))
    }

    /// Save config to disk
    pub fn save(&self) -> Result<(), AppError> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), AppError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn timeout_secs(&self) -> f64 {
        clamp_timeout_secs(self.execution_timeout_secs)
    }
}
