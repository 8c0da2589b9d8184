//! TOML backtest configuration.
//!
//! ```toml
//! [engine]
//! stake_percent = 0.05
//! leverage = 5.0
//!
//! [data]
//! path = "samples.csv"
//!
//! [validation]
//! window_size = 144
//! train_windows = 3
//! ```

use std::path::{Path, PathBuf};

use klinesim_core::engine::{ConfigError as EngineConfigError, EngineConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from loading or validating a config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid engine settings: {0}")]
    Engine(#[from] EngineConfigError),
    #[error("[data] needs either `path` or `synthetic = true`")]
    MissingData,
    #[error("invalid [validation] settings: {0}")]
    InvalidValidation(String),
}

/// Complete configuration for a backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BacktestConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub validation: Option<ValidationConfig>,
}

/// Where price samples come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DataConfig {
    /// CSV produced by the strategy layer.
    pub path: Option<PathBuf>,
    /// Generate a random-walk sample sequence instead of reading a file.
    pub synthetic: bool,
    pub synthetic_len: usize,
    pub seed: u64,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            path: None,
            synthetic: false,
            synthetic_len: 720,
            seed: 42,
        }
    }
}

/// Chronological train/test split used to validate a sweep winner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ValidationConfig {
    /// Samples per window.
    pub window_size: usize,
    /// Leading windows used for training; the rest is the test set.
    pub train_windows: usize,
    /// Minimum test-set trade Sharpe for a configuration to pass.
    pub min_sharpe: f64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            window_size: 144,
            train_windows: 3,
            min_sharpe: 0.01,
        }
    }
}

impl BacktestConfig {
    /// A config over in-memory or synthetic data with default engine settings.
    pub fn synthetic(len: usize, seed: u64) -> Self {
        Self {
            engine: EngineConfig::default(),
            data: DataConfig {
                path: None,
                synthetic: true,
                synthetic_len: len,
                seed,
            },
            validation: None,
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.engine.validate()?;
        if self.data.path.is_none() && !self.data.synthetic {
            return Err(ConfigError::MissingData);
        }
        if let Some(validation) = &self.validation {
            if validation.window_size == 0 {
                return Err(ConfigError::InvalidValidation(
                    "window_size must be positive".into(),
                ));
            }
            if validation.train_windows == 0 {
                return Err(ConfigError::InvalidValidation(
                    "train_windows must be positive".into(),
                ));
            }
            if !validation.min_sharpe.is_finite() {
                return Err(ConfigError::InvalidValidation(
                    "min_sharpe must be finite".into(),
                ));
            }
        }
        Ok(())
    }
}

/// Deterministic identifier for an engine configuration.
///
/// Two runs with identical settings share the same id.
pub fn config_id(engine: &EngineConfig) -> String {
    let json = serde_json::to_string(engine).unwrap_or_default();
    blake3::hash(json.as_bytes()).to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_config() {
        let config = BacktestConfig::from_toml_str(
            r#"
            [engine]
            max_pyramid = 12
            stake_percent = 0.1
            initial_capital = 2.0
            leverage = 3.0
            commission_rate = 0.05

            [data]
            path = "samples.csv"

            [validation]
            window_size = 100
            train_windows = 2
            min_sharpe = 0.5
            "#,
        )
        .unwrap();

        assert_eq!(config.engine.max_pyramid, 12);
        assert_eq!(config.engine.stake_percent, 0.1);
        assert_eq!(config.data.path, Some(PathBuf::from("samples.csv")));
        let validation = config.validation.unwrap();
        assert_eq!(validation.window_size, 100);
        assert_eq!(validation.min_sharpe, 0.5);
    }

    #[test]
    fn missing_engine_table_uses_defaults() {
        let config = BacktestConfig::from_toml_str("[data]\nsynthetic = true\n").unwrap();
        assert_eq!(config.engine, EngineConfig::default());
        assert_eq!(config.data.synthetic_len, 720);
        assert!(config.validation.is_none());
    }

    #[test]
    fn rejects_missing_data_source() {
        let err = BacktestConfig::from_toml_str("[engine]\nleverage = 2.0\n").unwrap_err();
        assert!(matches!(err, ConfigError::MissingData));
    }

    #[test]
    fn rejects_invalid_engine_values() {
        let err = BacktestConfig::from_toml_str(
            "[engine]\ncommission_rate = 1.5\n[data]\nsynthetic = true\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Engine(_)));
    }

    #[test]
    fn rejects_unknown_engine_keys() {
        let err = BacktestConfig::from_toml_str(
            "[engine]\nslippage = 0.1\n[data]\nsynthetic = true\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn rejects_zero_window() {
        let mut config = BacktestConfig::synthetic(100, 1);
        config.validation = Some(ValidationConfig {
            window_size: 0,
            ..ValidationConfig::default()
        });
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValidation(_))
        ));
    }

    #[test]
    fn load_reports_missing_file() {
        let err = BacktestConfig::load(Path::new("/nonexistent/klinesim.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn config_id_deterministic() {
        let a = config_id(&EngineConfig::default());
        let b = config_id(&EngineConfig::default());
        assert_eq!(a, b);
        assert!(!a.is_empty());
    }

    #[test]
    fn config_id_changes_with_params() {
        let a = config_id(&EngineConfig::default());
        let b = config_id(&EngineConfig::default().with_leverage(3.0));
        assert_ne!(a, b);
    }
}
