//! JSON-based configuration loader
//!
//! Loads a [`ModelConfig`] from a JSON file. Missing fields fall back to the
//! built-in defaults, so a file only needs the parameters it overrides.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::{ConfigurationError, ModelConfig};

/// Default location of the model configuration file
pub const DEFAULT_CONFIG_PATH: &str = "data/model_config.json";

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse model config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid model config: {0}")]
    Invalid(#[from] ConfigurationError),
}

/// Load and validate a config from a JSON file
pub fn load_config(path: &Path) -> Result<ModelConfig, ConfigLoadError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config = parse_config(&text)?;
    log::debug!("Loaded model config from {}", path.display());
    Ok(config)
}

/// Parse and validate a config from JSON text
pub fn parse_config(text: &str) -> Result<ModelConfig, ConfigLoadError> {
    let config: ModelConfig = serde_json::from_str(text)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Triangular;
    use approx::assert_relative_eq;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = parse_config(
            r#"{
                "cap_rate": 0.06,
                "capital": { "initial_equity": 5000000000.0 },
                "distributions": { "refinancing_ltv": { "min": 0.75, "mode": 0.75, "max": 0.75 } }
            }"#,
        )
        .unwrap();

        assert_relative_eq!(config.cap_rate, 0.06);
        assert_eq!(config.capital.initial_equity, 5_000_000_000.0);
        assert_eq!(config.capital.initial_debt, 19_000_000_000.0);
        assert_eq!(config.distributions.refinancing_ltv, Triangular::fixed(0.75));
        assert_eq!(config.milestones, ModelConfig::default().milestones);
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        assert!(matches!(parse_config("{ not json"), Err(ConfigLoadError::Parse(_))));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let result = parse_config(r#"{ "milestones": { "refinancing_month": 6 } }"#);
        assert!(matches!(
            result,
            Err(ConfigLoadError::Invalid(ConfigurationError::NonIncreasingMilestones { .. }))
        ));
    }

    #[test]
    fn test_missing_file() {
        let result = load_config(Path::new("does/not/exist.json"));
        assert!(matches!(result, Err(ConfigLoadError::Io { .. })));
    }

    #[test]
    fn test_load_default_config_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join(DEFAULT_CONFIG_PATH);
        let config = load_config(&path).unwrap();
        let defaults = ModelConfig::default();

        assert_eq!(config.milestones, defaults.milestones);
        assert_eq!(config.lease_up_months, defaults.lease_up_months);
        assert_relative_eq!(config.cap_rate, defaults.cap_rate);
        assert_relative_eq!(config.capital.initial_debt, defaults.capital.initial_debt);
        assert_relative_eq!(
            config.distributions.pre_refi_rate.mode,
            defaults.distributions.pre_refi_rate.mode
        );
    }
}
