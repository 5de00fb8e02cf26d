//! Policy configuration
//!
//! Numeric thresholds and limits are loaded once (YAML or defaults) and then
//! shared read-only as `Arc<PolicyConfig>`.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Minimum net votes for a node to stay visible
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisibilityConfig {
    pub content_floor: i64,
    pub comment_floor: i64,
}

impl Default for VisibilityConfig {
    fn default() -> Self {
        Self {
            content_floor: -5,
            comment_floor: -3,
        }
    }
}

/// Weights combining the three review averages into an overall score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewWeights {
    pub quality: f64,
    pub independence: f64,
    pub relevance: f64,
}

impl Default for ReviewWeights {
    fn default() -> Self {
        Self {
            quality: 0.333,
            independence: 0.333,
            relevance: 0.334,
        }
    }
}

/// How many words a category is composed of
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryWords {
    pub min: usize,
    pub max: usize,
}

impl Default for CategoryWords {
    fn default() -> Self {
        Self { min: 1, max: 5 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// How long SQLite waits on a locked database before reporting a conflict
    pub busy_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 5_000,
        }
    }
}

/// Immutable rule table for the voting core
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Inclusion passes when net votes are strictly above this value
    pub inclusion_threshold: i64,
    pub visibility: VisibilityConfig,
    pub max_categories: usize,
    pub category_words: CategoryWords,
    pub review_weights: ReviewWeights,
    pub storage: StorageConfig,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            inclusion_threshold: 0,
            visibility: VisibilityConfig::default(),
            max_categories: 3,
            category_words: CategoryWords::default(),
            review_weights: ReviewWeights::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl PolicyConfig {
    /// Parse and validate a YAML document. Missing fields take their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: PolicyConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_categories == 0 {
            return Err(ConfigError::Invalid("max_categories must be at least 1".into()));
        }
        if self.category_words.min == 0 || self.category_words.min > self.category_words.max {
            return Err(ConfigError::Invalid(format!(
                "category_words range {}..={} is empty",
                self.category_words.min, self.category_words.max
            )));
        }
        let w = &self.review_weights;
        if [w.quality, w.independence, w.relevance].iter().any(|x| *x < 0.0) {
            return Err(ConfigError::Invalid("review weights must be non-negative".into()));
        }
        let sum = w.quality + w.independence + w.relevance;
        if (sum - 1.0).abs() > 1e-6 {
            return Err(ConfigError::Invalid(format!(
                "review weights must sum to 1.0, got {}",
                sum
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_platform_rules() {
        let config = PolicyConfig::default();
        assert_eq!(config.inclusion_threshold, 0);
        assert_eq!(config.visibility.content_floor, -5);
        assert_eq!(config.visibility.comment_floor, -3);
        assert_eq!(config.max_categories, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config = PolicyConfig::from_yaml_str("visibility:\n  comment_floor: -10\n").unwrap();
        assert_eq!(config.visibility.comment_floor, -10);
        assert_eq!(config.visibility.content_floor, -5);
        assert_eq!(config.max_categories, 3);
    }

    #[test]
    fn weights_must_sum_to_one() {
        let yaml = "review_weights:\n  quality: 0.5\n  independence: 0.5\n  relevance: 0.5\n";
        let err = PolicyConfig::from_yaml_str(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn zero_categories_is_invalid() {
        let err = PolicyConfig::from_yaml_str("max_categories: 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "inclusion_threshold: 2").unwrap();
        let config = PolicyConfig::from_path(file.path()).unwrap();
        assert_eq!(config.inclusion_threshold, 2);
    }
}
