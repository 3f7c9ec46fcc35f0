//! Configuration schema (schemamerge.toml)

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::conflict::ConflictLevel;
use crate::error::DetectionError;

/// Normalizer switches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerOptions {
    /// Uppercase DDL keywords, types and constraint words
    pub uppercase_keywords: bool,

    /// Drop `--` and `/* */` comments
    pub remove_comments: bool,

    /// Collapse whitespace around commas and semicolons
    pub normalize_whitespace: bool,

    /// Trim padding inside double-quoted identifiers
    pub standardize_quotes: bool,
}

impl Default for NormalizerOptions {
    fn default() -> Self {
        Self {
            uppercase_keywords: true,
            remove_comments: true,
            normalize_whitespace: true,
            standardize_quotes: true,
        }
    }
}

/// Tokenizer switches
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenizerOptions {
    /// Keep keyword and identifier case as written
    pub preserve_case: bool,
}

/// Weights of the experimental similarity score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimilarityWeights {
    pub name: f64,
    pub attributes: f64,
}

impl Default for SimilarityWeights {
    fn default() -> Self {
        Self {
            name: 0.6,
            attributes: 0.4,
        }
    }
}

/// Vertex matcher settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Duplicate equivalence keys are a fatal error
    pub strict_keys: bool,

    /// Pair leftover vertices by similarity
    pub enable_experimental_matching: bool,

    /// Minimum score for a similarity pairing
    pub similarity_threshold: f64,

    pub similarity_weights: SimilarityWeights,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            strict_keys: true,
            enable_experimental_matching: false,
            similarity_threshold: 0.8,
            similarity_weights: SimilarityWeights::default(),
        }
    }
}

/// Order in which the registry runs rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleOrder {
    /// Ascending rule id
    ById,

    /// Most severe default level first, then id
    ByCriticality,

    /// Exactly `custom_order`
    Custom,
}

impl Default for RuleOrder {
    fn default() -> Self {
        Self::ById
    }
}

/// Rule registry settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub rule_order: RuleOrder,

    /// Rule ids, used when `rule_order = "custom"`
    pub custom_order: Vec<String>,

    /// Global cap across all rules
    pub max_total_conflicts: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            rule_order: RuleOrder::ById,
            custom_order: Vec::new(),
            max_total_conflicts: 1000,
        }
    }
}

/// Per-rule settings (`[rules.R1]` ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleSettings {
    pub enabled: bool,

    /// Overrides the level of every conflict the rule emits
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<ConflictLevel>,

    pub max_reports_per_rule: usize,

    /// Keep the `details` map of emitted conflicts
    pub include_details: bool,

    /// R7 only: report single-table self references as cycles (on by default)
    pub include_self_references: bool,
}

impl Default for RuleSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            level: None,
            max_reports_per_rule: 100,
            include_details: true,
            include_self_references: true,
        }
    }
}

/// Orchestrator settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorSettings {
    /// Conflicts kept in the report body
    pub max_conflicts_in_report: usize,

    /// Build the two snapshots on separate threads
    pub parallel_snapshots: bool,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            max_conflicts_in_report: 100,
            parallel_snapshots: false,
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    #[serde(default)]
    pub tokenizer: TokenizerOptions,

    #[serde(default)]
    pub normalizer: NormalizerOptions,

    #[serde(default)]
    pub matcher: MatcherConfig,

    #[serde(default)]
    pub registry: RegistryConfig,

    /// Per-rule settings keyed by rule id
    #[serde(default)]
    pub rules: BTreeMap<String, RuleSettings>,

    #[serde(default)]
    pub detector: DetectorSettings,
}

impl DetectorConfig {
    /// Load config from TOML file
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(format!("{}: {}", path.display(), e)))?;

        Self::from_toml(&contents)
    }

    /// Load config from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml)
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Save config to TOML file
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        let toml = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, toml)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Settings for a rule, or defaults if it has no section
    pub fn rule_settings(&self, rule_id: &str) -> RuleSettings {
        self.rules.get(rule_id).cloned().unwrap_or_default()
    }

    /// Check value ranges
    ///
    /// Rule ids in `custom_order` are checked by the registry, which knows
    /// which rules exist.
    pub fn validate(&self) -> Result<(), DetectionError> {
        let matcher = &self.matcher;
        if !(0.0..=1.0).contains(&matcher.similarity_threshold) {
            return Err(DetectionError::validation(
                "matcher.similarity_threshold",
                format!("must be within [0, 1], got {}", matcher.similarity_threshold),
            ));
        }

        let weights = &matcher.similarity_weights;
        if weights.name < 0.0 || weights.attributes < 0.0 {
            return Err(DetectionError::validation(
                "matcher.similarity_weights",
                "weights must not be negative",
            ));
        }
        if weights.name + weights.attributes <= 0.0 {
            return Err(DetectionError::validation(
                "matcher.similarity_weights",
                "at least one weight must be positive",
            ));
        }

        if self.registry.rule_order == RuleOrder::Custom && self.registry.custom_order.is_empty() {
            return Err(DetectionError::validation(
                "registry.custom_order",
                "custom rule order requires a non-empty custom_order list",
            ));
        }

        if self.registry.max_total_conflicts == 0 {
            return Err(DetectionError::validation(
                "registry.max_total_conflicts",
                "must be greater than zero",
            ));
        }

        for (rule_id, settings) in &self.rules {
            if settings.max_reports_per_rule == 0 {
                return Err(DetectionError::validation(
                    format!("rules.{}.max_reports_per_rule", rule_id),
                    "must be greater than zero",
                ));
            }
        }

        if self.detector.max_conflicts_in_report == 0 {
            return Err(DetectionError::validation(
                "detector.max_conflicts_in_report",
                "must be greater than zero",
            ));
        }

        Ok(())
    }
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = DetectorConfig::default();
        assert!(config.matcher.strict_keys);
        assert_eq!(config.registry.rule_order, RuleOrder::ById);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parses_rule_sections() {
        let config = DetectorConfig::from_toml(
            r#"
            [registry]
            rule_order = "by_criticality"

            [rules.R6]
            enabled = false

            [rules.R2]
            level = "CRITICAL"
            max_reports_per_rule = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.registry.rule_order, RuleOrder::ByCriticality);
        assert!(!config.rule_settings("R6").enabled);
        assert_eq!(config.rule_settings("R2").level, Some(ConflictLevel::Critical));
        assert_eq!(config.rule_settings("R2").max_reports_per_rule, 5);
        assert!(config.rule_settings("R1").enabled);
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        let mut config = DetectorConfig::default();
        config.matcher.similarity_threshold = 1.5;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, DetectionError::Validation { ref field, .. } if field == "matcher.similarity_threshold"));
    }

    #[test]
    fn custom_order_requires_ids() {
        let mut config = DetectorConfig::default();
        config.registry.rule_order = RuleOrder::Custom;
        assert!(config.validate().is_err());

        config.registry.custom_order = vec!["R7".into()];
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_toml_roundtrip() {
        let mut config = DetectorConfig::default();
        config.rules.insert("R7".into(), RuleSettings {
            include_self_references: false,
            ..RuleSettings::default()
        });
        let toml = toml::to_string(&config).unwrap();
        let parsed: DetectorConfig = toml::from_str(&toml).unwrap();
        assert_eq!(config, parsed);
    }
}
