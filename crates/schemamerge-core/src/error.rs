//! Detection error taxonomy
//!
//! Statement- and vertex-scoped errors (`Parsing`, `GraphBuilding`) are
//! recovered by skipping the offending item. `VertexMatching`,
//! `Configuration` and `Validation` abort the run. `RuleApplication` is
//! isolated per rule by the registry.

use serde::{Deserialize, Serialize};

/// Stable error kind identifier, as written into error reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    ParsingError,
    GraphBuildingError,
    VertexMatchingError,
    RuleApplicationError,
    ConfigurationError,
    ValidationError,
    /// Panic or otherwise unclassified failure caught by the orchestrator
    InternalError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ParsingError => "PARSING_ERROR",
            Self::GraphBuildingError => "GRAPH_BUILDING_ERROR",
            Self::VertexMatchingError => "VERTEX_MATCHING_ERROR",
            Self::RuleApplicationError => "RULE_APPLICATION_ERROR",
            Self::ConfigurationError => "CONFIGURATION_ERROR",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors raised anywhere in the detection pipeline
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DetectionError {
    /// Malformed DDL statement
    #[error("Parsing error: {message}")]
    Parsing { message: String, statement: String },

    /// Structural precondition failed while building a graph
    #[error("Graph building error: {message}")]
    GraphBuilding { message: String },

    /// Duplicate equivalence key under strict matching
    #[error("Vertex matching error in graph {graph}: {message} (key: {key})")]
    VertexMatching {
        message: String,
        key: String,
        graph: String,
    },

    /// A single rule failed
    #[error("Rule {rule_id} failed: {message}")]
    RuleApplication { rule_id: String, message: String },

    /// Configuration could not be loaded
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Configuration was loaded but holds invalid values
    #[error("Validation error in '{field}': {message}")]
    Validation { field: String, message: String },
}

impl DetectionError {
    pub fn parsing(message: impl Into<String>, statement: impl Into<String>) -> Self {
        Self::Parsing {
            message: message.into(),
            statement: statement.into(),
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn rule(rule_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RuleApplication {
            rule_id: rule_id.into(),
            message: message.into(),
        }
    }

    /// Stable kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Parsing { .. } => ErrorKind::ParsingError,
            Self::GraphBuilding { .. } => ErrorKind::GraphBuildingError,
            Self::VertexMatching { .. } => ErrorKind::VertexMatchingError,
            Self::RuleApplication { .. } => ErrorKind::RuleApplicationError,
            Self::Configuration { .. } => ErrorKind::ConfigurationError,
            Self::Validation { .. } => ErrorKind::ValidationError,
        }
    }

    /// Whether the pipeline may skip the failing item and continue
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Parsing { .. } | Self::GraphBuilding { .. } | Self::RuleApplication { .. }
        )
    }
}

impl From<crate::config::ConfigError> for DetectionError {
    fn from(err: crate::config::ConfigError) -> Self {
        Self::Configuration {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_stable() {
        let err = DetectionError::parsing("no table body", "CREATE TABLE broken");
        assert_eq!(err.kind().as_str(), "PARSING_ERROR");
        assert!(err.is_recoverable());

        let err = DetectionError::VertexMatching {
            message: "duplicate key".into(),
            key: "table:public:users".into(),
            graph: "A".into(),
        };
        assert_eq!(err.kind(), ErrorKind::VertexMatchingError);
        assert!(!err.is_recoverable());
        assert!(err.to_string().contains("table:public:users"));
    }

    #[test]
    fn config_error_converts() {
        let err: DetectionError = crate::config::ConfigError::ParseError("bad toml".into()).into();
        assert_eq!(err.kind(), ErrorKind::ConfigurationError);
    }
}
