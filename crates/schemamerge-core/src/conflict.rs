//! Conflict records and severity levels
//!
//! Rule ids (R1..R7, SYSTEM) are stable strings that appear in reports.
//! Add new rules with new ids only.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Rule id used for conflicts synthesised by the registry and orchestrator
pub const SYSTEM_RULE_ID: &str = "SYSTEM";

/// Conflict severity level
///
/// Ordered from least to most severe so that `max()` picks the worst level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictLevel {
    /// Informational, never blocks a merge
    Low,

    /// Should be reviewed
    Medium,

    /// Likely to break dependent objects
    High,

    /// Blocks the merge
    Critical,
}

impl ConflictLevel {
    /// Get the level as a stable string identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }

    /// Parse a level from its string form (case-insensitive)
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "LOW" => Some(Self::Low),
            "MEDIUM" => Some(Self::Medium),
            "HIGH" => Some(Self::High),
            "CRITICAL" => Some(Self::Critical),
            _ => None,
        }
    }

    /// All levels, most severe first
    pub fn all_descending() -> [ConflictLevel; 4] {
        [Self::Critical, Self::High, Self::Medium, Self::Low]
    }
}

impl std::fmt::Display for ConflictLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single conflict reported by a rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictRecord {
    /// Id of the rule that produced the conflict
    pub rule: String,

    /// Human-readable rule name (stamped by the registry)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_name: Option<String>,

    /// Severity level
    pub level: ConflictLevel,

    /// Human-readable message naming the affected object
    pub message: String,

    /// Structured details (table, column, constraint, ...)
    #[serde(default)]
    pub details: BTreeMap<String, serde_json::Value>,
}

impl ConflictRecord {
    /// Create a new conflict without details
    pub fn new(rule: impl Into<String>, level: ConflictLevel, message: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            rule_name: None,
            level,
            message: message.into(),
            details: BTreeMap::new(),
        }
    }

    /// Create a conflict attributed to the system itself
    pub fn system(level: ConflictLevel, message: impl Into<String>) -> Self {
        Self::new(SYSTEM_RULE_ID, level, message)
    }

    /// Add a structured detail
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// Set the rule name
    pub fn with_rule_name(mut self, name: impl Into<String>) -> Self {
        self.rule_name = Some(name.into());
        self
    }

    /// Whether this conflict blocks a merge
    pub fn is_critical(&self) -> bool {
        self.level == ConflictLevel::Critical
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_ordering() {
        assert!(ConflictLevel::Critical > ConflictLevel::High);
        assert!(ConflictLevel::High > ConflictLevel::Medium);
        assert!(ConflictLevel::Medium > ConflictLevel::Low);
    }

    #[test]
    fn level_stability() {
        assert_eq!(ConflictLevel::Critical.as_str(), "CRITICAL");
        assert_eq!(ConflictLevel::parse("high"), Some(ConflictLevel::High));
        assert_eq!(ConflictLevel::parse("fatal"), None);
    }

    #[test]
    fn conflict_serialization() {
        let conflict = ConflictRecord::new("R1", ConflictLevel::Critical, "Table users removed")
            .with_detail("table", "public.users")
            .with_detail("incoming_refs", 2);

        let json = serde_json::to_string(&conflict).unwrap();
        assert!(json.contains("\"CRITICAL\""));
        assert!(json.contains("public.users"));
        assert!(!json.contains("rule_name"));
        assert!(conflict.is_critical());
    }
}
