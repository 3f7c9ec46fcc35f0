//! Detection report schema (stable v1)
//!
//! This schema is STABLE and VERSIONED.
//! Breaking changes require a new version.

use serde::{Deserialize, Serialize};

use crate::conflict::{ConflictLevel, ConflictRecord};
use crate::error::ErrorKind;

/// Name written into report metadata
pub const TOOL_NAME: &str = "schemamerge";

/// Report schema version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportVersion {
    /// Major version (breaking changes)
    pub major: u32,

    /// Minor version (backward-compatible additions)
    pub minor: u32,
}

impl ReportVersion {
    /// Current report schema version
    pub const CURRENT: ReportVersion = ReportVersion { major: 1, minor: 0 };
}

impl std::fmt::Display for ReportVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Who produced the report and when
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Timestamp (RFC 3339)
    pub timestamp: String,

    pub tool: String,

    /// Tool version
    pub version: String,
}

impl Default for ReportMetadata {
    fn default() -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            tool: TOOL_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Outcome of a detection run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportStatus {
    Ok,
    Error,
}

/// Summary counts over all conflicts found (before report truncation)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub has_conflicts: bool,
    pub has_critical_conflicts: bool,
    pub total_conflicts: usize,

    /// At least one critical conflict
    pub merge_blocked: bool,

    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl ReportSummary {
    /// Count conflicts per level
    pub fn from_conflicts(conflicts: &[ConflictRecord]) -> Self {
        let count = |level: ConflictLevel| conflicts.iter().filter(|c| c.level == level).count();
        let critical = count(ConflictLevel::Critical);

        Self {
            has_conflicts: !conflicts.is_empty(),
            has_critical_conflicts: critical > 0,
            total_conflicts: conflicts.len(),
            merge_blocked: critical > 0,
            critical,
            high: count(ConflictLevel::High),
            medium: count(ConflictLevel::Medium),
            low: count(ConflictLevel::Low),
        }
    }
}

/// Per-rule execution statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleStatistics {
    pub rule_id: String,
    pub rule_name: String,

    /// False when the rule was disabled or failed
    pub applied: bool,

    /// Conflicts kept after per-rule truncation
    pub conflicts_found: usize,

    /// Conflicts the rule produced before truncation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_raw: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_reported: Option<usize>,

    /// Failure message, if the rule failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Size of the structural delta
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaSummary {
    pub objects_added: usize,
    pub objects_removed: usize,
    pub objects_modified: usize,
    pub edges_added: usize,
    pub edges_removed: usize,

    /// Some column changed its declared type
    pub type_changes: bool,

    /// Some table changed its primary key
    pub pk_changes: bool,
}

/// Vertex and edge counts of one graph
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphCounts {
    pub vertices: usize,
    pub edges: usize,
}

/// Structural analysis behind the conflicts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisSection {
    pub delta: DeltaSummary,
    pub graph_a: GraphCounts,
    pub graph_b: GraphCounts,

    /// Number of rules that ran successfully
    pub rules_applied: usize,

    /// Statements skipped because they could not be parsed
    pub statements_skipped: usize,
}

/// Stage timings in seconds
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSection {
    pub parsing_time: f64,
    pub graph_building_time: f64,
    pub comparison_time: f64,
    pub rule_application_time: f64,
    pub total_time: f64,
}

/// Failure description of an error report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportError {
    pub kind: ErrorKind,
    pub message: String,
}

/// Detection report (report.json v1)
///
/// This is the stable output format.
/// All fields are versioned and backward-compatible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionReport {
    /// Schema version
    pub version: ReportVersion,

    pub metadata: ReportMetadata,

    pub status: ReportStatus,

    pub summary: ReportSummary,

    /// Conflicts, most severe first, truncated to the configured limit
    pub conflicts: Vec<ConflictRecord>,

    /// Per-rule statistics
    pub statistics: Vec<RuleStatistics>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<AnalysisSection>,

    pub performance: PerformanceSection,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ReportError>,
}

impl DetectionReport {
    /// Build a successful report
    ///
    /// The summary counts every conflict; only the first `max_conflicts`
    /// (after sorting by severity) are kept in the body.
    pub fn from_conflicts(mut conflicts: Vec<ConflictRecord>, max_conflicts: usize) -> Self {
        let summary = ReportSummary::from_conflicts(&conflicts);

        // Stable sort keeps rule order within a level
        conflicts.sort_by(|a, b| b.level.cmp(&a.level));
        conflicts.truncate(max_conflicts);

        Self {
            version: ReportVersion::CURRENT,
            metadata: ReportMetadata::default(),
            status: ReportStatus::Ok,
            summary,
            conflicts,
            statistics: Vec::new(),
            analysis: None,
            performance: PerformanceSection::default(),
            error: None,
        }
    }

    /// Build a blocking error report with a single SYSTEM conflict
    pub fn from_error(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        let conflict = ConflictRecord::system(
            ConflictLevel::Critical,
            format!("Detection failed: {}", message),
        )
        .with_rule_name("System error")
        .with_detail("error_kind", kind.as_str());

        let mut report = Self::from_conflicts(vec![conflict], 1);
        report.status = ReportStatus::Error;
        report.summary.merge_blocked = true;
        report.error = Some(ReportError { kind, message });
        report
    }

    pub fn with_statistics(mut self, statistics: Vec<RuleStatistics>) -> Self {
        self.statistics = statistics;
        self
    }

    pub fn with_analysis(mut self, analysis: AnalysisSection) -> Self {
        self.analysis = Some(analysis);
        self
    }

    pub fn with_performance(mut self, performance: PerformanceSection) -> Self {
        self.performance = performance;
        self
    }

    /// Check if the merge must be blocked
    pub fn merge_blocked(&self) -> bool {
        self.summary.merge_blocked
    }

    pub fn is_error(&self) -> bool {
        self.status == ReportStatus::Error
    }

    /// Conflicts of one level
    pub fn conflicts_at(&self, level: ConflictLevel) -> impl Iterator<Item = &ConflictRecord> {
        self.conflicts.iter().filter(move |c| c.level == level)
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Save to file
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let json = self.to_json()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(path, json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_report() {
        let report = DetectionReport::from_conflicts(Vec::new(), 100);
        assert_eq!(report.version, ReportVersion::CURRENT);
        assert_eq!(report.status, ReportStatus::Ok);
        assert!(!report.summary.has_conflicts);
        assert!(!report.merge_blocked());
    }

    #[test]
    fn summary_counts_before_truncation() {
        let conflicts = vec![
            ConflictRecord::new("R4", ConflictLevel::High, "unique removed"),
            ConflictRecord::new("R1", ConflictLevel::Critical, "table removed"),
            ConflictRecord::new("R6", ConflictLevel::High, "not null"),
        ];

        let report = DetectionReport::from_conflicts(conflicts, 2);
        assert_eq!(report.summary.total_conflicts, 3);
        assert_eq!(report.summary.high, 2);
        assert!(report.merge_blocked());
        assert_eq!(report.conflicts.len(), 2);
        assert_eq!(report.conflicts[0].rule, "R1");
        assert_eq!(report.conflicts[1].rule, "R4");
    }

    #[test]
    fn error_report_blocks_merge() {
        let report = DetectionReport::from_error(ErrorKind::VertexMatchingError, "duplicate key");
        assert!(report.is_error());
        assert!(report.merge_blocked());
        assert_eq!(report.conflicts.len(), 1);
        assert_eq!(report.conflicts[0].rule, "SYSTEM");
        assert!(report.conflicts[0].is_critical());
    }

    #[test]
    fn report_serialization() {
        let report = DetectionReport::from_error(ErrorKind::InternalError, "boom");
        let json = report.to_json().unwrap();
        assert!(json.contains("\"version\""));
        assert!(json.contains("\"ERROR\""));
        assert!(json.contains("INTERNAL_ERROR"));
    }
}
