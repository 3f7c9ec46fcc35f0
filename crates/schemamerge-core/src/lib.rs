//! schemamerge Core
//!
//! Domain model shared by every stage of the conflict detector: schema
//! objects, conflict records, the error taxonomy, configuration, and the
//! versioned detection report.
//! Never rename rule ids or error kind strings - they are part of the report format.

pub mod conflict;
pub mod config;
pub mod error;
pub mod model;
pub mod naming;
pub mod report;
pub mod types;

pub use conflict::{ConflictLevel, ConflictRecord, SYSTEM_RULE_ID};
pub use config::{
    ConfigError, DetectorConfig, DetectorSettings, MatcherConfig, NormalizerOptions, RegistryConfig,
    RuleOrder, RuleSettings, SimilarityWeights, TokenizerOptions,
};
pub use error::{DetectionError, ErrorKind};
pub use model::{
    ColumnInfo, EquivalenceKey, ForeignKeyInfo, ForeignKeyRef, KeyConstraintInfo, ObjectKind,
    ObjectType, SchemaObject, TableInfo, VertexId, DEFAULT_SCHEMA,
};
pub use report::{
    AnalysisSection, DeltaSummary, DetectionReport, GraphCounts, PerformanceSection, ReportError,
    ReportMetadata, ReportStatus, ReportSummary, ReportVersion, RuleStatistics, TOOL_NAME,
};
pub use types::{ConversionRisk, TypeCategory, TypeChangeAnalysis, TypeCompatibility};
