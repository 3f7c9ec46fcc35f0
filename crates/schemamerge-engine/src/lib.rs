//! schemamerge engine - Conflict detection
//!
//! This crate implements everything after graph construction:
//! - Vertex matching across two snapshots
//! - Graph comparison into a structural delta
//! - Conflict rules R1-R7 and the rule registry
//! - The detector that runs the whole pipeline

pub mod comparator;
pub mod delta;
pub mod detector;
pub mod matcher;
pub mod registry;
pub mod rules;

pub use comparator::GraphComparator;
pub use delta::{Delta, ModifiedObject};
pub use detector::Detector;
pub use matcher::{MatchResult, VertexMatcher};
pub use registry::{RegistryResult, RegistrySummary, RuleRegistry};
pub use rules::{default_rules, ConflictRule};
