//! Schema dependency graph
//!
//! Builds a directed, labeled graph over the objects of one schema snapshot
//! and answers the structural queries the conflict rules need:
//! - Direct and transitive dependents
//! - Owning table of a column or constraint
//! - Cycles over foreign key references

pub mod builder;
pub mod graph;

pub use builder::GraphBuilder;
pub use graph::{Edge, Relation, SchemaGraph};
