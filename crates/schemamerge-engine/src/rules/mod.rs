//! Conflict rules
//!
//! Each rule is an independent, stateless predicate over a [`Delta`] and the
//! two graphs it was computed from. Rules never mutate their inputs; the
//! registry decides ordering, truncation and failure isolation.

mod cyclic_references;
mod dropped_constraint;
mod dropped_linked_table;
mod dropped_referenced_table;
mod incompatible_type_change;
mod not_null_without_default;
mod primary_key_change;

pub use cyclic_references::CyclicReferences;
pub use dropped_constraint::DroppedConstraint;
pub use dropped_linked_table::DroppedLinkedTable;
pub use dropped_referenced_table::DroppedReferencedTable;
pub use incompatible_type_change::IncompatibleTypeChange;
pub use not_null_without_default::NotNullWithoutDefault;
pub use primary_key_change::PrimaryKeyChange;

use schemamerge_core::{ConflictLevel, ConflictRecord, DetectionError, DetectorConfig, SchemaObject};
use schemamerge_graph::SchemaGraph;

use crate::delta::Delta;

/// A conflict rule
pub trait ConflictRule: Send + Sync {
    /// Stable rule id (`R1` ...)
    fn id(&self) -> &'static str;

    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Level of the conflicts this rule emits unless configured otherwise
    fn default_level(&self) -> ConflictLevel;

    /// Report the conflicts found in `delta`
    ///
    /// `graph_a` is the base snapshot, `graph_b` the target.
    fn apply(
        &self,
        delta: &Delta<'_>,
        graph_a: &SchemaGraph,
        graph_b: &SchemaGraph,
    ) -> Result<Vec<ConflictRecord>, DetectionError>;

    /// Conflict attributed to this rule at its default level
    fn conflict(&self, message: String) -> ConflictRecord {
        ConflictRecord::new(self.id(), self.default_level(), message)
    }
}

/// Rules R1 to R7, configured from `config`
pub fn default_rules(config: &DetectorConfig) -> Vec<Box<dyn ConflictRule>> {
    vec![
        Box::new(DroppedReferencedTable),
        Box::new(IncompatibleTypeChange),
        Box::new(DroppedLinkedTable),
        Box::new(DroppedConstraint),
        Box::new(PrimaryKeyChange),
        Box::new(NotNullWithoutDefault),
        Box::new(CyclicReferences::new(
            config.rule_settings(CyclicReferences::ID).include_self_references,
        )),
    ]
}

/// Qualified names, in the given order
fn full_names(objects: &[&SchemaObject]) -> Vec<String> {
    objects.iter().map(|o| o.full_name()).collect()
}

#[cfg(test)]
pub(crate) mod test_support {
    use schemamerge_graph::{GraphBuilder, SchemaGraph};
    use schemamerge_sql::StatementParser;

    use super::ConflictRule;
    use crate::comparator::GraphComparator;
    use schemamerge_core::ConflictRecord;

    pub fn build(sql: &str, name: &str) -> SchemaGraph {
        let parsed = StatementParser::new().parse_script(sql);
        GraphBuilder::new().build_from_objects(&parsed.objects, name)
    }

    /// Run a single rule on the delta between two scripts
    pub fn run(rule: &dyn ConflictRule, base: &str, target: &str) -> Vec<ConflictRecord> {
        let a = build(base, "a");
        let b = build(target, "b");
        let delta = GraphComparator::default().compare(&a, &b).unwrap();
        rule.apply(&delta, &a, &b).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_rule_ids_are_unique_and_ordered() {
        let rules = default_rules(&DetectorConfig::default());
        let ids: Vec<&str> = rules.iter().map(|r| r.id()).collect();
        assert_eq!(ids, vec!["R1", "R2", "R3", "R4", "R5", "R6", "R7"]);
        assert!(rules.iter().all(|r| !r.name().is_empty() && !r.description().is_empty()));
    }
}
