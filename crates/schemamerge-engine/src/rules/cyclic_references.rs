//! R7: foreign key cycles in the target schema

use schemamerge_core::{ConflictLevel, ConflictRecord, DetectionError};
use schemamerge_graph::{Relation, SchemaGraph};

use super::{full_names, ConflictRule};
use crate::delta::Delta;

/// Reports every elementary foreign key cycle between tables of graph B
///
/// A table referencing itself is a one-table cycle and is reported too,
/// unless `include_self_references` is switched off for parent/child
/// hierarchies that are known to be safe.
#[derive(Debug, Clone, Copy)]
pub struct CyclicReferences {
    include_self_references: bool,
}

impl Default for CyclicReferences {
    fn default() -> Self {
        Self::new(true)
    }
}

impl CyclicReferences {
    pub const ID: &'static str = "R7";

    pub fn new(include_self_references: bool) -> Self {
        Self {
            include_self_references,
        }
    }
}

impl ConflictRule for CyclicReferences {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn name(&self) -> &'static str {
        "Circular references"
    }

    fn description(&self) -> &'static str {
        "Tables of the target schema reference each other in a cycle"
    }

    fn default_level(&self) -> ConflictLevel {
        ConflictLevel::Critical
    }

    fn apply(
        &self,
        _delta: &Delta<'_>,
        _graph_a: &SchemaGraph,
        graph_b: &SchemaGraph,
    ) -> Result<Vec<ConflictRecord>, DetectionError> {
        let conflicts = graph_b
            .find_cycles(&[Relation::References])
            .into_iter()
            .filter(|cycle| self.include_self_references || cycle.len() > 1)
            .map(|cycle| {
                let names = full_names(&cycle);
                let mut path = names.clone();
                path.extend(names.first().cloned());

                self.conflict(format!("Circular reference between tables: {}", path.join(" -> ")))
                    .with_detail("cycle", names)
                    .with_detail("length", cycle.len())
            })
            .collect();

        Ok(conflicts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::test_support::run;
    use serde_json::json;

    const MUTUAL: &str = "
        CREATE TABLE a (id INT PRIMARY KEY, b_id INT REFERENCES b(id));
        CREATE TABLE b (id INT PRIMARY KEY, a_id INT REFERENCES a(id));
    ";

    const SELF_REF: &str = "CREATE TABLE nodes (id INT PRIMARY KEY, parent_id INT REFERENCES nodes(id))";

    #[test]
    fn two_table_cycle_is_critical() {
        let conflicts = run(&CyclicReferences::default(), "", MUTUAL);

        assert_eq!(conflicts.len(), 1);
        assert!(conflicts[0].is_critical());
        assert_eq!(conflicts[0].details["cycle"], json!(["public.a", "public.b"]));
        assert!(conflicts[0].message.contains("public.a -> public.b -> public.a"));
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let conflicts = run(&CyclicReferences::default(), "", SELF_REF);
        assert_eq!(conflicts.len(), 1);
        assert!(conflicts[0].is_critical());
        assert_eq!(conflicts[0].details["length"], json!(1));
        assert!(conflicts[0].message.contains("public.nodes -> public.nodes"));
    }

    #[test]
    fn self_reference_can_be_switched_off() {
        assert!(run(&CyclicReferences::new(false), "", SELF_REF).is_empty());
        assert_eq!(run(&CyclicReferences::new(false), "", MUTUAL).len(), 1);
    }

    #[test]
    fn cycles_only_in_base_are_ignored() {
        let conflicts = run(
            &CyclicReferences::default(),
            MUTUAL,
            "CREATE TABLE a (id INT PRIMARY KEY); CREATE TABLE b (id INT PRIMARY KEY);",
        );
        assert!(conflicts.is_empty());
    }
}
