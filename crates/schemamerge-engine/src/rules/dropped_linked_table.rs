//! R3: a removed table that took part in any foreign key relationship

use schemamerge_core::{ConflictLevel, ConflictRecord, DetectionError, ObjectType, SchemaObject, VertexId};
use schemamerge_graph::{Relation, SchemaGraph};

use super::{full_names, ConflictRule};
use crate::delta::Delta;

#[derive(Debug, Clone, Copy, Default)]
pub struct DroppedLinkedTable;

impl DroppedLinkedTable {
    pub const ID: &'static str = "R3";
}

/// Tables referenced by the foreign keys declared on `table`
fn referenced_tables(graph: &SchemaGraph, table: VertexId) -> Vec<&SchemaObject> {
    let mut targets: Vec<&SchemaObject> = graph
        .get_dependents(table, Some(&[Relation::DependsOn]))
        .into_iter()
        .filter(|o| o.object_type() == ObjectType::ForeignKey)
        .chain(graph.vertex(table))
        .flat_map(|o| graph.get_dependencies(o.id, Some(&[Relation::References])))
        .collect();

    targets.sort_by_key(|t| t.id);
    targets.dedup_by_key(|t| t.id);
    targets
}

impl ConflictRule for DroppedLinkedTable {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn name(&self) -> &'static str {
        "Dropped table with relationships"
    }

    fn description(&self) -> &'static str {
        "A table that referenced or was referenced by other tables was removed"
    }

    fn default_level(&self) -> ConflictLevel {
        ConflictLevel::High
    }

    fn apply(
        &self,
        delta: &Delta<'_>,
        graph_a: &SchemaGraph,
        _graph_b: &SchemaGraph,
    ) -> Result<Vec<ConflictRecord>, DetectionError> {
        let mut conflicts = Vec::new();

        for table in delta.vanished_tables() {
            let incoming = graph_a.get_incoming(table.id, Some(&[Relation::References]));
            let outgoing = referenced_tables(graph_a, table.id);
            if incoming.is_empty() && outgoing.is_empty() {
                continue;
            }

            let impact = full_names(&graph_a.transitive_referencing_tables(table.id));

            conflicts.push(
                self.conflict(format!(
                    "Table {} was removed together with its relationships ({} incoming, {} outgoing)",
                    table.full_name(),
                    incoming.len(),
                    outgoing.len()
                ))
                .with_detail("table", table.full_name())
                .with_detail("incoming_refs", incoming.len())
                .with_detail("outgoing_refs", outgoing.len())
                .with_detail("references", full_names(&outgoing))
                .with_detail("impact", impact),
            );
        }

        Ok(conflicts)
    }
}
