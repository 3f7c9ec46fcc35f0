//! R1: a removed (or renamed) table that other tables still reference

use schemamerge_core::{ConflictLevel, ConflictRecord, DetectionError};
use schemamerge_graph::{Relation, SchemaGraph};

use super::{full_names, ConflictRule};
use crate::delta::Delta;

#[derive(Debug, Clone, Copy, Default)]
pub struct DroppedReferencedTable;

impl DroppedReferencedTable {
    pub const ID: &'static str = "R1";
}

impl ConflictRule for DroppedReferencedTable {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn name(&self) -> &'static str {
        "Dropped referenced table"
    }

    fn description(&self) -> &'static str {
        "A table was removed while foreign keys in the base schema still reference it"
    }

    fn default_level(&self) -> ConflictLevel {
        ConflictLevel::Critical
    }

    fn apply(
        &self,
        delta: &Delta<'_>,
        graph_a: &SchemaGraph,
        _graph_b: &SchemaGraph,
    ) -> Result<Vec<ConflictRecord>, DetectionError> {
        let mut conflicts = Vec::new();

        for removed in delta.vanished_tables() {
            let table = graph_a.get_table_of_object(removed.id).unwrap_or(removed);

            let incoming = graph_a.get_incoming(table.id, Some(&[Relation::References]));
            if incoming.is_empty() {
                continue;
            }

            let referrers = full_names(&graph_a.referencing_tables(table.id));
            let impact = full_names(&graph_a.transitive_referencing_tables(table.id));
            let dependents = full_names(&graph_a.transitive_dependents(table.id, None));

            conflicts.push(
                self.conflict(format!(
                    "Table {} was removed but is still referenced by {}",
                    table.full_name(),
                    referrers.join(", ")
                ))
                .with_detail("removed_object", removed.full_name())
                .with_detail("table", table.full_name())
                .with_detail("incoming_refs", incoming.len())
                .with_detail("referenced_by", referrers)
                .with_detail("impact", impact)
                .with_detail("dependents", dependents),
            );
        }

        Ok(conflicts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::test_support::run;
    use serde_json::json;

    const BASE: &str = "
        CREATE TABLE users (id INT PRIMARY KEY);
        CREATE TABLE orders (id INT PRIMARY KEY, user_id INT REFERENCES users(id));
        CREATE TABLE shipments (id INT, order_id INT REFERENCES orders(id));
    ";

    #[test]
    fn referenced_table_drop_is_critical() {
        let conflicts = run(
            &DroppedReferencedTable,
            BASE,
            "CREATE TABLE orders (id INT PRIMARY KEY, user_id INT REFERENCES users(id));
             CREATE TABLE shipments (id INT, order_id INT REFERENCES orders(id));",
        );

        assert_eq!(conflicts.len(), 1);
        let conflict = &conflicts[0];
        assert_eq!(conflict.level, ConflictLevel::Critical);
        assert!(conflict.message.contains("public.users"));
        assert_eq!(conflict.details["table"], json!("public.users"));
        assert_eq!(conflict.details["incoming_refs"], json!(1));
        assert_eq!(conflict.details["impact"], json!(["public.orders", "public.shipments"]));
    }

    #[test]
    fn unreferenced_table_drop_is_ignored() {
        let conflicts = run(
            &DroppedReferencedTable,
            BASE,
            "CREATE TABLE users (id INT PRIMARY KEY);
             CREATE TABLE orders (id INT PRIMARY KEY, user_id INT REFERENCES users(id));",
        );
        assert!(conflicts.is_empty());
    }
}
