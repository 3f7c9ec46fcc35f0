//! R2: a column type change that referencing tables may not survive

use schemamerge_core::{ConflictLevel, ConflictRecord, DetectionError, ObjectType, TypeCompatibility};
use schemamerge_graph::{Relation, SchemaGraph};

use super::{full_names, ConflictRule};
use crate::delta::Delta;

#[derive(Debug, Clone, Copy, Default)]
pub struct IncompatibleTypeChange;

impl IncompatibleTypeChange {
    pub const ID: &'static str = "R2";
}

impl ConflictRule for IncompatibleTypeChange {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn name(&self) -> &'static str {
        "Incompatible column type change"
    }

    fn description(&self) -> &'static str {
        "A column of a referenced table changed to an incompatible or narrower type"
    }

    fn default_level(&self) -> ConflictLevel {
        ConflictLevel::High
    }

    fn apply(
        &self,
        delta: &Delta<'_>,
        _graph_a: &SchemaGraph,
        graph_b: &SchemaGraph,
    ) -> Result<Vec<ConflictRecord>, DetectionError> {
        let mut conflicts = Vec::new();

        for modified in delta.modified_of_type(ObjectType::Column) {
            if !modified.changed("data_type") {
                continue;
            }
            let (Some(before), Some(after)) = (modified.before.as_column(), modified.after.as_column()) else {
                continue;
            };

            let analysis = TypeCompatibility::analyze_type_change(&before.data_type, &after.data_type);
            if analysis.compatible && !analysis.narrowing {
                continue;
            }

            let Some(table) = graph_b.get_table_of_object(modified.after.id) else {
                continue;
            };
            let incoming = graph_b.get_incoming(table.id, Some(&[Relation::References]));
            if incoming.is_empty() {
                continue;
            }

            let level = if analysis.compatible {
                ConflictLevel::High
            } else {
                ConflictLevel::Critical
            };

            conflicts.push(
                ConflictRecord::new(
                    self.id(),
                    level,
                    format!(
                        "Column {} changed type from {} to {}: {}",
                        modified.after.full_name(),
                        before.data_type,
                        after.data_type,
                        analysis.message
                    ),
                )
                .with_detail("table", table.full_name())
                .with_detail("column", modified.after.name.clone())
                .with_detail("old_type", before.data_type.clone())
                .with_detail("new_type", after.data_type.clone())
                .with_detail("risk", analysis.risk.as_str())
                .with_detail("incoming_references", incoming.len())
                .with_detail("referenced_by", full_names(&graph_b.referencing_tables(table.id))),
            );
        }

        Ok(conflicts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::test_support::run;

    fn schema(id_type: &str) -> String {
        format!(
            "CREATE TABLE users (id {} PRIMARY KEY);
             CREATE TABLE orders (id INT PRIMARY KEY, user_id INT REFERENCES users(id));",
            id_type
        )
    }

    #[test]
    fn incompatible_change_is_critical() {
        let conflicts = run(&IncompatibleTypeChange, &schema("INTEGER"), &schema("VARCHAR(36)"));

        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].level, ConflictLevel::Critical);
        assert_eq!(conflicts[0].details["column"], "id");
        assert_eq!(conflicts[0].details["table"], "public.users");
    }

    #[test]
    fn narrowing_change_is_high() {
        let conflicts = run(&IncompatibleTypeChange, &schema("BIGINT"), &schema("INTEGER"));

        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].level, ConflictLevel::High);
    }

    #[test]
    fn widening_change_is_ignored() {
        let conflicts = run(&IncompatibleTypeChange, &schema("INTEGER"), &schema("BIGINT"));
        assert!(conflicts.is_empty());
    }

    #[test]
    fn unreferenced_table_is_ignored() {
        let conflicts = run(
            &IncompatibleTypeChange,
            "CREATE TABLE notes (body INTEGER)",
            "CREATE TABLE notes (body VARCHAR(10))",
        );
        assert!(conflicts.is_empty());
    }
}
