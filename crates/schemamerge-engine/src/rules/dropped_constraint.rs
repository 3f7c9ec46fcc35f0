//! R4: a removed primary key, unique constraint or foreign key

use schemamerge_core::{ConflictLevel, ConflictRecord, DetectionError};
use schemamerge_graph::SchemaGraph;

use super::ConflictRule;
use crate::delta::Delta;

#[derive(Debug, Clone, Copy, Default)]
pub struct DroppedConstraint;

impl DroppedConstraint {
    pub const ID: &'static str = "R4";
}

impl ConflictRule for DroppedConstraint {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn name(&self) -> &'static str {
        "Dropped key constraint"
    }

    fn description(&self) -> &'static str {
        "A primary key, unique constraint or foreign key was removed"
    }

    fn default_level(&self) -> ConflictLevel {
        ConflictLevel::High
    }

    fn apply(
        &self,
        delta: &Delta<'_>,
        _graph_a: &SchemaGraph,
        _graph_b: &SchemaGraph,
    ) -> Result<Vec<ConflictRecord>, DetectionError> {
        let conflicts = delta
            .objects_removed
            .iter()
            .filter(|o| o.object_type().is_key_constraint())
            .map(|constraint| {
                let table = constraint.owning_table().unwrap_or_default();
                self.conflict(format!(
                    "{} {} on table {}.{} was removed",
                    constraint.object_type(),
                    constraint.name,
                    constraint.schema,
                    table
                ))
                .with_detail("constraint", constraint.name.clone())
                .with_detail("type", constraint.object_type().as_str())
                .with_detail("table", format!("{}.{}", constraint.schema, table))
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

    #[test]
    fn removed_keys_are_flagged() {
        let conflicts = run(
            &DroppedConstraint,
            "CREATE TABLE users (id INT PRIMARY KEY, email TEXT UNIQUE);
             CREATE TABLE orders (user_id INT REFERENCES users(id));",
            "CREATE TABLE users (id INT, email TEXT);
             CREATE TABLE orders (user_id INT);",
        );

        let types: Vec<&serde_json::Value> = conflicts.iter().map(|c| &c.details["type"]).collect();
        assert_eq!(types, vec![&json!("primary_key"), &json!("unique_constraint"), &json!("foreign_key")]);
        assert!(conflicts.iter().all(|c| c.level == ConflictLevel::High));
        assert_eq!(conflicts[0].details["table"], json!("public.users"));
    }

    #[test]
    fn removed_columns_are_not_constraints() {
        let conflicts = run(
            &DroppedConstraint,
            "CREATE TABLE users (id INT, nickname TEXT)",
            "CREATE TABLE users (id INT)",
        );
        assert!(conflicts.is_empty());
    }
}
