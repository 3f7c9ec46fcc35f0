//! R5: a primary key whose definition changed

use schemamerge_core::{ConflictLevel, ConflictRecord, DetectionError, ObjectType};
use schemamerge_graph::SchemaGraph;

use super::ConflictRule;
use crate::delta::Delta;

#[derive(Debug, Clone, Copy, Default)]
pub struct PrimaryKeyChange;

impl PrimaryKeyChange {
    pub const ID: &'static str = "R5";
}

impl ConflictRule for PrimaryKeyChange {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn name(&self) -> &'static str {
        "Primary key change"
    }

    fn description(&self) -> &'static str {
        "The columns of a primary key changed"
    }

    fn default_level(&self) -> ConflictLevel {
        ConflictLevel::Critical
    }

    fn apply(
        &self,
        delta: &Delta<'_>,
        _graph_a: &SchemaGraph,
        _graph_b: &SchemaGraph,
    ) -> Result<Vec<ConflictRecord>, DetectionError> {
        let conflicts = delta
            .modified_of_type(ObjectType::PrimaryKey)
            .map(|modified| {
                let table = format!(
                    "{}.{}",
                    modified.after.schema,
                    modified.after.owning_table().unwrap_or_default()
                );
                let fields: Vec<&str> = modified.changed_fields.iter().map(String::as_str).collect();

                let mut conflict = self
                    .conflict(format!("Primary key of table {} was modified", table))
                    .with_detail("table", table)
                    .with_detail("constraint", modified.after.name.clone())
                    .with_detail("changed_fields", fields);
                if let Some(old) = modified.old_value("columns") {
                    conflict = conflict.with_detail("old_columns", old);
                }
                if let Some(new) = modified.new_value("columns") {
                    conflict = conflict.with_detail("new_columns", new);
                }
                conflict
            })
            .collect();

        Ok(conflicts)
    }
}
