//! R6: a nullable column made NOT NULL without a default

use schemamerge_core::{ConflictLevel, ConflictRecord, DetectionError, ObjectType};
use schemamerge_graph::SchemaGraph;

use super::ConflictRule;
use crate::delta::Delta;

#[derive(Debug, Clone, Copy, Default)]
pub struct NotNullWithoutDefault;

impl NotNullWithoutDefault {
    pub const ID: &'static str = "R6";
}

impl ConflictRule for NotNullWithoutDefault {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn name(&self) -> &'static str {
        "NOT NULL without default"
    }

    fn description(&self) -> &'static str {
        "A nullable column became NOT NULL and has no default for existing rows"
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
        let mut conflicts = Vec::new();

        for modified in delta.modified_of_type(ObjectType::Column) {
            let (Some(before), Some(after)) = (modified.before.as_column(), modified.after.as_column()) else {
                continue;
            };

            if !(before.is_nullable() && !after.is_nullable()) || after.default.is_some() {
                continue;
            }

            let column = modified.after.full_name();
            conflicts.push(
                self.conflict(format!("Column {} became NOT NULL without a default value", column))
                    .with_detail("column", column)
                    .with_detail("table", format!("{}.{}", modified.after.schema, after.table))
                    .with_detail("data_type", after.data_type.clone()),
            );
        }

        Ok(conflicts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::test_support::run;

    #[test]
    fn not_null_without_default_is_high() {
        let conflicts = run(
            &NotNullWithoutDefault,
            "CREATE TABLE users (id INT, email TEXT)",
            "CREATE TABLE users (id INT, email TEXT NOT NULL)",
        );

        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].level, ConflictLevel::High);
        assert_eq!(conflicts[0].details["column"], "public.users.email");
    }

    #[test]
    fn default_suppresses_conflict() {
        let conflicts = run(
            &NotNullWithoutDefault,
            "CREATE TABLE users (id INT, email TEXT)",
            "CREATE TABLE users (id INT, email TEXT NOT NULL DEFAULT '')",
        );
        assert!(conflicts.is_empty());
    }

    #[test]
    fn relaxing_is_ignored() {
        let conflicts = run(
            &NotNullWithoutDefault,
            "CREATE TABLE users (email TEXT NOT NULL)",
            "CREATE TABLE users (email TEXT)",
        );
        assert!(conflicts.is_empty());
    }
}
