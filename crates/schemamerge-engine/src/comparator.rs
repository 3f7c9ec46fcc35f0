//! Graph comparison
//!
//! Turns the vertex pairs produced by the [`VertexMatcher`] into a [`Delta`].

use std::collections::HashSet;
use tracing::debug;

use schemamerge_core::{DetectionError, MatcherConfig};
use schemamerge_graph::{Edge, SchemaGraph};

use crate::delta::{Delta, ModifiedObject};
use crate::matcher::{MatchResult, VertexMatcher};

/// Compares two schema graphs
#[derive(Debug, Clone, Default)]
pub struct GraphComparator {
    matcher: VertexMatcher,
}

impl GraphComparator {
    pub fn new(config: MatcherConfig) -> Self {
        Self {
            matcher: VertexMatcher::new(config),
        }
    }

    pub fn with_matcher(matcher: VertexMatcher) -> Self {
        Self { matcher }
    }

    pub fn matcher(&self) -> &VertexMatcher {
        &self.matcher
    }

    /// Compute the delta from graph `a` (base) to graph `b` (target)
    ///
    /// Fails only when the matcher does, i.e. on duplicate keys in strict mode.
    pub fn compare<'a>(&self, a: &'a SchemaGraph, b: &'a SchemaGraph) -> Result<Delta<'a>, DetectionError> {
        let matched = self.matcher.match_graphs(a, b)?;

        let objects_removed = matched.unique_a.iter().filter_map(|&id| a.vertex(id)).collect();
        let objects_added = matched.unique_b.iter().filter_map(|&id| b.vertex(id)).collect();

        let objects_modified = matched
            .pairs
            .iter()
            .filter_map(|&(id_a, id_b)| ModifiedObject::between(a.vertex(id_a)?, b.vertex(id_b)?))
            .collect();

        let (edges_added, edges_removed) = compare_edges(a, b, &matched);

        let delta = Delta {
            objects_added,
            objects_removed,
            objects_modified,
            edges_added,
            edges_removed,
        };

        debug!(
            added = delta.objects_added.len(),
            removed = delta.objects_removed.len(),
            modified = delta.objects_modified.len(),
            edges_added = delta.edges_added.len(),
            edges_removed = delta.edges_removed.len(),
            "Compared {} with {}",
            a.name(),
            b.name()
        );

        Ok(delta)
    }
}

/// An edge survives when both endpoints are matched and the mapped edge
/// exists on the other side
fn compare_edges(a: &SchemaGraph, b: &SchemaGraph, matched: &MatchResult) -> (Vec<Edge>, Vec<Edge>) {
    let forward = matched.forward();
    let backward = matched.backward();

    let edges_a: HashSet<Edge> = a.edges().copied().collect();
    let edges_b: HashSet<Edge> = b.edges().copied().collect();

    let removed = a
        .edges()
        .filter(|e| {
            let mapped = forward
                .get(&e.src)
                .zip(forward.get(&e.dst))
                .map(|(&src, &dst)| Edge::new(src, dst, e.relation));
            !mapped.map_or(false, |m| edges_b.contains(&m))
        })
        .copied()
        .collect();

    let added = b
        .edges()
        .filter(|e| {
            let mapped = backward
                .get(&e.src)
                .zip(backward.get(&e.dst))
                .map(|(&src, &dst)| Edge::new(src, dst, e.relation));
            !mapped.map_or(false, |m| edges_a.contains(&m))
        })
        .copied()
        .collect();

    (added, removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use schemamerge_core::ObjectType;
    use schemamerge_graph::{GraphBuilder, Relation};
    use schemamerge_sql::StatementParser;

    fn build(sql: &str, name: &str) -> SchemaGraph {
        let parsed = StatementParser::new().parse_script(sql);
        GraphBuilder::new().build_from_objects(&parsed.objects, name)
    }

    #[test]
    fn identical_graphs_have_empty_delta() {
        let sql = "CREATE TABLE users (id INT PRIMARY KEY);
                   CREATE TABLE orders (id INT PRIMARY KEY, user_id INT REFERENCES users(id));";
        let a = build(sql, "a");
        let b = build(sql, "b");

        let delta = GraphComparator::default().compare(&a, &b).unwrap();
        assert!(delta.is_empty());
    }

    #[test]
    fn dropped_table_is_removed_with_its_edges() {
        let a = build(
            "CREATE TABLE users (id INT PRIMARY KEY);
             CREATE TABLE orders (id INT PRIMARY KEY, user_id INT REFERENCES users(id));",
            "a",
        );
        let b = build("CREATE TABLE orders (id INT PRIMARY KEY, user_id INT);", "b");

        let delta = GraphComparator::default().compare(&a, &b).unwrap();

        let removed: Vec<String> = delta.objects_removed.iter().map(|o| o.full_name()).collect();
        assert!(removed.contains(&"public.users".to_string()));
        assert_eq!(delta.removed_of_type(ObjectType::ForeignKey).count(), 1);
        assert!(delta.objects_added.is_empty());
        assert!(delta.edges_removed.iter().any(|e| e.relation == Relation::References));
        assert!(delta.edges_added.is_empty());

        // orders lost its foreign key, so the table and the column are modified
        let modified: Vec<String> = delta.objects_modified.iter().map(|m| m.after.full_name()).collect();
        assert_eq!(modified, vec!["public.orders", "public.orders.user_id"]);
    }

    #[test]
    fn added_column_shows_up_in_delta() {
        let a = build("CREATE TABLE users (id INT)", "a");
        let b = build("CREATE TABLE users (id INT, email TEXT)", "b");

        let delta = GraphComparator::default().compare(&a, &b).unwrap();
        assert_eq!(delta.objects_added.len(), 1);
        assert_eq!(delta.objects_added[0].name, "email");
        assert_eq!(delta.edges_added.len(), 1);
        assert!(delta.objects_modified[0].changed("columns"));
    }

    #[test]
    fn experimental_pairs_across_rename_are_modified() {
        let a = build(
            "CREATE TABLE users (id INT PRIMARY KEY);
             CREATE TABLE orders (user_id INT REFERENCES users(id));",
            "a",
        );
        let b = build("CREATE TABLE accounts (id INT PRIMARY KEY); CREATE TABLE orders (user_id INT);", "b");

        let comparator = GraphComparator::new(MatcherConfig {
            enable_experimental_matching: true,
            ..MatcherConfig::default()
        });
        let delta = comparator.compare(&a, &b).unwrap();

        let renamed: Vec<(String, String)> = delta
            .objects_modified
            .iter()
            .filter(|m| m.is_renamed())
            .map(|m| (m.before.name.clone(), m.after.name.clone()))
            .collect();
        assert!(renamed.contains(&("users".to_string(), "accounts".to_string())));

        let vanished: Vec<String> = delta.vanished_tables().map(|t| t.full_name()).collect();
        assert_eq!(vanished, vec!["public.users"]);
    }

    #[test]
    fn strict_duplicates_propagate() {
        let a = build("CREATE TABLE t (id INT); CREATE TABLE t (id INT);", "a");
        let b = build("CREATE TABLE t (id INT)", "b");

        let err = GraphComparator::default().compare(&a, &b).unwrap_err();
        assert!(matches!(err, DetectionError::VertexMatching { .. }));
    }
}
