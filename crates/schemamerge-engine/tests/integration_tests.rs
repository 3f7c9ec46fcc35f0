//! End-to-end conflict detection scenarios

use std::collections::BTreeSet;
use std::path::Path;

use schemamerge_core::{
    ConflictLevel, ConflictRecord, DetectionError, DetectorConfig, EquivalenceKey, ObjectType,
    ReportStatus,
};
use schemamerge_engine::rules::DroppedReferencedTable;
use schemamerge_engine::{ConflictRule, Delta, Detector, GraphComparator, VertexMatcher};
use schemamerge_graph::{GraphBuilder, SchemaGraph};
use schemamerge_sql::StatementParser;

fn build(sql: &str, name: &str) -> SchemaGraph {
    let parsed = StatementParser::new().parse_script(sql);
    GraphBuilder::new().build_from_objects(&parsed.objects, name)
}

fn detect(a: &str, b: &str) -> Vec<ConflictRecord> {
    let detector = Detector::new(DetectorConfig::default()).unwrap();
    let report = detector.detect(a, b);
    assert_eq!(report.status, ReportStatus::Ok);
    report.conflicts
}

fn by_rule<'a>(conflicts: &'a [ConflictRecord], rule: &str) -> Vec<&'a ConflictRecord> {
    conflicts.iter().filter(|c| c.rule == rule).collect()
}

#[test]
fn dropping_referenced_table_is_critical() {
    let a = "CREATE TABLE users (id INT PRIMARY KEY);
             CREATE TABLE orders (id INT PRIMARY KEY, user_id INT REFERENCES users(id));";
    let b = "CREATE TABLE orders (id INT PRIMARY KEY, user_id INT REFERENCES users(id));";

    let conflicts = detect(a, b);
    let r1 = by_rule(&conflicts, "R1");

    assert_eq!(r1.len(), 1);
    assert_eq!(r1[0].level, ConflictLevel::Critical);
    assert!(r1[0].message.contains("users"));
    assert_eq!(r1[0].details["table"], "public.users");
}

#[test]
fn not_null_without_default_is_high() {
    let a = "CREATE TABLE users (id INT PRIMARY KEY, email TEXT);";
    let b = "CREATE TABLE users (id INT PRIMARY KEY, email TEXT NOT NULL);";

    let conflicts = detect(a, b);
    let r6 = by_rule(&conflicts, "R6");
    assert_eq!(r6.len(), 1);
    assert_eq!(r6[0].level, ConflictLevel::High);
    assert!(r6[0].message.contains("email"));

    let with_default = "CREATE TABLE users (id INT PRIMARY KEY, email TEXT NOT NULL DEFAULT 'none');";
    assert!(by_rule(&detect(a, with_default), "R6").is_empty());
}

#[test]
fn mutual_references_form_a_cycle() {
    let a = "CREATE TABLE a (id INT PRIMARY KEY); CREATE TABLE b (id INT PRIMARY KEY);";
    let b = "CREATE TABLE a (id INT PRIMARY KEY, b_id INT REFERENCES b(id));
             CREATE TABLE b (id INT PRIMARY KEY, a_id INT REFERENCES a(id));";

    let conflicts = detect(a, b);
    let r7 = by_rule(&conflicts, "R7");

    assert!(!r7.is_empty());
    assert!(r7.iter().all(|c| c.level == ConflictLevel::Critical));

    let cycle = r7[0].details["cycle"].as_array().unwrap();
    let tables: Vec<&str> = cycle.iter().filter_map(|v| v.as_str()).collect();
    assert!(tables.contains(&"public.a"));
    assert!(tables.contains(&"public.b"));
}

#[test]
fn incompatible_type_change_on_referenced_table() {
    let schema = |id_type: &str| {
        format!(
            "CREATE TABLE users (id {} PRIMARY KEY);
             CREATE TABLE orders (id INT PRIMARY KEY, user_id INTEGER REFERENCES users(id));",
            id_type
        )
    };

    let conflicts = detect(&schema("INTEGER"), &schema("VARCHAR(36)"));
    let r2 = by_rule(&conflicts, "R2");
    assert_eq!(r2.len(), 1);
    assert_eq!(r2[0].level, ConflictLevel::Critical);

    let widened = detect(&schema("INTEGER"), &schema("BIGINT"));
    assert!(by_rule(&widened, "R2").is_empty());
}

struct Panicking;

impl ConflictRule for Panicking {
    fn id(&self) -> &'static str {
        "P1"
    }

    fn name(&self) -> &'static str {
        "Panicking"
    }

    fn description(&self) -> &'static str {
        "Always panics"
    }

    fn default_level(&self) -> ConflictLevel {
        ConflictLevel::Critical
    }

    fn apply(&self, _: &Delta<'_>, _: &SchemaGraph, _: &SchemaGraph) -> Result<Vec<ConflictRecord>, DetectionError> {
        panic!("rule exploded")
    }
}

struct Erroring;

impl ConflictRule for Erroring {
    fn id(&self) -> &'static str {
        "E1"
    }

    fn name(&self) -> &'static str {
        "Erroring"
    }

    fn description(&self) -> &'static str {
        "Always fails"
    }

    fn default_level(&self) -> ConflictLevel {
        ConflictLevel::High
    }

    fn apply(&self, _: &Delta<'_>, _: &SchemaGraph, _: &SchemaGraph) -> Result<Vec<ConflictRecord>, DetectionError> {
        Err(DetectionError::rule("E1", "missing precondition"))
    }
}

#[test]
fn failing_rules_do_not_affect_others() {
    let rules: Vec<Box<dyn ConflictRule>> = vec![
        Box::new(Erroring),
        Box::new(Panicking),
        Box::new(DroppedReferencedTable),
    ];
    let detector = Detector::with_rules(DetectorConfig::default(), rules).unwrap();

    let a = "CREATE TABLE users (id INT PRIMARY KEY);
             CREATE TABLE orders (user_id INT REFERENCES users(id));";
    let report = detector.detect(a, "CREATE TABLE orders (user_id INT);");

    assert_eq!(report.status, ReportStatus::Ok);
    assert_eq!(report.conflicts.len(), 1);
    assert_eq!(report.conflicts[0].rule, "R1");

    let applied: Vec<(&str, bool)> = report
        .statistics
        .iter()
        .map(|s| (s.rule_id.as_str(), s.applied))
        .collect();
    assert_eq!(applied, vec![("E1", false), ("P1", false), ("R1", true)]);

    let panicked = report.statistics.iter().find(|s| s.rule_id == "P1").unwrap();
    assert!(panicked.error.as_deref().unwrap_or_default().contains("rule exploded"));
    assert_eq!(report.analysis.map(|a| a.rules_applied), Some(1));
}

fn keys(objects: &[&schemamerge_core::SchemaObject]) -> BTreeSet<EquivalenceKey> {
    objects.iter().map(|o| o.equivalence_key()).collect()
}

#[test]
fn delta_matches_key_set_difference() {
    let a = build(
        "CREATE TABLE users (id INT PRIMARY KEY, email TEXT, nickname TEXT);
         CREATE TABLE sessions (token TEXT PRIMARY KEY, user_id INT REFERENCES users(id));",
        "a",
    );
    let b = build(
        "CREATE TABLE users (id INT PRIMARY KEY, email VARCHAR(200) NOT NULL, created_at TIMESTAMP);
         CREATE TABLE audit_log (id BIGINT PRIMARY KEY, note TEXT);",
        "b",
    );

    let keys_a: BTreeSet<EquivalenceKey> = a.vertices().map(|v| v.equivalence_key()).collect();
    let keys_b: BTreeSet<EquivalenceKey> = b.vertices().map(|v| v.equivalence_key()).collect();

    let delta = GraphComparator::default().compare(&a, &b).unwrap();

    assert_eq!(keys(&delta.objects_added), keys_b.difference(&keys_a).cloned().collect());
    assert_eq!(keys(&delta.objects_removed), keys_a.difference(&keys_b).cloned().collect());

    let modified: Vec<EquivalenceKey> = delta.objects_modified.iter().map(|m| m.after.equivalence_key()).collect();
    let unique: BTreeSet<&EquivalenceKey> = modified.iter().collect();
    assert_eq!(unique.len(), modified.len());

    for m in &delta.objects_modified {
        assert_ne!(m.before.attributes(), m.after.attributes());
        assert!(keys_a.contains(&m.before.equivalence_key()));
    }
    assert!(modified.iter().any(|k| k.name == "email"));
}

#[test]
fn strict_match_pairs_each_key_once() {
    let sql = "CREATE TABLE a (id INT PRIMARY KEY, x TEXT UNIQUE);
               CREATE TABLE b (id INT PRIMARY KEY, a_id INT REFERENCES a(id));";
    let a = build(sql, "a");
    let b = build(sql, "b");

    let result = VertexMatcher::default().match_graphs(&a, &b).unwrap();

    let keys_a: BTreeSet<EquivalenceKey> = result
        .pairs
        .iter()
        .filter_map(|&(id, _)| a.vertex(id))
        .map(|v| v.equivalence_key())
        .collect();
    assert_eq!(keys_a.len(), result.pairs.len());
    assert_eq!(result.pairs.len(), a.vertex_count());

    let duplicated = build(&format!("{} CREATE TABLE A (id INT);", sql), "dup");
    let err = VertexMatcher::default().match_graphs(&duplicated, &b).unwrap_err();
    assert!(matches!(err, DetectionError::VertexMatching { .. }));
}

#[test]
fn detection_is_idempotent() {
    let a = "CREATE TABLE users (id INT PRIMARY KEY, email TEXT);
             CREATE TABLE orders (id INT PRIMARY KEY, user_id INT REFERENCES users(id));";
    let b = "CREATE TABLE orders (id BIGINT PRIMARY KEY, user_id INT NOT NULL);
             CREATE TABLE items (order_id INT REFERENCES orders(id));";

    assert_eq!(detect(a, b), detect(a, b));
}

#[test]
fn declaration_order_does_not_create_edge_delta() {
    let forward = "CREATE TABLE users (id INT PRIMARY KEY);
                   CREATE TABLE orders (id INT PRIMARY KEY, user_id INT REFERENCES users(id));
                   CREATE TABLE items (order_id INT REFERENCES orders(id), sku TEXT UNIQUE);";
    let reversed = "CREATE TABLE items (order_id INT REFERENCES orders(id), sku TEXT UNIQUE);
                    CREATE TABLE orders (id INT PRIMARY KEY, user_id INT REFERENCES users(id));
                    CREATE TABLE users (id INT PRIMARY KEY);";

    let a = build(forward, "a");
    let b = build(reversed, "b");

    // Same structure, different vertex ids
    assert_ne!(
        a.find_table("public", "users").map(|t| t.id),
        b.find_table("public", "users").map(|t| t.id)
    );

    let delta = GraphComparator::default().compare(&a, &b).unwrap();
    assert!(delta.is_empty(), "unexpected delta: {:?}", delta.summary());
}

#[test]
fn config_file_controls_rules() {
    let config = DetectorConfig::from_toml(
        r#"
        [rules.R1]
        enabled = false

        [rules.R3]
        level = "CRITICAL"
        "#,
    )
    .unwrap();
    let detector = Detector::new(config).unwrap();

    let a = "CREATE TABLE users (id INT PRIMARY KEY);
             CREATE TABLE orders (user_id INT REFERENCES users(id));";
    let report = detector.detect(a, "CREATE TABLE orders (user_id INT);");

    assert!(by_rule(&report.conflicts, "R1").is_empty());
    let r3 = by_rule(&report.conflicts, "R3");
    assert_eq!(r3.len(), 1);
    assert_eq!(r3[0].level, ConflictLevel::Critical);
    assert_eq!(report.statistics.len(), 6);
}

#[test]
fn experimental_matching_still_reports_renamed_referenced_table() {
    let a = "CREATE TABLE users (id INT PRIMARY KEY);
             CREATE TABLE orders (user_id INT REFERENCES users(id));";
    let b = "CREATE TABLE accounts (id INT PRIMARY KEY);
             CREATE TABLE orders (user_id INT);";

    let mut config = DetectorConfig::default();
    config.matcher.enable_experimental_matching = true;
    let report = Detector::new(config).unwrap().detect(a, b);

    assert_eq!(report.status, ReportStatus::Ok);
    assert!(report.merge_blocked());

    let r1 = by_rule(&report.conflicts, "R1");
    assert_eq!(r1.len(), 1);
    assert_eq!(r1[0].details["table"], "public.users");
    assert_eq!(by_rule(&report.conflicts, "R3").len(), 1);

    // Same verdict as plain key matching
    let strict = detect(a, b);
    assert_eq!(by_rule(&strict, "R1").len(), 1);
    assert_eq!(by_rule(&strict, "R3").len(), 1);
}

#[test]
fn self_referencing_table_is_a_cycle_by_default() {
    let b = "CREATE TABLE nodes (id INT PRIMARY KEY, parent_id INT REFERENCES nodes(id));";

    let conflicts = detect("CREATE TABLE nodes (id INT PRIMARY KEY);", b);
    let r7 = by_rule(&conflicts, "R7");
    assert_eq!(r7.len(), 1);
    assert_eq!(r7[0].details["cycle"], serde_json::json!(["public.nodes"]));

    let config = DetectorConfig::from_toml(
        r#"
        [rules.R7]
        include_self_references = false
        "#,
    )
    .unwrap();
    let report = Detector::new(config).unwrap().detect("", b);
    assert!(by_rule(&report.conflicts, "R7").is_empty());
}

#[test]
fn overlapping_unique_declarations_still_match() {
    let a = "CREATE TABLE t (a INT, b INT, a_b INT, UNIQUE (a_b), UNIQUE (a, b), UNIQUE (a, b));";
    let b = "CREATE TABLE t (a INT, b INT, a_b INT UNIQUE, UNIQUE (a, b));";

    let graph_a = build(a, "a");
    let graph_b = build(b, "b");
    assert!(VertexMatcher::default().match_graphs(&graph_a, &graph_b).is_ok());

    // Both sides declare the same two unique sets
    let delta = GraphComparator::default().compare(&graph_a, &graph_b).unwrap();
    assert_eq!(delta.added_of_type(ObjectType::UniqueConstraint).count(), 0);
    assert_eq!(delta.removed_of_type(ObjectType::UniqueConstraint).count(), 0);

    // Fails on anything but an Ok report
    detect(a, b);
}

#[test]
fn detect_fixture_scripts() {
    let base = Path::new("../../fixtures/base.sql");
    let target = Path::new("../../fixtures/target.sql");

    if base.exists() && target.exists() {
        let a = std::fs::read_to_string(base).unwrap();
        let b = std::fs::read_to_string(target).unwrap();

        let report = Detector::new(DetectorConfig::default()).unwrap().detect(&a, &b);
        assert_eq!(report.status, ReportStatus::Ok);
        assert!(report.merge_blocked());
        assert!(report.to_json().unwrap().contains("\"merge_blocked\": true"));
    }
}
