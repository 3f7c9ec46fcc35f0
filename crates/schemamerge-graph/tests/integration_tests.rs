//! Integration tests for graph construction and queries

use schemamerge_core::ObjectType;
use schemamerge_graph::{GraphBuilder, Relation, SchemaGraph};
use schemamerge_sql::StatementParser;

fn build(sql: &str) -> SchemaGraph {
    let parsed = StatementParser::new().parse_script(sql);
    GraphBuilder::new().build_from_objects(&parsed.objects, "snapshot")
}

const STORE: &str = "
    CREATE TABLE customers (id INT PRIMARY KEY, email TEXT NOT NULL UNIQUE);
    CREATE TABLE orders (
        id INT PRIMARY KEY,
        customer_id INT NOT NULL REFERENCES customers (id)
    );
    CREATE TABLE order_items (
        order_id INT REFERENCES orders (id),
        sku TEXT,
        PRIMARY KEY (order_id, sku)
    );
    CREATE TABLE audit (id INT, note TEXT);
";

#[test]
fn removal_impact_reaches_indirect_referrers() {
    let graph = build(STORE);
    let customers = graph.find_table("public", "customers").unwrap();

    let direct: Vec<&str> = graph
        .referencing_tables(customers.id)
        .iter()
        .map(|t| t.name.as_str())
        .collect();
    assert_eq!(direct, vec!["orders"]);

    let indirect: Vec<&str> = graph
        .transitive_referencing_tables(customers.id)
        .iter()
        .map(|t| t.name.as_str())
        .collect();
    assert_eq!(indirect, vec!["orders", "order_items"]);
}

#[test]
fn everything_of_a_table_depends_on_it() {
    let graph = build(STORE);
    let customers = graph.find_table("public", "customers").unwrap();

    let dependents = graph.transitive_dependents(customers.id, None);
    let kinds: Vec<ObjectType> = dependents.iter().map(|o| o.object_type()).collect();

    assert!(kinds.contains(&ObjectType::Column));
    assert!(kinds.contains(&ObjectType::PrimaryKey));
    assert!(kinds.contains(&ObjectType::UniqueConstraint));
    assert!(kinds.contains(&ObjectType::ForeignKey));
    assert!(dependents.iter().all(|o| o.id != customers.id));
}

#[test]
fn isolated_table_has_no_references() {
    let graph = build(STORE);
    let audit = graph.find_table("public", "audit").unwrap();

    assert!(graph.get_incoming(audit.id, Some(&[Relation::References])).is_empty());
    assert!(graph.referencing_tables(audit.id).is_empty());
    assert!(graph.find_cycles(&[Relation::References]).is_empty());
}

#[test]
fn counts_match_vertices_and_edges() {
    let graph = build(STORE);
    let counts = graph.counts();
    assert_eq!(counts.vertices, graph.vertices().count());
    assert_eq!(counts.edges, graph.edges().count());
    assert_eq!(graph.name(), "snapshot");
}
