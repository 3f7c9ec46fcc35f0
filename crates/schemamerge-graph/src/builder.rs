//! Graph construction from parsed schema objects
//!
//! Three passes over the object list. Later passes look up vertex ids
//! assigned by earlier ones:
//! 1. tables
//! 2. columns, primary keys and unique constraints
//! 3. foreign keys

use std::collections::{HashMap, HashSet};
use tracing::debug;

use schemamerge_core::naming::fold_identifier;
use schemamerge_core::{
    ForeignKeyInfo, ForeignKeyRef, KeyConstraintInfo, ObjectKind, SchemaObject, TableInfo, VertexId,
};

use crate::graph::{Relation, SchemaGraph};

type TableKey = (String, String);

fn table_key(schema: &str, table: &str) -> TableKey {
    (fold_identifier(schema), fold_identifier(table))
}

/// Builds one [`SchemaGraph`] per schema snapshot
#[derive(Debug, Clone, Default)]
pub struct GraphBuilder;

impl GraphBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Build the graph of one snapshot
    ///
    /// Foreign keys whose target table is not part of `objects` are skipped.
    /// Objects other than tables are ignored.
    pub fn build_from_objects(&self, objects: &[SchemaObject], name: &str) -> SchemaGraph {
        let mut graph = SchemaGraph::new(name);
        let mut table_ids: HashMap<TableKey, VertexId> = HashMap::new();

        // Pass 1: tables
        let mut tables: Vec<(VertexId, &SchemaObject, &TableInfo)> = Vec::new();
        for object in objects {
            let Some(info) = object.as_table() else {
                continue;
            };

            let id = graph.add_vertex(object.clone());
            let key = table_key(&object.schema, &object.name);
            if table_ids.contains_key(&key) {
                debug!(graph = name, table = %object.full_name(), "Table defined more than once");
            }
            table_ids.entry(key).or_insert(id);
            tables.push((id, object, info));
        }

        // Pass 2: columns and key constraints
        for (table_id, table, info) in &tables {
            add_columns(&mut graph, *table_id, table, info);
        }

        // Pass 3: foreign keys
        for (table_id, table, info) in &tables {
            add_foreign_keys(&mut graph, &table_ids, *table_id, table, info);
        }

        debug!(
            graph = name,
            vertices = graph.vertex_count(),
            edges = graph.edge_count(),
            "Built schema graph"
        );

        graph
    }
}

fn add_columns(graph: &mut SchemaGraph, table_id: VertexId, table: &SchemaObject, info: &TableInfo) {
    let mut column_ids: HashMap<String, VertexId> = HashMap::new();

    for column in &info.columns {
        let column_id = graph.add_vertex(column.clone());
        connect(graph, column_id, table_id, Relation::Contains);
        column_ids.insert(fold_identifier(&column.name), column_id);
    }

    // One aggregated primary key per table
    let pk_columns = info.primary_key_columns();
    if !pk_columns.is_empty() {
        add_key_constraint(
            graph,
            table_id,
            &column_ids,
            SchemaObject::new(
                table.schema.clone(),
                format!("pk_{}", table.name),
                ObjectKind::PrimaryKey(KeyConstraintInfo {
                    table: table.name.clone(),
                    columns: pk_columns,
                }),
            ),
        );
    }

    let single_unique = info.columns.iter().filter_map(|c| {
        let column = c.as_column()?;
        (column.is_unique && !column.is_primary_key).then(|| vec![c.name.clone()])
    });
    let unique_sets: Vec<Vec<String>> = single_unique.chain(info.unique_constraints.iter().cloned()).collect();

    // Same column set declared twice is one constraint
    let mut seen: HashSet<Vec<String>> = HashSet::new();
    for columns in unique_sets {
        if !seen.insert(columns.iter().map(|c| fold_identifier(c)).collect()) {
            debug!(table = %table.full_name(), columns = ?columns, "Skipping repeated unique constraint");
            continue;
        }

        add_key_constraint(
            graph,
            table_id,
            &column_ids,
            SchemaObject::new(
                table.schema.clone(),
                format!("uq_{}_{}", table.name, columns.join(",")),
                ObjectKind::UniqueConstraint(KeyConstraintInfo {
                    table: table.name.clone(),
                    columns,
                }),
            ),
        );
    }
}

/// Insert a PK or unique vertex: `DependsOn` each column, `Contains` the table
fn add_key_constraint(
    graph: &mut SchemaGraph,
    table_id: VertexId,
    column_ids: &HashMap<String, VertexId>,
    constraint: SchemaObject,
) {
    let columns = match &constraint.kind {
        ObjectKind::PrimaryKey(info) | ObjectKind::UniqueConstraint(info) => info.columns.clone(),
        _ => Vec::new(),
    };

    let constraint_id = graph.add_vertex(constraint);
    for column in &columns {
        match column_ids.get(&fold_identifier(column)) {
            Some(&column_id) => connect(graph, constraint_id, column_id, Relation::DependsOn),
            None => debug!(column = %column, "Key constraint names an unknown column"),
        }
    }
    connect(graph, constraint_id, table_id, Relation::Contains);
}

fn add_foreign_keys(
    graph: &mut SchemaGraph,
    table_ids: &HashMap<TableKey, VertexId>,
    table_id: VertexId,
    table: &SchemaObject,
    info: &TableInfo,
) {
    let mut seen: HashSet<String> = HashSet::new();

    for fk in &info.foreign_keys {
        let Some(&target_id) = table_ids.get(&table_key(&fk.referenced_schema, &fk.referenced_table)) else {
            debug!(
                table = %table.full_name(),
                target = %fk.qualified_target(),
                "Skipping foreign key to unknown table"
            );
            continue;
        };

        let name = foreign_key_name(&table.name, fk);
        if !seen.insert(name.clone()) {
            continue;
        }

        let to_column = if fk.referenced_columns.is_empty() {
            // Omitted column list means the target's primary key
            graph
                .vertex(target_id)
                .and_then(SchemaObject::as_table)
                .map(|t| t.primary_key_columns().join(","))
                .unwrap_or_default()
        } else {
            fk.referenced_column_list()
        };

        let to_schema = graph
            .vertex(target_id)
            .map(|t| t.schema.clone())
            .unwrap_or_else(|| fk.referenced_schema.clone());

        let fk_object = SchemaObject::new(
            table.schema.clone(),
            name,
            ObjectKind::ForeignKey(ForeignKeyInfo {
                from_table: table.name.clone(),
                from_column: fk.column_list(),
                to_schema,
                to_table: fk.referenced_table.clone(),
                to_column,
            }),
        );

        let fk_id = graph.add_vertex(fk_object);
        connect(graph, fk_id, table_id, Relation::DependsOn);
        connect(graph, fk_id, target_id, Relation::References);
    }
}

/// `fk_{table}_{columns}_{target}`, columns comma-separated
fn foreign_key_name(table: &str, fk: &ForeignKeyRef) -> String {
    format!("fk_{}_{}_{}", table, fk.columns.join(","), fk.referenced_table)
}

/// Add an edge whose endpoints were just inserted
fn connect(graph: &mut SchemaGraph, src: VertexId, dst: VertexId, relation: Relation) {
    if let Err(e) = graph.add_edge(src, dst, relation) {
        debug!(error = %e, "Dropping edge");
    }
}
