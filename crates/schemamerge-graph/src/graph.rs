//! Directed labeled graph over schema objects
//!
//! Vertices live in an insert-only arena keyed by sequential id, so ids stay
//! valid for the lifetime of the graph. Ids are local to one graph.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

use schemamerge_core::naming::fold_identifier;
use schemamerge_core::{DetectionError, GraphCounts, ObjectType, SchemaObject, VertexId};

/// Edge label
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    /// Part-of: column or constraint -> table
    Contains,
    /// Foreign key -> referenced table
    References,
    /// Constraint -> the column or table it is defined on
    DependsOn,
    EnforcedBy,
    ComposedOf,
    Uses,
    Triggers,
}

impl Relation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Contains => "contains",
            Self::References => "references",
            Self::DependsOn => "depends_on",
            Self::EnforcedBy => "enforced_by",
            Self::ComposedOf => "composed_of",
            Self::Uses => "uses",
            Self::Triggers => "triggers",
        }
    }
}

impl std::fmt::Display for Relation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A directed edge, compared by value
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub src: VertexId,
    pub dst: VertexId,
    pub relation: Relation,
}

impl Edge {
    pub fn new(src: VertexId, dst: VertexId, relation: Relation) -> Self {
        Self { src, dst, relation }
    }

    fn matches(&self, relations: Option<&[Relation]>) -> bool {
        relations.map_or(true, |allowed| allowed.contains(&self.relation))
    }
}

/// Graph of one schema snapshot
#[derive(Debug, Clone)]
pub struct SchemaGraph {
    name: String,
    next_id: VertexId,
    vertices: BTreeMap<VertexId, SchemaObject>,
    edges: BTreeSet<Edge>,
}

impl Default for SchemaGraph {
    fn default() -> Self {
        Self::new("")
    }
}

impl SchemaGraph {
    /// Create an empty graph; the first vertex gets id 1
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            next_id: 1,
            vertices: BTreeMap::new(),
            edges: BTreeSet::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Insert a vertex, assigning its id
    pub fn add_vertex(&mut self, mut object: SchemaObject) -> VertexId {
        let id = self.next_id;
        object.id = id;
        self.vertices.insert(id, object);
        self.next_id += 1;
        id
    }

    /// Insert an edge between existing vertices
    ///
    /// Returns false if an identical edge already exists.
    pub fn add_edge(&mut self, src: VertexId, dst: VertexId, relation: Relation) -> Result<bool, DetectionError> {
        if !self.has_vertex(src) || !self.has_vertex(dst) {
            return Err(DetectionError::GraphBuilding {
                message: format!("edge {} -[{}]-> {} has a missing endpoint", src, relation, dst),
            });
        }
        Ok(self.edges.insert(Edge::new(src, dst, relation)))
    }

    pub fn vertex(&self, id: VertexId) -> Option<&SchemaObject> {
        self.vertices.get(&id)
    }

    pub fn has_vertex(&self, id: VertexId) -> bool {
        self.vertices.contains_key(&id)
    }

    /// Vertices in id order
    pub fn vertices(&self) -> impl Iterator<Item = &SchemaObject> {
        self.vertices.values()
    }

    /// Edges in (src, dst, relation) order
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn counts(&self) -> GraphCounts {
        GraphCounts {
            vertices: self.vertex_count(),
            edges: self.edge_count(),
        }
    }

    /// Vertices of one object type in id order
    pub fn vertices_of_type(&self, object_type: ObjectType) -> impl Iterator<Item = &SchemaObject> {
        self.vertices.values().filter(move |v| v.object_type() == object_type)
    }

    /// Find a table by case- and quote-insensitive schema and name
    pub fn find_table(&self, schema: &str, name: &str) -> Option<&SchemaObject> {
        let (schema, name) = (fold_identifier(schema), fold_identifier(name));
        self.vertices_of_type(ObjectType::Table)
            .find(|t| fold_identifier(&t.schema) == schema && fold_identifier(&t.name) == name)
    }

    /// Edges leaving `id`, optionally restricted to `relations`
    pub fn get_outgoing(&self, id: VertexId, relations: Option<&[Relation]>) -> Vec<&Edge> {
        self.edges
            .iter()
            .filter(|e| e.src == id && e.matches(relations))
            .collect()
    }

    /// Edges entering `id`, optionally restricted to `relations`
    pub fn get_incoming(&self, id: VertexId, relations: Option<&[Relation]>) -> Vec<&Edge> {
        self.edges
            .iter()
            .filter(|e| e.dst == id && e.matches(relations))
            .collect()
    }

    /// Objects `id` points to
    pub fn get_dependencies(&self, id: VertexId, relations: Option<&[Relation]>) -> Vec<&SchemaObject> {
        self.get_outgoing(id, relations)
            .into_iter()
            .filter_map(|e| self.vertex(e.dst))
            .collect()
    }

    /// Objects pointing at `id`
    pub fn get_dependents(&self, id: VertexId, relations: Option<&[Relation]>) -> Vec<&SchemaObject> {
        self.get_incoming(id, relations)
            .into_iter()
            .filter_map(|e| self.vertex(e.src))
            .collect()
    }

    /// Every object that reaches `id` over incoming edges, in id order
    ///
    /// `id` itself is only included if it lies on a cycle.
    pub fn transitive_dependents(&self, id: VertexId, relations: Option<&[Relation]>) -> Vec<&SchemaObject> {
        let mut visited = HashSet::new();
        let mut found = BTreeSet::new();
        let mut queue = VecDeque::from([id]);

        while let Some(current) = queue.pop_front() {
            if !visited.insert(current) {
                continue;
            }

            for edge in self.get_incoming(current, relations) {
                found.insert(edge.src);
                if !visited.contains(&edge.src) {
                    queue.push_back(edge.src);
                }
            }
        }

        found.into_iter().filter_map(|v| self.vertex(v)).collect()
    }

    /// Table containing `id`, or the object itself if it is a table
    pub fn get_table_of_object(&self, id: VertexId) -> Option<&SchemaObject> {
        let object = self.vertex(id)?;
        if object.object_type() == ObjectType::Table {
            return Some(object);
        }

        self.get_dependencies(id, Some(&[Relation::Contains]))
            .into_iter()
            .find(|t| t.object_type() == ObjectType::Table)
    }

    /// Like [`get_table_of_object`](Self::get_table_of_object), but a foreign
    /// key resolves to the table it is declared on
    pub fn owner_table(&self, id: VertexId) -> Option<&SchemaObject> {
        if let Some(table) = self.get_table_of_object(id) {
            return Some(table);
        }

        match self.vertex(id)?.object_type() {
            ObjectType::ForeignKey => self
                .get_dependencies(id, Some(&[Relation::DependsOn]))
                .into_iter()
                .find(|t| t.object_type() == ObjectType::Table),
            _ => None,
        }
    }

    /// Tables whose foreign keys reference `table`
    pub fn referencing_tables(&self, table: VertexId) -> Vec<&SchemaObject> {
        let owners: BTreeSet<VertexId> = self
            .get_incoming(table, Some(&[Relation::References]))
            .into_iter()
            .filter_map(|e| self.owner_table(e.src))
            .map(|t| t.id)
            .collect();

        owners.into_iter().filter_map(|id| self.vertex(id)).collect()
    }

    /// Tables that reach `table` through one or more foreign keys, in id order
    pub fn transitive_referencing_tables(&self, table: VertexId) -> Vec<&SchemaObject> {
        let mut visited = HashSet::from([table]);
        let mut found = BTreeSet::new();
        let mut queue = VecDeque::from([table]);

        while let Some(current) = queue.pop_front() {
            for referrer in self.referencing_tables(current) {
                if visited.insert(referrer.id) {
                    found.insert(referrer.id);
                    queue.push_back(referrer.id);
                }
            }
        }

        found.into_iter().filter_map(|id| self.vertex(id)).collect()
    }

    /// Elementary cycles over `relations`, with each edge source lifted to
    /// its owning table
    ///
    /// With `Relation::References` this yields table-level foreign key
    /// cycles. Every cycle is rotated to start at its smallest id and is
    /// reported once. Single-vertex cycles are self references.
    pub fn find_cycles(&self, relations: &[Relation]) -> Vec<Vec<&SchemaObject>> {
        let mut adjacency: BTreeMap<VertexId, BTreeSet<VertexId>> = BTreeMap::new();
        for edge in self.edges.iter().filter(|e| relations.contains(&e.relation)) {
            let src = self.owner_table(edge.src).map(|t| t.id).unwrap_or(edge.src);
            let dst = self.owner_table(edge.dst).map(|t| t.id).unwrap_or(edge.dst);
            adjacency.entry(src).or_default().insert(dst);
            adjacency.entry(dst).or_default();
        }

        let mut colors: BTreeMap<VertexId, Color> = adjacency.keys().map(|&v| (v, Color::White)).collect();
        let mut seen: BTreeSet<Vec<VertexId>> = BTreeSet::new();
        let mut cycles = Vec::new();

        let roots: Vec<VertexId> = adjacency.keys().copied().collect();
        for root in roots {
            if colors.get(&root) != Some(&Color::White) {
                continue;
            }

            // Iterative DFS: (vertex, successors, next successor index)
            let mut path: Vec<VertexId> = vec![root];
            let mut stack: Vec<(VertexId, Vec<VertexId>, usize)> = vec![(root, successors(&adjacency, root), 0)];
            colors.insert(root, Color::Gray);

            while let Some((vertex, next, index)) = stack.last_mut() {
                let Some(&target) = next.get(*index) else {
                    colors.insert(*vertex, Color::Black);
                    stack.pop();
                    path.pop();
                    continue;
                };
                *index += 1;

                match colors.get(&target).copied().unwrap_or(Color::White) {
                    Color::White => {
                        colors.insert(target, Color::Gray);
                        path.push(target);
                        stack.push((target, successors(&adjacency, target), 0));
                    }
                    Color::Gray => {
                        if let Some(start) = path.iter().position(|&v| v == target) {
                            let cycle = canonical_rotation(&path[start..]);
                            if seen.insert(cycle.clone()) {
                                cycles.push(cycle);
                            }
                        }
                    }
                    Color::Black => {}
                }
            }
        }

        cycles
            .into_iter()
            .map(|cycle| cycle.into_iter().filter_map(|id| self.vertex(id)).collect())
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

fn successors(adjacency: &BTreeMap<VertexId, BTreeSet<VertexId>>, vertex: VertexId) -> Vec<VertexId> {
    adjacency
        .get(&vertex)
        .map(|next| next.iter().copied().collect())
        .unwrap_or_default()
}

fn canonical_rotation(cycle: &[VertexId]) -> Vec<VertexId> {
    let start = cycle
        .iter()
        .enumerate()
        .min_by_key(|(_, id)| **id)
        .map(|(i, _)| i)
        .unwrap_or(0);
    cycle[start..].iter().chain(&cycle[..start]).copied().collect()
}
