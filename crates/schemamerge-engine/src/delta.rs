//! Structural difference between two schema graphs
//!
//! A [`Delta`] borrows the objects of the two graphs it was computed from.
//! Removed objects and removed edges live in graph A, added ones in graph B.

use serde_json::Value;
use std::collections::BTreeSet;

use schemamerge_core::naming::fold_identifier;
use schemamerge_core::{DeltaSummary, ObjectType, SchemaObject};
use schemamerge_graph::Edge;

/// An object present in both graphs whose attributes differ
#[derive(Debug, Clone, PartialEq)]
pub struct ModifiedObject<'a> {
    /// The object in graph A
    pub before: &'a SchemaObject,

    /// The matched object in graph B
    pub after: &'a SchemaObject,

    /// Attribute keys whose values differ, including keys present on one side only,
    /// plus `name` and `schema` when the pair was matched across a rename
    pub changed_fields: BTreeSet<String>,
}

impl<'a> ModifiedObject<'a> {
    /// Pair two objects, or `None` if their identity and attributes are equal
    pub fn between(before: &'a SchemaObject, after: &'a SchemaObject) -> Option<Self> {
        let attrs_before = before.attributes();
        let attrs_after = after.attributes();

        let mut changed_fields: BTreeSet<String> = attrs_before
            .keys()
            .chain(attrs_after.keys())
            .filter(|key| attrs_before.get(*key) != attrs_after.get(*key))
            .cloned()
            .collect();

        if fold_identifier(&before.name) != fold_identifier(&after.name) {
            changed_fields.insert("name".to_string());
        }
        if fold_identifier(&before.schema) != fold_identifier(&after.schema) {
            changed_fields.insert("schema".to_string());
        }

        if changed_fields.is_empty() {
            None
        } else {
            Some(Self {
                before,
                after,
                changed_fields,
            })
        }
    }

    pub fn object_type(&self) -> ObjectType {
        self.after.object_type()
    }

    pub fn changed(&self, field: &str) -> bool {
        self.changed_fields.contains(field)
    }

    /// The pair was matched by content or similarity, not by name
    pub fn is_renamed(&self) -> bool {
        self.changed("name") || self.changed("schema")
    }

    /// Attribute value before the change
    pub fn old_value(&self, field: &str) -> Option<Value> {
        self.before.attributes().remove(field)
    }

    /// Attribute value after the change
    pub fn new_value(&self, field: &str) -> Option<Value> {
        self.after.attributes().remove(field)
    }
}

/// Added, removed and modified objects and edges
///
/// Objects are sorted by vertex id. Edges are compared through the matched
/// vertex pairs, so two graphs that declare the same schema in a different
/// order have no edge delta.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Delta<'a> {
    pub objects_added: Vec<&'a SchemaObject>,
    pub objects_removed: Vec<&'a SchemaObject>,
    pub objects_modified: Vec<ModifiedObject<'a>>,

    /// Edges of graph B with no counterpart in graph A
    pub edges_added: Vec<Edge>,

    /// Edges of graph A with no counterpart in graph B
    pub edges_removed: Vec<Edge>,
}

impl<'a> Delta<'a> {
    /// Whether the two graphs are structurally identical
    pub fn is_empty(&self) -> bool {
        self.objects_added.is_empty()
            && self.objects_removed.is_empty()
            && self.objects_modified.is_empty()
            && self.edges_added.is_empty()
            && self.edges_removed.is_empty()
    }

    pub fn added_of_type(&self, object_type: ObjectType) -> impl Iterator<Item = &'a SchemaObject> + '_ {
        self.objects_added
            .iter()
            .copied()
            .filter(move |o| o.object_type() == object_type)
    }

    pub fn removed_of_type(&self, object_type: ObjectType) -> impl Iterator<Item = &'a SchemaObject> + '_ {
        self.objects_removed
            .iter()
            .copied()
            .filter(move |o| o.object_type() == object_type)
    }

    /// Tables of graph A that no longer exist under their name in graph B
    ///
    /// Covers removed tables and tables paired with a differently named
    /// table by experimental matching.
    pub fn vanished_tables(&self) -> impl Iterator<Item = &'a SchemaObject> + '_ {
        let renamed = self
            .modified_of_type(ObjectType::Table)
            .filter(|m| m.is_renamed())
            .map(|m| m.before);
        self.removed_of_type(ObjectType::Table).chain(renamed)
    }

    pub fn modified_of_type(&self, object_type: ObjectType) -> impl Iterator<Item = &ModifiedObject<'a>> {
        self.objects_modified
            .iter()
            .filter(move |m| m.object_type() == object_type)
    }

    /// Some column changed its declared type
    pub fn has_type_changes(&self) -> bool {
        self.modified_of_type(ObjectType::Column)
            .any(|m| m.changed("data_type"))
    }

    /// Some table changed its primary key
    pub fn has_pk_changes(&self) -> bool {
        self.modified_of_type(ObjectType::PrimaryKey).next().is_some()
            || self
                .modified_of_type(ObjectType::Table)
                .any(|m| m.changed("primary_key"))
    }

    pub fn summary(&self) -> DeltaSummary {
        DeltaSummary {
            objects_added: self.objects_added.len(),
            objects_removed: self.objects_removed.len(),
            objects_modified: self.objects_modified.len(),
            edges_added: self.edges_added.len(),
            edges_removed: self.edges_removed.len(),
            type_changes: self.has_type_changes(),
            pk_changes: self.has_pk_changes(),
        }
    }
}
