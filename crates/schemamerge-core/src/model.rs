//! Schema object model
//!
//! Every object parsed from DDL is a [`SchemaObject`]: a common header
//! (id, name, schema) plus a typed [`ObjectKind`] payload. The payload is
//! projected into a flat attribute map only for modification detection.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use crate::naming::fold_identifier;

/// Graph-local vertex identifier (0 before insertion into a graph)
pub type VertexId = usize;

/// Schema assumed for unqualified names
pub const DEFAULT_SCHEMA: &str = "public";

/// Kind of schema object
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectType {
    Schema,
    Table,
    Column,
    PrimaryKey,
    UniqueConstraint,
    ForeignKey,
    CheckConstraint,
    Index,
    View,
    Function,
    Trigger,
}

impl ObjectType {
    /// Stable string used in keys and reports
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Schema => "schema",
            Self::Table => "table",
            Self::Column => "column",
            Self::PrimaryKey => "primary_key",
            Self::UniqueConstraint => "unique_constraint",
            Self::ForeignKey => "foreign_key",
            Self::CheckConstraint => "check_constraint",
            Self::Index => "index",
            Self::View => "view",
            Self::Function => "function",
            Self::Trigger => "trigger",
        }
    }

    /// Whether the equivalence key of this kind includes the owning table
    pub fn is_table_scoped(&self) -> bool {
        matches!(
            self,
            Self::Column | Self::PrimaryKey | Self::UniqueConstraint | Self::ForeignKey
        )
    }

    /// Whether this kind is a key constraint (PK, unique, FK)
    pub fn is_key_constraint(&self) -> bool {
        matches!(self, Self::PrimaryKey | Self::UniqueConstraint | Self::ForeignKey)
    }
}

impl std::fmt::Display for ObjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A foreign key as declared in a CREATE TABLE body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyRef {
    /// Local column(s)
    pub columns: Vec<String>,

    /// Schema of the referenced table
    pub referenced_schema: String,

    /// Referenced table
    pub referenced_table: String,

    /// Referenced column(s)
    pub referenced_columns: Vec<String>,
}

impl ForeignKeyRef {
    /// Local columns joined with `,`
    pub fn column_list(&self) -> String {
        self.columns.join(",")
    }

    /// Referenced columns joined with `,`
    pub fn referenced_column_list(&self) -> String {
        self.referenced_columns.join(",")
    }

    /// `schema.table` of the referenced table
    pub fn qualified_target(&self) -> String {
        format!("{}.{}", self.referenced_schema, self.referenced_table)
    }
}

impl std::fmt::Display for ForeignKeyRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({}) -> {}({})",
            self.column_list(),
            self.qualified_target(),
            self.referenced_column_list()
        )
    }
}

/// Table payload
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TableInfo {
    /// Columns in declaration order, unique by name
    pub columns: Vec<SchemaObject>,

    /// Table-level and column-level foreign keys
    pub foreign_keys: Vec<ForeignKeyRef>,

    /// Multi-column `UNIQUE (a, b)` constraints
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unique_constraints: Vec<Vec<String>>,
}

impl TableInfo {
    /// Find a column by name
    pub fn column(&self, name: &str) -> Option<&SchemaObject> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Find a column by name for mutation
    pub fn column_mut(&mut self, name: &str) -> Option<&mut SchemaObject> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    /// Insert a column, replacing any existing column with the same name
    pub fn upsert_column(&mut self, column: SchemaObject) {
        match self.columns.iter_mut().find(|c| c.name == column.name) {
            Some(existing) => *existing = column,
            None => self.columns.push(column),
        }
    }

    /// Names of primary key columns in declaration order
    pub fn primary_key_columns(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| c.as_column().map(|info| info.is_primary_key).unwrap_or(false))
            .map(|c| c.name.clone())
            .collect()
    }
}

/// Column payload
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ColumnInfo {
    /// Owning table name
    pub table: String,

    /// Declared type, uppercased, modifiers kept (e.g. `VARCHAR(255)`)
    pub data_type: String,

    /// `NOT NULL` present in the definition
    pub not_null: bool,

    /// Part of the primary key
    pub is_primary_key: bool,

    /// Unique (and not part of the primary key)
    pub is_unique: bool,

    /// `DEFAULT` expression, if any
    pub default: Option<String>,

    /// Inline `REFERENCES` clause, if any
    pub references: Option<ForeignKeyRef>,
}

impl ColumnInfo {
    /// A primary key column is implicitly NOT NULL
    pub fn is_nullable(&self) -> bool {
        !(self.not_null || self.is_primary_key)
    }
}

/// Primary key / unique constraint payload
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct KeyConstraintInfo {
    /// Owning table name
    pub table: String,

    /// Constrained column(s)
    pub columns: Vec<String>,
}

/// Foreign key vertex payload
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ForeignKeyInfo {
    pub from_table: String,
    pub from_column: String,
    pub to_schema: String,
    pub to_table: String,
    pub to_column: String,
}

/// Typed payload per object kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "object_type", content = "info", rename_all = "snake_case")]
pub enum ObjectKind {
    Table(TableInfo),
    Column(ColumnInfo),
    PrimaryKey(KeyConstraintInfo),
    UniqueConstraint(KeyConstraintInfo),
    ForeignKey(ForeignKeyInfo),
    /// Any other DDL object kind, carried without a payload
    Other(ObjectType),
}

/// A schema object (vertex payload)
///
/// Equality and hashing use only `(object_type, schema, name)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaObject {
    /// Assigned on graph insertion, 0 before
    pub id: VertexId,

    pub name: String,

    pub schema: String,

    pub kind: ObjectKind,

    /// Free-form metadata such as the raw source definition.
    /// Never part of identity or modification detection.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl SchemaObject {
    /// Create an object with an explicit payload
    pub fn new(schema: impl Into<String>, name: impl Into<String>, kind: ObjectKind) -> Self {
        let schema = schema.into();
        Self {
            id: 0,
            name: name.into(),
            schema: if schema.is_empty() { DEFAULT_SCHEMA.to_string() } else { schema },
            kind,
            metadata: BTreeMap::new(),
        }
    }

    /// Create an empty table
    pub fn table(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(schema, name, ObjectKind::Table(TableInfo::default()))
    }

    /// Create a column of `table`
    pub fn column(
        schema: impl Into<String>,
        table: impl Into<String>,
        name: impl Into<String>,
        data_type: impl Into<String>,
    ) -> Self {
        Self::new(
            schema,
            name,
            ObjectKind::Column(ColumnInfo {
                table: table.into(),
                data_type: data_type.into(),
                ..ColumnInfo::default()
            }),
        )
    }

    /// Create an object of a kind that carries no payload
    pub fn other(object_type: ObjectType, schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(schema, name, ObjectKind::Other(object_type))
    }

    /// Attach a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn object_type(&self) -> ObjectType {
        match &self.kind {
            ObjectKind::Table(_) => ObjectType::Table,
            ObjectKind::Column(_) => ObjectType::Column,
            ObjectKind::PrimaryKey(_) => ObjectType::PrimaryKey,
            ObjectKind::UniqueConstraint(_) => ObjectType::UniqueConstraint,
            ObjectKind::ForeignKey(_) => ObjectType::ForeignKey,
            ObjectKind::Other(t) => *t,
        }
    }

    pub fn as_table(&self) -> Option<&TableInfo> {
        match &self.kind {
            ObjectKind::Table(info) => Some(info),
            _ => None,
        }
    }

    pub fn as_table_mut(&mut self) -> Option<&mut TableInfo> {
        match &mut self.kind {
            ObjectKind::Table(info) => Some(info),
            _ => None,
        }
    }

    pub fn as_column(&self) -> Option<&ColumnInfo> {
        match &self.kind {
            ObjectKind::Column(info) => Some(info),
            _ => None,
        }
    }

    pub fn as_column_mut(&mut self) -> Option<&mut ColumnInfo> {
        match &mut self.kind {
            ObjectKind::Column(info) => Some(info),
            _ => None,
        }
    }

    pub fn as_foreign_key(&self) -> Option<&ForeignKeyInfo> {
        match &self.kind {
            ObjectKind::ForeignKey(info) => Some(info),
            _ => None,
        }
    }

    /// Name of the table this object belongs to, for table-scoped kinds
    pub fn owning_table(&self) -> Option<&str> {
        match &self.kind {
            ObjectKind::Column(info) => Some(&info.table),
            ObjectKind::PrimaryKey(info) | ObjectKind::UniqueConstraint(info) => Some(&info.table),
            ObjectKind::ForeignKey(info) => Some(&info.from_table),
            ObjectKind::Table(_) | ObjectKind::Other(_) => None,
        }
    }

    /// `schema.table.column` for columns, `schema.name` otherwise
    pub fn full_name(&self) -> String {
        match &self.kind {
            ObjectKind::Column(info) => format!("{}.{}.{}", self.schema, info.table, self.name),
            _ => format!("{}.{}", self.schema, self.name),
        }
    }

    /// Stable string key of this object
    ///
    /// Columns use `column:{schema}:{table}.{name}`. Other table-scoped
    /// objects append `:table:{table}`, everything else is `{type}:{schema}:{name}`.
    pub fn get_key(&self) -> String {
        let object_type = self.object_type();
        match (&self.kind, self.owning_table()) {
            (ObjectKind::Column(info), _) => {
                format!("column:{}:{}.{}", self.schema, info.table, self.name)
            }
            (_, Some(table)) => {
                format!("{}:{}:{}:table:{}", object_type, self.schema, self.name, table)
            }
            (_, None) => format!("{}:{}:{}", object_type, self.schema, self.name),
        }
    }

    /// Case-insensitive cross-graph identity
    pub fn equivalence_key(&self) -> EquivalenceKey {
        let object_type = self.object_type();
        let table = if object_type.is_table_scoped() {
            self.owning_table().map(fold_identifier).unwrap_or_default()
        } else {
            String::new()
        };

        EquivalenceKey {
            schema: fold_identifier(&self.schema),
            object_type,
            table,
            name: fold_identifier(&self.name),
        }
    }

    /// Flat attribute projection of the typed payload
    ///
    /// Absent optional fields are omitted, so adding a `DEFAULT` shows up as
    /// a changed `default` key.
    pub fn attributes(&self) -> BTreeMap<String, Value> {
        let mut attrs = BTreeMap::new();

        match &self.kind {
            ObjectKind::Table(info) => {
                let columns: Vec<&str> = info.columns.iter().map(|c| c.name.as_str()).collect();
                attrs.insert("columns".to_string(), json!(columns));

                if !info.foreign_keys.is_empty() {
                    let fks: Vec<String> = info.foreign_keys.iter().map(|fk| fk.to_string()).collect();
                    attrs.insert("foreign_keys".to_string(), json!(fks));
                }

                let pk = info.primary_key_columns();
                if !pk.is_empty() {
                    attrs.insert("primary_key".to_string(), json!(pk));
                }

                if !info.unique_constraints.is_empty() {
                    attrs.insert("unique_constraints".to_string(), json!(info.unique_constraints));
                }
            }
            ObjectKind::Column(info) => {
                attrs.insert("table".to_string(), json!(info.table));
                attrs.insert("data_type".to_string(), json!(info.data_type));
                attrs.insert("is_nullable".to_string(), json!(info.is_nullable()));
                attrs.insert("not_null".to_string(), json!(info.not_null));
                attrs.insert("is_primary_key".to_string(), json!(info.is_primary_key));
                attrs.insert("is_unique".to_string(), json!(info.is_unique));
                if let Some(default) = &info.default {
                    attrs.insert("default".to_string(), json!(default));
                }
                if let Some(fk) = &info.references {
                    attrs.insert("references".to_string(), json!(fk.to_string()));
                }
            }
            ObjectKind::PrimaryKey(info) | ObjectKind::UniqueConstraint(info) => {
                attrs.insert("table".to_string(), json!(info.table));
                attrs.insert("columns".to_string(), json!(info.columns));
            }
            ObjectKind::ForeignKey(info) => {
                attrs.insert("from_table".to_string(), json!(info.from_table));
                attrs.insert("from_column".to_string(), json!(info.from_column));
                attrs.insert("to_schema".to_string(), json!(info.to_schema));
                attrs.insert("to_table".to_string(), json!(info.to_table));
                attrs.insert("to_column".to_string(), json!(info.to_column));
            }
            ObjectKind::Other(_) => {}
        }

        attrs
    }
}

impl PartialEq for SchemaObject {
    fn eq(&self, other: &Self) -> bool {
        self.object_type() == other.object_type()
            && self.schema == other.schema
            && self.name == other.name
    }
}

impl Eq for SchemaObject {}

impl Hash for SchemaObject {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.object_type().hash(state);
        self.schema.hash(state);
        self.name.hash(state);
    }
}

impl std::fmt::Display for SchemaObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.object_type(), self.full_name())
    }
}

/// Deterministic key pairing "the same" object across two graphs
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EquivalenceKey {
    pub schema: String,
    pub object_type: ObjectType,
    /// Owning table for table-scoped kinds, empty otherwise
    pub table: String,
    pub name: String,
}

impl std::fmt::Display for EquivalenceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}:{}", self.object_type, self.schema, self.table, self.name)
    }
}
