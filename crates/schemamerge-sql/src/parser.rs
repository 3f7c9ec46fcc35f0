//! CREATE TABLE parser
//!
//! Extracts one `Table` object (with nested columns and foreign keys) from
//! a `CREATE TABLE` statement. All pattern matching runs on a copy of the
//! statement whose quoted literals are masked out, and names and values are
//! sliced from the original text at the matched offsets.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use schemamerge_core::naming::{normalize_identifier, split_qualified_name};
use schemamerge_core::{DetectionError, ForeignKeyRef, SchemaObject, TableInfo, DEFAULT_SCHEMA};

use crate::normalizer::Normalizer;

/// Metadata key holding the source text of a table or column
pub const RAW_DEFINITION: &str = "raw_definition";

const QNAME: &str = r#"(?:"(?:[^"]|"")+"|[A-Za-z0-9_$]+)(?:\s*\.\s*(?:"(?:[^"]|"")+"|[A-Za-z0-9_$]+))?"#;

static CREATE_TABLE_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*CREATE\s+TABLE\b").expect("prefix regex is valid"));

static CREATE_TABLE_HEAD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?is)^\s*CREATE\s+TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?({})\s*\(",
        QNAME
    ))
    .expect("head regex is valid")
});

static CONSTRAINT_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)^CONSTRAINT\s+(?:"(?:[^"]|"")*"|[A-Za-z0-9_$]+)\s+"#).expect("constraint regex is valid")
});

static TABLE_FOREIGN_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?is)^FOREIGN\s+KEY\s*\(([^)]*)\)\s*REFERENCES\s+({})\s*(?:\(([^)]*)\))?",
        QNAME
    ))
    .expect("foreign key regex is valid")
});

static TABLE_PRIMARY_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)^PRIMARY\s+KEY\s*\(([^)]*)\)").expect("primary key regex is valid"));

static TABLE_UNIQUE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)^UNIQUE\s*\(([^)]*)\)").expect("unique regex is valid"));

static SKIPPED_ELEMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:CHECK|EXCLUDE|LIKE)\b").expect("skip regex is valid"));

static COLUMN_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^(?:"(?:[^"]|"")*"|[^\s"(]+)"#).expect("column name regex is valid"));

static COLUMN_TYPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(?:double\s+precision|character\s+varying|bit\s+varying|(?:timestamp|time)(?:\s*\(\s*\d+\s*\))?\s+with(?:out)?\s+time\s+zone|[A-Za-z_][A-Za-z0-9_$]*(?:\s*\.\s*[A-Za-z_][A-Za-z0-9_$]*)?)(?:\s*\([^)]*\))?(?:\s*\[\s*\d*\s*\])*",
    )
    .expect("column type regex is valid")
});

static PRIMARY_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bPRIMARY\s+KEY\b").expect("regex is valid"));
static UNIQUE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bUNIQUE\b").expect("regex is valid"));
static NOT_NULL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bNOT\s+NULL\b").expect("regex is valid"));

static DEFAULT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?is)\bDEFAULT\s+(.+?)\s*(?:\bNOT\s+NULL\b|\bNULL\b|\bPRIMARY\s+KEY\b|\bUNIQUE\b|\bREFERENCES\b|\bCHECK\b|\bCONSTRAINT\b|\bGENERATED\b|\bCOLLATE\b|$)",
    )
    .expect("default regex is valid")
});

static INLINE_REFERENCES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?is)\bREFERENCES\s+({})\s*(?:\(([^)]*)\))?", QNAME))
        .expect("references regex is valid")
});

/// A statement that could not be parsed
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedStatement {
    /// Position in the script, 0-based
    pub index: usize,
    pub statement: String,
    pub error: String,
}

/// Objects parsed from a whole script
#[derive(Debug, Clone, Default)]
pub struct ParsedScript {
    pub objects: Vec<SchemaObject>,

    /// Number of statements found
    pub statements: usize,

    pub skipped: Vec<SkippedStatement>,
}

/// DDL statement parser
#[derive(Debug, Clone, Default)]
pub struct StatementParser {
    normalizer: Normalizer,
}

impl StatementParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `normalizer` for splitting scripts
    pub fn with_normalizer(normalizer: Normalizer) -> Self {
        Self { normalizer }
    }

    /// Parse a whole script statement by statement
    ///
    /// A statement that fails to parse is recorded in `skipped` and does not
    /// affect the others.
    pub fn parse_script(&self, script: &str) -> ParsedScript {
        let statements = self.normalizer.split_statements(script);
        let mut parsed = ParsedScript {
            statements: statements.len(),
            ..ParsedScript::default()
        };

        for (index, statement) in statements.into_iter().enumerate() {
            match self.parse_to_objects(&statement) {
                Ok(objects) => parsed.objects.extend(objects),
                Err(e) => {
                    warn!(statement = index, error = %e, "Skipping malformed statement");
                    parsed.skipped.push(SkippedStatement {
                        index,
                        statement,
                        error: e.to_string(),
                    });
                }
            }
        }

        debug!(
            statements = parsed.statements,
            objects = parsed.objects.len(),
            skipped = parsed.skipped.len(),
            "Parsed script"
        );

        parsed
    }

    /// Parse one statement into schema objects
    ///
    /// Statements other than `CREATE TABLE` yield no objects. A `CREATE TABLE`
    /// whose name or body cannot be located is a parsing error.
    pub fn parse_to_objects(&self, statement: &str) -> Result<Vec<SchemaObject>, DetectionError> {
        if !CREATE_TABLE_PREFIX.is_match(statement) {
            return Ok(Vec::new());
        }

        let table = parse_create_table(statement)?;
        Ok(vec![table])
    }
}

fn parse_create_table(statement: &str) -> Result<SchemaObject, DetectionError> {
    let masked = mask_literals(statement);

    let head = CREATE_TABLE_HEAD
        .captures(&masked)
        .ok_or_else(|| DetectionError::parsing("cannot parse CREATE TABLE", statement))?;
    let (name_match, head_match) = match (head.get(1), head.get(0)) {
        (Some(name), Some(whole)) => (name, whole),
        _ => return Err(DetectionError::parsing("cannot parse CREATE TABLE", statement)),
    };

    let (schema, table_name) = split_qualified_name(&statement[name_match.range()]);
    let schema = schema.unwrap_or_else(|| DEFAULT_SCHEMA.to_string());

    let body_start = head_match.end();
    let body_end = find_closing_paren(&masked, body_start).ok_or_else(|| {
        DetectionError::parsing("unbalanced parentheses in CREATE TABLE body", statement)
    })?;

    let mut info = TableInfo::default();
    let mut primary_key: Vec<String> = Vec::new();
    let mut unique: Vec<Vec<String>> = Vec::new();

    for (start, end) in split_top_level(&masked[body_start..body_end]) {
        let (start, end) = (body_start + start, body_start + end);
        let element = Element::new(&statement[start..end], &masked[start..end]);
        if element.is_empty() {
            continue;
        }

        match element.classify() {
            ElementKind::ForeignKey => match parse_table_foreign_key(&element) {
                Some(fk) => info.foreign_keys.push(fk),
                None => warn!(table = %table_name, element = %element.text, "Ignoring malformed FOREIGN KEY"),
            },
            ElementKind::PrimaryKey(cols) => primary_key.extend(cols),
            ElementKind::Unique(cols) => unique.push(cols),
            ElementKind::Skipped => debug!(table = %table_name, element = %element.text, "Skipping table element"),
            ElementKind::Column => {
                let column = parse_column(&element, &schema, &table_name);
                if let Some(fk) = column.as_column().and_then(|c| c.references.clone()) {
                    info.foreign_keys.push(fk);
                }
                if info.column(&column.name).is_some() {
                    debug!(table = %table_name, column = %column.name, "Duplicate column, keeping the last definition");
                }
                info.upsert_column(column);
            }
        }
    }

    for name in &primary_key {
        match info.column_mut(name).and_then(SchemaObject::as_column_mut) {
            Some(column) => {
                column.is_primary_key = true;
                column.is_unique = false;
            }
            None => warn!(table = %table_name, column = %name, "PRIMARY KEY names an unknown column"),
        }
    }

    for cols in unique {
        match cols.as_slice() {
            [single] => {
                if let Some(column) = info.column_mut(single).and_then(SchemaObject::as_column_mut) {
                    column.is_unique = !column.is_primary_key;
                }
            }
            [] => {}
            _ => info.unique_constraints.push(cols),
        }
    }

    let mut table = SchemaObject::table(schema, table_name).with_metadata(RAW_DEFINITION, statement.trim());
    if let Some(slot) = table.as_table_mut() {
        *slot = info;
    }

    Ok(table)
}

enum ElementKind {
    Column,
    ForeignKey,
    PrimaryKey(Vec<String>),
    Unique(Vec<String>),
    Skipped,
}

/// One top-level element of a table body, with an optional
/// `CONSTRAINT name` prefix removed
struct Element<'a> {
    text: &'a str,
    masked: &'a str,
}

impl<'a> Element<'a> {
    fn new(text: &'a str, masked: &'a str) -> Self {
        let lead = masked.len() - masked.trim_start().len();
        let tail = masked.trim_end().len();
        let (mut text, mut masked) = if lead < tail {
            (&text[lead..tail], &masked[lead..tail])
        } else {
            ("", "")
        };

        if let Some(m) = CONSTRAINT_PREFIX.find(masked) {
            text = &text[m.end()..];
            masked = &masked[m.end()..];
        }

        Self { text, masked }
    }

    fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    fn slice(&self, range: std::ops::Range<usize>) -> &'a str {
        &self.text[range]
    }

    fn classify(&self) -> ElementKind {
        if TABLE_FOREIGN_KEY.is_match(self.masked) || starts_with_words(self.masked, "FOREIGN KEY") {
            return ElementKind::ForeignKey;
        }
        if let Some(m) = TABLE_PRIMARY_KEY.captures(self.masked).and_then(|c| c.get(1)) {
            return ElementKind::PrimaryKey(self.identifier_list(m.range()));
        }
        if let Some(m) = TABLE_UNIQUE.captures(self.masked).and_then(|c| c.get(1)) {
            return ElementKind::Unique(self.identifier_list(m.range()));
        }
        if SKIPPED_ELEMENT.is_match(self.masked) {
            return ElementKind::Skipped;
        }
        ElementKind::Column
    }

    /// Split a comma-separated identifier list found at `range`
    fn identifier_list(&self, range: std::ops::Range<usize>) -> Vec<String> {
        let masked = &self.masked[range.clone()];
        let text = &self.text[range];

        let mut names = Vec::new();
        let mut start = 0;
        for (idx, ch) in masked.char_indices().chain(std::iter::once((masked.len(), ','))) {
            if ch == ',' {
                let name = normalize_identifier(&text[start..idx]);
                if !name.is_empty() {
                    names.push(name);
                }
                start = idx + 1;
            }
        }
        names
    }
}

fn starts_with_words(masked: &str, words: &str) -> bool {
    let collapsed: String = masked.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.to_ascii_uppercase().starts_with(words)
}

fn parse_table_foreign_key(element: &Element<'_>) -> Option<ForeignKeyRef> {
    let caps = TABLE_FOREIGN_KEY.captures(element.masked)?;
    let columns = element.identifier_list(caps.get(1)?.range());
    let target = element.slice(caps.get(2)?.range());
    let referenced_columns = caps
        .get(3)
        .map(|m| element.identifier_list(m.range()))
        .unwrap_or_default();

    if columns.is_empty() {
        return None;
    }

    Some(foreign_key(columns, target, referenced_columns))
}

/// Unqualified targets resolve to the default schema
fn foreign_key(columns: Vec<String>, target: &str, referenced_columns: Vec<String>) -> ForeignKeyRef {
    let (target_schema, target_table) = split_qualified_name(target);
    ForeignKeyRef {
        columns,
        referenced_schema: target_schema.unwrap_or_else(|| DEFAULT_SCHEMA.to_string()),
        referenced_table: target_table,
        referenced_columns,
    }
}

fn parse_column(element: &Element<'_>, schema: &str, table: &str) -> SchemaObject {
    let name_end = COLUMN_NAME.find(element.masked).map(|m| m.end()).unwrap_or(0);
    let name = normalize_identifier(&element.text[..name_end]);

    let rest_masked = &element.masked[name_end..];
    let rest_start = name_end + (rest_masked.len() - rest_masked.trim_start().len());
    let data_type = COLUMN_TYPE
        .find(&element.masked[rest_start..])
        .map(|m| canonical_type(&element.text[rest_start + m.start()..rest_start + m.end()]))
        .unwrap_or_else(|| "UNKNOWN".to_string());

    // Constraint flags are looked up after the type so a type name cannot match them
    let constraints = &element.masked[rest_start..];
    let is_primary_key = PRIMARY_KEY.is_match(constraints);

    let default = DEFAULT
        .captures(constraints)
        .and_then(|c| c.get(1))
        .map(|m| element.text[rest_start + m.start()..rest_start + m.end()].trim().to_string())
        .filter(|d| !d.is_empty());

    let references = INLINE_REFERENCES.captures(constraints).and_then(|caps| {
        let target = caps.get(1)?;
        let target = &element.text[rest_start + target.start()..rest_start + target.end()];
        let referenced_columns = caps
            .get(2)
            .map(|m| element.identifier_list(rest_start + m.start()..rest_start + m.end()))
            .unwrap_or_default();
        Some(foreign_key(vec![name.clone()], target, referenced_columns))
    });

    let mut column = SchemaObject::column(schema, table, name, data_type)
        .with_metadata(RAW_DEFINITION, element.text);
    if let Some(info) = column.as_column_mut() {
        info.is_primary_key = is_primary_key;
        info.is_unique = UNIQUE.is_match(constraints) && !is_primary_key;
        info.not_null = NOT_NULL.is_match(constraints);
        info.default = default;
        info.references = references;
    }

    column
}

/// Uppercase a declared type and drop spacing around modifiers,
/// so `varchar (255)` and `VARCHAR(255)` compare equal
fn canonical_type(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ").to_uppercase();
    [(" (", "("), ("( ", "("), (" )", ")"), (" ,", ","), (", ", ","), (" [", "["), ("[ ", "["), (" ]", "]")]
        .iter()
        .fold(collapsed, |acc, (from, to)| acc.replace(from, to))
}

/// Replace the contents of quoted literals with `_`, keeping byte offsets
///
/// The quote characters themselves are kept so quoted names still look like
/// quoted names to the patterns.
fn mask_literals(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut quote: Option<char> = None;

    for ch in text.chars() {
        match quote {
            Some(q) if ch == q => {
                quote = None;
                out.push(ch);
            }
            Some(_) => out.extend(std::iter::repeat('_').take(ch.len_utf8())),
            None => {
                if ch == '\'' || ch == '"' {
                    quote = Some(ch);
                }
                out.push(ch);
            }
        }
    }

    out
}

/// Byte offset of the `)` closing the paren opened just before `start`
fn find_closing_paren(masked: &str, start: usize) -> Option<usize> {
    let mut depth = 1usize;
    for (idx, ch) in masked[start..].char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(start + idx);
                }
            }
            _ => {}
        }
    }
    None
}

/// Ranges between commas at paren depth 0
fn split_top_level(masked: &str) -> Vec<(usize, usize)> {
    let mut ranges = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (idx, ch) in masked.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                ranges.push((start, idx));
                start = idx + 1;
            }
            _ => {}
        }
    }
    ranges.push((start, masked.len()));

    ranges
}
