//! Identifier and qualified-name helpers
//!
//! Two flavours of normalization are provided. `normalize_identifier` keeps
//! the inner text of quoted identifiers untouched, the way PostgreSQL resolves
//! names. `fold_identifier` is the case- and quote-insensitive form used for
//! graph lookups and equivalence keys.

use crate::model::DEFAULT_SCHEMA;

/// Check whether an identifier is wrapped in double quotes
pub fn is_quoted_identifier(identifier: &str) -> bool {
    let s = identifier.trim();
    s.len() >= 2 && s.starts_with('"') && s.ends_with('"')
}

/// Remove one level of surrounding double quotes, unescaping `""`
pub fn strip_quotes(identifier: &str) -> String {
    let s = identifier.trim();
    if is_quoted_identifier(s) {
        s[1..s.len() - 1].replace("\"\"", "\"")
    } else {
        s.to_string()
    }
}

/// Normalize an identifier the way PostgreSQL resolves it
///
/// Quoted identifiers keep their exact inner text. Bare identifiers are
/// trimmed, internal whitespace is collapsed, and the result is lowercased.
pub fn normalize_identifier(identifier: &str) -> String {
    let s = identifier.trim();
    if s.is_empty() {
        return String::new();
    }
    if is_quoted_identifier(s) {
        return strip_quotes(s);
    }
    s.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Case- and quote-insensitive identifier form used as a lookup key
pub fn fold_identifier(identifier: &str) -> String {
    identifier.trim().trim_matches('"').trim().to_lowercase()
}

/// Normalize a schema name, defaulting to `public`
pub fn normalize_schema(schema: Option<&str>) -> String {
    let s = schema.map(normalize_identifier).unwrap_or_default();
    if s.is_empty() {
        DEFAULT_SCHEMA.to_string()
    } else {
        s
    }
}

/// Split `schema.name` at the first dot outside double quotes
///
/// Both parts are normalized with [`normalize_identifier`]. An unqualified
/// name yields `None` for the schema.
pub fn split_qualified_name(name: &str) -> (Option<String>, String) {
    let s = name.trim();
    let mut in_quotes = false;

    for (idx, ch) in s.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            '.' if !in_quotes => {
                let schema = normalize_identifier(&s[..idx]);
                let object = normalize_identifier(&s[idx + 1..]);
                return (Some(schema).filter(|s| !s.is_empty()), object);
            }
            _ => {}
        }
    }

    (None, normalize_identifier(s))
}

/// Render `schema.table`
pub fn qualify_table(schema: &str, table: &str) -> String {
    format!("{}.{}", normalize_schema(Some(schema)), normalize_identifier(table))
}

/// Render `schema.table.column`
pub fn qualify_column(schema: &str, table: &str, column: &str) -> String {
    format!(
        "{}.{}.{}",
        normalize_schema(Some(schema)),
        normalize_identifier(table),
        normalize_identifier(column)
    )
}
