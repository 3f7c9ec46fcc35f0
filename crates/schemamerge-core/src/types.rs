//! PostgreSQL column type compatibility
//!
//! Decides whether changing a column from one declared type to another is
//! safe, lossy, or flatly incompatible.

use serde::{Deserialize, Serialize};

use crate::conflict::ConflictLevel;

/// Broad family of a type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeCategory {
    Integer,
    Decimal,
    Float,
    Text,
    Character,
    Boolean,
    Datetime,
    Date,
    Time,
    Interval,
    Json,
    Xml,
    Uuid,
    Array,
    Geometric,
    Network,
    Bit,
    Money,
    Bytea,
    Oid,
    Unknown,
}

/// Risk of converting existing data between two types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConversionRisk {
    Safe,
    Warning,
    Dangerous,
    Incompatible,
}

impl ConversionRisk {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Safe => "SAFE",
            Self::Warning => "WARNING",
            Self::Dangerous => "DANGEROUS",
            Self::Incompatible => "INCOMPATIBLE",
        }
    }
}

impl std::fmt::Display for ConversionRisk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Full analysis of a single type change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeChangeAnalysis {
    pub from_type: String,
    pub to_type: String,
    pub normalized_from: String,
    pub normalized_to: String,
    pub compatible: bool,
    pub narrowing: bool,
    pub widening: bool,
    pub risk: ConversionRisk,
    pub level: ConflictLevel,
    pub message: String,
}

const COMPATIBILITY: &[(&str, &[&str])] = &[
    ("SMALLINT", &["SMALLINT", "INTEGER", "BIGINT", "NUMERIC", "DECIMAL", "REAL", "DOUBLE PRECISION"]),
    ("INTEGER", &["SMALLINT", "INTEGER", "BIGINT", "NUMERIC", "DECIMAL", "REAL", "DOUBLE PRECISION"]),
    ("BIGINT", &["SMALLINT", "INTEGER", "BIGINT", "NUMERIC", "DECIMAL", "REAL", "DOUBLE PRECISION"]),
    ("REAL", &["REAL", "DOUBLE PRECISION", "NUMERIC", "DECIMAL"]),
    ("DOUBLE PRECISION", &["REAL", "DOUBLE PRECISION", "NUMERIC", "DECIMAL"]),
    ("NUMERIC", &["NUMERIC", "DECIMAL", "INTEGER", "BIGINT", "SMALLINT", "REAL", "DOUBLE PRECISION"]),
    ("DECIMAL", &["NUMERIC", "DECIMAL", "INTEGER", "BIGINT", "SMALLINT", "REAL", "DOUBLE PRECISION"]),
    ("CHAR", &["CHAR", "VARCHAR", "TEXT", "CHARACTER"]),
    ("CHARACTER", &["CHAR", "VARCHAR", "TEXT", "CHARACTER"]),
    ("VARCHAR", &["VARCHAR", "TEXT", "CHAR", "CHARACTER"]),
    ("TEXT", &["TEXT", "VARCHAR", "CHAR", "CHARACTER"]),
    ("BOOLEAN", &["BOOLEAN"]),
    ("DATE", &["DATE", "TIMESTAMP", "TIMESTAMPTZ"]),
    ("TIME", &["TIME", "TIMETZ"]),
    ("TIMETZ", &["TIME", "TIMETZ"]),
    ("TIMESTAMP", &["TIMESTAMP", "TIMESTAMPTZ", "DATE"]),
    ("TIMESTAMPTZ", &["TIMESTAMPTZ", "TIMESTAMP", "DATE"]),
    ("INTERVAL", &["INTERVAL"]),
    ("JSON", &["JSON", "JSONB"]),
    ("JSONB", &["JSONB", "JSON"]),
    ("UUID", &["UUID", "TEXT", "VARCHAR", "CHAR"]),
    ("INTEGER[]", &["INTEGER[]", "BIGINT[]", "NUMERIC[]"]),
    ("BIGINT[]", &["BIGINT[]", "NUMERIC[]"]),
    ("NUMERIC[]", &["NUMERIC[]"]),
    ("TEXT[]", &["TEXT[]", "VARCHAR[]"]),
    ("VARCHAR[]", &["VARCHAR[]", "TEXT[]"]),
    ("CHAR[]", &["CHAR[]", "VARCHAR[]", "TEXT[]"]),
    ("SERIAL", &["SERIAL", "INTEGER", "BIGINT"]),
    ("BIGSERIAL", &["BIGSERIAL", "BIGINT", "INTEGER"]),
    ("MONEY", &["MONEY", "NUMERIC", "DECIMAL"]),
    ("BYTEA", &["BYTEA"]),
    ("OID", &["OID", "INTEGER"]),
    ("CIDR", &["CIDR", "INET"]),
    ("INET", &["INET", "CIDR"]),
    ("BIT", &["BIT", "VARBIT"]),
    ("VARBIT", &["VARBIT", "BIT"]),
    ("XML", &["XML"]),
];

const ALIASES: &[(&str, &str)] = &[
    ("INT", "INTEGER"),
    ("INT4", "INTEGER"),
    ("INT2", "SMALLINT"),
    ("INT8", "BIGINT"),
    ("BOOL", "BOOLEAN"),
    ("CHARACTER VARYING", "VARCHAR"),
    ("DOUBLE", "DOUBLE PRECISION"),
    ("FLOAT4", "REAL"),
    ("FLOAT8", "DOUBLE PRECISION"),
    ("FLOAT", "DOUBLE PRECISION"),
    ("SERIAL4", "SERIAL"),
    ("SERIAL8", "BIGSERIAL"),
    ("TIMESTAMP WITHOUT TIME ZONE", "TIMESTAMP"),
    ("TIMESTAMP WITH TIME ZONE", "TIMESTAMPTZ"),
    ("TIME WITHOUT TIME ZONE", "TIME"),
    ("TIME WITH TIME ZONE", "TIMETZ"),
];

const ARRAY_INTERNAL_ALIASES: &[(&str, &str)] = &[
    ("_INT2", "SMALLINT[]"),
    ("_INT4", "INTEGER[]"),
    ("_INT8", "BIGINT[]"),
    ("_NUMERIC", "NUMERIC[]"),
    ("_TEXT", "TEXT[]"),
    ("_VARCHAR", "VARCHAR[]"),
    ("_BPCHAR", "CHAR[]"),
];

const INCOMPATIBLE_PAIRS: &[(&str, &str)] = &[
    ("INTEGER", "VARCHAR"),
    ("NUMERIC", "TEXT"),
    ("BIGINT", "CHAR"),
    ("DECIMAL", "VARCHAR"),
    ("DOUBLE PRECISION", "TEXT"),
    ("BOOLEAN", "INTEGER"),
    ("BOOLEAN", "NUMERIC"),
    ("TIMESTAMP", "INTEGER"),
    ("DATE", "NUMERIC"),
    ("TIME", "INTEGER"),
    ("JSON", "VARCHAR"),
    ("JSONB", "TEXT"),
    ("UUID", "INTEGER"),
    ("UUID", "NUMERIC"),
    ("BYTEA", "TEXT"),
    ("BYTEA", "VARCHAR"),
    ("POINT", "INTEGER"),
    ("POLYGON", "TEXT"),
    ("INET", "INTEGER"),
    ("CIDR", "NUMERIC"),
];

const NARROWING: &[(&str, &[&str])] = &[
    ("NUMERIC", &["INTEGER", "BIGINT", "SMALLINT", "REAL"]),
    ("DECIMAL", &["INTEGER", "BIGINT", "SMALLINT", "REAL"]),
    ("DOUBLE PRECISION", &["REAL", "NUMERIC", "DECIMAL"]),
    ("VARCHAR", &["CHAR"]),
    ("TEXT", &["VARCHAR", "CHAR"]),
    ("TIMESTAMPTZ", &["TIMESTAMP"]),
    ("BIGINT", &["INTEGER", "SMALLINT"]),
    ("INTEGER", &["SMALLINT"]),
];

const WIDENING: &[(&str, &[&str])] = &[
    ("SMALLINT", &["INTEGER", "BIGINT", "NUMERIC", "DECIMAL"]),
    ("INTEGER", &["BIGINT", "NUMERIC", "DECIMAL"]),
    ("CHAR", &["VARCHAR", "TEXT"]),
    ("VARCHAR", &["TEXT"]),
    ("TIMESTAMP", &["TIMESTAMPTZ"]),
    ("REAL", &["DOUBLE PRECISION"]),
    ("NUMERIC", &["DOUBLE PRECISION"]),
];

fn lookup<'a>(table: &'a [(&str, &'a [&'a str])], key: &str) -> Option<&'a [&'a str]> {
    table.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

fn in_table(table: &[(&str, &[&str])], from: &str, to: &str) -> bool {
    lookup(table, from).map(|targets| targets.contains(&to)).unwrap_or(false)
}

fn alias(base: &str) -> &str {
    ALIASES
        .iter()
        .find(|(k, _)| *k == base)
        .map(|(_, v)| *v)
        .unwrap_or(base)
}

/// Length modifier of a character type, e.g. 255 for `VARCHAR(255)`
fn length_modifier(type_str: &str) -> Option<u32> {
    let open = type_str.find('(')?;
    let close = type_str[open..].find(')')? + open;
    type_str[open + 1..close].trim().parse().ok()
}

/// Type compatibility checker
pub struct TypeCompatibility;

impl TypeCompatibility {
    /// Canonical form of a declared type
    ///
    /// Uppercases, collapses whitespace, drops `(...)` modifiers, resolves
    /// aliases, and keeps a trailing `[]` for arrays.
    pub fn normalize_type(type_str: &str) -> String {
        let upper = type_str.split_whitespace().collect::<Vec<_>>().join(" ").to_uppercase();
        if upper.is_empty() {
            return "UNKNOWN".to_string();
        }

        let (body, is_array) = match upper.strip_suffix("[]") {
            Some(base) => (base.trim_end().to_string(), true),
            None => (upper.clone(), false),
        };

        let base = match body.find('(') {
            Some(idx) => {
                let after = body[idx..].find(')').map(|end| &body[idx + end + 1..]).unwrap_or("");
                format!("{}{}", body[..idx].trim_end(), after).trim().to_string()
            }
            None => body,
        };

        if let Some((_, canonical)) = ARRAY_INTERNAL_ALIASES.iter().find(|(k, _)| *k == base) {
            return canonical.to_string();
        }

        let resolved = alias(&base);
        if is_array {
            let element = if resolved == "CHARACTER" { "CHAR" } else { resolved };
            format!("{}[]", element)
        } else {
            resolved.to_string()
        }
    }

    /// Category of a type
    pub fn category(type_str: &str) -> TypeCategory {
        let normalized = Self::normalize_type(type_str);
        if normalized.ends_with("[]") {
            return TypeCategory::Array;
        }

        match normalized.as_str() {
            "SMALLINT" | "INTEGER" | "BIGINT" | "SERIAL" | "BIGSERIAL" => TypeCategory::Integer,
            "NUMERIC" | "DECIMAL" => TypeCategory::Decimal,
            "REAL" | "DOUBLE PRECISION" => TypeCategory::Float,
            "CHAR" | "CHARACTER" => TypeCategory::Character,
            "VARCHAR" | "TEXT" => TypeCategory::Text,
            "BOOLEAN" => TypeCategory::Boolean,
            "DATE" => TypeCategory::Date,
            "TIME" | "TIMETZ" => TypeCategory::Time,
            "TIMESTAMP" | "TIMESTAMPTZ" => TypeCategory::Datetime,
            "INTERVAL" => TypeCategory::Interval,
            "JSON" | "JSONB" => TypeCategory::Json,
            "XML" => TypeCategory::Xml,
            "UUID" => TypeCategory::Uuid,
            "POINT" | "LINE" | "LSEG" | "BOX" | "PATH" | "POLYGON" | "CIRCLE" => TypeCategory::Geometric,
            "CIDR" | "INET" | "MACADDR" | "MACADDR8" => TypeCategory::Network,
            "BIT" | "VARBIT" => TypeCategory::Bit,
            "MONEY" => TypeCategory::Money,
            "BYTEA" => TypeCategory::Bytea,
            "OID" => TypeCategory::Oid,
            _ => TypeCategory::Unknown,
        }
    }

    /// Whether values of `from` can be stored as `to`
    pub fn are_compatible(from: &str, to: &str) -> bool {
        let a = Self::normalize_type(from);
        let b = Self::normalize_type(to);

        if a == b {
            return true;
        }

        let flatly_incompatible = INCOMPATIBLE_PAIRS
            .iter()
            .any(|(x, y)| (*x == a && *y == b) || (*x == b && *y == a));
        if flatly_incompatible {
            return false;
        }

        if let Some(targets) = lookup(COMPATIBILITY, &a) {
            return targets.contains(&b.as_str());
        }
        if let Some(targets) = lookup(COMPATIBILITY, &b) {
            return targets.contains(&a.as_str());
        }

        let category = Self::category(&a);
        category != TypeCategory::Unknown
            && category != TypeCategory::Array
            && category == Self::category(&b)
    }

    /// Whether the change can lose data
    ///
    /// Also covers shrinking the length of the same character type,
    /// e.g. `VARCHAR(255)` to `VARCHAR(50)`.
    pub fn is_narrowing(from: &str, to: &str) -> bool {
        let a = Self::normalize_type(from);
        let b = Self::normalize_type(to);

        if a == b {
            return matches!(
                (length_modifier(from), length_modifier(to)),
                (Some(old), Some(new)) if new < old
            );
        }
        in_table(NARROWING, &a, &b)
    }

    /// Whether the change only widens the value domain
    pub fn is_widening(from: &str, to: &str) -> bool {
        let a = Self::normalize_type(from);
        let b = Self::normalize_type(to);
        in_table(WIDENING, &a, &b)
    }

    /// Conversion risk from `from` to `to`
    pub fn conversion_risk(from: &str, to: &str) -> ConversionRisk {
        if !Self::are_compatible(from, to) {
            ConversionRisk::Incompatible
        } else if Self::is_narrowing(from, to) {
            ConversionRisk::Dangerous
        } else if Self::is_widening(from, to) {
            ConversionRisk::Safe
        } else if Self::normalize_type(from) != Self::normalize_type(to) {
            ConversionRisk::Warning
        } else {
            ConversionRisk::Safe
        }
    }

    /// Analyze a type change and assign a conflict level
    pub fn analyze_type_change(from: &str, to: &str) -> TypeChangeAnalysis {
        let compatible = Self::are_compatible(from, to);
        let narrowing = Self::is_narrowing(from, to);
        let risk = Self::conversion_risk(from, to);

        let (level, message) = if !compatible {
            (ConflictLevel::Critical, format!("types {} and {} are incompatible", from, to))
        } else if narrowing {
            (ConflictLevel::High, format!("{} -> {} narrows the value domain", from, to))
        } else if risk == ConversionRisk::Warning {
            (ConflictLevel::Medium, format!("{} -> {} may need an explicit cast", from, to))
        } else {
            (ConflictLevel::Low, format!("{} -> {} is safe", from, to))
        };

        TypeChangeAnalysis {
            from_type: from.to_string(),
            to_type: to.to_string(),
            normalized_from: Self::normalize_type(from),
            normalized_to: Self::normalize_type(to),
            compatible,
            narrowing,
            widening: Self::is_widening(from, to),
            risk,
            level,
            message,
        }
    }
}
