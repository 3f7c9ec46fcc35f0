//! SQL normalization and statement splitting
//!
//! `normalize` is a text pre-pass (comments, keyword case, whitespace)
//! followed by a token-level re-render, so the result depends only on the
//! token stream and is idempotent.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use sqlparser::ast::{ObjectType as SqlObjectType, Statement};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::{Token as SqlToken, Tokenizer as SqlTokenizer};

use schemamerge_core::{NormalizerOptions, TokenizerOptions};

use crate::tokenizer::{Token, TokenKind, Tokenizer};

/// Literals and comments, which the text pre-pass must not rewrite
static OPAQUE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"'(?:[^']|'')*'|"(?:[^"]|"")*"|--[^\n]*|/\*(?s:.*?)\*/"#)
        .expect("opaque segment regex is valid")
});

static KEYWORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:create|table|alter|drop|add|column|constraint|primary|key|foreign|references|unique|check|not|null|default|double\s+precision|character\s+varying|if\s+exists)\b",
    )
    .expect("keyword regex is valid")
});

static SPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex is valid"));
static SPACE_BEFORE_COMMA: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+,").expect("comma regex is valid"));
static SPACE_AFTER_COMMA: Lazy<Regex> = Lazy::new(|| Regex::new(r",\s*").expect("comma regex is valid"));
static SPACE_BEFORE_SEMI: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+;").expect("semicolon regex is valid"));

/// Coarse statement classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatementType {
    CreateTable,
    AlterTable,
    DropTable,
    CreateIndex,
    CreateView,
    Unknown,
}

impl StatementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateTable => "CREATE_TABLE",
            Self::AlterTable => "ALTER_TABLE",
            Self::DropTable => "DROP_TABLE",
            Self::CreateIndex => "CREATE_INDEX",
            Self::CreateView => "CREATE_VIEW",
            Self::Unknown => "UNKNOWN",
        }
    }
}

/// SQL normalizer
#[derive(Debug, Clone)]
pub struct Normalizer {
    options: NormalizerOptions,
    tokenizer: Tokenizer,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::with_options(NormalizerOptions::default())
    }
}

impl Normalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: NormalizerOptions) -> Self {
        let tokenizer = Tokenizer::new().preserve_case(!options.uppercase_keywords);
        Self { options, tokenizer }
    }

    /// Like [`with_options`](Self::with_options), with explicit tokenizer settings
    ///
    /// Case is preserved if either side asks for it.
    pub fn with_tokenizer_options(options: NormalizerOptions, tokenizer: &TokenizerOptions) -> Self {
        let preserve = tokenizer.preserve_case || !options.uppercase_keywords;
        Self {
            tokenizer: Tokenizer::with_options(tokenizer).preserve_case(preserve),
            options,
        }
    }

    pub fn options(&self) -> &NormalizerOptions {
        &self.options
    }

    /// Canonicalize `text`
    pub fn normalize(&self, text: &str) -> String {
        if text.trim().is_empty() {
            return String::new();
        }

        let prepared = self.rewrite_outside_literals(text);
        self.render_tokens(&self.tokenizer.tokenize(&prepared))
    }

    /// Apply the text rules to segments outside string literals,
    /// quoted identifiers and comments
    fn rewrite_outside_literals(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut last = 0;

        for m in OPAQUE.find_iter(text) {
            out.push_str(&self.rewrite_plain(&text[last..m.start()]));

            let segment = m.as_str();
            let is_comment = segment.starts_with("--") || segment.starts_with("/*");
            if is_comment && self.options.remove_comments {
                // Keep a separator so adjacent words do not fuse
                out.push(' ');
            } else {
                out.push_str(segment);
            }
            last = m.end();
        }
        out.push_str(&self.rewrite_plain(&text[last..]));

        out
    }

    fn rewrite_plain(&self, segment: &str) -> String {
        let mut s = segment.to_string();

        if self.options.uppercase_keywords {
            s = KEYWORDS
                .replace_all(&s, |caps: &Captures| {
                    SPACE_RUN.replace_all(&caps[0], " ").to_uppercase()
                })
                .into_owned();
        }

        if self.options.normalize_whitespace {
            s = SPACE_RUN.replace_all(&s, " ").into_owned();
            s = SPACE_BEFORE_COMMA.replace_all(&s, ",").into_owned();
            s = SPACE_AFTER_COMMA.replace_all(&s, ", ").into_owned();
            s = SPACE_BEFORE_SEMI.replace_all(&s, ";").into_owned();
        }

        s
    }

    /// Join tokens with single spaces, except around punctuation
    fn render_tokens(&self, tokens: &[Token]) -> String {
        let tokens: Vec<&Token> = tokens.iter().filter(|t| !t.is_eof()).collect();
        let mut out = String::new();

        for (i, token) in tokens.iter().enumerate() {
            if token.kind == TokenKind::QuotedIdentifier && self.options.standardize_quotes {
                out.push_str(&trim_quoted(&token.text));
            } else {
                out.push_str(&token.text);
            }

            let Some(next) = tokens.get(i + 1) else {
                continue;
            };

            let tight_before = matches!(
                next.kind,
                TokenKind::Comma | TokenKind::RParen | TokenKind::Dot | TokenKind::Semicolon
            );
            let tight_after = matches!(token.kind, TokenKind::LParen | TokenKind::Dot);

            if !tight_before && !tight_after {
                out.push(' ');
            }
        }

        out
    }

    /// Split a script into normalized statements without trailing `;`
    ///
    /// Boundaries come from the sqlparser tokenizer, so semicolons inside
    /// literals, quoted identifiers and dollar-quoted bodies do not split.
    /// If that tokenizer rejects the text, a plain `;` split is used.
    pub fn split_statements(&self, text: &str) -> Vec<String> {
        let normalized = self.normalize(text);
        if normalized.is_empty() {
            return Vec::new();
        }

        match split_on_semicolons(&normalized) {
            Some(statements) => statements,
            None => {
                tracing::debug!("sqlparser tokenizer rejected script, using naive split");
                Self::split_naive(&normalized)
            }
        }
    }

    /// Plain split on every `;`
    pub fn split_naive(text: &str) -> Vec<String> {
        text.split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// True if the statement starts with CREATE, ALTER, DROP or TRUNCATE
    pub fn is_ddl_statement(&self, statement: &str) -> bool {
        let normalized = self.normalize(statement).to_uppercase();
        ["CREATE", "ALTER", "DROP", "TRUNCATE"]
            .iter()
            .any(|kw| {
                normalized
                    .strip_prefix(kw)
                    .map(|rest| rest.starts_with(char::is_whitespace))
                    .unwrap_or(false)
            })
    }

    /// Classify a statement
    ///
    /// Uses the sqlparser AST when the statement parses, and falls back to
    /// prefix matching on the normalized text.
    pub fn statement_type(&self, statement: &str) -> StatementType {
        let dialect = PostgreSqlDialect {};
        if let Ok(parsed) = Parser::parse_sql(&dialect, statement) {
            if let Some(first) = parsed.first() {
                let classified = match first {
                    Statement::CreateTable { .. } => StatementType::CreateTable,
                    Statement::AlterTable { .. } => StatementType::AlterTable,
                    Statement::Drop { object_type: SqlObjectType::Table, .. } => StatementType::DropTable,
                    Statement::CreateIndex { .. } => StatementType::CreateIndex,
                    Statement::CreateView { .. } => StatementType::CreateView,
                    _ => StatementType::Unknown,
                };
                return classified;
            }
        }

        let normalized = self.normalize(statement).to_uppercase();
        [
            ("CREATE TABLE", StatementType::CreateTable),
            ("ALTER TABLE", StatementType::AlterTable),
            ("DROP TABLE", StatementType::DropTable),
            ("CREATE INDEX", StatementType::CreateIndex),
            ("CREATE UNIQUE INDEX", StatementType::CreateIndex),
            ("CREATE VIEW", StatementType::CreateView),
            ("CREATE OR REPLACE VIEW", StatementType::CreateView),
        ]
        .iter()
        .find(|(prefix, _)| normalized.starts_with(prefix))
        .map(|(_, kind)| *kind)
        .unwrap_or(StatementType::Unknown)
    }
}

/// Trim padding inside a quoted identifier: `"  a "` becomes `"a"`
fn trim_quoted(text: &str) -> String {
    match text.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
        Some(inner) if !inner.trim().is_empty() => format!("\"{}\"", inner.trim()),
        _ => text.to_string(),
    }
}

/// Byte offset of every line start
fn line_offsets(text: &str) -> Vec<usize> {
    let mut offsets = vec![0];
    for (i, ch) in text.char_indices() {
        if ch == '\n' {
            offsets.push(i + 1);
        }
    }
    offsets
}

/// Convert a 1-based (line, character column) location to a byte offset
fn location_to_byte_offset(text: &str, offsets: &[usize], line: u64, column: u64) -> Option<usize> {
    let line_start = *offsets.get((line as usize).checked_sub(1)?)?;
    let skip = (column as usize).checked_sub(1)?;
    text[line_start..]
        .char_indices()
        .nth(skip)
        .map(|(i, _)| line_start + i)
}

/// Statement boundaries from top-level semicolon tokens
fn split_on_semicolons(text: &str) -> Option<Vec<String>> {
    let dialect = PostgreSqlDialect {};
    let tokens = SqlTokenizer::new(&dialect, text).tokenize_with_location().ok()?;
    let offsets = line_offsets(text);

    let mut statements = Vec::new();
    let mut start = 0;
    let mut depth: usize = 0;

    for token in &tokens {
        match &token.token {
            SqlToken::LParen => depth += 1,
            SqlToken::RParen => depth = depth.saturating_sub(1),
            SqlToken::SemiColon if depth == 0 => {
                let loc = &token.span.start;
                let end = location_to_byte_offset(text, &offsets, loc.line, loc.column)?;
                push_statement(&mut statements, &text[start..end]);
                start = end + 1;
            }
            _ => {}
        }
    }
    push_statement(&mut statements, &text[start..]);

    Some(statements)
}

fn push_statement(statements: &mut Vec<String>, raw: &str) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
        statements.push(trimmed.to_string());
    }
}
