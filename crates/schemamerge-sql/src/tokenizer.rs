//! Single-pass DDL tokenizer
//!
//! One composed regex, tried in table order at each position. Comments,
//! newlines and whitespace are consumed for position bookkeeping and
//! dropped. Any character no pattern accepts becomes a one-character
//! `Operator`, so tokenizing always terminates.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use schemamerge_core::TokenizerOptions;

/// Classified token kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Keyword,
    Identifier,
    QuotedIdentifier,
    String,
    Number,
    Type,
    Constraint,
    Operator,
    Comma,
    Dot,
    Semicolon,
    LParen,
    RParen,
    /// Synthetic end-of-stream marker
    Eof,
}

/// A lexical token with its source position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,

    /// 1-indexed line
    pub line: usize,

    /// 1-indexed column, in characters
    pub column: usize,

    /// Byte offset into the input
    pub offset: usize,
}

impl Token {
    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::Eof
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.text)
    }
}

/// Raw lexeme class before keyword classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lexeme {
    Comment,
    Newline,
    Whitespace,
    Literal(TokenKind),
    Word,
}

const TOKEN_SPECS: &[(&str, Lexeme)] = &[
    (r"--[^\n]*", Lexeme::Comment),
    (r"/\*(?s:.*?)\*/", Lexeme::Comment),
    (r"\r\n|\r|\n", Lexeme::Newline),
    (r"[^\S\r\n]+", Lexeme::Whitespace),
    (r"'(?:[^']|'')*'", Lexeme::Literal(TokenKind::String)),
    (r#""(?:[^"]|"")*""#, Lexeme::Literal(TokenKind::QuotedIdentifier)),
    (r"[0-9]+\.[0-9]+|[0-9]+", Lexeme::Literal(TokenKind::Number)),
    (
        r"\|\|/|!~\*|<=|>=|<>|!=|~=|!~|~\*|\|\||\|/|@>|<@|&&|<<|>>|::",
        Lexeme::Literal(TokenKind::Operator),
    ),
    (r"[=<>!@#%^&|*/+\-~:\[\]]", Lexeme::Literal(TokenKind::Operator)),
    (r",", Lexeme::Literal(TokenKind::Comma)),
    (r"\.", Lexeme::Literal(TokenKind::Dot)),
    (r";", Lexeme::Literal(TokenKind::Semicolon)),
    (r"\(", Lexeme::Literal(TokenKind::LParen)),
    (r"\)", Lexeme::Literal(TokenKind::RParen)),
    (r"[A-Za-z_][A-Za-z0-9_$]*", Lexeme::Word),
];

static MASTER: Lazy<Regex> = Lazy::new(|| {
    let alternatives: Vec<String> = TOKEN_SPECS
        .iter()
        .enumerate()
        .map(|(i, (pattern, _))| format!("(?P<T{}>{})", i, pattern))
        .collect();
    Regex::new(&format!(r"\A(?:{})", alternatives.join("|"))).expect("token table is a valid regex")
});

pub const KEYWORDS: &[&str] = &[
    "CREATE", "ALTER", "DROP", "TABLE", "SCHEMA", "COLUMN", "CONSTRAINT", "PRIMARY", "KEY",
    "FOREIGN", "REFERENCES", "UNIQUE", "CHECK", "DEFAULT", "NOT", "NULL", "ADD", "RENAME", "TO",
    "IF", "EXISTS", "ON", "DELETE", "UPDATE", "CASCADE", "RESTRICT", "SET", "INDEX", "VIEW",
    "TRUNCATE",
];

pub const TYPE_KEYWORDS: &[&str] = &[
    "SMALLINT", "INTEGER", "INT", "BIGINT", "REAL", "DOUBLE", "PRECISION", "FLOAT", "FLOAT4",
    "FLOAT8", "NUMERIC", "DECIMAL", "CHAR", "CHARACTER", "VARYING", "VARCHAR", "TEXT", "BOOLEAN",
    "BOOL", "DATE", "TIME", "TIMESTAMP", "TIMESTAMPTZ", "TIMETZ", "INTERVAL", "JSON", "JSONB",
    "UUID", "XML", "BYTEA", "OID", "MONEY", "SERIAL", "BIGSERIAL",
];

pub const CONSTRAINT_KEYWORDS: &[&str] = &[
    "PRIMARY", "FOREIGN", "UNIQUE", "CHECK", "REFERENCES", "DEFAULT", "NOT", "NULL",
];

/// Classify a bare word
///
/// Type names win over constraint words, which win over plain keywords.
fn classify_word(word: &str) -> TokenKind {
    let upper = word.to_ascii_uppercase();
    let upper = upper.as_str();

    if TYPE_KEYWORDS.contains(&upper) {
        TokenKind::Type
    } else if CONSTRAINT_KEYWORDS.contains(&upper) {
        TokenKind::Constraint
    } else if KEYWORDS.contains(&upper) {
        TokenKind::Keyword
    } else {
        TokenKind::Identifier
    }
}

/// DDL tokenizer
#[derive(Debug, Clone, Default)]
pub struct Tokenizer {
    preserve_case: bool,
}

impl Tokenizer {
    /// Create a tokenizer that uppercases keywords and lowercases identifiers
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: &TokenizerOptions) -> Self {
        Self {
            preserve_case: options.preserve_case,
        }
    }

    /// Keep keyword and identifier case as written
    pub fn preserve_case(mut self, preserve: bool) -> Self {
        self.preserve_case = preserve;
        self
    }

    /// Tokenize `text`, dropping trivia and appending an `Eof` token
    pub fn tokenize(&self, text: &str) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut pos = 0;
        let mut line = 1;
        let mut column = 1;

        while pos < text.len() {
            let rest = &text[pos..];
            let matched = MASTER.captures(rest).and_then(|caps| {
                TOKEN_SPECS
                    .iter()
                    .enumerate()
                    .find_map(|(i, (_, lexeme))| caps.name(&format!("T{}", i)).map(|m| (m.as_str(), *lexeme)))
            });

            let (lexeme_text, lexeme) = match matched {
                Some((matched_text, lexeme)) if !matched_text.is_empty() => (matched_text, lexeme),
                other => {
                    debug_assert!(other.is_none(), "token table produced an empty match at byte {}", pos);
                    let len = rest.chars().next().map(char::len_utf8).unwrap_or(1);
                    (&rest[..len], Lexeme::Literal(TokenKind::Operator))
                }
            };

            let (start_line, start_column, start_offset) = (line, column, pos);

            for ch in lexeme_text.chars() {
                if ch == '\n' {
                    line += 1;
                    column = 1;
                } else if ch == '\r' && !lexeme_text.contains('\n') {
                    line += 1;
                    column = 1;
                } else {
                    column += 1;
                }
            }
            pos += lexeme_text.len();

            let (kind, text) = match lexeme {
                Lexeme::Comment | Lexeme::Newline | Lexeme::Whitespace => continue,
                Lexeme::Literal(kind) => (kind, lexeme_text.to_string()),
                Lexeme::Word => {
                    let kind = classify_word(lexeme_text);
                    let text = match (self.preserve_case, kind) {
                        (true, _) => lexeme_text.to_string(),
                        (false, TokenKind::Identifier) => lexeme_text.to_ascii_lowercase(),
                        (false, _) => lexeme_text.to_ascii_uppercase(),
                    };
                    (kind, text)
                }
            };

            tokens.push(Token {
                kind,
                text,
                line: start_line,
                column: start_column,
                offset: start_offset,
            });
        }

        tokens.push(Token {
            kind: TokenKind::Eof,
            text: String::new(),
            line,
            column,
            offset: text.len(),
        });

        tokens
    }
}
