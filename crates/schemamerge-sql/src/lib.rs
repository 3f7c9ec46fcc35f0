//! DDL lexing, normalization and parsing
//!
//! Turns raw DDL text into [`SchemaObject`](schemamerge_core::SchemaObject)
//! records: tokenize, normalize, split into statements, parse each
//! `CREATE TABLE` into a table with nested columns and foreign keys.

pub mod normalizer;
pub mod parser;
pub mod tokenizer;

pub use normalizer::{Normalizer, StatementType};
pub use parser::{ParsedScript, SkippedStatement, StatementParser, RAW_DEFINITION};
pub use tokenizer::{Token, TokenKind, Tokenizer};
