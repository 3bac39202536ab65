//! Reading grammar documents.
//!
//! A grammar arrives as a JSON document with four named fields:
//!
//! ```json
//! {
//!   "Variables": ["E", "T"],
//!   "Terminals": ["+", "id"],
//!   "Productions": [
//!     {"head": "E", "body": ["E", "+", "T"]},
//!     {"head": "E", "body": ["T"]},
//!     {"head": "T", "body": ["id"]}
//!   ],
//!   "Start": "E"
//! }
//! ```
//!
//! An empty `body` list denotes the epsilon production.

use crate::grammar::{Grammar, GrammarError, Symbol};
use serde::Deserialize;
use std::{fs, io, path::Path};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
struct GrammarDoc {
    variables: Vec<String>,
    terminals: Vec<String>,
    productions: Vec<ProductionDoc>,
    start: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ProductionDoc {
    head: String,
    body: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum SyntaxError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("malformed grammar document: {0}")]
    Document(#[from] serde_json::Error),

    #[error(transparent)]
    Grammar(#[from] GrammarError),
}

pub fn parse_str(source: &str) -> Result<Grammar, SyntaxError> {
    let doc: GrammarDoc = serde_json::from_str(source)?;
    let grammar = Grammar::new(
        doc.variables.into_iter().map(Symbol::new),
        doc.terminals.into_iter().map(Symbol::new),
        doc.productions.into_iter().map(|production| {
            (
                Symbol::new(production.head),
                production.body.into_iter().map(Symbol::new).collect(),
            )
        }),
        Symbol::new(doc.start),
    )?;
    Ok(grammar)
}

pub fn parse_file(path: impl AsRef<Path>) -> Result<Grammar, SyntaxError> {
    let source = fs::read_to_string(path)?;
    parse_str(&source)
}
