use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum KeggError {
    #[error("KEGG request failed: {0}")]
    KeggHttp(String),

    #[error("KEGG returned status {status}: {message}")]
    KeggStatus { status: u16, message: String },

    #[error("MyGene.info request failed: {0}")]
    MyGeneHttp(String),

    #[error("MyGene.info returned status {status}: {message}")]
    MyGeneStatus { status: u16, message: String },

    #[error("failed to decode MyGene.info response: {0}")]
    MyGeneDecode(String),

    #[error("malformed line {line} ({reason}): {content:?}")]
    #[diagnostic(help("expected `<namespace>:<geneset>` followed by `<namespace>:<gene>`"))]
    Parse {
        line: usize,
        content: String,
        reason: String,
    },

    #[error("duplicate entry in {source_name}: {entry}")]
    DuplicateEntry { source_name: String, entry: String },

    #[error("duplicate query results in scope {scope}: {}", queries.join(", "))]
    #[diagnostic(help("an identifier matched more than one gene; remove the scope or the identifier"))]
    DuplicateMatch { scope: String, queries: Vec<String> },

    #[error("missing config file kegg-geneset.json")]
    MissingConfig,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("failed to serialize record: {0}")]
    Serialize(String),

    #[error("invalid geneset type: {0}")]
    InvalidGenesetType(String),

    #[error("unknown organism code: {0}")]
    UnknownOrganism(String),

    #[error("no gene id scopes configured for {0}")]
    NoScopes(String),
}
