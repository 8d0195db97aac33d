pub mod types;
pub mod schema;
pub mod extractor;

pub use types::*;
pub use schema::*;
pub use extractor::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Invalid pattern for field '{field}': {source}")]
    InvalidPattern {
        field: String,
        #[source]
        source: regex::Error,
    },

    #[error("Pattern {index} for field '{field}' has no capture group")]
    MissingCaptureGroup { field: String, index: usize },

    #[error("Field '{0}' declares no patterns")]
    EmptyCascade(String),

    #[error("Field '{0}' is declared more than once")]
    DuplicateField(String),

    #[error("Unknown document kind: {0}")]
    UnknownDocumentKind(String),
}
