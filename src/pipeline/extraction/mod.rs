pub mod types;
pub mod preprocess;
pub mod ocr;
pub mod transcribe;

pub use types::*;
pub use preprocess::*;
pub use ocr::*;
pub use transcribe::*;

use std::time::Duration;

use thiserror::Error;

use crate::intelligence::KnowledgeError;
use crate::pipeline::structuring::SchemaError;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image decode failed: {0}")]
    ImageDecode(String),

    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error("OCR engine unavailable: {0}")]
    OcrUnavailable(String),

    #[error("OCR processing failed: {0}")]
    OcrProcessing(String),

    #[error("OCR timed out after {0:?}")]
    OcrTimeout(Duration),

    #[error("No decodable pages in document")]
    NoDecodablePages,

    #[error("Unsupported format for extraction: {0}")]
    UnsupportedFormat(String),

    #[error("File too large: {size_mb:.1}MB exceeds {max_mb}MB limit")]
    FileTooLarge { size_mb: f64, max_mb: u64 },

    #[error("File is empty: {0}")]
    EmptyFile(String),

    #[error("Text encoding error: {0}")]
    EncodingError(String),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Knowledge base error: {0}")]
    Knowledge(#[from] KnowledgeError),
}
