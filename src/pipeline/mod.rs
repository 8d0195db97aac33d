pub mod import;
pub mod extraction;
pub mod structuring;
pub mod processor; // pages → OCR → fields + analysis
pub mod diagnostic; // per-document artifact dump (MEDEXTRACT_DUMP_DIR)
