//! Per-document artifact dump for inspecting each pipeline stage.
//!
//! Enabled by `PipelineConfig::dump_dir` (env `MEDEXTRACT_DUMP_DIR`).
//!
//! ```text
//! {dump_dir}/{document_id}/
//!   01-page-1-original.png
//!   02-page-1-normalized.png
//!   03-page-1-transcription.json
//!   04-document-text.txt
//!   05-record.json
//! ```
//!
//! Write failures are logged and never reach the caller.

use std::path::{Path, PathBuf};

use image::{DynamicImage, GrayImage, ImageOutputFormat};
use uuid::Uuid;

use super::extraction::{encode_png, PageTranscription};

/// Dump sink for one document. Inert when no dump directory is configured.
#[derive(Debug, Clone)]
pub struct DiagnosticDump {
    dir: Option<PathBuf>,
}

impl DiagnosticDump {
    pub fn disabled() -> Self {
        Self { dir: None }
    }

    /// Creates `{base}/{document_id}/`. Falls back to a disabled dump if the
    /// directory cannot be created.
    pub fn for_document(base: Option<&Path>, document_id: &Uuid) -> Self {
        let Some(base) = base else {
            return Self::disabled();
        };
        let dir = base.join(document_id.to_string());
        if let Err(e) = std::fs::create_dir_all(&dir) {
            tracing::warn!(
                path = %dir.display(),
                error = %e,
                "Diagnostic dump: failed to create directory"
            );
            return Self::disabled();
        }
        Self { dir: Some(dir) }
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    pub fn original_page(&self, page_number: usize, image: &DynamicImage) {
        let Some(dir) = self.dir() else { return };
        let mut png = Vec::new();
        match image.write_to(&mut png, ImageOutputFormat::Png) {
            Ok(()) => dump_binary(dir, &format!("01-page-{page_number}-original.png"), &png),
            Err(e) => tracing::warn!(page = page_number, error = %e, "Diagnostic dump: failed to encode page"),
        }
    }

    pub fn normalized_page(&self, page_number: usize, image: &GrayImage) {
        let Some(dir) = self.dir() else { return };
        match encode_png(image) {
            Ok(png) => dump_binary(dir, &format!("02-page-{page_number}-normalized.png"), &png),
            Err(e) => tracing::warn!(page = page_number, error = %e, "Diagnostic dump: failed to encode page"),
        }
    }

    pub fn transcription(&self, page: &PageTranscription) {
        let Some(dir) = self.dir() else { return };
        dump_json(dir, &format!("03-page-{}-transcription.json", page.page_number), page);
    }

    pub fn document_text(&self, text: &str) {
        let Some(dir) = self.dir() else { return };
        dump_text(dir, "04-document-text.txt", text);
    }

    pub fn record<T: serde::Serialize>(&self, record: &T) {
        let Some(dir) = self.dir() else { return };
        dump_json(dir, "05-record.json", record);
    }
}

/// Write a binary artifact. Logs on success (debug) and failure (warn).
pub fn dump_binary(dir: &Path, filename: &str, data: &[u8]) {
    let path = dir.join(filename);
    match std::fs::write(&path, data) {
        Ok(()) => tracing::debug!(
            path = %path.display(),
            size = data.len(),
            "Diagnostic dump: binary written"
        ),
        Err(e) => tracing::warn!(
            path = %path.display(),
            error = %e,
            "Diagnostic dump: failed to write binary"
        ),
    }
}

/// Write a pretty-printed JSON artifact.
pub fn dump_json<T: serde::Serialize + ?Sized>(dir: &Path, filename: &str, value: &T) {
    let path = dir.join(filename);
    match serde_json::to_string_pretty(value) {
        Ok(json) => dump_text(dir, filename, &json),
        Err(e) => tracing::warn!(
            path = %path.display(),
            error = %e,
            "Diagnostic dump: failed to serialize JSON"
        ),
    }
}

pub fn dump_text(dir: &Path, filename: &str, text: &str) {
    let path = dir.join(filename);
    match std::fs::write(&path, text.as_bytes()) {
        Ok(()) => tracing::debug!(
            path = %path.display(),
            size = text.len(),
            "Diagnostic dump: text written"
        ),
        Err(e) => tracing::warn!(
            path = %path.display(),
            error = %e,
            "Diagnostic dump: failed to write text"
        ),
    }
}
