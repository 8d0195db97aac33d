use super::preprocess::encode_png;
use super::types::{LayoutHint, NormalizedImage, OcrEngine, PageTranscription};

/// Pick the more complete of two OCR passes over the same page.
///
/// The longer transcription (in characters) wins; on equal length the
/// single-block pass wins.
pub fn select_transcription(single_block: &str, single_column: &str) -> LayoutHint {
    if single_column.chars().count() > single_block.chars().count() {
        LayoutHint::SingleColumn
    } else {
        LayoutHint::SingleBlock
    }
}

/// Runs the OCR engine twice per page and keeps the longer result.
///
/// No retries: a failed pass contributes an empty candidate, and a page whose
/// passes both fail transcribes to an empty string.
pub struct TranscriptionSelector<'a> {
    engine: &'a dyn OcrEngine,
}

impl<'a> TranscriptionSelector<'a> {
    pub fn new(engine: &'a dyn OcrEngine) -> Self {
        Self { engine }
    }

    pub fn transcribe_page(&self, page: &NormalizedImage) -> PageTranscription {
        let png = match encode_png(&page.image) {
            Ok(png) => png,
            Err(e) => {
                tracing::warn!(page = page.page_number, error = %e, "Page encode failed, using empty transcription");
                return PageTranscription::empty(page.page_number);
            }
        };

        let single_block = self.run_pass(&png, page.page_number, LayoutHint::SingleBlock);
        let single_column = self.run_pass(&png, page.page_number, LayoutHint::SingleColumn);
        let selected = select_transcription(&single_block, &single_column);
        let text = match selected {
            LayoutHint::SingleBlock => single_block.clone(),
            LayoutHint::SingleColumn => single_column.clone(),
        };

        tracing::debug!(
            page = page.page_number,
            single_block_chars = single_block.chars().count(),
            single_column_chars = single_column.chars().count(),
            selected = selected.as_str(),
            "Page transcription selected"
        );

        PageTranscription {
            page_number: page.page_number,
            single_block,
            single_column,
            selected,
            text,
        }
    }

    fn run_pass(&self, png: &[u8], page_number: usize, hint: LayoutHint) -> String {
        match self.engine.recognize(png, hint) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(
                    page = page_number,
                    layout = hint.as_str(),
                    error = %e,
                    "OCR pass failed, treating as empty"
                );
                String::new()
            }
        }
    }
}
