use image::{ColorType, DynamicImage, GenericImageView, GrayImage};
use serde::{Deserialize, Serialize};

use super::ExtractionError;

/// Separator placed between page texts when building the document text.
pub const PAGE_SEPARATOR: &str = "\n\n";

/// One decoded raster page, owned by the pipeline for a single document.
#[derive(Debug, Clone)]
pub struct PageImage {
    /// 1-based position of the page in the document.
    pub page_number: usize,
    pub image: DynamicImage,
}

impl PageImage {
    pub fn new(page_number: usize, image: DynamicImage) -> Self {
        Self { page_number, image }
    }

    pub fn color_depth(&self) -> ColorType {
        self.image.color()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

/// Two-level image produced by the normalizer. Every pixel is 0 or 255.
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    pub page_number: usize,
    pub image: GrayImage,
    pub original_width: u32,
    pub original_height: u32,
}

/// Page segmentation hint handed to the OCR engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutHint {
    /// Treat the page as one uniform block of text (Tesseract `--psm 6`).
    SingleBlock,
    /// Single column of text of variable sizes (Tesseract `--psm 4`).
    SingleColumn,
}

impl LayoutHint {
    /// Hints in evaluation order. The first one wins ties.
    pub const ALL: [LayoutHint; 2] = [LayoutHint::SingleBlock, LayoutHint::SingleColumn];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SingleBlock => "single_block",
            Self::SingleColumn => "single_column",
        }
    }

    /// Tesseract page segmentation mode.
    pub fn psm(&self) -> u8 {
        match self {
            Self::SingleBlock => 6,
            Self::SingleColumn => 4,
        }
    }
}

/// Transcription of one page: both OCR candidates and the selected winner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageTranscription {
    pub page_number: usize,
    pub single_block: String,
    pub single_column: String,
    pub selected: LayoutHint,
    pub text: String,
}

impl PageTranscription {
    /// Page that could not be decoded or transcribed.
    pub fn empty(page_number: usize) -> Self {
        Self {
            page_number,
            single_block: String::new(),
            single_column: String::new(),
            selected: LayoutHint::SingleBlock,
            text: String::new(),
        }
    }

    /// Page whose text was supplied directly. No OCR candidates.
    pub fn supplied(page_number: usize, text: String) -> Self {
        Self {
            text,
            ..Self::empty(page_number)
        }
    }
}

/// Ordered page transcriptions for one document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transcription {
    pub pages: Vec<PageTranscription>,
}

impl Transcription {
    /// Page winners joined in page order with a blank line between pages.
    pub fn document_text(&self) -> String {
        self.pages
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join(PAGE_SEPARATOR)
    }
}

/// OCR capability: given a normalized page and a layout hint, produce text.
///
/// Implementations must be safe to share across concurrently processed documents.
pub trait OcrEngine: Send + Sync {
    /// Transcribe a PNG-encoded page image.
    fn recognize(&self, png_bytes: &[u8], hint: LayoutHint) -> Result<String, ExtractionError>;

    /// Whether the engine can run at all on this machine.
    fn is_available(&self) -> bool;
}
