use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::{DynamicImage, GenericImageView};

use super::format::{detect_format, FileCategory};
use crate::pipeline::extraction::{ExtractionError, PageImage};

/// One page of a document as handed to the processor.
#[derive(Debug, Clone)]
pub enum PageInput {
    /// Decoded raster page awaiting OCR.
    Raster(PageImage),
    /// Page that already carries text.
    Text { page_number: usize, text: String },
    /// Page whose bytes could not be decoded. Contributes an empty transcription.
    Undecodable { page_number: usize, reason: String },
}

impl PageInput {
    pub fn page_number(&self) -> usize {
        match self {
            Self::Raster(page) => page.page_number,
            Self::Text { page_number, .. } | Self::Undecodable { page_number, .. } => *page_number,
        }
    }

    pub fn is_decodable(&self) -> bool {
        !matches!(self, Self::Undecodable { .. })
    }
}

/// Load each file as one page of a single document, in argument order.
///
/// Format problems (PDF, unknown binary, empty or oversized file) abort the
/// load. A recognized image that fails to decode becomes an `Undecodable` page.
pub fn load_document(paths: &[PathBuf]) -> Result<Vec<PageInput>, ExtractionError> {
    let mut pages = Vec::with_capacity(paths.len());
    for (index, path) in paths.iter().enumerate() {
        pages.push(load_page(path, index + 1)?);
    }
    Ok(pages)
}

pub fn load_page(path: &Path, page_number: usize) -> Result<PageInput, ExtractionError> {
    let detection = detect_format(path)?;
    tracing::debug!(
        page = page_number,
        path = %path.display(),
        category = detection.category.as_str(),
        mime = %detection.mime_type,
        size = detection.file_size_bytes,
        "Format detected"
    );

    match detection.category {
        FileCategory::Image => {
            let bytes = std::fs::read(path)?;
            match decode_page(&bytes, page_number) {
                Ok(page) => Ok(PageInput::Raster(page)),
                Err(e) => {
                    tracing::warn!(page = page_number, path = %path.display(), error = %e, "Page image could not be decoded");
                    Ok(PageInput::Undecodable {
                        page_number,
                        reason: e.to_string(),
                    })
                }
            }
        }
        FileCategory::PlainText => Ok(PageInput::Text {
            page_number,
            text: read_text(path)?,
        }),
        FileCategory::Pdf => Err(ExtractionError::UnsupportedFormat(format!(
            "{}: PDF pages must be rasterized before extraction",
            path.display()
        ))),
        FileCategory::Unsupported => Err(ExtractionError::UnsupportedFormat(format!(
            "{}: {}",
            path.display(),
            detection.mime_type
        ))),
    }
}

/// Decode image bytes and apply any EXIF orientation.
pub fn decode_page(bytes: &[u8], page_number: usize) -> Result<PageImage, ExtractionError> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| ExtractionError::ImageDecode(format!("page {page_number}: {e}")))?;
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return Err(ExtractionError::ImageDecode(format!(
            "page {page_number}: image has zero size"
        )));
    }
    let orientation = read_exif_orientation(bytes);
    Ok(PageImage::new(page_number, apply_orientation(img, orientation)))
}

fn read_text(path: &Path) -> Result<String, ExtractionError> {
    let bytes = std::fs::read(path)?;
    String::from_utf8(bytes)
        .map_err(|e| ExtractionError::EncodingError(format!("{}: {e}", path.display())))
}

/// Read EXIF orientation tag from raw image bytes.
/// Returns 1 (normal) if no EXIF data or tag not present.
pub fn read_exif_orientation(bytes: &[u8]) -> u32 {
    let mut cursor = Cursor::new(bytes);
    let reader = match exif::Reader::new().read_from_container(&mut cursor) {
        Ok(r) => r,
        Err(_) => return 1,
    };

    reader
        .get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|f| f.value.get_uint(0))
        .unwrap_or(1)
}

/// Apply EXIF orientation transform to a `DynamicImage`.
///
/// 1 = Normal, 2 = Mirrored, 3 = 180deg, 4 = Flipped V,
/// 5 = Mirrored + 90deg CW, 6 = 90deg CW, 7 = Mirrored + 270deg CW, 8 = 270deg CW
pub fn apply_orientation(img: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.rotate90().fliph(),
        6 => img.rotate90(),
        7 => img.rotate270().fliph(),
        8 => img.rotate270(),
        _ => img,
    }
}
