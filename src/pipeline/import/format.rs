use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::pipeline::extraction::ExtractionError;

/// Input categories the pipeline distinguishes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum FileCategory {
    /// Raster page to be normalized and transcribed.
    Image,
    /// Already-transcribed text; skips OCR.
    PlainText,
    /// Needs rasterization first, which is outside this pipeline.
    Pdf,
    Unsupported,
}

impl FileCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::PlainText => "plain_text",
            Self::Pdf => "pdf",
            Self::Unsupported => "unsupported",
        }
    }
}

/// Result of format detection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormatDetection {
    pub mime_type: String,
    pub category: FileCategory,
    pub file_size_bytes: u64,
}

pub const MAX_FILE_SIZE: u64 = 100 * 1024 * 1024; // 100MB

/// Detect file format from magic bytes, ignoring the extension.
pub fn detect_format(path: &Path) -> Result<FormatDetection, ExtractionError> {
    let file_size = std::fs::metadata(path)?.len();

    if file_size == 0 {
        return Err(ExtractionError::EmptyFile(path.display().to_string()));
    }
    if file_size > MAX_FILE_SIZE {
        return Err(ExtractionError::FileTooLarge {
            size_mb: file_size as f64 / (1024.0 * 1024.0),
            max_mb: MAX_FILE_SIZE / (1024 * 1024),
        });
    }

    let mut file = std::fs::File::open(path)?;
    let mut header = [0u8; 18];
    let bytes_read = file.read(&mut header)?;

    let (mime_type, category) = match &header[..bytes_read.min(8)] {
        // %PDF
        [0x25, 0x50, 0x44, 0x46, ..] => ("application/pdf", FileCategory::Pdf),
        [0xFF, 0xD8, 0xFF, ..] => ("image/jpeg", FileCategory::Image),
        [0x89, 0x50, 0x4E, 0x47, ..] => ("image/png", FileCategory::Image),
        // little-endian (II*\0) or big-endian (MM\0*)
        [0x49, 0x49, 0x2A, 0x00, ..] | [0x4D, 0x4D, 0x00, 0x2A, ..] => ("image/tiff", FileCategory::Image),
        [0x42, 0x4D, ..] if is_bmp_header(&header[..bytes_read]) => ("image/bmp", FileCategory::Image),
        _ => {
            if is_likely_text(path)? {
                ("text/plain", FileCategory::PlainText)
            } else {
                ("application/octet-stream", FileCategory::Unsupported)
            }
        }
    };

    Ok(FormatDetection {
        mime_type: mime_type.to_string(),
        category,
        file_size_bytes: file_size,
    })
}

/// "BM" alone also starts ordinary text ("BMI: ..."), so the DIB header size
/// at offset 14 must be one of the known BMP variants.
fn is_bmp_header(bytes: &[u8]) -> bool {
    if bytes.len() < 18 || !bytes.starts_with(b"BM") {
        return false;
    }
    let dib_size = u32::from_le_bytes([bytes[14], bytes[15], bytes[16], bytes[17]]);
    matches!(dib_size, 12 | 40 | 52 | 56 | 64 | 108 | 124)
}

/// Check if a file is likely plain text (valid UTF-8, mostly printable)
fn is_likely_text(path: &Path) -> Result<bool, ExtractionError> {
    let mut file = std::fs::File::open(path)?;
    let mut buffer = vec![0u8; 4096];
    let n = file.read(&mut buffer)?;
    buffer.truncate(n);

    if n == 0 {
        return Ok(false);
    }

    // A multi-byte character may be cut at the buffer boundary
    let text = match std::str::from_utf8(&buffer) {
        Ok(t) => t,
        Err(e) if e.error_len().is_none() => {
            // valid_up_to is a char boundary
            std::str::from_utf8(&buffer[..e.valid_up_to()]).unwrap_or_default()
        }
        Err(_) => return Ok(false),
    };

    let total = text.chars().count();
    if total == 0 {
        return Ok(false);
    }
    let printable = text
        .chars()
        .filter(|c| !c.is_control() || c.is_whitespace())
        .count();
    Ok(printable as f64 / total as f64 > 0.80)
}
