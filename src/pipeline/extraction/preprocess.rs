//! Page normalization for OCR input.
//!
//! Turns a decoded raster page into a two-level image that Tesseract reads
//! reliably on printed medical forms:
//!
//! 1. grayscale (ITU-R BT.601 luminance)
//! 2. 1.5x bilinear upscale (larger glyphs recognise better)
//! 3. bilateral filter (smooths scan noise, keeps stroke edges)
//! 4. adaptive Gaussian threshold (handles uneven lighting across the page)
//! 5. morphological closing (drops isolated specks left by thresholding)
//!
//! Every step is a pure image-to-image function so each can be tested alone.
//! The whole chain never fails on a non-empty raster.

use std::io::Cursor;

use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, ImageOutputFormat, Luma, RgbImage};
use tracing::debug;

use super::types::{NormalizedImage, PageImage};
use super::ExtractionError;

// ═══════════════════════════════════════════════════════════
// Configuration
// ═══════════════════════════════════════════════════════════

/// Tuning values for printed-form contrast.
#[derive(Debug, Clone)]
pub struct NormalizerConfig {
    /// Linear upscale factor applied before filtering.
    pub scale: f32,
    /// Bilateral filter neighbourhood diameter (pixels).
    pub bilateral_diameter: u32,
    /// Bilateral range sigma. Smaller keeps edges sharper.
    pub sigma_color: f32,
    /// Bilateral spatial sigma.
    pub sigma_space: f32,
    /// Adaptive threshold window (odd, pixels).
    pub block_size: u32,
    /// Constant subtracted from the local weighted mean.
    pub threshold_c: i32,
    /// Square structuring element for the closing step.
    pub close_kernel: u32,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            scale: 1.5,
            bilateral_diameter: 9,
            sigma_color: 75.0,
            sigma_space: 75.0,
            block_size: 65,
            threshold_c: 13,
            close_kernel: 1,
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Service trait
// ═══════════════════════════════════════════════════════════

/// Converts one raster page into the binary image the OCR engine consumes.
pub trait PageNormalizer: Send + Sync {
    fn normalize(&self, page: &PageImage) -> Result<NormalizedImage, ExtractionError>;
}

/// Production normalizer running the five-step chain.
#[derive(Debug, Clone, Default)]
pub struct OcrNormalizer {
    config: NormalizerConfig,
}

impl OcrNormalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }
}

impl PageNormalizer for OcrNormalizer {
    fn normalize(&self, page: &PageImage) -> Result<NormalizedImage, ExtractionError> {
        let (orig_w, orig_h) = page.dimensions();
        if orig_w == 0 || orig_h == 0 {
            return Err(ExtractionError::ImageProcessing(format!(
                "page {} has zero-sized raster",
                page.page_number
            )));
        }

        let cfg = &self.config;
        let gray = to_grayscale(&page.image);
        let scaled = upscale(&gray, cfg.scale);
        let smoothed = bilateral_filter(&scaled, cfg.bilateral_diameter, cfg.sigma_color, cfg.sigma_space);
        let binary = adaptive_threshold_gaussian(&smoothed, cfg.block_size, cfg.threshold_c);
        let closed = morphological_close(&binary, cfg.close_kernel);

        debug!(
            page = page.page_number,
            original = format!("{orig_w}x{orig_h}"),
            output = format!("{}x{}", closed.width(), closed.height()),
            color = ?page.color_depth(),
            "Page normalized for OCR"
        );

        Ok(NormalizedImage {
            page_number: page.page_number,
            image: closed,
            original_width: orig_w,
            original_height: orig_h,
        })
    }
}

// ═══════════════════════════════════════════════════════════
// Steps
// ═══════════════════════════════════════════════════════════

/// Single-channel view of any decoded page. Grayscale input is copied as-is.
pub fn to_grayscale(img: &DynamicImage) -> GrayImage {
    match img {
        DynamicImage::ImageLuma8(gray) => gray.clone(),
        other => rgb_to_gray(&other.to_rgb8()),
    }
}

/// Convert RGB image to grayscale using ITU-R BT.601 luminance.
pub fn rgb_to_gray(rgb: &RgbImage) -> GrayImage {
    let (w, h) = (rgb.width(), rgb.height());
    let mut gray = GrayImage::new(w, h);
    for y in 0..h {
        for x in 0..w {
            let p = rgb.get_pixel(x, y);
            let luma = 0.299 * p.0[0] as f32 + 0.587 * p.0[1] as f32 + 0.114 * p.0[2] as f32;
            gray.put_pixel(x, y, Luma([luma.round().clamp(0.0, 255.0) as u8]));
        }
    }
    gray
}

/// Compute upscaled dimensions, never collapsing an axis to zero.
pub fn scaled_dimensions(width: u32, height: u32, factor: f32) -> (u32, u32) {
    let w = ((width as f32 * factor).round() as u32).max(1);
    let h = ((height as f32 * factor).round() as u32).max(1);
    (w, h)
}

/// Bilinear resize by a fixed factor (aspect ratio preserved).
pub fn upscale(img: &GrayImage, factor: f32) -> GrayImage {
    let (w, h) = scaled_dimensions(img.width(), img.height(), factor);
    image::imageops::resize(img, w, h, FilterType::Triangle)
}

/// Edge-preserving smoothing.
///
/// Each output pixel is the average of its circular neighbourhood, weighted by
/// spatial distance (`sigma_space`) and by intensity difference
/// (`sigma_color`). Strokes survive because pixels across an edge differ too
/// much in intensity to contribute.
pub fn bilateral_filter(img: &GrayImage, diameter: u32, sigma_color: f32, sigma_space: f32) -> GrayImage {
    let radius = (diameter / 2).max(1) as i32;
    let (w, h) = (img.width() as i32, img.height() as i32);

    let space_coeff = -0.5 / (sigma_space * sigma_space);
    let color_coeff = -0.5 / (sigma_color * sigma_color);

    let mut offsets: Vec<(i32, i32, f32)> = Vec::new();
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let dist_sq = (dx * dx + dy * dy) as f32;
            if dist_sq > (radius * radius) as f32 {
                continue;
            }
            offsets.push((dx, dy, (dist_sq * space_coeff).exp()));
        }
    }

    let color_weights: Vec<f32> = (0..256)
        .map(|d| ((d * d) as f32 * color_coeff).exp())
        .collect();

    let mut output = GrayImage::new(img.width(), img.height());
    for y in 0..h {
        for x in 0..w {
            let center = img.get_pixel(x as u32, y as u32).0[0];
            let mut sum = 0.0f32;
            let mut weight_sum = 0.0f32;

            for &(dx, dy, spatial) in &offsets {
                let nx = x + dx;
                let ny = y + dy;
                if nx < 0 || ny < 0 || nx >= w || ny >= h {
                    continue;
                }
                let value = img.get_pixel(nx as u32, ny as u32).0[0];
                let weight = spatial * color_weights[(value as i32 - center as i32).unsigned_abs() as usize];
                sum += value as f32 * weight;
                weight_sum += weight;
            }

            let out = if weight_sum > 0.0 {
                (sum / weight_sum).round().clamp(0.0, 255.0) as u8
            } else {
                center
            };
            output.put_pixel(x as u32, y as u32, Luma([out]));
        }
    }

    output
}

/// Normalized 1-D Gaussian kernel of `size` taps.
///
/// Sigma follows the common rule for adaptive thresholding:
/// `0.3 * ((size - 1) * 0.5 - 1) + 0.8`.
pub fn gaussian_kernel(size: u32) -> Vec<f32> {
    let size = size.max(1) as i32;
    let sigma = (0.3 * ((size - 1) as f32 * 0.5 - 1.0) + 0.8).max(0.1);
    let half = size / 2;
    let mut kernel: Vec<f32> = (-half..=half)
        .map(|i| (-((i * i) as f32) / (2.0 * sigma * sigma)).exp())
        .collect();
    let total: f32 = kernel.iter().sum();
    for k in &mut kernel {
        *k /= total;
    }
    kernel
}

/// Gaussian-weighted local mean with replicated borders (separable pass).
fn gaussian_local_mean(img: &GrayImage, block_size: u32) -> Vec<f32> {
    let kernel = gaussian_kernel(block_size);
    let half = (kernel.len() / 2) as i32;
    let (w, h) = (img.width() as i32, img.height() as i32);

    let mut horizontal = vec![0.0f32; (w * h) as usize];
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0.0f32;
            for (k, weight) in kernel.iter().enumerate() {
                let sx = (x + k as i32 - half).clamp(0, w - 1);
                acc += img.get_pixel(sx as u32, y as u32).0[0] as f32 * weight;
            }
            horizontal[(y * w + x) as usize] = acc;
        }
    }

    let mut mean = vec![0.0f32; (w * h) as usize];
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0.0f32;
            for (k, weight) in kernel.iter().enumerate() {
                let sy = (y + k as i32 - half).clamp(0, h - 1);
                acc += horizontal[(sy * w + x) as usize] * weight;
            }
            mean[(y * w + x) as usize] = acc;
        }
    }

    mean
}

/// Locally thresholded binarization.
///
/// A pixel becomes white (255) when it is brighter than its Gaussian-weighted
/// neighbourhood mean minus `c`, black (0) otherwise.
pub fn adaptive_threshold_gaussian(img: &GrayImage, block_size: u32, c: i32) -> GrayImage {
    let block_size = if block_size % 2 == 0 { block_size + 1 } else { block_size };
    let (w, h) = (img.width(), img.height());
    if w == 0 || h == 0 {
        return GrayImage::new(w, h);
    }

    let mean = gaussian_local_mean(img, block_size);
    let mut output = GrayImage::new(w, h);
    for y in 0..h {
        for x in 0..w {
            let src = img.get_pixel(x, y).0[0] as i32;
            let local = mean[(y * w + x) as usize].round() as i32;
            let value = if src - local > -c { 255 } else { 0 };
            output.put_pixel(x, y, Luma([value]));
        }
    }
    output
}

fn square_extreme(img: &GrayImage, kernel: u32, pick_max: bool) -> GrayImage {
    let before = ((kernel - 1) / 2) as i32;
    let after = (kernel / 2) as i32;
    let (w, h) = (img.width() as i32, img.height() as i32);
    let mut output = GrayImage::new(img.width(), img.height());

    for y in 0..h {
        for x in 0..w {
            let mut acc = if pick_max { u8::MIN } else { u8::MAX };
            for ny in (y - before).max(0)..=(y + after).min(h - 1) {
                for nx in (x - before).max(0)..=(x + after).min(w - 1) {
                    let v = img.get_pixel(nx as u32, ny as u32).0[0];
                    acc = if pick_max { acc.max(v) } else { acc.min(v) };
                }
            }
            output.put_pixel(x as u32, y as u32, Luma([acc]));
        }
    }
    output
}

/// Dilate then erode with a `kernel` x `kernel` square.
///
/// On a white-background page this fills dark specks smaller than the kernel.
/// A kernel of 1 leaves the image unchanged.
pub fn morphological_close(img: &GrayImage, kernel: u32) -> GrayImage {
    if kernel <= 1 {
        return img.clone();
    }
    let dilated = square_extreme(img, kernel, true);
    square_extreme(&dilated, kernel, false)
}

/// Encode a grayscale image as PNG bytes for the OCR engine.
pub fn encode_png(img: &GrayImage) -> Result<Vec<u8>, ExtractionError> {
    let dynamic = DynamicImage::ImageLuma8(img.clone());
    let mut cursor = Cursor::new(Vec::new());
    dynamic
        .write_to(&mut cursor, ImageOutputFormat::Png)
        .map_err(|e| ExtractionError::ImageProcessing(format!("PNG encode failed: {e}")))?;
    Ok(cursor.into_inner())
}
