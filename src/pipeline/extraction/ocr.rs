use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::OnceLock;
use std::thread;
use std::time::{Duration, Instant};

use super::types::{LayoutHint, OcrEngine};
use super::ExtractionError;
use crate::config::PipelineConfig;

/// Interval between child-process status checks while waiting for Tesseract.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// LSTM-only engine mode.
const OEM_LSTM: u8 = 3;

/// Tesseract OCR driven through its command-line interface.
///
/// Each call writes the page to a private temp directory, runs
/// `tesseract page.png out -l <lang> --psm <n> --oem 3` and reads `out.txt`.
/// The child is killed when it exceeds the configured timeout.
pub struct TesseractCli {
    binary: PathBuf,
    language: String,
    timeout: Duration,
    available: OnceLock<bool>,
}

impl TesseractCli {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            language: "eng".into(),
            timeout: Duration::from_secs(crate::config::DEFAULT_OCR_TIMEOUT_SECS),
            available: OnceLock::new(),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(&config.tesseract_path)
            .with_language(&config.ocr_language)
            .with_timeout(config.ocr_timeout())
    }

    /// Set language(s) for OCR (e.g., "eng", "eng+fra")
    pub fn with_language(mut self, language: &str) -> Self {
        self.language = language.to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn probe(&self) -> bool {
        let status = Command::new(&self.binary)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        match status {
            Ok(s) if s.success() => {
                tracing::info!(binary = %self.binary.display(), "Tesseract OCR is available");
                true
            }
            Ok(s) => {
                tracing::warn!(
                    binary = %self.binary.display(),
                    code = s.code().unwrap_or(-1),
                    "Tesseract probe exited with failure, OCR disabled"
                );
                false
            }
            Err(e) => {
                tracing::warn!(
                    binary = %self.binary.display(),
                    error = %e,
                    "Tesseract not found, OCR disabled"
                );
                false
            }
        }
    }
}

impl OcrEngine for TesseractCli {
    fn recognize(&self, png_bytes: &[u8], hint: LayoutHint) -> Result<String, ExtractionError> {
        let work_dir = tempfile::tempdir()?;
        let input = work_dir.path().join("page.png");
        let output_base = work_dir.path().join("out");
        std::fs::write(&input, png_bytes)?;

        let mut child = Command::new(&self.binary)
            .arg(&input)
            .arg(&output_base)
            .arg("-l")
            .arg(&self.language)
            .arg("--psm")
            .arg(hint.psm().to_string())
            .arg("--oem")
            .arg(OEM_LSTM.to_string())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                ExtractionError::OcrUnavailable(format!(
                    "failed to run {} (is it installed?): {e}",
                    self.binary.display()
                ))
            })?;

        let started = Instant::now();
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if started.elapsed() >= self.timeout {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ExtractionError::OcrTimeout(self.timeout));
            }
            thread::sleep(POLL_INTERVAL);
        };

        if !status.success() {
            return Err(ExtractionError::OcrProcessing(format!(
                "tesseract exited with code {}",
                status.code().unwrap_or(-1)
            )));
        }

        let raw = std::fs::read(output_base.with_extension("txt"))?;
        let text = String::from_utf8_lossy(&raw).into_owned();

        tracing::debug!(
            layout = hint.as_str(),
            chars = text.chars().count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Tesseract pass complete"
        );

        Ok(text)
    }

    fn is_available(&self) -> bool {
        *self.available.get_or_init(|| self.probe())
    }
}

/// Mock OCR engine for unit testing without Tesseract.
///
/// Returns a configured text per layout hint; hints without a configured text
/// yield an empty transcription.
pub struct MockOcrEngine {
    texts: HashMap<LayoutHint, String>,
}

impl MockOcrEngine {
    /// Same text for every layout hint.
    pub fn new(text: &str) -> Self {
        Self::with_texts(text, text)
    }

    pub fn with_texts(single_block: &str, single_column: &str) -> Self {
        let mut texts = HashMap::new();
        texts.insert(LayoutHint::SingleBlock, single_block.to_string());
        texts.insert(LayoutHint::SingleColumn, single_column.to_string());
        Self { texts }
    }
}

impl OcrEngine for MockOcrEngine {
    fn recognize(&self, _png_bytes: &[u8], hint: LayoutHint) -> Result<String, ExtractionError> {
        Ok(self.texts.get(&hint).cloned().unwrap_or_default())
    }

    fn is_available(&self) -> bool {
        true
    }
}

/// Engine that is installed but fails every invocation.
pub struct FailingOcrEngine;

impl OcrEngine for FailingOcrEngine {
    fn recognize(&self, _png_bytes: &[u8], _hint: LayoutHint) -> Result<String, ExtractionError> {
        Err(ExtractionError::OcrProcessing("mock OCR failure".into()))
    }

    fn is_available(&self) -> bool {
        true
    }
}

/// Engine that reports itself as not installed.
pub struct UnavailableOcrEngine;

impl OcrEngine for UnavailableOcrEngine {
    fn recognize(&self, _png_bytes: &[u8], _hint: LayoutHint) -> Result<String, ExtractionError> {
        Err(ExtractionError::OcrUnavailable("no OCR engine configured".into()))
    }

    fn is_available(&self) -> bool {
        false
    }
}
