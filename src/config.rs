use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Application-level constants
pub const APP_NAME: &str = "Medextract";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default per-invocation OCR timeout.
pub const DEFAULT_OCR_TIMEOUT_SECS: u64 = 60;

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "medextract_lib=info,medextract=info"
}

/// Runtime settings for the document pipeline.
///
/// Resolution order: built-in defaults, then a JSON file (`load`), then
/// environment variables (`from_env` / `apply_env`). CLI flags are applied last
/// by the binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Tesseract executable (name on PATH or absolute path).
    pub tesseract_path: PathBuf,
    /// Tesseract language pack(s), e.g. "eng" or "eng+fra".
    pub ocr_language: String,
    /// Upper bound for a single OCR invocation.
    pub ocr_timeout_secs: u64,
    /// Where to write intermediate artifacts. `None` disables the dump.
    pub dump_dir: Option<PathBuf>,
    /// Attach the clinical knowledge analysis to every record.
    pub analysis_enabled: bool,
    /// Replace the built-in medication/condition tables with this JSON file.
    pub knowledge_base_path: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            tesseract_path: PathBuf::from("tesseract"),
            ocr_language: "eng".into(),
            ocr_timeout_secs: DEFAULT_OCR_TIMEOUT_SECS,
            dump_dir: None,
            analysis_enabled: true,
            knowledge_base_path: None,
        }
    }
}

/// Errors raised while reading a config file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    Read(String, std::io::Error),

    #[error("Failed to parse config file {0}: {1}")]
    Parse(String, serde_json::Error),

    #[error("Invalid config file {path}: {reason}")]
    Invalid { path: String, reason: String },
}

impl PipelineConfig {
    /// Defaults overridden by environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Load a JSON config file. Missing keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(path.display().to_string(), e))?;
        let config: Self =
            serde_json::from_str(&raw).map_err(|e| ConfigError::Parse(path.display().to_string(), e))?;
        if config.ocr_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                path: path.display().to_string(),
                reason: "ocr_timeout_secs must be greater than zero".into(),
            });
        }
        Ok(config)
    }

    /// Overlay environment variables on top of the current values.
    pub fn apply_env(&mut self) {
        self.apply_vars(|key| std::env::var(key).ok());
    }

    fn apply_vars(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(path) = var("MEDEXTRACT_TESSERACT_PATH").or_else(|| var("TESSERACT_PATH")) {
            self.tesseract_path = PathBuf::from(path);
        }
        if let Some(lang) = var("MEDEXTRACT_OCR_LANG") {
            self.ocr_language = lang;
        }
        if let Some(raw) = var("MEDEXTRACT_OCR_TIMEOUT_SECS") {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => self.ocr_timeout_secs = secs,
                _ => tracing::warn!(value = %raw, "Ignoring invalid MEDEXTRACT_OCR_TIMEOUT_SECS"),
            }
        }
        if let Some(dir) = var("MEDEXTRACT_DUMP_DIR") {
            self.dump_dir = Some(PathBuf::from(dir));
        }
        if let Some(flag) = var("MEDEXTRACT_DISABLE_ANALYSIS") {
            if matches!(flag.trim(), "1" | "true" | "yes") {
                self.analysis_enabled = false;
            }
        }
        if let Some(path) = var("MEDEXTRACT_KNOWLEDGE_BASE") {
            self.knowledge_base_path = Some(PathBuf::from(path));
        }
    }

    pub fn ocr_timeout(&self) -> Duration {
        Duration::from_secs(self.ocr_timeout_secs)
    }
}
