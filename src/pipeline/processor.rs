//! Document processing orchestrator.
//!
//! Drives one document through the pipeline:
//! pages → normalize → dual-pass OCR → document text → {field extraction,
//! clinical analysis} → record.
//!
//! Engines are injected as trait objects so the whole flow runs against mock
//! OCR in tests. Stage failures degrade the affected page to an empty
//! transcription; only a document with no decodable page is rejected.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::intelligence::{AnalysisResult, ClinicalEngine, KnowledgeBase, RuleBasedEngine};
use crate::pipeline::diagnostic::DiagnosticDump;
use crate::pipeline::extraction::{
    ExtractionError, OcrEngine, OcrNormalizer, PageImage, PageNormalizer, PageTranscription,
    TesseractCli, Transcription, TranscriptionSelector,
};
use crate::pipeline::import::{load_document, PageInput};
use crate::pipeline::structuring::{
    extract_fields, fill_placeholders, placeholder_fields, DocumentKind, ExtractionResult,
};

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    /// Fields were extracted from transcribed text.
    Extracted,
    /// OCR was unavailable for some pages; fields missing from the text
    /// pages hold their placeholder text.
    Partial,
    /// OCR was unavailable and no page carried text; every field holds its
    /// placeholder text.
    Placeholder,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Extracted => "extracted",
            Self::Partial => "partial",
            Self::Placeholder => "placeholder",
        }
    }
}

/// Final output for one document.
///
/// Serializes as the schema's fields plus an optional `ai_analysis` object.
/// Bookkeeping fields stay out of the JSON.
#[derive(Debug, Clone, Serialize)]
pub struct MedicalRecord {
    #[serde(skip)]
    pub document_id: Uuid,
    #[serde(skip)]
    pub status: RecordStatus,
    #[serde(skip)]
    pub document_text: String,
    #[serde(flatten)]
    pub fields: ExtractionResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_analysis: Option<AnalysisResult>,
}

impl MedicalRecord {
    pub fn kind(&self) -> DocumentKind {
        self.fields.kind()
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct DocumentProcessor {
    ocr: Box<dyn OcrEngine>,
    normalizer: Box<dyn PageNormalizer>,
    clinical: Option<Box<dyn ClinicalEngine>>,
    dump_dir: Option<PathBuf>,
}

impl DocumentProcessor {
    /// Default normalizer, built-in knowledge base, no diagnostic dump.
    pub fn new(ocr: Box<dyn OcrEngine>) -> Self {
        Self {
            ocr,
            normalizer: Box::new(OcrNormalizer::default()),
            clinical: Some(Box::new(RuleBasedEngine::default())),
            dump_dir: None,
        }
    }

    /// Tesseract CLI engine plus the configured knowledge base and dump dir.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, ExtractionError> {
        let clinical: Option<Box<dyn ClinicalEngine>> = if config.analysis_enabled {
            let kb = match &config.knowledge_base_path {
                Some(path) => Arc::new(KnowledgeBase::load(path)?),
                None => KnowledgeBase::builtin(),
            };
            Some(Box::new(RuleBasedEngine::new(kb)))
        } else {
            None
        };

        Ok(Self {
            ocr: Box::new(TesseractCli::from_config(config)),
            normalizer: Box::new(OcrNormalizer::default()),
            clinical,
            dump_dir: config.dump_dir.clone(),
        })
    }

    pub fn with_normalizer(mut self, normalizer: Box<dyn PageNormalizer>) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn with_clinical_engine(mut self, engine: Box<dyn ClinicalEngine>) -> Self {
        self.clinical = Some(engine);
        self
    }

    pub fn without_analysis(mut self) -> Self {
        self.clinical = None;
        self
    }

    pub fn with_dump_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dump_dir = Some(dir.into());
        self
    }

    pub fn ocr_available(&self) -> bool {
        self.ocr.is_available()
    }

    /// Load files as the pages of one document and process them.
    pub fn process_files(&self, paths: &[PathBuf], kind: DocumentKind) -> Result<MedicalRecord, ExtractionError> {
        let pages = load_document(paths)?;
        self.process_document(pages, kind)
    }

    /// Process decoded raster pages.
    pub fn process_pages(&self, pages: Vec<PageImage>, kind: DocumentKind) -> Result<MedicalRecord, ExtractionError> {
        self.process_document(pages.into_iter().map(PageInput::Raster).collect(), kind)
    }

    /// Run the pipeline over a document's pages.
    ///
    /// Fails only with `NoDecodablePages`. Without an OCR engine, raster pages
    /// contribute no text: fields are taken from the text pages and the rest
    /// get placeholders. A document with no text pages at all yields a
    /// placeholder record.
    pub fn process_document(&self, pages: Vec<PageInput>, kind: DocumentKind) -> Result<MedicalRecord, ExtractionError> {
        let document_id = Uuid::new_v4();
        let start = Instant::now();

        if !pages.iter().any(PageInput::is_decodable) {
            tracing::warn!(document_id = %document_id, pages = pages.len(), "No decodable pages");
            return Err(ExtractionError::NoDecodablePages);
        }

        tracing::info!(
            document_id = %document_id,
            kind = kind.as_str(),
            pages = pages.len(),
            "Processing document"
        );

        let needs_ocr = pages.iter().any(|p| matches!(p, PageInput::Raster(_)));
        let ocr_missing = needs_ocr && !self.ocr.is_available();
        let has_text_pages = pages.iter().any(|p| matches!(p, PageInput::Text { .. }));
        if ocr_missing && !has_text_pages {
            tracing::warn!(document_id = %document_id, "OCR unavailable, returning placeholder fields");
            let record = MedicalRecord {
                document_id,
                status: RecordStatus::Placeholder,
                document_text: String::new(),
                fields: placeholder_fields(kind),
                ai_analysis: None,
            };
            self.dump_for(&document_id).record(&record);
            return Ok(record);
        }

        let dump = self.dump_for(&document_id);
        let status = if ocr_missing {
            tracing::warn!(document_id = %document_id, "OCR unavailable, extracting from text pages only");
            RecordStatus::Partial
        } else {
            RecordStatus::Extracted
        };
        let transcription = self.transcribe(&pages, &dump, ocr_missing);
        let record = self.build_record(document_id, transcription.document_text(), kind, status, &dump);

        tracing::info!(
            document_id = %document_id,
            kind = kind.as_str(),
            status = record.status.as_str(),
            pages = transcription.pages.len(),
            text_chars = record.document_text.chars().count(),
            fields_matched = record.fields.matched_count(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Document processed"
        );
        Ok(record)
    }

    /// Extract from text that is already transcribed. Never fails.
    pub fn process_text(&self, text: &str, kind: DocumentKind) -> MedicalRecord {
        let document_id = Uuid::new_v4();
        let dump = self.dump_for(&document_id);
        let record = self.build_record(document_id, text.to_string(), kind, RecordStatus::Extracted, &dump);
        tracing::info!(
            document_id = %document_id,
            kind = kind.as_str(),
            text_chars = text.chars().count(),
            fields_matched = record.fields.matched_count(),
            "Text document processed"
        );
        record
    }

    fn dump_for(&self, document_id: &Uuid) -> DiagnosticDump {
        DiagnosticDump::for_document(self.dump_dir.as_deref(), document_id)
    }

    fn transcribe(&self, pages: &[PageInput], dump: &DiagnosticDump, ocr_missing: bool) -> Transcription {
        let selector = TranscriptionSelector::new(&*self.ocr);
        let pages = pages
            .iter()
            .map(|page| {
                let transcribed = match page {
                    PageInput::Raster(image) if ocr_missing => {
                        dump.original_page(image.page_number, &image.image);
                        PageTranscription::empty(image.page_number)
                    }
                    PageInput::Raster(image) => self.transcribe_raster(image, &selector, dump),
                    PageInput::Text { page_number, text } => PageTranscription::supplied(*page_number, text.clone()),
                    PageInput::Undecodable { page_number, reason } => {
                        tracing::warn!(page = page_number, reason = %reason, "Undecodable page transcribed as empty");
                        PageTranscription::empty(*page_number)
                    }
                };
                dump.transcription(&transcribed);
                transcribed
            })
            .collect();
        Transcription { pages }
    }

    fn transcribe_raster(
        &self,
        page: &PageImage,
        selector: &TranscriptionSelector<'_>,
        dump: &DiagnosticDump,
    ) -> PageTranscription {
        dump.original_page(page.page_number, &page.image);
        match self.normalizer.normalize(page) {
            Ok(normalized) => {
                dump.normalized_page(page.page_number, &normalized.image);
                selector.transcribe_page(&normalized)
            }
            Err(e) => {
                tracing::warn!(page = page.page_number, error = %e, "Normalization failed, page transcribed as empty");
                PageTranscription::empty(page.page_number)
            }
        }
    }

    fn build_record(
        &self,
        document_id: Uuid,
        document_text: String,
        kind: DocumentKind,
        status: RecordStatus,
        dump: &DiagnosticDump,
    ) -> MedicalRecord {
        dump.document_text(&document_text);
        let mut fields = extract_fields(&document_text, kind);
        if status == RecordStatus::Partial {
            fields = fill_placeholders(&fields);
        }
        let ai_analysis = self.clinical.as_ref().map(|engine| engine.analyze(&document_text));
        let record = MedicalRecord {
            document_id,
            status,
            document_text,
            fields,
            ai_analysis,
        };
        dump.record(&record);
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intelligence::engine::{INSUFFICIENT_INFORMATION, NO_SPECIFIC_WARNINGS};
    use crate::pipeline::extraction::{FailingOcrEngine, MockOcrEngine, UnavailableOcrEngine};
    use crate::pipeline::structuring::schema_for;
    use image::{DynamicImage, GrayImage, Luma, RgbImage, Rgb};

    const PRESCRIPTION_OCR: &str = "Name: Marta Sharapova Date: 5/11/2022\n\
        Address: 9 tennis court\n\n\
        Prednisone 20 mg\nLialda 2.4 gram\n\n\
        Directions:\nPrednisone, Taper 5 mg every 3 days,\nFinish in 2.5 weeks\n\n\
        Refill: 3 times\n";

    fn page(n: usize) -> PageImage {
        PageImage::new(n, DynamicImage::ImageRgb8(RgbImage::from_pixel(24, 16, Rgb([240, 240, 240]))))
    }

    #[test]
    fn prescription_from_mock_ocr() {
        let processor = DocumentProcessor::new(Box::new(MockOcrEngine::new(PRESCRIPTION_OCR)));
        let record = processor.process_pages(vec![page(1)], DocumentKind::Prescription).unwrap();

        assert_eq!(record.status, RecordStatus::Extracted);
        assert_eq!(record.fields.get("patient_name"), Some("Marta Sharapova"));
        assert_eq!(record.fields.get("patient_address"), Some("9 tennis court"));
        assert_eq!(record.fields.get("refill"), Some("3"));

        let analysis = record.ai_analysis.as_ref().unwrap();
        assert!(analysis.warnings.starts_with("Prednisone may cause:"));
    }

    #[test]
    fn serialized_record_has_schema_fields_and_analysis() {
        let processor = DocumentProcessor::new(Box::new(MockOcrEngine::new("Vaccination Status: Yes\nInsurance: No")));
        let record = processor.process_pages(vec![page(1)], DocumentKind::PatientDetails).unwrap();
        let json = serde_json::to_value(&record).unwrap();
        let obj = json.as_object().unwrap();

        let mut expected: Vec<&str> = schema_for(DocumentKind::PatientDetails).field_names();
        expected.push("ai_analysis");
        let mut keys: Vec<&str> = obj.keys().map(String::as_str).collect();
        keys.sort_unstable();
        expected.sort_unstable();
        assert_eq!(keys, expected);

        assert_eq!(obj["vaccination_status"], "Yes");
        assert_eq!(obj["has_insurance"], "No");
        assert!(obj["patient_name"].is_null());
        assert_eq!(obj["ai_analysis"]["diagnosis"], INSUFFICIENT_INFORMATION);
        assert_eq!(obj["ai_analysis"]["warnings"], NO_SPECIFIC_WARNINGS);
    }

    #[test]
    fn analysis_can_be_disabled() {
        let processor = DocumentProcessor::new(Box::new(MockOcrEngine::new(PRESCRIPTION_OCR))).without_analysis();
        let record = processor.process_pages(vec![page(1)], DocumentKind::Prescription).unwrap();
        assert!(record.ai_analysis.is_none());
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("ai_analysis").is_none());
        assert_eq!(json.as_object().unwrap().len(), 5);
    }

    #[test]
    fn pages_join_with_blank_line() {
        let processor = DocumentProcessor::new(Box::new(MockOcrEngine::new("Refill: 2")));
        let record = processor.process_pages(vec![page(1), page(2)], DocumentKind::Prescription).unwrap();
        assert_eq!(record.document_text, "Refill: 2\n\nRefill: 2");
    }

    #[test]
    fn failing_ocr_degrades_to_empty_fields() {
        let processor = DocumentProcessor::new(Box::new(FailingOcrEngine));
        let record = processor.process_pages(vec![page(1)], DocumentKind::PatientDetails).unwrap();
        assert_eq!(record.status, RecordStatus::Extracted);
        assert!(record.document_text.is_empty());
        assert_eq!(record.fields.field_names(), schema_for(DocumentKind::PatientDetails).field_names());
        assert_eq!(record.fields.matched_count(), 0);
    }

    #[test]
    fn unavailable_ocr_yields_placeholders() {
        let processor = DocumentProcessor::new(Box::new(UnavailableOcrEngine));
        let record = processor.process_pages(vec![page(1)], DocumentKind::Prescription).unwrap();
        assert_eq!(record.status, RecordStatus::Placeholder);
        assert_eq!(record.fields.field_names(), schema_for(DocumentKind::Prescription).field_names());
        assert_eq!(record.fields.matched_count(), 5);
        assert_eq!(record.fields.get("directions"), Some("Directions require OCR"));
        assert!(record.ai_analysis.is_none());
    }

    #[test]
    fn unavailable_ocr_keeps_text_page_fields() {
        let processor = DocumentProcessor::new(Box::new(UnavailableOcrEngine));
        let pages = vec![
            PageInput::Text {
                page_number: 1,
                text: "Name: Marta Sharapova\nRefill: 4".into(),
            },
            PageInput::Raster(page(2)),
        ];
        let record = processor.process_document(pages, DocumentKind::Prescription).unwrap();

        assert_eq!(record.status, RecordStatus::Partial);
        assert_eq!(record.fields.get("patient_name"), Some("Marta Sharapova"));
        assert_eq!(record.fields.get("refill"), Some("4"));
        assert_eq!(record.fields.get("directions"), Some("Directions require OCR"));
        assert_eq!(record.fields.field_names(), schema_for(DocumentKind::Prescription).field_names());
        assert!(record.ai_analysis.is_some());
    }

    #[test]
    fn text_pages_do_not_need_ocr() {
        let processor = DocumentProcessor::new(Box::new(UnavailableOcrEngine));
        let pages = vec![PageInput::Text {
            page_number: 1,
            text: "Refill: 4".into(),
        }];
        let record = processor.process_document(pages, DocumentKind::Prescription).unwrap();
        assert_eq!(record.status, RecordStatus::Extracted);
        assert_eq!(record.fields.get("refill"), Some("4"));
    }

    #[test]
    fn no_decodable_pages_is_an_error() {
        let processor = DocumentProcessor::new(Box::new(MockOcrEngine::new("x")));
        let pages = vec![PageInput::Undecodable {
            page_number: 1,
            reason: "truncated".into(),
        }];
        let err = processor.process_document(pages, DocumentKind::Prescription).unwrap_err();
        assert!(matches!(err, ExtractionError::NoDecodablePages));

        let err = processor.process_pages(vec![], DocumentKind::Prescription).unwrap_err();
        assert!(matches!(err, ExtractionError::NoDecodablePages));
    }

    #[test]
    fn undecodable_page_keeps_its_slot() {
        let processor = DocumentProcessor::new(Box::new(MockOcrEngine::new("Insurance: yes")));
        let pages = vec![
            PageInput::Undecodable {
                page_number: 1,
                reason: "bad header".into(),
            },
            PageInput::Raster(page(2)),
        ];
        let record = processor.process_document(pages, DocumentKind::PatientDetails).unwrap();
        assert_eq!(record.document_text, "\n\nInsurance: yes");
        assert_eq!(record.fields.get("has_insurance"), Some("Yes"));
    }

    #[test]
    fn zero_sized_raster_degrades_page() {
        let processor = DocumentProcessor::new(Box::new(MockOcrEngine::new("Refill: 1")));
        let empty = PageImage::new(1, DynamicImage::ImageLuma8(GrayImage::new(0, 0)));
        let record = processor.process_pages(vec![empty, page(2)], DocumentKind::Prescription).unwrap();
        assert_eq!(record.document_text, "\n\nRefill: 1");
    }

    #[test]
    fn failed_normalization_degrades_page() {
        struct BrokenNormalizer;
        impl PageNormalizer for BrokenNormalizer {
            fn normalize(&self, _page: &PageImage) -> Result<crate::pipeline::extraction::NormalizedImage, ExtractionError> {
                Err(ExtractionError::ImageProcessing("mock failure".into()))
            }
        }

        let processor = DocumentProcessor::new(Box::new(MockOcrEngine::new("Refill: 1")))
            .with_normalizer(Box::new(BrokenNormalizer));
        let record = processor.process_pages(vec![page(1)], DocumentKind::Prescription).unwrap();
        assert!(record.document_text.is_empty());
        assert_eq!(record.fields.get("refill"), None);
    }

    #[test]
    fn custom_clinical_engine_is_used() {
        struct FixedEngine;
        impl ClinicalEngine for FixedEngine {
            fn analyze(&self, _text: &str) -> AnalysisResult {
                AnalysisResult {
                    diagnosis: "d".into(),
                    routine: "r".into(),
                    diet: "f".into(),
                    warnings: "w".into(),
                }
            }
        }

        let processor = DocumentProcessor::new(Box::new(UnavailableOcrEngine)).with_clinical_engine(Box::new(FixedEngine));
        let record = processor.process_text("anything", DocumentKind::Prescription);
        assert_eq!(record.ai_analysis.unwrap().diagnosis, "d");
    }

    #[test]
    fn process_text_skips_ocr() {
        let processor = DocumentProcessor::new(Box::new(UnavailableOcrEngine));
        let record = processor.process_text("Patient Name: Jerry Lucas\nInsurance: n", DocumentKind::PatientDetails);
        assert_eq!(record.fields.get("patient_name"), Some("Jerry Lucas"));
        assert_eq!(record.fields.get("has_insurance"), Some("No"));
    }

    #[test]
    fn custom_knowledge_base_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let kb_path = dir.path().join("kb.json");
        std::fs::write(
            &kb_path,
            r#"{"medications":[{"name":"ibuprofen","uses":["pain"],"side_effects":["heartburn"],"diet":"With food.","routine":"As needed."}],"conditions":[]}"#,
        )
        .unwrap();
        let config = PipelineConfig {
            knowledge_base_path: Some(kb_path),
            ..PipelineConfig::default()
        };
        let processor = DocumentProcessor::from_config(&config).unwrap();
        let record = processor.process_text("Ibuprofen 400 mg", DocumentKind::Prescription);
        assert_eq!(
            record.ai_analysis.unwrap().diagnosis,
            "Based on medications, possible conditions include: Pain"
        );
    }

    #[test]
    fn missing_knowledge_base_fails_config() {
        let config = PipelineConfig {
            knowledge_base_path: Some(PathBuf::from("/nonexistent/kb.json")),
            ..PipelineConfig::default()
        };
        let err = DocumentProcessor::from_config(&config).err().unwrap();
        assert!(matches!(err, ExtractionError::Knowledge(_)));
    }

    #[test]
    fn dump_dir_receives_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let processor =
            DocumentProcessor::new(Box::new(MockOcrEngine::new(PRESCRIPTION_OCR))).with_dump_dir(dir.path());
        let record = processor.process_pages(vec![page(1)], DocumentKind::Prescription).unwrap();

        let doc_dir = dir.path().join(record.document_id.to_string());
        assert!(doc_dir.join("01-page-1-original.png").exists());
        assert!(doc_dir.join("02-page-1-normalized.png").exists());
        assert!(doc_dir.join("03-page-1-transcription.json").exists());
        assert!(doc_dir.join("05-record.json").exists());
    }

    #[test]
    fn normalized_page_reaches_ocr_as_binary() {
        struct CheckingEngine;
        impl OcrEngine for CheckingEngine {
            fn recognize(&self, png: &[u8], _hint: crate::pipeline::extraction::LayoutHint) -> Result<String, ExtractionError> {
                let img = image::load_from_memory(png).unwrap().to_luma8();
                assert!(img.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
                assert_eq!(img.dimensions(), (36, 24));
                Ok("Refill: 5".into())
            }
            fn is_available(&self) -> bool {
                true
            }
        }

        let processor = DocumentProcessor::new(Box::new(CheckingEngine));
        let gray = PageImage::new(1, DynamicImage::ImageLuma8(GrayImage::from_pixel(24, 16, Luma([30]))));
        let record = processor.process_pages(vec![gray], DocumentKind::Prescription).unwrap();
        assert_eq!(record.fields.get("refill"), Some("5"));
    }
}
