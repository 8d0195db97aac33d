use super::schema::{schema_for, DocumentSchema, FieldSpec};
use super::types::{DocumentKind, ExtractionResult, FieldValue};

/// Extract every field of the built-in schema for `kind` from the document text.
pub fn extract_fields(text: &str, kind: DocumentKind) -> ExtractionResult {
    extract_with_schema(text, schema_for(kind))
}

/// Run each field's cascade over the whole text.
///
/// The first pattern producing a non-empty trimmed capture wins and later
/// patterns for that field are not evaluated. Fields without a match are
/// `None`. The result always has exactly the schema's fields.
pub fn extract_with_schema(text: &str, schema: &DocumentSchema) -> ExtractionResult {
    let fields: Vec<FieldValue> = schema
        .fields()
        .iter()
        .map(|spec| FieldValue {
            name: spec.name,
            value: extract_field(text, spec),
        })
        .collect();

    let result = ExtractionResult::new(schema.kind(), fields);
    tracing::debug!(
        kind = schema.kind().as_str(),
        matched = result.matched_count(),
        total = schema.fields().len(),
        "Field extraction complete"
    );
    result
}

fn extract_field(text: &str, spec: &FieldSpec) -> Option<String> {
    for (index, pattern) in spec.patterns.iter().enumerate() {
        let Some(captured) = pattern
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim())
        else {
            continue;
        };
        if captured.is_empty() {
            continue;
        }

        tracing::debug!(field = spec.name, pattern = index, "Cascade hit");
        let value = match spec.normalizer {
            Some(normalizer) => normalizer.apply(captured),
            None => captured.to_string(),
        };
        return Some(value);
    }
    None
}

/// Schema-complete result holding each field's placeholder text.
/// Used when no OCR engine is available.
pub fn placeholder_fields(kind: DocumentKind) -> ExtractionResult {
    let schema = schema_for(kind);
    let fields = schema
        .fields()
        .iter()
        .map(|spec| FieldValue {
            name: spec.name,
            value: Some(spec.placeholder.to_string()),
        })
        .collect();
    ExtractionResult::new(kind, fields)
}

/// Keep matched values and give every unmatched field its placeholder text.
/// Used when part of the document could not be transcribed.
pub fn fill_placeholders(result: &ExtractionResult) -> ExtractionResult {
    let schema = schema_for(result.kind());
    let fields = result
        .fields()
        .iter()
        .map(|field| FieldValue {
            name: field.name,
            value: field
                .value
                .clone()
                .or_else(|| schema.field(field.name).map(|spec| spec.placeholder.to_string())),
        })
        .collect();
    ExtractionResult::new(result.kind(), fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::structuring::schema::{FieldDecl, PatternDecl};

    const PRESCRIPTION_TEXT: &str = "\
Name: Marta Sharapova Date: 5/11/2022
Address: 9 tennis court

Prednisone 20 mg
Lialda 2.4 gram

Directions:
Prednisone, Taper 5 mg every 3 days,
Finish in 2.5 weeks
Lialda - take 2 pill everyday for 1 month

Refill: 3 times
";

    const INTAKE_FORM_TEXT: &str = "\
Patient Medical Record

Patient Information                 Birth Date
Kathy Crawford                      May 6 1972
(737) 988-0851                      Weight
9264 Ash Dr                         95

Have you had the Hepatitis B vaccination?
Yes
List any Medical Problems (asthma, seizures, headaches):
Migraine
";

    #[test]
    fn prescription_end_to_end() {
        let result = extract_fields(PRESCRIPTION_TEXT, DocumentKind::Prescription);
        assert_eq!(result.get("patient_name"), Some("Marta Sharapova"));
        assert_eq!(result.get("patient_address"), Some("9 tennis court"));
        assert_eq!(result.get("refill"), Some("3"));

        let medicines = result.get("medicines").unwrap();
        assert!(medicines.contains("Prednisone 20 mg"));
        assert!(medicines.contains("Lialda 2.4 gram"));
        assert!(!medicines.contains("Directions"));

        let directions = result.get("directions").unwrap();
        assert!(directions.starts_with("Prednisone, Taper"));
        assert!(!directions.contains("Refill"));
    }

    #[test]
    fn patient_details_end_to_end() {
        let text = "Patient Name: Jerry Lucas\nPhone: (279) 920-8204\nVaccination Status: Yes\nInsurance: No\n";
        let result = extract_fields(text, DocumentKind::PatientDetails);
        assert_eq!(result.get("patient_name"), Some("Jerry Lucas"));
        assert_eq!(result.get("phone_no"), Some("(279) 920-8204"));
        assert_eq!(result.get("vaccination_status"), Some("Yes"));
        assert_eq!(result.get("has_insurance"), Some("No"));
        assert_eq!(result.get("medical_problems"), None);
    }

    #[test]
    fn intake_form_layout() {
        let result = extract_fields(INTAKE_FORM_TEXT, DocumentKind::PatientDetails);
        assert_eq!(result.get("patient_name"), Some("Kathy Crawford"));
        assert_eq!(result.get("phone_no"), Some("(737) 988-0851"));
        assert_eq!(result.get("vaccination_status"), Some("Yes"));
        assert_eq!(result.get("medical_problems"), Some("Migraine"));
        assert_eq!(result.get("has_insurance"), None);
    }

    #[test]
    fn multi_line_block_stops_at_next_label() {
        let text = "Medical Problems:\nAsthma\nMigraine\nInsurance: Yes\n";
        let result = extract_fields(text, DocumentKind::PatientDetails);
        assert_eq!(result.get("medical_problems"), Some("Asthma\nMigraine"));
        assert_eq!(result.get("has_insurance"), Some("Yes"));
    }

    #[test]
    fn same_line_answer_continues_onto_following_lines() {
        let text = "Medical Problems: Hypertension\nType 2 diabetes\nMigraine\n\nInsurance: Yes\n";
        let result = extract_fields(text, DocumentKind::PatientDetails);
        assert_eq!(result.get("medical_problems"), Some("Hypertension\nType 2 diabetes\nMigraine"));
        assert_eq!(result.get("has_insurance"), Some("Yes"));

        let result = extract_fields("Medical Problems: A\nB\nC", DocumentKind::PatientDetails);
        assert_eq!(result.get("medical_problems"), Some("A\nB\nC"));
    }

    #[test]
    fn merged_label_words_still_match() {
        let text = "VaccinationStatus: Yes\nInsuranceCoverage: No\nMedicalProblems: Asthma\n";
        let result = extract_fields(text, DocumentKind::PatientDetails);
        assert_eq!(result.get("vaccination_status"), Some("Yes"));
        assert_eq!(result.get("has_insurance"), Some("No"));
        assert_eq!(result.get("medical_problems"), Some("Asthma"));
    }

    #[test]
    fn not_applicable_answer_is_verbatim() {
        let result = extract_fields("Vaccination Status: N/A\nInsurance: N/A\n", DocumentKind::PatientDetails);
        assert_eq!(result.get("vaccination_status"), Some("N/A"));
        assert_eq!(result.get("has_insurance"), Some("N/A"));
    }

    #[test]
    fn key_set_matches_schema_for_any_text() {
        for kind in DocumentKind::ALL {
            let expected = schema_for(kind).field_names();
            for text in ["", "garbage ### 12", PRESCRIPTION_TEXT, INTAKE_FORM_TEXT] {
                assert_eq!(extract_fields(text, kind).field_names(), expected);
            }
        }
    }

    #[test]
    fn empty_text_yields_all_none() {
        let result = extract_fields("", DocumentKind::Prescription);
        assert!(result.fields().iter().all(|f| f.value.is_none()));
        let json = serde_json::to_value(&result).unwrap();
        assert!(json["refill"].is_null());
    }

    #[test]
    fn second_pattern_used_when_first_misses() {
        // First vaccination pattern needs the answer right after "Vaccination"
        let result = extract_fields("Vaccination Status: y", DocumentKind::PatientDetails);
        assert_eq!(result.get("vaccination_status"), Some("Yes"));

        let result = extract_fields("Patient: John Smith\n", DocumentKind::Prescription);
        assert_eq!(result.get("patient_name"), Some("John Smith"));
    }

    #[test]
    fn first_match_stops_cascade() {
        const DECLS: &[FieldDecl] = &[FieldDecl {
            name: "code",
            patterns: &[PatternDecl::new(r"A=(\w+)"), PatternDecl::new(r"B=(\w+)")],
            normalizer: None,
            placeholder: "",
        }];
        let schema = DocumentSchema::compile(DocumentKind::Prescription, DECLS).unwrap();
        assert_eq!(extract_with_schema("B=second A=first", &schema).get("code"), Some("first"));
        assert_eq!(extract_with_schema("B=second", &schema).get("code"), Some("second"));
    }

    #[test]
    fn blank_capture_falls_through() {
        const DECLS: &[FieldDecl] = &[FieldDecl {
            name: "note",
            patterns: &[PatternDecl::new(r"Note:([ \t]*)"), PatternDecl::new(r"Memo:\s*(\w+)")],
            normalizer: None,
            placeholder: "",
        }];
        let schema = DocumentSchema::compile(DocumentKind::Prescription, DECLS).unwrap();
        assert_eq!(extract_with_schema("Note:   \nMemo: fasting", &schema).get("note"), Some("fasting"));
    }

    #[test]
    fn yes_no_fields_are_normalized() {
        for (input, expected) in [
            ("y", "Yes"),
            ("Y", "Yes"),
            ("yes", "Yes"),
            ("Yes", "Yes"),
            ("n", "No"),
            ("N", "No"),
            ("no", "No"),
            ("No", "No"),
        ] {
            let text = format!("Insurance: {input}\n");
            let result = extract_fields(&text, DocumentKind::PatientDetails);
            assert_eq!(result.get("has_insurance"), Some(expected), "input {input}");
        }
    }

    #[test]
    fn unrecognized_yes_no_answer_is_verbatim() {
        let result = extract_fields("Insurance: unsure\nVaccination Status: unsure\n", DocumentKind::PatientDetails);
        assert_eq!(result.get("has_insurance"), Some("unsure"));
        assert_eq!(result.get("vaccination_status"), Some("unsure"));
    }

    #[test]
    fn refill_without_number_keeps_text() {
        let result = extract_fields("Refill: none\n", DocumentKind::Prescription);
        assert_eq!(result.get("refill"), Some("none"));
    }

    #[test]
    fn fill_placeholders_keeps_matched_values() {
        let extracted = extract_fields("Refill: 2\n", DocumentKind::Prescription);
        let filled = fill_placeholders(&extracted);
        assert_eq!(filled.field_names(), extracted.field_names());
        assert_eq!(filled.get("refill"), Some("2"));
        assert_eq!(filled.get("medicines"), Some("Medicine information requires OCR"));
        assert_eq!(filled.matched_count(), 5);
    }

    #[test]
    fn placeholder_fields_cover_schema() {
        for kind in DocumentKind::ALL {
            let result = placeholder_fields(kind);
            assert_eq!(result.field_names(), schema_for(kind).field_names());
            assert!(result.fields().iter().all(|f| f.value.as_deref().is_some_and(|v| !v.is_empty())));
        }
        assert_eq!(
            placeholder_fields(DocumentKind::Prescription).get("medicines"),
            Some("Medicine information requires OCR")
        );
    }
}
