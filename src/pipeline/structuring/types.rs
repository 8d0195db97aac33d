use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use super::SchemaError;

/// Document type selecting the schema to extract with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Prescription,
    PatientDetails,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 2] = [DocumentKind::Prescription, DocumentKind::PatientDetails];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prescription => "prescription",
            Self::PatientDetails => "patient_details",
        }
    }
}

impl std::str::FromStr for DocumentKind {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "prescription" => Ok(Self::Prescription),
            "patient_details" => Ok(Self::PatientDetails),
            _ => Err(SchemaError::UnknownDocumentKind(s.into())),
        }
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One extracted field. `None` means no pattern in the cascade matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldValue {
    pub name: &'static str,
    pub value: Option<String>,
}

/// Field values for one document, in the schema's declared field order.
///
/// Holds exactly the schema's fields. Serializes as a JSON object with
/// unmatched fields as `null`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionResult {
    kind: DocumentKind,
    fields: Vec<FieldValue>,
}

impl ExtractionResult {
    pub(crate) fn new(kind: DocumentKind, fields: Vec<FieldValue>) -> Self {
        Self { kind, fields }
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    pub fn fields(&self) -> &[FieldValue] {
        &self.fields
    }

    pub fn field_names(&self) -> Vec<&'static str> {
        self.fields.iter().map(|f| f.name).collect()
    }

    /// Value of a field, or `None` when unmatched or not part of the schema.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .and_then(|f| f.value.as_deref())
    }

    pub fn matched_count(&self) -> usize {
        self.fields.iter().filter(|f| f.value.is_some()).count()
    }
}

impl Serialize for ExtractionResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for field in &self.fields {
            map.serialize_entry(field.name, &field.value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_kind_round_trips_through_str() {
        for kind in DocumentKind::ALL {
            assert_eq!(kind.as_str().parse::<DocumentKind>().unwrap(), kind);
        }
    }

    #[test]
    fn unknown_document_kind_is_rejected() {
        let err = "lab_report".parse::<DocumentKind>().unwrap_err();
        assert!(matches!(err, SchemaError::UnknownDocumentKind(ref s) if s == "lab_report"));
    }

    #[test]
    fn serializes_in_field_order_with_nulls() {
        let result = ExtractionResult::new(
            DocumentKind::PatientDetails,
            vec![
                FieldValue { name: "patient_name", value: Some("Jerry Lucas".into()) },
                FieldValue { name: "phone_no", value: None },
            ],
        );
        let json = serde_json::to_string(&result).unwrap();
        assert_eq!(json, r#"{"patient_name":"Jerry Lucas","phone_no":null}"#);
        assert_eq!(result.matched_count(), 1);
        assert_eq!(result.get("phone_no"), None);
        assert_eq!(result.get("patient_name"), Some("Jerry Lucas"));
    }
}
