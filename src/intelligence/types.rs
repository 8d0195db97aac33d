use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Knowledge base entries
// ---------------------------------------------------------------------------

/// Medication known to the knowledge base. `name` is lower-case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicationEntry {
    pub name: String,
    /// Conditions the medication is prescribed for.
    pub uses: Vec<String>,
    pub side_effects: Vec<String>,
    pub diet: String,
    pub routine: String,
}

/// Condition known to the knowledge base. `name` is lower-case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionEntry {
    pub name: String,
    pub diet: String,
    pub routine: String,
}

// ---------------------------------------------------------------------------
// Findings and analysis
// ---------------------------------------------------------------------------

/// Knowledge base entries mentioned in one document, in knowledge base order.
#[derive(Debug, Clone, Default)]
pub struct Findings<'a> {
    pub medications: Vec<&'a MedicationEntry>,
    pub conditions: Vec<&'a ConditionEntry>,
}

impl Findings<'_> {
    pub fn is_empty(&self) -> bool {
        self.medications.is_empty() && self.conditions.is_empty()
    }
}

/// Rule-based clinical annotation attached to an extraction result.
///
/// Every field is non-empty: missing evidence produces a fixed sentence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub diagnosis: String,
    pub routine: String,
    pub diet: String,
    pub warnings: String,
}

// ---------------------------------------------------------------------------
// KnowledgeError
// ---------------------------------------------------------------------------

#[derive(Error, Debug)]
pub enum KnowledgeError {
    #[error("Reference data load failed ({0}): {1}")]
    ReferenceDataLoad(String, String),

    #[error("Reference data parse failed ({0}): {1}")]
    ReferenceDataParse(String, String),

    #[error("Invalid knowledge base entry '{name}': {reason}")]
    InvalidEntry { name: String, reason: String },
}

// ---------------------------------------------------------------------------
// ClinicalEngine trait
// ---------------------------------------------------------------------------

/// Derives a clinical annotation from document text.
///
/// Implementations are stateless across documents and never fail.
pub trait ClinicalEngine: Send + Sync {
    fn analyze(&self, text: &str) -> AnalysisResult;
}
