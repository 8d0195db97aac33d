use super::reference::KnowledgeBase;
use super::types::{ConditionEntry, Findings, MedicationEntry};

/// Scan document text for known medications and conditions.
///
/// Matching is case-insensitive and whole-word: "metformin 500mg" mentions
/// metformin, "metforminol" does not. Each entry is reported at most once.
pub fn detect<'a>(text: &str, kb: &'a KnowledgeBase) -> Findings<'a> {
    let lowered = text.to_lowercase();
    let findings = Findings {
        medications: scan_medications(&lowered, kb),
        conditions: scan_conditions(&lowered, kb),
    };
    tracing::debug!(
        medications = findings.medications.len(),
        conditions = findings.conditions.len(),
        "Knowledge base scan complete"
    );
    findings
}

/// Expects lower-cased text.
pub fn scan_medications<'a>(lowered: &str, kb: &'a KnowledgeBase) -> Vec<&'a MedicationEntry> {
    kb.medication_keywords()
        .filter(|(_, matcher)| matcher.is_match(lowered))
        .map(|(entry, _)| entry)
        .collect()
}

/// Expects lower-cased text.
pub fn scan_conditions<'a>(lowered: &str, kb: &'a KnowledgeBase) -> Vec<&'a ConditionEntry> {
    kb.condition_keywords()
        .filter(|(_, matcher)| matcher.is_match(lowered))
        .map(|(entry, _)| entry)
        .collect()
}
