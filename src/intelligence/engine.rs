use std::sync::Arc;

use super::detection::detect;
use super::reference::KnowledgeBase;
use super::types::{AnalysisResult, ClinicalEngine, Findings};

pub const INSUFFICIENT_INFORMATION: &str = "Insufficient information to determine diagnosis";
pub const NO_SPECIFIC_WARNINGS: &str = "No specific warnings without medication information";
pub const GENERAL_ROUTINE: &str = "General: Maintain regular sleep schedule and stay hydrated.";
pub const GENERAL_DIET: &str = "General: Balanced diet rich in fruits, vegetables, and whole grains.";
pub const CONSULT_DOCTOR: &str = "Consult your doctor if you experience severe or persistent side effects.";

/// Knowledge-base backed engine. Holds no per-document state.
pub struct RuleBasedEngine {
    kb: Arc<KnowledgeBase>,
}

impl RuleBasedEngine {
    pub fn new(kb: Arc<KnowledgeBase>) -> Self {
        Self { kb }
    }

    pub fn knowledge_base(&self) -> &KnowledgeBase {
        &self.kb
    }
}

impl Default for RuleBasedEngine {
    fn default() -> Self {
        Self::new(KnowledgeBase::builtin())
    }
}

impl ClinicalEngine for RuleBasedEngine {
    fn analyze(&self, text: &str) -> AnalysisResult {
        analyze(text, &self.kb)
    }
}

/// Scan the text and synthesize the four annotation texts.
pub fn analyze(text: &str, kb: &KnowledgeBase) -> AnalysisResult {
    let findings = detect(text, kb);
    synthesize(&findings)
}

pub fn synthesize(findings: &Findings<'_>) -> AnalysisResult {
    AnalysisResult {
        diagnosis: diagnosis(findings),
        routine: routine(findings),
        diet: diet(findings),
        warnings: warnings(findings),
    }
}

/// Conditions named in the text take precedence over conditions inferred
/// from medication uses.
pub fn diagnosis(findings: &Findings<'_>) -> String {
    if !findings.conditions.is_empty() {
        let names: Vec<String> = findings.conditions.iter().map(|c| title_case(&c.name)).collect();
        return format!("Likely diagnosis: {}", names.join(", "));
    }

    if !findings.medications.is_empty() {
        let mut uses: Vec<&str> = Vec::new();
        for med in &findings.medications {
            for use_ in &med.uses {
                if !uses.contains(&use_.as_str()) {
                    uses.push(use_);
                }
            }
        }
        let names: Vec<String> = uses.iter().map(|u| title_case(u)).collect();
        return format!(
            "Based on medications, possible conditions include: {}",
            names.join(", ")
        );
    }

    INSUFFICIENT_INFORMATION.to_string()
}

pub fn routine(findings: &Findings<'_>) -> String {
    let mut lines: Vec<String> = Vec::new();
    for med in &findings.medications {
        lines.push(format!("For {}: {}", med.name, med.routine));
    }
    for condition in &findings.conditions {
        lines.push(format!("For {}: {}", condition.name, condition.routine));
    }
    lines.push(GENERAL_ROUTINE.to_string());
    lines.join("\n")
}

pub fn diet(findings: &Findings<'_>) -> String {
    let mut lines: Vec<String> = Vec::new();
    for med in &findings.medications {
        lines.push(format!("For {}: {}", med.name, med.diet));
    }
    for condition in &findings.conditions {
        lines.push(format!("For {}: {}", condition.name, condition.diet));
    }
    lines.push(GENERAL_DIET.to_string());
    lines.join("\n")
}

/// One line per medication, then a blank line and the consult advice.
pub fn warnings(findings: &Findings<'_>) -> String {
    if findings.medications.is_empty() {
        return NO_SPECIFIC_WARNINGS.to_string();
    }

    let mut lines: Vec<String> = findings
        .medications
        .iter()
        .map(|med| format!("{} may cause: {}", title_case(&med.name), med.side_effects.join(", ")))
        .collect();
    lines.push(String::new());
    lines.push(CONSULT_DOCTOR.to_string());
    lines.join("\n")
}

/// Upper-case the first letter of every word, lower-case the rest.
/// Any non-letter starts a new word, so "type 2 diabetes" becomes
/// "Type 2 Diabetes" and "b12" becomes "B12".
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_is_letter = false;
    for ch in s.chars() {
        if ch.is_alphabetic() {
            if prev_is_letter {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            prev_is_letter = true;
        } else {
            out.push(ch);
            prev_is_letter = false;
        }
    }
    out
}
