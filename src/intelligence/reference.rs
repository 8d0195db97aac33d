use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::types::{ConditionEntry, KnowledgeError, MedicationEntry};

const BUILTIN_KNOWLEDGE_BASE: &str = include_str!("../../resources/knowledge_base.json");

static BUILTIN: LazyLock<Arc<KnowledgeBase>> = LazyLock::new(|| {
    Arc::new(
        KnowledgeBase::from_json(BUILTIN_KNOWLEDGE_BASE, "knowledge_base.json")
            .expect("Invalid bundled knowledge base"),
    )
});

/// On-disk shape of a knowledge base file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeBaseFile {
    pub medications: Vec<MedicationEntry>,
    pub conditions: Vec<ConditionEntry>,
}

/// Read-only medication and condition tables with precompiled
/// whole-word matchers. Loaded once and shared across documents.
#[derive(Debug)]
pub struct KnowledgeBase {
    medications: Vec<MedicationEntry>,
    conditions: Vec<ConditionEntry>,
    medication_matchers: Vec<Regex>,
    condition_matchers: Vec<Regex>,
}

impl KnowledgeBase {
    /// Bundled tables: 6 medications, 5 conditions.
    pub fn builtin() -> Arc<KnowledgeBase> {
        Arc::clone(&BUILTIN)
    }

    /// Load a replacement knowledge base from a JSON file.
    pub fn load(path: &Path) -> Result<Self, KnowledgeError> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            KnowledgeError::ReferenceDataLoad(path.display().to_string(), e.to_string())
        })?;
        let kb = Self::from_json(&json, &path.display().to_string())?;
        tracing::info!(
            path = %path.display(),
            medications = kb.medications.len(),
            conditions = kb.conditions.len(),
            "Loaded knowledge base"
        );
        Ok(kb)
    }

    pub fn from_json(json: &str, source: &str) -> Result<Self, KnowledgeError> {
        let file: KnowledgeBaseFile = serde_json::from_str(json)
            .map_err(|e| KnowledgeError::ReferenceDataParse(source.into(), e.to_string()))?;
        Self::from_entries(file.medications, file.conditions)
    }

    pub fn from_entries(
        medications: Vec<MedicationEntry>,
        conditions: Vec<ConditionEntry>,
    ) -> Result<Self, KnowledgeError> {
        let mut seen = HashSet::new();
        for med in &medications {
            validate_name(&med.name, &mut seen)?;
        }
        seen.clear();
        for condition in &conditions {
            validate_name(&condition.name, &mut seen)?;
        }

        let medication_matchers: Vec<Regex> = medications
            .iter()
            .map(|m| word_matcher(&m.name))
            .collect::<Result<_, _>>()?;
        let condition_matchers: Vec<Regex> = conditions
            .iter()
            .map(|c| word_matcher(&c.name))
            .collect::<Result<_, _>>()?;

        Ok(Self {
            medications,
            conditions,
            medication_matchers,
            condition_matchers,
        })
    }

    pub fn medications(&self) -> &[MedicationEntry] {
        &self.medications
    }

    pub fn conditions(&self) -> &[ConditionEntry] {
        &self.conditions
    }

    pub fn medication(&self, name: &str) -> Option<&MedicationEntry> {
        self.medications.iter().find(|m| m.name == name)
    }

    pub fn condition(&self, name: &str) -> Option<&ConditionEntry> {
        self.conditions.iter().find(|c| c.name == name)
    }

    /// Medication entries paired with their whole-word matchers.
    pub(crate) fn medication_keywords(&self) -> impl Iterator<Item = (&MedicationEntry, &Regex)> {
        self.medications.iter().zip(&self.medication_matchers)
    }

    pub(crate) fn condition_keywords(&self) -> impl Iterator<Item = (&ConditionEntry, &Regex)> {
        self.conditions.iter().zip(&self.condition_matchers)
    }
}

fn validate_name<'a>(name: &'a str, seen: &mut HashSet<&'a str>) -> Result<(), KnowledgeError> {
    let invalid = |reason: &str| KnowledgeError::InvalidEntry {
        name: name.into(),
        reason: reason.into(),
    };
    if name.trim().is_empty() {
        return Err(invalid("name is empty"));
    }
    if name.trim() != name {
        return Err(invalid("name has surrounding whitespace"));
    }
    if name.to_lowercase() != name {
        return Err(invalid("name must be lower-case"));
    }
    if !seen.insert(name) {
        return Err(invalid("duplicate name"));
    }
    Ok(())
}

fn word_matcher(name: &str) -> Result<Regex, KnowledgeError> {
    Regex::new(&format!(r"\b{}\b", regex::escape(name))).map_err(|e| KnowledgeError::InvalidEntry {
        name: name.into(),
        reason: e.to_string(),
    })
}
