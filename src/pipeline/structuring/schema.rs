//! Declarative field schemas for the supported document kinds.
//!
//! Each schema is an ordered list of fields; each field carries an ordered
//! cascade of patterns, an optional value normalizer, and the placeholder text
//! reported when OCR is unavailable. Schemas are compiled once and validated at
//! construction: every pattern must compile and expose a capture group, every
//! cascade must be non-empty, and field names must be unique.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};

use super::types::DocumentKind;
use super::SchemaError;

/// Matching flags applied on top of the pattern source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchFlags {
    /// `^`/`$` match at line boundaries.
    pub multi_line: bool,
    /// `.` also matches `\n`.
    pub dot_all: bool,
}

impl MatchFlags {
    pub const NONE: MatchFlags = MatchFlags { multi_line: false, dot_all: false };
    pub const MULTI_LINE: MatchFlags = MatchFlags { multi_line: true, dot_all: false };
    pub const DOT_ALL: MatchFlags = MatchFlags { multi_line: false, dot_all: true };
}

/// Post-processing applied to a trimmed capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalizer {
    /// `y`/`yes` become `Yes`, `n`/`no` become `No` (case-insensitive);
    /// anything else is kept verbatim.
    YesNo,
}

impl Normalizer {
    pub fn apply(&self, value: &str) -> String {
        match self {
            Self::YesNo => match value.to_ascii_lowercase().as_str() {
                "y" | "yes" => "Yes".to_string(),
                "n" | "no" => "No".to_string(),
                _ => value.to_string(),
            },
        }
    }
}

/// Source form of one cascade entry.
#[derive(Debug, Clone, Copy)]
pub struct PatternDecl {
    pub source: &'static str,
    pub flags: MatchFlags,
}

impl PatternDecl {
    pub const fn new(source: &'static str) -> Self {
        Self { source, flags: MatchFlags::NONE }
    }

    pub const fn with_flags(source: &'static str, flags: MatchFlags) -> Self {
        Self { source, flags }
    }
}

/// Source form of one field.
#[derive(Debug, Clone, Copy)]
pub struct FieldDecl {
    pub name: &'static str,
    pub patterns: &'static [PatternDecl],
    pub normalizer: Option<Normalizer>,
    pub placeholder: &'static str,
}

/// Compiled field: the cascade in evaluation order.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: &'static str,
    pub patterns: Vec<Regex>,
    pub normalizer: Option<Normalizer>,
    pub placeholder: &'static str,
}

#[derive(Debug, Clone)]
pub struct DocumentSchema {
    kind: DocumentKind,
    fields: Vec<FieldSpec>,
}

impl DocumentSchema {
    /// Compile and validate a set of field declarations.
    pub fn compile(kind: DocumentKind, decls: &[FieldDecl]) -> Result<Self, SchemaError> {
        let mut seen = HashSet::new();
        let mut fields = Vec::with_capacity(decls.len());

        for decl in decls {
            if !seen.insert(decl.name) {
                return Err(SchemaError::DuplicateField(decl.name.into()));
            }
            if decl.patterns.is_empty() {
                return Err(SchemaError::EmptyCascade(decl.name.into()));
            }

            let mut patterns = Vec::with_capacity(decl.patterns.len());
            for (index, p) in decl.patterns.iter().enumerate() {
                let regex = RegexBuilder::new(p.source)
                    .multi_line(p.flags.multi_line)
                    .dot_matches_new_line(p.flags.dot_all)
                    .build()
                    .map_err(|source| SchemaError::InvalidPattern {
                        field: decl.name.into(),
                        source,
                    })?;
                // captures_len counts the implicit whole-match group
                if regex.captures_len() < 2 {
                    return Err(SchemaError::MissingCaptureGroup {
                        field: decl.name.into(),
                        index,
                    });
                }
                patterns.push(regex);
            }

            fields.push(FieldSpec {
                name: decl.name,
                patterns,
                normalizer: decl.normalizer,
                placeholder: decl.placeholder,
            });
        }

        Ok(Self { kind, fields })
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field_names(&self) -> Vec<&'static str> {
        self.fields.iter().map(|f| f.name).collect()
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Built-in schema for a document kind.
pub fn schema_for(kind: DocumentKind) -> &'static DocumentSchema {
    match kind {
        DocumentKind::Prescription => &PRESCRIPTION_SCHEMA,
        DocumentKind::PatientDetails => &PATIENT_DETAILS_SCHEMA,
    }
}

static PRESCRIPTION_SCHEMA: LazyLock<DocumentSchema> = LazyLock::new(|| {
    DocumentSchema::compile(DocumentKind::Prescription, PRESCRIPTION_FIELDS)
        .expect("Invalid prescription schema")
});

static PATIENT_DETAILS_SCHEMA: LazyLock<DocumentSchema> = LazyLock::new(|| {
    DocumentSchema::compile(DocumentKind::PatientDetails, PATIENT_DETAILS_FIELDS)
        .expect("Invalid patient details schema")
});

// ═══════════════════════════════════════════
// Prescription
// ═══════════════════════════════════════════

const PRESCRIPTION_FIELDS: &[FieldDecl] = &[
    FieldDecl {
        name: "patient_name",
        patterns: &[
            // Stops before a trailing "Date" label on the same line
            PatternDecl::with_flags(
                r"[Nn]ame\s*[:;]?[ \t]*([A-Za-z][A-Za-z \t.'-]*?)[ \t]*(?:[Dd]ate\b|$|[^A-Za-z \t.'-])",
                MatchFlags::MULTI_LINE,
            ),
            PatternDecl::new(r"[Pp]atient\s*[:;][ \t]*([A-Za-z][A-Za-z \t]*)"),
        ],
        normalizer: None,
        placeholder: "Unknown (OCR unavailable)",
    },
    FieldDecl {
        name: "patient_address",
        patterns: &[
            PatternDecl::new(r"[Aa]ddress\s*[:;]?[ \t]*([^\n]+)"),
            PatternDecl::new(r"[Rr]esidence\s*[:;]?[ \t]*([^\n]+)"),
        ],
        normalizer: None,
        placeholder: "Unknown (OCR unavailable)",
    },
    FieldDecl {
        name: "medicines",
        patterns: &[
            // Block between the address line and the directions label
            PatternDecl::with_flags(
                r"(?:[Aa]ddress|[Rr]esidence)[^\n]*\n+(.*?)(?:[Dd]irections|[Ii]nstructions)",
                MatchFlags::DOT_ALL,
            ),
            PatternDecl::with_flags(
                r"(?:[Mm]edications?|[Mm]edicines|[Pp]rescribed|[Rr]x)[^\n]*\n+(.*?)(?:[Dd]irections|[Ii]nstructions)",
                MatchFlags::DOT_ALL,
            ),
        ],
        normalizer: None,
        placeholder: "Medicine information requires OCR",
    },
    FieldDecl {
        name: "directions",
        patterns: &[
            PatternDecl::with_flags(r"[Dd]irections\s*[:;]?\s*(.*?)(?:[Rr]efill|\z)", MatchFlags::DOT_ALL),
            PatternDecl::with_flags(r"[Ii]nstructions\s*[:;]?\s*(.*?)(?:[Rr]efill|\z)", MatchFlags::DOT_ALL),
        ],
        normalizer: None,
        placeholder: "Directions require OCR",
    },
    FieldDecl {
        name: "refill",
        patterns: &[
            PatternDecl::new(r"[Rr]efills?\s*[:;]?\s*(\d+)"),
            PatternDecl::new(r"[Rr]efills?\s*[:;]?[ \t]*([A-Za-z0-9][A-Za-z0-9 \t]*)"),
        ],
        normalizer: None,
        placeholder: "Unknown (OCR unavailable)",
    },
];

// ═══════════════════════════════════════════
// Patient details
// ═══════════════════════════════════════════

/// End of a free-text block: blank line, next "Label:" line, or end of text.
macro_rules! until_next_section {
    () => {
        r"(?:\n[ \t]*\n|\n[A-Z][A-Za-z ]{0,40}[:?]|\z)"
    };
}

/// Yes/no answer ending at whitespace, punctuation or end of text, so "N/A" is not read as "N".
macro_rules! yes_no_answer {
    () => {
        r"((?i:yes|no|y|n))(?:\s|[.,;]|$)"
    };
}

const PATIENT_DETAILS_FIELDS: &[FieldDecl] = &[
    FieldDecl {
        name: "patient_name",
        patterns: &[
            PatternDecl::new(r"[Pp]atient\s*[Nn]ame\s*[:;]?[ \t]*([A-Za-z]+(?: [A-Za-z]+)*)"),
            PatternDecl::with_flags(r"^[ \t]*[Nn]ame\s*[:;][ \t]*([A-Za-z]+(?: [A-Za-z]+)*)", MatchFlags::MULTI_LINE),
            // Intake forms put the name on the line after the section heading
            PatternDecl::new(r"[Pp]atient\s*[Ii]nformation[^\n]*\n+[ \t]*([A-Za-z]+(?: [A-Za-z]+)*)"),
        ],
        normalizer: None,
        placeholder: "Unknown (OCR unavailable)",
    },
    FieldDecl {
        name: "phone_no",
        patterns: &[
            PatternDecl::new(
                r"(?:[Pp]hone|[Tt]el(?:ephone)?)(?:\s*[Nn]o\.?|\s*[Nn]umber)?\s*[:;]?[ \t]*(\(?\d[\d() \t.-]*\d)",
            ),
            PatternDecl::new(r"(\(\d{3}\)[ .-]?\d{3}[ .-]?\d{4})"),
            PatternDecl::new(r"\b(\d{3}[ .-]?\d{3}[ .-]?\d{4})\b"),
        ],
        normalizer: None,
        placeholder: "Unknown (OCR unavailable)",
    },
    FieldDecl {
        name: "vaccination_status",
        patterns: &[
            PatternDecl::new(concat!(r"[Vv]accination\s*[:;]?\s*", yes_no_answer!())),
            PatternDecl::new(concat!(r"[Vv]accinat(?:ed|ion)\s*[Ss]tatus\s*[:;]?\s*", yes_no_answer!())),
            PatternDecl::new(concat!(r"[Vv]accinated\s*[:;]?\s*", yes_no_answer!())),
            PatternDecl::new(concat!(r"[Vv]accination\?\s*", yes_no_answer!())),
            PatternDecl::new(r"[Vv]accination\s*[Ss]tatus\s*[:;][ \t]*([^\n]+)"),
        ],
        normalizer: Some(Normalizer::YesNo),
        placeholder: "Unknown (OCR unavailable)",
    },
    FieldDecl {
        name: "medical_problems",
        patterns: &[
            // Answer starts on the label line and may continue below it
            PatternDecl::with_flags(
                concat!(r"[Mm]edical\s*[Pp]roblems\s*[:;][ \t]*(\S.*?)", until_next_section!()),
                MatchFlags::DOT_ALL,
            ),
            PatternDecl::with_flags(
                concat!(r"[Mm]edical\s*[Pp]roblems[^\n]*\n+(.*?)", until_next_section!()),
                MatchFlags::DOT_ALL,
            ),
            PatternDecl::with_flags(
                concat!(
                    r"(?:[Mm]edical\s*[Hh]istory|[Hh]ealth\s*[Cc]oncerns)\s*[:;]?[ \t]*\n*(.*?)",
                    until_next_section!()
                ),
                MatchFlags::DOT_ALL,
            ),
        ],
        normalizer: None,
        placeholder: "Medical history requires OCR",
    },
    FieldDecl {
        name: "has_insurance",
        patterns: &[
            PatternDecl::new(concat!(r"[Ii]nsurance\s*[:;]?\s*", yes_no_answer!())),
            PatternDecl::new(concat!(r"[Ii]nsurance\s*[Cc]overage\s*[:;]?\s*", yes_no_answer!())),
            PatternDecl::new(concat!(r"[Ii]nsurance\?\s*", yes_no_answer!())),
            PatternDecl::new(r"[Ii]nsurance\s*[:;][ \t]*([^\n]+)"),
        ],
        normalizer: Some(Normalizer::YesNo),
        placeholder: "Unknown (OCR unavailable)",
    },
];
