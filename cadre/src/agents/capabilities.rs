//! Fixed capability taxonomy.
//!
//! 25 entries in five categories, identified as `{C}-NN`. The catalog is
//! immutable; agents reference entries by identifier.

use serde::{Deserialize, Serialize};

/// Top-level capability category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CapabilityCategory {
    /// Planning (P).
    Planning,
    /// Implementation (I).
    Implementation,
    /// Verification (V).
    Verification,
    /// Review (R).
    Review,
    /// Research (X).
    Research,
}

impl CapabilityCategory {
    /// Single-letter prefix used in capability identifiers.
    #[must_use]
    pub const fn prefix(self) -> char {
        match self {
            Self::Planning => 'P',
            Self::Implementation => 'I',
            Self::Verification => 'V',
            Self::Review => 'R',
            Self::Research => 'X',
        }
    }

    /// All five categories in catalog order.
    #[must_use]
    pub const fn all() -> [Self; 5] {
        [
            Self::Planning,
            Self::Implementation,
            Self::Verification,
            Self::Review,
            Self::Research,
        ]
    }
}

/// A single catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capability {
    /// Stable identifier (`P-01` … `X-05`).
    pub id: &'static str,
    /// Category the entry belongs to.
    pub category: CapabilityCategory,
    /// Short name.
    pub name: &'static str,
}

/// The immutable 25-entry capability catalog.
pub const CAPABILITY_CATALOG: [Capability; 25] = [
    cap("P-01", CapabilityCategory::Planning, "task decomposition"),
    cap("P-02", CapabilityCategory::Planning, "dependency ordering"),
    cap("P-03", CapabilityCategory::Planning, "estimation"),
    cap("P-04", CapabilityCategory::Planning, "risk assessment"),
    cap("P-05", CapabilityCategory::Planning, "scope control"),
    cap("I-01", CapabilityCategory::Implementation, "code authoring"),
    cap("I-02", CapabilityCategory::Implementation, "refactoring"),
    cap("I-03", CapabilityCategory::Implementation, "configuration"),
    cap("I-04", CapabilityCategory::Implementation, "integration"),
    cap("I-05", CapabilityCategory::Implementation, "migration"),
    cap("V-01", CapabilityCategory::Verification, "unit testing"),
    cap("V-02", CapabilityCategory::Verification, "integration testing"),
    cap("V-03", CapabilityCategory::Verification, "regression testing"),
    cap("V-04", CapabilityCategory::Verification, "performance testing"),
    cap("V-05", CapabilityCategory::Verification, "validation"),
    cap("R-01", CapabilityCategory::Review, "code review"),
    cap("R-02", CapabilityCategory::Review, "design review"),
    cap("R-03", CapabilityCategory::Review, "security review"),
    cap("R-04", CapabilityCategory::Review, "documentation review"),
    cap("R-05", CapabilityCategory::Review, "compliance review"),
    cap("X-01", CapabilityCategory::Research, "literature search"),
    cap("X-02", CapabilityCategory::Research, "prototyping"),
    cap("X-03", CapabilityCategory::Research, "benchmarking"),
    cap("X-04", CapabilityCategory::Research, "data analysis"),
    cap("X-05", CapabilityCategory::Research, "synthesis"),
];

const fn cap(id: &'static str, category: CapabilityCategory, name: &'static str) -> Capability {
    Capability { id, category, name }
}

/// Look up a catalog entry by its identifier.
#[must_use]
pub fn capability_by_id(id: &str) -> Option<&'static Capability> {
    CAPABILITY_CATALOG.iter().find(|c| c.id == id)
}

/// Validate a list of capability identifiers, returning the unknown ones.
#[must_use]
pub fn unknown_capabilities(ids: &[String]) -> Vec<String> {
    ids.iter()
        .filter(|id| capability_by_id(id).is_none())
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_has_25_entries_in_5_categories() {
        assert_eq!(CAPABILITY_CATALOG.len(), 25);
        for category in CapabilityCategory::all() {
            let count = CAPABILITY_CATALOG
                .iter()
                .filter(|c| c.category == category)
                .count();
            assert_eq!(count, 5, "category {category:?}");
        }
    }

    #[test]
    fn identifiers_match_their_category_prefix() {
        for entry in &CAPABILITY_CATALOG {
            assert!(entry.id.starts_with(entry.category.prefix()));
            assert_eq!(entry.id.len(), 4);
        }
    }

    #[test]
    fn lookup_finds_known_and_rejects_unknown() {
        assert!(capability_by_id("V-03").is_some());
        assert!(capability_by_id("Z-01").is_none());
        let unknown = unknown_capabilities(&["P-01".into(), "Q-09".into()]);
        assert_eq!(unknown, vec!["Q-09".to_string()]);
    }
}
