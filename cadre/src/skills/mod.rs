//! Skill definitions and the skill registry.
//!
//! Skills are reusable instruction bundles referenced by agents and packs.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

/// A named, versioned skill.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillDefinition {
    /// Unique skill name.
    pub name: String,
    /// Semver version.
    pub version: String,
    /// What the skill teaches.
    #[serde(default)]
    pub description: String,
    /// Free-form tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Instruction body.
    #[serde(default)]
    pub body: String,
}

impl SkillDefinition {
    /// Minimal skill.
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: String::new(),
            tags: Vec::new(),
            body: String::new(),
        }
    }
}

/// Read-mostly registry of skills keyed by name.
#[derive(Debug, Default)]
pub struct SkillRegistry {
    skills: RwLock<HashMap<String, SkillDefinition>>,
}

impl SkillRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a skill, replacing any previous version under the same
    /// name.
    pub fn register(&self, skill: SkillDefinition) {
        self.skills
            .write()
            .expect("skill registry lock")
            .insert(skill.name.clone(), skill);
    }

    /// Get a skill by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<SkillDefinition> {
        self.skills
            .read()
            .expect("skill registry lock")
            .get(name)
            .cloned()
    }

    /// Remove a skill. Returns `true` if it existed.
    pub fn deregister(&self, name: &str) -> bool {
        self.skills
            .write()
            .expect("skill registry lock")
            .remove(name)
            .is_some()
    }

    /// List skills, optionally filtered by tag, sorted by name.
    #[must_use]
    pub fn list(&self, tag: Option<&str>) -> Vec<SkillDefinition> {
        let mut skills: Vec<SkillDefinition> = self
            .skills
            .read()
            .expect("skill registry lock")
            .values()
            .filter(|s| tag.is_none_or(|t| s.tags.iter().any(|st| st == t)))
            .cloned()
            .collect();
        skills.sort_by(|a, b| a.name.cmp(&b.name));
        skills
    }

    /// Number of registered skills.
    #[must_use]
    pub fn len(&self) -> usize {
        self.skills.read().expect("skill registry lock").len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_filter_by_tag() {
        let registry = SkillRegistry::new();
        let mut review = SkillDefinition::new("code-review", "1.0.0");
        review.tags = vec!["review".to_string()];
        registry.register(review);
        registry.register(SkillDefinition::new("research", "1.0.0"));

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.list(Some("review")).len(), 1);
        assert_eq!(registry.list(None).len(), 2);
        assert!(registry.get("research").is_some());
        assert!(registry.deregister("research"));
        assert!(!registry.deregister("research"));
    }
}
