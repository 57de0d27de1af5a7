//! Canonical (golden) task catalog.
//!
//! Pre-declared scenarios used to gate releases, identified by stable IDs
//! GT-01..GT-07 plus the golden PR/issue cases GC-01..GC-04.

use serde::Serialize;

use super::models::GoldenTag;

/// Definition of a canonical task.
#[derive(Debug, Clone, Serialize)]
pub struct GoldenTaskDef {
    /// Stable ID (GT-XX).
    pub task_id: &'static str,
    /// Task name.
    pub name: &'static str,
    /// Gating tags.
    pub tags: &'static [GoldenTag],
    /// Checks the task asserts.
    pub checks: &'static [&'static str],
}

/// Definition of a golden PR/issue case.
#[derive(Debug, Clone, Serialize)]
pub struct GoldenCaseDef {
    /// Stable ID (GC-XX).
    pub case_id: &'static str,
    /// Case name.
    pub name: &'static str,
    /// Gating tags.
    pub tags: &'static [GoldenTag],
}

/// The canonical task catalog.
pub const GOLDEN_TASKS: [GoldenTaskDef; 7] = [
    GoldenTaskDef {
        task_id: "GT-01",
        name: "bootstrap smoke",
        tags: &[GoldenTag::Smoke, GoldenTag::Critical],
        checks: &["engine boots", "registries seeded"],
    },
    GoldenTaskDef {
        task_id: "GT-02",
        name: "single-agent invocation",
        tags: &[GoldenTag::Smoke, GoldenTag::Critical, GoldenTag::Release],
        checks: &["agent resolves", "loop terminates", "trace recorded"],
    },
    GoldenTaskDef {
        task_id: "GT-03",
        name: "tool governance denial",
        tags: &[GoldenTag::Critical, GoldenTag::Release],
        checks: &["denied call surfaces as security failure"],
    },
    GoldenTaskDef {
        task_id: "GT-04",
        name: "dependency-aware workflow",
        tags: &[GoldenTag::Critical, GoldenTag::Release],
        checks: &["layers respected", "outputs flow downstream"],
    },
    GoldenTaskDef {
        task_id: "GT-05",
        name: "budget stop condition",
        tags: &[GoldenTag::Release, GoldenTag::Regression],
        checks: &["loop aborts on exhausted budget"],
    },
    GoldenTaskDef {
        task_id: "GT-06",
        name: "hook abort short-circuit",
        tags: &[GoldenTag::Release, GoldenTag::Regression],
        checks: &["request blocked with 403"],
    },
    GoldenTaskDef {
        task_id: "GT-07",
        name: "hybrid retrieval ranking",
        tags: &[GoldenTag::Optional],
        checks: &["rrf fusion order stable"],
    },
];

/// The golden PR/issue case catalog.
pub const GOLDEN_CASES: [GoldenCaseDef; 4] = [
    GoldenCaseDef {
        case_id: "GC-01",
        name: "small fix with passing gates",
        tags: &[GoldenTag::Smoke],
    },
    GoldenCaseDef {
        case_id: "GC-02",
        name: "refactor with scope drift",
        tags: &[GoldenTag::Critical],
    },
    GoldenCaseDef {
        case_id: "GC-03",
        name: "regression-introducing change",
        tags: &[GoldenTag::Regression],
    },
    GoldenCaseDef {
        case_id: "GC-04",
        name: "flaky-test stabilisation",
        tags: &[GoldenTag::Optional],
    },
];

/// Tasks carrying the given tag.
#[must_use]
pub fn tasks_with_tag(tag: GoldenTag) -> Vec<&'static GoldenTaskDef> {
    GOLDEN_TASKS
        .iter()
        .filter(|t| t.tags.contains(&tag))
        .collect()
}

/// Look up a task by its stable ID.
#[must_use]
pub fn golden_task(task_id: &str) -> Option<&'static GoldenTaskDef> {
    GOLDEN_TASKS.iter().find(|t| t.task_id == task_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_ids_are_stable_and_unique() {
        let mut ids: Vec<&str> = GOLDEN_TASKS.iter().map(|t| t.task_id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 7);
        assert!(golden_task("GT-01").is_some());
        assert!(golden_task("GT-99").is_none());
    }

    #[test]
    fn smoke_set_is_a_small_subset() {
        let smoke = tasks_with_tag(GoldenTag::Smoke);
        assert!(!smoke.is_empty());
        assert!(smoke.len() < GOLDEN_TASKS.len());
    }

    #[test]
    fn every_task_carries_at_least_one_tag() {
        for task in &GOLDEN_TASKS {
            assert!(!task.tags.is_empty(), "{}", task.task_id);
        }
        for case in &GOLDEN_CASES {
            assert!(!case.tags.is_empty(), "{}", case.case_id);
        }
    }
}
