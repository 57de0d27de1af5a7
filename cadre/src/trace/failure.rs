//! Failure taxonomy: categories, severities, and failure records.
//!
//! Every failure in the engine is classified into one of six categories with
//! one of four severities and a stable subcode of the form `F-{CAT}-{AREA}{NN}`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::util::new_id;

/// Top-level failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    /// Input or output failed validation.
    Validation,
    /// A tool, command, or model call failed while executing.
    Execution,
    /// A resource limit (iterations, time, context) was exhausted.
    Resource,
    /// A security policy blocked the operation.
    Security,
    /// An external dependency was unavailable or misbehaved.
    Dependency,
    /// Anything that could not be classified.
    Unknown,
}

impl FailureCategory {
    /// Short code used inside subcodes (`F-EXE-…`).
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Validation => "VAL",
            Self::Execution => "EXE",
            Self::Resource => "RES",
            Self::Security => "SEC",
            Self::Dependency => "DEP",
            Self::Unknown => "UNK",
        }
    }

    /// Whether failures in this category are retryable by default.
    #[must_use]
    pub const fn retryable(self) -> bool {
        matches!(self, Self::Execution | Self::Resource | Self::Dependency)
    }

    /// Stable string form, matching the serialized representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Execution => "execution",
            Self::Resource => "resource",
            Self::Security => "security",
            Self::Dependency => "dependency",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure severity.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum FailureSeverity {
    /// Cosmetic or informational.
    Low,
    /// Degraded but recoverable.
    Medium,
    /// Requires attention.
    High,
    /// Requires immediate attention.
    Critical,
}

/// A classified failure: category, severity, and stable subcode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureClassification {
    /// Category string (`execution`, `security`, …). Empty for non-failures.
    pub code: String,
    /// Stable subcode such as `F-EXE-TL02`. Empty for non-failures.
    pub subcode: String,
    /// The category.
    pub category: FailureCategory,
    /// The severity.
    pub severity: FailureSeverity,
}

impl FailureClassification {
    /// Build a classification for the given category/severity/subcode triple.
    #[must_use]
    pub fn new(category: FailureCategory, severity: FailureSeverity, subcode: &str) -> Self {
        Self {
            code: category.as_str().to_string(),
            subcode: subcode.to_string(),
            category,
            severity,
        }
    }
}

/// Resolution hints attached to a failure record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureResolution {
    /// Whether the failed operation may be retried.
    pub retryable: bool,
    /// Whether a human must be brought in.
    pub escalation_required: bool,
}

/// A recorded failure, linked to a trace. Multiple failures per trace are
/// allowed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureRecord {
    /// Opaque stable failure ID.
    pub failure_id: String,
    /// The trace this failure belongs to.
    pub trace_id: String,
    /// Classification triple.
    pub classification: FailureClassification,
    /// Human-readable message.
    pub message: String,
    /// Free-form context map.
    pub context: HashMap<String, String>,
    /// Resolution hints.
    pub resolution: FailureResolution,
    /// When the failure occurred.
    pub occurred_at: DateTime<Utc>,
}

impl FailureRecord {
    /// Create a new failure record with a fresh ID and timestamp.
    #[must_use]
    pub fn new(
        trace_id: impl Into<String>,
        classification: FailureClassification,
        message: impl Into<String>,
    ) -> Self {
        let retryable = classification.category.retryable();
        Self {
            failure_id: new_id("FLR"),
            trace_id: trace_id.into(),
            classification,
            message: message.into(),
            context: HashMap::new(),
            resolution: FailureResolution {
                retryable,
                escalation_required: !retryable,
            },
            occurred_at: Utc::now(),
        }
    }

    /// Attach a context entry.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_codes_are_stable() {
        assert_eq!(FailureCategory::Execution.code(), "EXE");
        assert_eq!(FailureCategory::Security.code(), "SEC");
        assert_eq!(FailureCategory::Unknown.code(), "UNK");
    }

    #[test]
    fn severity_orders_low_to_critical() {
        assert!(FailureSeverity::Low < FailureSeverity::Medium);
        assert!(FailureSeverity::High < FailureSeverity::Critical);
    }

    #[test]
    fn execution_failures_default_to_retryable() {
        let record = FailureRecord::new(
            "TRC-000000000000",
            FailureClassification::new(
                FailureCategory::Execution,
                FailureSeverity::Medium,
                "F-EXE-TL02",
            ),
            "tool blew up",
        );
        assert!(record.resolution.retryable);
        assert!(!record.resolution.escalation_required);
    }

    #[test]
    fn security_failures_require_escalation() {
        let record = FailureRecord::new(
            "TRC-000000000000",
            FailureClassification::new(
                FailureCategory::Security,
                FailureSeverity::High,
                "F-SEC-TL03",
            ),
            "blocked",
        );
        assert!(!record.resolution.retryable);
        assert!(record.resolution.escalation_required);
    }
}
