//! Trace collection and failure classification.
//!
//! Append-only records of every execution, mapped to a fixed failure
//! taxonomy, plus the bounded activity feed.

mod activity;
mod collector;
mod failure;
mod models;

pub use activity::{ActivityEvent, ActivityFeed};
pub use collector::{TraceCollector, TraceError, TraceFilter};
pub use failure::{
    FailureCategory, FailureClassification, FailureRecord, FailureResolution, FailureSeverity,
};
pub use models::{
    ActionStatus, TraceAction, TraceAgentContext, TraceOutcome, TraceRecord, TraceStatus,
    TraceStep,
};
