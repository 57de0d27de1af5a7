//! Bounded in-memory activity feed.
//!
//! Engine-level events for the observability surface. The store holds at most
//! [`ActivityFeed::DEFAULT_CAPACITY`] entries and evicts the oldest on
//! overflow.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single activity entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEvent {
    /// Event kind (`agent.invoked`, `workflow.completed`, …).
    pub kind: String,
    /// Tenant the event belongs to.
    pub tenant_id: String,
    /// Short human-readable summary.
    pub summary: String,
    /// When the event was recorded.
    pub recorded_at: DateTime<Utc>,
}

/// Bounded FIFO feed of activity events.
#[derive(Debug)]
pub struct ActivityFeed {
    entries: Mutex<VecDeque<ActivityEvent>>,
    capacity: usize,
}

impl Default for ActivityFeed {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

impl ActivityFeed {
    /// Default maximum number of retained entries.
    pub const DEFAULT_CAPACITY: usize = 1000;

    /// Create a feed with the given capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(64))),
            capacity: capacity.max(1),
        }
    }

    /// Record an event, evicting the oldest entry if the feed is full.
    pub fn record(&self, kind: &str, tenant_id: &str, summary: &str) {
        let mut entries = self.entries.lock().expect("activity feed lock");
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(ActivityEvent {
            kind: kind.to_string(),
            tenant_id: tenant_id.to_string(),
            summary: summary.to_string(),
            recorded_at: Utc::now(),
        });
    }

    /// Return the most recent `limit` events, newest first.
    #[must_use]
    pub fn recent(&self, limit: usize) -> Vec<ActivityEvent> {
        let entries = self.entries.lock().expect("activity feed lock");
        entries.iter().rev().take(limit).cloned().collect()
    }

    /// Number of retained events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().expect("activity feed lock").len()
    }

    /// Whether the feed is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
