//! Data model for comparative evaluation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of a pairwise comparison, from agent A's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComparisonOutcome {
    /// A beat B.
    Win,
    /// A lost to B.
    Loss,
    /// Statistically indistinguishable.
    Draw,
}

/// One recorded sample: an agent's value on a metric.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentScore {
    /// Agent name.
    pub agent_name: String,
    /// Metric name.
    pub metric_name: String,
    /// Numeric value.
    pub value: f64,
    /// Task the sample came from, when known.
    #[serde(default)]
    pub task_id: Option<String>,
}

impl AgentScore {
    /// Sample without a task correlator.
    #[must_use]
    pub fn new(agent_name: impl Into<String>, metric_name: impl Into<String>, value: f64) -> Self {
        Self {
            agent_name: agent_name.into(),
            metric_name: metric_name.into(),
            value,
            task_id: None,
        }
    }
}

/// A rolling Elo rating record for one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EloRating {
    /// Agent name.
    pub agent_name: String,
    /// Current rating.
    pub rating: f64,
    /// Highest rating ever held.
    pub peak_rating: f64,
    /// Comparisons played.
    pub games_played: u32,
    /// Wins.
    pub win_count: u32,
    /// Losses.
    pub loss_count: u32,
    /// Draws.
    pub draw_count: u32,
    /// Post-update rating history, starting at the initial rating.
    pub history: Vec<f64>,
}

/// Result of one pairwise comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonResult {
    /// First agent.
    pub agent_a: String,
    /// Second agent.
    pub agent_b: String,
    /// Metric compared on.
    pub metric_name: String,
    /// A's mean.
    pub score_a: f64,
    /// B's mean.
    pub score_b: f64,
    /// Outcome from A's perspective.
    pub outcome: ComparisonOutcome,
    /// Absolute score margin.
    pub margin: f64,
    /// Whether the difference is statistically significant.
    pub statistically_significant: bool,
    /// Approximate two-tailed p-value, when computable.
    pub p_value: Option<f64>,
    /// Confidence level used for the significance test.
    pub confidence_level: f64,
}

/// Comparative profile of one agent within the population.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentProfile {
    /// Agent name.
    pub agent_name: String,
    /// Current Elo rating.
    pub elo_rating: f64,
    /// Mean of per-metric percentiles.
    pub overall_percentile: f64,
    /// Total recorded samples.
    pub total_evaluations: usize,
    /// Metrics with percentile rank >= 75.
    pub strengths: Vec<String>,
    /// Metrics with percentile rank <= 25.
    pub weaknesses: Vec<String>,
    /// Percentile rank per metric.
    pub metric_percentiles: Vec<(String, f64)>,
}

/// One row of a leaderboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingEntry {
    /// 1-based rank.
    pub rank: usize,
    /// Agent name.
    pub agent_name: String,
    /// Elo rating.
    pub elo_rating: f64,
    /// Percentile within the Elo population.
    pub percentile: f64,
    /// Comparisons played.
    pub total_evaluations: u32,
    /// Wins.
    pub win_count: u32,
    /// Losses.
    pub loss_count: u32,
    /// Draws.
    pub draw_count: u32,
}

/// A point-in-time leaderboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardSnapshot {
    /// Rows, best first.
    pub entries: Vec<RankingEntry>,
    /// Number of ranked agents.
    pub population_size: usize,
    /// When the snapshot was taken.
    pub created_at: DateTime<Utc>,
}
