//! Comparative evaluation: population tracking, Elo ratings, percentile
//! ranking, pairwise comparison, and the leaderboard.

mod comparator;
mod elo;
mod models;
mod percentile;
mod population;
mod service;

pub use comparator::{
    AgentComparator, DEFAULT_CONFIDENCE_LEVEL, DEFAULT_DRAW_THRESHOLD, STRENGTH_THRESHOLD,
    WEAKNESS_THRESHOLD,
};
pub use elo::{
    DEFAULT_K_FACTOR, DEFAULT_RATING, EloCalculator, MIN_K_FACTOR, PROVISIONAL_THRESHOLD,
};
pub use models::{
    AgentProfile, AgentScore, ComparisonOutcome, ComparisonResult, EloRating,
    LeaderboardSnapshot, RankingEntry,
};
pub use percentile::compute_percentile_ranks;
pub use population::PopulationTracker;
pub use service::{ComparativeService, MAX_SNAPSHOTS};
