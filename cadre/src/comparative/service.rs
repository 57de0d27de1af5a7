//! Comparative evaluation service.
//!
//! Ties together the population tracker, Elo calculator, comparator, and
//! leaderboard. Elo updates are serialized per service instance; snapshots
//! are retained with bounded history.

use std::collections::HashMap;

use chrono::Utc;
use tracing::{info, warn};

use super::comparator::AgentComparator;
use super::elo::EloCalculator;
use super::models::{
    AgentProfile, AgentScore, ComparisonResult, EloRating, LeaderboardSnapshot, RankingEntry,
};
use super::percentile::compute_percentile_ranks;
use super::population::PopulationTracker;

/// Maximum number of leaderboard snapshots retained.
pub const MAX_SNAPSHOTS: usize = 200;

/// Orchestrates comparative evaluation across an agent population.
#[derive(Debug)]
pub struct ComparativeService {
    elo: EloCalculator,
    population: PopulationTracker,
    comparator: AgentComparator,
    ratings: HashMap<String, EloRating>,
    snapshots: Vec<LeaderboardSnapshot>,
    min_population_size: usize,
}

impl Default for ComparativeService {
    fn default() -> Self {
        Self {
            elo: EloCalculator::default(),
            population: PopulationTracker::new(),
            comparator: AgentComparator::default(),
            ratings: HashMap::new(),
            snapshots: Vec::new(),
            min_population_size: 2,
        }
    }
}

impl ComparativeService {
    /// Create a service with default parameters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The underlying population tracker.
    #[must_use]
    pub const fn population(&self) -> &PopulationTracker {
        &self.population
    }

    /// Record samples, creating Elo ratings for unseen agents.
    pub fn record_scores(&mut self, scores: &[AgentScore]) {
        self.population.add_scores(scores);
        for score in scores {
            if !self.ratings.contains_key(&score.agent_name) {
                self.ratings.insert(
                    score.agent_name.clone(),
                    self.elo.create_rating(&score.agent_name),
                );
            }
        }
        info!(
            count = scores.len(),
            agents = self.population.population_size(),
            "comparative_scores_recorded"
        );
    }

    /// Run one pairwise comparison and update both Elo ratings.
    pub fn run_pairwise_evaluation(
        &mut self,
        agent_a: &str,
        agent_b: &str,
        metric_name: &str,
    ) -> Option<ComparisonResult> {
        let result = self
            .comparator
            .compare_agents(&self.population, agent_a, agent_b, metric_name)?;

        for agent in [agent_a, agent_b] {
            if !self.ratings.contains_key(agent) {
                self.ratings
                    .insert(agent.to_string(), self.elo.create_rating(agent));
            }
        }

        // Two lookups so we can hold both records mutably.
        let mut rating_a = self.ratings.remove(agent_a)?;
        let mut rating_b = self.ratings.remove(agent_b)?;
        self.elo
            .update_ratings(&mut rating_a, &mut rating_b, result.outcome);
        self.ratings.insert(agent_a.to_string(), rating_a);
        self.ratings.insert(agent_b.to_string(), rating_b);

        Some(result)
    }

    /// Compare every agent pair once on a metric, updating Elo ratings.
    pub fn run_round_robin(&mut self, metric_name: &str) -> Vec<ComparisonResult> {
        let agents = self.population.agent_names();
        if agents.len() < self.min_population_size {
            warn!(
                size = agents.len(),
                min = self.min_population_size,
                "comparative_insufficient_population"
            );
            return Vec::new();
        }

        let mut results = Vec::new();
        for (i, agent_a) in agents.iter().enumerate() {
            for agent_b in &agents[i + 1..] {
                if let Some(result) = self.run_pairwise_evaluation(agent_a, agent_b, metric_name) {
                    results.push(result);
                }
            }
        }
        results
    }

    /// Generate and store a leaderboard snapshot from current ratings.
    pub fn generate_leaderboard(&mut self) -> LeaderboardSnapshot {
        let mut sorted: Vec<&EloRating> = self.ratings.values().collect();
        sorted.sort_by(|a, b| {
            b.rating
                .partial_cmp(&a.rating)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.agent_name.cmp(&b.agent_name))
        });

        let elo_scores: HashMap<String, f64> = sorted
            .iter()
            .map(|r| (r.agent_name.clone(), r.rating))
            .collect();
        let percentiles = compute_percentile_ranks(&elo_scores);

        let entries: Vec<RankingEntry> = sorted
            .iter()
            .enumerate()
            .map(|(index, rating)| RankingEntry {
                rank: index + 1,
                agent_name: rating.agent_name.clone(),
                elo_rating: rating.rating,
                percentile: percentiles
                    .get(&rating.agent_name)
                    .copied()
                    .unwrap_or(0.0),
                total_evaluations: rating.games_played,
                win_count: rating.win_count,
                loss_count: rating.loss_count,
                draw_count: rating.draw_count,
            })
            .collect();

        let snapshot = LeaderboardSnapshot {
            population_size: entries.len(),
            entries,
            created_at: Utc::now(),
        };
        self.snapshots.push(snapshot.clone());
        if self.snapshots.len() > MAX_SNAPSHOTS {
            let excess = self.snapshots.len() - MAX_SNAPSHOTS;
            self.snapshots.drain(..excess);
        }
        snapshot
    }

    /// The most recent leaderboard, if any.
    #[must_use]
    pub fn latest_leaderboard(&self) -> Option<&LeaderboardSnapshot> {
        self.snapshots.last()
    }

    /// Recent snapshots, most recent first.
    #[must_use]
    pub fn leaderboard_history(&self, limit: usize) -> Vec<&LeaderboardSnapshot> {
        self.snapshots.iter().rev().take(limit).collect()
    }

    /// Comparative profile for one agent, or `None` when unknown.
    #[must_use]
    pub fn agent_profile(&self, agent_name: &str) -> Option<AgentProfile> {
        if !self.ratings.contains_key(agent_name)
            && !self.population.agent_names().iter().any(|a| a == agent_name)
        {
            return None;
        }
        let elo_rating = self
            .ratings
            .get(agent_name)
            .map_or(self.elo.default_rating(), |r| r.rating);
        Some(
            self.comparator
                .build_agent_profile(&self.population, agent_name, elo_rating),
        )
    }

    /// Elo rating record for one agent.
    #[must_use]
    pub fn elo_rating(&self, agent_name: &str) -> Option<&EloRating> {
        self.ratings.get(agent_name)
    }

    /// Rating history for one agent.
    #[must_use]
    pub fn rating_history(&self, agent_name: &str) -> Vec<f64> {
        self.ratings
            .get(agent_name)
            .map(|r| r.history.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparative::models::ComparisonOutcome;

    fn seeded_service() -> ComparativeService {
        let mut service = ComparativeService::new();
        service.record_scores(&[
            AgentScore::new("alpha", "accuracy", 0.95),
            AgentScore::new("alpha", "accuracy", 0.93),
            AgentScore::new("beta", "accuracy", 0.60),
            AgentScore::new("beta", "accuracy", 0.62),
            AgentScore::new("gamma", "accuracy", 0.75),
            AgentScore::new("gamma", "accuracy", 0.77),
        ]);
        service
    }

    #[test]
    fn pairwise_evaluation_moves_ratings() {
        let mut service = seeded_service();
        let result = service
            .run_pairwise_evaluation("alpha", "beta", "accuracy")
            .unwrap();
        assert_eq!(result.outcome, ComparisonOutcome::Win);
        assert_eq!(service.elo_rating("alpha").unwrap().rating, 1516.00);
        assert_eq!(service.elo_rating("beta").unwrap().rating, 1484.00);
    }

    #[test]
    fn round_robin_compares_every_pair_once() {
        let mut service = seeded_service();
        let results = service.run_round_robin("accuracy");
        // 3 agents -> 3 pairs.
        assert_eq!(results.len(), 3);
        for agent in ["alpha", "beta", "gamma"] {
            assert_eq!(service.elo_rating(agent).unwrap().games_played, 2);
        }
    }

    #[test]
    fn round_robin_needs_a_minimum_population() {
        let mut service = ComparativeService::new();
        service.record_scores(&[AgentScore::new("lonely", "accuracy", 1.0)]);
        assert!(service.run_round_robin("accuracy").is_empty());
    }

    #[test]
    fn leaderboard_ranks_by_rating() {
        let mut service = seeded_service();
        service.run_round_robin("accuracy");
        let board = service.generate_leaderboard();
        assert_eq!(board.population_size, 3);
        assert_eq!(board.entries[0].agent_name, "alpha");
        assert_eq!(board.entries[0].rank, 1);
        assert_eq!(board.entries[0].percentile, 100.0);
        assert_eq!(board.entries[2].agent_name, "beta");
        assert!(service.latest_leaderboard().is_some());
    }

    #[test]
    fn snapshot_history_is_bounded() {
        let mut service = seeded_service();
        for _ in 0..(MAX_SNAPSHOTS + 20) {
            let _ = service.generate_leaderboard();
        }
        assert_eq!(service.leaderboard_history(usize::MAX).len(), MAX_SNAPSHOTS);
    }

    #[test]
    fn profile_for_unknown_agent_is_none() {
        let service = seeded_service();
        assert!(service.agent_profile("ghost").is_none());
        let profile = service.agent_profile("alpha").unwrap();
        assert_eq!(profile.total_evaluations, 2);
    }
}
