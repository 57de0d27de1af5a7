//! Elo rating calculator with adaptive K-factor.
//!
//! Standard Elo adapted for agent evaluation: provisional agents (under the
//! threshold) use the full K-factor for fast convergence, established ones
//! the minimum K-factor for stability.

use super::models::{ComparisonOutcome, EloRating};

/// Starting rating for new agents.
pub const DEFAULT_RATING: f64 = 1500.0;
/// K-factor while provisional.
pub const DEFAULT_K_FACTOR: f64 = 32.0;
/// K-factor once established.
pub const MIN_K_FACTOR: f64 = 16.0;
/// Games below which an agent is provisional.
pub const PROVISIONAL_THRESHOLD: u32 = 30;

/// Elo calculator.
#[derive(Debug, Clone, Copy)]
pub struct EloCalculator {
    k_factor: f64,
    min_k_factor: f64,
    provisional_threshold: u32,
    default_rating: f64,
}

impl Default for EloCalculator {
    fn default() -> Self {
        Self {
            k_factor: DEFAULT_K_FACTOR,
            min_k_factor: MIN_K_FACTOR,
            provisional_threshold: PROVISIONAL_THRESHOLD,
            default_rating: DEFAULT_RATING,
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

impl EloCalculator {
    /// Calculator with a custom provisional K-factor.
    #[must_use]
    pub fn with_k_factor(k_factor: f64) -> Self {
        Self {
            k_factor,
            ..Self::default()
        }
    }

    /// The rating new agents start at.
    #[must_use]
    pub const fn default_rating(&self) -> f64 {
        self.default_rating
    }

    /// Expected score for A against B:
    /// `E_A = 1 / (1 + 10^((R_B - R_A) / 400))`.
    #[must_use]
    pub fn expected_score(&self, rating_a: f64, rating_b: f64) -> f64 {
        1.0 / (1.0 + 10f64.powf((rating_b - rating_a) / 400.0))
    }

    /// Effective K-factor for an agent with the given experience.
    #[must_use]
    pub const fn effective_k_factor(&self, games_played: u32) -> f64 {
        if games_played < self.provisional_threshold {
            self.k_factor
        } else {
            self.min_k_factor
        }
    }

    /// Fresh rating record for an agent.
    #[must_use]
    pub fn create_rating(&self, agent_name: &str) -> EloRating {
        EloRating {
            agent_name: agent_name.to_string(),
            rating: self.default_rating,
            peak_rating: self.default_rating,
            games_played: 0,
            win_count: 0,
            loss_count: 0,
            draw_count: 0,
            history: vec![self.default_rating],
        }
    }

    /// Update both ratings in place after a comparison and return the new
    /// values. `outcome` is from A's perspective.
    pub fn update_ratings(
        &self,
        rating_a: &mut EloRating,
        rating_b: &mut EloRating,
        outcome: ComparisonOutcome,
    ) -> (f64, f64) {
        let (actual_a, actual_b) = match outcome {
            ComparisonOutcome::Win => (1.0, 0.0),
            ComparisonOutcome::Loss => (0.0, 1.0),
            ComparisonOutcome::Draw => (0.5, 0.5),
        };

        let expected_a = self.expected_score(rating_a.rating, rating_b.rating);
        let expected_b = 1.0 - expected_a;

        let k_a = self.effective_k_factor(rating_a.games_played);
        let k_b = self.effective_k_factor(rating_b.games_played);

        rating_a.rating = round2(rating_a.rating + k_a * (actual_a - expected_a));
        rating_b.rating = round2(rating_b.rating + k_b * (actual_b - expected_b));

        for rating in [&mut *rating_a, &mut *rating_b] {
            rating.games_played += 1;
            rating.peak_rating = rating.peak_rating.max(rating.rating);
            let current = rating.rating;
            rating.history.push(current);
        }

        match outcome {
            ComparisonOutcome::Win => {
                rating_a.win_count += 1;
                rating_b.loss_count += 1;
            }
            ComparisonOutcome::Loss => {
                rating_a.loss_count += 1;
                rating_b.win_count += 1;
            }
            ComparisonOutcome::Draw => {
                rating_a.draw_count += 1;
                rating_b.draw_count += 1;
            }
        }

        (rating_a.rating, rating_b.rating)
    }
}
