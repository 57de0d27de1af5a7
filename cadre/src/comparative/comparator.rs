//! Pairwise agent comparison with approximate statistical significance.
//!
//! The p-value uses Welch's t-statistic with Welch–Satterthwaite degrees of
//! freedom and a normal-erfc approximation (Abramowitz & Stegun 26.2.17),
//! with Bartlett's small-sample correction below 30 degrees of freedom. This
//! deliberately avoids a statistics dependency; the fit is conservative.

use super::models::{AgentProfile, ComparisonOutcome, ComparisonResult};
use super::percentile::compute_percentile_ranks;
use super::population::PopulationTracker;

/// Score difference below which a comparison is a draw.
pub const DEFAULT_DRAW_THRESHOLD: f64 = 0.01;
/// Default confidence level for significance testing.
pub const DEFAULT_CONFIDENCE_LEVEL: f64 = 0.95;
/// Percentile at or above which a metric counts as a strength.
pub const STRENGTH_THRESHOLD: f64 = 75.0;
/// Percentile at or below which a metric counts as a weakness.
pub const WEAKNESS_THRESHOLD: f64 = 25.0;

fn round6(value: f64) -> f64 {
    (value * 1e6).round() / 1e6
}

/// Compares agents within a population.
#[derive(Debug, Clone, Copy)]
pub struct AgentComparator {
    draw_threshold: f64,
    confidence_level: f64,
}

impl Default for AgentComparator {
    fn default() -> Self {
        Self {
            draw_threshold: DEFAULT_DRAW_THRESHOLD,
            confidence_level: DEFAULT_CONFIDENCE_LEVEL,
        }
    }
}

impl AgentComparator {
    /// Comparator with custom draw threshold and confidence level.
    #[must_use]
    pub fn new(draw_threshold: f64, confidence_level: f64) -> Self {
        Self {
            draw_threshold,
            confidence_level,
        }
    }

    /// Compare two agents on a metric. Returns `None` when either agent has
    /// no data for it.
    #[must_use]
    pub fn compare_agents(
        &self,
        population: &PopulationTracker,
        agent_a: &str,
        agent_b: &str,
        metric_name: &str,
    ) -> Option<ComparisonResult> {
        let score_a = population.agent_mean(agent_a, metric_name)?;
        let score_b = population.agent_mean(agent_b, metric_name)?;

        let margin = score_a - score_b;
        let outcome = if margin.abs() <= self.draw_threshold {
            ComparisonOutcome::Draw
        } else if margin > 0.0 {
            ComparisonOutcome::Win
        } else {
            ComparisonOutcome::Loss
        };

        let p_value = self.compute_p_value(population, agent_a, agent_b, metric_name);
        let significant = p_value.is_some_and(|p| p < (1.0 - self.confidence_level));

        Some(ComparisonResult {
            agent_a: agent_a.to_string(),
            agent_b: agent_b.to_string(),
            metric_name: metric_name.to_string(),
            score_a: round6(score_a),
            score_b: round6(score_b),
            outcome,
            margin: round6(margin.abs()),
            statistically_significant: significant,
            p_value: p_value.map(round6),
            confidence_level: self.confidence_level,
        })
    }

    /// Compare two agents on every metric where both have data.
    #[must_use]
    pub fn compare_all_metrics(
        &self,
        population: &PopulationTracker,
        agent_a: &str,
        agent_b: &str,
    ) -> Vec<ComparisonResult> {
        population
            .metric_names()
            .iter()
            .filter_map(|metric| self.compare_agents(population, agent_a, agent_b, metric))
            .collect()
    }

    /// Build a comparative profile: per-metric percentile ranks with
    /// strength/weakness labels.
    #[must_use]
    pub fn build_agent_profile(
        &self,
        population: &PopulationTracker,
        agent_name: &str,
        elo_rating: f64,
    ) -> AgentProfile {
        let mut metric_percentiles: Vec<(String, f64)> = Vec::new();
        let mut strengths = Vec::new();
        let mut weaknesses = Vec::new();

        for metric in population.metric_names() {
            let means = population.population_means(&metric);
            if !means.contains_key(agent_name) {
                continue;
            }
            let ranks = compute_percentile_ranks(&means);
            let rank = ranks.get(agent_name).copied().unwrap_or(50.0);
            let rank = (rank * 100.0).round() / 100.0;
            metric_percentiles.push((metric.clone(), rank));

            if rank >= STRENGTH_THRESHOLD {
                strengths.push(metric.clone());
            } else if rank <= WEAKNESS_THRESHOLD {
                weaknesses.push(metric.clone());
            }
        }

        let overall = if metric_percentiles.is_empty() {
            0.0
        } else {
            let sum: f64 = metric_percentiles.iter().map(|(_, p)| p).sum();
            (sum / metric_percentiles.len() as f64 * 100.0).round() / 100.0
        };

        AgentProfile {
            agent_name: agent_name.to_string(),
            elo_rating,
            overall_percentile: overall,
            total_evaluations: population.agent_sample_count(agent_name),
            strengths,
            weaknesses,
            metric_percentiles,
        }
    }

    /// Approximate two-tailed p-value via Welch's t-test. Needs at least
    /// two samples per agent; returns `None` otherwise.
    fn compute_p_value(
        &self,
        population: &PopulationTracker,
        agent_a: &str,
        agent_b: &str,
        metric_name: &str,
    ) -> Option<f64> {
        let samples_a = population.samples(metric_name, agent_a)?;
        let samples_b = population.samples(metric_name, agent_b)?;
        if samples_a.len() < 2 || samples_b.len() < 2 {
            return None;
        }

        let n_a = samples_a.len() as f64;
        let n_b = samples_b.len() as f64;
        let mean_a = samples_a.iter().sum::<f64>() / n_a;
        let mean_b = samples_b.iter().sum::<f64>() / n_b;

        let var_a = samples_a.iter().map(|x| (x - mean_a).powi(2)).sum::<f64>() / (n_a - 1.0);
        let var_b = samples_b.iter().map(|x| (x - mean_b).powi(2)).sum::<f64>() / (n_b - 1.0);

        let se = (var_a / n_a + var_b / n_b).sqrt();
        if se < 1e-12 {
            // Zero variance on both sides: identical or trivially distinct.
            return Some(if (mean_a - mean_b).abs() < 1e-12 {
                1.0
            } else {
                0.0
            });
        }

        let t_stat = (mean_a - mean_b).abs() / se;

        // Welch–Satterthwaite degrees of freedom.
        let numerator = (var_a / n_a + var_b / n_b).powi(2);
        let denominator =
            (var_a / n_a).powi(2) / (n_a - 1.0) + (var_b / n_b).powi(2) / (n_b - 1.0);
        if denominator < 1e-12 {
            return None;
        }
        let df = numerator / denominator;

        Some(normal_two_tailed(t_stat, df))
    }
}

/// Two-tailed p-value from a t-statistic using the normal approximation,
/// with Bartlett's correction for small degrees of freedom.
fn normal_two_tailed(t: f64, df: f64) -> f64 {
    let t = if df < 30.0 {
        t / (1.0 + 1.0 / (4.0 * df.max(1.0)))
    } else {
        t
    };

    // erfc rational approximation, Abramowitz & Stegun 26.2.17.
    let x = t / std::f64::consts::SQRT_2;
    let a = x.abs();
    let p = 0.3275911;
    let coefficients = [
        0.254829592,
        -0.284496736,
        1.421413741,
        -1.453152027,
        1.061405429,
    ];
    let s = 1.0 / (1.0 + p * a);
    let polynomial: f64 = coefficients
        .iter()
        .enumerate()
        .map(|(i, c)| c * s.powi(i as i32 + 1))
        .sum();
    let erfc = polynomial * (-a * a).exp();
    erfc.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparative::models::AgentScore;

    fn population(samples: &[(&str, &str, &[f64])]) -> PopulationTracker {
        let mut tracker = PopulationTracker::new();
        for (agent, metric, values) in samples {
            for value in *values {
                tracker.add_score(&AgentScore::new(*agent, *metric, *value));
            }
        }
        tracker
    }

    #[test]
    fn clear_winner_is_a_win() {
        let pop = population(&[
            ("alpha", "accuracy", &[0.9, 0.92, 0.91]),
            ("beta", "accuracy", &[0.5, 0.52, 0.48]),
        ]);
        let result = AgentComparator::default()
            .compare_agents(&pop, "alpha", "beta", "accuracy")
            .unwrap();
        assert_eq!(result.outcome, ComparisonOutcome::Win);
        assert!(result.statistically_significant);
        assert!(result.p_value.unwrap() < 0.05);
    }

    #[test]
    fn tiny_margin_is_a_draw() {
        let pop = population(&[
            ("alpha", "accuracy", &[0.900]),
            ("beta", "accuracy", &[0.905]),
        ]);
        let result = AgentComparator::default()
            .compare_agents(&pop, "alpha", "beta", "accuracy")
            .unwrap();
        assert_eq!(result.outcome, ComparisonOutcome::Draw);
        // Single samples: no p-value.
        assert!(result.p_value.is_none());
        assert!(!result.statistically_significant);
    }

    #[test]
    fn missing_data_returns_none() {
        let pop = population(&[("alpha", "accuracy", &[0.9])]);
        assert!(
            AgentComparator::default()
                .compare_agents(&pop, "alpha", "ghost", "accuracy")
                .is_none()
        );
    }

    #[test]
    fn overlapping_noisy_samples_are_not_significant() {
        let pop = population(&[
            ("alpha", "accuracy", &[0.5, 0.9, 0.6, 0.85]),
            ("beta", "accuracy", &[0.55, 0.8, 0.65, 0.75]),
        ]);
        let result = AgentComparator::default()
            .compare_agents(&pop, "alpha", "beta", "accuracy")
            .unwrap();
        assert!(!result.statistically_significant);
    }

    #[test]
    fn identical_samples_give_p_of_one() {
        let pop = population(&[
            ("alpha", "accuracy", &[0.7, 0.7]),
            ("beta", "accuracy", &[0.7, 0.7]),
        ]);
        let result = AgentComparator::default()
            .compare_agents(&pop, "alpha", "beta", "accuracy")
            .unwrap();
        assert_eq!(result.p_value, Some(1.0));
        assert_eq!(result.outcome, ComparisonOutcome::Draw);
    }

    #[test]
    fn profile_labels_strengths_and_weaknesses() {
        let pop = population(&[
            ("alpha", "accuracy", &[0.95]),
            ("beta", "accuracy", &[0.5]),
            ("gamma", "accuracy", &[0.6]),
            ("alpha", "speed", &[10.0]),
            ("beta", "speed", &[90.0]),
            ("gamma", "speed", &[50.0]),
        ]);
        let profile =
            AgentComparator::default().build_agent_profile(&pop, "alpha", 1520.0);
        assert_eq!(profile.strengths, vec!["accuracy"]);
        assert_eq!(profile.weaknesses, vec!["speed"]);
        assert_eq!(profile.total_evaluations, 2);
        assert_eq!(profile.elo_rating, 1520.0);
        assert_eq!(profile.metric_percentiles.len(), 2);
    }

    #[test]
    fn compare_all_metrics_skips_missing_ones() {
        let pop = population(&[
            ("alpha", "accuracy", &[0.9]),
            ("beta", "accuracy", &[0.8]),
            ("alpha", "speed", &[10.0]),
        ]);
        let results =
            AgentComparator::default().compare_all_metrics(&pop, "alpha", "beta");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].metric_name, "accuracy");
    }
}
