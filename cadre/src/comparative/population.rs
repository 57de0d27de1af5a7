//! Population tracker: per-metric, per-agent sample storage.

use std::collections::{BTreeSet, HashMap};

use super::models::AgentScore;

/// Keeps per-metric, per-agent lists of sample values.
#[derive(Debug, Default)]
pub struct PopulationTracker {
    /// metric name → agent name → samples.
    scores: HashMap<String, HashMap<String, Vec<f64>>>,
}

impl PopulationTracker {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one sample.
    pub fn add_score(&mut self, score: &AgentScore) {
        self.scores
            .entry(score.metric_name.clone())
            .or_default()
            .entry(score.agent_name.clone())
            .or_default()
            .push(score.value);
    }

    /// Record many samples.
    pub fn add_scores(&mut self, scores: &[AgentScore]) {
        for score in scores {
            self.add_score(score);
        }
    }

    /// Mean value for one agent on one metric.
    #[must_use]
    pub fn agent_mean(&self, agent_name: &str, metric_name: &str) -> Option<f64> {
        let samples = self.samples(metric_name, agent_name)?;
        if samples.is_empty() {
            return None;
        }
        Some(samples.iter().sum::<f64>() / samples.len() as f64)
    }

    /// Raw samples for one agent on one metric.
    #[must_use]
    pub fn samples(&self, metric_name: &str, agent_name: &str) -> Option<&[f64]> {
        self.scores
            .get(metric_name)?
            .get(agent_name)
            .map(Vec::as_slice)
    }

    /// Mean per agent for one metric.
    #[must_use]
    pub fn population_means(&self, metric_name: &str) -> HashMap<String, f64> {
        self.scores
            .get(metric_name)
            .map(|agents| {
                agents
                    .iter()
                    .filter(|(_, samples)| !samples.is_empty())
                    .map(|(agent, samples)| {
                        (
                            agent.clone(),
                            samples.iter().sum::<f64>() / samples.len() as f64,
                        )
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// All tracked metric names, sorted.
    #[must_use]
    pub fn metric_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.scores.keys().cloned().collect();
        names.sort();
        names
    }

    /// All agents seen on any metric, sorted and deduplicated.
    #[must_use]
    pub fn agent_names(&self) -> Vec<String> {
        let names: BTreeSet<String> = self
            .scores
            .values()
            .flat_map(|agents| agents.keys().cloned())
            .collect();
        names.into_iter().collect()
    }

    /// Number of distinct agents.
    #[must_use]
    pub fn population_size(&self) -> usize {
        self.agent_names().len()
    }

    /// Total samples recorded for one agent across all metrics.
    #[must_use]
    pub fn agent_sample_count(&self, agent_name: &str) -> usize {
        self.scores
            .values()
            .filter_map(|agents| agents.get(agent_name))
            .map(Vec::len)
            .sum()
    }
}
