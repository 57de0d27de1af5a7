//! Percentile ranking within a population.

use std::collections::HashMap;

/// For each agent, the percentage of *other* agents whose value is strictly
/// less than its own, scaled to [0, 100]. The strictly highest agent gets
/// 100; a population of one gets 100.
#[must_use]
pub fn compute_percentile_ranks(values: &HashMap<String, f64>) -> HashMap<String, f64> {
    let n = values.len();
    if n == 0 {
        return HashMap::new();
    }
    if n == 1 {
        return values.keys().map(|k| (k.clone(), 100.0)).collect();
    }

    values
        .iter()
        .map(|(agent, &value)| {
            let below = values.values().filter(|&&other| other < value).count();
            let rank = below as f64 / (n - 1) as f64 * 100.0;
            (agent.clone(), rank)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(entries: &[(&str, f64)]) -> HashMap<String, f64> {
        entries
            .iter()
            .map(|(name, v)| ((*name).to_string(), *v))
            .collect()
    }

    #[test]
    fn highest_agent_gets_100_lowest_gets_0() {
        let ranks = compute_percentile_ranks(&values(&[
            ("low", 1.0),
            ("mid", 2.0),
            ("high", 3.0),
        ]));
        assert_eq!(ranks["high"], 100.0);
        assert_eq!(ranks["mid"], 50.0);
        assert_eq!(ranks["low"], 0.0);
    }

    #[test]
    fn ranks_stay_in_range() {
        let ranks = compute_percentile_ranks(&values(&[
            ("a", 10.0),
            ("b", -5.0),
            ("c", 0.0),
            ("d", 7.5),
        ]));
        for rank in ranks.values() {
            assert!((0.0..=100.0).contains(rank));
        }
    }

    #[test]
    fn ties_share_the_same_rank() {
        let ranks = compute_percentile_ranks(&values(&[
            ("a", 5.0),
            ("b", 5.0),
            ("c", 1.0),
        ]));
        assert_eq!(ranks["a"], ranks["b"]);
        assert_eq!(ranks["c"], 0.0);
    }

    #[test]
    fn degenerate_populations() {
        assert!(compute_percentile_ranks(&HashMap::new()).is_empty());
        let single = compute_percentile_ranks(&values(&[("only", 42.0)]));
        assert_eq!(single["only"], 100.0);
    }
}
