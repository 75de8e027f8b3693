//! Reduction of scenario outcomes into population-level risk statistics
//!
//! Counts and sums are gathered in an [`OutcomeAccumulator`], which can be fed
//! scenario by scenario and merged with accumulators from other batches in any
//! order. Percentile-based figures (IRR distribution, VaR) need the complete
//! sample and are only computed in [`OutcomeAccumulator::finish`].

mod stats;

pub use stats::{mean, percentile, sorted};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::outcome::{IrrEstimate, OutcomeKind, ScenarioResult};

/// Which statistics to report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    /// Percentiles of the IRR distribution, as fractions in [0, 1]
    pub irr_percentiles: Vec<f64>,

    /// Confidence level of the loss VaR
    pub var_confidence: f64,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            irr_percentiles: vec![0.05, 0.25, 0.50, 0.75, 0.95],
            var_confidence: 0.95,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeStats {
    pub kind: OutcomeKind,
    pub count: usize,
    pub probability: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PercentileValue {
    pub percentile: f64,
    pub value: f64,
}

/// Equity IRR distribution over successful exits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrrStatistics {
    /// Exits with a converged IRR
    pub count: usize,
    pub non_convergent: usize,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub percentiles: Vec<PercentileValue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthCount {
    pub month: u32,
    pub count: usize,
}

/// When the equity reserve ran out, over scenarios that defaulted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunwayStatistics {
    pub default_months: Vec<MonthCount>,
    pub mean_default_month: Option<f64>,
}

/// Aggregated risk metrics of a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub scenario_count: usize,
    pub outcomes: Vec<OutcomeStats>,
    pub irr: IrrStatistics,

    /// Mean refinancing shortfall over refinancing failures
    pub expected_shortfall: Option<f64>,

    pub var_confidence: f64,
    /// Loss fraction at `var_confidence` over all scenarios
    pub value_at_risk: f64,
    /// Mean loss fraction of scenarios at or beyond the VaR
    pub conditional_value_at_risk: f64,

    /// Fraction of scenarios without default or refinancing failure at or before each month
    pub survival_curve: Vec<f64>,

    pub runway: RunwayStatistics,
}

impl BatchSummary {
    pub fn probability(&self, kind: OutcomeKind) -> f64 {
        self.outcomes
            .iter()
            .find(|o| o.kind == kind)
            .map(|o| o.probability)
            .unwrap_or(0.0)
    }

    pub fn count(&self, kind: OutcomeKind) -> usize {
        self.outcomes
            .iter()
            .find(|o| o.kind == kind)
            .map(|o| o.count)
            .unwrap_or(0)
    }
}

/// Mergeable partial aggregate of scenario outcomes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutcomeAccumulator {
    pub scenarios: usize,
    pub counts: [usize; 3],
    pub shortfall_sum: f64,
    pub irr_non_convergent: usize,
    /// Month of every default or refinancing failure
    pub failures_by_month: BTreeMap<u32, usize>,
    pub defaults_by_month: BTreeMap<u32, usize>,
    /// Latest outcome month seen
    pub horizon: u32,
    irr_samples: Vec<f64>,
    losses: Vec<f64>,
}

impl OutcomeAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, result: &ScenarioResult) {
        self.scenarios += 1;
        self.counts[result.outcome.index()] += 1;
        self.horizon = self.horizon.max(result.outcome_month);
        self.losses.push(result.loss_fraction);

        match result.outcome {
            OutcomeKind::Default => {
                *self.defaults_by_month.entry(result.outcome_month).or_default() += 1;
                *self.failures_by_month.entry(result.outcome_month).or_default() += 1;
            }
            OutcomeKind::RefiFailure => {
                self.shortfall_sum += result.shortfall.unwrap_or(0.0);
                *self.failures_by_month.entry(result.outcome_month).or_default() += 1;
            }
            OutcomeKind::SuccessfulExit => match result.irr {
                Some(IrrEstimate::Converged(irr)) => self.irr_samples.push(irr),
                Some(IrrEstimate::NonConvergent) | None => self.irr_non_convergent += 1,
            },
        }
    }

    /// Combine two partial aggregates
    pub fn merge(mut self, other: Self) -> Self {
        self.scenarios += other.scenarios;
        for (count, add) in self.counts.iter_mut().zip(other.counts) {
            *count += add;
        }
        self.shortfall_sum += other.shortfall_sum;
        self.irr_non_convergent += other.irr_non_convergent;
        for (month, count) in other.failures_by_month {
            *self.failures_by_month.entry(month).or_default() += count;
        }
        for (month, count) in other.defaults_by_month {
            *self.defaults_by_month.entry(month).or_default() += count;
        }
        self.horizon = self.horizon.max(other.horizon);
        self.irr_samples.extend(other.irr_samples);
        self.losses.extend(other.losses);
        self
    }

    /// Compute the summary once every scenario has been pushed or merged in
    pub fn finish(self, config: &AggregationConfig) -> BatchSummary {
        let n = self.scenarios;
        let share = |count: usize| if n == 0 { 0.0 } else { count as f64 / n as f64 };

        let outcomes = OutcomeKind::ALL
            .iter()
            .map(|&kind| {
                let count = self.counts[kind.index()];
                OutcomeStats { kind, count, probability: share(count) }
            })
            .collect();

        let irr_sorted = sorted(&self.irr_samples);
        let irr = IrrStatistics {
            count: irr_sorted.len(),
            non_convergent: self.irr_non_convergent,
            mean: mean(&irr_sorted),
            median: percentile(&irr_sorted, 0.5),
            percentiles: config
                .irr_percentiles
                .iter()
                .filter_map(|&p| {
                    percentile(&irr_sorted, p).map(|value| PercentileValue { percentile: p, value })
                })
                .collect(),
        };

        let refi_failures = self.counts[OutcomeKind::RefiFailure.index()];
        let expected_shortfall = if refi_failures > 0 {
            Some(self.shortfall_sum / refi_failures as f64)
        } else {
            None
        };

        let losses = sorted(&self.losses);
        let value_at_risk = percentile(&losses, config.var_confidence).unwrap_or(0.0);
        let tail: Vec<f64> = losses.iter().copied().filter(|&l| l >= value_at_risk).collect();
        let conditional_value_at_risk = mean(&tail).unwrap_or(0.0);

        let mut survival_curve = Vec::with_capacity(self.horizon as usize + 1);
        let mut failed = 0;
        for month in 0..=self.horizon {
            failed += self.failures_by_month.get(&month).copied().unwrap_or(0);
            survival_curve.push(1.0 - share(failed));
        }

        let defaults = self.counts[OutcomeKind::Default.index()];
        let mean_default_month = if defaults > 0 {
            let total: u64 = self
                .defaults_by_month
                .iter()
                .map(|(&month, &count)| month as u64 * count as u64)
                .sum();
            Some(total as f64 / defaults as f64)
        } else {
            None
        };
        let runway = RunwayStatistics {
            default_months: self
                .defaults_by_month
                .iter()
                .map(|(&month, &count)| MonthCount { month, count })
                .collect(),
            mean_default_month,
        };

        BatchSummary {
            scenario_count: n,
            outcomes,
            irr,
            expected_shortfall,
            var_confidence: config.var_confidence,
            value_at_risk,
            conditional_value_at_risk,
            survival_curve,
            runway,
        }
    }
}

/// Reduce scenario outcomes, in the given order, into a batch summary
pub fn aggregate(results: &[ScenarioResult], config: &AggregationConfig) -> BatchSummary {
    let mut acc = OutcomeAccumulator::new();
    for result in results {
        acc.push(result);
    }
    acc.finish(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::ScenarioParameters;
    use approx::assert_relative_eq;

    fn result(scenario: u64, outcome: OutcomeKind, month: u32) -> ScenarioResult {
        let (irr, shortfall, loss) = match outcome {
            OutcomeKind::Default => (None, None, 1.0),
            OutcomeKind::RefiFailure => (None, Some(100.0 * (scenario + 1) as f64), 1.0),
            OutcomeKind::SuccessfulExit => (
                Some(IrrEstimate::Converged(0.01 * scenario as f64)),
                None,
                0.0,
            ),
        };
        ScenarioResult {
            scenario,
            params: ScenarioParameters {
                pre_refi_rate: 0.14,
                post_refi_rate: 0.065,
                stabilization_revenue: 1.4e8,
                post_opening_revenue: 2.4e8,
                construction_delay: 0.0,
                refinancing_ltv: 0.8,
            },
            outcome,
            outcome_month: month,
            irr,
            shortfall,
            gate_valuation: None,
            loss_fraction: loss,
        }
    }

    fn sample() -> Vec<ScenarioResult> {
        vec![
            result(0, OutcomeKind::Default, 18),
            result(1, OutcomeKind::RefiFailure, 24),
            result(2, OutcomeKind::SuccessfulExit, 60),
            result(3, OutcomeKind::SuccessfulExit, 60),
            result(4, OutcomeKind::Default, 20),
            result(5, OutcomeKind::RefiFailure, 24),
            result(6, OutcomeKind::SuccessfulExit, 60),
            result(7, OutcomeKind::SuccessfulExit, 60),
        ]
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let summary = aggregate(&sample(), &AggregationConfig::default());

        assert_eq!(summary.scenario_count, 8);
        assert_relative_eq!(summary.probability(OutcomeKind::Default), 0.25);
        assert_relative_eq!(summary.probability(OutcomeKind::RefiFailure), 0.25);
        assert_relative_eq!(summary.probability(OutcomeKind::SuccessfulExit), 0.5);
        let total: f64 = summary.outcomes.iter().map(|o| o.probability).sum();
        assert_relative_eq!(total, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_expected_shortfall_and_irr() {
        let summary = aggregate(&sample(), &AggregationConfig::default());

        // Shortfalls of 200 and 600
        assert_eq!(summary.expected_shortfall, Some(400.0));

        // IRRs 0.02, 0.03, 0.06, 0.07
        assert_eq!(summary.irr.count, 4);
        assert_relative_eq!(summary.irr.median.unwrap(), 0.045, epsilon = 1e-12);
        assert_relative_eq!(summary.irr.mean.unwrap(), 0.045, epsilon = 1e-12);
        assert_eq!(summary.irr.percentiles.len(), 5);
    }

    #[test]
    fn test_value_at_risk() {
        let summary = aggregate(&sample(), &AggregationConfig::default());

        // Half the scenarios lose everything
        assert_eq!(summary.value_at_risk, 1.0);
        assert_eq!(summary.conditional_value_at_risk, 1.0);

        let mostly_exits: Vec<_> = (0..20)
            .map(|i| result(i, if i == 0 { OutcomeKind::Default } else { OutcomeKind::SuccessfulExit }, 60))
            .collect();
        let summary = aggregate(&mostly_exits, &AggregationConfig::default());
        // 95th percentile of 19 zeros and one 1.0 interpolates at rank 18.05
        assert_relative_eq!(summary.value_at_risk, 0.05, epsilon = 1e-12);
        assert_eq!(summary.conditional_value_at_risk, 1.0);
    }

    #[test]
    fn test_survival_curve() {
        let summary = aggregate(&sample(), &AggregationConfig::default());

        assert_eq!(summary.survival_curve.len(), 61);
        assert_eq!(summary.survival_curve[17], 1.0);
        assert_relative_eq!(summary.survival_curve[18], 7.0 / 8.0);
        assert_relative_eq!(summary.survival_curve[20], 6.0 / 8.0);
        assert_relative_eq!(summary.survival_curve[24], 4.0 / 8.0);
        assert_relative_eq!(summary.survival_curve[60], 4.0 / 8.0);
        for pair in summary.survival_curve.windows(2) {
            assert!(pair[1] <= pair[0]);
        }
    }

    #[test]
    fn test_runway_statistics() {
        let summary = aggregate(&sample(), &AggregationConfig::default());

        assert_eq!(
            summary.runway.default_months,
            vec![MonthCount { month: 18, count: 1 }, MonthCount { month: 20, count: 1 }]
        );
        assert_eq!(summary.runway.mean_default_month, Some(19.0));
    }

    #[test]
    fn test_merge_matches_sequential() {
        let results = sample();
        let config = AggregationConfig::default();

        let mut left = OutcomeAccumulator::new();
        let mut right = OutcomeAccumulator::new();
        for r in &results[..3] {
            left.push(r);
        }
        for r in &results[3..] {
            right.push(r);
        }

        let merged = right.clone().merge(left.clone()).finish(&config);
        let merged_other_way = left.merge(right).finish(&config);
        let sequential = aggregate(&results, &config);

        assert_eq!(merged.outcomes, sequential.outcomes);
        assert_eq!(merged.survival_curve, sequential.survival_curve);
        assert_eq!(merged.expected_shortfall, sequential.expected_shortfall);
        assert_eq!(merged.irr.median, sequential.irr.median);
        assert_eq!(merged.value_at_risk, merged_other_way.value_at_risk);
    }

    #[test]
    fn test_non_convergent_exits_are_counted_apart() {
        let mut results = sample();
        results[2].irr = Some(IrrEstimate::NonConvergent);

        let summary = aggregate(&results, &AggregationConfig::default());
        assert_eq!(summary.irr.count, 3);
        assert_eq!(summary.irr.non_convergent, 1);
        assert_eq!(summary.count(OutcomeKind::SuccessfulExit), 4);
    }

    #[test]
    fn test_empty_batch() {
        let summary = aggregate(&[], &AggregationConfig::default());
        assert_eq!(summary.scenario_count, 0);
        assert!(summary.irr.median.is_none());
        assert!(summary.expected_shortfall.is_none());
        assert_eq!(summary.survival_curve, vec![1.0]);
    }
}
