//! Batch runner: validated engine façade over sampler, simulator, classifier and aggregation
//!
//! Holds the validated configuration once, then runs any number of batches.
//! Each scenario depends only on (base seed, ordinal) and the shared config,
//! so scenarios run in parallel and the batch does not depend on thread count.

use std::num::NonZeroUsize;
use std::time::Instant;

use log::{debug, info};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::aggregation::{aggregate, AggregationConfig, BatchSummary};
use crate::config::{ConfigurationError, ModelConfig};
use crate::outcome::{classify, OutcomeKind, ScenarioResult, ScenarioRow};
use crate::sampler::{ScenarioParameters, ScenarioSampler, StreamHandle};
use crate::simulation::{CashFlowSimulator, Simulation, SimulationOptions};

/// Validated simulation engine
///
/// # Example
/// ```ignore
/// let engine = Engine::build(ModelConfig::default())?;
/// let batch = engine.run(NonZeroUsize::new(10_000).unwrap(), Some(42));
/// println!("P(default) = {:.3}", batch.summary().probability(OutcomeKind::Default));
/// ```
#[derive(Debug, Clone)]
pub struct Engine {
    config: ModelConfig,
    aggregation: AggregationConfig,
}

/// Results of one batch run; immutable once built
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationBatch {
    base_seed: u64,
    results: Vec<ScenarioResult>,
    summary: BatchSummary,
}

/// Full diagnostic record of a single scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioTrace {
    pub handle: StreamHandle,
    pub params: ScenarioParameters,
    pub simulation: Simulation,
    pub result: ScenarioResult,
}

impl Engine {
    /// Validate `config` and build an engine around it
    pub fn build(config: ModelConfig) -> Result<Self, ConfigurationError> {
        config.validate()?;
        Ok(Self {
            config,
            aggregation: AggregationConfig::default(),
        })
    }

    /// Replace the aggregation settings (IRR percentiles, VaR confidence)
    pub fn with_aggregation(mut self, aggregation: AggregationConfig) -> Self {
        self.aggregation = aggregation;
        self
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn aggregation(&self) -> &AggregationConfig {
        &self.aggregation
    }

    /// Run `scenario_count` scenarios in parallel
    ///
    /// Without a seed a random base seed is drawn; it is recorded in the batch so
    /// the run can be reproduced.
    pub fn run(&self, scenario_count: NonZeroUsize, seed: Option<u64>) -> SimulationBatch {
        let base_seed = seed.unwrap_or_else(rand::random);
        let n = scenario_count.get() as u64;
        info!("Running {} scenarios (base seed {})", n, base_seed);
        let start = Instant::now();

        let results: Vec<ScenarioResult> = (0..n)
            .into_par_iter()
            .map(|ordinal| self.simulate_scenario(StreamHandle::new(base_seed, ordinal)))
            .collect();

        debug!("Simulated {} scenarios in {:?}", n, start.elapsed());
        self.finish(base_seed, results)
    }

    /// Same as [`Engine::run`] on the calling thread only
    pub fn run_sequential(&self, scenario_count: NonZeroUsize, seed: Option<u64>) -> SimulationBatch {
        let base_seed = seed.unwrap_or_else(rand::random);
        let results = (0..scenario_count.get() as u64)
            .map(|ordinal| self.simulate_scenario(StreamHandle::new(base_seed, ordinal)))
            .collect();
        self.finish(base_seed, results)
    }

    fn finish(&self, base_seed: u64, results: Vec<ScenarioResult>) -> SimulationBatch {
        // Aggregated in ordinal order so floating-point sums are reproducible
        let summary = aggregate(&results, &self.aggregation);
        info!(
            "Batch complete: P(default) = {:.4}, P(refi failure) = {:.4}, P(exit) = {:.4}",
            summary.probability(OutcomeKind::Default),
            summary.probability(OutcomeKind::RefiFailure),
            summary.probability(OutcomeKind::SuccessfulExit),
        );
        SimulationBatch {
            base_seed,
            results,
            summary,
        }
    }

    /// Sample, simulate and classify one scenario without keeping its trace
    pub fn simulate_scenario(&self, handle: StreamHandle) -> ScenarioResult {
        let params = ScenarioSampler::new(&self.config).draw(handle);
        let simulation = CashFlowSimulator::new(&self.config).simulate(&params);
        classify(handle.ordinal, &params, &simulation.terminal)
    }

    /// Re-run one scenario of a batch with its full monthly trace
    pub fn trace_scenario(&self, base_seed: u64, ordinal: u64) -> ScenarioTrace {
        let handle = StreamHandle::new(base_seed, ordinal);
        let params = ScenarioSampler::new(&self.config).draw(handle);
        let simulation = CashFlowSimulator::with_options(
            &self.config,
            SimulationOptions { record_trace: true },
        )
        .simulate(&params);
        let result = classify(ordinal, &params, &simulation.terminal);

        ScenarioTrace {
            handle,
            params,
            simulation,
            result,
        }
    }
}

impl SimulationBatch {
    pub fn base_seed(&self) -> u64 {
        self.base_seed
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn results(&self) -> &[ScenarioResult] {
        &self.results
    }

    /// One export row per scenario, in ordinal order
    pub fn rows(&self) -> impl Iterator<Item = ScenarioRow> + '_ {
        self.results.iter().map(ScenarioResult::row)
    }

    pub fn summary(&self) -> &BatchSummary {
        &self.summary
    }
}
