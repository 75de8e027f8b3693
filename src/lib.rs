//! PF Liquidity Risk - Monte Carlo cash-flow engine for leveraged real-estate project finance
//!
//! This library provides:
//! - Validated model configuration with triangular input distributions
//! - Reproducible per-scenario sampling from (base seed, scenario ordinal)
//! - Monthly simulation through construction, the refinancing gate and operation
//! - Outcome classification (default, refinancing failure, exit with equity IRR)
//! - Batch aggregation: outcome probabilities, IRR distribution, VaR, Expected Shortfall,
//!   survival curve and equity runway

pub mod config;
pub mod sampler;
pub mod simulation;
pub mod outcome;
pub mod aggregation;
pub mod runner;
pub mod cache;

// Re-export commonly used types
pub use config::{ConfigurationError, ModelConfig, Triangular};
pub use sampler::{ScenarioParameters, ScenarioSampler, StreamHandle};
pub use simulation::{CashFlowSimulator, MonthlyState, Phase, Simulation, Terminal};
pub use outcome::{classify, IrrEstimate, OutcomeKind, ScenarioResult, ScenarioRow};
pub use aggregation::{aggregate, AggregationConfig, BatchSummary, OutcomeAccumulator};
pub use runner::{Engine, ScenarioTrace, SimulationBatch};
pub use cache::{BatchCache, CacheKey};
