//! Model configuration: capital structure, timeline, stochastic inputs and policy thresholds

mod triangular;
pub mod loader;

pub use triangular::Triangular;
pub use loader::{load_config, ConfigLoadError, DEFAULT_CONFIG_PATH};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of calendar months averaged when valuing the asset from NOI
pub const TRAILING_NOI_MONTHS: usize = 3;

/// Latest month a scenario may reach, delay included
pub const MAX_HORIZON_MONTHS: u32 = 1_200;

/// Invalid model configuration, detected before any scenario runs
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("distribution `{name}` must be finite with min <= mode <= max (got {min}, {mode}, {max})")]
    InvalidDistribution {
        name: &'static str,
        min: f64,
        mode: f64,
        max: f64,
    },

    #[error(
        "milestones must be strictly increasing (construction end {construction_end}, \
         refinancing {refinancing}, opening {opening}, exit {exit})"
    )]
    NonIncreasingMilestones {
        construction_end: u32,
        refinancing: u32,
        opening: u32,
        exit: u32,
    },

    #[error("`{field}` must be positive (got {value})")]
    NonPositiveCapital { field: &'static str, value: f64 },

    #[error("refinancing LTV range [{min}, {max}] lies outside the bank policy band [{band_min}, {band_max}]")]
    LtvOutsidePolicyBand {
        min: f64,
        max: f64,
        band_min: f64,
        band_max: f64,
    },

    #[error("`{field}` = {value} is out of range: {reason}")]
    InvalidParameter {
        field: &'static str,
        value: f64,
        reason: &'static str,
    },
}

/// Sponsor equity, senior debt and fixed running costs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapitalStructure {
    /// Equity contributed at month 0, held as the project's cash reserve
    pub initial_equity: f64,

    /// Senior PF loan principal drawn at month 0
    pub initial_debt: f64,

    /// Fixed cost paid in cash every month regardless of phase
    pub monthly_operating_cost: f64,

    /// Contingent sponsor equity available only at the refinancing gate
    pub sponsor_standby_equity: f64,
}

impl Default for CapitalStructure {
    fn default() -> Self {
        Self {
            initial_equity: 4_900_000_000.0,
            initial_debt: 19_000_000_000.0,
            monthly_operating_cost: 80_000_000.0,
            sponsor_standby_equity: 1_000_000_000.0,
        }
    }
}

/// Project timeline before any construction delay is applied (month indices)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Milestones {
    pub construction_end_month: u32,
    pub refinancing_month: u32,
    /// Opening of the demand driver (court complex) that lifts revenue
    pub opening_month: u32,
    pub exit_month: u32,
}

impl Default for Milestones {
    fn default() -> Self {
        Self {
            construction_end_month: 12,
            refinancing_month: 24,
            opening_month: 36,
            exit_month: 60,
        }
    }
}

impl Milestones {
    /// Every milestone pushed back by the realized construction delay
    pub fn shifted(&self, delay_months: u32) -> Self {
        Self {
            construction_end_month: self.construction_end_month.saturating_add(delay_months),
            refinancing_month: self.refinancing_month.saturating_add(delay_months),
            opening_month: self.opening_month.saturating_add(delay_months),
            exit_month: self.exit_month.saturating_add(delay_months),
        }
    }

    fn is_strictly_increasing(&self) -> bool {
        self.construction_end_month < self.refinancing_month
            && self.refinancing_month < self.opening_month
            && self.opening_month < self.exit_month
    }
}

/// Triangular distributions for the six per-scenario stochastic inputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Distributions {
    /// Annual rate on the PF loan up to and including the refinancing gate
    pub pre_refi_rate: Triangular,
    /// Annual rate on the refinanced loan
    pub post_refi_rate: Triangular,
    /// Monthly NOI once stabilized (also the lease-up ramp target)
    pub stabilization_revenue: Triangular,
    /// Monthly NOI after the demand driver opens
    pub post_opening_revenue: Triangular,
    /// Construction delay in months
    pub construction_delay: Triangular,
    /// Maximum LTV the refinancing lender accepts
    pub refinancing_ltv: Triangular,
}

impl Default for Distributions {
    fn default() -> Self {
        Self {
            pre_refi_rate: Triangular::new(0.09, 0.14, 0.16),
            post_refi_rate: Triangular::new(0.055, 0.065, 0.08),
            stabilization_revenue: Triangular::new(110_000_000.0, 140_000_000.0, 180_000_000.0),
            post_opening_revenue: Triangular::new(200_000_000.0, 240_000_000.0, 300_000_000.0),
            construction_delay: Triangular::new(0.0, 2.0, 8.0),
            refinancing_ltv: Triangular::new(0.70, 0.80, 0.85),
        }
    }
}

/// LTV range the bank's credit policy allows for the refinancing loan
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LtvBand {
    pub min: f64,
    pub max: f64,
}

impl Default for LtvBand {
    fn default() -> Self {
        Self { min: 0.70, max: 0.85 }
    }
}

/// Complete, immutable parameter set for one project
///
/// Build it with struct literals or [`ModelConfig::default`] and call
/// [`ModelConfig::validate`] (or `Engine::build`, which does) before simulating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub capital: CapitalStructure,
    pub milestones: Milestones,
    pub distributions: Distributions,
    pub bank_ltv_band: LtvBand,

    /// Cap rate converting annualized trailing NOI into a valuation
    pub cap_rate: f64,

    /// Share of monthly interest capitalized during the critical window
    pub critical_window_capitalization: f64,

    /// Committed anchor-tenant NOI from the first month after completion
    pub anchor_noi: f64,

    /// Months for incremental lease-up to reach the stabilization revenue level
    pub lease_up_months: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            capital: CapitalStructure::default(),
            milestones: Milestones::default(),
            distributions: Distributions::default(),
            bank_ltv_band: LtvBand::default(),
            cap_rate: 0.055,
            critical_window_capitalization: 0.40,
            anchor_noi: 60_000_000.0,
            lease_up_months: 12,
        }
    }
}

impl ModelConfig {
    /// Check every structural invariant of the configuration
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let capital = &self.capital;
        positive("initial_equity", capital.initial_equity)?;
        positive("initial_debt", capital.initial_debt)?;
        positive("monthly_operating_cost", capital.monthly_operating_cost)?;
        if !(capital.sponsor_standby_equity >= 0.0) || !capital.sponsor_standby_equity.is_finite() {
            return Err(ConfigurationError::InvalidParameter {
                field: "sponsor_standby_equity",
                value: capital.sponsor_standby_equity,
                reason: "must be a finite, non-negative amount",
            });
        }

        let m = &self.milestones;
        if !m.is_strictly_increasing() {
            return Err(ConfigurationError::NonIncreasingMilestones {
                construction_end: m.construction_end_month,
                refinancing: m.refinancing_month,
                opening: m.opening_month,
                exit: m.exit_month,
            });
        }
        if m.exit_month > MAX_HORIZON_MONTHS {
            return Err(ConfigurationError::InvalidParameter {
                field: "exit_month",
                value: f64::from(m.exit_month),
                reason: "exit lies beyond the simulation horizon",
            });
        }

        let d = &self.distributions;
        for (name, dist) in [
            ("pre_refi_rate", &d.pre_refi_rate),
            ("post_refi_rate", &d.post_refi_rate),
            ("stabilization_revenue", &d.stabilization_revenue),
            ("post_opening_revenue", &d.post_opening_revenue),
            ("construction_delay", &d.construction_delay),
            ("refinancing_ltv", &d.refinancing_ltv),
        ] {
            dist.validate(name)?;
            if dist.min < 0.0 {
                return Err(ConfigurationError::InvalidParameter {
                    field: name,
                    value: dist.min,
                    reason: "lower bound must not be negative",
                });
            }
        }

        let delay = &d.construction_delay;
        if f64::from(m.exit_month) + delay.max.round() > f64::from(MAX_HORIZON_MONTHS) {
            return Err(ConfigurationError::InvalidParameter {
                field: "construction_delay",
                value: delay.max,
                reason: "longest delay pushes the exit beyond the simulation horizon",
            });
        }

        let band = &self.bank_ltv_band;
        if !(band.min > 0.0 && band.min <= band.max && band.max <= 1.0) {
            return Err(ConfigurationError::InvalidParameter {
                field: "bank_ltv_band",
                value: band.max,
                reason: "band must satisfy 0 < min <= max <= 1",
            });
        }
        if d.refinancing_ltv.min < band.min || d.refinancing_ltv.max > band.max {
            return Err(ConfigurationError::LtvOutsidePolicyBand {
                min: d.refinancing_ltv.min,
                max: d.refinancing_ltv.max,
                band_min: band.min,
                band_max: band.max,
            });
        }

        if !(self.cap_rate > 0.0) || !self.cap_rate.is_finite() {
            return Err(ConfigurationError::InvalidParameter {
                field: "cap_rate",
                value: self.cap_rate,
                reason: "must be a finite, positive rate",
            });
        }
        if !(0.0..=1.0).contains(&self.critical_window_capitalization) {
            return Err(ConfigurationError::InvalidParameter {
                field: "critical_window_capitalization",
                value: self.critical_window_capitalization,
                reason: "must be a fraction in [0, 1]",
            });
        }
        if !(self.anchor_noi >= 0.0) || !self.anchor_noi.is_finite() {
            return Err(ConfigurationError::InvalidParameter {
                field: "anchor_noi",
                value: self.anchor_noi,
                reason: "must be a finite, non-negative amount",
            });
        }
        if self.lease_up_months == 0 {
            return Err(ConfigurationError::InvalidParameter {
                field: "lease_up_months",
                value: 0.0,
                reason: "lease-up needs at least one month",
            });
        }

        Ok(())
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigurationError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigurationError::NonPositiveCapital { field, value })
    }
}
