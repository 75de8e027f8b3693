//! Running financial state of one scenario

use crate::config::CapitalStructure;

/// Balances carried from one month to the next
#[derive(Debug, Clone)]
pub struct SimulationState {
    /// Current month (0-indexed, month 0 is financial close)
    pub month: u32,

    /// Outstanding loan principal including capitalized interest
    pub debt: f64,

    /// Equity cash reserve
    pub cash_reserve: f64,

    /// Whether the refinancing gate has been passed
    pub refinanced: bool,

    /// NOI of every simulated month, oldest first
    pub noi_history: Vec<f64>,

    /// Valuation computed at the refinancing gate
    pub gate_valuation: Option<f64>,

    /// Fresh sponsor equity injected at the refinancing gate
    pub sponsor_injection: f64,
}

impl SimulationState {
    /// Initialize state at financial close
    pub fn at_close(capital: &CapitalStructure, horizon_months: u32) -> Self {
        Self {
            month: 0,
            debt: capital.initial_debt,
            cash_reserve: capital.initial_equity,
            refinanced: false,
            noi_history: Vec::with_capacity(horizon_months as usize + 1),
            gate_valuation: None,
            sponsor_injection: 0.0,
        }
    }

    /// Equity that could be drawn right now to pay down debt
    pub fn equity_buffer(&self, capital: &CapitalStructure) -> f64 {
        self.cash_reserve.max(0.0) + capital.sponsor_standby_equity
    }

    /// Equity left for the sponsor if the asset were sold at `valuation`
    pub fn residual_equity(&self, valuation: f64) -> f64 {
        (valuation - self.debt + self.cash_reserve).max(0.0)
    }
}
