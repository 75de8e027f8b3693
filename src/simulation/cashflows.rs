//! Monthly trace rows and terminal states of a scenario simulation

use serde::{Deserialize, Serialize};

use crate::config::Milestones;

/// Lifecycle phase of the project in a given month
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Before physical completion, no revenue
    Construction,
    /// Completion through the refinancing gate, revenue ramping
    CriticalWindow,
    /// After refinancing, before the demand driver opens
    Stabilization,
    /// Demand driver open, through exit
    PostOpening,
}

impl Phase {
    /// Phase of `month` on an already delay-shifted timeline
    pub fn at(month: u32, timeline: &Milestones) -> Self {
        if month < timeline.construction_end_month {
            Phase::Construction
        } else if month <= timeline.refinancing_month {
            Phase::CriticalWindow
        } else if month < timeline.opening_month {
            Phase::Stabilization
        } else {
            Phase::PostOpening
        }
    }
}

/// A single row of simulation output for one month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyState {
    pub month: u32,
    pub phase: Phase,
    pub noi: f64,

    // Interest
    pub annual_rate: f64,
    pub interest_accrued: f64,
    pub interest_capitalized: f64,
    pub interest_paid: f64,
    pub operating_cost: f64,

    // End-of-month balances
    pub debt_balance: f64,
    pub cash_reserve: f64,
    pub refinanced: bool,
}

/// How a scenario ended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Terminal {
    /// Cash reserve could not cover the month's cash outflows
    Default {
        month: u32,
        /// Reserve after the failed month (negative)
        cash_reserve: f64,
        gate_valuation: Option<f64>,
    },

    /// Debt exceeded the refinancing ceiling by more than the equity buffer
    RefinancingFailure {
        month: u32,
        shortfall: f64,
        gate_valuation: f64,
        debt_ceiling: f64,
    },

    /// Reached the exit milestone and sold the asset
    Exit {
        month: u32,
        gate_valuation: f64,
        sale_valuation: f64,
        /// Monthly equity flows from month 0 through the exit month
        equity_flows: Vec<f64>,
    },
}

impl Terminal {
    pub fn month(&self) -> u32 {
        match self {
            Terminal::Default { month, .. }
            | Terminal::RefinancingFailure { month, .. }
            | Terminal::Exit { month, .. } => *month,
        }
    }

    pub fn gate_valuation(&self) -> Option<f64> {
        match self {
            Terminal::Default { gate_valuation, .. } => *gate_valuation,
            Terminal::RefinancingFailure { gate_valuation, .. }
            | Terminal::Exit { gate_valuation, .. } => Some(*gate_valuation),
        }
    }
}

/// Complete output of simulating one scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Simulation {
    /// Timeline after the construction delay was applied
    pub timeline: Milestones,

    /// Monthly rows (empty unless trace recording was requested)
    pub trace: Vec<MonthlyState>,

    pub terminal: Terminal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_boundaries() {
        let timeline = Milestones::default();

        assert_eq!(Phase::at(0, &timeline), Phase::Construction);
        assert_eq!(Phase::at(11, &timeline), Phase::Construction);
        assert_eq!(Phase::at(12, &timeline), Phase::CriticalWindow);
        assert_eq!(Phase::at(24, &timeline), Phase::CriticalWindow);
        assert_eq!(Phase::at(25, &timeline), Phase::Stabilization);
        assert_eq!(Phase::at(36, &timeline), Phase::PostOpening);
        assert_eq!(Phase::at(60, &timeline), Phase::PostOpening);
    }
}
