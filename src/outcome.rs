//! Classification of a scenario's terminal state into an outcome record

use log::trace;
use serde::{Deserialize, Serialize};

use crate::sampler::ScenarioParameters;
use crate::simulation::{calculate_irr, Terminal};

/// Terminal outcome of a scenario; exactly one per scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeKind {
    Default,
    RefiFailure,
    SuccessfulExit,
}

impl OutcomeKind {
    pub const ALL: [OutcomeKind; 3] = [
        OutcomeKind::Default,
        OutcomeKind::RefiFailure,
        OutcomeKind::SuccessfulExit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeKind::Default => "DEFAULT",
            OutcomeKind::RefiFailure => "REFI_FAILURE",
            OutcomeKind::SuccessfulExit => "SUCCESSFUL_EXIT",
        }
    }

    /// Position in [`OutcomeKind::ALL`]
    pub fn index(&self) -> usize {
        match self {
            OutcomeKind::Default => 0,
            OutcomeKind::RefiFailure => 1,
            OutcomeKind::SuccessfulExit => 2,
        }
    }
}

impl std::fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Equity IRR of a successful exit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IrrEstimate {
    /// Annualized IRR
    Converged(f64),
    /// Root-finder found no rate with NPV = 0
    NonConvergent,
}

impl IrrEstimate {
    pub fn value(&self) -> Option<f64> {
        match self {
            IrrEstimate::Converged(irr) => Some(*irr),
            IrrEstimate::NonConvergent => None,
        }
    }
}

/// Terminal record of one scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioResult {
    /// Scenario ordinal within its batch
    pub scenario: u64,
    pub params: ScenarioParameters,
    pub outcome: OutcomeKind,
    pub outcome_month: u32,

    /// Present only for successful exits
    pub irr: Option<IrrEstimate>,

    /// Debt above the refinancing ceiling; present only for refinancing failures
    pub shortfall: Option<f64>,

    /// Valuation computed at the refinancing gate, if the gate was reached
    pub gate_valuation: Option<f64>,

    /// Share of contributed equity lost (1.0 for default and refinancing failure)
    pub loss_fraction: f64,
}

/// Flat row of a scenario: sampled inputs and outcome, used for export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioRow {
    pub scenario: u64,
    pub pre_refi_rate: f64,
    pub post_refi_rate: f64,
    pub stabilization_revenue: f64,
    pub post_opening_revenue: f64,
    pub construction_delay: f64,
    pub refinancing_ltv: f64,
    pub outcome: OutcomeKind,
    pub outcome_month: u32,
    pub irr: Option<f64>,
    pub irr_non_convergent: bool,
    pub shortfall: Option<f64>,
}

impl ScenarioResult {
    pub fn row(&self) -> ScenarioRow {
        let p = &self.params;
        ScenarioRow {
            scenario: self.scenario,
            pre_refi_rate: p.pre_refi_rate,
            post_refi_rate: p.post_refi_rate,
            stabilization_revenue: p.stabilization_revenue,
            post_opening_revenue: p.post_opening_revenue,
            construction_delay: p.construction_delay,
            refinancing_ltv: p.refinancing_ltv,
            outcome: self.outcome,
            outcome_month: self.outcome_month,
            irr: self.irr.and_then(|irr| irr.value()),
            irr_non_convergent: matches!(self.irr, Some(IrrEstimate::NonConvergent)),
            shortfall: self.shortfall,
        }
    }

    /// Whether the scenario ended in default or refinancing failure
    pub fn is_failure(&self) -> bool {
        self.outcome != OutcomeKind::SuccessfulExit
    }
}

/// Derive the scenario's outcome record from the simulator's terminal state
pub fn classify(scenario: u64, params: &ScenarioParameters, terminal: &Terminal) -> ScenarioResult {
    let (outcome, irr, shortfall, loss_fraction) = match terminal {
        Terminal::Default { .. } => (OutcomeKind::Default, None, None, 1.0),
        Terminal::RefinancingFailure { shortfall, .. } => {
            (OutcomeKind::RefiFailure, None, Some(shortfall.max(0.0)), 1.0)
        }
        Terminal::Exit { equity_flows, .. } => {
            let (contributed, distributed) = equity_totals(equity_flows);
            let irr = if distributed <= 0.0 {
                // Wiped out at sale: the limit of the IRR is -100%
                IrrEstimate::Converged(-1.0)
            } else {
                match calculate_irr(equity_flows, 12) {
                    Some(irr) => IrrEstimate::Converged(irr),
                    None => {
                        trace!("Scenario {}: IRR did not converge", scenario);
                        IrrEstimate::NonConvergent
                    }
                }
            };
            let loss = if contributed > 0.0 {
                (1.0 - distributed / contributed).max(0.0)
            } else {
                0.0
            };
            (OutcomeKind::SuccessfulExit, Some(irr), None, loss)
        }
    };

    ScenarioResult {
        scenario,
        params: *params,
        outcome,
        outcome_month: terminal.month(),
        irr,
        shortfall,
        gate_valuation: terminal.gate_valuation(),
        loss_fraction,
    }
}

/// Total equity paid in and paid out over a flow vector
fn equity_totals(flows: &[f64]) -> (f64, f64) {
    flows.iter().fold((0.0, 0.0), |(paid_in, paid_out), &cf| {
        if cf < 0.0 {
            (paid_in - cf, paid_out)
        } else {
            (paid_in, paid_out + cf)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn params() -> ScenarioParameters {
        ScenarioParameters {
            pre_refi_rate: 0.14,
            post_refi_rate: 0.065,
            stabilization_revenue: 1.4e8,
            post_opening_revenue: 2.4e8,
            construction_delay: 2.0,
            refinancing_ltv: 0.8,
        }
    }

    #[test]
    fn test_default_carries_neither_irr_nor_shortfall() {
        let terminal = Terminal::Default { month: 20, cash_reserve: -5.0, gate_valuation: None };
        let result = classify(4, &params(), &terminal);

        assert_eq!(result.outcome, OutcomeKind::Default);
        assert_eq!(result.outcome_month, 20);
        assert!(result.irr.is_none());
        assert!(result.shortfall.is_none());
        assert_eq!(result.loss_fraction, 1.0);
    }

    #[test]
    fn test_refi_failure_carries_shortfall() {
        let terminal = Terminal::RefinancingFailure {
            month: 26,
            shortfall: 1.5e9,
            gate_valuation: 2.8e10,
            debt_ceiling: 2.24e10,
        };
        let result = classify(1, &params(), &terminal);

        assert_eq!(result.outcome, OutcomeKind::RefiFailure);
        assert_eq!(result.shortfall, Some(1.5e9));
        assert_eq!(result.gate_valuation, Some(2.8e10));
        assert!(result.irr.is_none());
    }

    #[test]
    fn test_exit_irr_and_loss() {
        let mut equity_flows = vec![0.0; 36];
        equity_flows[0] = -100.0;
        equity_flows[35] = 150.0;
        let terminal = Terminal::Exit {
            month: 35,
            gate_valuation: 1_000.0,
            sale_valuation: 2_000.0,
            equity_flows,
        };
        let result = classify(0, &params(), &terminal);

        assert_eq!(result.outcome, OutcomeKind::SuccessfulExit);
        let irr = result.irr.and_then(|irr| irr.value()).unwrap();
        assert_relative_eq!(irr, 1.5_f64.powf(12.0 / 35.0) - 1.0, epsilon = 1e-8);
        assert_eq!(result.loss_fraction, 0.0);
    }

    #[test]
    fn test_partial_loss_on_exit() {
        let mut equity_flows = vec![0.0; 13];
        equity_flows[0] = -100.0;
        equity_flows[12] = 60.0;
        let terminal = Terminal::Exit { month: 12, gate_valuation: 1.0, sale_valuation: 1.0, equity_flows };
        let result = classify(0, &params(), &terminal);

        assert_relative_eq!(result.loss_fraction, 0.4, epsilon = 1e-12);
        assert!(result.irr.and_then(|irr| irr.value()).unwrap() < 0.0);
    }

    #[test]
    fn test_wiped_out_exit() {
        let mut equity_flows = vec![0.0; 13];
        equity_flows[0] = -100.0;
        let terminal = Terminal::Exit { month: 12, gate_valuation: 1.0, sale_valuation: 1.0, equity_flows };
        let result = classify(0, &params(), &terminal);

        assert_eq!(result.irr, Some(IrrEstimate::Converged(-1.0)));
        assert_eq!(result.loss_fraction, 1.0);
    }

    #[test]
    fn test_row_flattens_result() {
        let terminal = Terminal::RefinancingFailure {
            month: 26,
            shortfall: 3.0,
            gate_valuation: 10.0,
            debt_ceiling: 8.0,
        };
        let row = classify(9, &params(), &terminal).row();

        assert_eq!(row.scenario, 9);
        assert_eq!(row.outcome, OutcomeKind::RefiFailure);
        assert_eq!(row.irr, None);
        assert!(!row.irr_non_convergent);
        assert_eq!(row.shortfall, Some(3.0));
        assert_eq!(row.refinancing_ltv, 0.8);
    }

    #[test]
    fn test_outcome_kind_serializes_screaming_case() {
        let json = serde_json::to_string(&OutcomeKind::RefiFailure).unwrap();
        assert_eq!(json, "\"REFI_FAILURE\"");
        assert_eq!(OutcomeKind::SuccessfulExit.to_string(), "SUCCESSFUL_EXIT");
    }
}
