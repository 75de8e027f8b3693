//! Core monthly state machine for one scenario

use log::trace;

use crate::config::{ModelConfig, TRAILING_NOI_MONTHS};
use crate::sampler::ScenarioParameters;
use super::cashflows::{MonthlyState, Phase, Simulation, Terminal};
use super::state::SimulationState;
use super::valuation::{trailing_average, valuation};

/// Options for a simulation run
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulationOptions {
    /// Keep every monthly row instead of only the terminal state
    pub record_trace: bool,
}

/// Outcome of the refinancing gate test
enum GateResult {
    Refinanced,
    Failed { shortfall: f64, debt_ceiling: f64 },
}

/// Runs the monthly financial state machine against a shared, read-only config
#[derive(Debug, Clone, Copy)]
pub struct CashFlowSimulator<'a> {
    config: &'a ModelConfig,
    options: SimulationOptions,
}

impl<'a> CashFlowSimulator<'a> {
    pub fn new(config: &'a ModelConfig) -> Self {
        Self::with_options(config, SimulationOptions::default())
    }

    pub fn with_options(config: &'a ModelConfig, options: SimulationOptions) -> Self {
        Self { config, options }
    }

    /// Simulate months 0 through the (delay-shifted) exit month
    pub fn simulate(&self, params: &ScenarioParameters) -> Simulation {
        let capital = &self.config.capital;
        let timeline = self.config.milestones.shifted(params.delay_months());
        let mut state = SimulationState::at_close(capital, timeline.exit_month);
        let mut rows = Vec::new();

        for month in 0..=timeline.exit_month {
            state.month = month;
            let phase = Phase::at(month, &timeline);

            let annual_rate = if state.refinanced {
                params.post_refi_rate
            } else {
                params.pre_refi_rate
            };
            let interest = state.debt * annual_rate / 12.0;
            let capitalized = interest * self.capitalization_fraction(phase, state.refinanced);
            let interest_paid = interest - capitalized;
            let noi = self.noi(phase, month, timeline.construction_end_month, params);
            let operating_cost = capital.monthly_operating_cost;

            state.cash_reserve += noi - interest_paid - operating_cost;
            state.debt += capitalized;
            state.noi_history.push(noi);

            let mut row = MonthlyState {
                month,
                phase,
                noi,
                annual_rate,
                interest_accrued: interest,
                interest_capitalized: capitalized,
                interest_paid,
                operating_cost,
                debt_balance: state.debt,
                cash_reserve: state.cash_reserve,
                refinanced: state.refinanced,
            };

            if state.cash_reserve < 0.0 {
                trace!("Default in month {} (reserve {:.0})", month, state.cash_reserve);
                self.record(&mut rows, row);
                let terminal = Terminal::Default {
                    month,
                    cash_reserve: state.cash_reserve,
                    gate_valuation: state.gate_valuation,
                };
                return Simulation { timeline, trace: rows, terminal };
            }

            if month == timeline.refinancing_month {
                match self.refinancing_gate(&mut state, params) {
                    GateResult::Refinanced => {
                        row.debt_balance = state.debt;
                        row.cash_reserve = state.cash_reserve;
                        row.refinanced = true;
                    }
                    GateResult::Failed { shortfall, debt_ceiling } => {
                        self.record(&mut rows, row);
                        let terminal = Terminal::RefinancingFailure {
                            month,
                            shortfall,
                            gate_valuation: state.gate_valuation.unwrap_or(0.0),
                            debt_ceiling,
                        };
                        return Simulation { timeline, trace: rows, terminal };
                    }
                }
            }

            self.record(&mut rows, row);
        }

        let terminal = self.exit(&state, timeline.exit_month, timeline.refinancing_month);
        Simulation { timeline, trace: rows, terminal }
    }

    fn record(&self, rows: &mut Vec<MonthlyState>, row: MonthlyState) {
        if self.options.record_trace {
            rows.push(row);
        }
    }

    /// Share of the month's interest added to principal instead of paid
    fn capitalization_fraction(&self, phase: Phase, refinanced: bool) -> f64 {
        if refinanced {
            return 0.0;
        }
        match phase {
            Phase::Construction => 1.0,
            Phase::CriticalWindow => self.config.critical_window_capitalization,
            Phase::Stabilization | Phase::PostOpening => 0.0,
        }
    }

    /// Monthly NOI for the phase
    ///
    /// During the critical window the anchor tenant pays its committed rent from
    /// completion and incremental lease-up closes the gap to the stabilization
    /// level linearly over `lease_up_months`.
    fn noi(&self, phase: Phase, month: u32, completion_month: u32, params: &ScenarioParameters) -> f64 {
        match phase {
            Phase::Construction => 0.0,
            Phase::CriticalWindow => {
                let months_since_completion = (month - completion_month) as f64;
                let progress = (months_since_completion / self.config.lease_up_months as f64).min(1.0);
                let incremental = (params.stabilization_revenue - self.config.anchor_noi).max(0.0);
                self.config.anchor_noi + incremental * progress
            }
            Phase::Stabilization => params.stabilization_revenue,
            Phase::PostOpening => params.post_opening_revenue,
        }
    }

    /// Value the asset on trailing NOI and size the refinancing loan
    ///
    /// A debt exactly at the ceiling refinances. Above it, the gap is closed with
    /// sponsor standby equity first and then the cash reserve; if both together
    /// cannot cover it the refinancing fails.
    fn refinancing_gate(&self, state: &mut SimulationState, params: &ScenarioParameters) -> GateResult {
        let capital = &self.config.capital;
        let trailing_noi = trailing_average(&state.noi_history, TRAILING_NOI_MONTHS);
        let gate_valuation = valuation(trailing_noi, self.config.cap_rate);
        let debt_ceiling = gate_valuation * params.refinancing_ltv;
        state.gate_valuation = Some(gate_valuation);

        if state.debt <= debt_ceiling {
            state.refinanced = true;
            return GateResult::Refinanced;
        }

        let gap = state.debt - debt_ceiling;
        if gap > state.equity_buffer(capital) {
            trace!(
                "Refinancing failed in month {}: debt {:.0} vs ceiling {:.0}",
                state.month, state.debt, debt_ceiling
            );
            return GateResult::Failed { shortfall: gap, debt_ceiling };
        }

        let from_sponsor = gap.min(capital.sponsor_standby_equity);
        state.sponsor_injection = from_sponsor;
        state.cash_reserve -= gap - from_sponsor;
        state.debt = debt_ceiling;
        state.refinanced = true;
        trace!(
            "Refinanced in month {} after paying down {:.0} ({:.0} fresh equity)",
            state.month, gap, from_sponsor
        );
        GateResult::Refinanced
    }

    /// Sell at the exit month and assemble the equity cash flows
    fn exit(&self, state: &SimulationState, exit_month: u32, gate_month: u32) -> Terminal {
        let trailing_noi = trailing_average(&state.noi_history, TRAILING_NOI_MONTHS);
        let sale_valuation = valuation(trailing_noi, self.config.cap_rate);

        let mut equity_flows = vec![0.0; exit_month as usize + 1];
        equity_flows[0] -= self.config.capital.initial_equity;
        equity_flows[gate_month as usize] -= state.sponsor_injection;
        equity_flows[exit_month as usize] += state.residual_equity(sale_valuation);

        Terminal::Exit {
            month: exit_month,
            gate_valuation: state.gate_valuation.unwrap_or(0.0),
            sale_valuation,
            equity_flows,
        }
    }
}
