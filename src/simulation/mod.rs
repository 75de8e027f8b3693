//! Monthly cash-flow simulation of a single scenario

mod state;
mod engine;
mod cashflows;
mod valuation;
mod irr;

pub use state::SimulationState;
pub use engine::{CashFlowSimulator, SimulationOptions};
pub use cashflows::{MonthlyState, Phase, Simulation, Terminal};
pub use valuation::{trailing_average, valuation};
pub use irr::{calculate_irr, npv_at_rate};
