//! PF Liquidity Risk CLI
//!
//! Runs a Monte Carlo batch, prints the risk summary and equity runway, and
//! optionally writes the scenario table (CSV), the summary (JSON) and the
//! monthly trace of a single scenario.

use std::fs::File;
use std::io::BufWriter;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use pf_liquidity_risk::config::load_config;
use pf_liquidity_risk::{Engine, ModelConfig, OutcomeKind, SimulationBatch};

#[derive(Debug, Parser)]
#[command(name = "pf-risk", version, about = "Monte Carlo liquidity risk for a PF real-estate development")]
struct Args {
    /// Model config JSON (built-in defaults when omitted)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of Monte Carlo scenarios
    #[arg(long, default_value = "10000")]
    iterations: NonZeroUsize,

    /// Base seed; a random one is drawn and reported when omitted
    #[arg(long)]
    seed: Option<u64>,

    /// Write one row per scenario to this CSV file
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Write the batch summary to this JSON file
    #[arg(long)]
    summary_json: Option<PathBuf>,

    /// Print the monthly trace of this scenario ordinal
    #[arg(long)]
    trace: Option<u64>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)
            .with_context(|| format!("loading model config from {}", path.display()))?,
        None => ModelConfig::default(),
    };
    let engine = Engine::build(config).context("building engine")?;

    println!("PF Liquidity Risk v{}", env!("CARGO_PKG_VERSION"));
    println!("========================\n");

    let start = Instant::now();
    let batch = engine.run(args.iterations, args.seed);
    println!(
        "Simulated {} scenarios in {:?} (seed {})\n",
        batch.len(),
        start.elapsed(),
        batch.base_seed()
    );

    print_summary(&batch);
    print_runway(&batch);

    if let Some(ordinal) = args.trace {
        print_trace(&engine, batch.base_seed(), ordinal);
    }

    if let Some(path) = &args.csv {
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("creating {}", path.display()))?;
        for row in batch.rows() {
            writer.serialize(row)?;
        }
        writer.flush()?;
        println!("\nScenario table written to: {}", path.display());
    }

    if let Some(path) = &args.summary_json {
        let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), batch.summary())?;
        println!("Summary written to: {}", path.display());
    }

    Ok(())
}

fn print_summary(batch: &SimulationBatch) {
    let summary = batch.summary();

    println!("Outcomes:");
    for outcome in &summary.outcomes {
        println!(
            "  {:<16} {:>8} {:>8.2}%",
            outcome.kind.as_str(),
            outcome.count,
            outcome.probability * 100.0
        );
    }

    println!("\nEquity IRR (successful exits):");
    match summary.irr.median {
        Some(median) => {
            println!("  Median: {:>8.2}%", median * 100.0);
            for p in &summary.irr.percentiles {
                println!("  P{:<5}  {:>8.2}%", (p.percentile * 100.0).round(), p.value * 100.0);
            }
        }
        None => println!("  (no converged exits)"),
    }
    if summary.irr.non_convergent > 0 {
        println!("  Non-convergent: {}", summary.irr.non_convergent);
    }

    println!("\nTail risk:");
    println!(
        "  VaR {:.0}% (equity loss):   {:.2}%",
        summary.var_confidence * 100.0,
        summary.value_at_risk * 100.0
    );
    println!("  CVaR (equity loss):       {:.2}%", summary.conditional_value_at_risk * 100.0);
    match summary.expected_shortfall {
        Some(es) => println!("  Expected refi shortfall:  {:.0}", es),
        None => println!("  Expected refi shortfall:  n/a (no refinancing failures)"),
    }
}

fn print_runway(batch: &SimulationBatch) {
    let summary = batch.summary();
    let defaults = summary.count(OutcomeKind::Default);

    println!("\nEquity runway:");
    match summary.runway.mean_default_month {
        Some(mean) => println!("  {} defaults, mean month of exhaustion {:.1}", defaults, mean),
        None => println!("  No scenario exhausted its equity"),
    }

    let peak = summary.runway.default_months.iter().map(|m| m.count).max().unwrap_or(0);
    for bucket in &summary.runway.default_months {
        let width = if peak == 0 { 0 } else { bucket.count * 40 / peak };
        println!("  M{:<3} {:>6} {}", bucket.month, bucket.count, "#".repeat(width.max(1)));
    }

    println!("\nSurvival (no default or refinancing failure):");
    for month in (0..summary.survival_curve.len()).step_by(6) {
        println!("  Month {:>3}: {:>6.2}%", month, summary.survival_curve[month] * 100.0);
    }
    if let Some(last) = summary.survival_curve.last() {
        println!("  Final:     {:>6.2}%", last * 100.0);
    }
}

fn print_trace(engine: &Engine, base_seed: u64, ordinal: u64) {
    let traced = engine.trace_scenario(base_seed, ordinal);
    let p = &traced.params;

    println!("\nScenario {} trace:", ordinal);
    println!(
        "  Rates {:.2}% / {:.2}%, revenue {:.0} / {:.0}, delay {:.1} months, LTV {:.1}%",
        p.pre_refi_rate * 100.0,
        p.post_refi_rate * 100.0,
        p.stabilization_revenue,
        p.post_opening_revenue,
        p.construction_delay,
        p.refinancing_ltv * 100.0
    );
    println!(
        "{:>5} {:<16} {:>14} {:>14} {:>14} {:>16} {:>16} {:>5}",
        "Month", "Phase", "NOI", "Interest", "Capitalized", "Debt", "Reserve", "Refi"
    );
    println!("{}", "-".repeat(110));
    for row in &traced.simulation.trace {
        println!(
            "{:>5} {:<16} {:>14.0} {:>14.0} {:>14.0} {:>16.0} {:>16.0} {:>5}",
            row.month,
            format!("{:?}", row.phase),
            row.noi,
            row.interest_accrued,
            row.interest_capitalized,
            row.debt_balance,
            row.cash_reserve,
            if row.refinanced { "yes" } else { "no" },
        );
    }
    println!(
        "  Outcome: {} in month {}",
        traced.result.outcome, traced.result.outcome_month
    );
}
