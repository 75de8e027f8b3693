//! Income-approach valuation used at the refinancing gate and at exit

/// Average of the last `window` calendar months of `history`
///
/// Months before the start of the history count as zero and the divisor is
/// always `window`, so an early gate is valued on a thin window rather than
/// a smoothed one.
pub fn trailing_average(history: &[f64], window: usize) -> f64 {
    if window == 0 {
        return 0.0;
    }
    let start = history.len().saturating_sub(window);
    history[start..].iter().sum::<f64>() / window as f64
}

/// Direct capitalization: annualized monthly NOI divided by the cap rate
pub fn valuation(monthly_noi: f64, cap_rate: f64) -> f64 {
    monthly_noi * 12.0 / cap_rate
}
