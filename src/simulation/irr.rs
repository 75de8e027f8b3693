//! Internal Rate of Return (IRR) calculation
//!
//! Used to turn a scenario's monthly equity cash flows into an annualized return

const TOLERANCE: f64 = 1e-10;
const MAX_ITERATIONS: usize = 1000;
const INITIAL_GUESS: f64 = 0.05 / 12.0;

/// Bracket searched for the periodic rate
const MIN_PERIODIC_RATE: f64 = -0.99;
const MAX_PERIODIC_RATE: f64 = 10.0;

/// Calculate the Internal Rate of Return (IRR) for a series of cash flows
/// using the Newton-Raphson method, falling back to bisection.
///
/// # Arguments
/// * `cashflows` - Cash flows per period (positive = inflow, negative = outflow)
/// * `periods_per_year` - Number of periods per year (12 for monthly)
///
/// # Returns
/// * `Option<f64>` - Annual IRR as a decimal (e.g., 0.05 for 5%), or None if no
///   periodic rate inside the search bracket zeroes the NPV
pub fn calculate_irr(cashflows: &[f64], periods_per_year: u32) -> Option<f64> {
    if cashflows.is_empty() {
        return None;
    }

    if cashflows.iter().all(|&cf| cf.abs() < 1e-10) {
        return Some(0.0);
    }

    // An IRR needs at least one sign change
    let has_positive = cashflows.iter().any(|&cf| cf > 1e-10);
    let has_negative = cashflows.iter().any(|&cf| cf < -1e-10);
    if !has_positive || !has_negative {
        return None;
    }

    // Scale so the NPV tolerance is independent of the currency unit
    let scale = cashflows.iter().fold(0.0_f64, |acc, cf| acc.max(cf.abs()));
    let scaled: Vec<f64> = cashflows.iter().map(|cf| cf / scale).collect();

    let periodic = newton(&scaled).or_else(|| bisect(&scaled))?;
    Some(annualize(periodic, periods_per_year))
}

fn annualize(periodic_rate: f64, periods_per_year: u32) -> f64 {
    (1.0 + periodic_rate).powi(periods_per_year as i32) - 1.0
}

/// Newton iteration on the periodic rate
///
/// Gives up as soon as a step leaves the bracket, the slope vanishes or the
/// NPV stops being finite.
fn newton(flows: &[f64]) -> Option<f64> {
    let mut rate = INITIAL_GUESS;

    for _ in 0..MAX_ITERATIONS {
        let (npv, slope) = npv_with_slope(flows, rate);
        if !npv.is_finite() || slope.abs() < 1e-20 {
            return None;
        }

        let next = rate - npv / slope;
        if !(MIN_PERIODIC_RATE..=MAX_PERIODIC_RATE).contains(&next) {
            return None;
        }
        if (next - rate).abs() < TOLERANCE {
            return Some(next);
        }
        rate = next;
    }

    None
}

/// Bisection over the whole bracket; `None` when the NPV has the same sign at both ends
fn bisect(flows: &[f64]) -> Option<f64> {
    let mut low = MIN_PERIODIC_RATE;
    let mut high = MAX_PERIODIC_RATE;
    let npv_low = npv_at_rate(flows, low);
    let npv_high = npv_at_rate(flows, high);

    if npv_low == 0.0 {
        return Some(low);
    }
    if npv_high == 0.0 {
        return Some(high);
    }
    let low_negative = npv_low < 0.0;
    if low_negative == (npv_high < 0.0) {
        return None;
    }

    while high - low > 2.0 * TOLERANCE {
        let mid = 0.5 * (low + high);
        let npv_mid = npv_at_rate(flows, mid);
        if npv_mid == 0.0 {
            return Some(mid);
        }
        if (npv_mid < 0.0) == low_negative {
            low = mid;
        } else {
            high = mid;
        }
    }

    Some(0.5 * (low + high))
}

/// NPV and its derivative with respect to the periodic rate, in one pass
fn npv_with_slope(flows: &[f64], rate: f64) -> (f64, f64) {
    let factor = 1.0 / (1.0 + rate);
    let mut discount = 1.0;
    let mut npv = 0.0;
    let mut slope = 0.0;

    for (t, &cf) in flows.iter().enumerate() {
        npv += cf * discount;
        slope -= t as f64 * cf * discount * factor;
        discount *= factor;
    }

    (npv, slope)
}

/// NPV at a given periodic rate, first flow undiscounted
pub fn npv_at_rate(cashflows: &[f64], rate: f64) -> f64 {
    let factor = 1.0 / (1.0 + rate);
    cashflows
        .iter()
        .fold((0.0, 1.0), |(npv, discount), &cf| (npv + cf * discount, discount * factor))
        .0
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_single_payoff_after_36_periods() {
        // -100 at t=0, +150 at t=35
        let mut cashflows = vec![-100.0];
        cashflows.extend(vec![0.0; 34]);
        cashflows.push(150.0);
        assert_eq!(cashflows.len(), 36);

        let irr = calculate_irr(&cashflows, 12).unwrap();
        let expected = 1.5_f64.powf(12.0 / 35.0) - 1.0;
        assert_relative_eq!(irr, expected, epsilon = 1e-8);

        let monthly = (1.0 + irr).powf(1.0 / 12.0) - 1.0;
        assert!(npv_at_rate(&cashflows, monthly).abs() < 1e-6);
    }

    #[test]
    fn test_simple_irr() {
        // Investment of 1000 returning 1100 after 12 months
        let mut cashflows = vec![-1000.0];
        cashflows.extend(vec![0.0; 11]);
        cashflows.push(1100.0);

        let irr = calculate_irr(&cashflows, 12).unwrap();
        assert!((irr - 0.10).abs() < 0.001, "Expected ~10% IRR, got {}", irr);
    }

    #[test]
    fn test_large_currency_units() {
        let mut cashflows = vec![-4.9e9];
        cashflows.extend(vec![0.0; 23]);
        cashflows[12] = -1.0e9;
        cashflows.push(9.0e9);

        let irr = calculate_irr(&cashflows, 12).unwrap();
        let monthly = (1.0 + irr).powf(1.0 / 12.0) - 1.0;
        assert!(npv_at_rate(&cashflows, monthly).abs() / 4.9e9 < 1e-8);
    }

    #[test]
    fn test_no_sign_change() {
        assert!(calculate_irr(&[-100.0, -10.0], 12).is_none());
        assert!(calculate_irr(&[100.0, 10.0], 12).is_none());
        assert!(calculate_irr(&[], 12).is_none());
    }

    #[test]
    fn test_negative_return() {
        let mut cashflows = vec![-100.0];
        cashflows.extend(vec![0.0; 11]);
        cashflows.push(80.0);

        let irr = calculate_irr(&cashflows, 12).unwrap();
        assert_relative_eq!(irr, 0.8_f64.powf(12.0 / 12.0) - 1.0, epsilon = 1e-8);
    }

    #[test]
    fn test_root_above_bracket_is_not_reported() {
        // Periodic IRR of 999,999 lies far above the searched range
        assert!(calculate_irr(&[-1.0, 1_000_000.0], 12).is_none());
    }

    #[test]
    fn test_high_root_inside_bracket() {
        // Tripling in one month is a periodic rate of 200%
        let irr = calculate_irr(&[-100.0, 300.0], 12).unwrap();
        assert_relative_eq!(irr, 3.0_f64.powi(12) - 1.0, max_relative = 1e-6);
    }

    #[test]
    fn test_bisection_matches_newton() {
        let mut flows = vec![-1.0];
        flows.extend(vec![0.0; 23]);
        flows.push(2.0);

        let newton_rate = newton(&flows).unwrap();
        let bisect_rate = bisect(&flows).unwrap();
        assert_relative_eq!(newton_rate, bisect_rate, epsilon = 1e-8);
        assert_relative_eq!(newton_rate, 2.0_f64.powf(1.0 / 24.0) - 1.0, epsilon = 1e-9);
    }
}
