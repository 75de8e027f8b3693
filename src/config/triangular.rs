//! Triangular distribution used for every stochastic model input

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::ConfigurationError;

/// Triangular distribution given by (min, mode, max)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Triangular {
    pub min: f64,
    pub mode: f64,
    pub max: f64,
}

impl Triangular {
    pub const fn new(min: f64, mode: f64, max: f64) -> Self {
        Self { min, mode, max }
    }

    /// Point mass at `value`
    pub const fn fixed(value: f64) -> Self {
        Self::new(value, value, value)
    }

    pub(crate) fn validate(&self, name: &'static str) -> Result<(), ConfigurationError> {
        let finite = self.min.is_finite() && self.mode.is_finite() && self.max.is_finite();
        if finite && self.min <= self.mode && self.mode <= self.max {
            Ok(())
        } else {
            Err(ConfigurationError::InvalidDistribution {
                name,
                min: self.min,
                mode: self.mode,
                max: self.max,
            })
        }
    }

    /// Analytical mean (min + mode + max) / 3
    pub fn mean(&self) -> f64 {
        (self.min + self.mode + self.max) / 3.0
    }

    /// Inverse CDF at `u` in [0, 1)
    ///
    /// Left branch: `a + sqrt(u (b - a)(c - a))` while `u < (c - a)/(b - a)`,
    /// right branch: `b - sqrt((1 - u)(b - a)(b - c))`.
    pub fn inverse_cdf(&self, u: f64) -> f64 {
        let (a, c, b) = (self.min, self.mode, self.max);
        let width = b - a;
        if width <= 0.0 {
            return a;
        }

        if u < (c - a) / width {
            a + (u * width * (c - a)).sqrt()
        } else {
            b - ((1.0 - u) * width * (b - c)).sqrt()
        }
    }

    /// Draw one value from `rng`
    ///
    /// # Panics
    /// If the result falls outside [min, max], which can only be a defect in
    /// the inverse-CDF construction.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let u: f64 = rng.gen();
        let x = self.inverse_cdf(u);
        assert!(
            x >= self.min && x <= self.max,
            "triangular draw {} outside [{}, {}] (u = {})",
            x,
            self.min,
            self.max,
            u
        );
        x
    }
}
