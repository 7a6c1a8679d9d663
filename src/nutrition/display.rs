//! Presentation rounding
//!
//! Aggregated values stay unrounded; only what is shown to a person or
//! printed in a report goes through here.

use serde::{Deserialize, Serialize};

use crate::models::{Nutrients, CALORIES};

/// Decimal places used when presenting totals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayPrecision {
    pub calories: usize,
    pub grams: usize,
}

impl Default for DisplayPrecision {
    fn default() -> Self {
        Self { calories: 0, grams: 1 }
    }
}

impl DisplayPrecision {
    pub fn digits_for(&self, key: &str) -> usize {
        if key == CALORIES {
            self.calories
        } else {
            self.grams
        }
    }

    /// Round a value for a given nutrient key
    pub fn round(&self, key: &str, value: f64) -> f64 {
        round_to(value, self.digits_for(key))
    }

    /// Copy of `totals` with every value rounded for display
    pub fn round_all(&self, totals: &Nutrients) -> Nutrients {
        totals.iter().map(|(k, v)| (k, self.round(k, v))).collect()
    }

    pub fn format(&self, key: &str, value: f64) -> String {
        format_amount(value, self.digits_for(key))
    }
}

/// Round half away from zero; non-finite input becomes 0
pub fn round_to(value: f64, digits: usize) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    let factor = 10f64.powi(digits as i32);
    (value * factor).round() / factor
}

pub fn format_amount(value: f64, digits: usize) -> String {
    format!("{:.*}", digits, round_to(value, digits))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PROTEIN;

    #[test]
    fn test_default_precision() {
        let p = DisplayPrecision::default();
        assert_eq!(p.format(CALORIES, 507.5), "508");
        assert_eq!(p.format(PROTEIN, 51.94), "51.9");
    }

    #[test]
    fn test_non_finite_formats_as_zero() {
        assert_eq!(format_amount(f64::NAN, 1), "0.0");
        assert_eq!(round_to(f64::INFINITY, 0), 0.0);
    }

    #[test]
    fn test_round_all() {
        let totals = Nutrients::zero().with(CALORIES, 99.6).with(PROTEIN, 3.14159);
        let rounded = DisplayPrecision::default().round_all(&totals);
        assert_eq!(rounded.get(CALORIES), 100.0);
        assert_eq!(rounded.get(PROTEIN), 3.1);
    }
}
