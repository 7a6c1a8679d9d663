//! Open nutrient map
//!
//! Used for per-100g food profiles and for aggregated totals. Keys are free-form
//! so foods can carry any extra numeric nutrient; the required subset is always
//! present in totals.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const CALORIES: &str = "calories"; // kcal
pub const PROTEIN: &str = "protein"; // grams
pub const CARBOHYDRATE: &str = "carbohydrate"; // grams
pub const FAT: &str = "fat"; // grams
pub const FIBER: &str = "fiber"; // grams

/// Keys every totals map carries, in display order
pub const REQUIRED_NUTRIENTS: [&str; 5] = [CALORIES, PROTEIN, CARBOHYDRATE, FAT, FIBER];

/// Well-known optional keys (milligrams)
pub const OPTIONAL_NUTRIENTS: [&str; 5] = ["cholesterol", "sodium", "potassium", "calcium", "iron"];

/// Nutrient values keyed by name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Nutrients(BTreeMap<String, f64>);

impl Nutrients {
    /// An empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// The required keys, all at zero
    pub fn zero() -> Self {
        REQUIRED_NUTRIENTS.iter().map(|k| (k.to_string(), 0.0)).collect()
    }

    /// Value for a key, 0 when absent
    pub fn get(&self, key: &str) -> f64 {
        self.0.get(key).copied().unwrap_or(0.0)
    }

    pub fn value(&self, key: &str) -> Option<f64> {
        self.0.get(key).copied()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: f64) {
        self.0.insert(key.into(), value);
    }

    pub fn with(mut self, key: impl Into<String>, value: f64) -> Self {
        self.set(key, value);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Keys outside the required subset, in key order
    pub fn extra_keys(&self) -> impl Iterator<Item = &str> {
        self.0
            .keys()
            .map(String::as_str)
            .filter(|k| !REQUIRED_NUTRIENTS.contains(k))
    }

    /// Scale every value by a multiplier
    pub fn scale(&self, multiplier: f64) -> Self {
        self.0
            .iter()
            .map(|(k, v)| (k.clone(), v * multiplier))
            .collect()
    }

    /// Key-wise sum; keys present on either side are kept
    pub fn add(&self, other: &Nutrients) -> Self {
        let mut total = self.clone();
        total.accumulate(other);
        total
    }

    /// Add another map into this one in place
    pub fn accumulate(&mut self, other: &Nutrients) {
        for (key, value) in &other.0 {
            *self.0.entry(key.clone()).or_insert(0.0) += value;
        }
    }

    /// Add `other * multiplier` into this one in place
    pub fn accumulate_scaled(&mut self, other: &Nutrients, multiplier: f64) {
        for (key, value) in &other.0 {
            *self.0.entry(key.clone()).or_insert(0.0) += value * multiplier;
        }
    }

    /// Check that every value is a finite, non-negative number
    pub fn validate(&self) -> Result<(), String> {
        for (key, value) in &self.0 {
            if key.trim().is_empty() {
                return Err("nutrient names cannot be empty".to_string());
            }
            if !value.is_finite() {
                return Err(format!("{} must be a finite number", key));
            }
            if *value < 0.0 {
                return Err(format!("{} cannot be negative", key));
            }
        }
        Ok(())
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for Nutrients {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl std::ops::Add for Nutrients {
    type Output = Nutrients;

    fn add(self, other: Nutrients) -> Nutrients {
        Nutrients::add(&self, &other)
    }
}

impl std::ops::Mul<f64> for Nutrients {
    type Output = Nutrients;

    fn mul(self, multiplier: f64) -> Nutrients {
        self.scale(multiplier)
    }
}

impl std::iter::Sum for Nutrients {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Nutrients::zero(), |acc, n| acc + n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_has_required_keys() {
        let zero = Nutrients::zero();
        assert_eq!(zero.len(), REQUIRED_NUTRIENTS.len());
        for key in REQUIRED_NUTRIENTS {
            assert_eq!(zero.value(key), Some(0.0));
        }
    }

    #[test]
    fn test_add_keeps_keys_from_both_sides() {
        let a = Nutrients::new().with(CALORIES, 100.0).with("iron", 2.0);
        let b = Nutrients::new().with(CALORIES, 50.0).with("sodium", 10.0);
        let sum = a + b;
        assert_eq!(sum.get(CALORIES), 150.0);
        assert_eq!(sum.get("iron"), 2.0);
        assert_eq!(sum.get("sodium"), 10.0);
        assert_eq!(sum.get("potassium"), 0.0);
        assert!(!sum.contains("potassium"));
    }

    #[test]
    fn test_scale() {
        let n = Nutrients::new().with(PROTEIN, 31.0) * 1.5;
        assert!((n.get(PROTEIN) - 46.5).abs() < 1e-9);
    }

    #[test]
    fn test_validate_rejects_negative_and_nan() {
        assert!(Nutrients::new().with(FAT, -1.0).validate().is_err());
        assert!(Nutrients::new().with(FAT, f64::NAN).validate().is_err());
        assert!(Nutrients::new().with(FAT, 0.0).validate().is_ok());
    }

    #[test]
    fn test_extra_keys_skip_required() {
        let n = Nutrients::zero().with("calcium", 5.0).with("iron", 1.0);
        let extra: Vec<&str> = n.extra_keys().collect();
        assert_eq!(extra, vec!["calcium", "iron"]);
    }

    #[test]
    fn test_serializes_as_flat_map() {
        let n = Nutrients::new().with(CALORIES, 165.0);
        let json = serde_json::to_string(&n).unwrap();
        assert_eq!(json, r#"{"calories":165.0}"#);
        let back: Nutrients = serde_json::from_str(&json).unwrap();
        assert_eq!(back, n);
    }
}
