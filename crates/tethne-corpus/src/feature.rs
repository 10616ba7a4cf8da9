//! A single document's sparse element → count mapping.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tethne_common::{Result, TethneError, Value};

/// Ordered `(element, count)` pairs for one document.
///
/// Elements are unique within a feature; counts are finite and non-negative.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pairs: Vec<(Value, f64)>,
}

impl Feature {
    /// Build from explicit pairs. Repeated elements are summed in place.
    pub fn new(pairs: impl IntoIterator<Item = (Value, f64)>) -> Result<Self> {
        let mut feature = Feature::default();
        let mut positions: HashMap<Value, usize> = HashMap::new();
        for (element, count) in pairs {
            if !count.is_finite() || count < 0.0 {
                return Err(TethneError::Inconsistency(format!(
                    "feature count for {element} must be a non-negative number, got {count}"
                )));
            }
            match positions.get(&element) {
                Some(&i) => feature.pairs[i].1 += count,
                None => {
                    positions.insert(element.clone(), feature.pairs.len());
                    feature.pairs.push((element, count));
                }
            }
        }
        Ok(feature)
    }

    /// Count token occurrences, preserving first-encounter order.
    pub fn from_tokens(tokens: impl IntoIterator<Item = Value>) -> Self {
        let mut pairs: Vec<(Value, f64)> = Vec::new();
        let mut positions: HashMap<Value, usize> = HashMap::new();
        for token in tokens {
            match positions.get(&token) {
                Some(&i) => pairs[i].1 += 1.0,
                None => {
                    positions.insert(token.clone(), pairs.len());
                    pairs.push((token, 1.0));
                }
            }
        }
        Feature { pairs }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Value, f64)> {
        self.pairs.iter().map(|(e, c)| (e, *c))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn get(&self, element: &Value) -> Option<f64> {
        self.pairs.iter().find(|(e, _)| e == element).map(|(_, c)| *c)
    }

    pub fn total(&self) -> f64 {
        self.pairs.iter().map(|(_, c)| c).sum()
    }

    /// Scale counts so they sum to one. An all-zero feature is returned unchanged.
    pub fn normalized(&self) -> Feature {
        let total = self.total();
        if total <= 0.0 {
            return self.clone();
        }
        Feature {
            pairs: self.pairs.iter().map(|(e, c)| (e.clone(), c / total)).collect(),
        }
    }

    /// The `n` largest pairs, ties in original order.
    pub fn top(&self, n: usize) -> Vec<(Value, f64)> {
        let mut pairs = self.pairs.clone();
        pairs.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        pairs.truncate(n);
        pairs
    }

    pub fn into_pairs(self) -> Vec<(Value, f64)> {
        self.pairs
    }
}
