//! Sensory profile projection.
//!
//! Two profiles are derived for every result: the *target* the customer
//! asked for and the *blend* the recipe actually produces.

use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, SENSORY_DIMENSIONS, SENSORY_DIMENSION_NAMES};

use super::objective::{preference_level, Objective, Preferences};
use super::types::Recipe;

/// Neutral value of every dimension before bias and preferences.
pub const NEUTRAL_LEVEL: f64 = 5.0;

/// An 8-dimension cupping profile, every value in `[0, 10]`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct SensoryProfile {
    pub aroma: f64,
    pub acidity: f64,
    pub body: f64,
    pub sweetness: f64,
    pub bitterness: f64,
    pub fruitiness: f64,
    pub chocolate: f64,
    pub nuttiness: f64,
}

impl SensoryProfile {
    /// Builds a profile from values in [`SENSORY_DIMENSION_NAMES`] order,
    /// clamped to `[0, 10]`.
    pub fn from_array(values: [f64; SENSORY_DIMENSIONS]) -> Self {
        let v = values.map(|x| if x.is_finite() { x.clamp(0.0, 10.0) } else { 0.0 });
        Self {
            aroma: v[0],
            acidity: v[1],
            body: v[2],
            sweetness: v[3],
            bitterness: v[4],
            fruitiness: v[5],
            chocolate: v[6],
            nuttiness: v[7],
        }
    }

    /// Values in [`SENSORY_DIMENSION_NAMES`] order.
    pub fn to_array(&self) -> [f64; SENSORY_DIMENSIONS] {
        [
            self.aroma,
            self.acidity,
            self.body,
            self.sweetness,
            self.bitterness,
            self.fruitiness,
            self.chocolate,
            self.nuttiness,
        ]
    }

    /// Euclidean distance to another profile.
    pub fn distance(&self, other: &SensoryProfile) -> f64 {
        self.to_array()
            .iter()
            .zip(other.to_array().iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f64>()
            .sqrt()
    }
}

fn dimension_index(name: &str) -> Option<usize> {
    let name = name.trim().to_ascii_lowercase();
    SENSORY_DIMENSION_NAMES.iter().position(|d| *d == name)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Derives the target profile from an objective and stated preferences.
///
/// Deterministic: neutral baseline, then the objective's bias, then any
/// preference whose key names a dimension overrides that dimension.
pub fn target_profile(objective: Objective, preferences: &Preferences) -> SensoryProfile {
    let mut values = [NEUTRAL_LEVEL; SENSORY_DIMENSIONS];

    for (dimension, offset) in objective.bias() {
        if let Some(idx) = dimension_index(dimension) {
            values[idx] += offset;
        }
    }

    for (key, value) in preferences {
        if let (Some(idx), Some(level)) = (dimension_index(key), preference_level(value)) {
            values[idx] = level;
        }
    }

    SensoryProfile::from_array(values.map(round2))
}

/// Quantity-weighted average of the recipe's ingredient vectors.
pub fn blend_profile(recipe: &Recipe, catalog: &Catalog) -> SensoryProfile {
    let mut weighted = [0.0; SENSORY_DIMENSIONS];
    let mut total_weight = 0.0;

    for component in recipe.components() {
        let Some(ingredient) = catalog.get(&component.ingredient_code) else {
            continue;
        };
        let weight = f64::from(component.quantity);
        for (acc, value) in weighted.iter_mut().zip(ingredient.sensory.iter()) {
            *acc += weight * value;
        }
        total_weight += weight;
    }

    if total_weight == 0.0 {
        return SensoryProfile::default();
    }

    SensoryProfile::from_array(weighted.map(|sum| round2(sum / total_weight)))
}
