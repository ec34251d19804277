//! Price calculation for validated recipes.

use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;

use super::types::Recipe;

/// Default fixed packaging cost added to every blend.
pub const DEFAULT_PACKAGING_COST: f64 = 15.0;

/// Default margin applied on top of ingredients and packaging.
pub const DEFAULT_MARGIN_FRACTION: f64 = 0.15;

/// Default step the final price is rounded to.
pub const DEFAULT_ROUNDING_STEP: f64 = 5.0;

/// Pricing parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricingPolicy {
    pub packaging_cost: f64,
    pub margin_fraction: f64,
    /// Final totals are rounded to the nearest multiple of this, halves
    /// going up. Zero disables step rounding (totals are still rounded to
    /// cents).
    pub rounding_step: f64,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            packaging_cost: DEFAULT_PACKAGING_COST,
            margin_fraction: DEFAULT_MARGIN_FRACTION,
            rounding_step: DEFAULT_ROUNDING_STEP,
        }
    }
}

/// Price breakdown of a recipe.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PricingResult {
    /// Sum of quantity × unit cost over all components, in cents precision.
    pub unit_cost_sum: f64,
    pub packaging_cost: f64,
    pub margin_fraction: f64,
    /// Rounded selling price.
    pub total: f64,
}

impl PricingPolicy {
    /// Prices a recipe against the catalog it was validated with.
    ///
    /// `total = round_half_up(round_cents((unit_cost_sum + packaging) * (1 + margin)) / step) * step`
    pub fn price(&self, recipe: &Recipe, catalog: &Catalog) -> PricingResult {
        let unit_cost_sum = round_cents(
            recipe
                .components()
                .iter()
                .filter_map(|c| {
                    catalog
                        .get(&c.ingredient_code)
                        .map(|i| f64::from(c.quantity) * i.cost_per_unit)
                })
                .sum(),
        );

        let subtotal = unit_cost_sum + self.packaging_cost;
        let pre_round = round_cents(subtotal * (1.0 + self.margin_fraction));

        PricingResult {
            unit_cost_sum,
            packaging_cost: self.packaging_cost,
            margin_fraction: self.margin_fraction,
            total: round_to_step(pre_round, self.rounding_step),
        }
    }
}

/// Absorbs binary representation error so decimal halves round up.
const HALF_TOLERANCE: f64 = 1e-6;

/// Rounds to cents, half a cent going up (277.495 -> 277.50).
fn round_cents(value: f64) -> f64 {
    (value * 100.0 + HALF_TOLERANCE).round() / 100.0
}

/// Rounds to the nearest multiple of `step` after rounding to cents.
/// A value exactly halfway between two multiples goes up.
pub fn round_to_step(value: f64, step: f64) -> f64 {
    if step <= 0.0 || !step.is_finite() {
        return round_cents(value);
    }
    let steps = round_cents(value) / step;
    (steps + HALF_TOLERANCE).round() * step
}
