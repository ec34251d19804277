//! Soft penalty scoring for ranking invalid proposals.
//!
//! The score never gates acceptance; it only picks the best starting point
//! for the repair engine when no attempt validates. A proposal that passes
//! the validator scores exactly zero.

use std::collections::HashSet;

use crate::catalog::Catalog;

use super::types::{ProposedComponent, MAX_COMPONENTS, MIN_COMPONENTS, MIN_QUANTITY};

/// Fixed penalty per component whose code is not in the catalog.
pub const UNKNOWN_CODE_PENALTY: f64 = 1000.0;

/// Fixed penalty per repeated occurrence of a code.
pub const DUPLICATE_CODE_PENALTY: f64 = 500.0;

/// Fixed part of the penalty for a non-integer quantity.
pub const NON_INTEGER_BASE_PENALTY: f64 = 10.0;

/// Penalty per unit of distance to the nearest integer.
pub const NON_INTEGER_WEIGHT: f64 = 50.0;

/// Penalty per unit below the minimum quantity.
pub const BELOW_MINIMUM_WEIGHT: f64 = 10.0;

/// Penalty per unit above available stock. The heaviest proportional weight.
pub const OVER_STOCK_WEIGHT: f64 = 25.0;

/// Penalty per missing component below the minimum count.
pub const TOO_FEW_COMPONENTS_PENALTY: f64 = 300.0;

/// Penalty per extra component above the maximum count.
pub const TOO_MANY_COMPONENTS_PENALTY: f64 = 150.0;

/// Penalty per unit of deviation from the requested total.
pub const SUM_DEVIATION_WEIGHT: f64 = 2.0;

/// Computes the non-negative penalty of a proposal.
pub fn score(components: &[ProposedComponent], requested_total: u32, catalog: &Catalog) -> f64 {
    let mut penalty = 0.0;

    let count = components.len();
    if count < MIN_COMPONENTS {
        penalty += TOO_FEW_COMPONENTS_PENALTY * (MIN_COMPONENTS - count) as f64;
    } else if count > MAX_COMPONENTS {
        penalty += TOO_MANY_COMPONENTS_PENALTY * (count - MAX_COMPONENTS) as f64;
    }

    let mut seen = HashSet::with_capacity(count);
    let mut sum = 0.0;

    for component in components {
        if !seen.insert(component.ingredient_code.as_str()) {
            penalty += DUPLICATE_CODE_PENALTY;
        }

        let ingredient = catalog.get(&component.ingredient_code);
        if ingredient.is_none() {
            penalty += UNKNOWN_CODE_PENALTY;
        }

        let quantity = component.quantity;
        if !quantity.is_finite() {
            // Nothing proportional can be said about it.
            penalty += UNKNOWN_CODE_PENALTY;
            continue;
        }
        sum += quantity;

        let distance_to_integer = (quantity - quantity.round()).abs();
        if distance_to_integer > 0.0 {
            penalty += NON_INTEGER_BASE_PENALTY + NON_INTEGER_WEIGHT * distance_to_integer;
        }

        let minimum = f64::from(MIN_QUANTITY);
        if quantity < minimum {
            penalty += BELOW_MINIMUM_WEIGHT * (minimum - quantity);
        }

        if let Some(ingredient) = ingredient {
            let stock = f64::from(ingredient.stock_quantity);
            if quantity > stock {
                penalty += OVER_STOCK_WEIGHT * (quantity - stock);
            }
        }
    }

    penalty += SUM_DEVIATION_WEIGHT * (sum - f64::from(requested_total)).abs();

    penalty
}
