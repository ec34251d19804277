//! Hard-constraint validation.
//!
//! The validator is the only gate for accepting a generator proposal. It
//! stops at the first violation so the reason fed back to the generator is
//! a single, specific instruction.

use std::collections::HashSet;

use crate::catalog::Catalog;
use crate::error::RecipeViolation;

use super::types::{
    ProposedComponent, Recipe, RecipeComponent, MAX_COMPONENTS, MIN_COMPONENTS, MIN_QUANTITY,
};

/// Checks a proposal against every hard constraint.
///
/// Checks run in this order: component count, then per component (unknown
/// code, duplicate code, non-integer quantity, below minimum, over stock),
/// then the exact sum.
///
/// # Returns
///
/// The validated [`Recipe`] with components in proposal order, or the first
/// violation found.
pub fn validate(
    components: &[ProposedComponent],
    requested_total: u32,
    catalog: &Catalog,
) -> Result<Recipe, RecipeViolation> {
    if components.len() < MIN_COMPONENTS || components.len() > MAX_COMPONENTS {
        return Err(RecipeViolation::WrongCount {
            min: MIN_COMPONENTS,
            max: MAX_COMPONENTS,
            actual: components.len(),
        });
    }

    let mut seen = HashSet::with_capacity(components.len());
    let mut validated = Vec::with_capacity(components.len());

    for component in components {
        let code = &component.ingredient_code;
        let ingredient = catalog
            .get(code)
            .ok_or_else(|| RecipeViolation::UnknownCode(code.clone()))?;

        if !seen.insert(code.as_str()) {
            return Err(RecipeViolation::DuplicateCode(code.clone()));
        }

        let quantity = component.quantity;
        if !quantity.is_finite() || quantity.fract() != 0.0 {
            return Err(RecipeViolation::NonInteger {
                code: code.clone(),
                quantity,
            });
        }

        if quantity < f64::from(MIN_QUANTITY) {
            return Err(RecipeViolation::BelowMinimum {
                code: code.clone(),
                quantity,
                minimum: MIN_QUANTITY,
            });
        }

        if quantity > f64::from(ingredient.stock_quantity) {
            return Err(RecipeViolation::OverStock {
                code: code.clone(),
                quantity: quantity.min(f64::from(u32::MAX)) as u32,
                stock: ingredient.stock_quantity,
            });
        }

        // Bounded by the stock check above, so the cast is exact.
        validated.push(RecipeComponent {
            ingredient_code: code.clone(),
            quantity: quantity as u32,
        });
    }

    let actual: u64 = validated.iter().map(|c| u64::from(c.quantity)).sum();
    if actual != u64::from(requested_total) {
        return Err(RecipeViolation::WrongSum {
            expected: requested_total,
            actual,
        });
    }

    Ok(Recipe::from_validated(validated))
}
