//! Deterministic repair of arbitrary proposals into valid recipes.
//!
//! The repair engine is the fallback when every generator attempt fails. It
//! accepts anything, including an empty proposal, and either returns a
//! recipe that passes [`validate`] or a [`RepairError`] explaining why the
//! catalog cannot satisfy the request.
//!
//! # Algorithm
//!
//! 1. Drop components whose code is unknown or whose stock is below the
//!    minimum quantity (they can never be valid).
//! 2. Floor quantities to integers and raise them to the minimum.
//! 3. Sort by quantity, largest first, and drop later duplicates.
//! 4. Keep at most [`MAX_COMPONENTS`].
//! 5. Top up to [`MIN_COMPONENTS`] with the cheapest unused ingredients at
//!    the minimum quantity.
//! 6. Clamp every quantity to its stock.
//! 7. Walk the sum toward the requested total, one component at a time,
//!    taking units from components above the minimum or adding units to
//!    components below their stock. When the existing components cannot
//!    absorb a shortfall, further cheap ingredients are added (up to the
//!    maximum count), or the smallest component is swapped for an unused
//!    ingredient with more stock; when they cannot shed an excess, the
//!    smallest component is dropped (down to the minimum count).
//! 8. If the sum still misses, fail with [`RepairError::Infeasible`].

use crate::catalog::{Catalog, Ingredient};
use crate::error::RepairError;

use super::types::{
    ProposedComponent, Recipe, MAX_COMPONENTS, MIN_COMPONENTS, MIN_QUANTITY,
};
use super::validator::validate;

/// Upper bound on adjustment rounds in step 7.
///
/// Every round either closes the gap or exhausts one component's slack,
/// adds a component, or removes one, so real inputs finish in a handful.
pub const MAX_ADJUSTMENT_ROUNDS: usize = 64;

#[derive(Debug, Clone)]
struct Slot {
    code: String,
    quantity: u64,
    ceiling: u64,
}

impl Slot {
    fn slack(&self) -> u64 {
        self.quantity.saturating_sub(u64::from(MIN_QUANTITY))
    }

    fn headroom(&self) -> u64 {
        self.ceiling.saturating_sub(self.quantity)
    }
}

/// Repairs a proposal into a valid recipe.
///
/// A proposal that already validates is returned unchanged.
///
/// # Errors
///
/// - `RepairError::NoUsableIngredients` if no catalog ingredient can supply
///   the minimum quantity
/// - `RepairError::NotEnoughIngredients` if fewer than two can
/// - `RepairError::Infeasible` if the exact total cannot be reached
pub fn repair(
    components: &[ProposedComponent],
    requested_total: u32,
    catalog: &Catalog,
) -> Result<Recipe, RepairError> {
    if let Ok(recipe) = validate(components, requested_total, catalog) {
        return Ok(recipe);
    }

    let usable = |ingredient: &Ingredient| ingredient.stock_quantity >= MIN_QUANTITY;

    let mut slots: Vec<Slot> = components
        .iter()
        .filter_map(|component| {
            let ingredient = catalog.get(&component.ingredient_code)?;
            if !usable(ingredient) {
                return None;
            }
            Some(Slot {
                code: ingredient.code.clone(),
                quantity: floor_to_minimum(component.quantity),
                ceiling: u64::from(ingredient.stock_quantity),
            })
        })
        .collect();

    // Stable sort keeps proposal order among equal quantities.
    slots.sort_by(|a, b| b.quantity.cmp(&a.quantity));
    let mut seen = std::collections::HashSet::new();
    slots.retain(|slot| seen.insert(slot.code.clone()));
    slots.truncate(MAX_COMPONENTS);

    let cheapest: Vec<&Ingredient> = catalog
        .by_unit_cost()
        .into_iter()
        .filter(|i| usable(i))
        .collect();
    if cheapest.is_empty() {
        return Err(RepairError::NoUsableIngredients {
            minimum: MIN_QUANTITY,
        });
    }

    while slots.len() < MIN_COMPONENTS {
        let next = next_unused(&cheapest, &slots).ok_or(RepairError::NotEnoughIngredients)?;
        slots.push(new_slot(next));
    }

    for slot in slots.iter_mut() {
        slot.quantity = slot.quantity.min(slot.ceiling);
    }

    let target = u64::from(requested_total);
    for _ in 0..MAX_ADJUSTMENT_ROUNDS {
        let sum: u64 = slots.iter().map(|s| s.quantity).sum();
        if sum == target {
            break;
        }

        if sum > target {
            let excess = sum - target;
            let donor = slots
                .iter_mut()
                .filter(|s| s.slack() > 0)
                .max_by_key(|s| s.slack());
            match donor {
                Some(slot) => slot.quantity -= slot.slack().min(excess),
                None => {
                    if slots.len() > MIN_COMPONENTS {
                        slots.pop();
                    } else {
                        break;
                    }
                }
            }
        } else {
            let deficit = target - sum;
            let receiver = slots
                .iter_mut()
                .filter(|s| s.headroom() > 0)
                .max_by_key(|s| s.headroom());
            if let Some(slot) = receiver {
                slot.quantity += slot.headroom().min(deficit);
                continue;
            }

            // A new component brings at least the minimum; only add one if
            // the overshoot can be taken back elsewhere.
            let total_slack: u64 = slots.iter().map(Slot::slack).sum();
            let overshoot = u64::from(MIN_QUANTITY).saturating_sub(deficit);
            if slots.len() < MAX_COMPONENTS && total_slack >= overshoot {
                if let Some(next) = next_unused(&cheapest, &slots) {
                    slots.push(new_slot(next));
                    continue;
                }
            }

            if !swap_for_headroom(&mut slots, &cheapest) {
                break;
            }
        }
    }

    let reached: u64 = slots.iter().map(|s| s.quantity).sum();
    if reached != target {
        return Err(RepairError::Infeasible {
            requested: requested_total,
            reached,
        });
    }

    let repaired: Vec<ProposedComponent> = slots
        .into_iter()
        .map(|slot| ProposedComponent::new(slot.code, slot.quantity as f64))
        .collect();

    Ok(validate(&repaired, requested_total, catalog)?)
}

fn floor_to_minimum(quantity: f64) -> u64 {
    let minimum = u64::from(MIN_QUANTITY);
    if !quantity.is_finite() {
        return minimum;
    }
    let floored = quantity.floor().clamp(0.0, f64::from(u32::MAX));
    (floored as u64).max(minimum)
}

fn next_unused<'a>(cheapest: &[&'a Ingredient], slots: &[Slot]) -> Option<&'a Ingredient> {
    cheapest
        .iter()
        .copied()
        .find(|ingredient| !slots.iter().any(|slot| slot.code == ingredient.code))
}

/// Replaces the smallest component with the cheapest unused ingredient that
/// has more stock than that component's quantity. Returns false when no such
/// swap exists.
fn swap_for_headroom(slots: &mut [Slot], cheapest: &[&Ingredient]) -> bool {
    let Some(index) = (0..slots.len()).min_by_key(|&i| slots[i].quantity) else {
        return false;
    };
    let quantity = slots[index].quantity;
    let replacement = cheapest.iter().find(|ingredient| {
        u64::from(ingredient.stock_quantity) > quantity
            && !slots.iter().any(|slot| slot.code == ingredient.code)
    });

    match replacement {
        Some(ingredient) => {
            slots[index].code = ingredient.code.clone();
            slots[index].ceiling = u64::from(ingredient.stock_quantity);
            true
        }
        None => false,
    }
}

fn new_slot(ingredient: &Ingredient) -> Slot {
    Slot {
        code: ingredient.code.clone(),
        quantity: u64::from(MIN_QUANTITY),
        ceiling: u64::from(ingredient.stock_quantity),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SENSORY_DIMENSIONS;
    use crate::recipe::scorer::score;

    fn lot(code: &str, stock: u32, cost: f64) -> Ingredient {
        Ingredient::new(code, format!("Lot {}", code), stock, cost, [5.0; SENSORY_DIMENSIONS])
    }

    fn proposal(items: &[(&str, f64)]) -> Vec<ProposedComponent> {
        items
            .iter()
            .map(|(code, qty)| ProposedComponent::new(*code, *qty))
            .collect()
    }

    fn assert_valid(recipe: &Recipe, total: u32, catalog: &Catalog) {
        let proposed = recipe.to_proposed();
        assert!(validate(&proposed, total, catalog).is_ok(), "{:?}", recipe);
        assert_eq!(score(&proposed, total, catalog), 0.0);
    }

    #[test]
    fn test_repairs_overshoot_with_below_minimum_component() {
        let catalog = Catalog::new(vec![lot("A", 1000, 0.85), lot("B", 40, 0.95)]).expect("catalog");

        let recipe = repair(&proposal(&[("A", 500.0), ("B", 10.0)]), 250, &catalog)
            .expect("repair should succeed");

        assert_valid(&recipe, 250, &catalog);
        assert_eq!(recipe.quantity_of("A"), Some(230));
        assert_eq!(recipe.quantity_of("B"), Some(20));
    }

    #[test]
    fn test_valid_recipe_is_unchanged() {
        let catalog = Catalog::new(vec![lot("A", 1000, 0.85), lot("B", 40, 0.95)]).expect("catalog");
        let components = proposal(&[("B", 40.0), ("A", 210.0)]);

        let recipe = repair(&components, 250, &catalog).expect("repair");
        assert_eq!(recipe.to_proposed(), components);
    }

    #[test]
    fn test_empty_proposal_uses_cheapest_ingredients() {
        let catalog = Catalog::new(vec![
            lot("EXPENSIVE", 1000, 2.0),
            lot("CHEAP", 1000, 0.2),
            lot("MID", 1000, 0.5),
        ])
        .expect("catalog");

        let recipe = repair(&[], 300, &catalog).expect("repair");

        assert_valid(&recipe, 300, &catalog);
        assert!(recipe.quantity_of("CHEAP").is_some());
        assert!(recipe.quantity_of("MID").is_some());
        assert!(recipe.quantity_of("EXPENSIVE").is_none());
    }

    #[test]
    fn test_drops_unknown_and_duplicate_codes() {
        let catalog = Catalog::new(vec![lot("A", 1000, 0.85), lot("B", 1000, 0.95)]).expect("catalog");

        let recipe = repair(
            &proposal(&[("A", 100.0), ("Z", 100.0), ("A", 150.0), ("B", 60.5)]),
            250,
            &catalog,
        )
        .expect("repair");

        assert_valid(&recipe, 250, &catalog);
        assert_eq!(recipe.len(), 2);
        assert!(recipe.quantity_of("Z").is_none());
    }

    #[test]
    fn test_truncates_to_five_components() {
        let codes = ["A", "B", "C", "D", "E", "F", "G"];
        let catalog =
            Catalog::new(codes.iter().map(|c| lot(c, 1000, 0.5)).collect::<Vec<_>>()).expect("catalog");
        let components: Vec<ProposedComponent> = codes
            .iter()
            .enumerate()
            .map(|(i, code)| ProposedComponent::new(*code, 100.0 + i as f64))
            .collect();

        let recipe = repair(&components, 500, &catalog).expect("repair");

        assert_valid(&recipe, 500, &catalog);
        assert_eq!(recipe.len(), MAX_COMPONENTS);
        // The two smallest proposals are the ones dropped.
        assert!(recipe.quantity_of("A").is_none());
        assert!(recipe.quantity_of("B").is_none());
    }

    #[test]
    fn test_clamps_to_stock_and_fills_from_catalog() {
        let catalog = Catalog::new(vec![
            lot("A", 100, 0.85),
            lot("B", 100, 0.95),
            lot("C", 1000, 0.30),
        ])
        .expect("catalog");

        let recipe = repair(&proposal(&[("A", 400.0), ("B", 400.0)]), 500, &catalog).expect("repair");

        assert_valid(&recipe, 500, &catalog);
        assert_eq!(recipe.quantity_of("A"), Some(100));
        assert_eq!(recipe.quantity_of("B"), Some(100));
        assert_eq!(recipe.quantity_of("C"), Some(300));
    }

    #[test]
    fn test_insufficient_capacity_is_infeasible() {
        let catalog = Catalog::new(
            ["A", "B", "C", "D", "E", "F"]
                .iter()
                .map(|c| lot(c, 30, 0.5))
                .collect::<Vec<_>>(),
        )
        .expect("catalog");

        let err = repair(&proposal(&[("A", 125.0), ("B", 125.0)]), 250, &catalog).unwrap_err();
        assert!(matches!(
            err,
            RepairError::Infeasible {
                requested: 250,
                reached: 150
            }
        ));
    }

    #[test]
    fn test_total_below_two_minimums_is_infeasible() {
        let catalog = Catalog::new(vec![lot("A", 1000, 0.85), lot("B", 1000, 0.95)]).expect("catalog");
        let err = repair(&[], 30, &catalog).unwrap_err();
        assert!(matches!(err, RepairError::Infeasible { requested: 30, .. }));
    }

    #[test]
    fn test_excess_components_at_minimum_are_dropped() {
        let catalog = Catalog::new(
            ["A", "B", "C", "D"]
                .iter()
                .map(|c| lot(c, 1000, 0.5))
                .collect::<Vec<_>>(),
        )
        .expect("catalog");

        let recipe = repair(
            &proposal(&[("A", 20.0), ("B", 20.0), ("C", 20.0), ("D", 20.0)]),
            50,
            &catalog,
        )
        .expect("repair");

        assert_valid(&recipe, 50, &catalog);
        assert_eq!(recipe.len(), 2);
    }

    #[test]
    fn test_stock_limited_shortfall_swaps_in_deeper_lot() {
        let catalog = Catalog::new(vec![
            lot("A", 20, 0.1),
            lot("B", 20, 0.2),
            lot("C", 1000, 1.0),
        ])
        .expect("catalog");

        let recipe = repair(&[], 50, &catalog).expect("catalog can reach 50");

        assert_valid(&recipe, 50, &catalog);
        assert_eq!(recipe.quantity_of("C"), Some(30));
    }

    #[test]
    fn test_swap_keeps_small_shortfall_within_five_components() {
        let mut lots: Vec<Ingredient> = ["A", "B", "C", "D", "E"]
            .iter()
            .map(|c| lot(c, 20, 0.1))
            .collect();
        lots.push(lot("DEEP", 500, 3.0));
        let catalog = Catalog::new(lots).expect("catalog");

        let recipe = repair(&[], 105, &catalog).expect("repair");

        assert_valid(&recipe, 105, &catalog);
        assert_eq!(recipe.quantity_of("DEEP"), Some(25));
    }

    #[test]
    fn test_no_usable_ingredients() {
        let catalog = Catalog::new(vec![lot("A", 10, 0.85), lot("B", 5, 0.95)]).expect("catalog");
        let err = repair(&[], 100, &catalog).unwrap_err();
        assert!(matches!(err, RepairError::NoUsableIngredients { minimum: 20 }));
    }

    #[test]
    fn test_single_usable_ingredient() {
        let catalog = Catalog::new(vec![lot("A", 1000, 0.85), lot("B", 5, 0.95)]).expect("catalog");
        let err = repair(&proposal(&[("B", 50.0)]), 100, &catalog).unwrap_err();
        assert!(matches!(err, RepairError::NotEnoughIngredients));
    }

    #[test]
    fn test_repair_output_always_validates() {
        let catalog = Catalog::new(vec![
            lot("A", 1000, 0.85),
            lot("B", 40, 0.95),
            lot("C", 300, 0.40),
            lot("D", 75, 1.20),
        ])
        .expect("catalog");

        let inputs = vec![
            proposal(&[]),
            proposal(&[("Z", 1.0)]),
            proposal(&[("A", -5.0), ("B", f64::NAN)]),
            proposal(&[("D", 74.9), ("D", 80.0), ("C", 0.1)]),
            proposal(&[("A", 1e12), ("B", 1e12), ("C", 1e12), ("D", 1e12)]),
            proposal(&[("A", 33.3), ("B", 33.3), ("C", 33.3)]),
        ];

        for total in [40u32, 99, 250, 1000, 1415] {
            for input in &inputs {
                let recipe = repair(input, total, &catalog)
                    .unwrap_or_else(|e| panic!("repair failed for {:?} / {}: {}", input, total, e));
                assert_valid(&recipe, total, &catalog);
            }
        }
    }
}
