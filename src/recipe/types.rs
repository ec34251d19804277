//! Recipe, candidate, and scored-candidate types.

use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;

use super::scorer;

/// Minimum number of components in a valid recipe.
pub const MIN_COMPONENTS: usize = 2;

/// Maximum number of components in a valid recipe.
pub const MAX_COMPONENTS: usize = 5;

/// Minimum quantity of any single component.
pub const MIN_QUANTITY: u32 = 20;

/// A component as proposed by the generator.
///
/// The quantity is a float because the generator is free to emit
/// non-integers; the validator is what rejects them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProposedComponent {
    pub ingredient_code: String,
    pub quantity: f64,
}

impl ProposedComponent {
    pub fn new(ingredient_code: impl Into<String>, quantity: f64) -> Self {
        Self {
            ingredient_code: ingredient_code.into(),
            quantity,
        }
    }
}

/// A validated recipe component.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecipeComponent {
    pub ingredient_code: String,
    pub quantity: u32,
}

/// A recipe that satisfied every hard constraint when it was built.
///
/// Recipes are only constructed by the validator (directly or through the
/// repair engine), so holding one means the invariants held against the
/// catalog snapshot it was checked with.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Recipe {
    components: Vec<RecipeComponent>,
}

impl Recipe {
    pub(crate) fn from_validated(components: Vec<RecipeComponent>) -> Self {
        Self { components }
    }

    /// Components in their original order.
    pub fn components(&self) -> &[RecipeComponent] {
        &self.components
    }

    /// Number of components.
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Always false for a validated recipe; provided for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Sum of all component quantities.
    pub fn total_quantity(&self) -> u64 {
        self.components.iter().map(|c| u64::from(c.quantity)).sum()
    }

    /// Quantity of a given ingredient, if present.
    pub fn quantity_of(&self, code: &str) -> Option<u32> {
        self.components
            .iter()
            .find(|c| c.ingredient_code == code)
            .map(|c| c.quantity)
    }

    /// Converts back into the generator's component shape.
    pub fn to_proposed(&self) -> Vec<ProposedComponent> {
        self.components
            .iter()
            .map(|c| ProposedComponent::new(c.ingredient_code.clone(), f64::from(c.quantity)))
            .collect()
    }
}

/// A single generator proposal.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Candidate {
    pub components: Vec<ProposedComponent>,
    /// Free-form reasoning returned alongside the components.
    #[serde(default)]
    pub explanation: String,
}

impl Candidate {
    pub fn new(components: Vec<ProposedComponent>, explanation: impl Into<String>) -> Self {
        Self {
            components,
            explanation: explanation.into(),
        }
    }
}

/// A candidate tagged with its penalty and the attempt that produced it.
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub candidate: Candidate,
    pub penalty: f64,
    pub attempt: u32,
}

impl ScoredCandidate {
    /// Scores a candidate against the catalog.
    pub fn score(candidate: Candidate, requested_total: u32, catalog: &Catalog, attempt: u32) -> Self {
        let penalty = scorer::score(&candidate.components, requested_total, catalog);
        Self {
            candidate,
            penalty,
            attempt,
        }
    }

    /// Returns true when this candidate ranks strictly better than `other`.
    ///
    /// Ties keep the earlier candidate.
    pub fn beats(&self, other: &ScoredCandidate) -> bool {
        self.penalty < other.penalty
    }
}
