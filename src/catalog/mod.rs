//! Ingredient catalog snapshots.
//!
//! The catalog is owned by an external system. Each synthesis run loads a
//! fresh snapshot through a [`CatalogSource`] and works against that
//! immutable [`Catalog`] for the rest of the run.
//!
//! Two sources ship with the crate:
//! - [`StaticCatalog`]: an in-memory list, also loadable from a JSON file
//! - `storage::Database`: the Postgres `ingredients` table

pub mod ingredient;

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

pub use ingredient::{
    Ingredient, SENSORY_DIMENSIONS, SENSORY_DIMENSION_NAMES, SENSORY_MAX, SENSORY_MIN,
};

/// Errors that can occur while building or loading a catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("ingredient code '{0}' appears more than once in the catalog")]
    DuplicateCode(String),

    #[error("catalog backend error: {0}")]
    Backend(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// An immutable snapshot of the active ingredients, keyed by code.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    ingredients: BTreeMap<String, Ingredient>,
}

impl Catalog {
    /// Builds a catalog from raw ingredient records.
    ///
    /// Inactive ingredients are dropped and sensory values are clamped.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::DuplicateCode` if two active records share a code.
    pub fn new(ingredients: impl IntoIterator<Item = Ingredient>) -> Result<Self, CatalogError> {
        let mut map = BTreeMap::new();
        for ingredient in ingredients.into_iter().filter(|i| i.active) {
            let ingredient = ingredient.normalized();
            if map.contains_key(&ingredient.code) {
                return Err(CatalogError::DuplicateCode(ingredient.code));
            }
            map.insert(ingredient.code.clone(), ingredient);
        }
        Ok(Self { ingredients: map })
    }

    /// Looks up an ingredient by code.
    pub fn get(&self, code: &str) -> Option<&Ingredient> {
        self.ingredients.get(code)
    }

    /// Returns whether the catalog contains the code.
    pub fn contains(&self, code: &str) -> bool {
        self.ingredients.contains_key(code)
    }

    /// Number of active ingredients.
    pub fn len(&self) -> usize {
        self.ingredients.len()
    }

    /// Returns true when there are no active ingredients.
    pub fn is_empty(&self) -> bool {
        self.ingredients.is_empty()
    }

    /// Iterates ingredients in code order.
    pub fn iter(&self) -> impl Iterator<Item = &Ingredient> {
        self.ingredients.values()
    }

    /// Ingredients sorted cheapest-per-unit first, ties broken by code.
    pub fn by_unit_cost(&self) -> Vec<&Ingredient> {
        let mut sorted: Vec<&Ingredient> = self.ingredients.values().collect();
        sorted.sort_by(|a, b| {
            a.cost_per_unit
                .total_cmp(&b.cost_per_unit)
                .then_with(|| a.code.cmp(&b.code))
        });
        sorted
    }

    /// Sum of stock across all ingredients.
    pub fn total_capacity(&self) -> u64 {
        self.ingredients
            .values()
            .map(|i| u64::from(i.stock_quantity))
            .sum()
    }
}

/// Source of catalog snapshots.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Loads the current set of active ingredients.
    async fn load(&self) -> Result<Catalog, CatalogError>;
}

/// In-memory catalog source.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    ingredients: Vec<Ingredient>,
}

impl StaticCatalog {
    /// Creates a source that always returns the given ingredients.
    pub fn new(ingredients: Vec<Ingredient>) -> Self {
        Self { ingredients }
    }

    /// Reads a JSON array of ingredients from disk.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path)?;
        let ingredients: Vec<Ingredient> = serde_json::from_str(&content)?;
        Ok(Self::new(ingredients))
    }
}

#[async_trait]
impl CatalogSource for StaticCatalog {
    async fn load(&self) -> Result<Catalog, CatalogError> {
        Catalog::new(self.ingredients.clone())
    }
}
