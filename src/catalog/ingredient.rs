//! Ingredient records as read from the catalog.

use serde::{Deserialize, Serialize};

/// Number of sensory dimensions carried by every ingredient.
pub const SENSORY_DIMENSIONS: usize = 8;

/// Names of the sensory dimensions, in vector order.
pub const SENSORY_DIMENSION_NAMES: [&str; SENSORY_DIMENSIONS] = [
    "aroma",
    "acidity",
    "body",
    "sweetness",
    "bitterness",
    "fruitiness",
    "chocolate",
    "nuttiness",
];

/// Lower bound for an ingredient's sensory attribute.
pub const SENSORY_MIN: f64 = 1.0;

/// Upper bound for an ingredient's sensory attribute.
pub const SENSORY_MAX: f64 = 10.0;

/// A single blendable ingredient (a coffee lot).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ingredient {
    /// Unique catalog code, e.g. "ETH-YRG-W".
    pub code: String,
    /// Human readable name.
    pub name: String,
    /// Units (grams) currently available.
    pub stock_quantity: u32,
    /// Cost per unit in the catalog currency.
    pub cost_per_unit: f64,
    /// Cupping attributes, one per entry of [`SENSORY_DIMENSION_NAMES`].
    pub sensory: [f64; SENSORY_DIMENSIONS],
    /// Free-form tags (origin, process, ...).
    #[serde(default)]
    pub tags: Vec<String>,
    /// Inactive ingredients are never offered to the generator.
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl Ingredient {
    /// Creates an active ingredient with no tags.
    ///
    /// Sensory values are clamped into `[1, 10]`.
    pub fn new(
        code: impl Into<String>,
        name: impl Into<String>,
        stock_quantity: u32,
        cost_per_unit: f64,
        sensory: [f64; SENSORY_DIMENSIONS],
    ) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            stock_quantity,
            cost_per_unit,
            sensory,
            tags: Vec::new(),
            active: true,
        }
        .normalized()
    }

    /// Sets the tag list.
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Marks the ingredient inactive.
    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    /// Returns a copy with sensory values clamped and non-finite values
    /// replaced by the lower bound.
    pub fn normalized(mut self) -> Self {
        for value in self.sensory.iter_mut() {
            *value = if value.is_finite() {
                value.clamp(SENSORY_MIN, SENSORY_MAX)
            } else {
                SENSORY_MIN
            };
        }
        if !self.cost_per_unit.is_finite() || self.cost_per_unit < 0.0 {
            self.cost_per_unit = 0.0;
        }
        self
    }
}
