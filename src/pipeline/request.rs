//! Blend request and result types.

use serde::{Deserialize, Serialize};

use crate::error::SynthesisError;
use crate::recipe::{Objective, Preferences, PricingResult, Recipe, SensoryProfile};

/// A customer's blend request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BlendRequest {
    /// Exact total quantity in grams.
    pub total_quantity: u32,
    #[serde(default)]
    pub objective: Objective,
    #[serde(default)]
    pub preferences: Preferences,
}

impl BlendRequest {
    /// Creates a balanced request with no preferences.
    pub fn new(total_quantity: u32) -> Self {
        Self {
            total_quantity,
            objective: Objective::default(),
            preferences: Preferences::new(),
        }
    }

    /// Sets the objective.
    pub fn with_objective(mut self, objective: Objective) -> Self {
        self.objective = objective;
        self
    }

    /// Adds one preference.
    pub fn with_preference(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.preferences.insert(key.into(), value);
        self
    }

    /// Checks the request shape.
    ///
    /// # Errors
    ///
    /// `SynthesisError::InvalidRequest` when the total is zero.
    pub fn validate(&self) -> Result<(), SynthesisError> {
        if self.total_quantity == 0 {
            return Err(SynthesisError::InvalidRequest(
                "total_quantity must be a positive integer".to_string(),
            ));
        }
        Ok(())
    }
}

/// The outcome of a successful synthesis run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BlendResult {
    pub recipe: Recipe,
    pub pricing: PricingResult,
    pub target_profile: SensoryProfile,
    pub blend_profile: SensoryProfile,
    /// True when no generator attempt validated and the recipe came from repair.
    pub used_fallback_repair: bool,
    /// Generator calls made during the run.
    pub attempts_used: u32,
    /// Generator's reasoning for the accepted candidate, if any.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub explanation: String,
}
