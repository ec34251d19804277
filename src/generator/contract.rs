//! Typed contract between the orchestrator and a recipe generator.
//!
//! The orchestrator only ever sees a [`GeneratorProposal`] or a
//! [`GeneratorError`]. Whatever the backend actually returns is parsed or
//! rejected inside the adapter.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, SENSORY_DIMENSIONS};
use crate::error::GeneratorError;
use crate::recipe::{Candidate, Objective, Preferences, ProposedComponent};

/// A proposal from the generator. May violate any constraint.
pub type GeneratorProposal = Candidate;

/// Catalog entry as shown to the generator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogEntry {
    pub code: String,
    pub name: String,
    pub stock_quantity: u32,
    pub cost_per_unit: f64,
    pub sensory: [f64; SENSORY_DIMENSIONS],
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl CatalogEntry {
    /// Snapshot of every ingredient in the catalog, in code order.
    pub fn from_catalog(catalog: &Catalog) -> Vec<CatalogEntry> {
        catalog
            .iter()
            .map(|i| CatalogEntry {
                code: i.code.clone(),
                name: i.name.clone(),
                stock_quantity: i.stock_quantity,
                cost_per_unit: i.cost_per_unit,
                sensory: i.sensory,
                tags: i.tags.clone(),
            })
            .collect()
    }
}

/// Everything the generator gets for one attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorRequest {
    pub catalog: Vec<CatalogEntry>,
    pub total_quantity: u32,
    pub objective: Objective,
    pub preferences: Preferences,
    /// Why the previous attempt was rejected, if there was one.
    pub previous_failure: Option<String>,
    /// 1-based attempt number.
    pub attempt: u32,
}

/// A source of candidate recipes.
#[async_trait]
pub trait RecipeGenerator: Send + Sync {
    /// Proposes a candidate for the request.
    ///
    /// Returns `Err` only when nothing usable came back; a proposal that
    /// breaks constraints is still `Ok`.
    async fn propose(&self, request: &GeneratorRequest) -> Result<GeneratorProposal, GeneratorError>;
}

/// Response shape the generator must produce.
#[derive(Debug, Clone, Deserialize)]
struct WireProposal {
    components: Vec<WireComponent>,
    #[serde(default)]
    explanation: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct WireComponent {
    #[serde(alias = "code")]
    ingredient_code: String,
    quantity: f64,
}

impl WireProposal {
    fn into_proposal(self) -> GeneratorProposal {
        let components = self
            .components
            .into_iter()
            .map(|c| ProposedComponent::new(c.ingredient_code.trim(), c.quantity))
            .collect();
        Candidate::new(components, self.explanation.unwrap_or_default())
    }
}

/// Parses a raw JSON object into a proposal.
///
/// # Errors
///
/// `MalformedResponse` when the JSON does not match the expected shape.
pub fn parse_proposal(json: &str) -> Result<GeneratorProposal, GeneratorError> {
    serde_json::from_str::<WireProposal>(json)
        .map(WireProposal::into_proposal)
        .map_err(|e| GeneratorError::MalformedResponse(e.to_string()))
}
