//! LLM-backed recipe generator.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::GeneratorError;
use crate::llm::{GenerationRequest, LlmProvider, Message};
use crate::utils::json_extraction::extract_json_object;

use super::contract::{parse_proposal, GeneratorProposal, GeneratorRequest, RecipeGenerator};
use super::prompts::build_recipe_prompt;

/// Default sampling temperature for recipe generation.
pub const DEFAULT_TEMPERATURE: f64 = 0.4;

/// Default completion budget for one proposal.
pub const DEFAULT_MAX_TOKENS: u32 = 1500;

/// Generator that asks an LLM for a blend and parses its answer.
pub struct LlmRecipeGenerator {
    llm: Arc<dyn LlmProvider>,
    model: String,
    temperature: f64,
    max_tokens: u32,
}

impl LlmRecipeGenerator {
    /// Creates a generator using the provider's default model.
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self {
            llm,
            model: String::new(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    /// Overrides the model name sent with each request.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the sampling temperature.
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    /// Sets the completion token budget.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

#[async_trait]
impl RecipeGenerator for LlmRecipeGenerator {
    async fn propose(&self, request: &GeneratorRequest) -> Result<GeneratorProposal, GeneratorError> {
        let prompt = build_recipe_prompt(request);

        let llm_request = GenerationRequest::new(
            self.model.clone(),
            vec![Message::system(prompt.system), Message::user(prompt.user)],
        )
        .with_temperature(self.temperature)
        .with_max_tokens(self.max_tokens)
        .with_json_mode();

        let response = self.llm.generate(llm_request).await?;

        let content = response
            .first_content()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or(GeneratorError::EmptyResponse)?;

        let json = extract_json_object(content)
            .map_err(|e| GeneratorError::MalformedResponse(e.to_string()))?;

        let proposal = parse_proposal(&json)?;

        tracing::debug!(
            attempt = request.attempt,
            components = proposal.components.len(),
            "Generator returned proposal"
        );

        Ok(proposal)
    }
}
