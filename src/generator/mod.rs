//! Recipe generators.
//!
//! A generator proposes candidate blends and cannot be trusted to respect
//! hard constraints. This module defines the typed request/response
//! contract ([`RecipeGenerator`]) and the LLM-backed implementation.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use blendforge::generator::{LlmRecipeGenerator, RecipeGenerator};
//! use blendforge::llm::LiteLlmClient;
//!
//! let llm = Arc::new(LiteLlmClient::from_env()?);
//! let generator = LlmRecipeGenerator::new(llm).with_temperature(0.4);
//! let proposal = generator.propose(&request).await?;
//! ```

pub mod contract;
pub mod llm;
pub mod prompts;

pub use contract::{
    parse_proposal, CatalogEntry, GeneratorProposal, GeneratorRequest, RecipeGenerator,
};
pub use llm::{LlmRecipeGenerator, DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE};
pub use prompts::{build_recipe_prompt, RecipePrompt};
