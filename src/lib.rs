//! blendforge: constraint-satisfying coffee blend synthesis.
//!
//! An LLM proposes candidate recipes; a deterministic validator, scorer and
//! repair engine guarantee that every finished job holds a valid recipe.
//! Requests are persisted as jobs and executed by polling workers that lease
//! them with a compare-and-swap claim.

pub mod catalog;
pub mod cli;
pub mod error;
pub mod generator;
pub mod llm;
pub mod metrics;
pub mod pipeline;
pub mod recipe;
pub mod scheduler;
pub mod storage;
pub mod utils;

// Re-export commonly used error types
pub use error::{GeneratorError, LlmError, RecipeViolation, RepairError, SynthesisError};
