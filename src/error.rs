//! Error types for blendforge operations.
//!
//! Defines error types for the major subsystems:
//! - LLM API interactions
//! - Recipe constraint violations and repair
//! - Generator contract (parse-or-reject boundary)
//! - Blend synthesis (orchestrator terminal errors)

use thiserror::Error;

/// Errors that can occur during LLM operations.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Missing API base URL: LITELLM_API_BASE environment variable not set")]
    MissingApiBase,

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse LLM response: {0}")]
    ParseError(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("API error ({code}): {message}")]
    ApiError { code: u16, message: String },
}

/// A hard-constraint violation found by the validator.
///
/// The `Display` text is fed back to the generator verbatim on the next
/// attempt, so messages name the offending code and the exact limit.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RecipeViolation {
    #[error("recipe must have between {min} and {max} components, got {actual}")]
    WrongCount {
        min: usize,
        max: usize,
        actual: usize,
    },

    #[error("ingredient code '{0}' is not in the catalog")]
    UnknownCode(String),

    #[error("ingredient code '{0}' appears more than once")]
    DuplicateCode(String),

    #[error("quantity {quantity} for '{code}' is not a whole number")]
    NonInteger { code: String, quantity: f64 },

    #[error("quantity {quantity} for '{code}' is below the minimum of {minimum}")]
    BelowMinimum {
        code: String,
        quantity: f64,
        minimum: u32,
    },

    #[error("quantity {quantity} for '{code}' exceeds available stock of {stock}")]
    OverStock {
        code: String,
        quantity: u32,
        stock: u32,
    },

    #[error("quantities sum to {actual} but the requested total is {expected}")]
    WrongSum { expected: u32, actual: u64 },
}

/// Errors raised by the repair engine.
#[derive(Debug, Error)]
pub enum RepairError {
    #[error("catalog has no ingredient with at least {minimum} units in stock")]
    NoUsableIngredients { minimum: u32 },

    #[error("catalog cannot supply two distinct ingredients at the minimum quantity")]
    NotEnoughIngredients,

    #[error("cannot reach requested total {requested}: closest reachable sum is {reached}")]
    Infeasible { requested: u32, reached: u64 },

    #[error("repaired recipe failed validation: {0}")]
    Unverified(#[from] RecipeViolation),
}

/// Errors at the generator boundary.
///
/// Every variant is recoverable from the orchestrator's point of view: it is
/// recorded as the failure reason for the next attempt.
#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("generator returned no content")]
    EmptyResponse,

    #[error("generator response does not match the expected shape: {0}")]
    MalformedResponse(String),

    #[error("generator call timed out after {seconds} seconds")]
    Timeout { seconds: u64 },
}

/// Terminal errors from a synthesis run.
///
/// Generator failures and constraint violations never appear here; they are
/// absorbed by the retry loop and the repair fallback.
#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("catalog is empty: no active ingredients available")]
    EmptyCatalog,

    #[error("catalog could not be loaded: {0}")]
    CatalogUnavailable(String),

    #[error("repair failed: {0}")]
    Repair(#[from] RepairError),
}

impl SynthesisError {
    /// Whether running the same request again could succeed.
    ///
    /// A malformed request fails the same way every time; catalog and repair
    /// failures depend on stock that can change between attempts.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, SynthesisError::InvalidRequest(_))
    }
}
