//! LLM integration.
//!
//! Provides the [`LlmProvider`] trait and a LiteLLM-compatible HTTP client.
//! The recipe generator is built on top of this.
//!
//! ```ignore
//! use blendforge::llm::{GenerationRequest, LiteLlmClient, LlmProvider, Message};
//!
//! let client = LiteLlmClient::from_env()?;
//! let request = GenerationRequest::new("", vec![Message::user("Hello")]);
//! let response = client.generate(request).await?;
//! ```

pub mod litellm;

pub use litellm::{
    Choice, GenerationRequest, GenerationResponse, LiteLlmClient, LlmProvider, Message, Usage,
    DEFAULT_MODEL,
};
