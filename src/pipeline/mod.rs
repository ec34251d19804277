//! Blend synthesis pipeline.
//!
//! # Architecture
//!
//! - **Config**: environment-driven settings for every command
//! - **Request**: the customer request and the result handed back
//! - **Orchestrator**: generator retry loop with repair fallback
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use blendforge::pipeline::{AppConfig, BlendRequest, SynthesisOrchestrator};
//!
//! let config = AppConfig::from_env()?;
//! let orchestrator = SynthesisOrchestrator::new(generator, catalog, config.synthesis());
//!
//! let result = orchestrator.run(&BlendRequest::new(250)).await?;
//! println!("total price: {}", result.pricing.total);
//! ```

pub mod config;
pub mod orchestrator;
pub mod request;

pub use config::{AppConfig, ConfigError};
pub use orchestrator::{SynthesisConfig, SynthesisOrchestrator, DEFAULT_MAX_GENERATION_ATTEMPTS};
pub use request::{BlendRequest, BlendResult};
