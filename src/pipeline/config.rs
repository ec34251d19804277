//! Application configuration.
//!
//! Every setting has a default and can be overridden from the environment.
//! CLI flags override selected values after loading.

use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

use crate::generator::{DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE};
use crate::llm::DEFAULT_MODEL;
use crate::recipe::pricing::PricingPolicy;
use crate::scheduler::worker::WorkerConfig;

use super::orchestrator::{SynthesisConfig, DEFAULT_MAX_GENERATION_ATTEMPTS};

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    /// An environment variable has an invalid value.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration for every blendforge command.
#[derive(Debug, Clone)]
pub struct AppConfig {
    // Storage
    /// Postgres URL. Only store-backed commands require it.
    pub database_url: Option<String>,

    // LLM
    pub llm_api_base: Option<String>,
    pub llm_api_key: Option<String>,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,

    // Synthesis
    pub max_generation_attempts: u32,
    /// Upper bound on a single generator call.
    pub generator_timeout: Duration,
    pub pricing: PricingPolicy,

    // Worker
    pub worker_id: String,
    pub poll_interval: Duration,
    /// Job attempts before a failing job is marked `failed`.
    pub max_job_attempts: u32,
    /// Running jobs whose lease is older than this are requeued. Zero disables.
    pub lease_timeout: Duration,
    /// The worker sweeps for stale leases every this many ticks.
    pub reclaim_every_ticks: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: None,

            llm_api_base: None,
            llm_api_key: None,
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,

            max_generation_attempts: DEFAULT_MAX_GENERATION_ATTEMPTS,
            generator_timeout: Duration::from_secs(60),
            pricing: PricingPolicy::default(),

            worker_id: default_worker_id(),
            poll_interval: Duration::from_millis(2000),
            max_job_attempts: 3,
            lease_timeout: Duration::from_secs(900),
            reclaim_every_ticks: 30,
        }
    }
}

fn default_worker_id() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("worker-{}", &id[..8])
}

impl AppConfig {
    /// Creates configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `DATABASE_URL`: Postgres connection URL
    /// - `LITELLM_API_BASE`, `LITELLM_API_KEY`: LLM endpoint and key
    /// - `BLENDFORGE_MODEL`: model name (default: openai/gpt-4o-mini)
    /// - `BLENDFORGE_TEMPERATURE` (default: 0.4)
    /// - `BLENDFORGE_MAX_TOKENS` (default: 1500)
    /// - `BLENDFORGE_MAX_GENERATION_ATTEMPTS` (default: 5)
    /// - `BLENDFORGE_GENERATOR_TIMEOUT_SECS` (default: 60)
    /// - `BLENDFORGE_PACKAGING_COST` (default: 15)
    /// - `BLENDFORGE_MARGIN_FRACTION` (default: 0.15)
    /// - `BLENDFORGE_ROUNDING_STEP` (default: 5)
    /// - `BLENDFORGE_WORKER_ID` (default: `worker-<random>`)
    /// - `BLENDFORGE_POLL_INTERVAL_MS` (default: 2000)
    /// - `BLENDFORGE_MAX_JOB_ATTEMPTS` (default: 3)
    /// - `BLENDFORGE_LEASE_TIMEOUT_SECS` (default: 900, 0 disables reclaim)
    /// - `BLENDFORGE_RECLAIM_EVERY_TICKS` (default: 30)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable cannot be parsed or the result
    /// fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        // Storage
        config.database_url = get("DATABASE_URL");

        // LLM
        config.llm_api_base = get("LITELLM_API_BASE");
        config.llm_api_key = get("LITELLM_API_KEY");
        if let Some(val) = get("BLENDFORGE_MODEL") {
            config.model = val;
        }
        if let Some(val) = get("BLENDFORGE_TEMPERATURE") {
            config.temperature = parse_env_value(&val, "BLENDFORGE_TEMPERATURE")?;
        }
        if let Some(val) = get("BLENDFORGE_MAX_TOKENS") {
            config.max_tokens = parse_env_value(&val, "BLENDFORGE_MAX_TOKENS")?;
        }

        // Synthesis
        if let Some(val) = get("BLENDFORGE_MAX_GENERATION_ATTEMPTS") {
            config.max_generation_attempts =
                parse_env_value(&val, "BLENDFORGE_MAX_GENERATION_ATTEMPTS")?;
        }
        if let Some(val) = get("BLENDFORGE_GENERATOR_TIMEOUT_SECS") {
            let secs: u64 = parse_env_value(&val, "BLENDFORGE_GENERATOR_TIMEOUT_SECS")?;
            config.generator_timeout = Duration::from_secs(secs);
        }
        if let Some(val) = get("BLENDFORGE_PACKAGING_COST") {
            config.pricing.packaging_cost = parse_env_value(&val, "BLENDFORGE_PACKAGING_COST")?;
        }
        if let Some(val) = get("BLENDFORGE_MARGIN_FRACTION") {
            config.pricing.margin_fraction = parse_env_value(&val, "BLENDFORGE_MARGIN_FRACTION")?;
        }
        if let Some(val) = get("BLENDFORGE_ROUNDING_STEP") {
            config.pricing.rounding_step = parse_env_value(&val, "BLENDFORGE_ROUNDING_STEP")?;
        }

        // Worker
        if let Some(val) = get("BLENDFORGE_WORKER_ID") {
            config.worker_id = val;
        }
        if let Some(val) = get("BLENDFORGE_POLL_INTERVAL_MS") {
            let ms: u64 = parse_env_value(&val, "BLENDFORGE_POLL_INTERVAL_MS")?;
            config.poll_interval = Duration::from_millis(ms);
        }
        if let Some(val) = get("BLENDFORGE_MAX_JOB_ATTEMPTS") {
            config.max_job_attempts = parse_env_value(&val, "BLENDFORGE_MAX_JOB_ATTEMPTS")?;
        }
        if let Some(val) = get("BLENDFORGE_LEASE_TIMEOUT_SECS") {
            let secs: u64 = parse_env_value(&val, "BLENDFORGE_LEASE_TIMEOUT_SECS")?;
            config.lease_timeout = Duration::from_secs(secs);
        }
        if let Some(val) = get("BLENDFORGE_RECLAIM_EVERY_TICKS") {
            config.reclaim_every_ticks = parse_env_value(&val, "BLENDFORGE_RECLAIM_EVERY_TICKS")?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` if any values are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "model cannot be empty".to_string(),
            ));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationFailed(
                "temperature must be between 0.0 and 2.0".to_string(),
            ));
        }

        if self.max_tokens == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_tokens must be greater than 0".to_string(),
            ));
        }

        if self.max_generation_attempts == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_generation_attempts must be greater than 0".to_string(),
            ));
        }

        if self.generator_timeout.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "generator_timeout must be greater than 0".to_string(),
            ));
        }

        if !self.pricing.packaging_cost.is_finite() || self.pricing.packaging_cost < 0.0 {
            return Err(ConfigError::ValidationFailed(
                "packaging_cost cannot be negative".to_string(),
            ));
        }

        if !self.pricing.margin_fraction.is_finite() || self.pricing.margin_fraction < 0.0 {
            return Err(ConfigError::ValidationFailed(
                "margin_fraction cannot be negative".to_string(),
            ));
        }

        if !self.pricing.rounding_step.is_finite() || self.pricing.rounding_step < 0.0 {
            return Err(ConfigError::ValidationFailed(
                "rounding_step cannot be negative".to_string(),
            ));
        }

        if self.worker_id.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "worker_id cannot be empty".to_string(),
            ));
        }

        if self.poll_interval.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "poll_interval must be greater than 0".to_string(),
            ));
        }

        if self.max_job_attempts == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_job_attempts must be greater than 0".to_string(),
            ));
        }

        if self.reclaim_every_ticks == 0 {
            return Err(ConfigError::ValidationFailed(
                "reclaim_every_ticks must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Returns the database URL or the error store-backed commands report.
    pub fn require_database_url(&self) -> Result<&str, ConfigError> {
        self.database_url
            .as_deref()
            .ok_or_else(|| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))
    }

    /// Orchestrator settings.
    pub fn synthesis(&self) -> SynthesisConfig {
        SynthesisConfig {
            max_attempts: self.max_generation_attempts,
            generator_timeout: self.generator_timeout,
            pricing: self.pricing,
        }
    }

    /// Worker loop settings.
    pub fn worker(&self) -> WorkerConfig {
        WorkerConfig::new(self.worker_id.clone())
            .with_poll_interval(self.poll_interval)
            .with_max_attempts(self.max_job_attempts)
            .with_lease_timeout(self.lease_timeout)
            .with_reclaim_every_ticks(self.reclaim_every_ticks)
    }

    /// Builder method to set the database URL.
    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self
    }

    /// Builder method to set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Builder method to set temperature.
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    /// Builder method to set the generation attempt budget.
    pub fn with_max_generation_attempts(mut self, attempts: u32) -> Self {
        self.max_generation_attempts = attempts;
        self
    }

    /// Builder method to set the worker id.
    pub fn with_worker_id(mut self, worker_id: impl Into<String>) -> Self {
        self.worker_id = worker_id.into();
        self
    }

    /// Builder method to set the job attempt budget.
    pub fn with_max_job_attempts(mut self, attempts: u32) -> Self {
        self.max_job_attempts = attempts;
        self
    }
}

/// Parse an environment variable value into a type.
fn parse_env_value<T: std::str::FromStr>(value: &str, key: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("could not parse '{}'", value),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe::pricing::{
        DEFAULT_MARGIN_FRACTION, DEFAULT_PACKAGING_COST, DEFAULT_ROUNDING_STEP,
    };
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert!(config.database_url.is_none());
        assert!((config.temperature - 0.4).abs() < f64::EPSILON);
        assert_eq!(config.max_tokens, 1500);
        assert_eq!(config.max_generation_attempts, 5);
        assert_eq!(config.generator_timeout, Duration::from_secs(60));
        assert_eq!(config.pricing, PricingPolicy::default());
        assert_eq!(config.pricing.packaging_cost, DEFAULT_PACKAGING_COST);
        assert_eq!(config.pricing.margin_fraction, DEFAULT_MARGIN_FRACTION);
        assert_eq!(config.pricing.rounding_step, DEFAULT_ROUNDING_STEP);
        assert_eq!(config.poll_interval, Duration::from_millis(2000));
        assert_eq!(config.max_job_attempts, 3);
        assert_eq!(config.lease_timeout, Duration::from_secs(900));
        assert!(config.worker_id.starts_with("worker-"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/blendforge"),
            ("BLENDFORGE_MODEL", "anthropic/claude-sonnet"),
            ("BLENDFORGE_MAX_GENERATION_ATTEMPTS", "3"),
            ("BLENDFORGE_ROUNDING_STEP", "0"),
            ("BLENDFORGE_WORKER_ID", "roaster-1"),
            ("BLENDFORGE_LEASE_TIMEOUT_SECS", "0"),
            ("LITELLM_API_KEY", ""),
        ]))
        .expect("config");

        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/blendforge")
        );
        assert_eq!(config.model, "anthropic/claude-sonnet");
        assert_eq!(config.max_generation_attempts, 3);
        assert_eq!(config.pricing.rounding_step, 0.0);
        assert_eq!(config.worker_id, "roaster-1");
        assert!(config.lease_timeout.is_zero());
        assert!(config.llm_api_key.is_none());
    }

    #[test]
    fn test_from_lookup_rejects_garbage() {
        let result = AppConfig::from_lookup(lookup(&[("BLENDFORGE_MAX_JOB_ATTEMPTS", "many")]));
        match result {
            Err(ConfigError::InvalidValue { key, .. }) => {
                assert_eq!(key, "BLENDFORGE_MAX_JOB_ATTEMPTS")
            }
            other => panic!("expected InvalidValue, got {:?}", other),
        }
    }

    #[test]
    fn test_validation_failures() {
        let cases = [
            (AppConfig::default().with_temperature(3.0), "temperature"),
            (
                AppConfig::default().with_max_generation_attempts(0),
                "max_generation_attempts",
            ),
            (AppConfig::default().with_max_job_attempts(0), "max_job_attempts"),
            (AppConfig::default().with_worker_id("  "), "worker_id"),
            (AppConfig::default().with_model(""), "model"),
        ];

        for (config, field) in cases {
            let err = config.validate().expect_err("should fail validation");
            assert!(err.to_string().contains(field), "{} not in {}", field, err);
        }
    }

    #[test]
    fn test_require_database_url() {
        assert!(matches!(
            AppConfig::default().require_database_url(),
            Err(ConfigError::MissingEnvVar(_))
        ));
        let config = AppConfig::default().with_database_url("postgres://x");
        assert_eq!(config.require_database_url().expect("url"), "postgres://x");
    }

    #[test]
    fn test_derived_configs() {
        let config = AppConfig::default()
            .with_worker_id("w-1")
            .with_max_job_attempts(7)
            .with_max_generation_attempts(2);

        let synthesis = config.synthesis();
        assert_eq!(synthesis.max_attempts, 2);

        let worker = config.worker();
        assert_eq!(worker.worker_id, "w-1");
        assert_eq!(worker.max_attempts, 7);
    }
}
