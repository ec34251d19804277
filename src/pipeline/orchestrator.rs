//! Synthesis orchestrator.
//!
//! Runs the bounded generator retry loop for one blend request:
//! - each attempt carries the previous rejection reason back to the generator
//! - every proposal is scored and the best one is retained
//! - the first proposal that validates is priced, profiled and returned
//! - when attempts run out the best proposal (or nothing) goes through repair
//!
//! Generator errors and constraint violations never escape this module; only
//! an invalid request, an unusable catalog or a repair failure does.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::catalog::{Catalog, CatalogSource};
use crate::error::{GeneratorError, SynthesisError};
use crate::generator::{CatalogEntry, GeneratorRequest, RecipeGenerator};
use crate::metrics;
use crate::recipe::{
    blend_profile, repair, target_profile, validate, PricingPolicy, Recipe, ScoredCandidate,
};

use super::request::{BlendRequest, BlendResult};

/// Default number of generator calls per run.
pub const DEFAULT_MAX_GENERATION_ATTEMPTS: u32 = 5;

/// Orchestrator settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SynthesisConfig {
    pub max_attempts: u32,
    pub generator_timeout: Duration,
    pub pricing: PricingPolicy,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_GENERATION_ATTEMPTS,
            generator_timeout: Duration::from_secs(60),
            pricing: PricingPolicy::default(),
        }
    }
}

/// Turns blend requests into valid, priced recipes.
pub struct SynthesisOrchestrator {
    generator: Arc<dyn RecipeGenerator>,
    catalog: Arc<dyn CatalogSource>,
    config: SynthesisConfig,
}

impl SynthesisOrchestrator {
    pub fn new(
        generator: Arc<dyn RecipeGenerator>,
        catalog: Arc<dyn CatalogSource>,
        config: SynthesisConfig,
    ) -> Self {
        Self {
            generator,
            catalog,
            config,
        }
    }

    pub fn config(&self) -> &SynthesisConfig {
        &self.config
    }

    /// Runs one synthesis.
    ///
    /// # Errors
    ///
    /// `InvalidRequest` for a zero total, `CatalogUnavailable` or
    /// `EmptyCatalog` when there is nothing to blend, and `Repair` when the
    /// catalog cannot satisfy the request at all.
    pub async fn run(&self, request: &BlendRequest) -> Result<BlendResult, SynthesisError> {
        request.validate()?;

        let catalog = self
            .catalog
            .load()
            .await
            .map_err(|e| SynthesisError::CatalogUnavailable(e.to_string()))?;
        if catalog.is_empty() {
            return Err(SynthesisError::EmptyCatalog);
        }

        let started = Instant::now();
        let entries = CatalogEntry::from_catalog(&catalog);
        let max_attempts = self.config.max_attempts.max(1);

        let mut best: Option<ScoredCandidate> = None;
        let mut previous_failure: Option<String> = None;

        for attempt in 1..=max_attempts {
            let generator_request = GeneratorRequest {
                catalog: entries.clone(),
                total_quantity: request.total_quantity,
                objective: request.objective,
                preferences: request.preferences.clone(),
                previous_failure: previous_failure.take(),
                attempt,
            };

            let proposal = match self.call_generator(&generator_request).await {
                Ok(proposal) => proposal,
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "Generator attempt failed");
                    metrics::record_generator_attempt("error");
                    previous_failure = Some(e.to_string());
                    continue;
                }
            };

            let scored =
                ScoredCandidate::score(proposal, request.total_quantity, &catalog, attempt);
            let penalty = scored.penalty;

            match validate(&scored.candidate.components, request.total_quantity, &catalog) {
                Ok(recipe) => {
                    tracing::info!(
                        attempt,
                        components = recipe.len(),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Candidate accepted"
                    );
                    metrics::record_generator_attempt("accepted");
                    let explanation = scored.candidate.explanation;
                    return Ok(self.finish(request, &catalog, recipe, false, attempt, explanation));
                }
                Err(violation) => {
                    tracing::warn!(attempt, penalty, error = %violation, "Candidate rejected");
                    metrics::record_generator_attempt("rejected");
                    previous_failure = Some(violation.to_string());
                }
            }

            if best.as_ref().map_or(true, |b| scored.beats(b)) {
                best = Some(scored);
            }
        }

        let (components, explanation) = match best {
            Some(best) => {
                tracing::info!(
                    attempt = best.attempt,
                    penalty = best.penalty,
                    "Repairing best candidate"
                );
                (best.candidate.components, best.candidate.explanation)
            }
            None => {
                tracing::info!("No usable candidate, repairing from scratch");
                (Vec::new(), String::new())
            }
        };

        let recipe = repair(&components, request.total_quantity, &catalog).map_err(|e| {
            tracing::error!(
                total_quantity = request.total_quantity,
                error = %e,
                "Fallback repair failed"
            );
            e
        })?;

        tracing::info!(
            attempts = max_attempts,
            components = recipe.len(),
            "Fallback repair produced recipe"
        );
        metrics::record_fallback_repair();

        Ok(self.finish(request, &catalog, recipe, true, max_attempts, explanation))
    }

    async fn call_generator(
        &self,
        request: &GeneratorRequest,
    ) -> Result<crate::generator::GeneratorProposal, GeneratorError> {
        let timeout = self.config.generator_timeout;
        match tokio::time::timeout(timeout, self.generator.propose(request)).await {
            Ok(result) => result,
            Err(_) => Err(GeneratorError::Timeout {
                seconds: timeout.as_secs(),
            }),
        }
    }

    fn finish(
        &self,
        request: &BlendRequest,
        catalog: &Catalog,
        recipe: Recipe,
        used_fallback_repair: bool,
        attempts_used: u32,
        explanation: String,
    ) -> BlendResult {
        BlendResult {
            pricing: self.config.pricing.price(&recipe, catalog),
            target_profile: target_profile(request.objective, &request.preferences),
            blend_profile: blend_profile(&recipe, catalog),
            recipe,
            used_fallback_repair,
            attempts_used,
            explanation,
        }
    }
}
