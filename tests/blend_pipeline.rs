//! End-to-end tests: enqueue → worker tick → poll, over the in-memory store.
//!
//! The generator is the real LLM-backed one, talking to a scripted provider,
//! so these cover prompt → JSON extraction → parse → validate/repair → pricing.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use blendforge::catalog::{Catalog, Ingredient, StaticCatalog, SENSORY_DIMENSIONS};
use blendforge::generator::LlmRecipeGenerator;
use blendforge::llm::{Choice, GenerationRequest, GenerationResponse, LlmProvider, Message, Usage};
use blendforge::pipeline::{BlendRequest, BlendResult, SynthesisConfig, SynthesisOrchestrator};
use blendforge::recipe::{validate, Objective};
use blendforge::scheduler::{
    enqueue_blend, poll_job, InMemoryJobStore, JobStatus, JobStore, TickOutcome, Worker,
    WorkerConfig, BLEND_JOB_KIND,
};
use blendforge::LlmError;

/// Replays replies in order, repeating the last one; records every prompt.
struct ScriptedProvider {
    replies: Mutex<VecDeque<String>>,
    last: Mutex<String>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    fn new(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            last: Mutex::new(String::new()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("lock not poisoned").clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
        let user_prompt = request
            .messages
            .iter()
            .map(|m| m.content.clone())
            .collect::<Vec<_>>()
            .join("\n");
        self.prompts.lock().expect("lock not poisoned").push(user_prompt);

        let content = match self.replies.lock().expect("lock not poisoned").pop_front() {
            Some(reply) => {
                *self.last.lock().expect("lock not poisoned") = reply.clone();
                reply
            }
            None => self.last.lock().expect("lock not poisoned").clone(),
        };

        Ok(GenerationResponse {
            id: "scripted".to_string(),
            model: "scripted-model".to_string(),
            choices: vec![Choice {
                index: 0,
                message: Message::assistant(content),
                finish_reason: "stop".to_string(),
            }],
            usage: Usage::default(),
        })
    }
}

fn ingredients() -> Vec<Ingredient> {
    vec![
        Ingredient::new("A", "Brazil Cerrado", 1000, 0.85, [4.0; SENSORY_DIMENSIONS]),
        Ingredient::new("B", "Ethiopia Yirgacheffe", 40, 0.95, [8.0; SENSORY_DIMENSIONS]),
    ]
}

fn worker_for(
    store: Arc<InMemoryJobStore>,
    provider: Arc<ScriptedProvider>,
    catalog: Vec<Ingredient>,
    worker_id: &str,
    max_attempts: u32,
) -> Worker {
    let generator = Arc::new(LlmRecipeGenerator::new(provider));
    let orchestrator = Arc::new(SynthesisOrchestrator::new(
        generator,
        Arc::new(StaticCatalog::new(catalog)),
        SynthesisConfig::default(),
    ));
    Worker::new(
        WorkerConfig::new(worker_id).with_max_attempts(max_attempts),
        store,
        orchestrator,
    )
}

fn result_of(snapshot_result: Option<serde_json::Value>) -> BlendResult {
    serde_json::from_value(snapshot_result.expect("result present")).expect("result parses")
}

#[tokio::test]
async fn test_enqueue_tick_poll_accepts_first_valid_reply() {
    let store = Arc::new(InMemoryJobStore::new());
    let provider = Arc::new(ScriptedProvider::new(&[
        "Here is the blend:\n```json\n{\"components\": [{\"ingredient_code\": \"A\", \"quantity\": 210}, {\"ingredient_code\": \"B\", \"quantity\": 40}], \"explanation\": \"Cerrado base, Yirgacheffe lift\"}\n```",
    ]));
    let worker = worker_for(store.clone(), provider.clone(), ingredients(), "w1", 3);

    let request = BlendRequest::new(250)
        .with_objective(Objective::Bright)
        .with_preference("acidity", json!("high"));
    let receipt = enqueue_blend(store.as_ref(), &request).await.expect("enqueue");
    assert_eq!(receipt.status, JobStatus::Queued);

    let outcome = worker.tick().await.expect("tick");
    assert_eq!(
        outcome,
        TickOutcome::Succeeded {
            job_id: receipt.job_id,
            attempt: 1,
            used_fallback_repair: false,
        }
    );

    let snapshot = poll_job(store.as_ref(), receipt.job_id).await.expect("poll");
    assert_eq!(snapshot.status, JobStatus::Succeeded);
    assert_eq!(snapshot.attempts, 1);
    assert!(snapshot.error.is_none());

    let result = result_of(snapshot.result);
    assert!(!result.used_fallback_repair);
    assert_eq!(result.attempts_used, 1);
    assert_eq!(result.recipe.total_quantity(), 250);
    assert_eq!(result.explanation, "Cerrado base, Yirgacheffe lift");
    // 210 * 0.85 + 40 * 0.95 = 216.5; (216.5 + 15) * 1.15 = 266.225 → 266.23 → 265
    assert!((result.pricing.unit_cost_sum - 216.5).abs() < 1e-9);
    assert_eq!(result.pricing.total, 265.0);
    assert_eq!(result.target_profile.acidity, 8.0);

    let prompts = provider.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("250"));
}

#[tokio::test]
async fn test_always_invalid_generator_ends_succeeded_via_repair() {
    let store = Arc::new(InMemoryJobStore::new());
    let provider = Arc::new(ScriptedProvider::new(&[
        r#"{"components":[{"ingredient_code":"A","quantity":500},{"ingredient_code":"B","quantity":10}]}"#,
    ]));
    let worker = worker_for(store.clone(), provider.clone(), ingredients(), "w1", 3);

    let receipt = enqueue_blend(store.as_ref(), &BlendRequest::new(250))
        .await
        .expect("enqueue");
    worker.tick().await.expect("tick");

    let snapshot = poll_job(store.as_ref(), receipt.job_id).await.expect("poll");
    assert_eq!(snapshot.status, JobStatus::Succeeded);

    let result = result_of(snapshot.result);
    assert!(result.used_fallback_repair);
    assert_eq!(result.attempts_used, 5);
    assert_eq!(result.recipe.total_quantity(), 250);
    let b = result.recipe.quantity_of("B").expect("B kept");
    assert!((20..=40).contains(&b), "B = {}", b);

    // The repaired recipe satisfies every hard constraint.
    let catalog = Catalog::new(ingredients()).expect("catalog");
    validate(&result.recipe.to_proposed(), 250, &catalog).expect("repaired recipe validates");

    // Every retry after the first carried the previous rejection back.
    let prompts = provider.prompts();
    assert_eq!(prompts.len(), 5);
    assert!(prompts[1..].iter().all(|p| p.contains("rejected")));
}

#[tokio::test]
async fn test_garbage_replies_still_produce_a_recipe() {
    let store = Arc::new(InMemoryJobStore::new());
    let provider = Arc::new(ScriptedProvider::new(&["I would rather talk about tea."]));
    let worker = worker_for(store.clone(), provider, ingredients(), "w1", 3);

    let receipt = enqueue_blend(store.as_ref(), &BlendRequest::new(300))
        .await
        .expect("enqueue");
    worker.tick().await.expect("tick");

    let snapshot = poll_job(store.as_ref(), receipt.job_id).await.expect("poll");
    assert_eq!(snapshot.status, JobStatus::Succeeded);
    let result = result_of(snapshot.result);
    assert!(result.used_fallback_repair);
    assert_eq!(result.recipe.total_quantity(), 300);
}

#[tokio::test]
async fn test_insufficient_capacity_requeues_then_fails() {
    let store = Arc::new(InMemoryJobStore::new());
    let provider = Arc::new(ScriptedProvider::new(&["{}"]));
    let small: Vec<Ingredient> = ["A", "B", "C", "D", "E"]
        .iter()
        .map(|code| Ingredient::new(*code, *code, 30, 1.0, [5.0; SENSORY_DIMENSIONS]))
        .collect();
    let worker = worker_for(store.clone(), provider, small, "w1", 2);

    let receipt = enqueue_blend(store.as_ref(), &BlendRequest::new(250))
        .await
        .expect("enqueue");

    assert!(matches!(
        worker.tick().await.expect("tick"),
        TickOutcome::Requeued { attempt: 1, .. }
    ));
    let snapshot = poll_job(store.as_ref(), receipt.job_id).await.expect("poll");
    assert_eq!(snapshot.status, JobStatus::Queued);
    assert!(snapshot.error.is_some());

    assert!(matches!(
        worker.tick().await.expect("tick"),
        TickOutcome::Failed { attempt: 2, .. }
    ));
    let snapshot = poll_job(store.as_ref(), receipt.job_id).await.expect("poll");
    assert_eq!(snapshot.status, JobStatus::Failed);
    assert_eq!(snapshot.attempts, 2);
    assert!(snapshot.result.is_none());
    assert!(snapshot
        .error
        .as_deref()
        .unwrap_or("")
        .contains("cannot reach requested total"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_competing_workers_process_each_job_once() {
    let store = Arc::new(InMemoryJobStore::new());
    let reply = r#"{"components":[{"ingredient_code":"A","quantity":210},{"ingredient_code":"B","quantity":40}]}"#;

    let mut job_ids = Vec::new();
    for _ in 0..6 {
        let receipt = enqueue_blend(store.as_ref(), &BlendRequest::new(250))
            .await
            .expect("enqueue");
        job_ids.push(receipt.job_id);
    }

    let workers: Vec<Arc<Worker>> = (0..3)
        .map(|i| {
            Arc::new(worker_for(
                store.clone(),
                Arc::new(ScriptedProvider::new(&[reply])),
                ingredients(),
                &format!("w{}", i),
                3,
            ))
        })
        .collect();

    // Each worker keeps ticking until it sees an empty queue.
    let runs = workers.iter().map(|worker| {
        let worker = Arc::clone(worker);
        let store = Arc::clone(&store);
        tokio::spawn(async move {
            let mut processed = Vec::new();
            for _ in 0..20 {
                match worker.tick().await.expect("tick") {
                    TickOutcome::Succeeded { job_id, .. } => processed.push(job_id),
                    TickOutcome::Idle => {
                        // Idle can also mean a lost claim race.
                        let queued = store.oldest_queued(BLEND_JOB_KIND).await.expect("query");
                        if queued.is_none() {
                            break;
                        }
                    }
                    other => panic!("unexpected outcome {:?}", other),
                }
            }
            processed
        })
    });
    let results = futures::future::join_all(runs).await;

    let mut processed: Vec<_> = results
        .into_iter()
        .flat_map(|r| r.expect("join"))
        .collect();
    processed.sort();
    let mut expected = job_ids.clone();
    expected.sort();
    assert_eq!(processed, expected, "every job processed exactly once");

    for id in job_ids {
        let job = store.get(id).await.expect("get").expect("present");
        assert_eq!(job.status, JobStatus::Succeeded);
        assert_eq!(job.attempts, 1);
    }
}
