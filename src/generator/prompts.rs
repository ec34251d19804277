//! Prompt construction for the LLM recipe generator.

use crate::catalog::SENSORY_DIMENSION_NAMES;
use crate::recipe::{MAX_COMPONENTS, MIN_COMPONENTS, MIN_QUANTITY};

use super::contract::GeneratorRequest;

/// System and user messages for one generation attempt.
#[derive(Debug, Clone)]
pub struct RecipePrompt {
    pub system: String,
    pub user: String,
}

const RECIPE_SYSTEM_PROMPT: &str = r#"You are a master coffee roaster designing blends from a fixed green-coffee inventory.

## HARD RULES

Every blend you propose MUST satisfy all of these:
1. Use between {min_components} and {max_components} distinct ingredient codes from the catalog.
2. Every quantity is a whole number of grams, at least {min_quantity}.
3. No quantity exceeds that ingredient's stock_quantity.
4. Quantities sum EXACTLY to the requested total.
5. Only use codes that appear in the catalog. Never invent codes.

## SENSORY SCALE

Each catalog entry has a sensory vector scored 1-10 in this order:
{dimensions}

## OUTPUT FORMAT

Respond with a single JSON object and nothing else:
{
  "components": [
    {"ingredient_code": "<code>", "quantity": <integer grams>}
  ],
  "explanation": "<one or two sentences on why this blend fits>"
}"#;

const RECIPE_USER_PROMPT: &str = r#"Design a blend of exactly {total_quantity} grams.

Objective: {objective}
{objective_instruction}

Customer preferences (JSON):
{preferences}

Catalog (JSON):
{catalog}
{previous_failure}"#;

const PREVIOUS_FAILURE_BLOCK: &str = r#"
Your previous proposal (attempt {previous_attempt}) was rejected: {reason}
Fix that problem and re-check every hard rule before answering."#;

/// Builds the prompt for a generator request.
pub fn build_recipe_prompt(request: &GeneratorRequest) -> RecipePrompt {
    let system = RECIPE_SYSTEM_PROMPT
        .replace("{min_components}", &MIN_COMPONENTS.to_string())
        .replace("{max_components}", &MAX_COMPONENTS.to_string())
        .replace("{min_quantity}", &MIN_QUANTITY.to_string())
        .replace("{dimensions}", &SENSORY_DIMENSION_NAMES.join(", "));

    let preferences = serde_json::to_string_pretty(&request.preferences)
        .unwrap_or_else(|_| "{}".to_string());
    let catalog =
        serde_json::to_string_pretty(&request.catalog).unwrap_or_else(|_| "[]".to_string());

    let previous_failure = match &request.previous_failure {
        Some(reason) => PREVIOUS_FAILURE_BLOCK
            .replace("{previous_attempt}", &request.attempt.saturating_sub(1).to_string())
            .replace("{reason}", reason),
        None => String::new(),
    };

    let user = RECIPE_USER_PROMPT
        .replace("{total_quantity}", &request.total_quantity.to_string())
        .replace("{objective}", &request.objective.to_string())
        .replace("{objective_instruction}", request.objective.instruction())
        .replace("{preferences}", &preferences)
        .replace("{catalog}", &catalog)
        .replace("{previous_failure}", &previous_failure);

    RecipePrompt { system, user }
}
