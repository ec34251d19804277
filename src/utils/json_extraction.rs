//! JSON object extraction from free-form LLM output.
//!
//! Models wrap their answer in prose, code fences or reasoning text. The
//! extractor locates the JSON object that carries the answer and reports
//! whether the output was cut off mid-object.
//!
//! Strategies, in order:
//! 1. A fenced code block (```json or bare ```) containing an object
//! 2. Content that is itself an object
//! 3. The largest parseable object anywhere, later ones winning ties
//!
//! ```
//! use blendforge::utils::json_extraction::extract_json_object;
//!
//! let reply = "Sure! ```json\n{\"components\": []}\n``` Enjoy.";
//! assert_eq!(extract_json_object(reply).unwrap(), "{\"components\": []}");
//! ```

use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

/// Errors from [`extract_json_object`].
#[derive(Debug, Clone, Error, PartialEq)]
pub enum JsonExtractionError {
    #[error("JSON appears truncated ({unclosed} unclosed braces/brackets), starts with: {preview}")]
    Truncated { preview: String, unclosed: usize },

    #[error("no JSON object found in response, starts with: '{preview}'")]
    NotFound { preview: String },
}

fn code_fence() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        Regex::new(r"```(?:[A-Za-z0-9_-]+)?[ \t]*\n?([\s\S]*?)```")
            .unwrap_or_else(|e| panic!("invalid code fence pattern: {}", e))
    })
}

fn preview(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

fn parses(candidate: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(candidate).is_ok()
}

/// Extracts the JSON object carrying the answer.
///
/// # Errors
///
/// `Truncated` when an object was opened but never closed, `NotFound` when
/// the content has no object at all.
pub fn extract_json_object(content: &str) -> Result<String, JsonExtractionError> {
    let trimmed = content.trim();

    for caps in code_fence().captures_iter(trimmed) {
        let Some(block) = caps.get(1).map(|m| m.as_str().trim()) else {
            continue;
        };
        if let Some(json) = first_object(block) {
            return Ok(json);
        }
    }

    if trimmed.starts_with('{') {
        if let Some(end) = find_matching_brace(trimmed) {
            let candidate = &trimmed[..=end];
            if parses(candidate) {
                return Ok(candidate.to_string());
            }
        }
    }

    if let Some(json) = largest_object(trimmed) {
        return Ok(json);
    }

    if let Some(start) = trimmed.find('{') {
        let unclosed = unclosed_depth(&trimmed[start..]);
        if unclosed > 0 {
            return Err(JsonExtractionError::Truncated {
                preview: preview(&trimmed[start..], 100),
                unclosed,
            });
        }
    }

    Err(JsonExtractionError::NotFound {
        preview: preview(trimmed, 50),
    })
}

fn first_object(block: &str) -> Option<String> {
    let start = block.find('{')?;
    let end = find_matching_brace(&block[start..])?;
    let candidate = &block[start..=start + end];
    parses(candidate).then(|| candidate.to_string())
}

fn largest_object(content: &str) -> Option<String> {
    content
        .char_indices()
        .filter(|(_, c)| *c == '{')
        .filter_map(|(start, _)| {
            let end = find_matching_brace(&content[start..])?;
            let candidate = &content[start..=start + end];
            parses(candidate).then_some((start, candidate))
        })
        .max_by(|(pos_a, a), (pos_b, b)| a.len().cmp(&b.len()).then(pos_a.cmp(pos_b)))
        .map(|(_, json)| json.to_string())
}

/// Index of the `}` closing the object that opens at the start of `s`.
///
/// String literals and escapes are honored.
pub fn find_matching_brace(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, c) in s.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }

    None
}

/// Braces and brackets still open at the end of `s`, plus one for an open string.
fn unclosed_depth(s: &str) -> usize {
    let mut stack = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for c in s.chars() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' | '[' if !in_string => stack += 1,
            '}' | ']' if !in_string => stack = stack.saturating_sub(1),
            _ => {}
        }
    }

    stack + usize::from(in_string)
}
