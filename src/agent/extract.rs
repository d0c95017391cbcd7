use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::error::AppError;

pub const DEFAULT_PREVIEW_CHARS: usize = 500;

/// Which extraction strategy produced the parsed object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStrategy {
    /// `` ```json ... ``` `` fence
    JsonFence,
    /// Any `` ``` ... ``` `` fence
    GenericFence,
    /// First `{` to last `}` in the reply
    BraceSpan,
    /// The whole trimmed reply
    RawText,
}

#[derive(Debug, Clone)]
pub struct ExtractionOutcome {
    pub value: Value,
    pub strategy: ExtractionStrategy,
}

type CandidateFn = fn(&str) -> Option<String>;

/// Tried in order, stricter to looser. A candidate that fails to parse falls
/// through to the next strategy.
const STRATEGIES: [(ExtractionStrategy, CandidateFn); 4] = [
    (ExtractionStrategy::JsonFence, try_json_fence),
    (ExtractionStrategy::GenericFence, try_generic_fence),
    (ExtractionStrategy::BraceSpan, try_brace_span),
    (ExtractionStrategy::RawText, try_raw_text),
];

/// Pull a JSON object out of a free-form model reply.
pub fn extract_json(raw: &str) -> Result<ExtractionOutcome, AppError> {
    extract_json_with_preview(raw, DEFAULT_PREVIEW_CHARS)
}

/// Like [`extract_json`], with a configurable preview length for the error.
pub fn extract_json_with_preview(
    raw: &str,
    preview_chars: usize,
) -> Result<ExtractionOutcome, AppError> {
    let mut last_error: Option<String> = None;

    for (strategy, candidate_fn) in STRATEGIES {
        let Some(candidate) = candidate_fn(raw) else {
            continue;
        };
        let Some(cleaned) = clean_candidate(&candidate) else {
            continue;
        };
        match serde_json::from_str::<Value>(cleaned) {
            Ok(value) => {
                debug!(?strategy, "extracted JSON from model reply");
                return Ok(ExtractionOutcome { value, strategy });
            }
            Err(e) => {
                debug!(?strategy, error = %e, "candidate failed to parse");
                last_error.get_or_insert_with(|| format!("JSON syntax error: {}", e));
            }
        }
    }

    Err(AppError::extraction(
        last_error.unwrap_or_else(|| "no JSON object found".to_string()),
        raw,
        preview_chars,
    ))
}

/// Convenience wrapper returning just the parsed value.
pub fn extract(raw: &str) -> Result<Value, AppError> {
    extract_json(raw).map(|o| o.value)
}

/// Trim and cut the candidate down to its outermost `{ ... }`.
fn clean_candidate(candidate: &str) -> Option<&str> {
    let trimmed = candidate.trim();
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end < start {
        return None;
    }
    Some(trimmed[start..=end].trim())
}

fn try_json_fence(raw: &str) -> Option<String> {
    let re = Regex::new(r"(?is)```json\s*(.*?)\s*```").ok()?;
    let cap = re.captures(raw)?;
    Some(cap[1].to_string())
}

fn try_generic_fence(raw: &str) -> Option<String> {
    let re = Regex::new(r"(?s)```\s*(.*?)\s*```").ok()?;
    let cap = re.captures(raw)?;
    Some(cap[1].to_string())
}

/// Position-based, not depth-aware. Parsing validates the result.
fn try_brace_span(raw: &str) -> Option<String> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(raw[start..=end].to_string())
}

fn try_raw_text(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_fence_ignores_surrounding_prose() {
        let raw = "Here you go:\n```json\n{\"menuName\":\"Soup\",\"ingredients\":[],\"cookingSteps\":[\"Boil water\"]}\n```\nEnjoy!";
        let outcome = extract_json(raw).unwrap();
        assert_eq!(outcome.strategy, ExtractionStrategy::JsonFence);
        assert_eq!(outcome.value["menuName"], "Soup");
        assert_eq!(outcome.value["cookingSteps"][0], "Boil water");
    }

    #[test]
    fn test_fence_preferred_over_stray_braces() {
        let raw = "Note {not json} first.\n```json\n{\"menuName\":\"A\"}\n```\nand {\"menuName\":\"B\"}";
        let outcome = extract_json(raw).unwrap();
        assert_eq!(outcome.strategy, ExtractionStrategy::JsonFence);
        assert_eq!(outcome.value["menuName"], "A");
    }

    #[test]
    fn test_generic_fence() {
        let raw = "```\n{\"menus\": []}\n```";
        let outcome = extract_json(raw).unwrap();
        assert_eq!(outcome.strategy, ExtractionStrategy::GenericFence);
        assert!(outcome.value["menus"].is_array());
    }

    #[test]
    fn test_generic_fence_with_other_language_tag() {
        let raw = "```javascript\n{\"menuName\": \"X\"}\n```";
        let outcome = extract_json(raw).unwrap();
        assert_eq!(outcome.value["menuName"], "X");
    }

    #[test]
    fn test_brace_span_without_fence() {
        let raw = "結果です: {\"menuName\": \"肉じゃが\", \"tips\": \"{と}も平気\"} 以上";
        let outcome = extract_json(raw).unwrap();
        assert_eq!(outcome.strategy, ExtractionStrategy::BraceSpan);
        assert_eq!(outcome.value["menuName"], "肉じゃが");
    }

    #[test]
    fn test_fence_without_object_falls_through_to_brace_span() {
        let raw = "```\nsee below\n```\n{\"menuName\": \"ok\"}";
        let outcome = extract_json(raw).unwrap();
        assert_eq!(outcome.strategy, ExtractionStrategy::BraceSpan);
        assert_eq!(outcome.value["menuName"], "ok");
    }

    #[test]
    fn test_no_fences_no_braces_is_error() {
        let err = extract_json("I could not think of anything, sorry.").unwrap_err();
        match err {
            AppError::Extraction { message, preview } => {
                assert_eq!(message, "no JSON object found");
                assert!(preview.starts_with("I could not"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_syntax_error_reported_with_preview() {
        let raw = format!("{{\"menuName\": \"x\", {} }}", "a".repeat(1000));
        let err = extract_json_with_preview(&raw, 20).unwrap_err();
        match err {
            AppError::Extraction { message, preview } => {
                assert!(message.starts_with("JSON syntax error"));
                assert_eq!(preview.chars().count(), 23);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_empty_reply_is_error() {
        assert!(extract("   ").is_err());
    }

    #[test]
    fn test_extraction_idempotent() {
        let raw = "```json\n{\"menus\":[{\"menuName\":\"A\"}]}\n```";
        assert_eq!(extract(raw).unwrap(), extract(raw).unwrap());
    }
}
