use serde::Serialize;

use crate::state::Phase;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("No parseable JSON in model reply: {message}")]
    Extraction { message: String, preview: String },

    #[error("Model reply has an unexpected shape: {0}")]
    Shape(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Model invocation failed: {0}")]
    ModelInvocation(String),

    #[error("A model request is already in progress")]
    Busy,

    #[error("Cooking steps are already detailed")]
    AlreadyDetailed,

    #[error("Result discarded: the session was cleared while the request was pending")]
    Stale,

    #[error("Cannot {action} while in {phase:?}")]
    InvalidTransition { phase: Phase, action: &'static str },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl AppError {
    /// Build an extraction error carrying a bounded preview of the raw reply.
    pub fn extraction(message: impl Into<String>, raw: &str, preview_chars: usize) -> Self {
        let mut preview: String = raw.chars().take(preview_chars).collect();
        if raw.chars().count() > preview_chars {
            preview.push_str("...");
        }
        AppError::Extraction {
            message: message.into(),
            preview,
        }
    }

    /// Errors after which the caller may simply re-invoke the same transition.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::Extraction { .. }
                | AppError::Shape(_)
                | AppError::ModelInvocation(_)
                | AppError::Busy
        )
    }
}

// Serialized as the display string so a UI boundary can hand it back verbatim.
impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extraction_preview_truncated() {
        let raw = "x".repeat(40);
        match AppError::extraction("bad", &raw, 10) {
            AppError::Extraction { preview, .. } => {
                assert_eq!(preview, format!("{}...", "x".repeat(10)));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_extraction_preview_short_text_untouched() {
        match AppError::extraction("bad", "短い", 10) {
            AppError::Extraction { preview, .. } => assert_eq!(preview, "短い"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_serializes_as_display_string() {
        let json = serde_json::to_string(&AppError::Busy).unwrap();
        assert_eq!(json, "\"A model request is already in progress\"");
    }

    #[test]
    fn test_retryable_classification() {
        assert!(AppError::Shape("x".into()).is_retryable());
        assert!(!AppError::AlreadyDetailed.is_retryable());
        assert!(!AppError::Validation("no ingredients".into()).is_retryable());
    }
}
