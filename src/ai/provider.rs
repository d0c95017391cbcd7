use async_trait::async_trait;

use crate::ai::message::ChatMessage;
use crate::error::AppError;

/// The language model client the engine talks to. One call in, one reply
/// string out. Transport retries are the implementor's business.
#[async_trait]
pub trait AiProvider: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, AppError>;

    /// Model identifier recorded in generation traces.
    fn model_name(&self) -> &str {
        "unknown"
    }
}
