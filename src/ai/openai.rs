use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::ai::message::ChatMessage;
use crate::ai::provider::AiProvider;
use crate::ai::retry::send_with_retry;
use crate::config::AppConfig;
use crate::error::AppError;

const CHAT_PATH: &str = "/chat/completions";

/// Non-streaming client for any OpenAI-compatible chat completions endpoint.
pub struct OpenAiProvider {
    client: Client,
    api_key: Option<String>,
    model: String,
    endpoint: String,
    temperature: f32,
    max_completion_tokens: u32,
    max_retries: u32,
}

impl OpenAiProvider {
    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| AppError::Config(format!("HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_key: config.resolved_api_key(),
            model: config.model.clone(),
            endpoint: chat_endpoint(&config.base_url),
            temperature: config.temperature,
            max_completion_tokens: config.max_completion_tokens,
            max_retries: config.http_max_retries,
        })
    }
}

/// A base that already names the completions path is used as-is.
fn chat_endpoint(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if base.ends_with(CHAT_PATH) {
        base.to_string()
    } else {
        format!("{}{}", base, CHAT_PATH)
    }
}

#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    temperature: f32,
    max_completion_tokens: u32,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
    /// Some proxy workers return the reply text as a bare `answer`.
    answer: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: Option<OpenAiMessageContent>,
}

#[derive(Deserialize)]
struct OpenAiMessageContent {
    content: Option<String>,
}

fn reply_text(resp: OpenAiResponse) -> Result<String, AppError> {
    let content = resp
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content);
    content
        .or(resp.answer)
        .ok_or_else(|| AppError::ModelInvocation("response has no expected field".into()))
}

#[async_trait]
impl AiProvider for OpenAiProvider {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, AppError> {
        let body = OpenAiRequest {
            model: &self.model,
            messages,
            stream: false,
            temperature: self.temperature,
            max_completion_tokens: self.max_completion_tokens,
        };

        let response = send_with_retry(
            || {
                let request = self
                    .client
                    .post(&self.endpoint)
                    .header("Content-Type", "application/json")
                    .json(&body);
                match &self.api_key {
                    Some(key) => request.bearer_auth(key),
                    None => request,
                }
            },
            "chat completions",
            self.max_retries,
        )
        .await?;

        let resp: OpenAiResponse = response
            .json()
            .await
            .map_err(|e| AppError::ModelInvocation(format!("Failed to parse response: {}", e)))?;

        let text = reply_text(resp)?;
        if text.trim().is_empty() {
            warn!(model = %self.model, "model returned empty text");
        }
        debug!(chars = text.chars().count(), "model reply received");
        Ok(text)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Result<String, AppError> {
        reply_text(serde_json::from_str(json).unwrap())
    }

    #[test]
    fn test_reply_from_choices() {
        let text = parse(r#"{"choices":[{"message":{"role":"assistant","content":"hello"}}]}"#);
        assert_eq!(text.unwrap(), "hello");
    }

    #[test]
    fn test_reply_falls_back_to_answer() {
        assert_eq!(parse(r#"{"answer":"from proxy"}"#).unwrap(), "from proxy");
        assert_eq!(
            parse(r#"{"choices":[{"message":null}],"answer":"x"}"#).unwrap(),
            "x"
        );
    }

    #[test]
    fn test_reply_without_fields_is_invocation_error() {
        assert!(matches!(parse("{}"), Err(AppError::ModelInvocation(_))));
    }

    #[test]
    fn test_chat_endpoint() {
        assert_eq!(
            chat_endpoint("https://api.openai.com/v1/"),
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(
            chat_endpoint("http://localhost:8080/v1/chat/completions"),
            "http://localhost:8080/v1/chat/completions"
        );
    }

    #[test]
    fn test_request_body_shape() {
        let messages = vec![ChatMessage::user("hi")];
        let body = OpenAiRequest {
            model: "m",
            messages: &messages,
            stream: false,
            temperature: 0.7,
            max_completion_tokens: 2000,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["max_completion_tokens"], 2000);
        assert_eq!(json["stream"], false);
    }
}
