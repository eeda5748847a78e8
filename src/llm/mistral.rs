//! Remote tier: Mistral chat-completions API over HTTP.
//!
//! Each call builds its own `reqwest::Client` and drops it when the call
//! finishes, so concurrent requests share no connection or session state.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::error::LlmError;
use crate::llm::provider::{CompletionRequest, RemoteProvider};

pub const DEFAULT_BASE_URL: &str = "https://api.mistral.ai/v1";
pub const DEFAULT_MODEL: &str = "mistral-small-latest";

const PROVIDER: &str = "mistral";

/// Configuration for the remote provider.
#[derive(Debug, Clone)]
pub struct MistralConfig {
    pub api_key: SecretString,
    pub model: String,
    pub base_url: String,
}

pub struct MistralProvider {
    config: MistralConfig,
}

impl MistralProvider {
    pub fn new(config: MistralConfig) -> Self {
        Self { config }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl RemoteProvider for MistralProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| request_failed(format!("Failed to create HTTP client: {e}")))?;

        let body = json!({
            "model": self.config.model,
            "messages": request.messages,
            "max_tokens": request.sampling.max_tokens,
            "temperature": request.sampling.temperature,
            "top_p": request.sampling.top_p,
            "stream": false,
        });

        debug!(model = %self.config.model, "Mistral request");

        let response = client
            .post(self.endpoint())
            .bearer_auth(self.config.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| request_failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(request_failed(format!("HTTP {status}: {error_text}")));
        }

        let raw: Value = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse {
                provider: PROVIDER.to_string(),
                reason: e.to_string(),
            })?;

        Ok(ResponseShape::detect(&raw).into_text())
    }
}

fn request_failed(reason: String) -> LlmError {
    LlmError::RequestFailed {
        provider: PROVIDER.to_string(),
        reason,
    }
}

// ── Response shapes ─────────────────────────────────────────────────

/// Known shapes of a completion response, most specific first.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseShape {
    /// `choices[0].message.content`
    ChatChoice(String),
    /// `outputs[0].text`
    Output(String),
    /// Anything else, stringified whole.
    Raw(String),
}

type ShapeMatcher = fn(&Value) -> Option<ResponseShape>;

const MATCHERS: &[ShapeMatcher] = &[match_chat_choice, match_output];

impl ResponseShape {
    /// Try each matcher in order; fall back to stringifying the response.
    pub fn detect(raw: &Value) -> Self {
        MATCHERS
            .iter()
            .find_map(|matcher| matcher(raw))
            .unwrap_or_else(|| {
                Self::Raw(match raw {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
            })
    }

    pub fn into_text(self) -> String {
        match self {
            Self::ChatChoice(text) | Self::Output(text) | Self::Raw(text) => {
                text.trim().to_string()
            }
        }
    }
}

#[derive(Deserialize)]
struct ChatShape {
    choices: Vec<ChoiceShape>,
}

#[derive(Deserialize)]
struct ChoiceShape {
    message: MessageShape,
}

#[derive(Deserialize)]
struct MessageShape {
    #[serde(default)]
    content: Option<MessageContent>,
}

/// Plain string, or a list of typed chunks.
#[derive(Deserialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Chunks(Vec<ContentChunk>),
}

#[derive(Deserialize)]
struct ContentChunk {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct OutputsShape {
    outputs: Vec<OutputItem>,
}

#[derive(Deserialize)]
struct OutputItem {
    #[serde(default)]
    text: String,
}

fn match_chat_choice(raw: &Value) -> Option<ResponseShape> {
    let shape = ChatShape::deserialize(raw).ok()?;
    let choice = shape.choices.into_iter().next()?;
    let text = match choice.message.content {
        Some(MessageContent::Text(text)) => text,
        Some(MessageContent::Chunks(chunks)) => chunks
            .into_iter()
            .filter_map(|c| c.text)
            .collect::<Vec<_>>()
            .join(""),
        None => String::new(),
    };
    Some(ResponseShape::ChatChoice(text))
}

fn match_output(raw: &Value) -> Option<ResponseShape> {
    let shape = OutputsShape::deserialize(raw).ok()?;
    let item = shape.outputs.into_iter().next()?;
    Some(ResponseShape::Output(item.text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_chat_choice() {
        let raw = json!({
            "id": "cmpl-1",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "  Olá!  "}}]
        });
        assert_eq!(
            ResponseShape::detect(&raw),
            ResponseShape::ChatChoice("  Olá!  ".into())
        );
        assert_eq!(ResponseShape::detect(&raw).into_text(), "Olá!");
    }

    #[test]
    fn joins_chunked_content() {
        let raw = json!({
            "choices": [{"message": {"content": [
                {"type": "text", "text": "Prezado, "},
                {"type": "reference", "reference_ids": [1]},
                {"type": "text", "text": "recebido."}
            ]}}]
        });
        assert_eq!(ResponseShape::detect(&raw).into_text(), "Prezado, recebido.");
    }

    #[test]
    fn null_content_is_empty() {
        let raw = json!({"choices": [{"message": {"content": null}}]});
        assert_eq!(ResponseShape::detect(&raw), ResponseShape::ChatChoice(String::new()));
    }

    #[test]
    fn empty_choices_fall_through_to_outputs() {
        let raw = json!({"choices": [], "outputs": [{"text": "from outputs"}]});
        assert_eq!(
            ResponseShape::detect(&raw),
            ResponseShape::Output("from outputs".into())
        );
    }

    #[test]
    fn non_object_message_falls_through() {
        let raw = json!({"choices": [{"message": "oops"}]});
        assert!(matches!(ResponseShape::detect(&raw), ResponseShape::Raw(_)));
    }

    #[test]
    fn unknown_shape_is_stringified() {
        let raw = json!({"result": 42});
        assert_eq!(ResponseShape::detect(&raw).into_text(), r#"{"result":42}"#);
        assert_eq!(
            ResponseShape::detect(&json!("plain text")).into_text(),
            "plain text"
        );
    }

    #[test]
    fn endpoint_strips_trailing_slash() {
        let provider = MistralProvider::new(MistralConfig {
            api_key: SecretString::from("key"),
            model: DEFAULT_MODEL.into(),
            base_url: "http://localhost:9000/v1/".into(),
        });
        assert_eq!(provider.endpoint(), "http://localhost:9000/v1/chat/completions");
        assert_eq!(provider.model_name(), DEFAULT_MODEL);
        assert_eq!(provider.name(), "mistral");
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_request_failure() {
        let provider = MistralProvider::new(MistralConfig {
            api_key: SecretString::from("key"),
            model: DEFAULT_MODEL.into(),
            base_url: "http://127.0.0.1:1".into(),
        });
        let request = CompletionRequest::new(
            vec![crate::llm::provider::ChatMessage::user("oi")],
            crate::llm::provider::SamplingParams::remote(16),
        );
        let err = provider.complete(request).await.unwrap_err();
        assert!(matches!(err, LlmError::RequestFailed { .. }));
    }
}
