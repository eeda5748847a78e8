//! Capability seams for reply generation.
//!
//! The remote completion API and the in-process model are opaque providers
//! behind these traits; the generator facade only sees their contracts.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::LlmError;

/// Sampling parameters for one generation call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingParams {
    pub max_tokens: u32,
    pub temperature: f64,
    pub top_p: f64,
}

impl SamplingParams {
    /// Fixed parameters for the remote tier.
    pub fn remote(max_tokens: u32) -> Self {
        Self {
            max_tokens,
            temperature: 0.2,
            top_p: 0.9,
        }
    }

    /// Fixed parameters for the local tier.
    pub fn local(max_tokens: u32) -> Self {
        Self {
            max_tokens,
            temperature: 0.25,
            top_p: 0.9,
        }
    }
}

/// A chat message sent to a remote completion endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Single non-streaming completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub sampling: SamplingParams,
}

impl CompletionRequest {
    pub fn new(messages: Vec<ChatMessage>, sampling: SamplingParams) -> Self {
        Self { messages, sampling }
    }
}

/// Remote completion provider.
#[async_trait]
pub trait RemoteProvider: Send + Sync {
    /// Provider name for logs and errors.
    fn name(&self) -> &str;

    fn model_name(&self) -> &str;

    /// Run one completion and return the reply text.
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError>;
}

/// A loaded in-process generative model.
///
/// `generate` is blocking; callers run it on the blocking pool.
pub trait LocalModel: Send + Sync {
    /// Returns the full decoded sequence (prompt included).
    fn generate(&self, prompt: &str, sampling: &SamplingParams) -> Result<String, LlmError>;
}

/// Loads a [`LocalModel`]. Called at most once per successful load.
pub trait LocalModelLoader: Send + Sync {
    fn model_id(&self) -> &str;

    fn load(&self) -> Result<Arc<dyn LocalModel>, LlmError>;
}

// ── Tier outcomes ───────────────────────────────────────────────────

/// Which tier produced a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplySource {
    Remote,
    Local,
    Static,
}

impl fmt::Display for ReplySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Remote => "remote",
            Self::Local => "local",
            Self::Static => "static",
        })
    }
}

/// Result of running one generation tier.
#[derive(Debug, Clone, PartialEq)]
pub enum TierOutcome {
    Generated(String),
    Failed { tier: ReplySource, reason: String },
}

impl TierOutcome {
    pub fn from_result(tier: ReplySource, result: Result<String, LlmError>) -> Self {
        match result {
            Ok(text) => Self::Generated(text),
            Err(e) => Self::Failed {
                tier,
                reason: e.to_string(),
            },
        }
    }
}
