//! Reply generator facade: remote tier, then local tier, then static text.
//!
//! The chain is strictly linear: each tier is tried at most once and a
//! failure only ever moves down. The facade itself never fails.

use std::sync::Arc;

use tracing::{info, warn};

use crate::llm::local::LocalTier;
use crate::llm::provider::{
    ChatMessage, CompletionRequest, RemoteProvider, ReplySource, SamplingParams, TierOutcome,
};

/// Default generation budget in tokens.
pub const DEFAULT_MAX_TOKENS: u32 = 120;

/// Returned verbatim when every tier failed.
pub const FALLBACK_REPLY: &str = "Desculpe — não foi possível gerar uma sugestão agora. \
                                  Você pode usar a resposta padrão do sistema.";

/// Reply text and the tier that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedReply {
    pub text: String,
    pub source: ReplySource,
}

pub struct ResponseGenerator {
    remote: Option<Arc<dyn RemoteProvider>>,
    local: LocalTier,
    default_max_tokens: u32,
}

impl ResponseGenerator {
    /// `remote` is `None` when no API key is configured.
    pub fn new(
        remote: Option<Arc<dyn RemoteProvider>>,
        local: LocalTier,
        default_max_tokens: u32,
    ) -> Self {
        Self {
            remote,
            local,
            default_max_tokens,
        }
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    pub fn default_max_tokens(&self) -> u32 {
        self.default_max_tokens
    }

    /// Reply text only.
    pub async fn generate_response(&self, email_text: &str, category: &str, max_tokens: u32) -> String {
        self.generate(email_text, category, max_tokens).await.text
    }

    /// Run the tier chain. `category` is prompt context only.
    pub async fn generate(&self, email_text: &str, category: &str, max_tokens: u32) -> GeneratedReply {
        if let Some(remote) = &self.remote {
            match self.remote_tier(remote.as_ref(), email_text, category, max_tokens).await {
                TierOutcome::Generated(text) => {
                    return GeneratedReply {
                        text,
                        source: ReplySource::Remote,
                    };
                }
                TierOutcome::Failed { tier, reason } => {
                    warn!(tier = %tier, reason = %reason, "Remote generation failed, falling back to local");
                }
            }
        }

        match self.local_tier(email_text, category, max_tokens).await {
            TierOutcome::Generated(text) => GeneratedReply {
                text,
                source: ReplySource::Local,
            },
            TierOutcome::Failed { tier, reason } => {
                warn!(tier = %tier, reason = %reason, "Local generation failed, using static reply");
                GeneratedReply {
                    text: FALLBACK_REPLY.to_string(),
                    source: ReplySource::Static,
                }
            }
        }
    }

    async fn remote_tier(
        &self,
        remote: &dyn RemoteProvider,
        email_text: &str,
        category: &str,
        max_tokens: u32,
    ) -> TierOutcome {
        let request = CompletionRequest::new(
            vec![ChatMessage::user(build_remote_prompt(category, email_text))],
            SamplingParams::remote(max_tokens),
        );
        info!(provider = remote.name(), model = remote.model_name(), "Generating reply remotely");
        TierOutcome::from_result(ReplySource::Remote, remote.complete(request).await)
    }

    async fn local_tier(&self, email_text: &str, category: &str, max_tokens: u32) -> TierOutcome {
        info!(model = self.local.model_id(), "Generating reply locally");
        TierOutcome::from_result(
            ReplySource::Local,
            self.local.generate(email_text, category, max_tokens).await,
        )
    }
}

/// Prompt for the remote model: short, professional, signed reply.
pub fn build_remote_prompt(category: &str, email_text: &str) -> String {
    format!(
        "Você é um assistente que responde e-mails de forma curta, objetiva e profissional. \
         Sempre finalize a resposta com uma despedida educada, seguida de:\n\
         'Atenciosamente,\n[Seu Nome]'.\n\n\
         Categoria: {category}\n\
         E-mail: {email_text}\n\n\
         Escreva apenas a resposta final formatada."
    )
}
