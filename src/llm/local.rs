//! Local tier: in-process fallback model with one-time initialization.
//!
//! The model is loaded on first use. Concurrent first callers wait on the
//! same initialization; later calls reuse the cached handle. A failed load
//! leaves the cell empty so a later request can try again.

use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::info;

use crate::error::LlmError;
use crate::llm::provider::{LocalModel, LocalModelLoader, SamplingParams};

/// Cue that ends the local prompt; the reply is whatever follows it.
pub const LOCAL_CUE: &str = "Resposta curta:";

pub const DEFAULT_LOCAL_MODEL: &str = "nicholasKluge/TeenyTinyLlama-160m";

/// Lazily loaded local model.
pub struct LocalTier {
    loader: Arc<dyn LocalModelLoader>,
    model: OnceCell<Arc<dyn LocalModel>>,
}

impl LocalTier {
    pub fn new(loader: Arc<dyn LocalModelLoader>) -> Self {
        Self {
            loader,
            model: OnceCell::new(),
        }
    }

    pub fn model_id(&self) -> &str {
        self.loader.model_id()
    }

    pub fn is_loaded(&self) -> bool {
        self.model.initialized()
    }

    /// Shared model handle, loading it on first call.
    async fn model(&self) -> Result<Arc<dyn LocalModel>, LlmError> {
        let model = self
            .model
            .get_or_try_init(|| async {
                let loader = Arc::clone(&self.loader);
                info!(model = loader.model_id(), "Loading local model");
                let loaded: Result<Arc<dyn LocalModel>, LlmError> =
                    match tokio::task::spawn_blocking(move || loader.load()).await {
                        Ok(result) => result,
                        Err(e) => Err(LlmError::LocalLoadFailed {
                            model: self.loader.model_id().to_string(),
                            reason: e.to_string(),
                        }),
                    };
                loaded
            })
            .await?;
        Ok(Arc::clone(model))
    }

    /// Generate a short reply for `email_text`.
    pub async fn generate(
        &self,
        email_text: &str,
        category: &str,
        max_tokens: u32,
    ) -> Result<String, LlmError> {
        let model = self.model().await?;
        let prompt = build_local_prompt(category, email_text);
        let sampling = SamplingParams::local(max_tokens);

        let task_prompt = prompt.clone();
        let decoded = tokio::task::spawn_blocking(move || model.generate(&task_prompt, &sampling))
            .await
            .map_err(|e| LlmError::LocalGenerationFailed(e.to_string()))??;

        Ok(extract_reply(&decoded, &prompt))
    }
}

/// Prompt for the local model. Ends with [`LOCAL_CUE`].
pub fn build_local_prompt(category: &str, email_text: &str) -> String {
    format!(
        "Você é um assistente que responde e-mails de forma curta, objetiva e profissional.\n\
         Categoria: {category}\n\
         E-mail: {email_text}\n\n\
         {LOCAL_CUE}"
    )
}

/// Text after the last cue; without a cue, the decoded text minus the prompt.
pub fn extract_reply(decoded: &str, prompt: &str) -> String {
    match decoded.rsplit_once(LOCAL_CUE) {
        Some((_, reply)) => reply.trim().to_string(),
        None => decoded.replace(prompt, "").trim().to_string(),
    }
}

// ── Loaders ─────────────────────────────────────────────────────────

/// Loader used when the crate is built without the `local-model` feature.
pub struct UnavailableLoader {
    model_id: String,
}

impl UnavailableLoader {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
        }
    }
}

impl LocalModelLoader for UnavailableLoader {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn load(&self) -> Result<Arc<dyn LocalModel>, LlmError> {
        Err(LlmError::LocalUnavailable(format!(
            "{} requires building with the `local-model` feature",
            self.model_id
        )))
    }
}

/// Loader for `model_id` using whichever backend this build includes.
pub fn default_loader(model_id: &str) -> Arc<dyn LocalModelLoader> {
    #[cfg(feature = "local-model")]
    {
        Arc::new(crate::llm::candle_backend::CandleLoader::new(model_id))
    }
    #[cfg(not(feature = "local-model"))]
    {
        Arc::new(UnavailableLoader::new(model_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Echoes the prompt followed by a fixed continuation.
    struct EchoModel {
        continuation: String,
    }

    impl LocalModel for EchoModel {
        fn generate(&self, prompt: &str, _sampling: &SamplingParams) -> Result<String, LlmError> {
            Ok(format!("{prompt} {}", self.continuation))
        }
    }

    /// Counts loads; sleeps to widen the race window.
    struct CountingLoader {
        loads: AtomicUsize,
        fail: bool,
    }

    impl LocalModelLoader for CountingLoader {
        fn model_id(&self) -> &str {
            "test/counting"
        }

        fn load(&self) -> Result<Arc<dyn LocalModel>, LlmError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(20));
            if self.fail {
                return Err(LlmError::LocalLoadFailed {
                    model: "test/counting".into(),
                    reason: "boom".into(),
                });
            }
            Ok(Arc::new(EchoModel {
                continuation: "Recebido, obrigado.".into(),
            }))
        }
    }

    #[test]
    fn prompt_ends_with_cue() {
        let prompt = build_local_prompt("Produtivo", "Qual o status?");
        assert!(prompt.contains("Categoria: Produtivo"));
        assert!(prompt.contains("E-mail: Qual o status?"));
        assert!(prompt.ends_with(LOCAL_CUE));
    }

    #[test]
    fn extract_takes_text_after_last_cue() {
        let decoded = "abc Resposta curta: primeira Resposta curta:  segunda ";
        assert_eq!(extract_reply(decoded, "abc"), "segunda");
    }

    #[test]
    fn extract_without_cue_strips_prompt() {
        assert_eq!(
            extract_reply("meu prompt continuação", "meu prompt"),
            "continuação"
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_first_calls_load_once() {
        let loader = Arc::new(CountingLoader {
            loads: AtomicUsize::new(0),
            fail: false,
        });
        let tier = Arc::new(LocalTier::new(loader.clone()));
        assert!(!tier.is_loaded());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let tier = Arc::clone(&tier);
            handles.push(tokio::spawn(async move {
                tier.generate("Qual o status?", "Produtivo", 32).await
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "Recebido, obrigado.");
        }

        assert_eq!(loader.loads.load(Ordering::SeqCst), 1);
        assert!(tier.is_loaded());
    }

    #[tokio::test]
    async fn failed_load_is_retried_on_next_call() {
        let loader = Arc::new(CountingLoader {
            loads: AtomicUsize::new(0),
            fail: true,
        });
        let tier = LocalTier::new(loader.clone());

        assert!(tier.generate("oi", "Improdutivo", 8).await.is_err());
        assert!(tier.generate("oi", "Improdutivo", 8).await.is_err());
        assert_eq!(loader.loads.load(Ordering::SeqCst), 2);
        assert!(!tier.is_loaded());
    }

    #[tokio::test]
    async fn unavailable_loader_reports_configuration_error() {
        let tier = LocalTier::new(Arc::new(UnavailableLoader::new(DEFAULT_LOCAL_MODEL)));
        let err = tier.generate("oi", "Improdutivo", 8).await.unwrap_err();
        assert!(matches!(err, LlmError::LocalUnavailable(_)));
        assert_eq!(tier.model_id(), DEFAULT_LOCAL_MODEL);
    }
}
