//! Email processor: classifies an email and drafts a reply.
//!
//! Flow:
//! 1. Classifier (keyword rules, or AI-first) → category + confidence
//! 2. Reply generator seeded with the category label
//! 3. Blank generated text is replaced by a category template
//!
//! Stateless per request; safe to share behind an `Arc`.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::ConfigError;
use crate::llm::local::{LocalTier, default_loader};
use crate::llm::{MistralProvider, RemoteProvider, ResponseGenerator};
use crate::pipeline::classifier::Classifier;
use crate::pipeline::rules::RulesEngine;
use crate::pipeline::types::{Category, EmailAnalysis};

const STATUS_REPLY: &str =
    "Recebemos sua solicitação de atualização de status. Nossa equipe retornará em breve.";
const ATTACHMENT_REPLY: &str =
    "Recebemos seu e-mail com anexo. Vamos analisar e responder em seguida.";
const PRODUCTIVE_REPLY: &str =
    "Recebemos sua solicitação. Nossa equipe analisará e retornará o mais breve possível.";
const UNPRODUCTIVE_REPLY: &str =
    "Obrigado pela sua mensagem — não é necessária nenhuma ação no momento.";

pub struct EmailProcessor {
    classifier: Classifier,
    generator: Arc<ResponseGenerator>,
}

impl EmailProcessor {
    pub fn new(classifier: Classifier, generator: Arc<ResponseGenerator>) -> Self {
        Self {
            classifier,
            generator,
        }
    }

    /// Wire up providers and classifier from configuration.
    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        let remote = config.remote.clone().map(|remote_config| {
            info!(model = %remote_config.model, "Remote generation enabled (mistral)");
            Arc::new(MistralProvider::new(remote_config)) as Arc<dyn RemoteProvider>
        });
        if remote.is_none() {
            info!("MISTRAL_API_KEY not set, replies use the local model only");
        }

        let local = LocalTier::new(default_loader(&config.local_model));
        let generator = Arc::new(ResponseGenerator::new(remote, local, config.max_tokens));

        let rules = RulesEngine::from_lists(&config.keyword_lists()?).map_err(|e| {
            ConfigError::InvalidValue {
                key: "KEYWORDS_FILE".into(),
                message: e.to_string(),
            }
        })?;
        let classifier = Classifier::select(config.classifier_mode, rules, &generator);
        info!(classifier = classifier.label(), "Classifier selected");

        Ok(Self::new(classifier, generator))
    }

    pub fn remote_enabled(&self) -> bool {
        self.generator.has_remote()
    }

    /// Classify `content` and draft a reply. Never fails.
    pub async fn process(&self, content: &str) -> EmailAnalysis {
        let request_id = Uuid::new_v4();
        info!(
            %request_id,
            chars = content.chars().count(),
            classifier = self.classifier.label(),
            "Processing email"
        );

        let classification = self.classifier.classify(content).await;

        let reply = self
            .generator
            .generate(
                content,
                classification.category.label(),
                self.generator.default_max_tokens(),
            )
            .await;

        let resposta_sugerida = if reply.text.trim().is_empty() {
            warn!(%request_id, source = %reply.source, "Generated reply was blank, using template");
            template_reply(classification.category, content).to_string()
        } else {
            reply.text
        };

        info!(
            %request_id,
            category = %classification.category,
            confidence = classification.confidence.value(),
            source = %reply.source,
            "Email processed"
        );

        EmailAnalysis {
            categoria: classification.category,
            confianca: classification.confidence,
            resposta_sugerida,
        }
    }
}

/// Canned reply for a category, refined by a couple of content hints.
pub fn template_reply(category: Category, content: &str) -> &'static str {
    match category {
        Category::Productive => {
            let lowered = content.to_lowercase();
            if lowered.contains("status") {
                STATUS_REPLY
            } else if lowered.contains("anexo") {
                ATTACHMENT_REPLY
            } else {
                PRODUCTIVE_REPLY
            }
        }
        Category::Unproductive => UNPRODUCTIVE_REPLY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;

    use crate::error::LlmError;
    use crate::llm::FALLBACK_REPLY;
    use crate::llm::local::UnavailableLoader;
    use crate::llm::provider::CompletionRequest;

    struct EchoCategoryRemote;

    #[async_trait]
    impl RemoteProvider for EchoCategoryRemote {
        fn name(&self) -> &str {
            "echo"
        }

        fn model_name(&self) -> &str {
            "echo"
        }

        async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
            let prompt = &request.messages[0].content;
            let category = prompt
                .lines()
                .find_map(|l| l.strip_prefix("Categoria: "))
                .unwrap_or("?");
            Ok(format!("Resposta para {category}.\nAtenciosamente,\n[Seu Nome]"))
        }
    }

    struct BlankRemote;

    #[async_trait]
    impl RemoteProvider for BlankRemote {
        fn name(&self) -> &str {
            "blank"
        }

        fn model_name(&self) -> &str {
            "blank"
        }

        async fn complete(&self, _request: CompletionRequest) -> Result<String, LlmError> {
            Ok("   ".into())
        }
    }

    fn processor(remote: Option<Arc<dyn RemoteProvider>>) -> EmailProcessor {
        let generator = Arc::new(ResponseGenerator::new(
            remote,
            LocalTier::new(Arc::new(UnavailableLoader::new("test/none"))),
            120,
        ));
        EmailProcessor::new(Classifier::Rules(RulesEngine::default_rules()), generator)
    }

    #[tokio::test]
    async fn greeting_is_unproductive_with_reply() {
        let p = processor(None);
        let analysis = p.process("Bom dia, obrigado pela atenção!").await;
        assert_eq!(analysis.categoria, Category::Unproductive);
        assert!(analysis.confianca.value() >= 0.5);
        assert!(!analysis.resposta_sugerida.is_empty());
        // no remote, no local backend → static tier
        assert_eq!(analysis.resposta_sugerida, FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn contract_email_is_productive() {
        let p = processor(Some(Arc::new(EchoCategoryRemote) as Arc<dyn RemoteProvider>));
        let analysis = p
            .process("Segue anexo com o contrato, favor revisar o pagamento pendente")
            .await;
        assert_eq!(analysis.categoria, Category::Productive);
        assert!(analysis.confianca.value() >= 0.6);
        assert!(analysis.resposta_sugerida.starts_with("Resposta para Produtivo."));
    }

    #[tokio::test]
    async fn blank_generation_uses_template() {
        let p = processor(Some(Arc::new(BlankRemote) as Arc<dyn RemoteProvider>));
        let analysis = p.process("Qual o status do pedido 42?").await;
        assert_eq!(analysis.categoria, Category::Productive);
        assert_eq!(analysis.resposta_sugerida, STATUS_REPLY);
    }

    #[test]
    fn template_reply_hints() {
        assert_eq!(template_reply(Category::Productive, "STATUS?"), STATUS_REPLY);
        assert_eq!(template_reply(Category::Productive, "vai o anexo"), ATTACHMENT_REPLY);
        assert_eq!(template_reply(Category::Productive, "erro"), PRODUCTIVE_REPLY);
        assert_eq!(template_reply(Category::Unproductive, "status"), UNPRODUCTIVE_REPLY);
    }

    #[test]
    fn from_config_without_key_has_no_remote() {
        let config = AppConfig::from_lookup(|_| None).unwrap();
        let p = EmailProcessor::from_config(&config).unwrap();
        assert!(!p.remote_enabled());
    }
}
