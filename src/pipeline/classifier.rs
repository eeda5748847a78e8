//! Classification strategies: keyword rules, or LLM-first with a JSON prompt.
//!
//! The AI classifier asks the reply generator for a strict JSON object
//! `{"categoria": ..., "confianca": ...}`. Any failure along the way (tier
//! exhaustion, no braces, bad JSON, bad fields) yields the neutral result;
//! nothing is surfaced to the caller.

use std::str::FromStr;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::llm::ResponseGenerator;
use crate::pipeline::rules::RulesEngine;
use crate::pipeline::types::{Category, ClassificationResult};

/// Opaque tag passed as the generator's "category" for classification prompts.
pub const CLASSIFICATION_TAG: &str = "classificacao";

/// Token budget for the JSON classification answer.
const CLASSIFY_MAX_TOKENS: u32 = 60;

/// Greedy: first `{` through last `}`.
static JSON_OBJECT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)\{.*\}").unwrap());

// ── Mode ────────────────────────────────────────────────────────────

/// Which classifier the processor should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClassifierMode {
    #[default]
    Rules,
    /// AI classifier when a remote provider is configured, rules otherwise.
    Ai,
}

impl FromStr for ClassifierMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "rules" | "regras" => Ok(Self::Rules),
            "ai" | "llm" => Ok(Self::Ai),
            other => Err(format!("unknown classifier mode '{other}' (expected 'rules' or 'ai')")),
        }
    }
}

// ── AI classifier ───────────────────────────────────────────────────

pub struct AiClassifier {
    generator: Arc<ResponseGenerator>,
}

impl AiClassifier {
    pub fn new(generator: Arc<ResponseGenerator>) -> Self {
        Self { generator }
    }

    /// Classify via the generator's remote-first path. Never fails.
    pub async fn classify(&self, email_text: &str) -> ClassificationResult {
        let prompt = build_classification_prompt(email_text);
        let raw = self
            .generator
            .generate_response(&prompt, CLASSIFICATION_TAG, CLASSIFY_MAX_TOKENS)
            .await;

        match parse_classification(&raw) {
            Ok(result) => {
                debug!(
                    category = %result.category,
                    confidence = result.confidence.value(),
                    "AI classification parsed"
                );
                result
            }
            Err(e) => {
                warn!(
                    raw_response = %raw,
                    error = %e,
                    "Failed to parse AI classification, using neutral default"
                );
                ClassificationResult::neutral()
            }
        }
    }
}

/// Prompt asking for a strict JSON classification of `email_text`.
pub fn build_classification_prompt(email_text: &str) -> String {
    format!(
        "Classifique o e-mail abaixo em uma de duas categorias:\n\
         - \"Produtivo\": requer uma ação ou resposta profissional (solicitações, problemas, \
         atualizações de status, contratos, pagamentos).\n\
         - \"Improdutivo\": não requer ação (cumprimentos, agradecimentos, mensagens triviais).\n\n\
         Responda estritamente com um objeto JSON, sem nenhum outro texto:\n\
         {{\"categoria\": \"Produtivo\" ou \"Improdutivo\", \"confianca\": número decimal entre 0.1 e 0.9}}\n\n\
         E-mail:\n{email_text}"
    )
}

/// Parse model output into a classification.
fn parse_classification(raw: &str) -> Result<ClassificationResult, String> {
    let json_str = JSON_OBJECT
        .find(raw)
        .ok_or_else(|| "no JSON object in response".to_string())?
        .as_str();
    let value: Value =
        serde_json::from_str(json_str).map_err(|e| format!("JSON parse error: {e}"))?;
    let object = value
        .as_object()
        .ok_or_else(|| "JSON payload is not an object".to_string())?;

    let category = match object.get("categoria") {
        None => Category::Unproductive,
        Some(Value::String(label)) => Category::from_label(label)
            .ok_or_else(|| format!("unknown category label '{label}'"))?,
        Some(other) => return Err(format!("categoria is not a string: {other}")),
    };

    let confidence = match object.get("confianca") {
        None => 0.5,
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| format!("confianca out of range: {n}"))?,
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map_err(|e| format!("confianca is not a number: {e}"))?,
        Some(other) => return Err(format!("confianca is not a number: {other}")),
    };

    Ok(ClassificationResult::new(category, confidence))
}

// ── Strategy ────────────────────────────────────────────────────────

/// The classifier chosen for this process.
pub enum Classifier {
    Rules(RulesEngine),
    Ai(AiClassifier),
}

impl Classifier {
    /// Pick a strategy. `Ai` mode degrades to rules when no remote is configured.
    pub fn select(
        mode: ClassifierMode,
        rules: RulesEngine,
        generator: &Arc<ResponseGenerator>,
    ) -> Self {
        match mode {
            ClassifierMode::Ai if generator.has_remote() => {
                Self::Ai(AiClassifier::new(Arc::clone(generator)))
            }
            ClassifierMode::Ai => {
                warn!("AI classifier requested without a remote provider, using keyword rules");
                Self::Rules(rules)
            }
            ClassifierMode::Rules => Self::Rules(rules),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Rules(_) => "rules",
            Self::Ai(_) => "ai",
        }
    }

    pub async fn classify(&self, email_text: &str) -> ClassificationResult {
        match self {
            Self::Rules(engine) => engine.classify(email_text),
            Self::Ai(ai) => ai.classify(email_text).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;

    use crate::error::LlmError;
    use crate::llm::local::{LocalTier, UnavailableLoader};
    use crate::llm::provider::{CompletionRequest, RemoteProvider};

    struct CannedRemote(Result<&'static str, &'static str>);

    #[async_trait]
    impl RemoteProvider for CannedRemote {
        fn name(&self) -> &str {
            "canned"
        }

        fn model_name(&self) -> &str {
            "canned"
        }

        async fn complete(&self, _request: CompletionRequest) -> Result<String, LlmError> {
            self.0
                .map(String::from)
                .map_err(|reason| LlmError::RequestFailed {
                    provider: "canned".into(),
                    reason: reason.into(),
                })
        }
    }

    fn generator_with(remote: Option<CannedRemote>) -> Arc<ResponseGenerator> {
        Arc::new(ResponseGenerator::new(
            remote.map(|r| Arc::new(r) as Arc<dyn RemoteProvider>),
            LocalTier::new(Arc::new(UnavailableLoader::new("test/none"))),
            120,
        ))
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    // ── Parsing ─────────────────────────────────────────────────────

    #[test]
    fn parses_plain_object() {
        let r = parse_classification(r#"{"categoria": "Produtivo", "confianca": 0.82}"#).unwrap();
        assert_eq!(r.category, Category::Productive);
        assert!(approx(r.confidence.value(), 0.82));
    }

    #[test]
    fn parses_object_inside_markdown() {
        let raw = "Claro!\n```json\n{\"categoria\": \"improdutivo\", \"confianca\": \"0.7\"}\n```";
        let r = parse_classification(raw).unwrap();
        assert_eq!(r.category, Category::Unproductive);
        assert!(approx(r.confidence.value(), 0.7));
    }

    #[test]
    fn missing_fields_use_defaults() {
        let r = parse_classification("{}").unwrap();
        assert_eq!(r, ClassificationResult::neutral());
    }

    #[test]
    fn confidence_is_clamped() {
        let r = parse_classification(r#"{"categoria": "Produtivo", "confianca": 1.4}"#).unwrap();
        assert!(approx(r.confidence.value(), 0.9));
        let r = parse_classification(r#"{"categoria": "Produtivo", "confianca": 0.01}"#).unwrap();
        assert!(approx(r.confidence.value(), 0.1));
    }

    #[test]
    fn rejects_non_json() {
        assert!(parse_classification("Este e-mail é produtivo.").is_err());
        assert!(parse_classification("{categoria: Produtivo}").is_err());
    }

    #[test]
    fn rejects_unknown_label_and_bad_confidence() {
        assert!(parse_classification(r#"{"categoria": "Urgente"}"#).is_err());
        assert!(parse_classification(r#"{"confianca": "alta"}"#).is_err());
        assert!(parse_classification(r#"{"categoria": 3}"#).is_err());
    }

    #[test]
    fn greedy_match_spans_to_last_brace() {
        // two objects → greedy span is not valid JSON
        assert!(parse_classification(r#"{"a": 1} e {"b": 2}"#).is_err());
    }

    #[test]
    fn prompt_embeds_email_and_fields() {
        let prompt = build_classification_prompt("Preciso do boleto");
        assert!(prompt.contains("\"categoria\""));
        assert!(prompt.contains("\"confianca\""));
        assert!(prompt.ends_with("Preciso do boleto"));
    }

    #[test]
    fn mode_from_str() {
        assert_eq!("AI".parse::<ClassifierMode>(), Ok(ClassifierMode::Ai));
        assert_eq!("rules".parse::<ClassifierMode>(), Ok(ClassifierMode::Rules));
        assert!("magic".parse::<ClassifierMode>().is_err());
    }

    // ── AI classifier with mocked generator ─────────────────────────

    #[tokio::test]
    async fn ai_classifier_uses_model_json() {
        let g = generator_with(Some(CannedRemote(Ok(
            r#"{"categoria": "Produtivo", "confianca": 0.85}"#,
        ))));
        let r = AiClassifier::new(g).classify("Erro no sistema").await;
        assert_eq!(r.category, Category::Productive);
        assert!(approx(r.confidence.value(), 0.85));
    }

    #[tokio::test]
    async fn ai_classifier_non_json_is_neutral() {
        let g = generator_with(Some(CannedRemote(Ok("Acho que é produtivo."))));
        let r = AiClassifier::new(g).classify("Erro no sistema").await;
        assert_eq!(r, ClassificationResult::neutral());
    }

    #[tokio::test]
    async fn ai_classifier_total_generation_failure_is_neutral() {
        // remote fails, local unavailable → static apology text → no JSON
        let g = generator_with(Some(CannedRemote(Err("timeout"))));
        let r = AiClassifier::new(g).classify("Erro no sistema").await;
        assert_eq!(r, ClassificationResult::neutral());
    }

    #[tokio::test]
    async fn ai_mode_without_remote_uses_rules() {
        let g = generator_with(None);
        let classifier = Classifier::select(ClassifierMode::Ai, RulesEngine::default_rules(), &g);
        assert_eq!(classifier.label(), "rules");
        let r = classifier.classify("Segue o contrato").await;
        assert_eq!(r.category, Category::Productive);
    }

    #[tokio::test]
    async fn ai_mode_with_remote_uses_ai() {
        let g = generator_with(Some(CannedRemote(Ok(r#"{"categoria": "Improdutivo", "confianca": 0.3}"#))));
        let classifier = Classifier::select(ClassifierMode::Ai, RulesEngine::default_rules(), &g);
        assert_eq!(classifier.label(), "ai");
        let r = classifier.classify("Segue o contrato").await;
        assert_eq!(r.category, Category::Unproductive);
        assert!(approx(r.confidence.value(), 0.3));
    }
}
