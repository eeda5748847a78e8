//! Keyword rules engine: the deterministic classifier.
//!
//! Counts whole-word keyword hits in the normalized text:
//! - more productive hits → Productive
//! - more unproductive hits → Unproductive
//! - tie (including 0–0) → Productive only if a strong-signal keyword appears,
//!   otherwise the neutral default
//!
//! Matching runs against the full normalized string, so multi-word phrases
//! like "bom dia" match as phrases rather than tokens.

use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;
use crate::pipeline::normalize::normalize;
use crate::pipeline::types::{Category, ClassificationResult};

/// Score with no keyword evidence beyond the winning side.
const BASE_SCORE: f64 = 0.5;

/// Score added per keyword hit on the winning side.
const SCORE_PER_HIT: f64 = 0.1;

/// Upper bound on the raw keyword score.
pub const SCORE_CAP: f64 = 0.95;

/// Score for a tie broken by a strong-signal keyword.
const STRONG_SIGNAL_SCORE: f64 = 0.6;

// ── Keyword lists (configuration data) ──────────────────────────────

/// The three keyword lists driving the rules engine.
///
/// Loadable from a JSON file so lists can be tuned without a rebuild.
/// Missing fields keep their built-in defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordLists {
    #[serde(default = "default_productive")]
    pub productive: Vec<String>,
    #[serde(default = "default_unproductive")]
    pub unproductive: Vec<String>,
    /// Checked only when the two counts tie.
    #[serde(default = "default_strong_productive")]
    pub strong_productive: Vec<String>,
}

impl Default for KeywordLists {
    fn default() -> Self {
        Self {
            productive: default_productive(),
            unproductive: default_unproductive(),
            strong_productive: default_strong_productive(),
        }
    }
}

impl KeywordLists {
    /// Read keyword lists from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw).map_err(|e| {
            ConfigError::ParseError(format!("keyword file {}: {e}", path.display()))
        })
    }
}

fn default_productive() -> Vec<String> {
    [
        "suporte",
        "erro",
        "problema",
        "reclama",
        "status",
        "pedido",
        "documento",
        "anexo",
        "fatura",
        "pagamento",
        "cancelar",
        "ajuda",
        "solicitação",
        "contrato",
        "assinatura",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_unproductive() -> Vec<String> {
    [
        "obrigado",
        "obrigada",
        "feliz natal",
        "parabéns",
        "boa tarde",
        "bom dia",
        "boa noite",
        "gratidão",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_strong_productive() -> Vec<String> {
    ["anexo", "erro", "reembolso", "contrato", "assinatura"]
        .into_iter()
        .map(String::from)
        .collect()
}

// ── Engine ──────────────────────────────────────────────────────────

/// A keyword with its compiled whole-word matcher.
#[derive(Debug, Clone)]
pub struct KeywordRule {
    pub keyword: String,
    pub regex: Regex,
}

impl KeywordRule {
    /// Compile `keyword` in the same normalized form as the text it is
    /// matched against, so "E-mail" matches "e-mail" in an email body.
    pub fn new(keyword: &str) -> Result<Self, regex::Error> {
        let keyword = normalize(keyword);
        let regex = Regex::new(&format!(r"\b{}\b", regex::escape(&keyword)))?;
        Ok(Self { keyword, regex })
    }
}

/// Which rule decided the outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleReason {
    ProductiveMajority,
    UnproductiveMajority,
    StrongSignal { keyword: String },
    NoSignal,
}

/// Full outcome of a rules evaluation, before clamping.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleMatch {
    pub category: Category,
    /// Raw heuristic score, capped at [`SCORE_CAP`].
    pub score: f64,
    pub productive_hits: usize,
    pub unproductive_hits: usize,
    pub reason: RuleReason,
}

/// Keyword classifier. Pure and deterministic; never fails.
#[derive(Debug, Clone)]
pub struct RulesEngine {
    productive: Vec<KeywordRule>,
    unproductive: Vec<KeywordRule>,
    strong_productive: Vec<KeywordRule>,
}

impl RulesEngine {
    /// Rules engine with the built-in keyword lists.
    pub fn default_rules() -> Self {
        // Built-in keywords are plain words; escaping makes them always valid.
        Self::from_lists(&KeywordLists::default()).expect("built-in keywords compile")
    }

    /// Create an empty rules engine (for testing).
    pub fn empty() -> Self {
        Self {
            productive: Vec::new(),
            unproductive: Vec::new(),
            strong_productive: Vec::new(),
        }
    }

    /// Build from externally supplied keyword lists.
    pub fn from_lists(lists: &KeywordLists) -> Result<Self, regex::Error> {
        let compile = |words: &[String]| -> Result<Vec<KeywordRule>, regex::Error> {
            words
                .iter()
                .filter(|w| !normalize(w).is_empty())
                .map(|w| KeywordRule::new(w))
                .collect()
        };
        Ok(Self {
            productive: compile(&lists.productive)?,
            unproductive: compile(&lists.unproductive)?,
            strong_productive: compile(&lists.strong_productive)?,
        })
    }

    /// Add a productive keyword. Keywords that normalize to nothing are ignored.
    pub fn add_productive(&mut self, keyword: &str) -> Result<(), regex::Error> {
        if !normalize(keyword).is_empty() {
            self.productive.push(KeywordRule::new(keyword)?);
        }
        Ok(())
    }

    /// Evaluate raw email text against all keyword lists.
    pub fn evaluate(&self, text: &str) -> RuleMatch {
        let normalized = normalize(text);
        let unique_tokens: HashSet<&str> = normalized.split_whitespace().collect();

        let productive_hits = count_hits(&self.productive, &normalized);
        let unproductive_hits = count_hits(&self.unproductive, &normalized);

        debug!(
            tokens = unique_tokens.len(),
            productive_hits, unproductive_hits, "Keyword rules evaluated"
        );

        let (category, score, reason) = if productive_hits > unproductive_hits {
            (
                Category::Productive,
                hit_score(productive_hits),
                RuleReason::ProductiveMajority,
            )
        } else if unproductive_hits > productive_hits {
            (
                Category::Unproductive,
                hit_score(unproductive_hits),
                RuleReason::UnproductiveMajority,
            )
        } else if let Some(rule) = self
            .strong_productive
            .iter()
            .find(|r| r.regex.is_match(&normalized))
        {
            (
                Category::Productive,
                STRONG_SIGNAL_SCORE,
                RuleReason::StrongSignal {
                    keyword: rule.keyword.clone(),
                },
            )
        } else {
            (Category::Unproductive, BASE_SCORE, RuleReason::NoSignal)
        };

        RuleMatch {
            category,
            score,
            productive_hits,
            unproductive_hits,
            reason,
        }
    }

    /// Classify raw email text; confidence is clamped into range.
    pub fn classify(&self, text: &str) -> ClassificationResult {
        let matched = self.evaluate(text);
        ClassificationResult::new(matched.category, matched.score)
    }
}

impl Default for RulesEngine {
    fn default() -> Self {
        Self::default_rules()
    }
}

fn count_hits(rules: &[KeywordRule], normalized: &str) -> usize {
    rules.iter().filter(|r| r.regex.is_match(normalized)).count()
}

fn hit_score(hits: usize) -> f64 {
    (BASE_SCORE + SCORE_PER_HIT * hits as f64).min(SCORE_CAP)
}

static DEFAULT_ENGINE: LazyLock<RulesEngine> = LazyLock::new(RulesEngine::default_rules);

/// Classify with the built-in keyword lists.
pub fn classify_by_rules(text: &str) -> ClassificationResult {
    DEFAULT_ENGINE.classify(text)
}
