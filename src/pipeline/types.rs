//! Shared types for the classification pipeline.

use std::fmt;

use serde::{Deserialize, Serialize, Serializer};

// ── Category ────────────────────────────────────────────────────────

/// Whether an email needs professional follow-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    /// Requests, issues, status updates, contracts, payments.
    #[serde(rename = "Produtivo")]
    Productive,
    /// Greetings, thanks, trivial messages.
    #[serde(rename = "Improdutivo")]
    Unproductive,
}

impl Category {
    /// Canonical capitalized label, as sent to clients and models.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Productive => "Produtivo",
            Self::Unproductive => "Improdutivo",
        }
    }

    /// Resolve a free-form label (any casing, PT or EN) to a category.
    ///
    /// Returns `None` for anything that is not one of the two labels.
    pub fn from_label(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "produtivo" | "productive" => Some(Self::Productive),
            "improdutivo" | "unproductive" => Some(Self::Unproductive),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ── Confidence ──────────────────────────────────────────────────────

/// Heuristic confidence score, always within `[MIN, MAX]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Deserialize)]
#[serde(from = "f64")]
pub struct Confidence(f64);

impl Confidence {
    pub const MIN: f64 = 0.1;
    pub const MAX: f64 = 0.9;
    /// Score used whenever no signal is available.
    pub const NEUTRAL: Confidence = Confidence(0.5);

    /// Clamp any raw score into range. NaN collapses to neutral.
    pub fn new(raw: f64) -> Self {
        if raw.is_nan() {
            return Self::NEUTRAL;
        }
        Self(raw.clamp(Self::MIN, Self::MAX))
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    /// Value rounded to two decimal places.
    pub fn rounded(&self) -> f64 {
        (self.0 * 100.0).round() / 100.0
    }
}

impl From<f64> for Confidence {
    fn from(raw: f64) -> Self {
        Self::new(raw)
    }
}

impl Serialize for Confidence {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.rounded())
    }
}

// ── Results ─────────────────────────────────────────────────────────

/// Category plus confidence for a single request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassificationResult {
    pub category: Category,
    pub confidence: Confidence,
}

impl ClassificationResult {
    pub fn new(category: Category, confidence: f64) -> Self {
        Self {
            category,
            confidence: Confidence::new(confidence),
        }
    }

    /// Fallback when no classifier produced a usable answer.
    pub fn neutral() -> Self {
        Self {
            category: Category::Unproductive,
            confidence: Confidence::NEUTRAL,
        }
    }
}

/// Final payload returned to HTTP clients.
#[derive(Debug, Clone, Serialize)]
pub struct EmailAnalysis {
    pub categoria: Category,
    pub confianca: Confidence,
    pub resposta_sugerida: String,
}
