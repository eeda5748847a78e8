//! Reply generation for Mail Triage.
//!
//! Tiers, in order:
//! - **Remote**: Mistral chat-completions API (when an API key is configured)
//! - **Local**: in-process model, loaded once on first use
//! - **Static**: fixed apology text
//!
//! `ResponseGenerator` owns the chain; the tiers sit behind the traits in
//! `provider` so tests can swap them out.

#[cfg(feature = "local-model")]
pub mod candle_backend;
pub mod generator;
pub mod local;
pub mod mistral;
pub mod provider;

pub use generator::{DEFAULT_MAX_TOKENS, FALLBACK_REPLY, GeneratedReply, ResponseGenerator};
pub use local::LocalTier;
pub use mistral::{MistralConfig, MistralProvider};
pub use provider::*;
