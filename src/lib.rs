//! Mail Triage: email classification and reply drafting.

pub mod api;
pub mod config;
pub mod error;
pub mod llm;
pub mod pipeline;
