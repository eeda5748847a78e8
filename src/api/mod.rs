//! HTTP surface: classification endpoint plus upload decoding.

pub mod routes;
pub mod upload;

pub use routes::{AppState, app_routes};
