//! Error types for Mail Triage.

/// Errors that abort startup: bad configuration or a socket that cannot be
/// bound or served. Request-time errors never reach this level.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reply-generation and model errors.
///
/// None of these reach the HTTP boundary: the generator facade degrades
/// through its tiers and the AI classifier falls back to a neutral result.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Local model unavailable: {0}")]
    LocalUnavailable(String),

    #[error("Local model {model} failed to load: {reason}")]
    LocalLoadFailed { model: String, reason: String },

    #[error("Local generation failed: {0}")]
    LocalGenerationFailed(String),
}

/// Request input errors. The only errors surfaced to HTTP clients.
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("Enviar 'texto' ou 'arquivo'")]
    MissingContent,

    #[error("Formato não suportado")]
    UnsupportedFormat { filename: String },

    #[error("Não foi possível ler o arquivo {filename}: {reason}")]
    Unreadable { filename: String, reason: String },

    #[error("Requisição inválida: {0}")]
    Malformed(String),
}

/// Result type for process startup.
pub type Result<T> = std::result::Result<T, Error>;
