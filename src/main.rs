use std::sync::Arc;

use mail_triage::api::app_routes;
use mail_triage::config::AppConfig;
use mail_triage::error::Result;
use mail_triage::pipeline::EmailProcessor;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = AppConfig::from_env()?;

    eprintln!("📬 Mail Triage v{}", env!("CARGO_PKG_VERSION"));
    eprintln!(
        "   Remote: {}",
        config
            .remote
            .as_ref()
            .map(|r| format!("mistral ({})", r.model))
            .unwrap_or_else(|| "disabled".to_string())
    );
    eprintln!("   Local model: {}", config.local_model);
    eprintln!("   Classifier: {:?}", config.classifier_mode);
    eprintln!("   API: http://0.0.0.0:{}/processar-email/\n", config.port);

    let processor = Arc::new(EmailProcessor::from_config(&config)?);
    let app = app_routes(processor);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    tracing::info!(port = config.port, "HTTP server started");
    axum::serve(listener, app).await?;

    Ok(())
}
