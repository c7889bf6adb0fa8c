//! failsight - Predictive Maintenance Assistant Server
//!
//! HTTP server exposing a conversational assistant over trained
//! machine-failure models.
//!
//! # Usage
//!
//! ```bash
//! # Train the models first (writes models/ and data/)
//! cargo run --release --bin failsight-train -- --input ai4i2020.csv
//!
//! # Serve
//! GEMINI_API_KEY=... cargo run --release
//! ```
//!
//! # Environment Variables
//!
//! - `GEMINI_API_KEY`: Gemini API key (required)
//! - `FAILSIGHT_ADDR`: Bind address (default: 0.0.0.0:8000)
//! - `FAILSIGHT_BASE_URL`: Public URL used in image links
//! - `FAILSIGHT_CORS_ORIGINS`: Comma-separated allowed origins
//! - `RUST_LOG`: Logging level (default: info)

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use failsight::api::{create_app, ChatState};
use failsight::artifacts::ModelArtifacts;
use failsight::chat::ToolRegistry;
use failsight::config::ServerConfig;
use failsight::llm::GeminiBackend;
use failsight::plot::PlotRenderer;
use failsight::service::PredictionService;

/// Assemble the system instruction: assistant role, dataset context from
/// training, and the image-rendering contract the web client depends on.
fn build_system_instruction(columns_prompt: Option<&str>) -> String {
    let mut instruction = String::from(
        "You are an expert predictive-maintenance assistant. \
         Use the provided tools to answer the user's requests.\n",
    );

    if let Some(prompt) = columns_prompt {
        instruction.push('\n');
        instruction.push_str(prompt);
        instruction.push('\n');
    }

    instruction.push_str(
        "\nIMPORTANT - IMAGE RENDERING:\n\
         When the `generate_explanation` or `plot_data_distribution` tools return a \
         JSON function response, you MUST extract the value of its \"image_url\" key.\n\
         \n\
         The JSON will look like:\n\
         {\"image_url\": \"http://localhost:8000/static/plot_abc123.png\"}\n\
         \n\
         To display the image in the chat you MUST use an HTML <img> tag, with the \
         \"image_url\" value as its 'src'.\n\
         \n\
         Example of a correct answer:\n\
         Sure, here is the chart:\n\
         <img src=\"http://localhost:8000/static/plot_abc123.png\" alt=\"Chart description\" \
         style=\"width: 100%; max-width: 600px;\">\n\
         \n\
         NEVER use Markdown image syntax (![alt](link)). ALWAYS use the HTML \
         <img src=\"...\"> tag with the full \"image_url\" value, and add a style \
         attribute to limit its size.\n",
    );

    instruction
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = ServerConfig::parse();

    info!("failsight - Predictive Maintenance Assistant");
    info!(
        models_dir = %config.models_dir.display(),
        data_csv = %config.data_csv.display(),
        "loading serving artifacts"
    );

    let artifacts = ModelArtifacts::load(&config.models_dir, &config.data_csv);
    let renderer = PlotRenderer::new(config.static_dir.clone())
        .with_context(|| format!("failed to prepare {}", config.static_dir.display()))?;

    let columns_prompt = artifacts
        .features
        .as_ref()
        .map(|f| f.columns_prompt.clone());
    let service = Arc::new(PredictionService::new(
        artifacts,
        renderer,
        config.base_url.clone(),
    ));
    let registry = Arc::new(ToolRegistry::for_service(Arc::clone(&service)));

    let system_instruction = build_system_instruction(columns_prompt.as_deref());
    let backend = Arc::new(GeminiBackend::new(
        config.gemini_api_key.clone(),
        config.model.clone(),
        system_instruction,
        registry.declarations(),
    ));
    info!(model = %config.model, "chat backend configured");

    let state = ChatState::new(service, backend, registry);
    let app = create_app(state, &config.static_dir);

    let listener = tokio::net::TcpListener::bind(&config.addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.addr))?;
    info!("HTTP server listening on {}", config.addr);

    axum::serve(listener, app)
        .await
        .context("HTTP server error")?;

    Ok(())
}
