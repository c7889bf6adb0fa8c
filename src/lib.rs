//! failsight - Conversational Predictive Maintenance Assistant
//!
//! A web-exposed assistant that answers natural-language questions about
//! machine health by driving a hosted LLM with function calling over four
//! local tools: failure/wear prediction, model explanation charts, dataset
//! summaries, and distribution plots.
//!
//! Two binaries share this library:
//! - `failsight` — the HTTP server
//! - `failsight-train` — offline training that produces the serving artifacts

pub mod api;
pub mod artifacts;
pub mod chat;
pub mod config;
pub mod dataset;
pub mod llm;
pub mod ml;
pub mod plot;
pub mod service;
pub mod types;

pub use api::{create_app, ChatState};
pub use artifacts::ModelArtifacts;
pub use chat::ToolRegistry;
pub use config::ServerConfig;
pub use plot::PlotRenderer;
pub use service::PredictionService;
