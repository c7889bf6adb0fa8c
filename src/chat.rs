//! Tool-Dispatch Chat Loop
//!
//! Orchestrates a single user turn against the chat backend with function
//! calling: submit the message, resolve up to [`MAX_TOOL_ROUNDS`] requested
//! tool calls by invoking the matching local handler, feed each structured
//! result back, and return the model's final text.
//!
//! The loop is fail-open: every failure mode — unknown tool, handler error,
//! transport fault, round-cap exhaustion — collapses to a string reply.
//! Nothing propagates past this module.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::llm::{ChatBackend, ChatSession, FunctionDeclaration, ModelTurn};
use crate::service::PredictionService;
use crate::types::ChatTurn;

/// Upper bound on tool-resolution rounds per user turn.
pub const MAX_TOOL_ROUNDS: usize = 5;

/// Reply when the backend fails outright.
pub const APOLOGY_REPLY: &str =
    "A communication error occurred with the assistant. Please try rephrasing your question.";

/// Reply when the round cap is exhausted and no text could be extracted.
pub const MULTI_STEP_FALLBACK: &str =
    "A communication error occurred with the assistant after multiple steps. Please try again.";

type ToolHandler = Box<dyn Fn(&serde_json::Map<String, Value>) -> Result<String> + Send + Sync>;

// ============================================================================
// Tool registry
// ============================================================================

/// Fixed mapping from tool name to handler, built once at startup with the
/// four tools closing over the shared prediction service. The declarations
/// advertised to the model are generated alongside the handlers so the two
/// can never drift apart.
pub struct ToolRegistry {
    tools: Vec<(&'static str, ToolHandler)>,
    declarations: Vec<FunctionDeclaration>,
}

impl ToolRegistry {
    /// Register the four prediction-service tools.
    pub fn for_service(service: Arc<PredictionService>) -> Self {
        let mut registry = Self {
            tools: Vec::new(),
            declarations: Vec::new(),
        };

        let svc = Arc::clone(&service);
        registry.register(
            "run_prediction",
            "Run the failure-probability (classification) and tool-wear (regression) models \
             for one machine reading. type_machine must be 'L', 'M' or 'H'.",
            Some(json!({
                "type": "OBJECT",
                "properties": {
                    "type_machine": {"type": "STRING", "description": "Machine type: L, M or H"},
                    "air_temp_k": {"type": "NUMBER", "description": "Air temperature in Kelvin"},
                    "process_temp_k": {"type": "NUMBER", "description": "Process temperature in Kelvin"},
                    "rotation_rpm": {"type": "NUMBER", "description": "Rotational speed in RPM"},
                    "torque_nm": {"type": "NUMBER", "description": "Torque in Newton-meters"},
                    "tool_wear_min": {"type": "NUMBER", "description": "Tool wear in minutes"}
                },
                "required": ["type_machine", "air_temp_k", "process_temp_k",
                             "rotation_rpm", "torque_nm", "tool_wear_min"]
            })),
            Box::new(move |args| {
                Ok(svc.run_prediction(
                    arg_str(args, "type_machine")?,
                    arg_f64(args, "air_temp_k")?,
                    arg_f64(args, "process_temp_k")?,
                    arg_f64(args, "rotation_rpm")?,
                    arg_f64(args, "torque_nm")?,
                    arg_f64(args, "tool_wear_min")?,
                ))
            }),
        );

        let svc = Arc::clone(&service);
        registry.register(
            "generate_explanation",
            "Render a feature-importance (XAI) chart for one of the models and return its \
             image URL. model_to_explain must be 'classification' or 'regression'.",
            Some(json!({
                "type": "OBJECT",
                "properties": {
                    "model_to_explain": {
                        "type": "STRING",
                        "description": "'classification' or 'regression'"
                    }
                },
                "required": ["model_to_explain"]
            })),
            Box::new(move |args| Ok(svc.generate_explanation(arg_str(args, "model_to_explain")?))),
        );

        let svc = Arc::clone(&service);
        registry.register(
            "get_dataset_summary",
            "Summarize the maintenance dataset: record count, machine type and failure counts, \
             and descriptive statistics for every numeric column.",
            None,
            Box::new(move |_args| Ok(svc.get_dataset_summary())),
        );

        let svc = service;
        registry.register(
            "plot_data_distribution",
            "Render a distribution chart for a dataset column (synonyms are resolved \
             automatically) and return its image URL. hue_column optionally breaks the \
             distribution down by a second column.",
            Some(json!({
                "type": "OBJECT",
                "properties": {
                    "column_name": {"type": "STRING", "description": "Column to plot"},
                    "hue_column": {"type": "STRING", "description": "Optional grouping column"}
                },
                "required": ["column_name"]
            })),
            Box::new(move |args| {
                let hue = args.get("hue_column").and_then(Value::as_str);
                Ok(svc.plot_data_distribution(arg_str(args, "column_name")?, hue))
            }),
        );

        registry
    }

    fn register(
        &mut self,
        name: &'static str,
        description: &str,
        parameters: Option<Value>,
        handler: ToolHandler,
    ) {
        self.tools.push((name, handler));
        self.declarations.push(FunctionDeclaration {
            name: name.to_string(),
            description: description.to_string(),
            parameters,
        });
    }

    /// Declarations for the backend's tool configuration.
    pub fn declarations(&self) -> Vec<FunctionDeclaration> {
        self.declarations.clone()
    }

    /// Registered tool names (stable order).
    pub fn names(&self) -> Vec<&'static str> {
        self.tools.iter().map(|(n, _)| *n).collect()
    }

    /// Resolve one requested tool call to a structured tool result.
    ///
    /// Unknown names and handler failures become `{"error": ...}` payloads;
    /// handler output that is not valid JSON is wrapped as `{"result": ...}`
    /// (handlers only promise to return *some* string).
    pub fn dispatch(&self, name: &str, args: &serde_json::Map<String, Value>) -> Value {
        let Some((_, handler)) = self.tools.iter().find(|(n, _)| *n == name) else {
            error!(tool = name, "model requested unknown tool");
            return json!({ "error": format!("Unknown tool: {name}") });
        };

        match handler(args) {
            Ok(raw) => match serde_json::from_str::<Value>(&raw) {
                Ok(parsed) => parsed,
                Err(_) => {
                    warn!(tool = name, "tool returned non-JSON output, wrapping");
                    json!({ "result": raw })
                }
            },
            Err(e) => {
                error!(tool = name, error = %e, "tool invocation failed");
                json!({ "error": format!("Internal error executing tool: {e}") })
            }
        }
    }
}

fn arg_str<'a>(args: &'a serde_json::Map<String, Value>, key: &str) -> Result<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("missing or non-string argument '{key}'"))
}

/// Numeric argument; numeric strings are tolerated since hosted models
/// occasionally quote numbers.
fn arg_f64(args: &serde_json::Map<String, Value>, key: &str) -> Result<f64> {
    match args.get(key) {
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| anyhow!("argument '{key}' is not representable as f64")),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| anyhow!("argument '{key}' is not a number")),
        _ => Err(anyhow!("missing numeric argument '{key}'")),
    }
}

// ============================================================================
// Dispatch loop
// ============================================================================

/// Process one user turn and always return a reply string.
pub async fn handle_chat_message(
    backend: &dyn ChatBackend,
    registry: &ToolRegistry,
    message: &str,
    history: &[ChatTurn],
) -> String {
    info!(backend = backend.backend_name(), "processing user message");

    match run_dispatch(backend, registry, message, history).await {
        Ok(reply) => reply,
        Err(e) => {
            error!(error = %e, "chat dispatch failed");
            APOLOGY_REPLY.to_string()
        }
    }
}

async fn run_dispatch(
    backend: &dyn ChatBackend,
    registry: &ToolRegistry,
    message: &str,
    history: &[ChatTurn],
) -> Result<String> {
    let mut session = ChatSession::from_history(history);
    session.push_user_text(message);

    let mut content = backend.generate(&session).await?;

    for round in 0..MAX_TOOL_ROUNDS {
        match ModelTurn::from_content(&content) {
            ModelTurn::Text(text) => {
                if text.trim().is_empty() {
                    return Err(anyhow!("model returned empty content"));
                }
                info!(round, "model answered with text");
                return Ok(text);
            }
            ModelTurn::ToolCall { name, args } => {
                info!(round, tool = %name, "model requested tool");
                let response = registry.dispatch(&name, &args);

                session.push_model(content);
                session.push_tool_response(&name, response);
                content = backend.generate(&session).await?;
            }
        }
    }

    // Round cap exhausted: best-effort text, then the fixed fallback.
    warn!(
        rounds = MAX_TOOL_ROUNDS,
        "tool-resolution round cap exhausted"
    );
    match ModelTurn::from_content(&content) {
        ModelTurn::Text(text) if !text.trim().is_empty() => Ok(text),
        _ => Ok(MULTI_STEP_FALLBACK.to_string()),
    }
}
