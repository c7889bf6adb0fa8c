//! LLM Backend Module
//!
//! A unified boundary over hosted chat models with function calling.
//!
//! The external API's response shape is converted into the strict internal
//! [`ModelTurn`] representation at this boundary — downstream code (the
//! dispatch loop) never branches on SDK/wire types. Wire structs mirror the
//! Gemini `generateContent` Content/Part layout since that is the hosted
//! model in production; the [`ChatBackend`] trait keeps the loop testable
//! against a scripted stand-in.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

mod gemini;
mod scripted;

pub use gemini::GeminiBackend;
pub use scripted::ScriptedBackend;

use crate::types::{ChatTurn, ROLE_MODEL, ROLE_USER};

// ============================================================================
// Wire types
// ============================================================================

/// One function call requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub args: serde_json::Map<String, Value>,
}

/// A tool result sent back to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionResponse {
    pub name: String,
    pub response: Value,
}

/// One content part: exactly one of the fields is populated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_response: Option<FunctionResponse>,
}

/// A role-tagged message in the conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatContent {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub parts: Vec<ChatPart>,
}

impl ChatContent {
    pub fn user_text(text: &str) -> Self {
        Self {
            role: ROLE_USER.to_string(),
            parts: vec![ChatPart {
                text: Some(text.to_string()),
                ..ChatPart::default()
            }],
        }
    }

    pub fn model_text(text: &str) -> Self {
        Self {
            role: ROLE_MODEL.to_string(),
            parts: vec![ChatPart {
                text: Some(text.to_string()),
                ..ChatPart::default()
            }],
        }
    }

    pub fn model_tool_call(name: &str, args: serde_json::Map<String, Value>) -> Self {
        Self {
            role: ROLE_MODEL.to_string(),
            parts: vec![ChatPart {
                function_call: Some(FunctionCall {
                    name: name.to_string(),
                    args,
                }),
                ..ChatPart::default()
            }],
        }
    }

    /// Function responses travel in a user-role content per the REST API.
    pub fn tool_response(name: &str, response: Value) -> Self {
        Self {
            role: ROLE_USER.to_string(),
            parts: vec![ChatPart {
                function_response: Some(FunctionResponse {
                    name: name.to_string(),
                    response,
                }),
                ..ChatPart::default()
            }],
        }
    }
}

/// Declaration of one callable tool, advertised to the model.
#[derive(Debug, Clone, Serialize)]
pub struct FunctionDeclaration {
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
}

// ============================================================================
// Internal model-turn representation
// ============================================================================

/// What the model's latest content means to the dispatch loop.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelTurn {
    /// Plain text answer (may be empty when the model returned nothing
    /// usable — the loop treats that as a failure).
    Text(String),
    /// The model wants a tool run before it answers.
    ToolCall {
        name: String,
        args: serde_json::Map<String, Value>,
    },
}

impl ModelTurn {
    /// Classify a content: the first function-call part wins, otherwise all
    /// text parts are concatenated.
    pub fn from_content(content: &ChatContent) -> Self {
        for part in &content.parts {
            if let Some(call) = &part.function_call {
                return Self::ToolCall {
                    name: call.name.clone(),
                    args: call.args.clone(),
                };
            }
        }
        let text: String = content
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect::<Vec<_>>()
            .join("");
        Self::Text(text)
    }
}

// ============================================================================
// Session
// ============================================================================

/// Ordered per-request conversation state submitted to the backend.
#[derive(Debug, Clone, Default)]
pub struct ChatSession {
    contents: Vec<ChatContent>,
}

impl ChatSession {
    /// Seed from caller-supplied history. Turns with roles other than
    /// user/model are silently dropped before submission.
    pub fn from_history(history: &[ChatTurn]) -> Self {
        let contents = history
            .iter()
            .filter(|turn| turn.role == ROLE_USER || turn.role == ROLE_MODEL)
            .map(|turn| ChatContent {
                role: turn.role.clone(),
                parts: vec![ChatPart {
                    text: Some(turn.content.clone()),
                    ..ChatPart::default()
                }],
            })
            .collect();
        Self { contents }
    }

    pub fn push_user_text(&mut self, text: &str) {
        self.contents.push(ChatContent::user_text(text));
    }

    pub fn push_model(&mut self, content: ChatContent) {
        self.contents.push(content);
    }

    pub fn push_tool_response(&mut self, name: &str, response: Value) {
        self.contents.push(ChatContent::tool_response(name, response));
    }

    pub fn contents(&self) -> &[ChatContent] {
        &self.contents
    }
}

// ============================================================================
// Backend trait
// ============================================================================

/// Unified interface over chat backends with function calling.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Produce the model's next content for the session.
    async fn generate(&self, session: &ChatSession) -> Result<ChatContent>;

    /// Backend name for logging.
    fn backend_name(&self) -> &'static str;
}
