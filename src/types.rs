//! Shared Types
//!
//! Conversation DTOs exchanged with the web client. The wire/LLM-side types
//! live in [`crate::llm`]; these are the caller-facing shapes.

use serde::{Deserialize, Serialize};

/// Role of a conversation turn as supplied by the client. Only these two
/// survive history filtering; anything else is dropped before submission.
pub const ROLE_USER: &str = "user";
pub const ROLE_MODEL: &str = "model";

/// One turn of caller-persisted conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

/// Body of `POST /chat`.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub history: Vec<ChatTurn>,
}

/// Response of `POST /chat` — always present, even for internal failures.
#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub reply: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_request_history_defaults_empty() {
        let request: ChatRequest = serde_json::from_str(r#"{"message":"hi"}"#).unwrap();
        assert_eq!(request.message, "hi");
        assert!(request.history.is_empty());
    }

    #[test]
    fn test_chat_turn_roundtrip() {
        let turn = ChatTurn {
            role: ROLE_MODEL.into(),
            content: "answer".into(),
        };
        let raw = serde_json::to_string(&turn).unwrap();
        let back: ChatTurn = serde_json::from_str(&raw).unwrap();
        assert_eq!(back.role, "model");
        assert_eq!(back.content, "answer");
    }
}
