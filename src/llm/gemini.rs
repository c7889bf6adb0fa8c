//! Gemini REST Backend
//!
//! Thin client for the `generateContent` endpoint of the Generative
//! Language API with function-calling enabled. The system instruction and
//! tool declarations are fixed at construction; each `generate` call submits
//! the full session and returns the first candidate's content.
//!
//! No retry or timeout policy here — the dispatch loop's round cap bounds
//! the request, and transport failures surface as errors the loop maps to
//! its apology reply.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ChatBackend, ChatContent, ChatSession, FunctionDeclaration};

const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Hosted Gemini chat backend.
pub struct GeminiBackend {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
    system_instruction: String,
    declarations: Vec<FunctionDeclaration>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    system_instruction: SystemInstruction<'a>,
    contents: &'a [ChatContent],
    tools: Vec<ToolDeclarations<'a>>,
}

#[derive(Serialize)]
struct SystemInstruction<'a> {
    parts: Vec<TextPart<'a>>,
}

#[derive(Serialize)]
struct TextPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolDeclarations<'a> {
    function_declarations: &'a [FunctionDeclaration],
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<ChatContent>,
}

impl GeminiBackend {
    /// Create a backend bound to one model, system instruction, and tool set.
    pub fn new(
        api_key: String,
        model: String,
        system_instruction: String,
        declarations: Vec<FunctionDeclaration>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: DEFAULT_API_BASE.to_string(),
            api_key,
            model,
            system_instruction,
            declarations,
        }
    }

    /// Override the API base URL (tests against a local stub server).
    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl ChatBackend for GeminiBackend {
    async fn generate(&self, session: &ChatSession) -> Result<ChatContent> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.api_base, self.model, self.api_key
        );

        let request = GenerateContentRequest {
            system_instruction: SystemInstruction {
                parts: vec![TextPart {
                    text: &self.system_instruction,
                }],
            },
            contents: session.contents(),
            tools: vec![ToolDeclarations {
                function_declarations: &self.declarations,
            }],
        };

        debug!(
            model = %self.model,
            contents = session.contents().len(),
            "submitting chat session"
        );

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .context("chat API request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(300).collect();
            return Err(anyhow!("chat API returned {status}: {snippet}"));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .context("chat API response was not valid JSON")?;

        parsed
            .candidates
            .into_iter()
            .find_map(|c| c.content)
            .ok_or_else(|| anyhow!("chat API returned no candidates"))
    }

    fn backend_name(&self) -> &'static str {
        "gemini"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_serialization_shape() {
        let declarations = vec![FunctionDeclaration {
            name: "run_prediction".into(),
            description: "predict".into(),
            parameters: Some(json!({"type": "OBJECT", "properties": {}})),
        }];
        let mut session = ChatSession::default();
        session.push_user_text("will it fail?");

        let request = GenerateContentRequest {
            system_instruction: SystemInstruction {
                parts: vec![TextPart { text: "be helpful" }],
            },
            contents: session.contents(),
            tools: vec![ToolDeclarations {
                function_declarations: &declarations,
            }],
        };

        let raw = serde_json::to_value(&request).unwrap();
        assert_eq!(raw["systemInstruction"]["parts"][0]["text"], "be helpful");
        assert_eq!(raw["contents"][0]["role"], "user");
        assert_eq!(
            raw["tools"][0]["functionDeclarations"][0]["name"],
            "run_prediction"
        );
    }

    #[test]
    fn test_response_parsing_tool_call() {
        let raw = json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [{
                        "functionCall": {
                            "name": "get_dataset_summary",
                            "args": {}
                        }
                    }]
                }
            }]
        });
        let parsed: GenerateContentResponse = serde_json::from_value(raw).unwrap();
        let content = parsed.candidates[0].content.as_ref().unwrap();
        assert_eq!(
            content.parts[0].function_call.as_ref().unwrap().name,
            "get_dataset_summary"
        );
    }

    #[test]
    fn test_response_parsing_missing_candidates() {
        let parsed: GenerateContentResponse = serde_json::from_value(json!({})).unwrap();
        assert!(parsed.candidates.is_empty());
    }
}
