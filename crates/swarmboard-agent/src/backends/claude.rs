use crate::provider::{CallStats, ModelProvider, ProviderResponse};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Instant;
use swarmboard_core::{Message, Role, SwarmError, SwarmResult, ToolCall, ToolSchema};

/// Claude (Anthropic Messages API) backend.
pub struct ClaudeProvider {
    api_key: String,
    base_url: String,
    max_tokens: u32,
    http: reqwest::Client,
}

impl ClaudeProvider {
    pub fn new(api_key: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://api.anthropic.com".into(),
            max_tokens,
            http: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl ModelProvider for ClaudeProvider {
    async fn chat(
        &self,
        model: &str,
        api_key: Option<&str>,
        system_prompt: Option<&str>,
        messages: &[Message],
        tools: &[ToolSchema],
    ) -> SwarmResult<(ProviderResponse, CallStats)> {
        let url = format!("{}/v1/messages", self.base_url);

        let api_messages: Vec<ClaudeMessage> = messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| ClaudeMessage {
                role: match m.role {
                    Role::User | Role::Tool => "user".to_string(),
                    Role::Assistant => "assistant".to_string(),
                    Role::System => unreachable!(),
                },
                content: m.content.clone(),
            })
            .collect();

        let claude_tools: Vec<ClaudeTool> = tools
            .iter()
            .map(|t| ClaudeTool {
                name: t.name.clone(),
                description: t.description.clone(),
                input_schema: t.parameters.clone(),
            })
            .collect();

        let mut body = serde_json::json!({
            "model": model,
            "max_tokens": self.max_tokens,
            "messages": api_messages,
        });
        if let Some(sys) = system_prompt {
            body["system"] = serde_json::json!(sys);
        }
        if !claude_tools.is_empty() {
            body["tools"] = serde_json::to_value(&claude_tools).map_err(SwarmError::from)?;
        }

        let started = Instant::now();
        let resp = self
            .http
            .post(&url)
            .header("x-api-key", api_key.unwrap_or(&self.api_key))
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| SwarmError::Http(e.to_string()))?;

        let status = resp.status();
        let resp_body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| SwarmError::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(SwarmError::Provider(format!("claude api error {status}: {resp_body}")));
        }

        let stats = CallStats {
            prompt_tokens: resp_body["usage"]["input_tokens"].as_u64().unwrap_or(0),
            completion_tokens: resp_body["usage"]["output_tokens"].as_u64().unwrap_or(0),
            latency_ms: started.elapsed().as_millis() as u64,
        };
        Ok((parse_claude_response(&resp_body)?, stats))
    }
}

#[derive(Serialize)]
struct ClaudeMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ClaudeTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

fn parse_claude_response(body: &serde_json::Value) -> SwarmResult<ProviderResponse> {
    let content = body["content"]
        .as_array()
        .ok_or_else(|| SwarmError::Provider("missing content in claude response".into()))?;

    let mut text_parts = Vec::new();
    let mut tool_calls = Vec::new();

    for block in content {
        match block["type"].as_str() {
            Some("text") => {
                if let Some(t) = block["text"].as_str() {
                    text_parts.push(t.to_string());
                }
            }
            Some("tool_use") => {
                tool_calls.push(ToolCall {
                    id: block["id"].as_str().unwrap_or_default().to_string(),
                    name: block["name"].as_str().unwrap_or_default().to_string(),
                    arguments: block["input"].clone(),
                });
            }
            _ => {}
        }
    }

    if !tool_calls.is_empty() {
        Ok(ProviderResponse::ToolUse {
            content: (!text_parts.is_empty()).then(|| text_parts.join("\n")),
            tool_calls,
        })
    } else {
        let stop_reason = body["stop_reason"].as_str().unwrap_or("end_turn");
        let text = text_parts.join("\n");
        if stop_reason == "end_turn" {
            Ok(ProviderResponse::Done(text))
        } else {
            Ok(ProviderResponse::Text(text))
        }
    }
}
