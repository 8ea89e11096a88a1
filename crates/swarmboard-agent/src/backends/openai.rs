use crate::provider::{CallStats, ModelProvider, ProviderResponse};
use async_trait::async_trait;
use std::time::Instant;
use swarmboard_core::{Message, Role, SwarmError, SwarmResult, ToolCall, ToolSchema};

/// OpenAI-compatible chat completions backend. Works with OpenAI,
/// OpenRouter, Groq, and anything else implementing the same wire format —
/// only the base URL and key differ.
pub struct OpenAiProvider {
    api_key: String,
    base_url: String,
    max_tokens: u32,
    http: reqwest::Client,
}

impl OpenAiProvider {
    pub fn new(api_key: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://api.openai.com".into(),
            max_tokens,
            http: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn build_messages(&self, system_prompt: Option<&str>, messages: &[Message]) -> Vec<serde_json::Value> {
        let mut api_messages = Vec::new();
        if let Some(sys) = system_prompt {
            api_messages.push(serde_json::json!({"role": "system", "content": sys}));
        }
        for m in messages {
            if m.role == Role::System {
                continue;
            }
            api_messages.push(serde_json::json!({
                "role": match m.role {
                    Role::User | Role::Tool => "user",
                    Role::Assistant => "assistant",
                    Role::System => unreachable!(),
                },
                "content": m.content,
            }));
        }
        api_messages
    }

    fn build_tools(&self, tools: &[ToolSchema]) -> Vec<serde_json::Value> {
        tools
            .iter()
            .map(|t| {
                serde_json::json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                    }
                })
            })
            .collect()
    }
}

#[async_trait]
impl ModelProvider for OpenAiProvider {
    async fn chat(
        &self,
        model: &str,
        api_key: Option<&str>,
        system_prompt: Option<&str>,
        messages: &[Message],
        tools: &[ToolSchema],
    ) -> SwarmResult<(ProviderResponse, CallStats)> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let mut body = serde_json::json!({
            "model": model,
            "max_tokens": self.max_tokens,
            "messages": self.build_messages(system_prompt, messages),
        });
        if !tools.is_empty() {
            body["tools"] = serde_json::json!(self.build_tools(tools));
        }

        let started = Instant::now();
        let resp = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key.unwrap_or(&self.api_key)))
            .header("Content-Type", "application/json")
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
            return Err(SwarmError::Provider(format!("openai api error {status}: {resp_body}")));
        }

        let stats = CallStats {
            prompt_tokens: resp_body["usage"]["prompt_tokens"].as_u64().unwrap_or(0),
            completion_tokens: resp_body["usage"]["completion_tokens"].as_u64().unwrap_or(0),
            latency_ms: started.elapsed().as_millis() as u64,
        };
        Ok((parse_openai_response(&resp_body)?, stats))
    }
}

fn parse_openai_response(body: &serde_json::Value) -> SwarmResult<ProviderResponse> {
    let choice = &body["choices"][0];
    let message = &choice["message"];
    let content = message["content"].as_str().unwrap_or_default().to_string();

    if let Some(tool_calls_json) = message["tool_calls"].as_array() {
        let tool_calls: Vec<ToolCall> = tool_calls_json
            .iter()
            .filter_map(|tc| {
                Some(ToolCall {
                    id: tc["id"].as_str()?.to_string(),
                    name: tc["function"]["name"].as_str()?.to_string(),
                    arguments: serde_json::from_str(tc["function"]["arguments"].as_str()?).unwrap_or_default(),
                })
            })
            .collect();
        Ok(ProviderResponse::ToolUse {
            content: (!content.is_empty()).then_some(content),
            tool_calls,
        })
    } else {
        let finish_reason = choice["finish_reason"].as_str().unwrap_or("stop");
        if finish_reason == "stop" {
            Ok(ProviderResponse::Done(content))
        } else {
            Ok(ProviderResponse::Text(content))
        }
    }
}
