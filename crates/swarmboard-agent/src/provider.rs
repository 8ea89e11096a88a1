//! The model-provider contract (§6.1): a provider exposes `chat`, consuming
//! an explicit model id, an optional credential override, an ordered
//! message list, and an optional tool schema catalog.

use async_trait::async_trait;
use swarmboard_core::{Message, SwarmResult, ToolCall, ToolSchema};

/// Response from a model call: text content, a request to invoke tools, or
/// a final ("done") text response.
#[derive(Debug, Clone)]
pub enum ProviderResponse {
    Text(String),
    ToolUse {
        content: Option<String>,
        tool_calls: Vec<ToolCall>,
    },
    Done(String),
}

impl ProviderResponse {
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Text(t) | Self::Done(t) => Some(t),
            Self::ToolUse { content, .. } => content.as_deref(),
        }
    }
}

/// Token/latency accounting a provider reports alongside its response.
#[derive(Debug, Clone, Copy, Default)]
pub struct CallStats {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub latency_ms: u64,
}

/// A single LLM backend. Concrete implementations (`backends::claude`,
/// `backends::openai`) speak one provider's wire format; everything above
/// this trait (retry, circuit breaker, routing) is provider-agnostic.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// `model` selects which model id to call (the router may retry across
    /// several per entry); `api_key` overrides the provider's own key when
    /// credential rotation has cycled to a different one.
    async fn chat(
        &self,
        model: &str,
        api_key: Option<&str>,
        system_prompt: Option<&str>,
        messages: &[Message],
        tools: &[ToolSchema],
    ) -> SwarmResult<(ProviderResponse, CallStats)>;
}
