//! The worker's short-term conversation window: message history, system
//! prompt, and budget-aware truncation (§4.8's "truncate to the configured
//! prompt budget").

use swarmboard_core::Message;

pub struct ContextWindow {
    messages: Vec<Message>,
    system_prompt: Option<String>,
    budget_chars: usize,
}

impl ContextWindow {
    pub fn new(budget_chars: usize) -> Self {
        Self {
            messages: Vec::new(),
            system_prompt: None,
            budget_chars,
        }
    }

    pub fn set_system_prompt(&mut self, prompt: impl Into<String>) {
        self.system_prompt = Some(prompt.into());
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
        self.truncate();
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Drops the oldest messages until the window's total character count
    /// (system prompt plus history) fits the configured budget. Always
    /// keeps at least the most recent message.
    fn truncate(&mut self) {
        while self.messages.len() > 1 && self.total_chars() > self.budget_chars {
            self.messages.remove(0);
        }
    }

    fn total_chars(&self) -> usize {
        let sys = self.system_prompt.as_ref().map(String::len).unwrap_or(0);
        let msgs: usize = self.messages.iter().map(|m| m.content.len()).sum();
        sys + msgs
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}
