use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;

use triage_core::{
    ChatMessage, FinishReason, LLMConfig, LLMError, LLMProvider, LLMResponse, Role, TokenUsage,
};

/// Scripted LLM provider for tests and offline runs.
#[derive(Clone)]
pub struct MockLLMProvider {
    name: Arc<str>,
    inner: Arc<RwLock<MockLLMProviderInner>>,
}

struct MockLLMProviderInner {
    responses: Vec<String>,
    response_index: usize,
    cycle_responses: bool,
    call_history: Vec<MockCall>,
    should_error: bool,
    error_message: String,
    latency_ms: u64,
}

#[derive(Debug, Clone)]
pub struct MockCall {
    pub messages: Vec<ChatMessage>,
    pub config: Option<LLMConfig>,
    pub timestamp: std::time::Instant,
}

impl MockCall {
    /// Content of the last user message in the call, if any.
    pub fn prompt(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }
}

impl MockLLMProvider {
    pub fn new(name: impl Into<String>) -> Self {
        let name: String = name.into();
        Self {
            name: Arc::from(name),
            inner: Arc::new(RwLock::new(MockLLMProviderInner {
                responses: Vec::new(),
                response_index: 0,
                cycle_responses: false,
                call_history: Vec::new(),
                should_error: false,
                error_message: "Mock error".to_string(),
                latency_ms: 0,
            })),
        }
    }

    pub fn set_response(&self, response: impl Into<String>) {
        self.set_responses(vec![response.into()], false);
    }

    /// Responses are returned in order; the last one repeats unless `cycle` is set.
    pub fn set_responses(&self, responses: Vec<String>, cycle: bool) {
        let mut inner = self.inner.write();
        inner.responses = responses;
        inner.response_index = 0;
        inner.cycle_responses = cycle;
    }

    pub fn set_error(&self, error_message: impl Into<String>) {
        let mut inner = self.inner.write();
        inner.should_error = true;
        inner.error_message = error_message.into();
    }

    pub fn clear_error(&self) {
        self.inner.write().should_error = false;
    }

    pub fn set_latency(&self, latency_ms: u64) {
        self.inner.write().latency_ms = latency_ms;
    }

    pub fn call_count(&self) -> usize {
        self.inner.read().call_history.len()
    }

    pub fn call_history(&self) -> Vec<MockCall> {
        self.inner.read().call_history.clone()
    }

    pub fn last_call(&self) -> Option<MockCall> {
        self.inner.read().call_history.last().cloned()
    }

    fn next_response(&self) -> String {
        let mut inner = self.inner.write();
        if inner.responses.is_empty() {
            return "Mock response".to_string();
        }

        let content = inner.responses[inner.response_index].clone();
        if inner.cycle_responses {
            inner.response_index = (inner.response_index + 1) % inner.responses.len();
        } else if inner.response_index < inner.responses.len() - 1 {
            inner.response_index += 1;
        }
        content
    }

    fn record_call(&self, messages: &[ChatMessage], config: Option<&LLMConfig>) {
        self.inner.write().call_history.push(MockCall {
            messages: messages.to_vec(),
            config: config.cloned(),
            timestamp: std::time::Instant::now(),
        });
    }

    fn estimate_tokens(messages: &[ChatMessage]) -> u32 {
        let total_chars: usize = messages.iter().map(|m| m.content.len()).sum();
        (total_chars / 4) as u32
    }
}

impl Default for MockLLMProvider {
    fn default() -> Self {
        Self::new("mock")
    }
}

#[async_trait]
impl LLMProvider for MockLLMProvider {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        config: Option<&LLMConfig>,
    ) -> Result<LLMResponse, LLMError> {
        self.record_call(messages, config);

        let latency_ms = self.inner.read().latency_ms;
        if latency_ms > 0 {
            tokio::time::sleep(tokio::time::Duration::from_millis(latency_ms)).await;
        }

        {
            let inner = self.inner.read();
            if inner.should_error {
                return Err(LLMError::Other(inner.error_message.clone()));
            }
        }

        let content = self.next_response();
        let usage = TokenUsage::new(
            Self::estimate_tokens(messages),
            (content.len() / 4) as u32,
        );
        let mut response = LLMResponse::new(content, FinishReason::Stop).with_usage(usage);
        response.model = Some("mock-model".to_string());
        Ok(response)
    }

    fn provider_name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for MockLLMProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("MockLLMProvider")
            .field("name", &self.name)
            .field("responses", &inner.responses.len())
            .field("calls", &inner.call_history.len())
            .finish()
    }
}
