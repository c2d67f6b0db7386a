use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system<T: Into<String>>(content: T) -> Self {
        ChatMessage { role: Role::System, content: content.into() }
    }

    pub fn user<T: Into<String>>(content: T) -> Self {
        ChatMessage { role: Role::User, content: content.into() }
    }

    pub fn assistant<T: Into<String>>(content: T) -> Self {
        ChatMessage { role: Role::Assistant, content: content.into() }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl Usage {
    pub fn add(&mut self, other: Usage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
    }
}

/// The result of one chat call. `responses` is never empty on success: an
/// implementation that has nothing to say must return a single empty string.
#[derive(Debug, Clone, Default)]
pub struct ChatOutcome {
    pub responses: Vec<String>,
    pub usage: Usage,
    pub done_reasons: Vec<String>,
}

impl ChatOutcome {
    /// Convenience for the common single-response case.
    pub fn first_response(&self) -> &str {
        self.responses.first().map(String::as_str).unwrap_or("")
    }
}

/// Capability contract for any chat backend the orchestrator or the
/// search-augmentation decorator talks to.
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<ChatOutcome>;

    /// Whether the backend can be constrained to emit JSON. Selected at
    /// construction time; callers branch on this instead of inspecting
    /// concrete client types.
    fn supports_structured_output(&self) -> bool {
        false
    }

    /// Chat with a JSON output constraint where supported. The default
    /// falls through to plain chat so callers need not branch themselves.
    async fn chat_json(&self, messages: &[ChatMessage]) -> Result<ChatOutcome> {
        self.chat(messages).await
    }
}

/// Fan one chat call per message list out onto the runtime and gather the
/// results. Output order matches input order regardless of completion order.
/// Optional execution strategy; the orchestrator itself is strictly
/// sequential.
#[allow(dead_code)]
pub async fn chat_batched(
    client: Arc<dyn ChatClient>,
    batches: Vec<Vec<ChatMessage>>,
) -> Vec<Result<ChatOutcome>> {
    let handles: Vec<_> = batches
        .into_iter()
        .map(|messages| {
            let client = client.clone();
            tokio::spawn(async move { client.chat(&messages).await })
        })
        .collect();

    let joined = futures_util::future::join_all(handles).await;
    joined
        .into_iter()
        .map(|res| match res {
            Ok(outcome) => outcome,
            Err(e) => Err(anyhow::anyhow!("chat task panicked: {}", e)),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct SlowEcho {
        delay_ms: AtomicUsize,
    }

    #[async_trait]
    impl ChatClient for SlowEcho {
        async fn chat(&self, messages: &[ChatMessage]) -> Result<ChatOutcome> {
            // Later calls sleep less, so completion order reverses input order.
            let delay = self.delay_ms.fetch_sub(20, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(delay as u64)).await;
            Ok(ChatOutcome {
                responses: vec![messages.last().map(|m| m.content.clone()).unwrap_or_default()],
                usage: Usage { prompt_tokens: 1, completion_tokens: 1 },
                done_reasons: vec!["stop".to_string()],
            })
        }
    }

    #[tokio::test]
    async fn batched_results_keep_input_order() {
        let client = Arc::new(SlowEcho { delay_ms: AtomicUsize::new(60) });
        let batches = vec![
            vec![ChatMessage::user("first")],
            vec![ChatMessage::user("second")],
            vec![ChatMessage::user("third")],
        ];
        let results = chat_batched(client, batches).await;
        let texts: Vec<String> = results
            .into_iter()
            .map(|r| r.unwrap().first_response().to_string())
            .collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
    }

    #[test]
    fn usage_accumulates() {
        let mut total = Usage::default();
        total.add(Usage { prompt_tokens: 10, completion_tokens: 5 });
        total.add(Usage { prompt_tokens: 3, completion_tokens: 2 });
        assert_eq!(total, Usage { prompt_tokens: 13, completion_tokens: 7 });
    }
}
