use anyhow::Result;
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest;
use serde::{Deserialize, Serialize};
use std::env;

use crate::client::{ChatClient, ChatMessage, ChatOutcome, Usage};

macro_rules! debug_println {
    ($($arg:tt)*) => {
        if std::env::var("TANDEM_DEBUG").is_ok() {
            println!($($arg)*);
        }
    };
}

#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct OllamaChatChunk {
    message: ChunkMessage,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    done_reason: Option<String>,
    #[serde(default)]
    prompt_eval_count: Option<u64>,
    #[serde(default)]
    eval_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ChunkMessage {
    #[allow(dead_code)]
    role: String,
    content: String,
}

pub struct OllamaClient {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaClient {
    #[allow(dead_code)]
    pub fn new() -> Self {
        let base_url = env::var("OLLAMA_HOST").unwrap_or_else(|_| "http://localhost:11434".to_string());
        let model = env::var("OLLAMA_MODEL").unwrap_or_else(|_| "llama3.2".to_string());
        Self::with_config(base_url, model)
    }

    pub fn with_config(base_url: String, model: String) -> Self {
        OllamaClient {
            base_url,
            model,
            client: reqwest::Client::new(),
        }
    }

    #[allow(dead_code)]
    pub fn get_model(&self) -> &str {
        &self.model
    }

    /// Streamed chat call. Ollama emits one JSON object per line; content is
    /// accumulated across chunks and the final chunk carries token counts and
    /// the done reason.
    pub async fn chat_streaming<F>(&self, messages: &[ChatMessage], format: Option<&str>, mut callback: F) -> Result<ChatOutcome>
    where
        F: FnMut(&str) + Send,
    {
        let request = OllamaChatRequest {
            model: &self.model,
            messages,
            stream: true,
            format,
        };

        let response = self.client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!("Ollama API error: {}", response.status()));
        }

        let mut response_text = String::new();
        let mut usage = Usage::default();
        let mut done_reasons = Vec::new();
        let mut partial_line = String::new();

        let mut stream = response.bytes_stream();
        while let Some(item) = stream.next().await {
            let chunk = item?;
            partial_line.push_str(&String::from_utf8_lossy(&chunk));

            // Chunks can split mid-line; only consume complete lines and keep
            // the remainder for the next read.
            while let Some(pos) = partial_line.find('\n') {
                let line: String = partial_line.drain(..=pos).collect();
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                if let Ok(parsed) = serde_json::from_str::<OllamaChatChunk>(line) {
                    response_text.push_str(&parsed.message.content);
                    callback(&parsed.message.content);

                    if parsed.done {
                        usage.prompt_tokens = parsed.prompt_eval_count.unwrap_or(0);
                        usage.completion_tokens = parsed.eval_count.unwrap_or(0);
                        if let Some(reason) = parsed.done_reason {
                            done_reasons.push(reason);
                        }
                    }
                } else {
                    debug_println!("[Ollama] Skipping unparseable chunk: {}", line);
                }
            }

            tokio::task::yield_now().await;
        }

        // Trailing data without a newline terminator.
        let tail = partial_line.trim();
        if !tail.is_empty() {
            if let Ok(parsed) = serde_json::from_str::<OllamaChatChunk>(tail) {
                response_text.push_str(&parsed.message.content);
                callback(&parsed.message.content);
                if parsed.done {
                    usage.prompt_tokens = parsed.prompt_eval_count.unwrap_or(0);
                    usage.completion_tokens = parsed.eval_count.unwrap_or(0);
                    if let Some(reason) = parsed.done_reason {
                        done_reasons.push(reason);
                    }
                }
            }
        }

        if done_reasons.is_empty() {
            done_reasons.push("stop".to_string());
        }

        Ok(ChatOutcome {
            responses: vec![response_text],
            usage,
            done_reasons,
        })
    }
}

#[async_trait]
impl ChatClient for OllamaClient {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<ChatOutcome> {
        self.chat_streaming(messages, None, |_| {}).await
    }

    fn supports_structured_output(&self) -> bool {
        true
    }

    async fn chat_json(&self, messages: &[ChatMessage]) -> Result<ChatOutcome> {
        self.chat_streaming(messages, Some("json"), |_| {}).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_parsing_handles_final_counts() {
        let line = r#"{"model":"m","created_at":"t","message":{"role":"assistant","content":"hi"},"done":true,"done_reason":"stop","prompt_eval_count":12,"eval_count":7}"#;
        let parsed: OllamaChatChunk = serde_json::from_str(line).unwrap();
        assert!(parsed.done);
        assert_eq!(parsed.prompt_eval_count, Some(12));
        assert_eq!(parsed.eval_count, Some(7));
        assert_eq!(parsed.message.content, "hi");
    }

    #[test]
    fn chunk_parsing_tolerates_missing_counts() {
        let line = r#"{"message":{"role":"assistant","content":"partial"},"done":false}"#;
        let parsed: OllamaChatChunk = serde_json::from_str(line).unwrap();
        assert!(!parsed.done);
        assert_eq!(parsed.prompt_eval_count, None);
    }
}
