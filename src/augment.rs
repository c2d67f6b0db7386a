use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::client::{ChatClient, ChatMessage, ChatOutcome};
use crate::progress;
use crate::protocol;
use crate::retrieval::{Document, SearchBackend};

pub const RESULTS_CLOSE: &str = "[END OF SEARCH RESULTS]";

/// Decorator that makes web search an invisible side effect of message
/// content: any embedded `{"request":"web_search","data":"..."}` is resolved
/// through the retrieval backend and replaced with rendered results before
/// the message reaches the wrapped client.
pub struct SearchAugmentedClient {
    inner: Arc<dyn ChatClient>,
    backend: Arc<dyn SearchBackend>,
    processed_queries: Mutex<HashSet<String>>,
}

impl SearchAugmentedClient {
    pub fn new(inner: Arc<dyn ChatClient>, backend: Arc<dyn SearchBackend>) -> Self {
        SearchAugmentedClient {
            inner,
            backend,
            processed_queries: Mutex::new(HashSet::new()),
        }
    }

    /// Number of distinct queries this client instance has resolved.
    #[allow(dead_code)]
    pub fn processed_query_count(&self) -> usize {
        self.processed_queries.lock().map(|q| q.len()).unwrap_or(0)
    }

    fn normalize_query(query: &str) -> String {
        query.trim().to_lowercase()
    }

    fn mark_processed(&self, query: &str) -> bool {
        match self.processed_queries.lock() {
            Ok(mut set) => set.insert(Self::normalize_query(query)),
            Err(_) => false,
        }
    }

    async fn rewrite_messages(&self, messages: &[ChatMessage]) -> Vec<ChatMessage> {
        let mut rewritten: Vec<ChatMessage> = Vec::with_capacity(messages.len() + 1);
        let mut searched: Vec<(String, bool)> = Vec::new();

        for message in messages {
            let mut content = message.content.clone();

            // A model may emit the request as a bare object instead of the
            // encoded string; normalize before scanning so the scan only
            // ever sees the canonical form.
            if let Some(normalized) = protocol::normalize_search_object(&content) {
                content = normalized;
            }

            let spans = protocol::find_search_requests(&content);
            if !spans.is_empty() {
                let mut new_content = String::with_capacity(content.len());
                let mut cursor = 0;
                for span in spans {
                    new_content.push_str(&content[cursor..span.start]);
                    if self.mark_processed(&span.query) {
                        progress::log_with(progress::Kind::Search, format!("web search: {}", span.query));
                        let documents = self.backend.search_and_load(&span.query).await;
                        let found = documents.iter().any(|d| !d.metadata.source.is_empty());
                        new_content.push_str(&render_results(&span.query, &documents));
                        searched.push((span.query.clone(), found));
                    } else {
                        progress::log_with(progress::Kind::Search, format!("repeat query skipped: {}", span.query));
                        new_content.push_str(&format!(
                            "[Search results for \"{}\" were already provided above - using cached results]",
                            span.query
                        ));
                    }
                    cursor = span.end;
                }
                new_content.push_str(&content[cursor..]);
                content = new_content;
            }

            rewritten.push(ChatMessage { role: message.role, content });
        }

        if !searched.is_empty() {
            let lines: Vec<String> = searched
                .iter()
                .map(|(query, found)| {
                    format!(
                        "- \"{}\": {}",
                        query,
                        if *found { "results found" } else { "no results found" }
                    )
                })
                .collect();
            rewritten.push(ChatMessage::system(format!(
                "Web searches completed this turn:\n{}\nUse these results to keep working toward an answer; the search itself is not a stopping point.",
                lines.join("\n")
            )));
        }

        rewritten
    }
}

/// Render retrieved documents into the delimited block spliced into the
/// message. The opening and closing markers are part of the wire convention.
fn render_results(query: &str, documents: &[Document]) -> String {
    let mut out = format!("[WEB SEARCH RESULTS for \"{}\"]\n", query);

    let usable: Vec<&Document> = documents.iter().filter(|d| !d.metadata.source.is_empty()).collect();
    if usable.is_empty() {
        let note = documents
            .first()
            .map(|d| d.content.clone())
            .unwrap_or_else(|| format!("No results found for \"{}\".", query));
        out.push_str(&note);
        out.push('\n');
    } else {
        for (i, doc) in usable.iter().enumerate() {
            let tag = if doc.metadata.is_academic { " [academic]" } else { "" };
            out.push_str(&format!(
                "Source {}: {} ({}){}\n{}\n",
                i + 1,
                doc.metadata.source,
                doc.metadata.document_type.as_str(),
                tag,
                doc.display_text()
            ));
            if i + 1 < usable.len() {
                out.push_str("---\n");
            }
        }
    }

    out.push_str(RESULTS_CLOSE);
    out
}

#[async_trait]
impl ChatClient for SearchAugmentedClient {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<ChatOutcome> {
        let rewritten = self.rewrite_messages(messages).await;
        self.inner.chat(&rewritten).await
    }

    fn supports_structured_output(&self) -> bool {
        self.inner.supports_structured_output()
    }

    async fn chat_json(&self, messages: &[ChatMessage]) -> Result<ChatOutcome> {
        let rewritten = self.rewrite_messages(messages).await;
        self.inner.chat_json(&rewritten).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Usage;
    use crate::retrieval::{DocumentMetadata, DocumentType};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubBackend {
        invocations: AtomicUsize,
    }

    impl StubBackend {
        fn new() -> Self {
            StubBackend { invocations: AtomicUsize::new(0) }
        }
    }

    #[async_trait]
    impl SearchBackend for StubBackend {
        async fn search_and_load(&self, query: &str) -> Vec<Document> {
            self.invocations.fetch_add(1, Ordering::SeqCst);
            vec![Document {
                content: format!("Stub content about {}.", query),
                metadata: DocumentMetadata {
                    source: "https://example.com/stub".to_string(),
                    document_type: DocumentType::Html,
                    is_academic: false,
                    score_map: Vec::new(),
                    summary: String::new(),
                    avg_score: 0.5,
                },
            }]
        }
    }

    /// Inner client that records the messages it was handed.
    struct CapturingClient {
        seen: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl CapturingClient {
        fn new() -> Self {
            CapturingClient { seen: Mutex::new(Vec::new()) }
        }

        fn last_messages(&self) -> Vec<ChatMessage> {
            self.seen.lock().unwrap().last().cloned().unwrap_or_default()
        }
    }

    #[async_trait]
    impl ChatClient for CapturingClient {
        async fn chat(&self, messages: &[ChatMessage]) -> Result<ChatOutcome> {
            self.seen.lock().unwrap().push(messages.to_vec());
            Ok(ChatOutcome {
                responses: vec!["ok".to_string()],
                usage: Usage::default(),
                done_reasons: vec!["stop".to_string()],
            })
        }
    }

    fn decorated() -> (Arc<CapturingClient>, Arc<StubBackend>, SearchAugmentedClient) {
        let inner = Arc::new(CapturingClient::new());
        let backend = Arc::new(StubBackend::new());
        let client = SearchAugmentedClient::new(inner.clone(), backend.clone());
        (inner, backend, client)
    }

    #[tokio::test]
    async fn encoded_request_round_trips_to_spliced_results() {
        let (inner, _backend, client) = decorated();
        let encoded = protocol::encode_search_request("capital of France");
        let message = ChatMessage::user(format!("Let me check. {} Thanks.", encoded));

        client.chat(&[message]).await.unwrap();

        let seen = inner.last_messages();
        let content = &seen[0].content;
        assert!(content.contains("[WEB SEARCH RESULTS for \"capital of France\"]"));
        assert!(content.contains(RESULTS_CLOSE));
        assert!(!content.contains(&encoded));
        assert!(content.starts_with("Let me check. "));
        assert!(content.ends_with(" Thanks."));
        // A trailing system message summarizes the searches.
        let last = seen.last().unwrap();
        assert!(matches!(last.role, crate::client::Role::System));
        assert!(last.content.contains("capital of France"));
    }

    #[tokio::test]
    async fn repeated_query_invokes_backend_once() {
        let (inner, backend, client) = decorated();
        let encoded = protocol::encode_search_request("rust borrow checker");

        client.chat(&[ChatMessage::user(encoded.clone())]).await.unwrap();
        client.chat(&[ChatMessage::user(format!("again: {}", encoded))]).await.unwrap();

        assert_eq!(backend.invocations.load(Ordering::SeqCst), 1);
        assert_eq!(client.processed_query_count(), 1);
        let second = inner.last_messages();
        assert!(second[0].content.contains("using cached results"));
        assert!(!second[0].content.contains(&encoded));
    }

    #[tokio::test]
    async fn object_form_is_normalized_before_splicing() {
        let (inner, _backend, client) = decorated();
        let message = ChatMessage::user(r#"  {"request": "web_search", "data": "llama habitats"}  "#);

        client.chat(&[message]).await.unwrap();

        let seen = inner.last_messages();
        assert!(seen[0].content.contains("[WEB SEARCH RESULTS for \"llama habitats\"]"));
        assert!(seen[0].content.contains(RESULTS_CLOSE));
    }

    #[tokio::test]
    async fn plain_messages_pass_through_untouched() {
        let (inner, backend, client) = decorated();
        let message = ChatMessage::user("just a normal message");

        client.chat(&[message]).await.unwrap();

        assert_eq!(backend.invocations.load(Ordering::SeqCst), 0);
        let seen = inner.last_messages();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].content, "just a normal message");
    }

    #[tokio::test]
    async fn multiple_distinct_queries_in_one_message() {
        let (inner, backend, client) = decorated();
        let content = format!(
            "{} and {}",
            protocol::encode_search_request("query one"),
            protocol::encode_search_request("query two"),
        );

        client.chat(&[ChatMessage::user(content)]).await.unwrap();

        assert_eq!(backend.invocations.load(Ordering::SeqCst), 2);
        let seen = inner.last_messages();
        assert!(seen[0].content.contains("[WEB SEARCH RESULTS for \"query one\"]"));
        assert!(seen[0].content.contains("[WEB SEARCH RESULTS for \"query two\"]"));
    }
}
