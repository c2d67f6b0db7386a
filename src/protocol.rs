use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::extract::{balanced_object_end, find_object_spans};

/// Worker messages address the supervisor; supervisor messages address the
/// worker. Downstream consumers pattern-match on these exact literals, so
/// they must never change.
pub const WORKER_PREFIX: &str = "@Supervisor: ";
pub const SUPERVISOR_PREFIX: &str = "@Worker: ";

/// Literal a worker uses to decline the follow-up slot.
pub const NO_QUESTIONS: &str = "No questions at this time.";

const SEARCH_REQUEST_KEY: &str = "web_search";

/// Wire form of an embedded search request. Field order matters: serializing
/// this struct must reproduce `{"request":"web_search","data":"..."}` exactly.
#[derive(Debug, Serialize, Deserialize)]
struct SearchRequestWire {
    request: String,
    data: String,
}

/// What a piece of model output means, decided in exactly one place.
#[derive(Debug, Clone, PartialEq)]
pub enum Utterance {
    Plain(String),
    SearchRequest(String),
    StatusComplete(String),
}

/// Classify a full model response. A completion signal wins over everything;
/// a response that is nothing but one encoded search request becomes
/// `SearchRequest`; anything else stays plain (embedded requests are handled
/// span-wise via [`find_search_requests`]).
pub fn decode(text: &str) -> Utterance {
    if let Some(answer) = parse_status_complete(text) {
        return Utterance::StatusComplete(answer);
    }
    let spans = find_search_requests(text);
    if let [only] = spans.as_slice() {
        if text.trim() == &text[only.start..only.end] {
            return Utterance::SearchRequest(only.query.clone());
        }
    }
    Utterance::Plain(text.to_string())
}

/// Produce the exact encoded search-request substring the prompt templates
/// teach the models to emit.
pub fn encode_search_request(query: &str) -> String {
    serde_json::to_string(&SearchRequestWire {
        request: SEARCH_REQUEST_KEY.to_string(),
        data: query.to_string(),
    })
    .unwrap_or_else(|_| format!("{{\"request\":\"web_search\",\"data\":\"{}\"}}", query))
}

/// One occurrence of the encoded request inside a larger string. `start..end`
/// is the byte span of the full `{...}` object.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequestSpan {
    pub start: usize,
    pub end: usize,
    pub query: String,
}

/// Scan free text for every embedded `{"request":"web_search","data":"..."}`
/// occurrence. Tolerates whitespace variations inside the object by parsing
/// each balanced candidate span rather than matching the literal bytes.
pub fn find_search_requests(text: &str) -> Vec<SearchRequestSpan> {
    let mut spans = Vec::new();
    let mut from = 0;
    while let Some(rel) = text[from..].find(r#""request""#) {
        let key_pos = from + rel;
        // Walk back to the opening brace of the containing object.
        let Some(open) = text[..key_pos].rfind('{') else {
            from = key_pos + 1;
            continue;
        };
        let Some(end) = balanced_object_end(text, open) else {
            from = key_pos + 1;
            continue;
        };
        let candidate = &text[open..=end];
        if let Ok(wire) = serde_json::from_str::<SearchRequestWire>(candidate) {
            if wire.request == SEARCH_REQUEST_KEY {
                spans.push(SearchRequestSpan {
                    start: open,
                    end: end + 1,
                    query: wire.data,
                });
                from = end + 1;
                continue;
            }
        }
        from = key_pos + 1;
    }
    spans
}

/// Normalize a message whose entire content is the object form of a search
/// request (a model emitting the structure directly instead of the encoded
/// string) back to the canonical encoded string.
pub fn normalize_search_object(content: &str) -> Option<String> {
    let value: Value = serde_json::from_str(content.trim()).ok()?;
    let object = value.as_object()?;
    if object.get("request")?.as_str()? != SEARCH_REQUEST_KEY {
        return None;
    }
    let query = object.get("data")?.as_str()?;
    Some(encode_search_request(query))
}

/// Detect an embedded `{"status":"complete","answer":...}` completion signal
/// anywhere in the text and return the answer.
pub fn parse_status_complete(text: &str) -> Option<String> {
    for (start, end) in find_object_spans(text) {
        let Ok(value) = serde_json::from_str::<Value>(&text[start..=end]) else {
            continue;
        };
        if value.get("status").and_then(Value::as_str) == Some("complete") {
            let answer = match value.get("answer") {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            };
            return Some(answer);
        }
    }
    None
}

/// Prefix `text` with `prefix` unless it is already there.
pub fn ensure_prefix(text: &str, prefix: &str) -> String {
    if text.trim_start().starts_with(prefix.trim_end()) {
        text.to_string()
    } else {
        format!("{}{}", prefix, text)
    }
}

const OPINION_PHRASES: &[&str] = &[
    "I think",
    "In my opinion",
    "I believe",
    "I would argue",
    "From my perspective",
];

/// Wrap first-person opinion phrases in marker glyphs for display emphasis.
/// Purely cosmetic; the role prefixes are the load-bearing convention.
pub fn emphasize_opinions(text: &str) -> String {
    let mut out = text.to_string();
    for phrase in OPINION_PHRASES {
        let marked = format!("«{}»", phrase);
        if out.contains(phrase) && !out.contains(&marked) {
            out = out.replace(phrase, &marked);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoding_is_bit_exact() {
        assert_eq!(
            encode_search_request("capital of France"),
            r#"{"request":"web_search","data":"capital of France"}"#
        );
    }

    #[test]
    fn encoding_escapes_quotes() {
        let encoded = encode_search_request(r#"what is "rust"?"#);
        assert_eq!(encoded, r#"{"request":"web_search","data":"what is \"rust\"?"}"#);
        let spans = find_search_requests(&encoded);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].query, r#"what is "rust"?"#);
    }

    #[test]
    fn finds_embedded_requests() {
        let text = format!(
            "Let me look that up. {} And also {} Thanks.",
            encode_search_request("first query"),
            encode_search_request("second query"),
        );
        let spans = find_search_requests(&text);
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].query, "first query");
        assert_eq!(spans[1].query, "second query");
        assert_eq!(&text[spans[0].start..spans[0].end], encode_search_request("first query"));
    }

    #[test]
    fn ignores_unrelated_request_objects() {
        let text = r#"{"request":"something_else","data":"x"}"#;
        assert!(find_search_requests(text).is_empty());
    }

    #[test]
    fn normalizes_object_form() {
        let content = r#"  {"request": "web_search", "data": "llamas"}  "#;
        assert_eq!(
            normalize_search_object(content),
            Some(r#"{"request":"web_search","data":"llamas"}"#.to_string())
        );
        assert_eq!(normalize_search_object("plain text"), None);
    }

    #[test]
    fn detects_completion_signal() {
        let text = r#"Here you go: {"status":"complete","answer":"4"}"#;
        assert_eq!(parse_status_complete(text), Some("4".to_string()));
        assert_eq!(parse_status_complete("no signal here"), None);
    }

    #[test]
    fn decode_tags_utterances() {
        assert_eq!(
            decode(r#"{"status":"complete","answer":"4"}"#),
            Utterance::StatusComplete("4".to_string())
        );
        assert_eq!(
            decode(r#"{"request":"web_search","data":"q"}"#),
            Utterance::SearchRequest("q".to_string())
        );
        assert!(matches!(decode("hello there"), Utterance::Plain(_)));
    }

    #[test]
    fn prefix_is_idempotent() {
        let once = ensure_prefix("hello", WORKER_PREFIX);
        assert_eq!(once, "@Supervisor: hello");
        assert_eq!(ensure_prefix(&once, WORKER_PREFIX), once);
    }

    #[test]
    fn emphasis_wraps_opinion_phrases() {
        let out = emphasize_opinions("I think this is right.");
        assert_eq!(out, "«I think» this is right.");
        // Applying twice must not double-wrap.
        assert_eq!(emphasize_opinions(&out), out);
    }
}
