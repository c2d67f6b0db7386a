use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DECISION_ASK_FOLLOWUP: &str = "ask_followup_question";
pub const DECISION_END_CONVERSATION: &str = "end_conversation";
pub const DECISION_FINAL_ANSWER: &str = "provide_final_answer";
pub const DECISION_REQUEST_INFO: &str = "request_additional_info";

/// Structured decision extracted from supervisor output. `decision` stays a
/// plain string because the regex fallback tier can surface values outside
/// the four known ones; callers compare against the constants above.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub decision: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
}

impl Decision {
    pub fn is_terminal(&self) -> bool {
        self.decision == DECISION_END_CONVERSATION || self.decision == DECISION_FINAL_ANSWER
    }
}

/// Best-effort extraction of a decision object from free-form model output.
/// Total: never panics and never fails, for any input string. The ladder is
/// candidate selection, cleanup, direct parse, aggressive repair, and finally
/// per-field regex extraction with diagnostic defaults.
pub fn extract_decision(text: &str) -> Decision {
    if let Some(candidate) = select_candidate(text) {
        let cleaned = clean_candidate(&candidate);
        if let Some(decision) = parse_decision(&cleaned) {
            return decision;
        }
        let repaired = aggressive_repair(&cleaned);
        if let Some(decision) = parse_decision(&repaired) {
            return decision;
        }
    }
    regex_fallback(text)
}

/// Find the end index (inclusive) of the JSON object opening at `open`,
/// honoring string literals and escapes. Returns None when unbalanced.
pub(crate) fn balanced_object_end(text: &str, open: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    debug_assert_eq!(bytes.get(open), Some(&b'{'));

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape = false;

    for (i, &b) in bytes.iter().enumerate().skip(open) {
        if escape {
            escape = false;
            continue;
        }
        match b {
            b'\\' if in_string => escape = true,
            b'"' => in_string = !in_string,
            b'{' if !in_string => depth += 1,
            b'}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// All top-level `{...}` spans in the text, as (start, end-inclusive) pairs.
pub(crate) fn find_object_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut from = 0;
    while let Some(rel) = text[from..].find('{') {
        let open = from + rel;
        match balanced_object_end(text, open) {
            Some(end) => {
                spans.push((open, end));
                from = end + 1;
            }
            None => break,
        }
    }
    spans
}

/// Contents of ``` fenced blocks, language tags stripped.
fn fenced_blocks(text: &str) -> Vec<&str> {
    let mut blocks = Vec::new();
    let mut rest = text;
    while let Some(open) = rest.find("```") {
        let after = &rest[open + 3..];
        let Some(close) = after.find("```") else { break };
        let mut block = &after[..close];
        // Skip a language tag like "json" on the opening line.
        if let Some(newline) = block.find('\n') {
            let first_line = block[..newline].trim();
            if !first_line.is_empty() && first_line.chars().all(|c| c.is_ascii_alphanumeric()) {
                block = &block[newline + 1..];
            }
        }
        blocks.push(block);
        rest = &after[close + 3..];
    }
    blocks
}

/// Pick the JSON candidate: the first object inside the last brace-bearing
/// fenced block, else the largest standalone balanced object, else everything
/// from the first `{` (left for the repair tier to close).
fn select_candidate(text: &str) -> Option<String> {
    for block in fenced_blocks(text).into_iter().rev() {
        if let Some(open) = block.find('{') {
            return Some(match balanced_object_end(block, open) {
                Some(end) => block[open..=end].to_string(),
                None => block[open..].to_string(),
            });
        }
    }

    let spans = find_object_spans(text);
    if let Some((start, end)) = spans.iter().copied().max_by_key(|&(s, e)| e - s) {
        return Some(text[start..=end].to_string());
    }

    text.find('{').map(|open| text[open..].to_string())
}

static TRAILING_COMMA_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r",\s*([}\]])").unwrap());

/// Normalize smart quotes, escape raw control characters inside string
/// literals, and strip trailing commas.
fn clean_candidate(candidate: &str) -> String {
    let requoted: String = candidate
        .chars()
        .map(|c| match c {
            '\u{201C}' | '\u{201D}' | '\u{201E}' => '"',
            '\u{2018}' | '\u{2019}' => '\'',
            _ => c,
        })
        .collect();

    let mut out = String::with_capacity(requoted.len());
    let mut in_string = false;
    let mut escape = false;
    for c in requoted.chars() {
        if escape {
            out.push(c);
            escape = false;
            continue;
        }
        match c {
            '\\' if in_string => {
                out.push(c);
                escape = true;
            }
            '"' => {
                out.push(c);
                in_string = !in_string;
            }
            '\n' if in_string => out.push_str("\\n"),
            '\r' if in_string => out.push_str("\\r"),
            '\t' if in_string => out.push_str("\\t"),
            _ => out.push(c),
        }
    }

    TRAILING_COMMA_RE.replace_all(&out, "$1").into_owned()
}

/// Character-scanner repair for candidates the direct parse rejected: escape
/// stray control characters inside strings, close an unterminated string,
/// close unbalanced outer braces.
fn aggressive_repair(candidate: &str) -> String {
    let mut out = String::with_capacity(candidate.len() + 4);
    let mut in_string = false;
    let mut escape = false;
    let mut depth: i32 = 0;

    for c in candidate.chars() {
        if escape {
            out.push(c);
            escape = false;
            continue;
        }
        match c {
            '\\' if in_string => {
                out.push(c);
                escape = true;
            }
            '"' => {
                out.push(c);
                in_string = !in_string;
            }
            c if in_string && (c as u32) < 0x20 => match c {
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                other => out.push_str(&format!("\\u{:04x}", other as u32)),
            },
            '{' if !in_string => {
                out.push(c);
                depth += 1;
            }
            '}' if !in_string => {
                out.push(c);
                depth -= 1;
            }
            _ => out.push(c),
        }
    }

    if in_string {
        out.push('"');
    }
    while depth > 0 {
        out.push('}');
        depth -= 1;
    }
    out
}

fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn parse_decision(candidate: &str) -> Option<Decision> {
    let value: Value = serde_json::from_str(candidate).ok()?;
    let object = value.as_object()?;
    let decision = object.get("decision")?.as_str()?.to_string();
    Some(Decision {
        decision,
        message: object.get("message").and_then(value_to_text),
        answer: object.get("answer").and_then(value_to_text),
    })
}

static DECISION_FIELD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""decision"\s*:\s*"([^"]+)""#).unwrap());
static MESSAGE_FIELD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""message"\s*:\s*"((?:[^"\\]|\\.)*)""#).unwrap());
static ANSWER_FIELD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""answer"\s*:\s*"((?:[^"\\]|\\.)*)""#).unwrap());

fn unescape_json_string(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some('/') => out.push('/'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Last tier: pull the three known fields out of the raw text independently.
/// Whatever is missing gets a diagnostic stand-in so the caller always has a
/// usable object.
fn regex_fallback(text: &str) -> Decision {
    let decision = DECISION_FIELD_RE
        .captures(text)
        .map(|c| c[1].to_string())
        .unwrap_or_else(|| DECISION_FINAL_ANSWER.to_string());

    let message = MESSAGE_FIELD_RE.captures(text).map(|c| unescape_json_string(&c[1]));
    let answer = ANSWER_FIELD_RE.captures(text).map(|c| unescape_json_string(&c[1]));

    let diagnostic = || Some(format!("Failed to parse response: {}", text.trim()));
    Decision {
        decision,
        message: message.or_else(diagnostic),
        answer: answer.or_else(diagnostic),
    }
}
