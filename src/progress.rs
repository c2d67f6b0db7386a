use once_cell::sync::Lazy;
use std::collections::VecDeque;
use std::sync::Mutex;

const MAX_LOG_LINES: usize = 50;

#[derive(Debug, Clone, Copy)]
pub enum Kind {
    Info,
    Http,
    Search,
    Worker,
    Supervisor,
    Decision,
}

#[derive(Debug, Clone)]
pub struct Entry {
    pub text: String,
    pub kind: Kind,
}

/// Progress events published by the orchestrator and the retrieval pipeline.
/// Consumers subscribe via an unbounded channel; core logic never blocks or
/// sleeps for display purposes.
#[derive(Debug, Clone)]
pub enum Event {
    ConversationStarted,
    SearchStarted(String),
    SearchCompleted { query: String, documents: usize },
    UrlFetched { url: String, ok: bool },
    TurnCompleted { role: String },
    RoundCompleted(usize),
    FinalAnswer,
}

static VERBOSE_LOG: Lazy<Mutex<VecDeque<Entry>>> = Lazy::new(|| Mutex::new(VecDeque::with_capacity(MAX_LOG_LINES)));

pub fn log<T: Into<String>>(line: T) {
    log_with(Kind::Info, line);
}

pub fn log_with<T: Into<String>>(kind: Kind, line: T) {
    if let Ok(mut buf) = VERBOSE_LOG.lock() {
        let s = line.into();
        if buf.len() >= MAX_LOG_LINES { buf.pop_front(); }
        buf.push_back(Entry { text: s, kind });
    }
}

pub fn recent(n: usize) -> Vec<Entry> {
    if let Ok(buf) = VERBOSE_LOG.lock() {
        let len = buf.len();
        let take = n.min(len);
        buf.iter().skip(len - take).cloned().collect()
    } else {
        Vec::new()
    }
}

#[allow(dead_code)]
pub fn clear() {
    if let Ok(mut buf) = VERBOSE_LOG.lock() {
        buf.clear();
    }
}
