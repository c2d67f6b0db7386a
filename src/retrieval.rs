use anyhow::Result;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::progress::{self, Event};
use crate::relevance;
use crate::search::{host_from_url, SearchProvider};

const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const FETCH_TIMEOUT_SECS: u64 = 30;

/// Documents with less extracted text than this are discarded.
const MIN_CONTENT_CHARS: usize = 50;

/// Below this many paragraphs, relevance filtering is unreliable and the
/// document is kept whole.
const MIN_PARAGRAPHS_FOR_FILTERING: usize = 5;

/// Short primary extraction triggers the secondary DOCX pass.
const SHORT_EXTRACTION_CHARS: usize = 100;

const SUMMARY_SENTENCES: usize = 5;
const SUMMARY_MIN_WORDS: usize = 100;

const ACADEMIC_RANK_BOOST: f32 = 1.2;

/// Queries already carrying one of these are not academically expanded.
const ACADEMIC_MARKERS: &[&str] = &[
    "pdf", "research", "journal", "thesis", "dissertation", "paper", "academia", "article",
];

const ACADEMIC_DOMAINS: &[&str] = &[
    "arxiv.org", "ieee.org", "acm.org", "springer.com", "sciencedirect.com",
    "jstor.org", "nature.com", "researchgate.net", "semanticscholar.org",
    "ssrn.com", "nih.gov", "plos.org",
];

const ACADEMIC_PATH_KEYWORDS: &[&str] = &[
    "journal", "thesis", "dissertation", "proceedings", "research", "paper",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentType {
    Html,
    Pdf,
    Docx,
    Doc,
    Txt,
    Rtf,
    Presentation,
    Spreadsheet,
    Unknown,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Html => "html",
            DocumentType::Pdf => "pdf",
            DocumentType::Docx => "docx",
            DocumentType::Doc => "doc",
            DocumentType::Txt => "txt",
            DocumentType::Rtf => "rtf",
            DocumentType::Presentation => "presentation",
            DocumentType::Spreadsheet => "spreadsheet",
            DocumentType::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone)]
pub struct DocumentMetadata {
    pub source: String,
    pub document_type: DocumentType,
    pub is_academic: bool,
    /// Every paragraph with its relevance score, descending.
    pub score_map: Vec<(String, f32)>,
    /// Extractive summary; empty when the content was short enough to keep.
    pub summary: String,
    pub avg_score: f32,
}

#[derive(Debug, Clone)]
pub struct Document {
    pub content: String,
    pub metadata: DocumentMetadata,
}

impl Document {
    /// Ranking key: mean paragraph score with a flat boost for academic
    /// sources.
    pub fn ranking_score(&self) -> f32 {
        let boost = if self.metadata.is_academic { ACADEMIC_RANK_BOOST } else { 1.0 };
        self.metadata.avg_score * boost
    }

    /// Text to show downstream: the summary when one was produced, the
    /// filtered content otherwise.
    pub fn display_text(&self) -> &str {
        if self.metadata.summary.is_empty() {
            &self.content
        } else {
            &self.metadata.summary
        }
    }

    fn placeholder(message: &str) -> Document {
        Document {
            content: message.to_string(),
            metadata: DocumentMetadata {
                source: String::new(),
                document_type: DocumentType::Unknown,
                is_academic: false,
                score_map: Vec::new(),
                summary: String::new(),
                avg_score: 0.0,
            },
        }
    }
}

/// Process-wide cache of completed retrievals, keyed by normalized query.
/// Grows for the lifetime of the process; shared via `Arc` between the
/// pipeline and anything else that wants visibility into past searches.
#[derive(Default)]
pub struct SearchCache {
    entries: Mutex<HashMap<String, Vec<Document>>>,
}

impl SearchCache {
    pub fn new() -> Self {
        SearchCache::default()
    }

    fn normalize(query: &str) -> String {
        query.trim().to_lowercase()
    }

    pub fn get(&self, query: &str) -> Option<Vec<Document>> {
        let entries = self.entries.lock().ok()?;
        entries.get(&Self::normalize(query)).cloned()
    }

    pub fn put(&self, query: &str, documents: Vec<Document>) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(Self::normalize(query), documents);
        }
    }

    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The retrieval side of the search seam. The decorator talks to this trait
/// so tests can stub the whole pipeline.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search_and_load(&self, query: &str) -> Vec<Document>;
}

pub struct RetrievalPipeline {
    provider: Box<dyn SearchProvider>,
    http: reqwest::Client,
    cache: Arc<SearchCache>,
    max_results: usize,
    progress_tx: Option<mpsc::UnboundedSender<Event>>,
}

impl RetrievalPipeline {
    pub fn new(provider: Box<dyn SearchProvider>, cache: Arc<SearchCache>, max_results: usize) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .danger_accept_invalid_certs(true)
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        RetrievalPipeline {
            provider,
            http,
            cache,
            max_results,
            progress_tx: None,
        }
    }

    pub fn set_progress_channel(&mut self, tx: mpsc::UnboundedSender<Event>) {
        self.progress_tx = Some(tx);
    }

    fn send_progress(&self, event: Event) {
        if let Some(tx) = &self.progress_tx {
            let _ = tx.send(event);
        }
    }

    /// Search the web for `query` and return extracted, ranked documents.
    /// Never fails: total failure yields a single placeholder document.
    pub async fn search_and_load(&self, query: &str) -> Vec<Document> {
        if let Some(cached) = self.cache.get(query) {
            progress::log_with(progress::Kind::Search, format!("cache hit: {}", query));
            return cached;
        }

        self.send_progress(Event::SearchStarted(query.to_string()));

        let expanded = expand_query(query);
        let hits = match self.provider.search(&expanded, self.max_results).await {
            Ok(hits) => hits,
            Err(e) => {
                progress::log_with(progress::Kind::Search, format!("search failed: {}", e));
                return vec![Document::placeholder(&format!("Search failed: {}", e))];
            }
        };

        let urls: Vec<String> = hits.iter().map(|h| h.url.clone()).collect();
        let mut documents = Vec::new();

        for url in &urls {
            match self.load_document(url, query, false).await {
                Ok(Some(doc)) => {
                    self.send_progress(Event::UrlFetched { url: url.clone(), ok: true });
                    documents.push(doc);
                }
                Ok(None) => {
                    progress::log_with(progress::Kind::Search, format!("skipped (too little content): {}", host_from_url(url)));
                    self.send_progress(Event::UrlFetched { url: url.clone(), ok: false });
                }
                Err(e) => {
                    progress::log_with(progress::Kind::Search, format!("fetch failed for {}: {}", host_from_url(url), e));
                    self.send_progress(Event::UrlFetched { url: url.clone(), ok: false });
                }
            }
        }

        if documents.is_empty() && !urls.is_empty() {
            // Second pass: unfiltered whole-page extraction over the same
            // URLs before giving up entirely.
            progress::log_with(progress::Kind::Search, "no usable documents, retrying with whole-page extraction");
            for url in &urls {
                if let Ok(Some(doc)) = self.load_document(url, query, true).await {
                    documents.push(doc);
                }
            }
        }

        if documents.is_empty() {
            documents.push(Document::placeholder(&format!("No content found for query: {}", query)));
        }

        documents.sort_by(|a, b| {
            b.ranking_score()
                .partial_cmp(&a.ranking_score())
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        self.cache.put(query, documents.clone());
        self.send_progress(Event::SearchCompleted {
            query: query.to_string(),
            documents: documents.len(),
        });
        documents
    }

    async fn load_document(&self, url: &str, query: &str, whole_page: bool) -> Result<Option<Document>> {
        progress::log_with(progress::Kind::Http, format!("HTTP GET {}", host_from_url(url)));

        let response = self.http.get(url).send().await?;
        if !response.status().is_success() {
            return Err(anyhow::anyhow!("HTTP {} for {}", response.status(), url));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        let doc_type = detect_type(url, &content_type);
        let bytes = response.bytes().await?.to_vec();

        build_document(url, doc_type, bytes, query, whole_page).await
    }
}

#[async_trait]
impl SearchBackend for RetrievalPipeline {
    async fn search_and_load(&self, query: &str) -> Vec<Document> {
        RetrievalPipeline::search_and_load(self, query).await
    }
}

/// Append an academic-bias clause unless the query already carries one of
/// the academic markers.
pub(crate) fn expand_query(query: &str) -> String {
    let lower = query.to_lowercase();
    if ACADEMIC_MARKERS.iter().any(|m| lower.contains(m)) {
        query.to_string()
    } else {
        format!("{} (research OR journal OR paper OR article)", query)
    }
}

/// Type detection: URL path extension first, then Content-Type header,
/// defaulting to html.
pub(crate) fn detect_type(url: &str, content_type: &str) -> DocumentType {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let extension = path
        .rsplit('/')
        .next()
        .and_then(|segment| segment.rsplit_once('.'))
        .map(|(_, ext)| ext.to_lowercase());

    match extension.as_deref() {
        Some("pdf") => return DocumentType::Pdf,
        Some("docx") => return DocumentType::Docx,
        Some("doc") => return DocumentType::Doc,
        Some("txt") => return DocumentType::Txt,
        Some("rtf") => return DocumentType::Rtf,
        Some("ppt") | Some("pptx") => return DocumentType::Presentation,
        Some("xls") | Some("xlsx") | Some("csv") => return DocumentType::Spreadsheet,
        Some("html") | Some("htm") => return DocumentType::Html,
        _ => {}
    }

    let ct = content_type.to_lowercase();
    if ct.contains("pdf") {
        DocumentType::Pdf
    } else if ct.contains("wordprocessingml") {
        DocumentType::Docx
    } else if ct.contains("msword") {
        DocumentType::Doc
    } else if ct.contains("rtf") {
        DocumentType::Rtf
    } else if ct.contains("presentation") {
        DocumentType::Presentation
    } else if ct.contains("spreadsheet") || ct.contains("excel") || ct.contains("csv") {
        DocumentType::Spreadsheet
    } else if ct.contains("text/plain") {
        DocumentType::Txt
    } else {
        DocumentType::Html
    }
}

fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = &s[i + 1..i + 3];
            if let Ok(byte) = u8::from_str_radix(hex, 16) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Scholarly-source heuristic: institutional domain, known academic host,
/// or a PDF whose decoded path mentions academic keywords.
pub(crate) fn classify_academic(url: &str) -> bool {
    let host = host_from_url(url).to_lowercase();
    if host.ends_with(".edu") || host.ends_with(".gov") || host.contains(".ac.") {
        return true;
    }
    if ACADEMIC_DOMAINS.iter().any(|d| host == *d || host.ends_with(&format!(".{}", d))) {
        return true;
    }

    let path = url.split(['?', '#']).next().unwrap_or(url).to_lowercase();
    if path.ends_with(".pdf") {
        let decoded = percent_decode(&path);
        return ACADEMIC_PATH_KEYWORDS.iter().any(|k| decoded.contains(k));
    }
    false
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

const SKIP_TAGS: &[&str] = &[
    "header", "footer", "nav", "aside", "script", "style", "form", "noscript",
    "iframe", "svg", "button", "select", "label",
];

static NOISE_ATTR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(nav|menu|sidebar|footer|comment|advert|banner|social|share|related|promo|breadcrumb|widget|cookie|(^|[-_ ])ads?([-_ ]|$))")
        .unwrap()
});

fn element_is_noise(el: &ElementRef) -> bool {
    let value = el.value();
    if SKIP_TAGS.contains(&value.name()) {
        return true;
    }
    for attr in ["class", "id"] {
        if let Some(v) = value.attr(attr) {
            if NOISE_ATTR_RE.is_match(v) {
                return true;
            }
        }
    }
    false
}

fn has_noise_ancestor(el: &ElementRef) -> bool {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| element_is_noise(&a))
}

fn has_ancestor_named(el: &ElementRef, name: &str) -> bool {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| a.value().name() == name)
}

fn squeeze_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn choose_content_root(doc: &Html) -> Option<ElementRef<'_>> {
    let candidates = [
        "article",
        "main",
        "[class*=\"content\"]",
        "[id*=\"content\"]",
        "[class*=\"article\"]",
        "[class*=\"post\"]",
    ];

    let mut best: Option<(usize, ElementRef)> = None;
    for css in candidates {
        let Ok(selector) = Selector::parse(css) else { continue };
        for el in doc.select(&selector) {
            if element_is_noise(&el) {
                continue;
            }
            let text_len: usize = el.text().map(str::len).sum();
            if text_len > best.map(|(l, _)| l).unwrap_or(0) {
                best = Some((text_len, el));
            }
        }
    }
    if let Some((len, el)) = best {
        if len >= MIN_CONTENT_CHARS {
            return Some(el);
        }
    }

    // Next best: the <div> with the most direct <p> children.
    let div_selector = Selector::parse("div").ok()?;
    let mut best_div: Option<(usize, ElementRef)> = None;
    for div in doc.select(&div_selector) {
        let p_children = div
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|c| c.value().name() == "p")
            .count();
        if p_children > best_div.map(|(n, _)| n).unwrap_or(0) {
            best_div = Some((p_children, div));
        }
    }
    if let Some((count, div)) = best_div {
        if count > 0 {
            return Some(div);
        }
    }

    let body_selector = Selector::parse("body").ok()?;
    doc.select(&body_selector).next()
}

/// Structured HTML extraction: pick the main content block, walk its
/// paragraph-level elements, and emit light markup (`### heading ###`,
/// bullets, quote prefixes) with navigation and ad noise removed.
pub(crate) fn extract_html(html: &str) -> String {
    let doc = Html::parse_document(html);
    let Some(root) = choose_content_root(&doc) else {
        return whole_page_text(html);
    };

    let mut blocks: Vec<String> = Vec::new();
    for el in root.descendants().filter_map(ElementRef::wrap) {
        let name = el.value().name();
        if !matches!(name, "p" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "li" | "blockquote") {
            continue;
        }
        if element_is_noise(&el) || has_noise_ancestor(&el) {
            continue;
        }
        // A list item emits its full text; nested paragraph-level elements
        // inside it would duplicate content.
        if has_ancestor_named(&el, "li") {
            continue;
        }

        let text = squeeze_whitespace(&el.text().collect::<String>());
        if text.is_empty() {
            continue;
        }

        let block = match name {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => format!("### {} ###", text),
            "li" => format!("- {}", text),
            "blockquote" => format!("> {}", text),
            _ => text,
        };
        blocks.push(block);
    }

    if blocks.is_empty() {
        return whole_page_text(html);
    }
    blocks.join("\n\n")
}

/// Fallback extraction: the whole page body as flat text.
pub(crate) fn whole_page_text(html: &str) -> String {
    let doc = Html::parse_document(html);
    let Ok(body_selector) = Selector::parse("body") else {
        return String::new();
    };
    match doc.select(&body_selector).next() {
        Some(body) => squeeze_whitespace(&body.text().collect::<String>()),
        None => squeeze_whitespace(&doc.root_element().text().collect::<String>()),
    }
}

async fn extract_pdf(bytes: Vec<u8>) -> Result<String> {
    let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes)).await??;
    Ok(text)
}

static XML_TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());
static DOCX_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<w:t[^>]*>([^<]*)</w:t>").unwrap());

fn decode_xml_entities(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Primary DOCX pass: paragraph boundaries from `</w:p>`, all other markup
/// stripped.
fn strip_docx_markup(xml: &str) -> String {
    let with_breaks = xml.replace("</w:p>", "\n\n");
    let stripped = XML_TAG_RE.replace_all(&with_breaks, "");
    decode_xml_entities(stripped.trim())
}

/// Secondary DOCX pass: concatenate every `<w:t>` run, which also covers
/// table cells the paragraph pass can miss.
fn collect_docx_runs(xml: &str) -> String {
    let runs: Vec<String> = DOCX_RUN_RE
        .captures_iter(xml)
        .map(|c| decode_xml_entities(&c[1]))
        .collect();
    runs.join(" ")
}

fn extract_docx(bytes: &[u8]) -> Result<String> {
    use std::io::Read;

    let reader = std::io::Cursor::new(bytes);
    let mut archive = zip::ZipArchive::new(reader)?;
    let mut xml = String::new();
    archive.by_name("word/document.xml")?.read_to_string(&mut xml)?;

    let primary = strip_docx_markup(&xml);
    if primary.trim().len() >= SHORT_EXTRACTION_CHARS {
        return Ok(primary);
    }
    Ok(collect_docx_runs(&xml))
}

// ---------------------------------------------------------------------------
// Filtering and assembly
// ---------------------------------------------------------------------------

pub(crate) struct FilterOutcome {
    pub content: String,
    pub score_map: Vec<(String, f32)>,
    pub avg_score: f32,
}

fn is_heading(paragraph: &str) -> bool {
    paragraph.starts_with("### ") && paragraph.ends_with(" ###")
}

/// Paragraph-level relevance filtering. Documents with fewer than five
/// paragraphs are kept whole. Otherwise a paragraph survives on score or on
/// carrying at least two of the combined query/TF-IDF keywords; headings
/// directly above surviving content ride along, and document order is
/// restored at the end.
pub(crate) fn filter_paragraphs(
    raw: &str,
    query: &str,
    is_academic: bool,
    doc_type: DocumentType,
) -> FilterOutcome {
    let paragraphs: Vec<String> = raw
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(String::from)
        .collect();

    let scored = relevance::score_paragraphs(&paragraphs, query);
    let avg_score = if scored.is_empty() {
        0.0
    } else {
        scored.iter().map(|(_, s)| s).sum::<f32>() / scored.len() as f32
    };

    if paragraphs.len() < MIN_PARAGRAPHS_FOR_FILTERING {
        return FilterOutcome {
            content: paragraphs.join("\n\n"),
            score_map: scored,
            avg_score,
        };
    }

    let lookup: HashMap<&str, f32> = scored.iter().map(|(p, s)| (p.as_str(), *s)).collect();

    let (threshold, cap) = if is_academic
        && matches!(doc_type, DocumentType::Pdf | DocumentType::Docx | DocumentType::Doc)
    {
        (0.10f32, 20usize)
    } else {
        (0.15f32, 10usize)
    };

    // Combined keyword set: query terms plus TF-IDF terms from the
    // top-scoring paragraphs.
    let top_paragraphs: Vec<&str> = scored.iter().take(3).map(|(p, _)| p.as_str()).collect();
    let mut keywords: HashSet<String> = relevance::tokenize(query).into_iter().collect();
    keywords.extend(relevance::top_terms(&top_paragraphs, 8));

    let mut retained: Vec<usize> = Vec::new();
    for (i, paragraph) in paragraphs.iter().enumerate() {
        if is_heading(paragraph) {
            continue;
        }
        let score = lookup.get(paragraph.as_str()).copied().unwrap_or(0.0);
        let tokens: HashSet<String> = relevance::tokenize(paragraph).into_iter().collect();
        let keyword_hits = keywords.iter().filter(|k| tokens.contains(*k)).count();
        if score > threshold || keyword_hits >= 2 {
            retained.push(i);
        }
    }

    if retained.len() > cap {
        retained.sort_by(|a, b| {
            let score_a = lookup.get(paragraphs[*a].as_str()).copied().unwrap_or(0.0);
            let score_b = lookup.get(paragraphs[*b].as_str()).copied().unwrap_or(0.0);
            score_b.partial_cmp(&score_a).unwrap_or(std::cmp::Ordering::Equal)
        });
        retained.truncate(cap);
        retained.sort_unstable();
    }

    // Keep headings immediately above retained paragraphs even when the
    // heading itself scored low.
    let retained_set: HashSet<usize> = retained.iter().copied().collect();
    let mut kept: Vec<usize> = Vec::new();
    for &i in &retained {
        if i > 0 && is_heading(&paragraphs[i - 1]) && !retained_set.contains(&(i - 1)) {
            kept.push(i - 1);
        }
        kept.push(i);
    }
    kept.sort_unstable();
    kept.dedup();

    let content = kept
        .iter()
        .map(|&i| paragraphs[i].clone())
        .collect::<Vec<_>>()
        .join("\n\n");

    FilterOutcome {
        content,
        score_map: scored,
        avg_score,
    }
}

/// Turn fetched bytes into a scored, filtered, summarized document. Returns
/// None when extraction produced too little usable text.
pub(crate) async fn build_document(
    url: &str,
    doc_type: DocumentType,
    bytes: Vec<u8>,
    query: &str,
    whole_page: bool,
) -> Result<Option<Document>> {
    let raw = match doc_type {
        DocumentType::Html => {
            let html = String::from_utf8_lossy(&bytes);
            if whole_page {
                whole_page_text(&html)
            } else {
                extract_html(&html)
            }
        }
        DocumentType::Pdf => extract_pdf(bytes).await?,
        DocumentType::Docx | DocumentType::Doc => extract_docx(&bytes)?,
        DocumentType::Txt => String::from_utf8_lossy(&bytes).into_owned(),
        other => format!("[unsupported document type: {}]", other.as_str()),
    };

    let raw = raw.trim();
    if raw.len() < MIN_CONTENT_CHARS {
        return Ok(None);
    }

    let is_academic = classify_academic(url);
    let outcome = filter_paragraphs(raw, query, is_academic, doc_type);
    if outcome.content.trim().is_empty() {
        return Ok(None);
    }

    let summary = if outcome.content.split_whitespace().count() > SUMMARY_MIN_WORDS {
        relevance::top_sentences(&outcome.content, query, SUMMARY_SENTENCES).join(" ")
    } else {
        String::new()
    };

    Ok(Some(Document {
        content: outcome.content,
        metadata: DocumentMetadata {
            source: url.to_string(),
            document_type: doc_type,
            is_academic,
            score_map: outcome.score_map,
            summary,
            avg_score: outcome.avg_score,
        },
    }))
}
