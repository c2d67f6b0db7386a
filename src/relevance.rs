use std::collections::HashMap;

/// English stop words excluded from the vector space.
const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "all", "also", "am", "an", "and",
    "any", "are", "as", "at", "be", "because", "been", "before", "being",
    "below", "between", "both", "but", "by", "can", "could", "did", "do",
    "does", "doing", "down", "during", "each", "few", "for", "from", "further",
    "had", "has", "have", "having", "he", "her", "here", "hers", "him", "his",
    "how", "if", "in", "into", "is", "it", "its", "just", "me", "more", "most",
    "my", "no", "nor", "not", "now", "of", "off", "on", "once", "only", "or",
    "other", "our", "out", "over", "own", "same", "she", "should", "so",
    "some", "such", "than", "that", "the", "their", "them", "then", "there",
    "these", "they", "this", "those", "through", "to", "too", "under", "until",
    "up", "very", "was", "we", "were", "what", "when", "where", "which",
    "while", "who", "whom", "why", "will", "with", "would", "you", "your",
];

fn is_stop_word(token: &str) -> bool {
    STOP_WORDS.binary_search(&token).is_ok()
}

/// Tokenize text into lowercase alphanumeric terms, dropping single
/// characters and stop words.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| s.len() >= 2)
        .filter(|s| !is_stop_word(s))
        .map(String::from)
        .collect()
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    dot_product / (magnitude_a * magnitude_b)
}

/// TF-IDF vector space over a small corpus. The query is always document 0 so
/// its terms contribute to the vocabulary and document frequencies.
struct VectorSpace {
    vocabulary: HashMap<String, usize>,
    idf: Vec<f32>,
    doc_tokens: Vec<Vec<String>>,
}

impl VectorSpace {
    fn build(docs: &[&str]) -> Self {
        let doc_tokens: Vec<Vec<String>> = docs.iter().map(|d| tokenize(d)).collect();

        let mut vocabulary: HashMap<String, usize> = HashMap::new();
        let mut document_frequency: Vec<u32> = Vec::new();
        for tokens in &doc_tokens {
            let mut seen: Vec<usize> = Vec::new();
            for token in tokens {
                let index = *vocabulary.entry(token.clone()).or_insert_with(|| {
                    document_frequency.push(0);
                    document_frequency.len() - 1
                });
                if !seen.contains(&index) {
                    seen.push(index);
                    document_frequency[index] += 1;
                }
            }
        }

        let n = docs.len() as f32;
        let idf = document_frequency
            .iter()
            .map(|&df| ((1.0 + n) / (1.0 + df as f32)).ln() + 1.0)
            .collect();

        VectorSpace { vocabulary, idf, doc_tokens }
    }

    fn is_degenerate(&self) -> bool {
        self.vocabulary.is_empty()
    }

    fn vector(&self, doc: usize) -> Vec<f32> {
        let tokens = &self.doc_tokens[doc];
        let mut counts: HashMap<usize, f32> = HashMap::new();
        for token in tokens {
            if let Some(&index) = self.vocabulary.get(token) {
                *counts.entry(index).or_insert(0.0) += 1.0;
            }
        }

        let total = tokens.len().max(1) as f32;
        let mut vector = vec![0.0f32; self.idf.len()];
        for (index, count) in counts {
            vector[index] = (count / total) * self.idf[index];
        }
        vector
    }
}

/// Plain term-overlap scoring for corpora too small or too stop-wordy for
/// TF-IDF to mean anything.
fn frequency_fallback(paragraphs: &[String], query: &str) -> Vec<(String, f32)> {
    let query_lower = query.to_lowercase();
    let query_terms: Vec<&str> = query_lower.split_whitespace().collect();

    let mut scored: Vec<(String, f32)> = paragraphs
        .iter()
        .map(|p| {
            let body = p.to_lowercase();
            let hits = query_terms.iter().filter(|t| body.contains(*t)).count();
            let denominator = query_terms.len().max(1) as f32;
            (p.clone(), hits as f32 / denominator)
        })
        .collect();

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored
}

/// Score each paragraph against the query by TF-IDF cosine similarity over
/// the corpus `{query} ∪ paragraphs`, sorted descending. Never fails: an
/// empty input yields an empty list and a degenerate vocabulary falls back
/// to term-overlap scoring.
pub fn score_paragraphs(paragraphs: &[String], query: &str) -> Vec<(String, f32)> {
    if paragraphs.is_empty() {
        return Vec::new();
    }

    let mut docs: Vec<&str> = Vec::with_capacity(paragraphs.len() + 1);
    docs.push(query);
    docs.extend(paragraphs.iter().map(String::as_str));

    let space = VectorSpace::build(&docs);
    if space.is_degenerate() {
        return frequency_fallback(paragraphs, query);
    }

    let query_vector = space.vector(0);
    let mut scored: Vec<(String, f32)> = paragraphs
        .iter()
        .enumerate()
        .map(|(i, p)| (p.clone(), cosine_similarity(&query_vector, &space.vector(i + 1))))
        .collect();

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored
}

/// Split text into sentences on terminal punctuation. Keeps the terminator
/// with its sentence; drops fragments under a few characters.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    for c in text.chars() {
        current.push(c);
        if matches!(c, '.' | '!' | '?') {
            let trimmed = current.trim();
            if trimmed.len() > 3 {
                sentences.push(trimmed.to_string());
            }
            current.clear();
        }
    }
    let tail = current.trim();
    if tail.len() > 3 {
        sentences.push(tail.to_string());
    }
    sentences
}

/// Extractive summary: the `limit` sentences most similar to the query,
/// emitted in their original order.
pub fn top_sentences(text: &str, query: &str, limit: usize) -> Vec<String> {
    let sentences = split_sentences(text);
    if sentences.len() <= limit {
        return sentences;
    }

    let scored = score_paragraphs(&sentences, query);
    let keep: Vec<&String> = scored.iter().take(limit).map(|(s, _)| s).collect();

    sentences
        .iter()
        .filter(|s| keep.iter().any(|k| *k == *s))
        .take(limit)
        .cloned()
        .collect()
}

/// The `limit` highest-weighted TF-IDF terms across the given texts, used to
/// widen the keyword set during paragraph filtering.
pub fn top_terms(texts: &[&str], limit: usize) -> Vec<String> {
    if texts.is_empty() {
        return Vec::new();
    }

    let space = VectorSpace::build(texts);
    if space.is_degenerate() {
        return Vec::new();
    }

    let mut weights: HashMap<String, f32> = HashMap::new();
    for doc in 0..texts.len() {
        let vector = space.vector(doc);
        for (term, &index) in &space.vocabulary {
            if vector[index] > 0.0 {
                let entry = weights.entry(term.clone()).or_insert(0.0);
                *entry += vector[index];
            }
        }
    }

    let mut ranked: Vec<(String, f32)> = weights.into_iter().collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    ranked.into_iter().take(limit).map(|(t, _)| t).collect()
}
