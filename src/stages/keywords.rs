//! Stage 3 — Keyword extraction: lowercase, strip stop words, frequency
//! count, top-20 (spec §4.8).
use std::collections::HashMap;

use lazy_static::lazy_static;
use unicode_segmentation::UnicodeSegmentation;

const TOP_N: usize = 20;

// A fixed English stop word list, looked up as a perfect hash would be
// (an O(1) HashSet lookup) rather than re-derived per run.
const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any", "are",
    "aren't", "as", "at", "be", "because", "been", "before", "being", "below", "between", "both",
    "but", "by", "can", "could", "did", "do", "does", "doing", "down", "during", "each", "few",
    "for", "from", "further", "had", "has", "have", "having", "he", "her", "here", "hers",
    "herself", "him", "himself", "his", "how", "i", "if", "in", "into", "is", "it", "its",
    "itself", "just", "me", "more", "most", "my", "myself", "no", "nor", "not", "now", "of",
    "off", "on", "once", "only", "or", "other", "our", "ours", "ourselves", "out", "over", "own",
    "same", "she", "should", "so", "some", "such", "than", "that", "the", "their", "theirs",
    "them", "themselves", "then", "there", "these", "they", "this", "those", "through", "to",
    "too", "under", "until", "up", "very", "was", "we", "were", "what", "when", "where", "which",
    "while", "who", "whom", "why", "will", "with", "would", "you", "your", "yours", "yourself",
    "yourselves",
];

lazy_static! {
    static ref STOP_WORD_SET: std::collections::HashSet<&'static str> =
        STOP_WORDS.iter().copied().collect();
}

#[derive(Debug, Clone, PartialEq)]
pub struct Keyword {
    pub word: String,
    pub count: u32,
}

/// Extract up to [TOP_N] keywords by descending frequency, ties broken
/// alphabetically for determinism.
pub fn extract(text: &str) -> Vec<Keyword> {
    let mut freq: HashMap<String, u32> = HashMap::new();
    for token in text.unicode_words() {
        let lower = token.to_lowercase();
        if lower.chars().all(|c| c.is_alphabetic()) && !STOP_WORD_SET.contains(lower.as_str()) {
            *freq.entry(lower).or_insert(0) += 1;
        }
    }

    let mut ranked: Vec<Keyword> = freq
        .into_iter()
        .map(|(word, count)| Keyword { word, count })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.word.cmp(&b.word)));
    ranked.truncate(TOP_N);
    ranked
}
