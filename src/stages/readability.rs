//! Stage 2 — Readability: Flesch-Kincaid grade and ease from
//! sentence/word/syllable counts (spec §4.8).
use unicode_segmentation::UnicodeSegmentation;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Readability {
    pub sentence_count: u32,
    pub word_count: u32,
    pub syllable_count: u32,
    pub flesch_kincaid_grade: f64,
    pub flesch_reading_ease: f64,
}

fn is_vowel(c: char) -> bool {
    matches!(c.to_ascii_lowercase(), 'a' | 'e' | 'i' | 'o' | 'u' | 'y')
}

/// Approximate syllables as the count of vowel-group runs in a word,
/// with a lower bound of 1 (spec §4.8, stage 2).
fn syllables_in_word(word: &str) -> u32 {
    let mut count = 0u32;
    let mut in_vowel_group = false;
    for c in word.chars() {
        if is_vowel(c) {
            if !in_vowel_group {
                count += 1;
                in_vowel_group = true;
            }
        } else {
            in_vowel_group = false;
        }
    }
    count.max(1)
}

pub fn analyze(text: &str) -> Readability {
    let words: Vec<&str> = text
        .unicode_words()
        .filter(|w| w.chars().any(|c| c.is_alphabetic()))
        .collect();
    let word_count = words.len() as u32;

    let sentence_count = text
        .split(|c| c == '.' || c == '!' || c == '?')
        .filter(|s| !s.trim().is_empty())
        .count()
        .max(1) as u32;

    let syllable_count: u32 = words.iter().map(|w| syllables_in_word(w)).sum();

    if word_count == 0 {
        return Readability {
            sentence_count,
            word_count: 0,
            syllable_count: 0,
            flesch_kincaid_grade: 0.0,
            flesch_reading_ease: 0.0,
        };
    }

    let words_per_sentence = word_count as f64 / sentence_count as f64;
    let syllables_per_word = syllable_count as f64 / word_count as f64;

    let grade = 0.39 * words_per_sentence + 11.8 * syllables_per_word - 15.59;
    let ease = 206.835 - 1.015 * words_per_sentence - 84.6 * syllables_per_word;

    Readability {
        sentence_count,
        word_count,
        syllable_count,
        flesch_kincaid_grade: grade,
        flesch_reading_ease: ease,
    }
}
