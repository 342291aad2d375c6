//! Stage 1 — Language detection: a Unicode-script histogram over the
//! extracted text (spec §4.8).
use unicode_script::{Script, UnicodeScript};

#[derive(Debug, Clone, PartialEq)]
pub struct LanguageDetection {
    pub script_label: String,
    pub language_code: String,
    pub confidence: f64,
}

fn script_to_language_code(script: Script) -> &'static str {
    match script {
        Script::Latin => "en",
        Script::Cyrillic => "ru",
        Script::Han => "zh",
        Script::Hiragana | Script::Katakana => "ja",
        Script::Hangul => "ko",
        Script::Arabic => "ar",
        Script::Devanagari => "hi",
        Script::Greek => "el",
        Script::Hebrew => "he",
        _ => "und",
    }
}

/// Build a histogram of alphabetic characters by Unicode script, and
/// report the best-scoring one along with `max_script / total` as the
/// confidence (spec §4.8, stage 1).
pub fn detect(text: &str) -> LanguageDetection {
    let mut counts: Vec<(Script, usize)> = Vec::new();
    let mut total = 0usize;

    for ch in text.chars().filter(|c| c.is_alphabetic()) {
        let script = ch.script();
        total += 1;
        match counts.iter_mut().find(|(s, _)| *s == script) {
            Some((_, n)) => *n += 1,
            None => counts.push((script, 1)),
        }
    }

    if total == 0 {
        return LanguageDetection {
            script_label: "Unknown".to_string(),
            language_code: "und".to_string(),
            confidence: 0.0,
        };
    }

    let (best_script, best_count) = counts
        .into_iter()
        .max_by_key(|(_, n)| *n)
        .expect("total > 0 implies at least one counted script");

    LanguageDetection {
        script_label: format!("{best_script:?}"),
        language_code: script_to_language_code(best_script).to_string(),
        confidence: best_count as f64 / total as f64,
    }
}
