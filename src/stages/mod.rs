//! Stages Engine: 20 configurable analyses selected by a 64-bit bitmask,
//! emitted as a single binary record (spec §4.8).
pub mod citations;
pub mod keywords;
pub mod language;
pub mod phash;
pub mod readability;

use std::fs;
use std::path::Path;

use bitflags::bitflags;
use log::debug;

use crate::content_kind::ContentKind;
use crate::error::Error;
use crate::merkle::MerkleStreamer;
use crate::model::ParseResult;
use crate::record_builder::RecordBuilder;

pub const DATA_WORDS: usize = 23;
pub const PTR_WORDS: usize = 30;

bitflags! {
    /// One bit per stage (spec §4.8 stage set, numbered 1-20 -> bits 0-19).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StageMask: u64 {
        const LANGUAGE              = 1 << 0;
        const READABILITY           = 1 << 1;
        const KEYWORDS               = 1 << 2;
        const CITATIONS              = 1 << 3;
        const OCR_CONFIDENCE         = 1 << 4;
        const PERCEPTUAL_HASH        = 1 << 5;
        const TOC                   = 1 << 6;
        const MULTI_LANG_OCR         = 1 << 7;
        const SUBTITLES              = 1 << 8;
        const PREMIS                 = 1 << 9;
        const MERKLE_PROOF           = 1 << 10;
        const EXACT_DEDUP            = 1 << 11;
        const NEAR_DEDUP             = 1 << 12;
        const COORDINATES            = 1 << 13;
        const ML_NER                 = 1 << 14;
        const ML_AUDIO_TRANSCRIPTION = 1 << 15;
        const ML_IMAGE_CLASSIFICATION = 1 << 16;
        const ML_LAYOUT_ANALYSIS     = 1 << 17;
        const ML_HANDWRITING_OCR     = 1 << 18;
        const ML_FORMAT_CONVERSION   = 1 << 19;
    }
}

impl StageMask {
    pub const FAST: StageMask = StageMask::from_bits_truncate(
        StageMask::LANGUAGE.bits()
            | StageMask::READABILITY.bits()
            | StageMask::KEYWORDS.bits()
            | StageMask::EXACT_DEDUP.bits()
            | StageMask::PREMIS.bits()
            | StageMask::MERKLE_PROOF.bits()
            | StageMask::CITATIONS.bits(),
    );

    pub const ANALYSIS: StageMask = StageMask::from_bits_truncate(
        StageMask::FAST.bits()
            | StageMask::OCR_CONFIDENCE.bits()
            | StageMask::PERCEPTUAL_HASH.bits()
            | StageMask::TOC.bits()
            | StageMask::NEAR_DEDUP.bits()
            | StageMask::COORDINATES.bits()
            | StageMask::SUBTITLES.bits(),
    );

    pub const ALL_20: StageMask = StageMask::from_bits_truncate((1u64 << 20) - 1);

    /// Parse `stagesConfig` (spec §6): a preset name, a comma-separated
    /// list of stage names, or a `0xHEX` bitmask literal.
    pub fn parse(s: &str) -> Result<StageMask, Error> {
        let s = s.trim();
        if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            let bits = u64::from_str_radix(hex, 16)
                .map_err(|e| Error::Config(format!("invalid stagesConfig hex mask {s:?}: {e}")))?;
            return Ok(StageMask::from_bits_truncate(bits));
        }
        match s {
            "none" => return Ok(StageMask::empty()),
            "fast" => return Ok(StageMask::FAST),
            "analysis" => return Ok(StageMask::ANALYSIS),
            "all" => return Ok(StageMask::ALL_20),
            _ => {}
        }

        let mut mask = StageMask::empty();
        for name in s.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            mask |= stage_name_to_flag(name)
                .ok_or_else(|| Error::Config(format!("unknown stage name in stagesConfig: {name:?}")))?;
        }
        Ok(mask)
    }
}

fn stage_name_to_flag(name: &str) -> Option<StageMask> {
    Some(match name {
        "language" => StageMask::LANGUAGE,
        "readability" => StageMask::READABILITY,
        "keywords" => StageMask::KEYWORDS,
        "citations" => StageMask::CITATIONS,
        "ocr-confidence" => StageMask::OCR_CONFIDENCE,
        "perceptual-hash" => StageMask::PERCEPTUAL_HASH,
        "toc" => StageMask::TOC,
        "multi-lang-ocr" => StageMask::MULTI_LANG_OCR,
        "subtitles" => StageMask::SUBTITLES,
        "premis" => StageMask::PREMIS,
        "merkle-proof" => StageMask::MERKLE_PROOF,
        "exact-dedup" => StageMask::EXACT_DEDUP,
        "near-dedup" => StageMask::NEAR_DEDUP,
        "coordinates" => StageMask::COORDINATES,
        "ml-ner" => StageMask::ML_NER,
        "ml-audio-transcription" => StageMask::ML_AUDIO_TRANSCRIPTION,
        "ml-image-classification" => StageMask::ML_IMAGE_CLASSIFICATION,
        "ml-layout-analysis" => StageMask::ML_LAYOUT_ANALYSIS,
        "ml-handwriting-ocr" => StageMask::ML_HANDWRITING_OCR,
        "ml-format-conversion" => StageMask::ML_FORMAT_CONVERSION,
        _ => return None,
    })
}

const ML_STAGES: [StageMask; 6] = [
    StageMask::ML_NER,
    StageMask::ML_AUDIO_TRANSCRIPTION,
    StageMask::ML_IMAGE_CLASSIFICATION,
    StageMask::ML_LAYOUT_ANALYSIS,
    StageMask::ML_HANDWRITING_OCR,
    StageMask::ML_FORMAT_CONVERSION,
];

/// Everything the engine needs about one document to run its stages.
pub struct StageInput<'a> {
    pub parse_result: &'a ParseResult,
    pub input_path: &'a Path,
    /// The already-extracted text/content file written by the Parser
    /// Bridge (`{stem}.{ext}`).
    pub extracted_output_path: &'a Path,
    pub conduit_sha256_hex: Option<String>,
    /// Captured during image parsing; `None` when not applicable.
    pub ocr_confidence: Option<i8>,
}

/// Data-word byte offsets within the 23-word (184-byte) fixed section.
mod data_offset {
    pub const LANGUAGE_CONFIDENCE: usize = 8;
    pub const READABILITY_GRADE: usize = 16;
    pub const READABILITY_EASE: usize = 24;
    pub const OCR_CONFIDENCE: usize = 32;
    pub const PERCEPTUAL_HASH_BITS: usize = 40;
    pub const PREMIS_FILE_SIZE: usize = 48;
    pub const CITATIONS_TOTAL: usize = 56;
    pub const TOC_ENTRY_COUNT: usize = 64;
    pub const SUBTITLE_STREAM_COUNT: usize = 72;
    pub const NEAR_DEDUP_APPLICABLE: usize = 80;
    pub const COORD_MIN_X: usize = 88;
    pub const COORD_MIN_Y: usize = 96;
    pub const COORD_MAX_X: usize = 104;
    pub const COORD_MAX_Y: usize = 112;
    pub const READABILITY_WORD_COUNT: usize = 120;
    pub const READABILITY_SENTENCE_COUNT: usize = 128;
    pub const READABILITY_SYLLABLE_COUNT: usize = 136;
    pub const EXACT_DEDUP_PRESENT: usize = 144;
    pub const ML_STATUS_BYTES: usize = 152;
    // words 20-22 (bytes 160, 168, 176) reserved for future stages.
}

/// Pointer indices within the 30-slot pointer section.
mod ptr_index {
    pub const LANGUAGE_CODE: usize = 0;
    pub const SCRIPT_LABEL: usize = 1;
    pub const KEYWORDS: usize = 2;
    pub const CITATION_DOIS: usize = 3;
    pub const CITATION_ISBNS: usize = 4;
    pub const CITATION_URLS: usize = 5;
    pub const CITATION_YEARS: usize = 6;
    pub const CITATION_NUMERIC_REFS: usize = 7;
    pub const EXACT_DEDUP_SHA256: usize = 8;
    pub const PERCEPTUAL_HASH_HEX: usize = 9;
    pub const PREMIS_MIME: usize = 10;
    pub const PREMIS_FIXITY_ALGORITHM: usize = 11;
    pub const PREMIS_FORMAT_REGISTRY_NAME: usize = 12;
    pub const MERKLE_ROOT_HEX: usize = 13;
    pub const TOC_ENTRIES: usize = 14;
    pub const SUBTITLE_STREAMS: usize = 15;
    pub const MULTI_LANG_OCR_LANGUAGES: usize = 16;
    pub const ML_STUB_LABELS: usize = 17;
}

/// Not-applicable/"ML runtime unavailable" status byte values, stored
/// packed 1-per-stage in [data_offset::ML_STATUS_BYTES].
const ML_STATUS_NOT_RUN: u8 = 0;
const ML_STATUS_NOT_AVAILABLE: u8 = 1;

pub struct StagesEngine;

impl StagesEngine {
    /// Run the stages selected by `mask` and write the resulting binary
    /// record to `stages_output_path` (spec §4.8's `{output}.stages.{ext}`).
    pub fn run_to_file(
        mask: StageMask,
        input: &StageInput,
        stages_output_path: &Path,
    ) -> Result<(), Error> {
        let bytes = Self::run(mask, input);
        fs::write(stages_output_path, bytes).map_err(|e| {
            debug!(
                "failed to write stages record to {}: {e}",
                stages_output_path.display()
            );
            Error::Io(e)
        })
    }

    /// Run the selected stages and return the encoded message bytes.
    pub fn run(mask: StageMask, input: &StageInput) -> Vec<u8> {
        let mut b = RecordBuilder::init(DATA_WORDS, PTR_WORDS);
        b.set_u64(0, mask.bits());

        // Group (a): result-only stages.
        if mask.contains(StageMask::OCR_CONFIDENCE) {
            let confidence = input.ocr_confidence.unwrap_or(-1);
            b.set_f64(data_offset::OCR_CONFIDENCE, confidence as f64);
        }
        if mask.contains(StageMask::EXACT_DEDUP) {
            let hex = input
                .conduit_sha256_hex
                .clone()
                .unwrap_or_else(|| input.parse_result.sha256_hex());
            if !hex.is_empty() {
                b.set_u64(data_offset::EXACT_DEDUP_PRESENT, 1);
                b.set_text(ptr_index::EXACT_DEDUP_SHA256, &hex);
            }
        }

        // Group (b): text-dependent stages, one read of the extracted text.
        let needs_text = mask.intersects(
            StageMask::LANGUAGE | StageMask::READABILITY | StageMask::KEYWORDS | StageMask::CITATIONS,
        );
        let text = if needs_text {
            fs::read_to_string(input.extracted_output_path).ok()
        } else {
            None
        };

        if let Some(text) = text.as_deref() {
            if mask.contains(StageMask::LANGUAGE) {
                let lang = language::detect(text);
                b.set_f64(data_offset::LANGUAGE_CONFIDENCE, lang.confidence);
                b.set_text(ptr_index::LANGUAGE_CODE, &lang.language_code);
                b.set_text(ptr_index::SCRIPT_LABEL, &lang.script_label);
            }
            if mask.contains(StageMask::READABILITY) {
                let r = readability::analyze(text);
                b.set_f64(data_offset::READABILITY_GRADE, r.flesch_kincaid_grade);
                b.set_f64(data_offset::READABILITY_EASE, r.flesch_reading_ease);
                b.set_u64(data_offset::READABILITY_WORD_COUNT, r.word_count as u64);
                b.set_u64(data_offset::READABILITY_SENTENCE_COUNT, r.sentence_count as u64);
                b.set_u64(data_offset::READABILITY_SYLLABLE_COUNT, r.syllable_count as u64);
            }
            if mask.contains(StageMask::KEYWORDS) {
                let kws: Vec<String> = keywords::extract(text).into_iter().map(|k| k.word).collect();
                if !kws.is_empty() {
                    b.set_text_list(ptr_index::KEYWORDS, &kws);
                }
            }
            if mask.contains(StageMask::CITATIONS) {
                let c = citations::extract(text);
                b.set_u64(data_offset::CITATIONS_TOTAL, c.total() as u64);
                if !c.dois.is_empty() {
                    b.set_text_list(ptr_index::CITATION_DOIS, &c.dois);
                }
                if !c.isbns.is_empty() {
                    b.set_text_list(ptr_index::CITATION_ISBNS, &c.isbns);
                }
                if !c.urls.is_empty() {
                    b.set_text_list(ptr_index::CITATION_URLS, &c.urls);
                }
                if !c.years.is_empty() {
                    b.set_text_list(ptr_index::CITATION_YEARS, &c.years);
                }
                if !c.numeric_refs.is_empty() {
                    b.set_text_list(ptr_index::CITATION_NUMERIC_REFS, &c.numeric_refs);
                }
            }
        }

        // Group (c): integrity stages over the output file.
        if mask.contains(StageMask::MERKLE_PROOF) {
            if let Ok(bytes) = fs::read(input.extracted_output_path) {
                let mut streamer = MerkleStreamer::new();
                streamer.update(&bytes);
                let root = streamer.finalize();
                b.set_text(ptr_index::MERKLE_ROOT_HEX, &root.root_hex());
            }
        }
        if mask.contains(StageMask::PREMIS) {
            b.set_u64(data_offset::PREMIS_FILE_SIZE, file_len(input.extracted_output_path));
            b.set_text(ptr_index::PREMIS_MIME, &input.parse_result.mime());
            b.set_text(ptr_index::PREMIS_FIXITY_ALGORITHM, "SHA-256");
            b.set_text(
                ptr_index::PREMIS_FORMAT_REGISTRY_NAME,
                input.parse_result.content_kind().name(),
            );
        }

        // Group (d): format-specific stages, gated by content kind.
        let kind = input.parse_result.content_kind();
        if kind == ContentKind::Image && mask.intersects(StageMask::PERCEPTUAL_HASH | StageMask::NEAR_DEDUP) {
            if let Some(hash) = phash::average_hash(input.input_path) {
                if mask.contains(StageMask::PERCEPTUAL_HASH) {
                    b.set_u64(data_offset::PERCEPTUAL_HASH_BITS, hash);
                    b.set_text(ptr_index::PERCEPTUAL_HASH_HEX, &phash::hash_to_hex(hash));
                }
                if mask.contains(StageMask::NEAR_DEDUP) {
                    b.set_u64(data_offset::NEAR_DEDUP_APPLICABLE, 1);
                }
            } else if mask.contains(StageMask::NEAR_DEDUP) {
                b.set_u64(data_offset::NEAR_DEDUP_APPLICABLE, 0);
            }
        }
        if kind == ContentKind::Pdf && mask.contains(StageMask::TOC) {
            // No PDF index-tree walker is wired up in this build; emit an
            // empty table of contents rather than fabricate entries.
            b.set_u64(data_offset::TOC_ENTRY_COUNT, 0);
            b.alloc_composite_list(ptr_index::TOC_ENTRIES, 0, 1, 1);
        }
        if kind == ContentKind::Image && mask.contains(StageMask::MULTI_LANG_OCR) {
            let langs = vec!["en".to_string()];
            b.set_text_list(ptr_index::MULTI_LANG_OCR_LANGUAGES, &langs);
        }
        if kind == ContentKind::Video && mask.contains(StageMask::SUBTITLES) {
            b.set_u64(data_offset::SUBTITLE_STREAM_COUNT, 0);
            b.alloc_composite_list(ptr_index::SUBTITLE_STREAMS, 0, 1, 2);
        }
        if kind == ContentKind::GeoSpatial && mask.contains(StageMask::COORDINATES) {
            // No geospatial reader is wired up; emit a zeroed bounding box
            // rather than fabricate coordinates.
            b.set_f64(data_offset::COORD_MIN_X, 0.0);
            b.set_f64(data_offset::COORD_MIN_Y, 0.0);
            b.set_f64(data_offset::COORD_MAX_X, 0.0);
            b.set_f64(data_offset::COORD_MAX_Y, 0.0);
        }

        // Group (e): ML stubs. No ML runtime is attached in this build, so
        // every selected ML stage reports "not_available" (spec §4.8).
        let mut ml_labels = Vec::new();
        let mut status_bytes = [ML_STATUS_NOT_RUN; 6];
        for (i, stage) in ML_STAGES.iter().enumerate() {
            if mask.contains(*stage) {
                status_bytes[i] = ML_STATUS_NOT_AVAILABLE;
                ml_labels.push("not_available".to_string());
            }
        }
        if !ml_labels.is_empty() {
            for (i, &status) in status_bytes.iter().enumerate() {
                b.set_u8(data_offset::ML_STATUS_BYTES + i, status);
            }
            b.set_text_list(ptr_index::ML_STUB_LABELS, &ml_labels);
        }

        let mut out = Vec::new();
        b.write_message(&mut out).expect("writing to a Vec never fails");
        out
    }
}

fn file_len(path: &Path) -> u64 {
    fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ParseStatus;
    use std::io::Write;

    fn sample_parse_result() -> ParseResult {
        let mut r = ParseResult::new(ParseStatus::Ok, ContentKind::Pdf);
        r.set_mime("application/pdf");
        r.set_sha256_hex(&"a".repeat(64));
        r
    }

    #[test]
    fn preset_bit_counts_match_spec() {
        assert_eq!(StageMask::empty().bits(), 0);
        assert_eq!(StageMask::ALL_20.bits(), (1u64 << 20) - 1);
        assert!(StageMask::FAST.contains(StageMask::LANGUAGE));
        assert!(StageMask::FAST.contains(StageMask::MERKLE_PROOF));
        assert!(!StageMask::FAST.contains(StageMask::TOC));
        assert!(StageMask::ANALYSIS.contains(StageMask::PERCEPTUAL_HASH));
        assert!(StageMask::ANALYSIS.contains(StageMask::LANGUAGE));
    }

    #[test]
    fn parses_preset_names_comma_lists_and_hex() {
        assert_eq!(StageMask::parse("none").unwrap(), StageMask::empty());
        assert_eq!(StageMask::parse("fast").unwrap(), StageMask::FAST);
        assert_eq!(
            StageMask::parse("language,keywords").unwrap(),
            StageMask::LANGUAGE | StageMask::KEYWORDS
        );
        assert_eq!(StageMask::parse("0x3").unwrap(), StageMask::LANGUAGE | StageMask::READABILITY);
        assert!(StageMask::parse("bogus-stage").is_err());
    }

    #[test]
    fn none_mask_produces_a_record_with_only_the_bitmask_set() {
        let f = tempfile::NamedTempFile::new().unwrap();
        let pr = sample_parse_result();
        let input = StageInput {
            parse_result: &pr,
            input_path: f.path(),
            extracted_output_path: f.path(),
            conduit_sha256_hex: None,
            ocr_confidence: None,
        };
        let bytes = StagesEngine::run(StageMask::empty(), &input);
        // header (16) + root struct ((23+30)*8)
        assert_eq!(bytes.len(), 16 + (DATA_WORDS + PTR_WORDS) * 8);
    }

    #[test]
    fn text_dependent_stages_run_over_extracted_output() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"The quick brown fox jumps over the lazy dog. It ran fast.")
            .unwrap();
        f.flush().unwrap();

        let pr = sample_parse_result();
        let input = StageInput {
            parse_result: &pr,
            input_path: f.path(),
            extracted_output_path: f.path(),
            conduit_sha256_hex: Some("b".repeat(64)),
            ocr_confidence: None,
        };
        let mask = StageMask::LANGUAGE | StageMask::READABILITY | StageMask::KEYWORDS | StageMask::EXACT_DEDUP;
        let bytes = StagesEngine::run(mask, &input);
        assert!(bytes.len() > 16 + (DATA_WORDS + PTR_WORDS) * 8);
    }

    #[test]
    fn ml_stages_emit_not_available_labels() {
        let f = tempfile::NamedTempFile::new().unwrap();
        let pr = sample_parse_result();
        let input = StageInput {
            parse_result: &pr,
            input_path: f.path(),
            extracted_output_path: f.path(),
            conduit_sha256_hex: None,
            ocr_confidence: None,
        };
        let bytes = StagesEngine::run(StageMask::ML_NER | StageMask::ML_AUDIO_TRANSCRIPTION, &input);
        assert!(bytes.len() > 16 + (DATA_WORDS + PTR_WORDS) * 8);
    }
}
