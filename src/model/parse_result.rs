//! The 952-byte flat Parse Result (spec §3).
//!
//! This is the binary contract shared by the cache layer (stored verbatim
//! as the tail of an L1/L2 value), the Parser Bridge FFI, and the Stages
//! Engine. Its size, alignment and field order must never change without a
//! coordinated version bump across all three; [assert_layout] below pins
//! that contract at compile time.
use static_assertions::const_assert_eq;
use std::mem::{align_of, size_of};

use crate::content_kind::ContentKind;

pub const PARSE_RESULT_SIZE: usize = 952;

/// Seven-variant parse status (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ParseStatus {
    Ok = 0,
    Error = 1,
    FileNotFound = 2,
    ParseError = 3,
    NullArgument = 4,
    UnsupportedFormat = 5,
    OutOfMemory = 6,
}

impl ParseStatus {
    pub fn from_code(code: u8) -> ParseStatus {
        match code {
            0 => ParseStatus::Ok,
            1 => ParseStatus::Error,
            2 => ParseStatus::FileNotFound,
            3 => ParseStatus::ParseError,
            4 => ParseStatus::NullArgument,
            5 => ParseStatus::UnsupportedFormat,
            _ => ParseStatus::OutOfMemory,
        }
    }

    /// Retryable kinds per spec §3: `{Error, OutOfMemory}`. Everything else,
    /// including `Ok`, is not retried by the Fault Handler.
    pub fn is_retryable(self) -> bool {
        matches!(self, ParseStatus::Error | ParseStatus::OutOfMemory)
    }

    pub fn is_ok(self) -> bool {
        matches!(self, ParseStatus::Ok)
    }
}

/// Flat, 8-byte-aligned, 952-byte record. No owning pointers: all string
/// fields are embedded fixed-size byte arrays with a trailing null.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct ParseResult {
    pub status: u8,
    pub content_kind: u8,
    _pad0: [u8; 2],
    pub page_count: u32,
    pub word_count: u64,
    pub char_count: u64,
    pub duration_secs: f64,
    pub wall_time_ms: f64,
    sha256_hex: [u8; 65],
    error_message: [u8; 255],
    title: [u8; 255],
    author: [u8; 255],
    mime: [u8; 63],
    _pad_tail: [u8; 19],
}

const_assert_eq!(size_of::<ParseResult>(), PARSE_RESULT_SIZE);
const_assert_eq!(align_of::<ParseResult>(), 8);

fn write_fixed(buf: &mut [u8], s: &str) {
    buf.iter_mut().for_each(|b| *b = 0);
    let bytes = s.as_bytes();
    let n = bytes.len().min(buf.len() - 1);
    buf[..n].copy_from_slice(&bytes[..n]);
}

fn read_fixed(buf: &[u8]) -> String {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..end]).into_owned()
}

impl ParseResult {
    pub fn new(status: ParseStatus, content_kind: ContentKind) -> ParseResult {
        ParseResult {
            status: status as u8,
            content_kind: content_kind.code(),
            _pad0: [0; 2],
            page_count: 0,
            word_count: 0,
            char_count: 0,
            duration_secs: 0.0,
            wall_time_ms: 0.0,
            sha256_hex: [0; 65],
            error_message: [0; 255],
            title: [0; 255],
            author: [0; 255],
            mime: [0; 63],
            _pad_tail: [0; 19],
        }
    }

    pub fn status(&self) -> ParseStatus {
        ParseStatus::from_code(self.status)
    }

    pub fn content_kind(&self) -> ContentKind {
        ContentKind::from_code(self.content_kind)
    }

    pub fn set_sha256_hex(&mut self, hex: &str) {
        write_fixed(&mut self.sha256_hex, hex);
    }

    pub fn sha256_hex(&self) -> String {
        read_fixed(&self.sha256_hex)
    }

    pub fn set_error_message(&mut self, msg: &str) {
        write_fixed(&mut self.error_message, msg);
    }

    pub fn error_message(&self) -> String {
        read_fixed(&self.error_message)
    }

    pub fn set_title(&mut self, title: &str) {
        write_fixed(&mut self.title, title);
    }

    pub fn title(&self) -> String {
        read_fixed(&self.title)
    }

    pub fn set_author(&mut self, author: &str) {
        write_fixed(&mut self.author, author);
    }

    pub fn author(&self) -> String {
        read_fixed(&self.author)
    }

    pub fn set_mime(&mut self, mime: &str) {
        write_fixed(&mut self.mime, mime);
    }

    pub fn mime(&self) -> String {
        read_fixed(&self.mime)
    }

    /// View this record as its raw byte representation, suitable for
    /// writing verbatim into an L1/L2 cache value.
    pub fn as_bytes(&self) -> &[u8; PARSE_RESULT_SIZE] {
        // Safety: ParseResult is `repr(C)`, `Copy`, contains no padding
        // bytes with uninitialised content (all fields are explicitly
        // zeroed in `new`), and its size is pinned to PARSE_RESULT_SIZE by
        // the const assertion above.
        unsafe { &*(self as *const ParseResult as *const [u8; PARSE_RESULT_SIZE]) }
    }

    /// Reconstruct a record from raw bytes previously produced by
    /// [Self::as_bytes].
    pub fn from_bytes(bytes: &[u8; PARSE_RESULT_SIZE]) -> ParseResult {
        // Safety: same layout guarantee as `as_bytes`.
        unsafe { *(bytes as *const [u8; PARSE_RESULT_SIZE] as *const ParseResult) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_is_952_bytes() {
        assert_eq!(size_of::<ParseResult>(), 952);
    }

    #[test]
    fn string_fields_roundtrip() {
        let mut r = ParseResult::new(ParseStatus::Ok, ContentKind::Pdf);
        r.set_title("A Treatise on Distributed Systems");
        r.set_author("J. Doe");
        r.set_mime("application/pdf");
        r.set_sha256_hex(&"a".repeat(64));
        assert_eq!(r.title(), "A Treatise on Distributed Systems");
        assert_eq!(r.author(), "J. Doe");
        assert_eq!(r.mime(), "application/pdf");
        assert_eq!(r.sha256_hex(), "a".repeat(64));
    }

    #[test]
    fn byte_roundtrip_preserves_fields() {
        let mut r = ParseResult::new(ParseStatus::ParseError, ContentKind::Image);
        r.page_count = 12;
        r.word_count = 9001;
        r.char_count = 54321;
        r.duration_secs = 3.5;
        r.wall_time_ms = 120.25;
        r.set_error_message("bad magic bytes");

        let bytes = *r.as_bytes();
        let r2 = ParseResult::from_bytes(&bytes);

        assert_eq!(r2.status(), ParseStatus::ParseError);
        assert_eq!(r2.content_kind(), ContentKind::Image);
        assert_eq!(r2.page_count, 12);
        assert_eq!(r2.word_count, 9001);
        assert_eq!(r2.char_count, 54321);
        assert_eq!(r2.duration_secs, 3.5);
        assert_eq!(r2.wall_time_ms, 120.25);
        assert_eq!(r2.error_message(), "bad magic bytes");
    }

    #[test]
    fn truncates_overlong_strings_and_keeps_null_terminator() {
        let mut r = ParseResult::new(ParseStatus::Ok, ContentKind::Pdf);
        r.set_title(&"x".repeat(400));
        assert_eq!(r.title().len(), 254);
    }

    #[test]
    fn retry_classification() {
        assert!(ParseStatus::Error.is_retryable());
        assert!(ParseStatus::OutOfMemory.is_retryable());
        assert!(!ParseStatus::FileNotFound.is_retryable());
        assert!(!ParseStatus::UnsupportedFormat.is_retryable());
        assert!(!ParseStatus::Ok.is_retryable());
    }
}
