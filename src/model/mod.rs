//! Flat, fixed-size records that cross subsystem and FFI boundaries.
//!
//! These are the binary contracts described in spec §3: changing their size
//! or field order is a breaking change (see [parse_result::ParseResult]'s
//! compile-time size assertion).
pub mod conduit_result;
pub mod document_entry;
pub mod ocr_result;
pub mod parse_result;

pub use conduit_result::{ConduitResult, ValidationStatus};
pub use document_entry::DocumentEntry;
pub use ocr_result::{OcrBatchResult, OcrStatus};
pub use parse_result::{ParseResult, ParseStatus};
