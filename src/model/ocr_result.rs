//! The 48-byte flat OCR Batch Result (spec §3 / §4.7).
use static_assertions::const_assert_eq;
use std::mem::size_of;

pub const OCR_RESULT_SIZE: usize = 48;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OcrStatus {
    Ok = 0,
    Error = 1,
    Skipped = 2,
    /// Signals the caller to fall back to CPU OCR for this image — not a
    /// failure (spec §4.7).
    GpuErrorFallback = 3,
}

impl OcrStatus {
    pub fn from_code(code: u8) -> OcrStatus {
        match code {
            0 => OcrStatus::Ok,
            1 => OcrStatus::Error,
            2 => OcrStatus::Skipped,
            _ => OcrStatus::GpuErrorFallback,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct OcrBatchResult {
    pub status: u8,
    /// Confidence 0-100, or -1 when not applicable.
    pub confidence: i8,
    _pad0: [u8; 6],
    pub char_count: u64,
    pub word_count: u64,
    pub gpu_time_us: u64,
    pub region_offset: u32,
    pub region_length: u32,
    _pad_tail: [u8; 8],
}

const_assert_eq!(size_of::<OcrBatchResult>(), OCR_RESULT_SIZE);

impl OcrBatchResult {
    pub fn new(status: OcrStatus) -> OcrBatchResult {
        OcrBatchResult {
            status: status as u8,
            confidence: -1,
            _pad0: [0; 6],
            char_count: 0,
            word_count: 0,
            gpu_time_us: 0,
            region_offset: 0,
            region_length: 0,
            _pad_tail: [0; 8],
        }
    }

    pub fn status(&self) -> OcrStatus {
        OcrStatus::from_code(self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_is_48_bytes() {
        assert_eq!(size_of::<OcrBatchResult>(), 48);
    }

    #[test]
    fn default_confidence_is_sentinel() {
        let r = OcrBatchResult::new(OcrStatus::Skipped);
        assert_eq!(r.confidence, -1);
        assert_eq!(r.status(), OcrStatus::Skipped);
    }
}
