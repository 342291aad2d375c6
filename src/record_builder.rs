//! Binary Record Builder: single-segment wire message builder over a
//! caller-provided, append-only buffer (spec §4.10).
//!
//! Offsets are always 8-byte aligned. Pointer words hold a *signed* word
//! offset relative to the pointer's own position + 1 — the same
//! convention Cap'n Proto uses for its far pointers, chosen here because
//! it lets a reader walk the message without knowing the writer's total
//! length up front.
use byteorder::{ByteOrder, LittleEndian};
use std::io::{self, Write};

/// Root struct layout: `data_words` 8-byte data words, followed by
/// `ptr_words` 8-byte pointer words.
pub struct RecordBuilder {
    buf: Vec<u8>,
    data_words: usize,
    ptr_words: usize,
}

fn align8(n: usize) -> usize {
    (n + 7) & !7
}

impl RecordBuilder {
    /// Zero the buffer and reserve the root layout.
    pub fn init(data_words: usize, ptr_words: usize) -> RecordBuilder {
        let root_bytes = (data_words + ptr_words) * 8;
        RecordBuilder {
            buf: vec![0u8; root_bytes],
            data_words,
            ptr_words,
        }
    }

    fn ptr_section_start(&self) -> usize {
        self.data_words * 8
    }

    fn check_data_offset(&self, offset: usize, width: usize) {
        assert!(
            offset + width <= self.data_words * 8,
            "data write at byte {offset} (width {width}) overruns the {}-word data section",
            self.data_words
        );
    }

    pub fn set_u8(&mut self, offset: usize, value: u8) {
        self.check_data_offset(offset, 1);
        self.buf[offset] = value;
    }

    pub fn set_i8(&mut self, offset: usize, value: i8) {
        self.set_u8(offset, value as u8);
    }

    pub fn set_u32(&mut self, offset: usize, value: u32) {
        self.check_data_offset(offset, 4);
        LittleEndian::write_u32(&mut self.buf[offset..offset + 4], value);
    }

    pub fn set_u64(&mut self, offset: usize, value: u64) {
        self.check_data_offset(offset, 8);
        LittleEndian::write_u64(&mut self.buf[offset..offset + 8], value);
    }

    pub fn set_f64(&mut self, offset: usize, value: f64) {
        self.check_data_offset(offset, 8);
        LittleEndian::write_f64(&mut self.buf[offset..offset + 8], value);
    }

    fn pad_to_word_boundary(&mut self) {
        let padded = align8(self.buf.len());
        self.buf.resize(padded, 0);
    }

    fn current_word(&self) -> usize {
        debug_assert_eq!(self.buf.len() % 8, 0);
        self.buf.len() / 8
    }

    fn write_pointer(&mut self, ptr_index: usize, target_word: usize) {
        assert!(ptr_index < self.ptr_words, "pointer index out of range");
        let ptr_byte_offset = self.ptr_section_start() + ptr_index * 8;
        let ptr_word_index = ptr_byte_offset / 8;
        let offset_words = target_word as i64 - (ptr_word_index as i64 + 1);
        LittleEndian::write_i64(&mut self.buf[ptr_byte_offset..ptr_byte_offset + 8], offset_words);
    }

    /// Allocate a `[len:u32][bytes...][nul]` blob at the end of the
    /// buffer and point `ptr_index` at it.
    pub fn set_text(&mut self, ptr_index: usize, text: &str) {
        self.pad_to_word_boundary();
        let target_word = self.current_word();

        let bytes = text.as_bytes();
        let mut blob = Vec::with_capacity(4 + bytes.len() + 1);
        blob.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
        blob.extend_from_slice(bytes);
        blob.push(0);
        self.buf.extend_from_slice(&blob);
        self.pad_to_word_boundary();

        self.write_pointer(ptr_index, target_word);
    }

    /// Allocate `[count:u32][pad][ptr_0..ptr_count-1]` then emit each
    /// string's blob after the slot array, linking each slot.
    pub fn set_text_list(&mut self, ptr_index: usize, items: &[String]) {
        self.pad_to_word_boundary();
        let list_word = self.current_word();

        self.buf.extend_from_slice(&(items.len() as u32).to_le_bytes());
        self.buf.extend_from_slice(&[0u8; 4]);
        self.pad_to_word_boundary();

        let slot_section_start_word = self.current_word();
        // Reserve one pointer-sized slot per item.
        self.buf.resize(self.buf.len() + items.len() * 8, 0);

        for (i, item) in items.iter().enumerate() {
            self.pad_to_word_boundary();
            let target_word = self.current_word();
            let bytes = item.as_bytes();
            self.buf.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
            self.buf.extend_from_slice(bytes);
            self.buf.push(0);
            self.pad_to_word_boundary();

            let slot_word_index = slot_section_start_word + i;
            let slot_byte_offset = slot_word_index * 8;
            let offset_words = target_word as i64 - (slot_word_index as i64 + 1);
            LittleEndian::write_i64(
                &mut self.buf[slot_byte_offset..slot_byte_offset + 8],
                offset_words,
            );
        }

        self.write_pointer(ptr_index, list_word);
    }

    /// Reserve a composite list of `count` elements, each with its own
    /// `data_words`/`ptr_words`, and link `ptr_index` at it. Returns a
    /// handle for per-element setters.
    pub fn alloc_composite_list(
        &mut self,
        ptr_index: usize,
        count: usize,
        data_words: usize,
        ptr_words: usize,
    ) -> CompositeListHandle {
        self.pad_to_word_boundary();
        let tag_word = self.current_word();

        // Tag word: count (u32) | data_words (u8) | ptr_words (u8) | reserved (u16).
        self.buf.extend_from_slice(&(count as u32).to_le_bytes());
        self.buf.push(data_words as u8);
        self.buf.push(ptr_words as u8);
        self.buf.extend_from_slice(&[0u8; 2]);

        let element_stride_words = data_words + ptr_words;
        let elements_start_word = self.current_word();
        self.buf
            .resize(self.buf.len() + count * element_stride_words * 8, 0);

        self.write_pointer(ptr_index, tag_word);

        CompositeListHandle {
            elements_start_byte: elements_start_word * 8,
            element_stride_bytes: element_stride_words * 8,
            data_words,
            count,
        }
    }

    pub fn element_offset(handle: &CompositeListHandle, index: usize, field_byte_offset: usize) -> usize {
        assert!(index < handle.count, "composite list element index out of range");
        assert!(
            field_byte_offset < handle.data_words * 8,
            "composite list field offset overruns element data section"
        );
        handle.elements_start_byte + index * handle.element_stride_bytes + field_byte_offset
    }

    /// Emit the canonical message: a 16-byte header (segment count, word
    /// count of the single segment, reserved padding) followed by the
    /// segment bytes, themselves already 8-byte aligned.
    pub fn write_message<W: Write>(&self, sink: &mut W) -> io::Result<()> {
        debug_assert_eq!(self.buf.len() % 8, 0);
        let mut header = [0u8; 16];
        LittleEndian::write_u32(&mut header[0..4], 1); // segment count
        LittleEndian::write_u32(&mut header[4..8], (self.buf.len() / 8) as u32);
        sink.write_all(&header)?;
        sink.write_all(&self.buf)
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

pub struct CompositeListHandle {
    elements_start_byte: usize,
    element_stride_bytes: usize,
    data_words: usize,
    pub count: usize,
}
