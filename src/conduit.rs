//! Conduit: single-pass preprocessing — validate, detect content kind,
//! hash (spec §4.3).
use std::fs::File;
use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::content_kind::ContentKind;
use crate::model::{ConduitResult, ValidationStatus};

const SNIFF_LEN: usize = 16;
const STREAM_CHUNK: usize = 8 * 1024;

/// Inspect up to the first 16 bytes of a file and classify it (spec
/// §4.3's magic-byte table). Falls back to [ContentKind::Unknown] when
/// nothing matches.
pub fn sniff_content_kind(header: &[u8]) -> ContentKind {
    if header.starts_with(b"%PDF") {
        return ContentKind::Pdf;
    }
    if header.starts_with(&[0x89, 0x50, 0x4E, 0x47]) // PNG
        || header.starts_with(&[0xFF, 0xD8, 0xFF]) // JPEG
        || header.starts_with(b"II*\0") // TIFF little-endian BOM
        || header.starts_with(b"MM\0*") // TIFF big-endian BOM
        || header.starts_with(&[0x42, 0x4D]) // BMP
        || (header.len() >= 12 && &header[0..4] == b"RIFF" && &header[8..12] == b"WEBP")
    {
        return ContentKind::Image;
    }
    if header.starts_with(b"ID3")
        || (header.len() >= 2 && header[0] == 0xFF && (header[1] & 0xE0) == 0xE0) // MPEG sync
        || header.starts_with(b"fLaC")
        || (header.len() >= 12 && &header[0..4] == b"RIFF" && &header[8..12] == b"WAVE")
        || header.starts_with(b"OggS")
    {
        return ContentKind::Audio;
    }
    if (header.len() >= 8 && &header[4..8] == b"ftyp")
        || header.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]) // EBML/Matroska/WebM
        || (header.len() >= 12 && &header[0..4] == b"RIFF" && &header[8..12] == b"AVI ")
    {
        return ContentKind::Video;
    }
    if header.starts_with(&[0x50, 0x4B, 0x03, 0x04]) {
        return ContentKind::Epub;
    }
    if header.starts_with(&[0x00, 0x00, 0x27, 0x0A]) {
        return ContentKind::GeoSpatial;
    }
    ContentKind::Unknown
}

/// Run the Conduit over a single file: open, stat, classify, hash.
/// One sequential scan, buffered in fixed ~8 KB chunks (spec §4.3).
pub fn run(path: &Path) -> ConduitResult {
    let mut file = match File::open(path) {
        Ok(f) => f,
        Err(_) => return ConduitResult::new(ContentKind::Unknown, ValidationStatus::NotFound, 0),
    };

    let file_size = match file.metadata() {
        Ok(meta) => meta.len(),
        Err(_) => return ConduitResult::new(ContentKind::Unknown, ValidationStatus::Unreadable, 0),
    };

    if file_size == 0 {
        return ConduitResult::new(ContentKind::Unknown, ValidationStatus::Empty, 0);
    }

    let mut header = [0u8; SNIFF_LEN];
    let read_n = match file.read(&mut header) {
        Ok(n) => n,
        Err(_) => return ConduitResult::new(ContentKind::Unknown, ValidationStatus::Unreadable, file_size),
    };
    let kind = sniff_content_kind(&header[..read_n]);

    if std::io::Seek::seek(&mut file, std::io::SeekFrom::Start(0)).is_err() {
        return ConduitResult::new(kind, ValidationStatus::Unreadable, file_size);
    }

    let mut hasher = Sha256::new();
    let mut buf = [0u8; STREAM_CHUNK];
    loop {
        let n = match file.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(_) => return ConduitResult::new(kind, ValidationStatus::Unreadable, file_size),
        };
        hasher.update(&buf[..n]);
    }
    let digest = hasher.finalize();
    let hex = hex_encode(&digest);

    let mut result = ConduitResult::new(kind, ValidationStatus::Ok, file_size);
    result.set_sha256_hex(&hex);
    result
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        write!(s, "{b:02x}").expect("writing to a String never fails");
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(bytes: &[u8]) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(bytes).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn sniffs_pdf_magic() {
        assert_eq!(sniff_content_kind(b"%PDF-1.4 rest"), ContentKind::Pdf);
    }

    #[test]
    fn sniffs_png_and_jpeg() {
        assert_eq!(
            sniff_content_kind(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A]),
            ContentKind::Image
        );
        assert_eq!(sniff_content_kind(&[0xFF, 0xD8, 0xFF, 0xE0]), ContentKind::Image);
    }

    #[test]
    fn sniffs_riff_containers_by_fourcc() {
        let mut wav = b"RIFF".to_vec();
        wav.extend_from_slice(&[0, 0, 0, 0]);
        wav.extend_from_slice(b"WAVE");
        assert_eq!(sniff_content_kind(&wav), ContentKind::Audio);

        let mut avi = b"RIFF".to_vec();
        avi.extend_from_slice(&[0, 0, 0, 0]);
        avi.extend_from_slice(b"AVI ");
        assert_eq!(sniff_content_kind(&avi), ContentKind::Video);

        let mut webp = b"RIFF".to_vec();
        webp.extend_from_slice(&[0, 0, 0, 0]);
        webp.extend_from_slice(b"WEBP");
        assert_eq!(sniff_content_kind(&webp), ContentKind::Image);
    }

    #[test]
    fn sniffs_epub_zip_heuristic_and_geospatial() {
        assert_eq!(sniff_content_kind(&[0x50, 0x4B, 0x03, 0x04]), ContentKind::Epub);
        assert_eq!(
            sniff_content_kind(&[0x00, 0x00, 0x27, 0x0A]),
            ContentKind::GeoSpatial
        );
    }

    #[test]
    fn unknown_header_falls_through() {
        assert_eq!(sniff_content_kind(b"not a known format"), ContentKind::Unknown);
    }

    #[test]
    fn missing_file_is_not_found() {
        let result = run(Path::new("/nonexistent/path/for/sure/docudactyl-test"));
        assert_eq!(result.validation(), ValidationStatus::NotFound);
    }

    #[test]
    fn empty_file_is_empty() {
        let f = write_temp(b"");
        let result = run(f.path());
        assert_eq!(result.validation(), ValidationStatus::Empty);
    }

    #[test]
    fn happy_path_hashes_and_classifies() {
        let f = write_temp(b"%PDF-1.4\n...rest of a fake pdf body...");
        let result = run(f.path());
        assert_eq!(result.validation(), ValidationStatus::Ok);
        assert_eq!(result.content_kind(), ContentKind::Pdf);
        assert_eq!(result.sha256_hex().len(), 64);
        assert!(result.file_size > 0);
    }

    #[test]
    fn hash_is_stable_across_repeated_runs() {
        let f = write_temp(b"deterministic content");
        let r1 = run(f.path());
        let r2 = run(f.path());
        assert_eq!(r1.sha256_hex(), r2.sha256_hex());
    }
}
