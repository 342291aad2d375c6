//! Content kind tagging and the Content Dispatcher (spec §4 "Content
//! Dispatcher" / §3 "Content Kind").
//!
//! Three layers of classification exist and must agree: manifest-declared
//! `kind`, Conduit-detected magic bytes, and extension-based fallback. This
//! module owns the injective mapping to the small integer code shared across
//! the FFI boundary, and the extension-based fallback table. Magic-byte
//! detection itself lives in [crate::conduit], which is the preferred
//! classifier; [ContentKind::from_extension] is only consulted when no
//! Conduit result is available.
use std::path::Path;

/// Seven-variant content kind tag, injective with a small integer code used
/// across the FFI boundary (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ContentKind {
    Pdf = 0,
    Image = 1,
    Audio = 2,
    Video = 3,
    Epub = 4,
    GeoSpatial = 5,
    Unknown = 6,
}

impl ContentKind {
    pub const COUNT: usize = 7;

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> ContentKind {
        match code {
            0 => ContentKind::Pdf,
            1 => ContentKind::Image,
            2 => ContentKind::Audio,
            3 => ContentKind::Video,
            4 => ContentKind::Epub,
            5 => ContentKind::GeoSpatial,
            _ => ContentKind::Unknown,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ContentKind::Pdf => "pdf",
            ContentKind::Image => "image",
            ContentKind::Audio => "audio",
            ContentKind::Video => "video",
            ContentKind::Epub => "epub",
            ContentKind::GeoSpatial => "geospatial",
            ContentKind::Unknown => "unknown",
        }
    }

    /// Parse a manifest-declared `kind` field (NDJSON `kind` key), case
    /// insensitive.
    pub fn from_name(name: &str) -> Option<ContentKind> {
        match name.to_ascii_lowercase().as_str() {
            "pdf" => Some(ContentKind::Pdf),
            "image" => Some(ContentKind::Image),
            "audio" => Some(ContentKind::Audio),
            "video" => Some(ContentKind::Video),
            "epub" => Some(ContentKind::Epub),
            "geospatial" => Some(ContentKind::GeoSpatial),
            "unknown" => Some(ContentKind::Unknown),
            _ => None,
        }
    }

    /// Extension-based fallback classifier, used when no Conduit result
    /// (magic-byte inspection) is available for a path.
    pub fn from_extension(path: &Path) -> ContentKind {
        let ext = match path.extension().and_then(|e| e.to_str()) {
            Some(e) => e.to_ascii_lowercase(),
            None => return ContentKind::Unknown,
        };
        match ext.as_str() {
            "pdf" => ContentKind::Pdf,
            "png" | "jpg" | "jpeg" | "tif" | "tiff" | "bmp" | "webp" | "gif" => ContentKind::Image,
            "mp3" | "flac" | "wav" | "ogg" => ContentKind::Audio,
            "mp4" | "mov" | "m4v" | "mkv" | "avi" | "webm" => ContentKind::Video,
            "epub" => ContentKind::Epub,
            "shp" | "geojson" | "tif_geo" => ContentKind::GeoSpatial,
            _ => ContentKind::Unknown,
        }
    }
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_roundtrip_is_injective() {
        for code in 0..ContentKind::COUNT as u8 {
            let kind = ContentKind::from_code(code);
            assert_eq!(kind.code(), code);
        }
    }

    #[test]
    fn extension_fallback() {
        assert_eq!(
            ContentKind::from_extension(Path::new("a/b.pdf")),
            ContentKind::Pdf
        );
        assert_eq!(
            ContentKind::from_extension(Path::new("a/b.PNG")),
            ContentKind::Image
        );
        assert_eq!(
            ContentKind::from_extension(Path::new("a/b.xyz")),
            ContentKind::Unknown
        );
        assert_eq!(
            ContentKind::from_extension(Path::new("a/noext")),
            ContentKind::Unknown
        );
    }

    #[test]
    fn name_parse_roundtrip() {
        for code in 0..ContentKind::COUNT as u8 {
            let kind = ContentKind::from_code(code);
            assert_eq!(ContentKind::from_name(kind.name()), Some(kind));
        }
    }
}
