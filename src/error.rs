//! Crate-wide error type.
//!
//! Subsystem failures (cache, prefetch, GPU OCR) are caught at their call
//! site and logged rather than propagated — see [crate::fault_handler] and
//! the cache modules. [Error] only surfaces conditions that are fatal to a
//! run: bad configuration, I/O failures while setting up subsystems, and
//! the abort latch.
use std::fmt;

#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    Json(serde_json::Error),
    /// Bad configuration: unparsable bitmask, unsupported output format, ...
    Config(String),
    /// A subsystem failed to initialise. The run can still proceed without
    /// it (see spec §7), but construction-time failures that the caller
    /// chose not to ignore are surfaced here.
    Subsystem(String),
    Custom(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "io error: {e}"),
            Error::Json(e) => write!(f, "json error: {e}"),
            Error::Config(s) => write!(f, "configuration error: {s}"),
            Error::Subsystem(s) => write!(f, "subsystem error: {s}"),
            Error::Custom(s) => write!(f, "{s}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Error {
        Error::Io(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Error {
        Error::Json(e)
    }
}

impl From<String> for Error {
    fn from(s: String) -> Error {
        Error::Custom(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Error {
        Error::Custom(s.to_string())
    }
}
