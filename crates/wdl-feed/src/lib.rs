//! wdl-feed
//!
//! Inputs to a ledger run: the ordered snapshot documents and the address
//! directory. This crate only reads and decodes JSON; it does not validate
//! observations (that belongs to the reconciler's snapshot adapter) and it
//! never touches the store.

mod directory;
mod source;

pub use directory::{load_directory, parse_directory};
pub use source::{FeedItem, FileSnapshotFeed, SnapshotFeed, StaticSnapshotFeed};

use std::fmt;
use std::fs;
use std::path::Path;

use serde_json::Value;

/// Errors raised while reading feed inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedError {
    /// File could not be read.
    Io { path: String, message: String },
    /// Bytes were not UTF-8 JSON.
    Decode { path: String, message: String },
    /// JSON was valid but not the expected shape.
    Shape { path: String, message: String },
}

impl fmt::Display for FeedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedError::Io { path, message } => write!(f, "feed read failed ({path}): {message}"),
            FeedError::Decode { path, message } => {
                write!(f, "feed decode failed ({path}): {message}")
            }
            FeedError::Shape { path, message } => {
                write!(f, "feed document has wrong shape ({path}): {message}")
            }
        }
    }
}

impl std::error::Error for FeedError {}

/// Read a JSON document from disk.
///
/// A leading UTF-8 BOM and surrounding whitespace are ignored; wallet dumps
/// produced on Windows commonly carry both.
pub fn load_json_file(path: &Path) -> Result<Value, FeedError> {
    let shown = path.display().to_string();
    let bytes = fs::read(path).map_err(|e| FeedError::Io {
        path: shown.clone(),
        message: e.to_string(),
    })?;
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(&bytes);

    let raw = std::str::from_utf8(bytes).map_err(|e| FeedError::Decode {
        path: shown.clone(),
        message: format!("not UTF-8 text: {e}"),
    })?;

    serde_json::from_str(raw.trim()).map_err(|e| FeedError::Decode {
        path: shown,
        message: e.to_string(),
    })
}
