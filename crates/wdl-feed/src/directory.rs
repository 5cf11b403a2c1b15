use std::path::Path;

use serde_json::Value;
use wdl_schemas::DirectoryEntry;

use crate::{load_json_file, FeedError};

/// Load the `[{name, address}, ...]` directory file.
pub fn load_directory(path: &Path) -> Result<Vec<DirectoryEntry>, FeedError> {
    let v = load_json_file(path)?;
    parse_directory(&v).map_err(|message| FeedError::Shape {
        path: path.display().to_string(),
        message,
    })
}

/// Entry order is kept; repeated addresses are allowed.
pub fn parse_directory(v: &Value) -> Result<Vec<DirectoryEntry>, String> {
    let items = v
        .as_array()
        .ok_or_else(|| "directory must be a JSON array".to_string())?;

    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            serde_json::from_value::<DirectoryEntry>(item.clone())
                .map_err(|e| format!("entry {i}: {e}"))
        })
        .collect()
}
