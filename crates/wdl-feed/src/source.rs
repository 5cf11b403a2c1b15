use std::collections::VecDeque;
use std::path::PathBuf;

use serde_json::Value;

use crate::{load_json_file, FeedError};

/// One raw snapshot document, as delivered.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedItem {
    /// 1-based position in the feed.
    pub index: usize,
    /// Where the document came from (file path, or a label).
    pub origin: String,
    pub payload: Value,
}

/// Ordered source of snapshot documents.
///
/// Documents must be consumed strictly in order; `None` marks the end of
/// the feed.
#[async_trait::async_trait]
pub trait SnapshotFeed: Send {
    fn source_name(&self) -> &'static str;

    async fn next_document(&mut self) -> Result<Option<FeedItem>, FeedError>;
}

/// Snapshot documents read from files, one file per snapshot, in list order.
///
/// Files are read lazily, so a missing later file only fails when reached.
#[derive(Debug, Clone)]
pub struct FileSnapshotFeed {
    paths: VecDeque<PathBuf>,
    delivered: usize,
}

impl FileSnapshotFeed {
    pub fn new<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
            delivered: 0,
        }
    }

    pub fn remaining(&self) -> usize {
        self.paths.len()
    }
}

#[async_trait::async_trait]
impl SnapshotFeed for FileSnapshotFeed {
    fn source_name(&self) -> &'static str {
        "files"
    }

    async fn next_document(&mut self) -> Result<Option<FeedItem>, FeedError> {
        let Some(path) = self.paths.pop_front() else {
            return Ok(None);
        };
        let payload = load_json_file(&path)?;
        self.delivered += 1;
        Ok(Some(FeedItem {
            index: self.delivered,
            origin: path.display().to_string(),
            payload,
        }))
    }
}

/// In-memory feed over already-decoded documents.
#[derive(Debug, Clone, Default)]
pub struct StaticSnapshotFeed {
    docs: VecDeque<Value>,
    delivered: usize,
}

impl StaticSnapshotFeed {
    pub fn new(docs: Vec<Value>) -> Self {
        Self {
            docs: docs.into(),
            delivered: 0,
        }
    }
}

#[async_trait::async_trait]
impl SnapshotFeed for StaticSnapshotFeed {
    fn source_name(&self) -> &'static str {
        "static"
    }

    async fn next_document(&mut self) -> Result<Option<FeedItem>, FeedError> {
        Ok(self.docs.pop_front().map(|payload| {
            self.delivered += 1;
            FeedItem {
                index: self.delivered,
                origin: format!("static#{}", self.delivered),
                payload,
            }
        }))
    }
}
