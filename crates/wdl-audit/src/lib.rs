//! Append-only run journal (JSON Lines).
//!
//! Every line is one [`JournalEntry`] serialized with keys sorted. With the
//! hash chain enabled each entry carries `hash_prev` (the previous line's
//! `hash_self`) and `hash_self` (SHA-256 over the entry's canonical JSON with
//! `hash_self` cleared). Editing, dropping, or reordering a line breaks the
//! chain at that line.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use wdl_reconcile::{AggregateResult, RejectedObservation, SnapshotReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JournalEventKind {
    SnapshotApplied,
    ObservationRejected,
    AggregateComputed,
}

impl JournalEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JournalEventKind::SnapshotApplied => "SNAPSHOT_APPLIED",
            JournalEventKind::ObservationRejected => "OBSERVATION_REJECTED",
            JournalEventKind::AggregateComputed => "AGGREGATE_COMPUTED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub entry_id: Uuid,
    pub run_id: Uuid,
    /// Position in the file, from 0. Continues across runs sharing a file.
    pub seq: u64,
    pub ts_utc: DateTime<Utc>,
    pub kind: String,
    /// 1-based snapshot position, when the event belongs to one.
    pub snapshot_index: Option<usize>,
    pub payload: Value,
    pub hash_prev: Option<String>,
    pub hash_self: Option<String>,
}

pub struct RunJournal {
    path: PathBuf,
    run_id: Uuid,
    hash_chain: bool,
    last_hash: Option<String>,
    seq: u64,
}

impl RunJournal {
    /// Open (or create) a journal file for `run_id`.
    ///
    /// An existing file is appended to: the chain resumes from its last
    /// entry so one file can hold several runs and still verify end to end.
    pub fn open(path: impl AsRef<Path>, run_id: Uuid, hash_chain: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| format!("create_dir_all {:?}", parent))?;
        }

        let (seq, last_hash) = if path.exists() {
            resume_point(&path)?
        } else {
            (0, None)
        };

        Ok(Self {
            path,
            run_id,
            hash_chain,
            last_hash,
            seq,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Number of entries in the file so far (this run and earlier ones).
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn last_hash(&self) -> Option<&str> {
        self.last_hash.as_deref()
    }

    pub fn record(
        &mut self,
        kind: JournalEventKind,
        snapshot_index: Option<usize>,
        payload: Value,
    ) -> Result<JournalEntry> {
        let entry_id = derive_entry_id(self.run_id, self.seq, self.last_hash.as_deref());

        let mut entry = JournalEntry {
            entry_id,
            run_id: self.run_id,
            seq: self.seq,
            ts_utc: Utc::now(),
            kind: kind.as_str().to_string(),
            snapshot_index,
            payload,
            hash_prev: None,
            hash_self: None,
        };

        if self.hash_chain {
            entry.hash_prev = self.last_hash.clone();
            let h = compute_entry_hash(&entry)?;
            entry.hash_self = Some(h.clone());
            self.last_hash = Some(h);
        }

        append_line(&self.path, &canonical_json_line(&entry)?)?;
        self.seq += 1;
        Ok(entry)
    }

    pub fn snapshot_applied(&mut self, index: usize, report: &SnapshotReport) -> Result<JournalEntry> {
        let payload = serde_json::json!({
            "observed": report.observed,
            "pending_before": report.pending_before,
            "advanced": report.advanced,
            "aged_out": report.aged_out,
            "conflicted_held": report.conflicted_held,
            "inserted": report.inserted,
            "updated": report.updated,
            "duplicate": report.duplicate,
            "superseded": report.superseded,
            "rejected": report.rejected.len(),
        });
        self.record(JournalEventKind::SnapshotApplied, Some(index), payload)
    }

    pub fn observation_rejected(
        &mut self,
        index: usize,
        rejected: &RejectedObservation,
    ) -> Result<JournalEntry> {
        let payload = serde_json::to_value(rejected).context("serialize rejected observation")?;
        self.record(JournalEventKind::ObservationRejected, Some(index), payload)
    }

    pub fn aggregate_computed(&mut self, result: &AggregateResult) -> Result<JournalEntry> {
        let payload = serde_json::to_value(result).context("serialize aggregate result")?;
        self.record(JournalEventKind::AggregateComputed, None, payload)
    }
}

fn derive_entry_id(run_id: Uuid, seq: u64, prev: Option<&str>) -> Uuid {
    let name = format!("{seq}:{}", prev.unwrap_or("GENESIS"));
    Uuid::new_v5(&run_id, name.as_bytes())
}

fn resume_point(path: &Path) -> Result<(u64, Option<String>)> {
    let content =
        fs::read_to_string(path).with_context(|| format!("read journal {:?}", path))?;
    let mut seq = 0u64;
    let mut last_hash = None;
    for (i, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let entry: JournalEntry = serde_json::from_str(trimmed)
            .with_context(|| format!("parse journal entry at line {}", i + 1))?;
        seq += 1;
        last_hash = entry.hash_self;
    }
    Ok((seq, last_hash))
}

fn append_line(path: &Path, line: &str) -> Result<()> {
    let mut f = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open journal {:?}", path))?;
    f.write_all(line.as_bytes())
        .and_then(|_| f.write_all(b"\n"))
        .context("write journal line failed")?;
    Ok(())
}

fn canonical_json_line<T: Serialize>(v: &T) -> Result<String> {
    let raw = serde_json::to_value(v).context("serialize journal entry failed")?;
    serde_json::to_string(&sort_keys(&raw)).context("json stringify failed")
}

fn sort_keys(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = serde_json::Map::new();
            for k in keys {
                out.insert(k.clone(), sort_keys(&map[k]));
            }
            Value::Object(out)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_keys).collect()),
        _ => v.clone(),
    }
}

/// SHA-256 over the canonical entry with `hash_self` cleared.
pub fn compute_entry_hash(entry: &JournalEntry) -> Result<String> {
    let mut clone = entry.clone();
    clone.hash_self = None;
    let canonical = canonical_json_line(&clone)?;
    Ok(hex::encode(Sha256::digest(canonical.as_bytes())))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyResult {
    Valid { lines: usize },
    Broken { line: usize, reason: String },
}

impl VerifyResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, VerifyResult::Valid { .. })
    }
}

pub fn verify_chain(path: impl AsRef<Path>) -> Result<VerifyResult> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("read journal {:?}", path.as_ref()))?;
    verify_chain_str(&content)
}

/// Line numbers in `Broken` are 1-based file lines.
pub fn verify_chain_str(content: &str) -> Result<VerifyResult> {
    let mut prev_hash: Option<String> = None;
    let mut count = 0usize;

    for (i, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let entry: JournalEntry = match serde_json::from_str(trimmed) {
            Ok(e) => e,
            Err(e) => {
                return Ok(VerifyResult::Broken {
                    line: i + 1,
                    reason: format!("unparseable entry: {e}"),
                })
            }
        };

        if entry.seq != count as u64 {
            return Ok(VerifyResult::Broken {
                line: i + 1,
                reason: format!("seq mismatch: expected {count}, got {}", entry.seq),
            });
        }
        count += 1;

        if entry.hash_prev != prev_hash {
            return Ok(VerifyResult::Broken {
                line: i + 1,
                reason: format!(
                    "hash_prev mismatch: expected {:?}, got {:?}",
                    prev_hash, entry.hash_prev
                ),
            });
        }

        if let Some(claimed) = &entry.hash_self {
            let recomputed = compute_entry_hash(&entry)?;
            if *claimed != recomputed {
                return Ok(VerifyResult::Broken {
                    line: i + 1,
                    reason: format!("hash_self mismatch: claimed {claimed}, recomputed {recomputed}"),
                });
            }
        }

        prev_hash = entry.hash_self;
    }

    Ok(VerifyResult::Valid { lines: count })
}
