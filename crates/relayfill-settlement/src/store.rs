//! Durable backing for the replay guard.
//!
//! A replay store is an append-only log of consumed order ids. The guard
//! loads it once at startup and appends to it when a settlement commits.
//! Nothing is ever removed.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use relayfill_types::{OrderId, RelayError, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Append-only persistence for consumed order ids.
pub trait ReplayStore: Send {
    /// Every id appended so far, oldest first.
    fn load(&mut self) -> Result<Vec<OrderId>>;

    /// Durably record `id` as consumed.
    fn append(&mut self, id: OrderId) -> Result<()>;
}

/// Process-local store. Consumed ids are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryReplayStore {
    ids: Vec<OrderId>,
}

impl MemoryReplayStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReplayStore for MemoryReplayStore {
    fn load(&mut self) -> Result<Vec<OrderId>> {
        Ok(self.ids.clone())
    }

    fn append(&mut self, id: OrderId) -> Result<()> {
        self.ids.push(id);
        Ok(())
    }
}

/// One line of the replay file.
#[derive(Debug, Serialize, Deserialize)]
struct ReplayRecord {
    order_id: String,
    consumed_at: DateTime<Utc>,
}

/// JSON-lines file store, one consumed order per line.
///
/// Each append is flushed and synced before it returns, so a committed
/// settlement survives a crash. A record is only complete once its newline
/// is on disk: an unterminated last line left by a torn write is discarded
/// on load, while a malformed terminated line is a hard error.
#[derive(Debug)]
pub struct FileReplayStore {
    path: PathBuf,
    file: File,
}

impl FileReplayStore {
    /// Open (creating if needed) the replay file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)?;
        Ok(Self { path, file })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn truncate_to(&self, len: u64) -> Result<()> {
        self.file
            .set_len(len)
            .and_then(|()| self.file.sync_data())
            .map_err(|e| RelayError::Storage(format!("{}: {e}", self.path.display())))
    }
}

impl ReplayStore for FileReplayStore {
    fn load(&mut self) -> Result<Vec<OrderId>> {
        let bytes = std::fs::read(&self.path)?;
        let complete = bytes.iter().rposition(|b| *b == b'\n').map_or(0, |i| i + 1);
        if complete < bytes.len() {
            warn!(
                path = %self.path.display(),
                discarded = bytes.len() - complete,
                "Dropping unterminated replay record"
            );
            self.truncate_to(complete as u64)?;
        }

        let text = std::str::from_utf8(&bytes[..complete]).map_err(|e| {
            RelayError::Storage(format!("{}: replay file is not UTF-8: {e}", self.path.display()))
        })?;
        let mut ids = Vec::new();
        for (index, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let record: ReplayRecord = serde_json::from_str(line).map_err(|e| {
                RelayError::Storage(format!(
                    "{}:{}: malformed replay record: {e}",
                    self.path.display(),
                    index + 1
                ))
            })?;
            let id = OrderId::from_hex(&record.order_id).ok_or_else(|| {
                RelayError::Storage(format!(
                    "{}:{}: bad order id {:?}",
                    self.path.display(),
                    index + 1,
                    record.order_id
                ))
            })?;
            ids.push(id);
        }
        Ok(ids)
    }

    fn append(&mut self, id: OrderId) -> Result<()> {
        let record = ReplayRecord {
            order_id: id.to_string(),
            consumed_at: Utc::now(),
        };
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');
        let len = self.file.metadata()?.len();
        let written = self
            .file
            .write_all(line.as_bytes())
            .and_then(|()| self.file.flush())
            .and_then(|()| self.file.sync_data());
        if let Err(e) = written {
            if let Err(undo) = self.truncate_to(len) {
                warn!(path = %self.path.display(), error = %undo, "Could not drop partial replay record");
            }
            return Err(RelayError::Storage(format!("{}: {e}", self.path.display())));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(b: u8) -> OrderId {
        OrderId([b; 32])
    }

    #[test]
    fn memory_store_keeps_order() {
        let mut store = MemoryReplayStore::new();
        store.append(id(1)).unwrap();
        store.append(id(2)).unwrap();
        assert_eq!(store.load().unwrap(), vec![id(1), id(2)]);
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("replay").join("consumed.jsonl");
        {
            let mut store = FileReplayStore::open(&path).unwrap();
            assert!(store.load().unwrap().is_empty());
            store.append(id(7)).unwrap();
            store.append(id(9)).unwrap();
        }
        let mut reopened = FileReplayStore::open(&path).unwrap();
        assert_eq!(reopened.load().unwrap(), vec![id(7), id(9)]);
    }

    #[test]
    fn file_lines_are_json_with_hex_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("consumed.jsonl");
        let mut store = FileReplayStore::open(&path).unwrap();
        store.append(id(0xab)).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(content.trim()).unwrap();
        assert_eq!(value["order_id"], format!("0x{}", "ab".repeat(32)));
        assert!(value["consumed_at"].is_string());
    }

    #[test]
    fn corrupt_line_is_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("consumed.jsonl");
        std::fs::write(&path, "{\"order_id\":\"0x1234\",\"consumed_at\":\"2026-01-01T00:00:00Z\"}\n")
            .unwrap();
        let mut store = FileReplayStore::open(&path).unwrap();
        let err = store.load().unwrap_err();
        assert!(matches!(err, RelayError::Storage(ref msg) if msg.contains(":1:")));
    }

    #[test]
    fn torn_last_line_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("consumed.jsonl");
        {
            let mut store = FileReplayStore::open(&path).unwrap();
            store.append(id(8)).unwrap();
        }
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"{\"order_id\":\"0x0808").unwrap();
        drop(file);

        let mut store = FileReplayStore::open(&path).unwrap();
        assert_eq!(store.load().unwrap(), vec![id(8)]);
        assert!(std::fs::read_to_string(&path).unwrap().ends_with('\n'));

        store.append(id(9)).unwrap();
        let mut reopened = FileReplayStore::open(&path).unwrap();
        assert_eq!(reopened.load().unwrap(), vec![id(8), id(9)]);
    }

    #[test]
    fn malformed_line_before_tail_is_still_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("consumed.jsonl");
        std::fs::write(&path, "not json\n{\"order_id\":").unwrap();
        let mut store = FileReplayStore::open(&path).unwrap();
        let err = store.load().unwrap_err();
        assert!(matches!(err, RelayError::Storage(ref msg) if msg.contains(":1:")));
    }
}
