//! Per-page, hash-chained operation log.
//!
//! Every page has a `<pageId>.oplog` file next to its JSON file. Each line is
//! one [`OplogEntry`]; the `prevHash` of every entry equals the
//! `contentHash` of the entry before it, and the first entry points at
//! [`GENESIS`]. Lines are only ever appended.

use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::hash::{content_hash, GENESIS};
use crate::core::page::PageContent;
use crate::{NousError, Result};

/// Kind of page mutation an entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpType {
    Create,
    Modify,
    Delete,
    Restore,
}

/// Kind of change to a single block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockOp {
    Insert,
    Modify,
    Delete,
    Move,
}

/// One block-level change within an entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockChange {
    pub block_id: String,
    pub op: BlockOp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_type: Option<String>,
    /// Predecessor in the new block order, for inserts and moves. `None`
    /// means the block is first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after_block_id: Option<String>,
}

/// One line of a page's oplog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OplogEntry {
    #[serde(with = "ts_micros")]
    pub ts: DateTime<Utc>,
    pub client_id: String,
    pub op: OpType,
    /// Hash of the page content after this entry was applied.
    pub content_hash: String,
    pub prev_hash: String,
    #[serde(default)]
    pub block_changes: Vec<BlockChange>,
    /// Number of blocks in the page after this entry was applied.
    pub block_count: usize,
}

impl OplogEntry {
    /// Builds an entry for `content` chained after `prev_hash`.
    ///
    /// # Errors
    ///
    /// Returns [`NousError::Json`] if the content cannot be hashed.
    pub fn new(
        client_id: &str,
        op: OpType,
        content: &PageContent,
        prev_hash: String,
        block_changes: Vec<BlockChange>,
    ) -> Result<Self> {
        Ok(Self {
            ts: Utc::now(),
            client_id: client_id.to_string(),
            op,
            content_hash: content_hash(content)?,
            prev_hash,
            block_changes,
            block_count: content.blocks.len(),
        })
    }
}

/// Timestamps are written as RFC 3339 with microseconds and a `Z` suffix;
/// any RFC 3339 offset is accepted on read.
mod ts_micros {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Micros, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

/// The first link in a history where `prevHash` does not match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainBreak {
    pub index: usize,
    pub expected: String,
    pub found: String,
}

/// Walks `entries` from the start and checks every `prevHash` link.
///
/// # Errors
///
/// Returns the first [`ChainBreak`].
pub fn verify_chain(entries: &[OplogEntry]) -> std::result::Result<(), ChainBreak> {
    let mut expected: &str = GENESIS;
    for (index, entry) in entries.iter().enumerate() {
        if entry.prev_hash != expected {
            return Err(ChainBreak {
                index,
                expected: expected.to_string(),
                found: entry.prev_hash.clone(),
            });
        }
        expected = entry.content_hash.as_str();
    }
    Ok(())
}

/// Result of checking a page history against the page on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum HistoryStatus {
    /// No entries recorded yet.
    Empty,
    /// Every link holds and the head hash matches the stored content.
    Intact { entries: usize, head: String },
    /// A `prevHash` does not match its predecessor.
    #[serde(rename_all = "camelCase")]
    BrokenLink { entries: usize, at: ChainBreak },
    /// The chain is sound but the stored content is not what the last entry
    /// recorded: a lost update or a write outside the store.
    #[serde(rename_all = "camelCase")]
    HeadMismatch {
        entries: usize,
        recorded: String,
        actual: String,
    },
}

impl HistoryStatus {
    pub fn is_intact(&self) -> bool {
        matches!(self, Self::Intact { .. } | Self::Empty)
    }
}

/// Handle on one page's oplog file.
#[derive(Debug, Clone)]
pub struct Oplog {
    path: PathBuf,
}

impl Oplog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Opens the file for reading, `None` if it does not exist yet.
    fn open(&self) -> Result<Option<BufReader<File>>> {
        match File::open(&self.path) {
            Ok(f) => Ok(Some(BufReader::new(f))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Calls `visit` with every well-formed entry in file order. Blank lines
    /// are ignored; malformed lines are logged and skipped.
    fn scan(&self, mut visit: impl FnMut(OplogEntry)) -> Result<()> {
        let Some(reader) = self.open()? else {
            return Ok(());
        };
        for (line_no, line) in reader.lines().enumerate() {
            let line = match line {
                Ok(line) => line,
                Err(e) if e.kind() == ErrorKind::InvalidData => {
                    log::warn!("skipping undecodable line {} of {}", line_no + 1, self.path.display());
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<OplogEntry>(trimmed) {
                Ok(entry) => visit(entry),
                Err(e) => log::warn!(
                    "skipping malformed line {} of {}: {e}",
                    line_no + 1,
                    self.path.display()
                ),
            }
        }
        Ok(())
    }

    /// All readable entries in chronological order.
    ///
    /// # Errors
    ///
    /// Returns [`NousError::Io`] if the file exists but cannot be read.
    pub fn entries(&self) -> Result<Vec<OplogEntry>> {
        let mut entries = Vec::new();
        self.scan(|e| entries.push(e))?;
        Ok(entries)
    }

    /// The last `n` readable entries, oldest first.
    pub fn last_n(&self, n: usize) -> Result<Vec<OplogEntry>> {
        let mut ring = VecDeque::with_capacity(n);
        if n == 0 {
            return Ok(Vec::new());
        }
        self.scan(|e| {
            if ring.len() == n {
                ring.pop_front();
            }
            ring.push_back(e);
        })?;
        Ok(ring.into())
    }

    /// `contentHash` of the last readable entry, or [`GENESIS`].
    pub fn last_hash(&self) -> Result<String> {
        let mut last = GENESIS.to_string();
        self.scan(|e| last = e.content_hash)?;
        Ok(last)
    }

    /// Appends `entry` as a single line with one write.
    ///
    /// # Errors
    ///
    /// Returns [`NousError::Io`] if the file cannot be opened or written.
    pub fn append(&self, entry: &OplogEntry) -> Result<()> {
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    /// Chains a new entry for `content` after the current head and appends it.
    ///
    /// When `expected_prev` is given, the current head must equal it;
    /// otherwise another writer has journaled in between and the call fails
    /// without writing.
    ///
    /// # Errors
    ///
    /// Returns [`NousError::Conflict`] on a head mismatch, or
    /// [`NousError::Io`] if the file cannot be read or written.
    pub fn record(
        &self,
        client_id: &str,
        op: OpType,
        content: &PageContent,
        block_changes: Vec<BlockChange>,
        expected_prev: Option<&str>,
    ) -> Result<OplogEntry> {
        let prev_hash = self.last_hash()?;
        if let Some(expected) = expected_prev {
            if expected != prev_hash {
                return Err(NousError::Conflict(format!(
                    "history head of {} is {prev_hash}, expected {expected}",
                    self.path.display()
                )));
            }
        }
        let entry = OplogEntry::new(client_id, op, content, prev_hash, block_changes)?;
        self.append(&entry)?;
        Ok(entry)
    }

    /// Checks the chain links and compares the head with `current` content.
    pub fn verify(&self, current: &PageContent) -> Result<HistoryStatus> {
        let entries = self.entries()?;
        let Some(last) = entries.last() else {
            return Ok(HistoryStatus::Empty);
        };
        if let Err(at) = verify_chain(&entries) {
            log::warn!("broken history link in {}: {at:?}", self.path.display());
            return Ok(HistoryStatus::BrokenLink {
                entries: entries.len(),
                at,
            });
        }
        let actual = content_hash(current)?;
        if actual != last.content_hash {
            log::warn!(
                "history head of {} does not match stored content",
                self.path.display()
            );
            return Ok(HistoryStatus::HeadMismatch {
                entries: entries.len(),
                recorded: last.content_hash.clone(),
                actual,
            });
        }
        Ok(HistoryStatus::Intact {
            entries: entries.len(),
            head: actual,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::block::Block;
    use std::fs;
    use tempfile::TempDir;

    fn entry(prev: &str, hash: &str, count: usize) -> OplogEntry {
        OplogEntry {
            ts: Utc::now(),
            client_id: "test".to_string(),
            op: OpType::Modify,
            content_hash: hash.to_string(),
            prev_hash: prev.to_string(),
            block_changes: vec![],
            block_count: count,
        }
    }

    #[test]
    fn test_missing_log_reads_as_empty_genesis() {
        let dir = TempDir::new().unwrap();
        let log = Oplog::new(dir.path().join("p.oplog"));
        assert!(log.entries().unwrap().is_empty());
        assert_eq!(log.last_hash().unwrap(), GENESIS);
    }

    #[test]
    fn test_append_and_read_round_trip() {
        let dir = TempDir::new().unwrap();
        let log = Oplog::new(dir.path().join("p.oplog"));
        let mut e = entry(GENESIS, "sha256:abc123", 5);
        e.block_changes.push(BlockChange {
            block_id: "block-1".to_string(),
            op: BlockOp::Modify,
            block_type: Some("paragraph".to_string()),
            after_block_id: None,
        });
        log.append(&e).unwrap();

        let entries = log.entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].content_hash, "sha256:abc123");
        assert_eq!(entries[0].block_changes.len(), 1);
    }

    #[test]
    fn test_line_format_uses_camel_case_and_micros() {
        let dir = TempDir::new().unwrap();
        let log = Oplog::new(dir.path().join("p.oplog"));
        let mut e = entry(GENESIS, "sha256:aa", 1);
        e.ts = DateTime::parse_from_rfc3339("2026-02-15T20:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        e.block_changes.push(BlockChange {
            block_id: "b".into(),
            op: BlockOp::Insert,
            block_type: Some("paragraph".into()),
            after_block_id: None,
        });
        log.append(&e).unwrap();

        let raw = fs::read_to_string(log.path()).unwrap();
        assert!(raw.ends_with('\n'));
        assert_eq!(raw.lines().count(), 1);
        assert!(raw.contains(r#""ts":"2026-02-15T20:30:00.000000Z""#));
        assert!(raw.contains(r#""clientId":"test""#));
        assert!(raw.contains(r#""prevHash":"genesis""#));
        assert!(raw.contains(r#""blockChanges":[{"blockId":"b","op":"insert","blockType":"paragraph"}]"#));
        assert!(raw.contains(r#""blockCount":1"#));
        assert!(!raw.contains("afterBlockId"));
    }

    #[test]
    fn test_reads_python_style_offsets_and_missing_changes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("p.oplog");
        fs::write(
            &path,
            "{\"ts\":\"2026-02-15T20:30:00.123456+00:00\",\"clientId\":\"agent\",\"op\":\"create\",\"contentHash\":\"sha256:aa\",\"prevHash\":\"genesis\",\"blockCount\":0}\n",
        )
        .unwrap();
        let entries = Oplog::new(&path).entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].op, OpType::Create);
        assert!(entries[0].block_changes.is_empty());
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let dir = TempDir::new().unwrap();
        let log = Oplog::new(dir.path().join("p.oplog"));
        log.append(&entry(GENESIS, "sha256:aaa", 1)).unwrap();
        let mut f = OpenOptions::new().append(true).open(log.path()).unwrap();
        f.write_all(b"{not json\n\n").unwrap();
        log.append(&entry("sha256:aaa", "sha256:bbb", 2)).unwrap();

        let entries = log.entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(log.last_hash().unwrap(), "sha256:bbb");
    }

    #[test]
    fn test_last_n_keeps_newest() {
        let dir = TempDir::new().unwrap();
        let log = Oplog::new(dir.path().join("p.oplog"));
        let mut prev = GENESIS.to_string();
        for i in 0..5 {
            let hash = format!("sha256:{i}");
            log.append(&entry(&prev, &hash, i)).unwrap();
            prev = hash;
        }
        let tail = log.last_n(2).unwrap();
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].content_hash, "sha256:3");
        assert_eq!(tail[1].content_hash, "sha256:4");
        assert!(log.last_n(0).unwrap().is_empty());
    }

    #[test]
    fn test_verify_chain_detects_broken_link() {
        let entries = vec![
            entry(GENESIS, "sha256:aaa", 1),
            entry("sha256:aaa", "sha256:bbb", 2),
            entry("sha256:WRONG", "sha256:ccc", 3),
        ];
        assert!(verify_chain(&entries[..2]).is_ok());
        let err = verify_chain(&entries).unwrap_err();
        assert_eq!(err.index, 2);
        assert_eq!(err.expected, "sha256:bbb");
        assert_eq!(err.found, "sha256:WRONG");
    }

    #[test]
    fn test_verify_chain_requires_genesis_first() {
        let entries = vec![entry("sha256:zzz", "sha256:aaa", 1)];
        assert_eq!(verify_chain(&entries).unwrap_err().index, 0);
    }

    #[test]
    fn test_record_chains_and_verifies() {
        let dir = TempDir::new().unwrap();
        let log = Oplog::new(dir.path().join("p.oplog"));
        let first = PageContent::new(vec![Block::paragraph("one")]);
        let second = PageContent::new(vec![Block::paragraph("two")]);

        let e1 = log.record("t", OpType::Create, &first, vec![], None).unwrap();
        assert_eq!(e1.prev_hash, GENESIS);
        let e2 = log
            .record("t", OpType::Modify, &second, vec![], Some(&e1.content_hash))
            .unwrap();
        assert_eq!(e2.prev_hash, e1.content_hash);

        assert!(matches!(log.verify(&second).unwrap(), HistoryStatus::Intact { entries: 2, .. }));
        assert!(matches!(log.verify(&first).unwrap(), HistoryStatus::HeadMismatch { .. }));
    }

    #[test]
    fn test_record_rejects_stale_head() {
        let dir = TempDir::new().unwrap();
        let log = Oplog::new(dir.path().join("p.oplog"));
        let content = PageContent::new(vec![]);
        log.record("a", OpType::Create, &content, vec![], None).unwrap();
        let err = log
            .record("b", OpType::Modify, &content, vec![], Some(GENESIS))
            .unwrap_err();
        assert!(matches!(err, NousError::Conflict(_)));
        assert_eq!(log.entries().unwrap().len(), 1);
    }
}
