//! Committed-offset persistence.
//!
//! The coordinator keeps committed offsets in memory and mirrors every
//! commit through an `OffsetStore`, so a group picks up where it left
//! off after a coordinator restart.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use bytes::{Buf, BufMut, BytesMut};
use strata_core::{Offset, PartitionId};

use crate::error::{GroupError, GroupResult};

/// Committed offsets for one group, keyed by topic and partition.
pub type CommittedOffsets = HashMap<(String, PartitionId), Offset>;

/// Durable storage for committed offsets.
pub trait OffsetStore: Send + Sync + std::fmt::Debug {
    /// Loads all committed offsets for a group.
    ///
    /// Returns an empty map for a group with no commits.
    ///
    /// # Errors
    /// Returns an error if the backing storage cannot be read.
    fn load(&self, group: &str) -> GroupResult<CommittedOffsets>;

    /// Persists one committed offset.
    ///
    /// # Errors
    /// Returns an error if the backing storage cannot be written.
    fn save(
        &self,
        group: &str,
        topic: &str,
        partition: PartitionId,
        offset: Offset,
    ) -> GroupResult<()>;
}

/// In-memory offset store. Commits do not survive a restart.
#[derive(Debug, Default)]
pub struct MemoryOffsetStore {
    /// Offsets per group.
    groups: Mutex<HashMap<String, CommittedOffsets>>,
}

impl MemoryOffsetStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl OffsetStore for MemoryOffsetStore {
    fn load(&self, group: &str) -> GroupResult<CommittedOffsets> {
        let groups = self.groups.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(groups.get(group).cloned().unwrap_or_default())
    }

    fn save(
        &self,
        group: &str,
        topic: &str,
        partition: PartitionId,
        offset: Offset,
    ) -> GroupResult<()> {
        let mut groups = self.groups.lock().unwrap_or_else(PoisonError::into_inner);
        groups
            .entry(group.to_string())
            .or_default()
            .insert((topic.to_string(), partition), offset);
        Ok(())
    }
}

/// Magic bytes at the head of an offset table file.
const OFFSET_FILE_MAGIC: u32 = 0x5354_4F46; // "STOF"
/// Current offset table format version.
const OFFSET_FILE_VERSION: u32 = 1;

/// File-backed offset store.
///
/// The whole table is kept in memory and rewritten as a compacted,
/// length-prefixed file on every save. The rewrite goes through a
/// temporary file and a rename, so a crash mid-write leaves the previous
/// table intact.
#[derive(Debug)]
pub struct FileOffsetStore {
    /// Path of the table file.
    path: PathBuf,
    /// In-memory mirror of the table.
    groups: Mutex<HashMap<String, CommittedOffsets>>,
}

impl FileOffsetStore {
    /// Opens a store at `path`, loading the existing table if present.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn open(path: impl Into<PathBuf>) -> GroupResult<Self> {
        let path = path.into();

        let groups = if path.exists() {
            let data = std::fs::read(&path).map_err(|e| GroupError::io("read", &e))?;
            Self::parse(&data)?
        } else {
            HashMap::new()
        };

        Ok(Self {
            path,
            groups: Mutex::new(groups),
        })
    }

    /// Parses a serialized offset table.
    fn parse(data: &[u8]) -> GroupResult<HashMap<String, CommittedOffsets>> {
        let mut buf = data;

        if buf.remaining() < 12 {
            return Err(GroupError::StoreCorrupt {
                message: "truncated header".to_string(),
            });
        }

        let magic = buf.get_u32_le();
        if magic != OFFSET_FILE_MAGIC {
            return Err(GroupError::StoreCorrupt {
                message: format!("bad magic {magic:#010x}"),
            });
        }

        let version = buf.get_u32_le();
        if version != OFFSET_FILE_VERSION {
            return Err(GroupError::StoreCorrupt {
                message: format!("unsupported version {version}"),
            });
        }

        let count = buf.get_u32_le();
        let mut groups: HashMap<String, CommittedOffsets> = HashMap::new();

        for _ in 0..count {
            let group = Self::read_string(&mut buf)?;
            let topic = Self::read_string(&mut buf)?;

            if buf.remaining() < 8 + 8 {
                return Err(GroupError::StoreCorrupt {
                    message: "truncated entry".to_string(),
                });
            }
            let partition = PartitionId::new(buf.get_u64_le());
            let offset = Offset::new(buf.get_u64_le());

            groups
                .entry(group)
                .or_default()
                .insert((topic, partition), offset);
        }

        Ok(groups)
    }

    /// Reads one length-prefixed UTF-8 string.
    fn read_string(buf: &mut &[u8]) -> GroupResult<String> {
        if buf.remaining() < 2 {
            return Err(GroupError::StoreCorrupt {
                message: "truncated string length".to_string(),
            });
        }
        let len = buf.get_u16_le() as usize;
        if buf.remaining() < len {
            return Err(GroupError::StoreCorrupt {
                message: "truncated string".to_string(),
            });
        }
        let raw = buf[..len].to_vec();
        buf.advance(len);
        String::from_utf8(raw).map_err(|_| GroupError::StoreCorrupt {
            message: "string is not valid utf-8".to_string(),
        })
    }

    /// Serializes and atomically rewrites the table file.
    #[allow(clippy::cast_possible_truncation)] // Name lengths bounded by limits.
    fn flush(&self, groups: &HashMap<String, CommittedOffsets>) -> GroupResult<()> {
        let mut buf = BytesMut::new();
        buf.put_u32_le(OFFSET_FILE_MAGIC);
        buf.put_u32_le(OFFSET_FILE_VERSION);

        let count: usize = groups.values().map(HashMap::len).sum();
        buf.put_u32_le(count as u32);

        for (group, offsets) in groups {
            for ((topic, partition), offset) in offsets {
                buf.put_u16_le(group.len() as u16);
                buf.put_slice(group.as_bytes());
                buf.put_u16_le(topic.len() as u16);
                buf.put_slice(topic.as_bytes());
                buf.put_u64_le(partition.get());
                buf.put_u64_le(offset.get());
            }
        }

        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, &buf).map_err(|e| GroupError::io("write", &e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| GroupError::io("rename", &e))?;

        Ok(())
    }

    /// Returns the path of the table file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl OffsetStore for FileOffsetStore {
    fn load(&self, group: &str) -> GroupResult<CommittedOffsets> {
        let groups = self.groups.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(groups.get(group).cloned().unwrap_or_default())
    }

    fn save(
        &self,
        group: &str,
        topic: &str,
        partition: PartitionId,
        offset: Offset,
    ) -> GroupResult<()> {
        let mut groups = self.groups.lock().unwrap_or_else(PoisonError::into_inner);
        groups
            .entry(group.to_string())
            .or_default()
            .insert((topic.to_string(), partition), offset);
        self.flush(&groups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryOffsetStore::new();
        assert!(store.load("g1").unwrap().is_empty());

        store
            .save("g1", "orders", PartitionId::new(0), Offset::new(3))
            .unwrap();
        store
            .save("g1", "orders", PartitionId::new(1), Offset::new(7))
            .unwrap();
        store
            .save("g2", "orders", PartitionId::new(0), Offset::new(1))
            .unwrap();

        let offsets = store.load("g1").unwrap();
        assert_eq!(offsets.len(), 2);
        assert_eq!(
            offsets.get(&("orders".to_string(), PartitionId::new(0))),
            Some(&Offset::new(3))
        );

        // Groups are isolated.
        let offsets = store.load("g2").unwrap();
        assert_eq!(offsets.len(), 1);
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("offsets.strata");

        {
            let store = FileOffsetStore::open(&path).unwrap();
            store
                .save("g1", "orders", PartitionId::new(2), Offset::new(42))
                .unwrap();
            store
                .save("g1", "events", PartitionId::new(0), Offset::new(5))
                .unwrap();
        }

        let store = FileOffsetStore::open(&path).unwrap();
        let offsets = store.load("g1").unwrap();
        assert_eq!(
            offsets.get(&("orders".to_string(), PartitionId::new(2))),
            Some(&Offset::new(42))
        );
        assert_eq!(
            offsets.get(&("events".to_string(), PartitionId::new(0))),
            Some(&Offset::new(5))
        );
    }

    #[test]
    fn test_file_store_compacts_on_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("offsets.strata");

        let store = FileOffsetStore::open(&path).unwrap();
        for offset in 0..50 {
            store
                .save("g1", "orders", PartitionId::new(0), Offset::new(offset))
                .unwrap();
        }

        // One live entry; repeated commits to the same partition do not
        // grow the file.
        let store = FileOffsetStore::open(&path).unwrap();
        let offsets = store.load("g1").unwrap();
        assert_eq!(offsets.len(), 1);
        assert_eq!(
            offsets.get(&("orders".to_string(), PartitionId::new(0))),
            Some(&Offset::new(49))
        );
    }

    #[test]
    fn test_file_store_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("offsets.strata");
        std::fs::write(&path, b"not an offset table").unwrap();

        let result = FileOffsetStore::open(&path);
        assert!(matches!(result, Err(GroupError::StoreCorrupt { .. })));
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileOffsetStore::open(dir.path().join("absent.strata")).unwrap();
        assert!(store.load("g1").unwrap().is_empty());
    }
}
