//! Saving and restoring the contents of every pool.
//!
//! A snapshot does not embed bytes. Each write record is pushed into a
//! [`ContentStore`] and referenced by its [`ContentId`], so restoring a
//! snapshot produces pools backed by lazy resources that read nothing until
//! they are accessed.

use crate::data::{Data, MemoryError};
use crate::pool::{Pool, PoolId};
use crate::pools::Pools;
use crate::range::Range;
use crate::store::{ContentId, ContentStore};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolsSnapshot {
    pub next_id: u32,
    pub pools: Vec<PoolSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSnapshot {
    pub id: PoolId,
    pub records: Vec<RecordSnapshot>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSnapshot {
    pub base: u64,
    pub size: u64,
    pub id: ContentId,
}

#[derive(thiserror::Error, Debug)]
pub enum SnapshotError {
    #[error(transparent)]
    Memory(#[from] MemoryError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("snapshot of pool {pool} has overlapping records at {base:#x}")]
    Overlap { pool: PoolId, base: u64 },
}

impl PoolsSnapshot {
    pub fn save<W: Write>(&self, writer: W) -> Result<(), SnapshotError> {
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn load<R: Read>(reader: R) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_reader(reader)?)
    }

    /// Total number of records across all pools.
    pub fn record_count(&self) -> usize {
        self.pools.iter().map(|p| p.records.len()).sum()
    }
}

impl Pools {
    /// Stores every write record in `store` and returns a snapshot that
    /// references them.
    pub fn snapshot(&self, store: &dyn ContentStore) -> Result<PoolsSnapshot, MemoryError> {
        let _span = tracing::debug_span!("snapshot", pools = self.len()).entered();
        let mut pools = Vec::with_capacity(self.len());
        for (id, pool) in self.iter() {
            let records = pool
                .records()
                .iter()
                .map(|rec| {
                    Ok(RecordSnapshot {
                        base: rec.dst.base,
                        size: rec.dst.size,
                        id: rec.src.resource_id(store)?,
                    })
                })
                .collect::<Result<Vec<_>, MemoryError>>()?;
            tracing::trace!(%id, records = records.len(), "pool captured");
            pools.push(PoolSnapshot { id, records });
        }
        Ok(PoolsSnapshot {
            next_id: self.next_id().0,
            pools,
        })
    }

    /// Rebuilds pools from a snapshot. Record bytes are resolved from `store`
    /// lazily.
    pub fn restore(
        snapshot: &PoolsSnapshot,
        store: Arc<dyn ContentStore>,
    ) -> Result<Self, SnapshotError> {
        let mut pools = BTreeMap::new();
        for entry in &snapshot.pools {
            let mut pool = Pool::new();
            let mut end = 0;
            for rec in &entry.records {
                if rec.base < end {
                    return Err(SnapshotError::Overlap {
                        pool: entry.id,
                        base: rec.base,
                    });
                }
                end = Range::new(rec.base, rec.size).end();
                pool.write(rec.base, Data::resource(rec.id, rec.size, store.clone()));
            }
            pools.insert(entry.id, pool);
        }
        Ok(Pools::from_parts(pools, snapshot.next_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pools::APPLICATION_POOL;
    use crate::store::MemoryStore;

    #[test]
    fn test_snapshot_round_trip() {
        let store = Arc::new(MemoryStore::new());
        let mut pools = Pools::new();
        pools.application_mut().write_bytes(0x10, b"hello");
        pools.application_mut().write_bytes(0x20, b"world");
        let (id, pool) = pools.new_pool();
        pool.write_bytes(0, b"hello");

        let snap = pools.snapshot(store.as_ref()).unwrap();
        assert_eq!(snap.record_count(), 3);
        // identical bytes are stored once
        assert_eq!(store.len(), 2);

        let mut json = Vec::new();
        snap.save(&mut json).unwrap();
        let loaded = PoolsSnapshot::load(json.as_slice()).unwrap();
        assert_eq!(loaded, snap);

        let restored = Pools::restore(&loaded, store).unwrap();
        let app = restored.must_get(APPLICATION_POOL);
        assert!(matches!(app.records()[0].src, Data::Resource(_)));
        let mut out = [0u8; 5];
        app.read(0x20, &mut out).unwrap();
        assert_eq!(&out, b"world");
        assert_eq!(
            restored.must_get(id).slice(Range::new(0, 5)).bytes().unwrap(),
            b"hello"
        );
        assert_eq!(restored.next_id(), pools.next_id());
    }

    #[test]
    fn test_restore_rejects_overlap() {
        let id = ContentId::of(b"ab");
        let snap = PoolsSnapshot {
            next_id: 1,
            pools: vec![PoolSnapshot {
                id: APPLICATION_POOL,
                records: vec![
                    RecordSnapshot { base: 0, size: 2, id },
                    RecordSnapshot { base: 1, size: 2, id },
                ],
            }],
        };
        let store: Arc<dyn ContentStore> = Arc::new(MemoryStore::new());
        assert!(matches!(
            Pools::restore(&snap, store),
            Err(SnapshotError::Overlap { base: 1, .. })
        ));
    }
}
