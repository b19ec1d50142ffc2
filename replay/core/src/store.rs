//! Content-addressed byte storage.
//!
//! Resource-backed [`Data`](crate::data::Data) keeps only a [`ContentId`] and
//! asks a [`ContentStore`] for the bytes when they are actually needed. The
//! store is an external collaborator; [`MemoryStore`] is the in-process
//! implementation used by tests and short-lived sessions.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::{Arc, Mutex};

/// SHA-256 of a blob of bytes.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentId([u8; 32]);

impl ContentId {
    pub fn of(bytes: &[u8]) -> Self {
        let digest = Sha256::digest(bytes);
        let mut out = [0u8; 32];
        out.copy_from_slice(digest.as_slice());
        Self(out)
    }

    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Returns true if `bytes` hash to this id.
    pub fn matches(&self, bytes: &[u8]) -> bool {
        Self::of(bytes) == *self
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentId({self})")
    }
}

impl From<ContentId> for String {
    fn from(id: ContentId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for ContentId {
    type Error = InvalidContentId;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl std::str::FromStr for ContentId {
    type Err = InvalidContentId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 64 || !s.is_ascii() {
            return Err(InvalidContentId(s.to_owned()));
        }
        let mut out = [0u8; 32];
        for (i, byte) in out.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16)
                .map_err(|_| InvalidContentId(s.to_owned()))?;
        }
        Ok(Self(out))
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("'{0}' is not a content id")]
pub struct InvalidContentId(String);

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("content {0} is not in the store")]
    UnknownId(ContentId),

    #[error("content {0} does not match its hash")]
    Corrupt(ContentId),

    #[error(transparent)]
    Backend(Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl StoreError {
    pub fn backend<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend(Box::new(err))
    }
}

pub trait ContentStore: Send + Sync {
    /// Stores `bytes`, returning their id. Storing the same bytes twice is a
    /// no-op that returns the same id.
    fn store(&self, bytes: &[u8]) -> Result<ContentId, StoreError>;

    /// Returns the bytes previously stored under `id`.
    fn resolve(&self, id: &ContentId) -> Result<Arc<[u8]>, StoreError>;

    fn contains(&self, id: &ContentId) -> bool;
}

#[derive(Default)]
pub struct MemoryStore {
    blobs: Mutex<HashMap<ContentId, Arc<[u8]>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ContentId, Arc<[u8]>>> {
        // A poisoned map is still structurally sound; entries are immutable.
        self.blobs.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Replaces the bytes stored under `id` without re-hashing.
    #[cfg(test)]
    pub(crate) fn tamper(&self, id: ContentId, bytes: &[u8]) {
        self.lock().insert(id, Arc::from(bytes));
    }
}

impl ContentStore for MemoryStore {
    fn store(&self, bytes: &[u8]) -> Result<ContentId, StoreError> {
        let id = ContentId::of(bytes);
        self.lock().entry(id).or_insert_with(|| {
            tracing::trace!(%id, size = bytes.len(), "storing content");
            Arc::from(bytes)
        });
        Ok(id)
    }

    fn resolve(&self, id: &ContentId) -> Result<Arc<[u8]>, StoreError> {
        let bytes = self
            .lock()
            .get(id)
            .cloned()
            .ok_or(StoreError::UnknownId(*id))?;
        if !id.matches(&bytes) {
            return Err(StoreError::Corrupt(*id));
        }
        Ok(bytes)
    }

    fn contains(&self, id: &ContentId) -> bool {
        self.lock().contains_key(id)
    }
}

impl fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStore")
            .field("entries", &self.len())
            .finish()
    }
}
