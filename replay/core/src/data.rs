use crate::interval::U64RangeList;
use crate::pool::slice::PoolSlice;
use crate::pool::PoolId;
use crate::range::Range;
use crate::store::{ContentId, ContentStore, StoreError};

use std::fmt;
use std::io::{self, Read};
use std::sync::Arc;

/// A source of bytes that may not have been materialized yet.
///
/// `Data` never copies bytes it does not have to. Slicing a blob shares the
/// underlying buffer, slicing a resource keeps a window over it, and slicing a
/// pool keeps the write records that fall inside the window. Reads always
/// behave as if the full byte sequence existed: `get(offset, out)` fills `out`
/// with the bytes starting at `offset`, and bytes no one wrote read as zero.
#[derive(Clone, Debug)]
pub enum Data {
    /// Bytes held in memory.
    Blob(Blob),
    /// Bytes held by a content store and fetched on demand.
    Resource(Resource),
    /// A window over a resource.
    Slice(DataSlice),
    /// A window over the write log of a pool.
    Pool(PoolSlice),
}

#[derive(thiserror::Error, Debug)]
pub enum MemoryError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("resource {id} resolved to {actual} bytes but {expected} were expected")]
    ResourceSizeMismatch {
        id: ContentId,
        expected: u64,
        actual: u64,
    },

    #[error("pool {0} does not exist")]
    PoolNotFound(PoolId),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type DataReader = Box<dyn Read + Send>;

impl Data {
    /// Wraps an in-memory buffer.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self::Blob(Blob::new(bytes.into()))
    }

    /// References `size` bytes stored under `id`.
    pub fn resource(id: ContentId, size: u64, store: Arc<dyn ContentStore>) -> Self {
        Self::Resource(Resource { id, size, store })
    }

    pub fn size(&self) -> u64 {
        match self {
            Self::Blob(b) => b.len() as u64,
            Self::Resource(r) => r.size,
            Self::Slice(s) => s.range.size,
            Self::Pool(p) => p.range().size,
        }
    }

    /// Copies the bytes starting at `offset` into `out`.
    ///
    /// Like a slice copy, at most `size() - offset` bytes are written and any
    /// remainder of `out` is left untouched.
    pub fn get(&self, offset: u64, out: &mut [u8]) -> Result<(), MemoryError> {
        let size = self.size();
        if offset >= size || out.is_empty() {
            return Ok(());
        }
        let count = (size - offset).min(out.len() as u64) as usize;
        let out = &mut out[..count];
        match self {
            Self::Blob(b) => {
                let start = offset as usize;
                out.copy_from_slice(&b.as_slice()[start..start + count]);
            }
            Self::Resource(r) => {
                let bytes = r.bytes()?;
                let start = offset as usize;
                out.copy_from_slice(&bytes[start..start + count]);
            }
            Self::Slice(s) => {
                let bytes = s.src.bytes()?;
                let start = (s.range.base + offset) as usize;
                out.copy_from_slice(&bytes[start..start + count]);
            }
            Self::Pool(p) => p.get(offset, out)?,
        }
        Ok(())
    }

    /// Returns a view of the bytes in `rng`, expressed relative to this data.
    ///
    /// # Panics
    ///
    /// Panics if `rng` reaches past `size()`.
    pub fn slice(&self, rng: Range) -> Data {
        let size = self.size();
        if rng.base > size || rng.size > size - rng.base {
            panic!("slice {rng} is out of bounds of data of size {size:#x}");
        }
        match self {
            Self::Blob(b) => Self::Blob(b.window(rng)),
            Self::Resource(_) if rng.base == 0 && rng.size == size => self.clone(),
            Self::Resource(r) => Self::Slice(DataSlice {
                src: r.clone(),
                range: rng,
            }),
            Self::Slice(s) => Self::Slice(DataSlice {
                src: s.src.clone(),
                range: Range::new(s.range.base + rng.base, rng.size),
            }),
            Self::Pool(p) => p.slice(rng),
        }
    }

    /// Sub-ranges that hold written bytes, relative to the start of this data.
    pub fn valid_ranges(&self) -> U64RangeList {
        match self {
            Self::Blob(_) | Self::Resource(_) | Self::Slice(_) => {
                let mut list = U64RangeList::new();
                list.merge(Range::new(0, self.size()), false);
                list
            }
            Self::Pool(p) => p.valid_ranges(),
        }
    }

    /// Number of bytes before the first zero byte, or `None` if there is none.
    pub fn strlen(&self) -> Result<Option<u64>, MemoryError> {
        match self {
            Self::Blob(b) => Ok(find_zero(b.as_slice())),
            Self::Resource(r) => Ok(find_zero(&r.bytes()?)),
            Self::Slice(s) => {
                let bytes = s.src.bytes()?;
                let start = s.range.base as usize;
                Ok(find_zero(&bytes[start..start + s.range.size as usize]))
            }
            Self::Pool(p) => p.strlen(),
        }
    }

    /// Returns the content id of these bytes, storing them first if needed.
    pub fn resource_id(&self, store: &dyn ContentStore) -> Result<ContentId, MemoryError> {
        if let Self::Resource(r) = self {
            return Ok(r.id);
        }
        Ok(store.store(&self.bytes()?)?)
    }

    /// Materializes every byte of this data.
    pub fn bytes(&self) -> Result<Vec<u8>, MemoryError> {
        if let Self::Blob(b) = self {
            return Ok(b.as_slice().to_vec());
        }
        let mut out = vec![0u8; self.size() as usize];
        self.get(0, &mut out)?;
        Ok(out)
    }

    /// Returns a reader producing every byte of this data in order.
    pub fn reader(&self) -> Result<DataReader, MemoryError> {
        match self {
            Self::Blob(b) => Ok(Box::new(io::Cursor::new(b.clone()))),
            Self::Resource(r) => Ok(Box::new(io::Cursor::new(r.bytes()?))),
            Self::Slice(s) => {
                let blob = Blob::from_arc(s.src.bytes()?).window(s.range);
                Ok(Box::new(io::Cursor::new(blob)))
            }
            Self::Pool(p) => Ok(Box::new(p.reader())),
        }
    }
}

impl From<Vec<u8>> for Data {
    fn from(v: Vec<u8>) -> Self {
        Self::from_bytes(v)
    }
}

impl From<&[u8]> for Data {
    fn from(v: &[u8]) -> Self {
        Self::from_bytes(v.to_vec())
    }
}

#[inline]
fn find_zero(bytes: &[u8]) -> Option<u64> {
    bytes.iter().position(|&b| b == 0).map(|i| i as u64)
}

/// Shared, immutable bytes. Slicing a blob shares the buffer.
#[derive(Clone)]
pub struct Blob {
    bytes: Arc<[u8]>,
    start: usize,
    len: usize,
}

impl Blob {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self::from_arc(Arc::from(bytes))
    }

    pub fn from_arc(bytes: Arc<[u8]>) -> Self {
        let len = bytes.len();
        Self {
            bytes,
            start: 0,
            len,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[self.start..self.start + self.len]
    }

    fn window(&self, rng: Range) -> Self {
        Self {
            bytes: self.bytes.clone(),
            start: self.start + rng.base as usize,
            len: rng.size as usize,
        }
    }
}

impl AsRef<[u8]> for Blob {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl fmt::Debug for Blob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let head = &self.as_slice()[..self.len.min(16)];
        write!(f, "Blob({} bytes, {})", self.len, crate::Hex(head))
    }
}

/// Bytes kept in a content store.
#[derive(Clone)]
pub struct Resource {
    id: ContentId,
    size: u64,
    store: Arc<dyn ContentStore>,
}

impl Resource {
    pub fn id(&self) -> ContentId {
        self.id
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    fn bytes(&self) -> Result<Arc<[u8]>, MemoryError> {
        let bytes = self.store.resolve(&self.id)?;
        if bytes.len() as u64 != self.size {
            return Err(MemoryError::ResourceSizeMismatch {
                id: self.id,
                expected: self.size,
                actual: bytes.len() as u64,
            });
        }
        Ok(bytes)
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("id", &self.id)
            .field("size", &self.size)
            .finish()
    }
}

/// A window over a resource. The resource is only resolved when the window is
/// read.
#[derive(Clone, Debug)]
pub struct DataSlice {
    src: Resource,
    range: Range,
}

impl DataSlice {
    pub fn source(&self) -> &Resource {
        &self.src
    }

    pub fn range(&self) -> Range {
        self.range
    }
}
