use super::PoolSlice;
use crate::data::{DataReader, MemoryError};
use crate::range::Range;

use std::io::{self, Read};

enum State {
    Prepare,
    Zeros(u64),
    Delegate { inner: DataReader, remaining: u64 },
    Done,
}

/// Streams the bytes of a [`PoolSlice`].
///
/// Between record boundaries the reader either emits zeroes or forwards to the
/// reader of the current record. It only looks at the record list again when
/// one of those runs is exhausted.
pub struct PoolSliceReader {
    slice: PoolSlice,
    pos: u64,
    next: usize,
    state: State,
}

impl PoolSliceReader {
    pub fn new(slice: PoolSlice) -> Self {
        let pos = slice.range().base;
        Self {
            slice,
            pos,
            next: 0,
            state: State::Prepare,
        }
    }

    fn prepare(&mut self) -> io::Result<()> {
        let end = self.slice.range().end();
        if self.pos >= end {
            self.state = State::Done;
            return Ok(());
        }

        let records = self.slice.records();
        while self.next < records.len() && records[self.next].dst.end() <= self.pos {
            self.next += 1;
        }

        self.state = match records.get(self.next) {
            Some(rec) if rec.dst.base <= self.pos => {
                let visible = rec.dst.intersect(Range::from_bounds(self.pos, end));
                let src = rec
                    .src
                    .slice(Range::new(visible.base - rec.dst.base, visible.size));
                self.next += 1;
                State::Delegate {
                    inner: src.reader().map_err(into_io)?,
                    remaining: visible.size,
                }
            }
            Some(rec) if rec.dst.base < end => State::Zeros(rec.dst.base - self.pos),
            _ => State::Zeros(end - self.pos),
        };
        Ok(())
    }
}

impl Read for PoolSliceReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            if matches!(self.state, State::Prepare) {
                self.prepare()?;
                continue;
            }
            let (count, exhausted) = match &mut self.state {
                State::Prepare => unreachable!(),
                State::Done => return Ok(0),
                State::Zeros(n) => {
                    let count = (*n).min(buf.len() as u64) as usize;
                    buf[..count].fill(0);
                    *n -= count as u64;
                    (count, *n == 0)
                }
                State::Delegate { inner, remaining } => {
                    let want = (*remaining).min(buf.len() as u64) as usize;
                    let got = inner.read(&mut buf[..want])?;
                    if got == 0 {
                        return Err(io::Error::new(
                            io::ErrorKind::UnexpectedEof,
                            format!("record source ended with {remaining} bytes left"),
                        ));
                    }
                    *remaining -= got as u64;
                    (got, *remaining == 0)
                }
            };
            self.pos += count as u64;
            if exhausted {
                self.state = State::Prepare;
            }
            return Ok(count);
        }
    }
}

impl std::fmt::Debug for PoolSliceReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolSliceReader")
            .field("range", &self.slice.range())
            .field("pos", &crate::Hex(self.pos))
            .finish()
    }
}

fn into_io(err: MemoryError) -> io::Error {
    match err {
        MemoryError::Io(e) => e,
        e => io::Error::new(io::ErrorKind::Other, e),
    }
}

#[cfg(test)]
mod tests {
    use crate::data::Data;
    use crate::pool::Pool;
    use crate::range::Range;
    use crate::store::{ContentStore, MemoryStore};
    use std::io::Read;
    use std::sync::Arc;

    #[test]
    fn test_reader_interleaves_gaps_and_records() {
        let mut pool = Pool::new();
        pool.write_bytes(2, &[1, 2, 3]);
        pool.write_bytes(8, &[4, 5]);
        let data = pool.slice(Range::new(0, 12));
        let mut out = Vec::new();
        data.reader().unwrap().read_to_end(&mut out).unwrap();
        assert_eq!(out, vec![0, 0, 1, 2, 3, 0, 0, 0, 4, 5, 0, 0]);
    }

    #[test]
    fn test_reader_debug_shows_position() {
        let mut pool = Pool::new();
        pool.write_bytes(0, &[1, 2]);
        pool.write_bytes(4, &[3]);
        let Data::Pool(slice) = pool.slice(Range::new(0, 6)) else {
            panic!("expected a pool slice");
        };
        let text = format!("{:?}", slice.reader());
        assert!(text.contains("pos: 0x0000000000000000"), "{text}");
    }

    #[test]
    fn test_reader_small_buffer() {
        let mut pool = Pool::new();
        pool.write_bytes(1, &[7; 9]);
        pool.write_bytes(12, &[8]);
        let data = pool.slice(Range::new(0, 14));
        let mut reader = data.reader().unwrap();
        let mut out = Vec::new();
        let mut chunk = [0u8; 3];
        loop {
            let n = reader.read(&mut chunk).unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&chunk[..n]);
        }
        assert_eq!(out, data.bytes().unwrap());
    }

    #[test]
    fn test_reader_reports_store_errors() {
        let store = Arc::new(MemoryStore::new());
        let id = store.store(b"abcd").unwrap();
        let mut pool = Pool::new();
        // declared larger than what the store holds
        pool.write(4, Data::resource(id, 6, store));
        pool.write_bytes(0, &[1]);
        let data = pool.slice(Range::new(0, 10));
        let mut out = Vec::new();
        assert!(data.reader().unwrap().read_to_end(&mut out).is_err());
    }
}
