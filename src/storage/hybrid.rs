//! # Hybrid Write Buffer
//!
//! `HybridBuffer<T>` accumulates one column's values (or one pool's items)
//! while a table is being built. The first `capacity` items stay in memory;
//! every later item is encoded into a temporary stream obtained from the
//! configured `TempStreamProvider`.
//!
//! ## Ordering
//!
//! ```text
//! append order:  v0 v1 ... v(cap-1) | v(cap) v(cap+1) ...
//!                └──── memory ─────┘ └──── spill stream ───┘
//! ```
//!
//! Because the memory part always holds a prefix, `flush` replays the memory
//! items and then streams the spilled ones back in a single pass. The spilled
//! part is never materialized as a whole.
//!
//! ## Deduplication
//!
//! A buffer created with `with_dedup` keeps a value → slot map and
//! `append_distinct` stores each distinct value once, returning the slot of its
//! first occurrence. The map holds every distinct value in memory.
//!
//! ## Lifecycle
//!
//! Created per column (or pool) when building starts, appended to by the
//! caller, consumed exactly once by `flush`, then gone: `flush` takes `self`.

use std::hash::Hash;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::sync::Arc;

use eyre::{Result, WrapErr};
use hashbrown::HashMap;

use crate::config::SCAN_BUFFER_SIZE;
use crate::error::{RangeKind, TableError};
use crate::storage::temp::{TempStream, TempStreamProvider};

/// An item that can be written to and read back from a spill stream.
pub trait BufferItem: Sized {
    fn write_item<W: Write + ?Sized>(&self, writer: &mut W) -> Result<()>;

    fn read_item<R: Read + ?Sized>(reader: &mut R) -> Result<Self>;
}

pub struct HybridBuffer<T> {
    memory: Vec<T>,
    capacity: usize,
    provider: Arc<dyn TempStreamProvider>,
    spill: Option<BufWriter<Box<dyn TempStream>>>,
    spilled: u64,
    index: Option<HashMap<T, u32>>,
}

impl<T> std::fmt::Debug for HybridBuffer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HybridBuffer")
            .field("in_memory", &self.memory.len())
            .field("spilled", &self.spilled)
            .field("capacity", &self.capacity)
            .field("dedup", &self.index.is_some())
            .finish()
    }
}

impl<T: BufferItem> HybridBuffer<T> {
    pub fn new(capacity: usize, provider: Arc<dyn TempStreamProvider>) -> Self {
        Self {
            memory: Vec::new(),
            capacity: capacity.max(1),
            provider,
            spill: None,
            spilled: 0,
            index: None,
        }
    }

    pub fn append(&mut self, item: T) -> Result<()> {
        if self.spill.is_none() && self.memory.len() < self.capacity {
            self.memory.push(item);
            return Ok(());
        }

        if self.spill.is_none() {
            tracing::trace!(
                capacity = self.capacity,
                provider = self.provider.name(),
                "hybrid buffer spilling to temporary storage"
            );
            let stream = self.provider.create()?;
            self.spill = Some(BufWriter::with_capacity(SCAN_BUFFER_SIZE, stream));
        }

        if let Some(writer) = self.spill.as_mut() {
            item.write_item(writer)
                .wrap_err("failed to spill buffered item")?;
        }
        self.spilled += 1;
        Ok(())
    }

    pub fn append_range<I: IntoIterator<Item = T>>(&mut self, items: I) -> Result<()> {
        for item in items {
            self.append(item)?;
        }
        Ok(())
    }

    /// Number of items appended so far.
    pub fn len(&self) -> u64 {
        self.memory.len() as u64 + self.spilled
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn spilled(&self) -> u64 {
        self.spilled
    }

    /// Hands every item to `sink` in append order and returns the count.
    pub fn flush<F>(self, mut sink: F) -> Result<u64>
    where
        F: FnMut(T) -> Result<()>,
    {
        let total = self.len();
        for item in self.memory {
            sink(item)?;
        }

        if let Some(writer) = self.spill {
            let mut stream = writer
                .into_inner()
                .map_err(|e| eyre::eyre!("failed to flush spill stream: {}", e.error()))?;
            stream
                .seek(SeekFrom::Start(0))
                .wrap_err("failed to rewind spill stream")?;
            let mut reader = BufReader::with_capacity(SCAN_BUFFER_SIZE, stream);
            for _ in 0..self.spilled {
                let item = T::read_item(&mut reader).wrap_err("failed to read spilled item")?;
                sink(item)?;
            }
        }

        Ok(total)
    }
}

impl<T: BufferItem + Hash + Eq + Clone> HybridBuffer<T> {
    pub fn with_dedup(capacity: usize, provider: Arc<dyn TempStreamProvider>) -> Self {
        let mut buffer = Self::new(capacity, provider);
        buffer.index = Some(HashMap::new());
        buffer
    }

    /// Appends `item` unless an equal item is already stored, and returns the
    /// slot holding it. Without deduplication every call appends.
    pub fn append_distinct(&mut self, item: T) -> Result<u32> {
        let slot = self.len();
        if slot >= u32::MAX as u64 {
            return Err(TableError::OutOfRange {
                kind: RangeKind::Pool,
                index: slot,
                len: u32::MAX as u64,
            }
            .into());
        }
        let slot = slot as u32;

        if let Some(index) = self.index.as_mut() {
            if let Some(&existing) = index.get(&item) {
                return Ok(existing);
            }
            index.insert(item.clone(), slot);
        }
        self.append(item)?;
        Ok(slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::temp::{InMemoryTempProvider, TempFileProvider};

    fn provider() -> Arc<dyn TempStreamProvider> {
        Arc::new(InMemoryTempProvider)
    }

    fn drain<T: BufferItem>(buffer: HybridBuffer<T>) -> Vec<T> {
        let mut out = Vec::new();
        buffer
            .flush(|item| {
                out.push(item);
                Ok(())
            })
            .unwrap();
        out
    }

    #[test]
    fn items_below_capacity_stay_in_memory() {
        let mut buffer = HybridBuffer::new(4, provider());
        buffer.append_range([1u32, 2, 3]).unwrap();
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.spilled(), 0);
        assert_eq!(drain(buffer), vec![1, 2, 3]);
    }

    #[test]
    fn order_is_preserved_across_the_spill_boundary() {
        let mut buffer = HybridBuffer::new(3, provider());
        buffer.append_range(0u32..10).unwrap();
        assert_eq!(buffer.spilled(), 7);
        assert_eq!(drain(buffer), (0u32..10).collect::<Vec<_>>());
    }

    #[test]
    fn spilling_to_temp_files_round_trips_strings() {
        let dir = tempfile::tempdir().unwrap();
        let mut buffer: HybridBuffer<Arc<str>> =
            HybridBuffer::new(2, Arc::new(TempFileProvider::in_dir(dir.path())));
        let words = ["alpha", "", "gamma", "δέλτα", "epsilon"];
        for w in words {
            buffer.append(Arc::from(w)).unwrap();
        }
        let out: Vec<String> = drain(buffer).iter().map(|s| s.to_string()).collect();
        assert_eq!(out, words);
    }

    #[test]
    fn dedup_returns_first_seen_slot() {
        let mut buffer: HybridBuffer<Arc<str>> = HybridBuffer::with_dedup(1, provider());
        assert_eq!(buffer.append_distinct(Arc::from("a")).unwrap(), 0);
        assert_eq!(buffer.append_distinct(Arc::from("b")).unwrap(), 1);
        assert_eq!(buffer.append_distinct(Arc::from("a")).unwrap(), 0);
        assert_eq!(buffer.append_distinct(Arc::from("c")).unwrap(), 2);
        assert_eq!(buffer.len(), 3);
        let out: Vec<String> = drain(buffer).iter().map(|s| s.to_string()).collect();
        assert_eq!(out, vec!["a", "b", "c"]);
    }

    #[test]
    fn without_dedup_every_append_gets_a_slot() {
        let mut buffer: HybridBuffer<Arc<str>> = HybridBuffer::new(8, provider());
        assert_eq!(buffer.append_distinct(Arc::from("a")).unwrap(), 0);
        assert_eq!(buffer.append_distinct(Arc::from("a")).unwrap(), 1);
    }
}
