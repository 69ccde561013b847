//! # Shared Pools
//!
//! The five pools of an open table, each loaded on first use and then kept
//! for the lifetime of the `Table`.
//!
//! ## At-Most-Once Loading
//!
//! Every pool lives in a `once_cell::sync::OnceCell`. `get_or_try_init`
//! blocks concurrent first accessors until the winning loader finishes, so a
//! pool is read from storage exactly once no matter how many column readers
//! or threads ask for it at the same time. A failed load leaves the cell
//! empty and the error goes to the caller that triggered it.
//!
//! ```text
//! reader A ─┐
//! reader B ─┼─> OnceCell::get_or_try_init ──> load (one thread) ──> Arc<[T]>
//! reader C ─┘                                      │
//!                                                  └─> loader cursor (Mutex)
//! ```
//!
//! The loader cursor is a single stream opened from the table source on the
//! first load. It is guarded by a `parking_lot::Mutex` because two different
//! pools may load concurrently.
//!
//! ## Unused Pools
//!
//! A pool whose header entry has offset 0 was never written. Asking for it
//! yields an empty slice without touching storage and is not counted as a load.

use std::io::{BufReader, Read, Seek, SeekFrom};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use eyre::{Result, WrapErr};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use crate::config::SCAN_BUFFER_SIZE;
use crate::error::TableError;
use crate::storage::{BufferItem, ReadSeek, TableSource};
use crate::table::header::{PoolEntry, TableHeader};
use crate::types::{PoolKind, WeightedIndex};

pub struct PoolSet {
    source: Arc<dyn TableSource>,
    entries: [PoolEntry; 5],
    cursor: Mutex<Option<Box<dyn ReadSeek>>>,
    loads: Arc<AtomicUsize>,
    strings: OnceCell<Arc<[Arc<str>]>>,
    floats: OnceCell<Arc<[f32]>>,
    binary: OnceCell<Arc<[u8]>>,
    indices: OnceCell<Arc<[u32]>>,
    weighted: OnceCell<Arc<[WeightedIndex]>>,
}

impl std::fmt::Debug for PoolSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolSet")
            .field("source", &self.source.describe())
            .field("loads", &self.loads.load(Ordering::Relaxed))
            .field("strings", &self.strings.get().map(|p| p.len()))
            .field("floats", &self.floats.get().map(|p| p.len()))
            .field("binary", &self.binary.get().map(|p| p.len()))
            .field("indices", &self.indices.get().map(|p| p.len()))
            .field("weighted", &self.weighted.get().map(|p| p.len()))
            .finish()
    }
}

impl PoolSet {
    pub(crate) fn new(
        source: Arc<dyn TableSource>,
        header: &TableHeader,
        loads: Arc<AtomicUsize>,
    ) -> Self {
        let mut entries = [PoolEntry::default(); 5];
        for (kind, entry) in header.pools() {
            entries[kind.slot()] = *entry;
        }
        Self {
            source,
            entries,
            cursor: Mutex::new(None),
            loads,
            strings: OnceCell::new(),
            floats: OnceCell::new(),
            binary: OnceCell::new(),
            indices: OnceCell::new(),
            weighted: OnceCell::new(),
        }
    }

    pub fn strings(&self) -> Result<Arc<[Arc<str>]>> {
        self.strings
            .get_or_try_init(|| self.load_items(PoolKind::String))
            .cloned()
    }

    pub fn floats(&self) -> Result<Arc<[f32]>> {
        self.floats
            .get_or_try_init(|| self.load_items(PoolKind::Float))
            .cloned()
    }

    pub fn binary(&self) -> Result<Arc<[u8]>> {
        self.binary
            .get_or_try_init(|| self.load_bytes(PoolKind::Binary))
            .cloned()
    }

    pub fn indices(&self) -> Result<Arc<[u32]>> {
        self.indices
            .get_or_try_init(|| self.load_items(PoolKind::Index))
            .cloned()
    }

    pub fn weighted(&self) -> Result<Arc<[WeightedIndex]>> {
        self.weighted
            .get_or_try_init(|| self.load_items(PoolKind::WeightedIndex))
            .cloned()
    }

    pub fn is_loaded(&self, kind: PoolKind) -> bool {
        match kind {
            PoolKind::String => self.strings.get().is_some(),
            PoolKind::Float => self.floats.get().is_some(),
            PoolKind::Binary => self.binary.get().is_some(),
            PoolKind::Index => self.indices.get().is_some(),
            PoolKind::WeightedIndex => self.weighted.get().is_some(),
        }
    }

    /// Runs `read` against the loader cursor positioned at the pool's offset.
    fn with_pool_reader<T, F>(&self, kind: PoolKind, read: F) -> Result<Arc<[T]>>
    where
        F: FnOnce(&mut BufReader<&mut Box<dyn ReadSeek>>, usize) -> Result<Vec<T>>,
    {
        let entry = self.entries[kind.slot()];
        if !entry.is_used() {
            return Ok(Arc::from(Vec::new()));
        }

        let mut guard = self.cursor.lock();
        if guard.is_none() {
            *guard = Some(self.source.open_cursor()?);
        }
        let cursor = match guard.as_mut() {
            Some(cursor) => cursor,
            None => return Err(eyre::eyre!("pool loader cursor unavailable")),
        };
        cursor
            .seek(SeekFrom::Start(entry.offset()))
            .wrap_err_with(|| format!("failed to seek to {} pool", kind.name()))?;

        let count = entry.count() as usize;
        let mut reader = BufReader::with_capacity(SCAN_BUFFER_SIZE, cursor);
        let items = read(&mut reader, count).map_err(|e| {
            eyre::Report::from(TableError::corrupt(format!(
                "{} pool at offset {} could not be read in full: {}",
                kind.name(),
                entry.offset(),
                e
            )))
        })?;

        self.loads.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            pool = kind.name(),
            offset = entry.offset(),
            count,
            "loaded shared pool"
        );
        Ok(Arc::from(items))
    }

    fn load_items<T: BufferItem>(&self, kind: PoolKind) -> Result<Arc<[T]>> {
        self.with_pool_reader(kind, |reader, count| {
            let mut items = Vec::with_capacity(count);
            for _ in 0..count {
                items.push(T::read_item(reader)?);
            }
            Ok(items)
        })
    }

    fn load_bytes(&self, kind: PoolKind) -> Result<Arc<[u8]>> {
        self.with_pool_reader(kind, |reader, count| {
            let mut bytes = vec![0u8; count];
            reader.read_exact(&mut bytes)?;
            Ok(bytes)
        })
    }
}
