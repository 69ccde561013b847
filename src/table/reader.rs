//! # Table Reader
//!
//! `Table::open` parses a frozen table stream and validates its structure
//! before anything else can touch it. Either every check passes and a `Table`
//! is returned, or the open fails with `CorruptTable` and nothing is kept.
//!
//! ## Open Sequence
//!
//! ```text
//! 1. header (128 bytes)        magic, version
//! 2. table metadata block      bounded by the stream length
//! 3. column metadata × N
//! 4. descriptors × N           type code known, record size matches catalog
//! 5. data region               after descriptors, inside the stream,
//!                              size == Σ record_size × row_count
//! 6. pools                     after the data region, in order, no overlap
//! ```
//!
//! Column byte offsets are computed once here:
//! `offset(i) = data_offset + Σ_{j<i} record_size(j) × row_count`.
//!
//! ## Sharing
//!
//! `Table` is a cheap handle over `Arc<TableInner>`. Cloning it shares the
//! parsed header and the pool caches; every column reader still opens its
//! own cursor on the source. Opening the same source twice gives two
//! independent instances with separate pool caches.
//!
//! ## Closing
//!
//! `close` drops the pool caches. Every later access through this table or
//! any reader opened from it fails with `DisposedAccess`.

use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use eyre::{Result, WrapErr};
use parking_lot::RwLock;

use crate::config::{TableOptions, COLUMN_NAME_KEY, DESCRIPTOR_SIZE, FILE_HEADER_SIZE, SCAN_BUFFER_SIZE};
use crate::error::TableError;
use crate::storage::{BytesSource, FileSource, MmapSource, ReadSeek, TableSource};
use crate::table::column::{AnyColumnReader, ColumnReader, ColumnValue};
use crate::table::header::{ColumnDescriptor, TableHeader};
use crate::table::pools::PoolSet;
use crate::types::{ColumnType, Metadata, Value};

#[derive(Debug, Clone)]
pub(crate) struct ColumnInfo {
    pub(crate) column_type: ColumnType,
    pub(crate) metadata: Metadata,
    pub(crate) offset: u64,
}

pub(crate) struct TableInner {
    source: Arc<dyn TableSource>,
    options: TableOptions,
    header: TableHeader,
    metadata: Metadata,
    columns: Vec<ColumnInfo>,
    pools: RwLock<Option<Arc<PoolSet>>>,
    pool_loads: Arc<AtomicUsize>,
}

impl std::fmt::Debug for TableInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableInner")
            .field("source", &self.source.describe())
            .field("row_count", &self.header.row_count())
            .field("columns", &self.columns.len())
            .field("closed", &self.pools.read().is_none())
            .finish()
    }
}

impl TableInner {
    pub(crate) fn row_count(&self) -> u32 {
        self.header.row_count()
    }

    pub(crate) fn column_info(&self, column: usize) -> Result<&ColumnInfo> {
        self.columns.get(column).ok_or_else(|| {
            TableError::column_out_of_range(column as u64, self.columns.len() as u64).into()
        })
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.pools.read().is_none() {
            return Err(TableError::DisposedAccess { what: "table" }.into());
        }
        Ok(())
    }

    pub(crate) fn pools(&self) -> Result<Arc<PoolSet>> {
        self.pools
            .read()
            .as_ref()
            .cloned()
            .ok_or_else(|| TableError::DisposedAccess { what: "table" }.into())
    }

    pub(crate) fn open_cursor(&self) -> Result<Box<dyn ReadSeek>> {
        self.ensure_open()?;
        self.source.open_cursor()
    }
}

#[derive(Debug, Clone)]
pub struct Table {
    inner: Arc<TableInner>,
}

impl Table {
    pub fn open<S: TableSource + 'static>(source: S) -> Result<Self> {
        Self::open_with_options(Arc::new(source), TableOptions::default())
    }

    pub fn open_bytes(bytes: impl Into<Arc<[u8]>>) -> Result<Self> {
        Self::open(BytesSource::new(bytes))
    }

    /// Opens a table file, re-opening the file for every reader cursor.
    pub fn open_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open(FileSource::new(path))
    }

    /// Opens a table file through a shared read-only memory map.
    pub fn open_mmap<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open(MmapSource::open(path)?)
    }

    pub fn open_with_options(source: Arc<dyn TableSource>, options: TableOptions) -> Result<Self> {
        let stream_len = source.len()?;
        let mut reader = BufReader::with_capacity(SCAN_BUFFER_SIZE, source.open_cursor()?);

        if stream_len < FILE_HEADER_SIZE as u64 {
            return Err(TableError::corrupt(format!(
                "stream of {} bytes is shorter than the {}-byte header",
                stream_len, FILE_HEADER_SIZE
            ))
            .into());
        }
        let mut header_bytes = [0u8; FILE_HEADER_SIZE];
        reader
            .read_exact(&mut header_bytes)
            .wrap_err("failed to read table header")?;
        let header = TableHeader::from_bytes(&header_bytes)?;

        let mut position = FILE_HEADER_SIZE as u64;
        let (metadata, consumed) = Metadata::read_from(&mut reader, stream_len - position)
            .wrap_err("failed to read table metadata")?;
        position += consumed;

        let column_count = header.column_count() as u64;
        if column_count == 0 && header.row_count() != 0 {
            return Err(TableError::corrupt(format!(
                "table without columns declares {} rows",
                header.row_count()
            ))
            .into());
        }
        // Each column needs at least a one-byte metadata block and a descriptor.
        if column_count * (1 + DESCRIPTOR_SIZE as u64) > stream_len - position {
            return Err(TableError::corrupt(format!(
                "{} columns cannot fit in the remaining {} bytes",
                column_count,
                stream_len - position
            ))
            .into());
        }

        let mut column_metadata = Vec::with_capacity(column_count as usize);
        for column in 0..column_count {
            let (block, consumed) = Metadata::read_from(&mut reader, stream_len - position)
                .wrap_err_with(|| format!("failed to read metadata of column {}", column))?;
            position += consumed;
            column_metadata.push(block);
        }

        let descriptor_bytes = column_count * DESCRIPTOR_SIZE as u64;
        if descriptor_bytes > stream_len - position {
            return Err(TableError::corrupt("column descriptors run past the end of the stream").into());
        }
        let mut raw = vec![0u8; descriptor_bytes as usize];
        reader
            .read_exact(&mut raw)
            .wrap_err("failed to read column descriptors")?;
        position += descriptor_bytes;

        let mut column_types = Vec::with_capacity(column_count as usize);
        for chunk in raw.chunks_exact(DESCRIPTOR_SIZE) {
            column_types.push(ColumnDescriptor::from_bytes(chunk)?.column_type()?);
        }

        let row_count = header.row_count() as u64;
        let data_offset = header.data_offset();
        let data_end = validate_data_region(&header, &column_types, position, stream_len)?;
        validate_pools(&header, data_end, stream_len)?;

        let mut columns = Vec::with_capacity(column_types.len());
        let mut offset = data_offset;
        for (column_type, metadata) in column_types.into_iter().zip(column_metadata) {
            columns.push(ColumnInfo {
                column_type,
                metadata,
                offset,
            });
            offset += column_type.record_size() as u64 * row_count;
        }

        tracing::debug!(
            source = %source.describe(),
            columns = columns.len(),
            rows = row_count,
            data_size = header.data_size(),
            "opened table"
        );

        let pool_loads = Arc::new(AtomicUsize::new(0));
        let pools = PoolSet::new(Arc::clone(&source), &header, Arc::clone(&pool_loads));
        Ok(Self {
            inner: Arc::new(TableInner {
                source,
                options,
                header,
                metadata,
                columns,
                pools: RwLock::new(Some(Arc::new(pools))),
                pool_loads,
            }),
        })
    }

    pub fn row_count(&self) -> u32 {
        self.inner.row_count()
    }

    pub fn column_count(&self) -> usize {
        self.inner.columns.len()
    }

    pub fn column_types(&self) -> Vec<ColumnType> {
        self.inner.columns.iter().map(|c| c.column_type).collect()
    }

    pub fn column_type(&self, column: usize) -> Result<ColumnType> {
        Ok(self.inner.column_info(column)?.column_type)
    }

    pub fn column_name(&self, column: usize) -> Option<&str> {
        self.inner
            .columns
            .get(column)
            .and_then(|c| c.metadata.get(COLUMN_NAME_KEY))
    }

    /// Index of the first column whose name is `name`.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.inner
            .columns
            .iter()
            .position(|c| c.metadata.get(COLUMN_NAME_KEY) == Some(name))
    }

    pub fn metadata(&self) -> &Metadata {
        &self.inner.metadata
    }

    pub fn column_metadata(&self, column: usize) -> Result<&Metadata> {
        Ok(&self.inner.column_info(column)?.metadata)
    }

    pub fn header(&self) -> &TableHeader {
        &self.inner.header
    }

    pub fn options(&self) -> &TableOptions {
        &self.inner.options
    }

    /// Number of pools read from storage by this instance so far.
    pub fn pool_load_count(&self) -> usize {
        self.inner.pool_loads.load(Ordering::Relaxed)
    }

    /// Opens a typed reader over `column`. Fails with `TypeMismatch` when
    /// `T` does not match the stored column type.
    pub fn column<T: ColumnValue>(&self, column: usize) -> Result<ColumnReader<T>> {
        self.inner.ensure_open()?;
        ColumnReader::open(Arc::clone(&self.inner), column)
    }

    pub fn any_column(&self, column: usize) -> Result<AnyColumnReader> {
        self.inner.ensure_open()?;
        AnyColumnReader::open(Arc::clone(&self.inner), column)
    }

    pub fn get<T: ColumnValue>(&self, row: u32, column: usize) -> Result<T> {
        self.column::<T>(column)?.get(row)
    }

    pub fn get_value(&self, row: u32, column: usize) -> Result<Value> {
        self.any_column(column)?.get_value(row)
    }

    /// Releases the pool caches. Later accesses fail with `DisposedAccess`.
    pub fn close(&self) {
        let released = self.inner.pools.write().take();
        if released.is_some() {
            tracing::debug!(source = %self.inner.source.describe(), "closed table");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.pools.read().is_none()
    }

    pub(crate) fn pools(&self) -> Result<Arc<PoolSet>> {
        self.inner.pools()
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        self.inner.ensure_open()
    }
}

fn validate_data_region(
    header: &TableHeader,
    column_types: &[ColumnType],
    descriptors_end: u64,
    stream_len: u64,
) -> Result<u64> {
    let data_offset = header.data_offset();
    let data_size = header.data_size();
    if data_offset < descriptors_end {
        return Err(TableError::corrupt(format!(
            "data region at {} starts before the end of the descriptors at {}",
            data_offset, descriptors_end
        ))
        .into());
    }
    let data_end = data_offset
        .checked_add(data_size)
        .filter(|&end| end <= stream_len)
        .ok_or_else(|| {
            eyre::Report::from(TableError::corrupt(format!(
                "data region {}+{} exceeds the stream length {}",
                data_offset, data_size, stream_len
            )))
        })?;

    let row_count = header.row_count() as u64;
    let expected = column_types
        .iter()
        .map(|t| t.record_size() as u64 * row_count)
        .sum::<u64>();
    if expected != data_size {
        return Err(TableError::corrupt(format!(
            "data region holds {} bytes but {} columns of {} rows need {}",
            data_size,
            column_types.len(),
            row_count,
            expected
        ))
        .into());
    }
    Ok(data_end)
}

fn validate_pools(header: &TableHeader, data_end: u64, stream_len: u64) -> Result<()> {
    let mut previous_end = data_end;
    for (kind, entry) in header.pools() {
        if !entry.is_used() {
            if entry.count() != 0 {
                return Err(TableError::corrupt(format!(
                    "unused {} pool declares {} items",
                    kind.name(),
                    entry.count()
                ))
                .into());
            }
            continue;
        }

        let offset = entry.offset();
        if offset < previous_end {
            return Err(TableError::corrupt(format!(
                "{} pool at {} overlaps the data region or a previous pool ending at {}",
                kind.name(),
                offset,
                previous_end
            ))
            .into());
        }
        let end = offset
            .checked_add(entry.count() as u64 * kind.min_item_size())
            .filter(|&end| end <= stream_len)
            .ok_or_else(|| {
                eyre::Report::from(TableError::corrupt(format!(
                    "{} pool of {} items at {} runs past the end of the stream ({} bytes)",
                    kind.name(),
                    entry.count(),
                    offset,
                    stream_len
                )))
            })?;
        previous_end = end;
    }
    Ok(())
}
