//! # Table Builder
//!
//! `TableBuilder` collects columns of values and writes them as one frozen
//! table. Each column accumulates in its own `HybridBuffer<Value>`, so a
//! builder can hold far more rows than fit in memory.
//!
//! ## Write Sequence
//!
//! ```text
//! 1. check every column has the same length       (nothing written on failure)
//! 2. placeholder header
//! 3. table metadata, column metadata × N
//! 4. descriptors × N
//! 5. column data, column by column               pooled payloads go to pool buffers
//! 6. pools in PoolKind order                      only the ones some column used
//! 7. seek back, final header, seek to the end
//! ```
//!
//! ## Pool Buffers
//!
//! A pool buffer is created the first time a row needs it. Pools nothing
//! referenced stay absent and keep offset 0 in the header. With
//! `TableOptions::dedup_strings` the string pool stores each distinct string
//! once and repeated strings reference the slot of their first occurrence.
//!
//! Pool-relative positions are `u32`, so a pool is limited to `u32::MAX`
//! items. Exceeding that fails the write with `OutOfRange`.
//!
//! ## Stream Position
//!
//! Offsets in the header are relative to the position of the stream when
//! `write_to` is called, so a table can be embedded at any position of a
//! larger stream and read back from a source that starts there.

use std::io::{BufWriter, Cursor, Seek, SeekFrom, Write};
use std::sync::Arc;

use eyre::{ensure, Result, WrapErr};
use zerocopy::IntoBytes;

use crate::config::{TableOptions, COLUMN_NAME_KEY, FILE_HEADER_SIZE, SCAN_BUFFER_SIZE};
use crate::error::{RangeKind, TableError};
use crate::storage::{BufferItem, HybridBuffer, TempStreamProvider};
use crate::table::header::{ColumnDescriptor, PoolEntry, TableHeader};
use crate::types::{
    tensor_value, ColumnType, DataRange, FixedRecord, FloatTensor, MatrixRecord, Metadata,
    PoolKind, StringRef, Tensor3DRecord, Tensor4DRecord, Value, WeightedIndex,
};

struct BuilderColumn {
    column_type: ColumnType,
    metadata: Metadata,
    values: HybridBuffer<Value>,
}

pub struct TableBuilder {
    options: TableOptions,
    metadata: Metadata,
    columns: Vec<BuilderColumn>,
}

impl std::fmt::Debug for TableBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableBuilder")
            .field("options", &self.options)
            .field("columns", &self.column_types())
            .field("rows", &self.row_count())
            .finish()
    }
}

impl Default for TableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TableBuilder {
    pub fn new() -> Self {
        Self::with_options(TableOptions::default())
    }

    pub fn with_options(options: TableOptions) -> Self {
        Self {
            options,
            metadata: Metadata::new(),
            columns: Vec::new(),
        }
    }

    pub fn with_temp_provider(provider: Arc<dyn TempStreamProvider>) -> Self {
        Self::with_options(TableOptions::new().temp_provider(provider))
    }

    pub fn options(&self) -> &TableOptions {
        &self.options
    }

    /// Adds a column named `name` and returns its write handle.
    pub fn add_column(&mut self, column_type: ColumnType, name: &str) -> ColumnWriter<'_> {
        let mut metadata = Metadata::new();
        metadata.set(COLUMN_NAME_KEY, name);
        self.add_column_with_metadata(column_type, metadata)
    }

    pub fn add_column_with_metadata(
        &mut self,
        column_type: ColumnType,
        metadata: Metadata,
    ) -> ColumnWriter<'_> {
        let values = HybridBuffer::new(
            self.options.get_buffer_capacity(),
            Arc::clone(self.options.get_temp_provider()),
        );
        self.columns.push(BuilderColumn {
            column_type,
            metadata,
            values,
        });
        let index = self.columns.len() - 1;
        ColumnWriter {
            index,
            column: &mut self.columns[index],
        }
    }

    pub fn column_mut(&mut self, index: usize) -> Result<ColumnWriter<'_>> {
        let len = self.columns.len();
        let column = self
            .columns
            .get_mut(index)
            .ok_or_else(|| TableError::column_out_of_range(index as u64, len as u64))?;
        Ok(ColumnWriter { index, column })
    }

    pub fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_types(&self) -> Vec<ColumnType> {
        self.columns.iter().map(|c| c.column_type).collect()
    }

    /// Length of the first column; 0 without columns.
    pub fn row_count(&self) -> u64 {
        self.columns.first().map_or(0, |c| c.values.len())
    }

    /// Appends one value to every column. The whole row is type-checked
    /// before anything is appended.
    pub fn append_row(&mut self, row: &[Value]) -> Result<()> {
        ensure!(
            row.len() == self.columns.len(),
            "row has {} values but the table has {} columns",
            row.len(),
            self.columns.len()
        );
        for (index, (column, value)) in self.columns.iter().zip(row).enumerate() {
            check_type(index, column.column_type, value)?;
        }
        for (column, value) in self.columns.iter_mut().zip(row) {
            column.values.append(value.clone())?;
        }
        Ok(())
    }

    pub fn write_to_vec(self) -> Result<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::new());
        self.write_to(&mut cursor)?;
        Ok(cursor.into_inner())
    }

    /// Writes the table and returns the final header.
    pub fn write_to<W: Write + Seek>(self, out: &mut W) -> Result<TableHeader> {
        let row_count = self.row_count();
        for (index, column) in self.columns.iter().enumerate() {
            if column.values.len() != row_count {
                return Err(TableError::InconsistentColumnLength {
                    column: index,
                    expected: row_count,
                    actual: column.values.len(),
                }
                .into());
            }
        }
        let row_count = u32::try_from(row_count)
            .map_err(|_| TableError::row_out_of_range(row_count, u32::MAX as u64))?;
        let column_count = u32::try_from(self.columns.len()).map_err(|_| {
            TableError::column_out_of_range(self.columns.len() as u64, u32::MAX as u64)
        })?;

        let base = out
            .stream_position()
            .wrap_err("failed to query stream position")?;
        let mut header = TableHeader::new(column_count, row_count);
        out.write_all(header.as_bytes())
            .wrap_err("failed to write header placeholder")?;

        let mut writer = CountingWriter::new(
            BufWriter::with_capacity(SCAN_BUFFER_SIZE, &mut *out),
            FILE_HEADER_SIZE as u64,
        );

        self.metadata
            .write_to(&mut writer)
            .wrap_err("failed to write table metadata")?;
        for column in &self.columns {
            column
                .metadata
                .write_to(&mut writer)
                .wrap_err("failed to write column metadata")?;
        }
        for column in &self.columns {
            writer
                .write_all(ColumnDescriptor::new(column.column_type).as_bytes())
                .wrap_err("failed to write column descriptor")?;
        }

        let data_offset = writer.position();
        let mut pools = PoolBuffers::new(&self.options);
        let mut record = Vec::with_capacity(32);
        for (index, column) in self.columns.into_iter().enumerate() {
            let column_type = column.column_type;
            let start = writer.position();
            column.values.flush(|value| {
                record.clear();
                pools.encode(index, column_type, value, &mut record)?;
                writer
                    .write_all(&record)
                    .wrap_err("failed to write column record")
            })?;
            tracing::trace!(
                column = index,
                column_type = column_type.name(),
                bytes = writer.position() - start,
                "wrote column data"
            );
        }
        let data_size = writer.position() - data_offset;
        header.set_data_offset(data_offset);
        header.set_data_size(data_size);

        pools.flush_all(&mut writer, &mut header)?;

        let end = writer.position();
        writer
            .into_inner()
            .into_inner()
            .map_err(|e| eyre::eyre!("failed to flush table stream: {}", e.error()))?;

        out.seek(SeekFrom::Start(base))
            .wrap_err("failed to seek back to the header")?;
        out.write_all(header.as_bytes())
            .wrap_err("failed to write final header")?;
        out.seek(SeekFrom::Start(base + end))
            .wrap_err("failed to seek to the end of the table")?;
        out.flush().wrap_err("failed to flush table stream")?;

        tracing::debug!(
            columns = column_count,
            rows = row_count,
            data_size,
            bytes = end,
            "wrote table"
        );
        Ok(header)
    }
}

fn check_type(column: usize, expected: ColumnType, value: &Value) -> Result<()> {
    let actual = value.column_type();
    if actual != expected {
        return Err(TableError::TypeMismatch {
            column,
            expected,
            actual,
        }
        .into());
    }
    Ok(())
}

/// Write handle for one column of a `TableBuilder`.
pub struct ColumnWriter<'a> {
    index: usize,
    column: &'a mut BuilderColumn,
}

impl std::fmt::Debug for ColumnWriter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColumnWriter")
            .field("index", &self.index)
            .field("column_type", &self.column.column_type)
            .field("len", &self.column.values.len())
            .finish()
    }
}

impl ColumnWriter<'_> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn column_type(&self) -> ColumnType {
        self.column.column_type
    }

    pub fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.column.metadata
    }

    /// Appends one value. Fails with `TypeMismatch` when the value's type is
    /// not the column's type.
    pub fn append(&mut self, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        check_type(self.index, self.column.column_type, &value)?;
        self.column.values.append(value)
    }

    pub fn append_range<I, V>(&mut self, values: I) -> Result<()>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        for value in values {
            self.append(value)?;
        }
        Ok(())
    }

    /// Appends any tensor whose rank matches the column type.
    pub fn append_tensor<T: FloatTensor + ?Sized>(&mut self, tensor: &T) -> Result<()> {
        let value = tensor_value(self.column.column_type, tensor)?;
        self.append(value)
    }

    pub fn len(&self) -> u64 {
        self.column.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.column.values.is_empty()
    }
}

/// Lazily created pool buffers for one write.
struct PoolBuffers<'a> {
    options: &'a TableOptions,
    strings: Option<HybridBuffer<Arc<str>>>,
    floats: Option<HybridBuffer<f32>>,
    binary: Option<HybridBuffer<u8>>,
    indices: Option<HybridBuffer<u32>>,
    weighted: Option<HybridBuffer<WeightedIndex>>,
}

fn new_pool<T: BufferItem>(options: &TableOptions) -> HybridBuffer<T> {
    HybridBuffer::new(
        options.get_buffer_capacity(),
        Arc::clone(options.get_temp_provider()),
    )
}

/// Position of the next item of a pool, checked against the `u32` limit of
/// pool-relative records.
fn pool_start<T: BufferItem>(pool: &HybridBuffer<T>, adding: usize) -> Result<(u32, u32)> {
    let start = pool.len();
    let end = start + adding as u64;
    if end > u32::MAX as u64 {
        return Err(TableError::OutOfRange {
            kind: RangeKind::Pool,
            index: end,
            len: u32::MAX as u64,
        }
        .into());
    }
    Ok((start as u32, adding as u32))
}

impl<'a> PoolBuffers<'a> {
    fn new(options: &'a TableOptions) -> Self {
        Self {
            options,
            strings: None,
            floats: None,
            binary: None,
            indices: None,
            weighted: None,
        }
    }

    fn floats(&mut self) -> &mut HybridBuffer<f32> {
        let options = self.options;
        self.floats.get_or_insert_with(|| new_pool(options))
    }

    fn append_floats(&mut self, data: &[f32]) -> Result<u32> {
        let pool = self.floats();
        let (start, _) = pool_start(pool, data.len())?;
        pool.append_range(data.iter().copied())?;
        Ok(start)
    }

    /// Turns one value into its fixed record, moving any payload into the
    /// pool it belongs to.
    fn encode(
        &mut self,
        column: usize,
        column_type: ColumnType,
        value: Value,
        record: &mut Vec<u8>,
    ) -> Result<()> {
        check_type(column, column_type, &value)?;
        match value {
            Value::Boolean(v) => v.encode(record),
            Value::SByte(v) => v.encode(record),
            Value::Byte(v) => v.encode(record),
            Value::Short(v) => v.encode(record),
            Value::UShort(v) => v.encode(record),
            Value::Int(v) => v.encode(record),
            Value::UInt(v) => v.encode(record),
            Value::Long(v) => v.encode(record),
            Value::ULong(v) => v.encode(record),
            Value::Float(v) => v.encode(record),
            Value::Double(v) => v.encode(record),
            Value::Date(v) => v.encode(record),
            Value::Timestamp(v) => v.encode(record),
            Value::String(s) => {
                let options = self.options;
                let pool = self.strings.get_or_insert_with(|| {
                    if options.get_dedup_strings() {
                        HybridBuffer::with_dedup(
                            options.get_buffer_capacity(),
                            Arc::clone(options.get_temp_provider()),
                        )
                    } else {
                        new_pool(options)
                    }
                });
                let slot = pool.append_distinct(s)?;
                StringRef::new(slot).encode(record);
            }
            Value::Binary(bytes) => {
                let options = self.options;
                let pool = self.binary.get_or_insert_with(|| new_pool(options));
                let (start, count) = pool_start(pool, bytes.len())?;
                pool.append_range(bytes)?;
                DataRange::new(start, count).encode(record);
            }
            Value::IndexList(list) => {
                let options = self.options;
                let pool = self.indices.get_or_insert_with(|| new_pool(options));
                let (start, count) = pool_start(pool, list.len())?;
                pool.append_range(list.into_vec())?;
                DataRange::new(start, count).encode(record);
            }
            Value::WeightedIndexList(list) => {
                let options = self.options;
                let pool = self.weighted.get_or_insert_with(|| new_pool(options));
                let (start, count) = pool_start(pool, list.len())?;
                pool.append_range(list.as_slice().iter().copied())?;
                DataRange::new(start, count).encode(record);
            }
            Value::Vector(v) => {
                let start = self.append_floats(v.data())?;
                DataRange::new(start, v.len() as u32).encode(record);
            }
            Value::Matrix(m) => {
                let start = self.append_floats(m.data())?;
                MatrixRecord::new(start, m.rows(), m.columns()).encode(record);
            }
            Value::Tensor3D(t) => {
                let start = self.append_floats(t.data())?;
                Tensor3DRecord::new(start, t.depth(), t.rows(), t.columns()).encode(record);
            }
            Value::Tensor4D(t) => {
                let start = self.append_floats(t.data())?;
                Tensor4DRecord::new(start, t.count(), t.depth(), t.rows(), t.columns())
                    .encode(record);
            }
        }
        Ok(())
    }

    fn flush_all<W: Write>(
        self,
        writer: &mut CountingWriter<W>,
        header: &mut TableHeader,
    ) -> Result<()> {
        flush_pool(self.strings, PoolKind::String, writer, header)?;
        flush_pool(self.floats, PoolKind::Float, writer, header)?;
        flush_pool(self.binary, PoolKind::Binary, writer, header)?;
        flush_pool(self.indices, PoolKind::Index, writer, header)?;
        flush_pool(self.weighted, PoolKind::WeightedIndex, writer, header)?;
        Ok(())
    }
}

fn flush_pool<T: BufferItem, W: Write>(
    pool: Option<HybridBuffer<T>>,
    kind: PoolKind,
    writer: &mut CountingWriter<W>,
    header: &mut TableHeader,
) -> Result<()> {
    let Some(pool) = pool else {
        return Ok(());
    };
    let offset = writer.position();
    let count = pool.flush(|item| {
        item.write_item(writer)
            .wrap_err_with(|| format!("failed to write {} pool", kind.name()))
    })?;
    header.set_pool(kind, PoolEntry::new(offset, count as u32));
    tracing::trace!(pool = kind.name(), offset, count, "wrote shared pool");
    Ok(())
}

/// Tracks the table-relative position of everything written through it.
struct CountingWriter<W> {
    inner: W,
    position: u64,
}

impl<W: Write> CountingWriter<W> {
    fn new(inner: W, position: u64) -> Self {
        Self { inner, position }
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.position += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}
