//! # Column Readers
//!
//! A `ColumnReader<T>` decodes one column of a frozen table into values of
//! the Rust type `T`. The mapping from the stored fixed record to `T` is the
//! `ColumnValue` implementation for `T`:
//!
//! | `T` | Stored record | Pool |
//! |-----|---------------|------|
//! | `bool`, integers, floats, `Date`, `Timestamp` | the value itself | none |
//! | `Arc<str>`, `String` | `StringRef` | string |
//! | `Vec<u8>` | `DataRange` | binary |
//! | `IndexList` | `DataRange` | index |
//! | `WeightedIndexList` | `DataRange` | weighted index |
//! | `Vector` | `DataRange` | float |
//! | `Matrix`, `Tensor3D`, `Tensor4D` | shape record | float |
//!
//! Float-pool values are windows over the resident pool, so decoding a tensor
//! never copies its elements.
//!
//! ## Access Patterns
//!
//! ```text
//! iter()        seek once to the column start, then decode forward
//! get(i)        seek to start + i * record_size unless already there
//! ```
//!
//! The reader tracks the row under its cursor, so a run of `get(i)`,
//! `get(i + 1)`, ... performs no seeks after the first. Iteration restarts
//! from row 0 every time `iter()` is called.
//!
//! ## Dynamic Dispatch
//!
//! `AnyColumnReader` is a closed enum with one statically typed reader per
//! `ColumnType`. Row assembly and table operations use it when the column
//! types are only known at run time.
//!
//! ## Thread Safety
//!
//! A reader owns its own cursor and is `Send`, but all accessors take
//! `&mut self`. Threads that read the same column each open their own reader.

use std::io::{BufReader, Read, Seek, SeekFrom};
use std::marker::PhantomData;
use std::sync::Arc;

use eyre::{Result, WrapErr};

use crate::config::SCAN_BUFFER_SIZE;
use crate::error::TableError;
use crate::storage::ReadSeek;
use crate::table::pools::PoolSet;
use crate::table::reader::TableInner;
use crate::types::{
    checked_span, ColumnType, DataRange, Date, FixedRecord, FloatSpan, IndexList, Matrix,
    MatrixRecord, StringRef, Tensor3D, Tensor3DRecord, Tensor4D, Tensor4DRecord, Timestamp, Value,
    Vector, WeightedIndex, WeightedIndexList,
};

/// Converts a stored fixed record into a logical value.
pub trait ColumnValue: Sized {
    const COLUMN_TYPE: ColumnType;

    type Record: FixedRecord;

    /// The resident pool data the conversion needs, `()` for inline types.
    type Pool: Clone;

    fn load_pool(pools: &PoolSet) -> Result<Self::Pool>;

    fn decode(record: Self::Record, pool: &Self::Pool) -> Result<Self>;

    fn into_value(self) -> Value;
}

macro_rules! inline_column_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl ColumnValue for $ty {
                const COLUMN_TYPE: ColumnType = ColumnType::$variant;
                type Record = $ty;
                type Pool = ();

                #[inline]
                fn load_pool(_: &PoolSet) -> Result<()> {
                    Ok(())
                }

                #[inline]
                fn decode(record: $ty, _: &()) -> Result<Self> {
                    Ok(record)
                }

                #[inline]
                fn into_value(self) -> Value {
                    Value::$variant(self)
                }
            }
        )*
    };
}

inline_column_value! {
    bool => Boolean,
    i8 => SByte,
    u8 => Byte,
    i16 => Short,
    u16 => UShort,
    i32 => Int,
    u32 => UInt,
    i64 => Long,
    u64 => ULong,
    f32 => Float,
    f64 => Double,
    Date => Date,
    Timestamp => Timestamp,
}

impl ColumnValue for Arc<str> {
    const COLUMN_TYPE: ColumnType = ColumnType::String;
    type Record = StringRef;
    type Pool = Arc<[Arc<str>]>;

    fn load_pool(pools: &PoolSet) -> Result<Self::Pool> {
        pools.strings()
    }

    fn decode(record: StringRef, pool: &Self::Pool) -> Result<Self> {
        let span = checked_span(&record, pool.len())?;
        Ok(Arc::clone(&pool[span.start]))
    }

    fn into_value(self) -> Value {
        Value::String(self)
    }
}

impl ColumnValue for String {
    const COLUMN_TYPE: ColumnType = ColumnType::String;
    type Record = StringRef;
    type Pool = Arc<[Arc<str>]>;

    fn load_pool(pools: &PoolSet) -> Result<Self::Pool> {
        pools.strings()
    }

    fn decode(record: StringRef, pool: &Self::Pool) -> Result<Self> {
        <Arc<str> as ColumnValue>::decode(record, pool).map(|s| s.to_string())
    }

    fn into_value(self) -> Value {
        Value::from(self)
    }
}

impl ColumnValue for Vec<u8> {
    const COLUMN_TYPE: ColumnType = ColumnType::Binary;
    type Record = DataRange;
    type Pool = Arc<[u8]>;

    fn load_pool(pools: &PoolSet) -> Result<Self::Pool> {
        pools.binary()
    }

    fn decode(record: DataRange, pool: &Self::Pool) -> Result<Self> {
        let span = checked_span(&record, pool.len())?;
        Ok(pool[span].to_vec())
    }

    fn into_value(self) -> Value {
        Value::Binary(self)
    }
}

impl ColumnValue for IndexList {
    const COLUMN_TYPE: ColumnType = ColumnType::IndexList;
    type Record = DataRange;
    type Pool = Arc<[u32]>;

    fn load_pool(pools: &PoolSet) -> Result<Self::Pool> {
        pools.indices()
    }

    fn decode(record: DataRange, pool: &Self::Pool) -> Result<Self> {
        let span = checked_span(&record, pool.len())?;
        Ok(IndexList::new(pool[span].to_vec()))
    }

    fn into_value(self) -> Value {
        Value::IndexList(self)
    }
}

impl ColumnValue for WeightedIndexList {
    const COLUMN_TYPE: ColumnType = ColumnType::WeightedIndexList;
    type Record = DataRange;
    type Pool = Arc<[WeightedIndex]>;

    fn load_pool(pools: &PoolSet) -> Result<Self::Pool> {
        pools.weighted()
    }

    fn decode(record: DataRange, pool: &Self::Pool) -> Result<Self> {
        let span = checked_span(&record, pool.len())?;
        Ok(WeightedIndexList::new(pool[span].to_vec()))
    }

    fn into_value(self) -> Value {
        Value::WeightedIndexList(self)
    }
}

fn float_window<R: crate::types::PoolRecord>(record: &R, pool: &Arc<[f32]>) -> Result<FloatSpan> {
    let span = checked_span(record, pool.len())?;
    FloatSpan::window(pool, span.start, span.len())
        .ok_or_else(|| TableError::corrupt("tensor window outside the float pool").into())
}

impl ColumnValue for Vector {
    const COLUMN_TYPE: ColumnType = ColumnType::Vector;
    type Record = DataRange;
    type Pool = Arc<[f32]>;

    fn load_pool(pools: &PoolSet) -> Result<Self::Pool> {
        pools.floats()
    }

    fn decode(record: DataRange, pool: &Self::Pool) -> Result<Self> {
        Ok(Vector::new(float_window(&record, pool)?))
    }

    fn into_value(self) -> Value {
        Value::Vector(self)
    }
}

impl ColumnValue for Matrix {
    const COLUMN_TYPE: ColumnType = ColumnType::Matrix;
    type Record = MatrixRecord;
    type Pool = Arc<[f32]>;

    fn load_pool(pools: &PoolSet) -> Result<Self::Pool> {
        pools.floats()
    }

    fn decode(record: MatrixRecord, pool: &Self::Pool) -> Result<Self> {
        Matrix::new(record.rows(), record.columns(), float_window(&record, pool)?)
    }

    fn into_value(self) -> Value {
        Value::Matrix(self)
    }
}

impl ColumnValue for Tensor3D {
    const COLUMN_TYPE: ColumnType = ColumnType::Tensor3D;
    type Record = Tensor3DRecord;
    type Pool = Arc<[f32]>;

    fn load_pool(pools: &PoolSet) -> Result<Self::Pool> {
        pools.floats()
    }

    fn decode(record: Tensor3DRecord, pool: &Self::Pool) -> Result<Self> {
        Tensor3D::new(
            record.depth(),
            record.rows(),
            record.columns(),
            float_window(&record, pool)?,
        )
    }

    fn into_value(self) -> Value {
        Value::Tensor3D(self)
    }
}

impl ColumnValue for Tensor4D {
    const COLUMN_TYPE: ColumnType = ColumnType::Tensor4D;
    type Record = Tensor4DRecord;
    type Pool = Arc<[f32]>;

    fn load_pool(pools: &PoolSet) -> Result<Self::Pool> {
        pools.floats()
    }

    fn decode(record: Tensor4DRecord, pool: &Self::Pool) -> Result<Self> {
        Tensor4D::new(
            record.count(),
            record.depth(),
            record.rows(),
            record.columns(),
            float_window(&record, pool)?,
        )
    }

    fn into_value(self) -> Value {
        Value::Tensor4D(self)
    }
}

const MAX_RECORD_SIZE: usize = 32;

pub struct ColumnReader<T: ColumnValue> {
    table: Arc<TableInner>,
    column: usize,
    start: u64,
    len: u32,
    cursor: Option<BufReader<Box<dyn ReadSeek>>>,
    /// Row whose record the cursor points at next, if known.
    position: Option<u32>,
    pool: Option<T::Pool>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: ColumnValue> std::fmt::Debug for ColumnReader<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColumnReader")
            .field("column", &self.column)
            .field("column_type", &T::COLUMN_TYPE)
            .field("len", &self.len)
            .field("position", &self.position)
            .field("closed", &self.cursor.is_none())
            .finish()
    }
}

impl<T: ColumnValue> ColumnReader<T> {
    pub(crate) fn open(table: Arc<TableInner>, column: usize) -> Result<Self> {
        let info = table.column_info(column)?;
        if info.column_type != T::COLUMN_TYPE {
            return Err(TableError::TypeMismatch {
                column,
                expected: T::COLUMN_TYPE,
                actual: info.column_type,
            }
            .into());
        }
        let start = info.offset;
        let len = table.row_count();
        let cursor = table.open_cursor()?;

        Ok(Self {
            table,
            column,
            start,
            len,
            cursor: Some(BufReader::with_capacity(SCAN_BUFFER_SIZE, cursor)),
            position: None,
            pool: None,
            _marker: PhantomData,
        })
    }

    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn column(&self) -> usize {
        self.column
    }

    pub fn column_type(&self) -> ColumnType {
        T::COLUMN_TYPE
    }

    /// Decodes the value at `index`.
    pub fn get(&mut self, index: u32) -> Result<T> {
        if index >= self.len {
            return Err(TableError::row_out_of_range(index as u64, self.len as u64).into());
        }
        self.ensure_open()?;
        if self.position != Some(index) {
            self.seek_to(index)?;
        }
        self.read_next()
    }

    /// Iterates the whole column from row 0.
    pub fn iter(&mut self) -> ColumnIter<'_, T> {
        self.iter_from(0)
    }

    pub fn iter_from(&mut self, start: u32) -> ColumnIter<'_, T> {
        ColumnIter {
            next: start.min(self.len),
            reader: self,
        }
    }

    /// Releases the cursor and cached pool. Later accesses fail with
    /// `DisposedAccess`.
    pub fn close(&mut self) {
        self.cursor = None;
        self.pool = None;
        self.position = None;
    }

    pub fn is_closed(&self) -> bool {
        self.cursor.is_none()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.cursor.is_none() {
            return Err(TableError::DisposedAccess {
                what: "column reader",
            }
            .into());
        }
        self.table.ensure_open()
    }

    fn seek_to(&mut self, index: u32) -> Result<()> {
        let offset = self.start + index as u64 * <T::Record as FixedRecord>::SIZE as u64;
        let cursor = self.cursor_mut()?;
        cursor
            .seek(SeekFrom::Start(offset))
            .wrap_err_with(|| format!("failed to seek to row {}", index))?;
        self.position = Some(index);
        Ok(())
    }

    fn read_next(&mut self) -> Result<T> {
        if self.pool.is_none() {
            let pools = self.table.pools()?;
            self.pool = Some(T::load_pool(&pools)?);
        }

        let mut buf = [0u8; MAX_RECORD_SIZE];
        let record_bytes = &mut buf[..<T::Record as FixedRecord>::SIZE];
        let column = self.column;
        self.cursor_mut()?
            .read_exact(record_bytes)
            .wrap_err_with(|| format!("failed to read record of column {}", column))?;
        self.position = self.position.map(|p| p + 1);

        let record = <T::Record as FixedRecord>::decode(record_bytes)?;
        match self.pool.as_ref() {
            Some(pool) => T::decode(record, pool),
            None => Err(TableError::DisposedAccess {
                what: "column reader",
            }
            .into()),
        }
    }

    fn cursor_mut(&mut self) -> Result<&mut BufReader<Box<dyn ReadSeek>>> {
        self.cursor.as_mut().ok_or_else(|| {
            TableError::DisposedAccess {
                what: "column reader",
            }
            .into()
        })
    }
}

/// Forward iterator over a column. Created by `ColumnReader::iter`.
pub struct ColumnIter<'a, T: ColumnValue> {
    reader: &'a mut ColumnReader<T>,
    next: u32,
}

impl<T: ColumnValue> Iterator for ColumnIter<'_, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.reader.len {
            return None;
        }
        let index = self.next;
        self.next += 1;
        let item = self.reader.get(index);
        if item.is_err() {
            self.next = self.reader.len;
        }
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.reader.len.saturating_sub(self.next) as usize;
        (remaining, Some(remaining))
    }
}

macro_rules! any_column_reader {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        /// A column reader whose value type is chosen at run time.
        #[derive(Debug)]
        pub enum AnyColumnReader {
            $($variant(ColumnReader<$ty>),)*
        }

        impl AnyColumnReader {
            pub(crate) fn open(table: Arc<TableInner>, column: usize) -> Result<Self> {
                let column_type = table.column_info(column)?.column_type;
                match column_type {
                    $(ColumnType::$variant => Ok(AnyColumnReader::$variant(ColumnReader::open(table, column)?)),)*
                }
            }

            pub fn column_type(&self) -> ColumnType {
                match self {
                    $(AnyColumnReader::$variant(_) => ColumnType::$variant,)*
                }
            }

            pub fn len(&self) -> u32 {
                match self {
                    $(AnyColumnReader::$variant(r) => r.len(),)*
                }
            }

            pub fn is_empty(&self) -> bool {
                self.len() == 0
            }

            pub fn get_value(&mut self, index: u32) -> Result<Value> {
                match self {
                    $(AnyColumnReader::$variant(r) => r.get(index).map(ColumnValue::into_value),)*
                }
            }

            pub fn close(&mut self) {
                match self {
                    $(AnyColumnReader::$variant(r) => r.close(),)*
                }
            }
        }
    };
}

any_column_reader! {
    Boolean => bool,
    SByte => i8,
    Byte => u8,
    Short => i16,
    UShort => u16,
    Int => i32,
    UInt => u32,
    Long => i64,
    ULong => u64,
    Float => f32,
    Double => f64,
    Date => Date,
    Timestamp => Timestamp,
    String => Arc<str>,
    Binary => Vec<u8>,
    IndexList => IndexList,
    WeightedIndexList => WeightedIndexList,
    Vector => Vector,
    Matrix => Matrix,
    Tensor3D => Tensor3D,
    Tensor4D => Tensor4D,
}
