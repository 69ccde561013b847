//! # Fixed Records
//!
//! A fixed record is the constant-size value stored per row in the
//! column-data region. Scalars store themselves inline; variable-shaped values
//! store a reference into a shared pool plus, for tensors, their shape.
//!
//! ## Record Layouts
//!
//! ```text
//! StringRef       [index u32]
//! DataRange       [start u32 | count u32]
//! MatrixRecord    [start u32 | rows u32 | columns u32]
//! Tensor3DRecord  [start u32 | depth u32 | rows u32 | columns u32]
//! Tensor4DRecord  [start u32 | count u32 | depth u32 | rows u32 | columns u32]
//! ```
//!
//! All fields are little-endian. The pooled record structs derive the zerocopy
//! traits and are `Unaligned`, so they decode straight out of a read buffer.
//!
//! ## Pool Bounds
//!
//! `PoolRecord::pool_span` returns `(start, logical_size)`; a record is valid
//! only if `start + logical_size <= pool.len()` for the pool it references.

use eyre::Result;
use zerocopy::little_endian::U32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::error::TableError;
use crate::types::value::{Date, Timestamp};

pub trait FixedRecord: Sized + Copy {
    const SIZE: usize;

    /// Decodes from exactly `SIZE` bytes.
    fn decode(bytes: &[u8]) -> Result<Self>;

    fn encode(&self, out: &mut Vec<u8>);
}

/// A record that addresses a contiguous run of items in a shared pool.
pub trait PoolRecord: FixedRecord {
    /// `None` when the logical size does not fit in a `u64`.
    fn pool_span(&self) -> Option<(u64, u64)>;
}

fn short_record(expected: usize, actual: usize) -> eyre::Report {
    TableError::corrupt(format!(
        "record needs {} bytes, got {}",
        expected, actual
    ))
    .into()
}

macro_rules! inline_record {
    ($($ty:ty),* $(,)?) => {
        $(
            impl FixedRecord for $ty {
                const SIZE: usize = std::mem::size_of::<$ty>();

                #[inline]
                fn decode(bytes: &[u8]) -> Result<Self> {
                    let raw: [u8; std::mem::size_of::<$ty>()] = bytes
                        .try_into()
                        .map_err(|_| short_record(Self::SIZE, bytes.len()))?;
                    Ok(<$ty>::from_le_bytes(raw))
                }

                #[inline]
                fn encode(&self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_le_bytes());
                }
            }
        )*
    };
}

inline_record!(i8, u8, i16, u16, i32, u32, i64, u64, f32, f64);

impl FixedRecord for bool {
    const SIZE: usize = 1;

    #[inline]
    fn decode(bytes: &[u8]) -> Result<Self> {
        match bytes {
            [b] => Ok(*b != 0),
            _ => Err(short_record(1, bytes.len())),
        }
    }

    #[inline]
    fn encode(&self, out: &mut Vec<u8>) {
        out.push(u8::from(*self));
    }
}

impl FixedRecord for Date {
    const SIZE: usize = 4;

    fn decode(bytes: &[u8]) -> Result<Self> {
        i32::decode(bytes).map(Date)
    }

    fn encode(&self, out: &mut Vec<u8>) {
        self.0.encode(out)
    }
}

impl FixedRecord for Timestamp {
    const SIZE: usize = 8;

    fn decode(bytes: &[u8]) -> Result<Self> {
        i64::decode(bytes).map(Timestamp)
    }

    fn encode(&self, out: &mut Vec<u8>) {
        self.0.encode(out)
    }
}

macro_rules! zerocopy_record {
    ($($ty:ident),* $(,)?) => {
        $(
            const _: () = assert!(std::mem::size_of::<$ty>() == $ty::SIZE_BYTES);

            impl FixedRecord for $ty {
                const SIZE: usize = $ty::SIZE_BYTES;

                #[inline]
                fn decode(bytes: &[u8]) -> Result<Self> {
                    <$ty as FromBytes>::read_from_bytes(bytes)
                        .map_err(|_| short_record(Self::SIZE, bytes.len()))
                }

                #[inline]
                fn encode(&self, out: &mut Vec<u8>) {
                    out.extend_from_slice(self.as_bytes());
                }
            }
        )*
    };
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct StringRef {
    index: U32,
}

impl StringRef {
    const SIZE_BYTES: usize = 4;

    pub fn new(index: u32) -> Self {
        Self {
            index: U32::new(index),
        }
    }

    zerocopy_getters! {
        index: u32,
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct DataRange {
    start: U32,
    count: U32,
}

impl DataRange {
    const SIZE_BYTES: usize = 8;

    pub fn new(start: u32, count: u32) -> Self {
        Self {
            start: U32::new(start),
            count: U32::new(count),
        }
    }

    zerocopy_getters! {
        start: u32,
        count: u32,
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct MatrixRecord {
    start: U32,
    rows: U32,
    columns: U32,
}

impl MatrixRecord {
    const SIZE_BYTES: usize = 12;

    pub fn new(start: u32, rows: u32, columns: u32) -> Self {
        Self {
            start: U32::new(start),
            rows: U32::new(rows),
            columns: U32::new(columns),
        }
    }

    zerocopy_getters! {
        start: u32,
        rows: u32,
        columns: u32,
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct Tensor3DRecord {
    start: U32,
    depth: U32,
    rows: U32,
    columns: U32,
}

impl Tensor3DRecord {
    const SIZE_BYTES: usize = 16;

    pub fn new(start: u32, depth: u32, rows: u32, columns: u32) -> Self {
        Self {
            start: U32::new(start),
            depth: U32::new(depth),
            rows: U32::new(rows),
            columns: U32::new(columns),
        }
    }

    zerocopy_getters! {
        start: u32,
        depth: u32,
        rows: u32,
        columns: u32,
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct Tensor4DRecord {
    start: U32,
    count: U32,
    depth: U32,
    rows: U32,
    columns: U32,
}

impl Tensor4DRecord {
    const SIZE_BYTES: usize = 20;

    pub fn new(start: u32, count: u32, depth: u32, rows: u32, columns: u32) -> Self {
        Self {
            start: U32::new(start),
            count: U32::new(count),
            depth: U32::new(depth),
            rows: U32::new(rows),
            columns: U32::new(columns),
        }
    }

    zerocopy_getters! {
        start: u32,
        count: u32,
        depth: u32,
        rows: u32,
        columns: u32,
    }
}

zerocopy_record!(StringRef, DataRange, MatrixRecord, Tensor3DRecord, Tensor4DRecord);

impl PoolRecord for StringRef {
    fn pool_span(&self) -> Option<(u64, u64)> {
        Some((self.index() as u64, 1))
    }
}

impl PoolRecord for DataRange {
    fn pool_span(&self) -> Option<(u64, u64)> {
        Some((self.start() as u64, self.count() as u64))
    }
}

fn element_count(dims: &[u32]) -> Option<u64> {
    dims.iter()
        .try_fold(1u64, |acc, &d| acc.checked_mul(d as u64))
}

impl PoolRecord for MatrixRecord {
    fn pool_span(&self) -> Option<(u64, u64)> {
        let len = element_count(&[self.rows(), self.columns()])?;
        Some((self.start() as u64, len))
    }
}

impl PoolRecord for Tensor3DRecord {
    fn pool_span(&self) -> Option<(u64, u64)> {
        let len = element_count(&[self.depth(), self.rows(), self.columns()])?;
        Some((self.start() as u64, len))
    }
}

impl PoolRecord for Tensor4DRecord {
    fn pool_span(&self) -> Option<(u64, u64)> {
        let len = element_count(&[self.count(), self.depth(), self.rows(), self.columns()])?;
        Some((self.start() as u64, len))
    }
}

/// Checks a record's span against the resident pool length and returns the
/// `start..end` item range.
pub fn checked_span<R: PoolRecord>(record: &R, pool_len: usize) -> Result<std::ops::Range<usize>> {
    let Some((start, len)) = record.pool_span() else {
        return Err(TableError::corrupt("record shape overflows the addressable pool size").into());
    };
    match start.checked_add(len) {
        Some(end) if end <= pool_len as u64 => Ok(start as usize..end as usize),
        _ => Err(TableError::corrupt(format!(
            "record references {} items from {} in a pool holding {}",
            len, start, pool_len
        ))
        .into()),
    }
}
