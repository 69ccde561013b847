//! # Table Header and Descriptors
//!
//! The first 128 bytes of every table stream. The header is written twice: a
//! placeholder before any column data, then the final version once all pools
//! have been flushed and their offsets are known.
//!
//! ## Header Layout (128 bytes)
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 0       8     magic "COLTBL\0\x01"
//! 8       4     version
//! 12      4     column_count
//! 16      4     row_count
//! 20      4     flags (reserved, 0)
//! 24      8     data_offset: start of the column-data region
//! 32      8     data_size: bytes in the column-data region
//! 40      80    pools[5]: { offset u64, count u32, reserved u32 }
//! 120     8     reserved
//! ```
//!
//! Pools appear in `PoolKind` order: string, float, binary, index, weighted.
//! A pool entry with offset 0 means the pool is unused.
//!
//! ## Descriptor Layout (8 bytes per column)
//!
//! ```text
//! 0       1     column type code
//! 1       3     reserved
//! 4       4     record_size
//! ```

use eyre::{ensure, Result};
use zerocopy::little_endian::{U32, U64};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::config::{DESCRIPTOR_SIZE, FILE_HEADER_SIZE, FORMAT_VERSION, POOL_COUNT, POOL_ENTRY_SIZE, TABLE_MAGIC};
use crate::error::TableError;
use crate::types::{ColumnType, PoolKind};

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct PoolEntry {
    offset: U64,
    count: U32,
    reserved: U32,
}

const _: () = assert!(std::mem::size_of::<PoolEntry>() == POOL_ENTRY_SIZE);

impl PoolEntry {
    pub fn new(offset: u64, count: u32) -> Self {
        Self {
            offset: U64::new(offset),
            count: U32::new(count),
            reserved: U32::new(0),
        }
    }

    zerocopy_accessors! {
        offset: u64,
        count: u32,
    }

    pub fn is_used(&self) -> bool {
        self.offset() != 0
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct TableHeader {
    magic: [u8; 8],
    version: U32,
    column_count: U32,
    row_count: U32,
    flags: U32,
    data_offset: U64,
    data_size: U64,
    pools: [PoolEntry; POOL_COUNT],
    reserved: [u8; 8],
}

const _: () = assert!(std::mem::size_of::<TableHeader>() == FILE_HEADER_SIZE);

impl TableHeader {
    pub fn new(column_count: u32, row_count: u32) -> Self {
        Self {
            magic: *TABLE_MAGIC,
            version: U32::new(FORMAT_VERSION),
            column_count: U32::new(column_count),
            row_count: U32::new(row_count),
            flags: U32::new(0),
            data_offset: U64::new(0),
            data_size: U64::new(0),
            pools: [PoolEntry::default(); POOL_COUNT],
            reserved: [0u8; 8],
        }
    }

    /// Parses and validates magic and version. Structural checks against the
    /// stream length happen in `Table::open`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < FILE_HEADER_SIZE {
            return Err(TableError::corrupt(format!(
                "stream of {} bytes is shorter than the {}-byte header",
                bytes.len(),
                FILE_HEADER_SIZE
            ))
            .into());
        }

        let header = Self::read_from_bytes(&bytes[..FILE_HEADER_SIZE])
            .map_err(|e| eyre::eyre!("failed to parse TableHeader: {:?}", e))?;

        if &header.magic != TABLE_MAGIC {
            return Err(TableError::corrupt("invalid magic bytes").into());
        }
        if header.version() != FORMAT_VERSION {
            return Err(TableError::corrupt(format!(
                "unsupported format version {} (expected {})",
                header.version(),
                FORMAT_VERSION
            ))
            .into());
        }

        Ok(header)
    }

    zerocopy_accessors! {
        version: u32,
        column_count: u32,
        row_count: u32,
        flags: u32,
        data_offset: u64,
        data_size: u64,
    }

    pub fn pool(&self, kind: PoolKind) -> &PoolEntry {
        &self.pools[kind.slot()]
    }

    pub fn set_pool(&mut self, kind: PoolKind, entry: PoolEntry) {
        self.pools[kind.slot()] = entry;
    }

    pub fn pools(&self) -> impl Iterator<Item = (PoolKind, &PoolEntry)> {
        PoolKind::ALL.iter().map(move |&kind| (kind, self.pool(kind)))
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct ColumnDescriptor {
    column_type: u8,
    reserved: [u8; 3],
    record_size: U32,
}

const _: () = assert!(std::mem::size_of::<ColumnDescriptor>() == DESCRIPTOR_SIZE);

impl ColumnDescriptor {
    pub fn new(column_type: ColumnType) -> Self {
        Self {
            column_type: column_type.code(),
            reserved: [0u8; 3],
            record_size: U32::new(column_type.record_size() as u32),
        }
    }

    /// Decodes a descriptor and checks it against the type catalog.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ensure!(
            bytes.len() >= DESCRIPTOR_SIZE,
            "buffer too small for ColumnDescriptor: {} < {}",
            bytes.len(),
            DESCRIPTOR_SIZE
        );
        let descriptor = Self::read_from_bytes(&bytes[..DESCRIPTOR_SIZE])
            .map_err(|e| eyre::eyre!("failed to parse ColumnDescriptor: {:?}", e))?;

        let column_type = descriptor.column_type()?;
        if descriptor.record_size() as usize != column_type.record_size() {
            return Err(TableError::corrupt(format!(
                "{} column declares {}-byte records, expected {}",
                column_type,
                descriptor.record_size(),
                column_type.record_size()
            ))
            .into());
        }
        Ok(descriptor)
    }

    pub fn column_type(&self) -> Result<ColumnType> {
        Ok(ColumnType::try_from(self.column_type)?)
    }

    pub fn record_size(&self) -> u32 {
        self.record_size.get()
    }
}
