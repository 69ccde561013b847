//! # Fixed-Record Type Catalog
//!
//! `ColumnType` is the logical type of a column. Every logical type maps,
//! deterministically and without I/O, to the shape of the fixed record stored
//! for each row in the column-data region and to that record's byte size.
//!
//! ## Catalog
//!
//! | Logical type | Record | Size | Pool |
//! |--------------|--------|------|------|
//! | Boolean, SByte, Byte | inline | 1 | - |
//! | Short, UShort | inline | 2 | - |
//! | Int, UInt, Float, Date | inline | 4 | - |
//! | Long, ULong, Double, Timestamp | inline | 8 | - |
//! | String | `StringRef` | 4 | string |
//! | Binary | `DataRange` | 8 | binary |
//! | IndexList | `DataRange` | 8 | index |
//! | WeightedIndexList | `DataRange` | 8 | weighted index |
//! | Vector | `DataRange` | 8 | float |
//! | Matrix | `MatrixRecord` | 12 | float |
//! | Tensor3D | `Tensor3DRecord` | 16 | float |
//! | Tensor4D | `Tensor4DRecord` | 20 | float |
//!
//! ## Discriminant Values
//!
//! Discriminants are grouped by category and are the codes written into the
//! column descriptors:
//! - 0-12: inline scalars
//! - 20-21: string and binary
//! - 30-31: sparse index lists
//! - 40-43: float tensors of rank 1 to 4
//!
//! Any other code is rejected with `UnsupportedColumnType`.

use crate::error::TableError;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Boolean = 0,
    SByte = 1,
    Byte = 2,
    Short = 3,
    UShort = 4,
    Int = 5,
    UInt = 6,
    Long = 7,
    ULong = 8,
    Float = 9,
    Double = 10,
    Date = 11,
    Timestamp = 12,

    String = 20,
    Binary = 21,

    IndexList = 30,
    WeightedIndexList = 31,

    Vector = 40,
    Matrix = 41,
    Tensor3D = 42,
    Tensor4D = 43,
}

/// Shape of the record stored per row in the column-data region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordShape {
    Inline(usize),
    StringRef,
    DataRange,
    Matrix,
    Tensor3D,
    Tensor4D,
}

impl RecordShape {
    pub fn size(&self) -> usize {
        match self {
            RecordShape::Inline(size) => *size,
            RecordShape::StringRef => 4,
            RecordShape::DataRange => 8,
            RecordShape::Matrix => 12,
            RecordShape::Tensor3D => 16,
            RecordShape::Tensor4D => 20,
        }
    }
}

/// The shared pools a table may carry, in their on-disk order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolKind {
    String,
    Float,
    Binary,
    Index,
    WeightedIndex,
}

impl PoolKind {
    pub const ALL: [PoolKind; 5] = [
        PoolKind::String,
        PoolKind::Float,
        PoolKind::Binary,
        PoolKind::Index,
        PoolKind::WeightedIndex,
    ];

    /// Position of this pool in the header's pool table.
    pub fn slot(&self) -> usize {
        match self {
            PoolKind::String => 0,
            PoolKind::Float => 1,
            PoolKind::Binary => 2,
            PoolKind::Index => 3,
            PoolKind::WeightedIndex => 4,
        }
    }

    /// Smallest encoded size of one pool item. Strings are varint-prefixed,
    /// so an empty string still takes one byte.
    pub fn min_item_size(&self) -> u64 {
        match self {
            PoolKind::String => 1,
            PoolKind::Float => 4,
            PoolKind::Binary => 1,
            PoolKind::Index => 4,
            PoolKind::WeightedIndex => 8,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PoolKind::String => "string",
            PoolKind::Float => "float",
            PoolKind::Binary => "binary",
            PoolKind::Index => "index",
            PoolKind::WeightedIndex => "weighted index",
        }
    }
}

impl ColumnType {
    pub const ALL: [ColumnType; 21] = [
        ColumnType::Boolean,
        ColumnType::SByte,
        ColumnType::Byte,
        ColumnType::Short,
        ColumnType::UShort,
        ColumnType::Int,
        ColumnType::UInt,
        ColumnType::Long,
        ColumnType::ULong,
        ColumnType::Float,
        ColumnType::Double,
        ColumnType::Date,
        ColumnType::Timestamp,
        ColumnType::String,
        ColumnType::Binary,
        ColumnType::IndexList,
        ColumnType::WeightedIndexList,
        ColumnType::Vector,
        ColumnType::Matrix,
        ColumnType::Tensor3D,
        ColumnType::Tensor4D,
    ];

    pub fn code(&self) -> u8 {
        *self as u8
    }

    pub fn record_shape(&self) -> RecordShape {
        match self {
            ColumnType::Boolean | ColumnType::SByte | ColumnType::Byte => RecordShape::Inline(1),
            ColumnType::Short | ColumnType::UShort => RecordShape::Inline(2),
            ColumnType::Int | ColumnType::UInt | ColumnType::Float | ColumnType::Date => {
                RecordShape::Inline(4)
            }
            ColumnType::Long | ColumnType::ULong | ColumnType::Double | ColumnType::Timestamp => {
                RecordShape::Inline(8)
            }
            ColumnType::String => RecordShape::StringRef,
            ColumnType::Binary
            | ColumnType::IndexList
            | ColumnType::WeightedIndexList
            | ColumnType::Vector => RecordShape::DataRange,
            ColumnType::Matrix => RecordShape::Matrix,
            ColumnType::Tensor3D => RecordShape::Tensor3D,
            ColumnType::Tensor4D => RecordShape::Tensor4D,
        }
    }

    pub fn record_size(&self) -> usize {
        self.record_shape().size()
    }

    /// The shared pool holding this type's payloads, or `None` for inline scalars.
    pub fn pool(&self) -> Option<PoolKind> {
        match self {
            ColumnType::String => Some(PoolKind::String),
            ColumnType::Binary => Some(PoolKind::Binary),
            ColumnType::IndexList => Some(PoolKind::Index),
            ColumnType::WeightedIndexList => Some(PoolKind::WeightedIndex),
            ColumnType::Vector | ColumnType::Matrix | ColumnType::Tensor3D | ColumnType::Tensor4D => {
                Some(PoolKind::Float)
            }
            _ => None,
        }
    }

    pub fn is_pooled(&self) -> bool {
        self.pool().is_some()
    }

    /// Tensor rank for float-pool types (vector = 1).
    pub fn tensor_rank(&self) -> Option<usize> {
        match self {
            ColumnType::Vector => Some(1),
            ColumnType::Matrix => Some(2),
            ColumnType::Tensor3D => Some(3),
            ColumnType::Tensor4D => Some(4),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ColumnType::Boolean => "boolean",
            ColumnType::SByte => "sbyte",
            ColumnType::Byte => "byte",
            ColumnType::Short => "short",
            ColumnType::UShort => "ushort",
            ColumnType::Int => "int",
            ColumnType::UInt => "uint",
            ColumnType::Long => "long",
            ColumnType::ULong => "ulong",
            ColumnType::Float => "float",
            ColumnType::Double => "double",
            ColumnType::Date => "date",
            ColumnType::Timestamp => "timestamp",
            ColumnType::String => "string",
            ColumnType::Binary => "binary",
            ColumnType::IndexList => "index list",
            ColumnType::WeightedIndexList => "weighted index list",
            ColumnType::Vector => "vector",
            ColumnType::Matrix => "matrix",
            ColumnType::Tensor3D => "tensor3d",
            ColumnType::Tensor4D => "tensor4d",
        }
    }
}

impl TryFrom<u8> for ColumnType {
    type Error = TableError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        ColumnType::ALL
            .iter()
            .copied()
            .find(|ty| ty.code() == code)
            .ok_or(TableError::UnsupportedColumnType { code })
    }
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
