//! # Type System
//!
//! ## Module Structure
//!
//! - `column_type`: `ColumnType` catalog mapping logical types to fixed records
//! - `records`: fixed on-disk records (`DataRange`, `MatrixRecord`, ...)
//! - `value`: logical values (`Value`, `IndexList`, tensors)
//! - `metadata`: key/value metadata blocks
//!
//! ## Key Types
//!
//! | Type | Purpose |
//! |------|---------|
//! | `ColumnType` | Logical column type, stored as a one-byte code |
//! | `RecordShape` | Shape of the per-row fixed record |
//! | `PoolKind` | Shared pool referenced by a pooled record |
//! | `Value` | Dynamic cell value |
//! | `Metadata` | Ordered key/value block |

mod column_type;
mod metadata;
mod records;
mod value;

pub use column_type::{ColumnType, PoolKind, RecordShape};
pub use metadata::Metadata;
pub(crate) use metadata::write_str;
pub use records::{
    checked_span, DataRange, FixedRecord, MatrixRecord, PoolRecord, StringRef, Tensor3DRecord,
    Tensor4DRecord,
};
pub use value::{
    tensor_value, Date, FloatSpan, FloatTensor, GroupKey, IndexList, Matrix, Tensor3D, Tensor4D,
    Timestamp, Value, Vector, WeightedIndex, WeightedIndexList,
};
