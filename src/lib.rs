//! # coltable - Column-Oriented Immutable Tables
//!
//! coltable stores tables column by column in a single binary stream and
//! reads them back lazily through typed column readers. Tables are written
//! once and never modified; reading is cheap, random access is O(1) per
//! cell, and variable-length payloads live in shared pools that are loaded at
//! most once per open table.
//!
//! ## Quick Start
//!
//! ```ignore
//! use coltable::{ColumnType, IndexList, Table, TableBuilder};
//!
//! let mut builder = TableBuilder::new();
//! builder.add_column(ColumnType::Int, "id").append_range([1, 2, 3])?;
//! builder.add_column(ColumnType::String, "tag").append_range(["a", "b", "a"])?;
//! builder
//!     .add_column(ColumnType::IndexList, "links")
//!     .append_range([vec![0u32, 2], vec![1], vec![]].map(IndexList::new))?;
//! let bytes = builder.write_to_vec()?;
//!
//! let table = Table::open_bytes(bytes)?;
//! let tags: Vec<String> = table.column::<String>(1)?.iter().collect::<eyre::Result<_>>()?;
//! let row = table.row(2)?;
//! let groups = table.group_by(&[1])?;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  Table operations (project, group_by, ...)  │
//! ├─────────────────────────────────────────────┤
//! │  Row assembly          │  TableBuilder      │
//! ├────────────────────────┤                    │
//! │  Column readers        │                    │
//! ├────────────────────────┼────────────────────┤
//! │  Table reader + pools  │  HybridBuffer      │
//! ├────────────────────────┴────────────────────┤
//! │  Fixed records, type catalog, values        │
//! ├─────────────────────────────────────────────┤
//! │  Sources (bytes, file, mmap) │ temp streams │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## File Layout
//!
//! ```text
//! header (128 bytes) | table metadata | column metadata × N | descriptors × N
//! | column data (column-major fixed records) | string | float | binary | index | weighted pools
//! ```
//!
//! ## Module Overview
//!
//! - [`table`]: builder, reader, column readers, rows and table operations
//! - [`types`]: column type catalog, fixed records, values, metadata
//! - [`storage`]: table sources, temporary streams, hybrid buffers
//! - [`encoding`]: varint codec for length prefixes
//! - [`config`]: format constants and `TableOptions`
//! - [`error`]: `TableError` kinds

#[macro_use]
mod macros;

pub mod config;
pub mod encoding;
pub mod error;
pub mod storage;
pub mod table;
pub mod types;

pub use config::TableOptions;
pub use error::{RangeKind, TableError};
pub use storage::{
    BytesSource, FileSource, InMemoryTempProvider, MmapSource, TableSource, TempFileProvider,
    TempStreamProvider,
};
pub use table::{
    AnyColumnReader, ColumnReader, ColumnValue, ColumnWriter, Group, Row, RowIter, Table,
    TableBuilder, TableHeader,
};
pub use types::{
    ColumnType, Date, FloatTensor, IndexList, Matrix, Metadata, Tensor3D, Tensor4D, Timestamp,
    Value, Vector, WeightedIndex, WeightedIndexList,
};
