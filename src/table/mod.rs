//! # Table Module
//!
//! Building, reading and transforming frozen tables.
//!
//! ## Lifecycle
//!
//! ```text
//!   TableBuilder ──add_column/append──> HybridBuffers
//!        │
//!        └──write_to(sink)──> frozen bytes ──Table::open(source)──> Table
//!                                                                    │
//!                        ColumnReader<T> / AnyColumnReader <─────────┤
//!                        Row / RowIter                     <─────────┤
//!                        project, group_by, sample, ...    <─────────┘
//!                               │
//!                               └──> TableBuilder (new table)
//! ```
//!
//! A table is either being built (mutable, no readers) or frozen (immutable,
//! any number of readers). Table operations never modify their input; they
//! return builders for new tables.
//!
//! ## Module Organization
//!
//! - `header`: on-disk header, pool entries and column descriptors
//! - `builder`: `TableBuilder` and `ColumnWriter`
//! - `pools`: memoized shared pools of an open table
//! - `reader`: `Table::open` and table accessors
//! - `column`: typed and dynamic column readers
//! - `row`: row views and run coalescing
//! - `ops`: projection, sampling, shuffling, grouping, concatenation

mod builder;
mod column;
mod header;
mod ops;
mod pools;
mod reader;
mod row;

pub use builder::{ColumnWriter, TableBuilder};
pub use column::{AnyColumnReader, ColumnIter, ColumnReader, ColumnValue};
pub use header::{ColumnDescriptor, PoolEntry, TableHeader};
pub use ops::Group;
pub use pools::PoolSet;
pub use reader::Table;
pub use row::{coalesce_runs, Row, RowIter};
