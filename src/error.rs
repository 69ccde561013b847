//! # Table Error Kinds
//!
//! Every fallible operation in coltable returns `eyre::Result`. The failures a
//! caller may want to tell apart are raised as a [`TableError`] converted into
//! an `eyre::Report`, so they can be recovered with `downcast_ref`:
//!
//! ```ignore
//! match table.column::<i32>(1) {
//!     Err(report) => match report.downcast_ref::<TableError>() {
//!         Some(TableError::TypeMismatch { .. }) => { /* wrong accessor */ }
//!         _ => return Err(report),
//!     },
//!     Ok(reader) => { /* ... */ }
//! }
//! ```
//!
//! None of these kinds are retried internally. They describe either a
//! programming error (wrong type, index out of bounds, mismatched schemas) or a
//! file that cannot be read, never a transient condition. I/O errors from the
//! underlying stream are not mapped into this enum; they propagate as-is with
//! added context.

use crate::types::ColumnType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeKind {
    Row,
    Column,
    Pool,
}

impl RangeKind {
    pub fn name(&self) -> &'static str {
        match self {
            RangeKind::Row => "row",
            RangeKind::Column => "column",
            RangeKind::Pool => "pool",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableError {
    UnsupportedColumnType {
        code: u8,
    },
    InconsistentColumnLength {
        column: usize,
        expected: u64,
        actual: u64,
    },
    CorruptTable {
        reason: String,
    },
    TypeMismatch {
        column: usize,
        expected: ColumnType,
        actual: ColumnType,
    },
    OutOfRange {
        kind: RangeKind,
        index: u64,
        len: u64,
    },
    SchemaMismatch {
        table: usize,
        reason: String,
    },
    RowCountMismatch {
        table: usize,
        expected: u32,
        actual: u32,
    },
    DisposedAccess {
        what: &'static str,
    },
}

impl TableError {
    pub fn corrupt(reason: impl Into<String>) -> Self {
        TableError::CorruptTable {
            reason: reason.into(),
        }
    }

    pub fn row_out_of_range(index: u64, len: u64) -> Self {
        TableError::OutOfRange {
            kind: RangeKind::Row,
            index,
            len,
        }
    }

    pub fn column_out_of_range(index: u64, len: u64) -> Self {
        TableError::OutOfRange {
            kind: RangeKind::Column,
            index,
            len,
        }
    }
}

impl std::fmt::Display for TableError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TableError::UnsupportedColumnType { code } => {
                write!(f, "unsupported column type code {}", code)
            }
            TableError::InconsistentColumnLength {
                column,
                expected,
                actual,
            } => write!(
                f,
                "column {} has {} rows but the table has {}",
                column, actual, expected
            ),
            TableError::CorruptTable { reason } => write!(f, "corrupt table: {}", reason),
            TableError::TypeMismatch {
                column,
                expected,
                actual,
            } => write!(
                f,
                "column {} stores {} but was read as {}",
                column,
                actual.name(),
                expected.name()
            ),
            TableError::OutOfRange { kind, index, len } => write!(
                f,
                "{} index {} out of range (len {})",
                kind.name(),
                index,
                len
            ),
            TableError::SchemaMismatch { table, reason } => {
                write!(f, "schema of table {} does not match: {}", table, reason)
            }
            TableError::RowCountMismatch {
                table,
                expected,
                actual,
            } => write!(
                f,
                "table {} has {} rows, expected {}",
                table, actual, expected
            ),
            TableError::DisposedAccess { what } => {
                write!(f, "{} was used after it was closed", what)
            }
        }
    }
}

impl std::error::Error for TableError {}

/// Returns the `TableError` carried by a report, if any.
pub fn table_error(report: &eyre::Report) -> Option<&TableError> {
    report.downcast_ref::<TableError>()
}
