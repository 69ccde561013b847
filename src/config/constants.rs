//! # coltable Format Constants
//!
//! This module centralizes the constants that define the on-disk layout and the
//! build-time buffering defaults. Constants that depend on each other are
//! co-located and their relationships checked at compile time.
//!
//! ## Dependency Graph
//!
//! ```text
//! FILE_HEADER_SIZE (128 bytes)
//!       │
//!       ├─> HEADER_FIXED_FIELDS (40 bytes: magic, version, counts, data region)
//!       │
//!       ├─> POOL_COUNT × POOL_ENTRY_SIZE (5 × 16 bytes)
//!       │
//!       └─> HEADER_RESERVED (remaining 8 bytes)
//!
//! DESCRIPTOR_SIZE (8 bytes per column)
//!       └─> type code (1) + reserved (3) + record size (4)
//!
//! DEFAULT_BUFFER_CAPACITY (items held in memory per hybrid buffer)
//!       └─> beyond this, items spill to a temporary stream
//! ```
//!
//! ## Critical Invariants
//!
//! 1. `HEADER_FIXED_FIELDS + POOL_COUNT * POOL_ENTRY_SIZE + HEADER_RESERVED == FILE_HEADER_SIZE`
//! 2. `MIN_BUFFER_CAPACITY <= DEFAULT_BUFFER_CAPACITY`

// ============================================================================
// FILE LAYOUT
// ============================================================================

/// Magic bytes at offset 0 of every table stream.
pub const TABLE_MAGIC: &[u8; 8] = b"COLTBL\x00\x01";

/// Current on-disk format version.
pub const FORMAT_VERSION: u32 = 1;

/// Size of the fixed header at the start of the stream.
pub const FILE_HEADER_SIZE: usize = 128;

/// Bytes used by magic, version, column/row counts, flags and the data region.
pub const HEADER_FIXED_FIELDS: usize = 40;

/// Number of shared pools (string, float, binary, index, weighted index).
pub const POOL_COUNT: usize = 5;

/// Size of one pool entry in the header: offset u64, count u32, reserved u32.
pub const POOL_ENTRY_SIZE: usize = 16;

/// Trailing reserved bytes of the header.
pub const HEADER_RESERVED: usize = 8;

/// Size of one column descriptor.
pub const DESCRIPTOR_SIZE: usize = 8;

const _: () = assert!(
    HEADER_FIXED_FIELDS + POOL_COUNT * POOL_ENTRY_SIZE + HEADER_RESERVED == FILE_HEADER_SIZE,
    "header field sizes must add up to FILE_HEADER_SIZE"
);

// ============================================================================
// BUILD-TIME BUFFERING
// ============================================================================

/// Default number of items a hybrid buffer keeps in memory before spilling.
pub const DEFAULT_BUFFER_CAPACITY: usize = 32 * 1024;

/// Smallest accepted buffer capacity. Smaller requests are clamped up.
pub const MIN_BUFFER_CAPACITY: usize = 1;

const _: () = assert!(
    MIN_BUFFER_CAPACITY <= DEFAULT_BUFFER_CAPACITY,
    "MIN_BUFFER_CAPACITY must not exceed DEFAULT_BUFFER_CAPACITY"
);

/// Size of the read buffer used for sequential column scans and pool loads.
pub const SCAN_BUFFER_SIZE: usize = 64 * 1024;

/// Metadata key holding a column's name.
pub const COLUMN_NAME_KEY: &str = "name";
