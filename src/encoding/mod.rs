//! # Encoding Module
//!
//! Length prefixes in the table format (metadata entries, string pool entries)
//! use the variable-length integer codec in [`varint`]. Fixed-width fields use
//! zerocopy little-endian structs instead and never go through this module.

pub mod varint;

pub use varint::{decode_varint, encode_varint, read_varint, varint_len, write_varint};
