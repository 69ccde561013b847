//! # Internal Macros
//!
//! ## zerocopy_accessors!
//!
//! Generates getter and setter methods for fields of the on-disk structs that
//! use zerocopy little-endian wrapper types (`U32`, `U64`).
//!
//! ```ignore
//! use zerocopy::little_endian::{U32, U64};
//!
//! #[repr(C)]
//! struct PoolEntry {
//!     offset: U64,
//!     count: U32,
//! }
//!
//! impl PoolEntry {
//!     zerocopy_accessors! {
//!         offset: u64,
//!         count: u32,
//!     }
//! }
//!
//! // Generates:
//! // pub fn offset(&self) -> u64 { self.offset.get() }
//! // pub fn set_offset(&mut self, val: u64) { self.offset = U64::new(val); }
//! // pub fn count(&self) -> u32 { self.count.get() }
//! // pub fn set_count(&mut self, val: u32) { self.count = U32::new(val); }
//! ```
//!
//! ## zerocopy_getters!
//!
//! Read-only variant for records that are immutable once written (the fixed
//! records stored in the column-data region).

/// Generates getter and setter methods for zerocopy little-endian fields.
#[macro_export]
macro_rules! zerocopy_accessors {
    (@impl $field:ident, u32) => {
        ::paste::paste! {
            #[inline]
            pub fn $field(&self) -> u32 {
                self.$field.get()
            }

            #[inline]
            pub fn [<set_ $field>](&mut self, val: u32) {
                self.$field = ::zerocopy::little_endian::U32::new(val);
            }
        }
    };
    (@impl $field:ident, u64) => {
        ::paste::paste! {
            #[inline]
            pub fn $field(&self) -> u64 {
                self.$field.get()
            }

            #[inline]
            pub fn [<set_ $field>](&mut self, val: u64) {
                self.$field = ::zerocopy::little_endian::U64::new(val);
            }
        }
    };
    ($($field:ident : $ty:tt),* $(,)?) => {
        $(
            $crate::zerocopy_accessors!(@impl $field, $ty);
        )*
    };
}

/// Generates only getter methods for zerocopy little-endian fields (read-only).
#[macro_export]
macro_rules! zerocopy_getters {
    ($($field:ident : $native_ty:ty),* $(,)?) => {
        $(
            #[inline]
            pub fn $field(&self) -> $native_ty {
                self.$field.get()
            }
        )*
    };
}
