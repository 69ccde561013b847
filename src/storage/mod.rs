//! # Storage Module
//!
//! The byte-level plumbing underneath the table format: where a frozen table
//! is read from, where build-time data spills to, and the buffer that decides
//! between memory and spill.
//!
//! ## Architecture Overview
//!
//! ```text
//!        build time                         read time
//! ┌──────────────────────┐         ┌──────────────────────┐
//! │   HybridBuffer<T>    │         │     TableSource      │
//! │  memory prefix  ──┐  │         │ Bytes │ File │ Mmap  │
//! └───────────────────┼──┘         └──────────┬───────────┘
//!                     ▼                       ▼
//!          TempStreamProvider          open_cursor() per reader
//!        InMemory │ TempFile            (independent positions)
//! ```
//!
//! ## Independent Cursors
//!
//! Every column reader owns its own cursor obtained from
//! `TableSource::open_cursor`. Seeking one reader never moves another, so a
//! frozen table can be read from many threads at once as long as each thread
//! holds its own reader.
//!
//! ## Spill Streams
//!
//! A `HybridBuffer` asks its `TempStreamProvider` for a stream only when the
//! in-memory capacity is exceeded. Tables small enough to fit never touch the
//! temporary storage at all.
//!
//! ## Module Organization
//!
//! - `temp`: temporary stream providers used for spilling
//! - `source`: readable table sources
//! - `hybrid`: memory-then-spill accumulator
//! - `codec`: item encodings for spill streams and shared pools

mod codec;
mod hybrid;
mod source;
mod temp;

pub use hybrid::{BufferItem, HybridBuffer};
pub use source::{BytesSource, FileSource, MmapSource, ReadSeek, TableSource};
pub use temp::{InMemoryTempProvider, TempFileProvider, TempStream, TempStreamProvider};
