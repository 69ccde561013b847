//! # Configuration
//!
//! Format constants live in [`constants`]; runtime knobs for building and
//! opening tables live in [`TableOptions`].
//!
//! ## Options
//!
//! | Option          | Default                 | Description                                  |
//! |-----------------|-------------------------|----------------------------------------------|
//! | buffer_capacity | 32768 items             | In-memory items per hybrid buffer before spill |
//! | temp_provider   | `TempFileProvider`      | Where spilled items and scratch pools go     |
//! | dedup_strings   | true                    | One string pool slot per distinct string     |
//!
//! Buffers that outgrow `buffer_capacity` spill to anonymous files in the
//! system temp directory. `InMemoryTempProvider` keeps spilled items in RAM
//! instead.
//!
//! ```ignore
//! let options = TableOptions::new()
//!     .buffer_capacity(1024)
//!     .temp_provider(Arc::new(TempFileProvider::new()));
//! let mut builder = TableBuilder::with_options(options);
//! ```

pub mod constants;
pub use constants::*;

use std::sync::Arc;

use crate::storage::{TempFileProvider, TempStreamProvider};

#[derive(Clone)]
pub struct TableOptions {
    buffer_capacity: usize,
    temp_provider: Arc<dyn TempStreamProvider>,
    dedup_strings: bool,
}

impl std::fmt::Debug for TableOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableOptions")
            .field("buffer_capacity", &self.buffer_capacity)
            .field("temp_provider", &self.temp_provider.name())
            .field("dedup_strings", &self.dedup_strings)
            .finish()
    }
}

impl Default for TableOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl TableOptions {
    pub fn new() -> Self {
        Self {
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            temp_provider: Arc::new(TempFileProvider::new()),
            dedup_strings: true,
        }
    }

    /// Sets how many items each hybrid buffer holds in memory before spilling
    /// to the temporary provider.
    pub fn buffer_capacity(mut self, items: usize) -> Self {
        self.buffer_capacity = items.max(MIN_BUFFER_CAPACITY);
        self
    }

    pub fn temp_provider(mut self, provider: Arc<dyn TempStreamProvider>) -> Self {
        self.temp_provider = provider;
        self
    }

    pub fn dedup_strings(mut self, enabled: bool) -> Self {
        self.dedup_strings = enabled;
        self
    }

    pub fn get_buffer_capacity(&self) -> usize {
        self.buffer_capacity
    }

    pub fn get_temp_provider(&self) -> &Arc<dyn TempStreamProvider> {
        &self.temp_provider
    }

    pub fn get_dedup_strings(&self) -> bool {
        self.dedup_strings
    }
}
