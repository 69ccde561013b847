//! # Temporary Storage Providers
//!
//! Hybrid buffers spill to streams handed out by a `TempStreamProvider`. The
//! provider is an external collaborator: callers choose between keeping spilled
//! items in memory (tests, small tables) or in anonymous temporary files that
//! the OS removes once the handle is dropped.

use std::io::{Cursor, Read, Seek, Write};
use std::path::PathBuf;

use eyre::{Result, WrapErr};

pub trait TempStream: Read + Write + Seek + Send {}

impl<T: Read + Write + Seek + Send> TempStream for T {}

pub trait TempStreamProvider: Send + Sync {
    /// Returns a new, empty stream positioned at offset 0.
    fn create(&self) -> Result<Box<dyn TempStream>>;

    fn name(&self) -> &'static str;
}

/// Keeps spilled data in a growable in-memory buffer.
#[derive(Debug, Clone, Copy, Default)]
pub struct InMemoryTempProvider;

impl TempStreamProvider for InMemoryTempProvider {
    fn create(&self) -> Result<Box<dyn TempStream>> {
        Ok(Box::new(Cursor::new(Vec::new())))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Spills to anonymous temporary files, optionally inside a given directory.
#[derive(Debug, Clone, Default)]
pub struct TempFileProvider {
    dir: Option<PathBuf>,
}

impl TempFileProvider {
    pub fn new() -> Self {
        Self { dir: None }
    }

    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }
}

impl TempStreamProvider for TempFileProvider {
    fn create(&self) -> Result<Box<dyn TempStream>> {
        let file = match &self.dir {
            Some(dir) => tempfile::tempfile_in(dir).wrap_err_with(|| {
                format!("failed to create temporary file in '{}'", dir.display())
            })?,
            None => tempfile::tempfile().wrap_err("failed to create temporary file")?,
        };
        Ok(Box::new(file))
    }

    fn name(&self) -> &'static str {
        "tempfile"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::SeekFrom;

    fn write_then_read(provider: &dyn TempStreamProvider) {
        let mut stream = provider.create().unwrap();
        stream.write_all(b"spill").unwrap();
        stream.seek(SeekFrom::Start(0)).unwrap();
        let mut out = String::new();
        stream.read_to_string(&mut out).unwrap();
        assert_eq!(out, "spill");
    }

    #[test]
    fn memory_provider_streams_are_independent() {
        let provider = InMemoryTempProvider;
        write_then_read(&provider);
        let mut fresh = provider.create().unwrap();
        let mut out = Vec::new();
        fresh.read_to_end(&mut out).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn tempfile_provider_writes_into_requested_dir() {
        let dir = tempfile::tempdir().unwrap();
        let provider = TempFileProvider::in_dir(dir.path());
        write_then_read(&provider);
        assert_eq!(provider.name(), "tempfile");
    }
}
