//! # Table Sources
//!
//! A frozen table is read through a `TableSource`. Every call to
//! `open_cursor` returns an independent cursor over the same bytes, so column
//! readers seek without disturbing each other and no cursor is ever shared
//! between threads.
//!
//! ## Implementations
//!
//! | Source | Cursor |
//! |--------|--------|
//! | `BytesSource` | `Cursor` over a shared `Arc<[u8]>`, no copy per cursor |
//! | `FileSource` | the file re-opened per cursor |
//! | `MmapSource` | `Cursor` over a shared read-only memory map |
//!
//! ## Safety
//!
//! `MmapSource` maps the file read-only. The mapping is only sound while no
//! other process truncates or rewrites the file, which holds for frozen
//! tables: they are written once and never modified in place.

use std::fs::File;
use std::io::{Cursor, Read, Seek};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use eyre::{Result, WrapErr};
use memmap2::Mmap;

pub trait ReadSeek: Read + Seek + Send {}

impl<T: Read + Seek + Send> ReadSeek for T {}

pub trait TableSource: Send + Sync {
    /// Total length of the table stream in bytes.
    fn len(&self) -> Result<u64>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Opens a new cursor positioned at offset 0.
    fn open_cursor(&self) -> Result<Box<dyn ReadSeek>>;

    fn describe(&self) -> String;
}

#[derive(Clone)]
struct SharedBytes(Arc<[u8]>);

impl AsRef<[u8]> for SharedBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[derive(Clone)]
pub struct BytesSource {
    bytes: Arc<[u8]>,
}

impl BytesSource {
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl From<Vec<u8>> for BytesSource {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl TableSource for BytesSource {
    fn len(&self) -> Result<u64> {
        Ok(self.bytes.len() as u64)
    }

    fn open_cursor(&self) -> Result<Box<dyn ReadSeek>> {
        Ok(Box::new(Cursor::new(SharedBytes(Arc::clone(&self.bytes)))))
    }

    fn describe(&self) -> String {
        format!("{} in-memory bytes", self.bytes.len())
    }
}

#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TableSource for FileSource {
    fn len(&self) -> Result<u64> {
        let metadata = std::fs::metadata(&self.path)
            .wrap_err_with(|| format!("failed to get metadata for '{}'", self.path.display()))?;
        Ok(metadata.len())
    }

    fn open_cursor(&self) -> Result<Box<dyn ReadSeek>> {
        let file = File::open(&self.path)
            .wrap_err_with(|| format!("failed to open table file '{}'", self.path.display()))?;
        Ok(Box::new(file))
    }

    fn describe(&self) -> String {
        format!("file '{}'", self.path.display())
    }
}

#[derive(Clone)]
struct SharedMmap(Arc<Mmap>);

impl AsRef<[u8]> for SharedMmap {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[derive(Clone)]
pub struct MmapSource {
    path: PathBuf,
    mmap: Arc<Mmap>,
}

impl MmapSource {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .wrap_err_with(|| format!("failed to open table file '{}'", path.display()))?;

        // SAFETY: Mmap::map is unsafe because the file may be modified externally
        // while mapped. Frozen tables are never rewritten in place, the map is
        // read-only, and every cursor bounds-checks through `Cursor`.
        let mmap = unsafe {
            Mmap::map(&file)
                .wrap_err_with(|| format!("failed to memory-map '{}'", path.display()))?
        };

        Ok(Self {
            path: path.to_path_buf(),
            mmap: Arc::new(mmap),
        })
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.mmap
    }
}

impl TableSource for MmapSource {
    fn len(&self) -> Result<u64> {
        Ok(self.mmap.len() as u64)
    }

    fn open_cursor(&self) -> Result<Box<dyn ReadSeek>> {
        Ok(Box::new(Cursor::new(SharedMmap(Arc::clone(&self.mmap)))))
    }

    fn describe(&self) -> String {
        format!("mmap of '{}'", self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{SeekFrom, Write};

    fn read_at(source: &dyn TableSource, offset: u64, len: usize) -> Vec<u8> {
        let mut cursor = source.open_cursor().unwrap();
        cursor.seek(SeekFrom::Start(offset)).unwrap();
        let mut buf = vec![0u8; len];
        cursor.read_exact(&mut buf).unwrap();
        buf
    }

    #[test]
    fn bytes_source_cursors_are_independent() {
        let source = BytesSource::from(b"0123456789".to_vec());
        let mut a = source.open_cursor().unwrap();
        let mut b = source.open_cursor().unwrap();
        a.seek(SeekFrom::Start(5)).unwrap();

        let mut buf = [0u8; 2];
        b.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"01");
        a.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"56");
    }

    #[test]
    fn file_and_mmap_sources_agree() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.ctb");
        File::create(&path)
            .unwrap()
            .write_all(b"abcdefgh")
            .unwrap();

        let file = FileSource::new(&path);
        let mmap = MmapSource::open(&path).unwrap();
        assert_eq!(file.len().unwrap(), 8);
        assert_eq!(mmap.len().unwrap(), 8);
        assert_eq!(read_at(&file, 3, 3), b"def");
        assert_eq!(read_at(&mmap, 3, 3), b"def");
    }
}
