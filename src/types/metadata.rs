//! # Metadata Blocks
//!
//! A metadata block is a small ordered key/value table. One block is written
//! for the whole table and one per column, immediately after the header. The
//! builder stores each column's name under the `name` key.
//!
//! ## Encoding
//!
//! ```text
//! [entry count: varint] ([key len: varint][key utf8][value len: varint][value utf8])*
//! ```
//!
//! Reading is bounded by the bytes left in the stream so that a corrupt length
//! prefix fails with `CorruptTable` instead of attempting a huge allocation.

use std::io::{Read, Write};

use eyre::{Result, WrapErr};

use crate::encoding::{read_varint, varint_len, write_varint};
use crate::error::TableError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    entries: Vec<(String, String)>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key`, replacing an existing entry in place.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn encoded_len(&self) -> usize {
        let mut len = varint_len(self.entries.len() as u64);
        for (k, v) in &self.entries {
            len += varint_len(k.len() as u64) + k.len();
            len += varint_len(v.len() as u64) + v.len();
        }
        len
    }

    pub fn write_to<W: Write + ?Sized>(&self, writer: &mut W) -> Result<usize> {
        let mut written = write_varint(writer, self.entries.len() as u64)?;
        for (k, v) in &self.entries {
            written += write_str(writer, k)?;
            written += write_str(writer, v)?;
        }
        Ok(written)
    }

    /// Reads one block, consuming at most `limit` bytes. Returns the block and
    /// the number of bytes consumed.
    pub fn read_from<R: Read + ?Sized>(reader: &mut R, limit: u64) -> Result<(Self, u64)> {
        let mut consumed = 0u64;
        let (count, n) = read_varint(reader).map_err(|e| corrupt_metadata(e.to_string()))?;
        consumed += n as u64;
        // An entry takes at least two bytes: an empty key and an empty value.
        if count.saturating_mul(2) > limit.saturating_sub(consumed) {
            return Err(corrupt_metadata(format!(
                "{} entries cannot fit in {} bytes",
                count, limit
            )));
        }

        let mut entries = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let key = read_str(reader, limit, &mut consumed)?;
            let value = read_str(reader, limit, &mut consumed)?;
            entries.push((key, value));
        }
        Ok((Self { entries }, consumed))
    }
}

fn corrupt_metadata(reason: String) -> eyre::Report {
    TableError::corrupt(format!("metadata block: {}", reason)).into()
}

pub(crate) fn write_str<W: Write + ?Sized>(writer: &mut W, s: &str) -> Result<usize> {
    let n = write_varint(writer, s.len() as u64)?;
    writer
        .write_all(s.as_bytes())
        .wrap_err("failed to write string bytes")?;
    Ok(n + s.len())
}

fn read_str<R: Read + ?Sized>(reader: &mut R, limit: u64, consumed: &mut u64) -> Result<String> {
    let (len, n) = read_varint(reader).map_err(|e| corrupt_metadata(e.to_string()))?;
    *consumed += n as u64;
    if consumed.saturating_add(len) > limit {
        return Err(corrupt_metadata(format!(
            "string of {} bytes runs past the end of the stream",
            len
        )));
    }
    let mut bytes = vec![0u8; len as usize];
    reader
        .read_exact(&mut bytes)
        .map_err(|e| corrupt_metadata(e.to_string()))?;
    *consumed += len;
    String::from_utf8(bytes).map_err(|_| corrupt_metadata("invalid utf-8".to_string()))
}
