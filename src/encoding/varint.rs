//! # Variable-Length Integer Encoding
//!
//! Length prefixes inside a table stream (metadata keys and values, string pool
//! entries) are written as varints so that the common case of short strings
//! costs a single byte.
//!
//! ## Encoding Format
//!
//! A leading marker byte selects the number of following bytes:
//!
//! | Value Range              | Bytes | Format                           |
//! |--------------------------|-------|----------------------------------|
//! | 0 - 240                  | 1     | `[value]`                        |
//! | 241 - 2287               | 2     | `[241 + (v-240)>>8, (v-240)&FF]` |
//! | 2288 - 67823             | 3     | `[249, (v-2288)>>8, (v-2288)&FF]`|
//! | 67824 - 16777215         | 4     | `[250, v>>16, v>>8, v]`          |
//! | 16777216 - 4294967295    | 5     | `[251, v>>24, v>>16, v>>8, v]`   |
//! | 4294967296 - u64::MAX    | 9     | `[255, 8-byte big-endian]`       |
//!
//! Markers 252-254 are invalid.
//!
//! ## Slice and Stream Forms
//!
//! `encode_varint`/`decode_varint` work on byte slices. `write_varint`/
//! `read_varint` work on `std::io` streams: the reader pulls the marker first,
//! then exactly the number of continuation bytes it announces, so a table
//! cursor never reads past the end of the value.

use std::io::{Read, Write};

use eyre::{bail, ensure, Result, WrapErr};

pub fn varint_len(value: u64) -> usize {
    if value <= 240 {
        1
    } else if value <= 2287 {
        2
    } else if value <= 67823 {
        3
    } else if value <= 0xFF_FFFF {
        4
    } else if value <= 0xFFFF_FFFF {
        5
    } else {
        9
    }
}

pub fn encode_varint(value: u64, buf: &mut [u8]) -> usize {
    if value <= 240 {
        buf[0] = value as u8;
        1
    } else if value <= 2287 {
        let v = value - 240;
        buf[0] = ((v >> 8) + 241) as u8;
        buf[1] = (v & 0xFF) as u8;
        2
    } else if value <= 67823 {
        let v = value - 2288;
        buf[0] = 249;
        buf[1] = (v >> 8) as u8;
        buf[2] = (v & 0xFF) as u8;
        3
    } else if value <= 0xFF_FFFF {
        buf[0] = 250;
        buf[1] = (value >> 16) as u8;
        buf[2] = (value >> 8) as u8;
        buf[3] = value as u8;
        4
    } else if value <= 0xFFFF_FFFF {
        buf[0] = 251;
        buf[1] = (value >> 24) as u8;
        buf[2] = (value >> 16) as u8;
        buf[3] = (value >> 8) as u8;
        buf[4] = value as u8;
        5
    } else {
        buf[0] = 255;
        buf[1..9].copy_from_slice(&value.to_be_bytes());
        9
    }
}

pub fn decode_varint(buf: &[u8]) -> Result<(u64, usize)> {
    ensure!(!buf.is_empty(), "empty buffer for varint decode");

    let first = buf[0];

    if first <= 240 {
        Ok((first as u64, 1))
    } else if first <= 248 {
        ensure!(buf.len() >= 2, "truncated 2-byte varint");
        let value = 240 + ((first as u64 - 241) << 8) + buf[1] as u64;
        Ok((value, 2))
    } else if first == 249 {
        ensure!(buf.len() >= 3, "truncated 3-byte varint");
        let value = 2288 + ((buf[1] as u64) << 8) + buf[2] as u64;
        Ok((value, 3))
    } else if first == 250 {
        ensure!(buf.len() >= 4, "truncated 4-byte varint");
        let value = ((buf[1] as u64) << 16) + ((buf[2] as u64) << 8) + buf[3] as u64;
        Ok((value, 4))
    } else if first == 251 {
        ensure!(buf.len() >= 5, "truncated 5-byte varint");
        let value = ((buf[1] as u64) << 24)
            + ((buf[2] as u64) << 16)
            + ((buf[3] as u64) << 8)
            + buf[4] as u64;
        Ok((value, 5))
    } else if first == 255 {
        ensure!(buf.len() >= 9, "truncated 9-byte varint");
        let mut be = [0u8; 8];
        be.copy_from_slice(&buf[1..9]);
        let value = u64::from_be_bytes(be);
        Ok((value, 9))
    } else {
        bail!("invalid varint marker: {}", first)
    }
}


/// Upper bound on the encoded size of any varint.
pub const MAX_VARINT_LEN: usize = 9;

fn continuation_len(marker: u8) -> Result<usize> {
    match marker {
        0..=240 => Ok(0),
        241..=248 => Ok(1),
        249 => Ok(2),
        250 => Ok(3),
        251 => Ok(4),
        255 => Ok(8),
        other => bail!("invalid varint marker: {}", other),
    }
}

pub fn write_varint<W: Write + ?Sized>(writer: &mut W, value: u64) -> Result<usize> {
    let mut buf = [0u8; MAX_VARINT_LEN];
    let len = encode_varint(value, &mut buf);
    writer
        .write_all(&buf[..len])
        .wrap_err("failed to write varint")?;
    Ok(len)
}

pub fn read_varint<R: Read + ?Sized>(reader: &mut R) -> Result<(u64, usize)> {
    let mut buf = [0u8; MAX_VARINT_LEN];
    reader
        .read_exact(&mut buf[..1])
        .wrap_err("failed to read varint marker")?;
    let extra = continuation_len(buf[0])?;
    if extra > 0 {
        reader
            .read_exact(&mut buf[1..1 + extra])
            .wrap_err_with(|| format!("truncated {}-byte varint", extra + 1))?;
    }
    decode_varint(&buf[..1 + extra])
}
