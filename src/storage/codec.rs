//! # Spill and Pool Item Encoding
//!
//! `BufferItem` implementations for everything a hybrid buffer holds. Pool
//! item types (`u8`, `u32`, `f32`, `Arc<str>`, `WeightedIndex`) use exactly the
//! encoding of their shared pool on disk, so the writer copies a flushed pool
//! buffer straight into the table stream. `Value` is only ever written to spill
//! streams and carries a one-byte type tag ahead of its payload.
//!
//! ## Value Spill Layout
//!
//! ```text
//! [type code u8] payload
//!   scalar          : fixed record bytes
//!   string, binary  : [len varint] bytes
//!   index list      : [count varint] u32*
//!   weighted list   : [count varint] (u32, f32)*
//!   vector          : [len varint] f32*
//!   matrix/tensors  : dims u32* then product(dims) f32*
//! ```

use std::io::{Read, Write};
use std::sync::Arc;

use eyre::{ensure, Result, WrapErr};

use crate::encoding::{read_varint, write_varint};
use crate::storage::hybrid::BufferItem;
use crate::types::{
    ColumnType, Date, FixedRecord, FloatSpan, FloatTensor, IndexList, Matrix, Tensor3D, Tensor4D,
    Timestamp, Value, Vector, WeightedIndex, WeightedIndexList,
};

const MAX_RECORD: usize = 32;

fn write_fixed<R: FixedRecord, W: Write + ?Sized>(writer: &mut W, value: R) -> Result<()> {
    let mut buf = Vec::with_capacity(R::SIZE);
    value.encode(&mut buf);
    writer.write_all(&buf).wrap_err("failed to write item")
}

fn read_fixed<R: FixedRecord, Rd: Read + ?Sized>(reader: &mut Rd) -> Result<R> {
    let mut buf = [0u8; MAX_RECORD];
    reader
        .read_exact(&mut buf[..R::SIZE])
        .wrap_err("failed to read item")?;
    R::decode(&buf[..R::SIZE])
}

macro_rules! fixed_buffer_item {
    ($($ty:ty),* $(,)?) => {
        $(
            impl BufferItem for $ty {
                #[inline]
                fn write_item<W: Write + ?Sized>(&self, writer: &mut W) -> Result<()> {
                    write_fixed(writer, *self)
                }

                #[inline]
                fn read_item<R: Read + ?Sized>(reader: &mut R) -> Result<Self> {
                    read_fixed(reader)
                }
            }
        )*
    };
}

fixed_buffer_item!(u8, u32, f32);

impl BufferItem for WeightedIndex {
    fn write_item<W: Write + ?Sized>(&self, writer: &mut W) -> Result<()> {
        write_fixed(writer, self.index)?;
        write_fixed(writer, self.weight)
    }

    fn read_item<R: Read + ?Sized>(reader: &mut R) -> Result<Self> {
        let index = read_fixed(reader)?;
        let weight = read_fixed(reader)?;
        Ok(WeightedIndex { index, weight })
    }
}

impl BufferItem for Arc<str> {
    fn write_item<W: Write + ?Sized>(&self, writer: &mut W) -> Result<()> {
        crate::types::write_str(writer, self)?;
        Ok(())
    }

    fn read_item<R: Read + ?Sized>(reader: &mut R) -> Result<Self> {
        let bytes = read_bytes(reader)?;
        let s = String::from_utf8(bytes).wrap_err("string item is not valid utf-8")?;
        Ok(Arc::from(s))
    }
}

fn read_bytes<R: Read + ?Sized>(reader: &mut R) -> Result<Vec<u8>> {
    let (len, _) = read_varint(reader)?;
    let mut bytes = Vec::new();
    reader
        .take(len)
        .read_to_end(&mut bytes)
        .wrap_err("failed to read length-prefixed bytes")?;
    ensure!(
        bytes.len() as u64 == len,
        "truncated item: expected {} bytes, got {}",
        len,
        bytes.len()
    );
    Ok(bytes)
}

fn write_floats<W: Write + ?Sized>(writer: &mut W, data: &[f32]) -> Result<()> {
    for &f in data {
        write_fixed(writer, f)?;
    }
    Ok(())
}

fn read_floats<R: Read + ?Sized>(reader: &mut R, len: usize) -> Result<FloatSpan> {
    let mut data = Vec::with_capacity(len);
    for _ in 0..len {
        data.push(read_fixed::<f32, _>(reader)?);
    }
    Ok(FloatSpan::from_vec(data))
}

fn write_dims<W: Write + ?Sized>(writer: &mut W, tensor: &dyn FloatTensor) -> Result<()> {
    for dim in tensor.shape() {
        write_fixed(writer, dim)?;
    }
    write_floats(writer, tensor.data())
}

fn read_dims<R: Read + ?Sized, const N: usize>(reader: &mut R) -> Result<([u32; N], usize)> {
    let mut dims = [0u32; N];
    for dim in dims.iter_mut() {
        *dim = read_fixed(reader)?;
    }
    let len = dims.iter().map(|&d| d as usize).product();
    Ok((dims, len))
}

impl BufferItem for Value {
    fn write_item<W: Write + ?Sized>(&self, writer: &mut W) -> Result<()> {
        write_fixed(writer, self.column_type().code())?;
        match self {
            Value::Boolean(v) => write_fixed(writer, *v),
            Value::SByte(v) => write_fixed(writer, *v),
            Value::Byte(v) => write_fixed(writer, *v),
            Value::Short(v) => write_fixed(writer, *v),
            Value::UShort(v) => write_fixed(writer, *v),
            Value::Int(v) => write_fixed(writer, *v),
            Value::UInt(v) => write_fixed(writer, *v),
            Value::Long(v) => write_fixed(writer, *v),
            Value::ULong(v) => write_fixed(writer, *v),
            Value::Float(v) => write_fixed(writer, *v),
            Value::Double(v) => write_fixed(writer, *v),
            Value::Date(v) => write_fixed(writer, *v),
            Value::Timestamp(v) => write_fixed(writer, *v),
            Value::String(s) => s.write_item(writer),
            Value::Binary(bytes) => {
                write_varint(writer, bytes.len() as u64)?;
                writer.write_all(bytes).wrap_err("failed to write binary item")
            }
            Value::IndexList(list) => {
                write_varint(writer, list.len() as u64)?;
                for &index in list.as_slice() {
                    write_fixed(writer, index)?;
                }
                Ok(())
            }
            Value::WeightedIndexList(list) => {
                write_varint(writer, list.len() as u64)?;
                for item in list.as_slice() {
                    item.write_item(writer)?;
                }
                Ok(())
            }
            Value::Vector(v) => {
                write_varint(writer, v.len() as u64)?;
                write_floats(writer, v.data())
            }
            Value::Matrix(m) => write_dims(writer, m),
            Value::Tensor3D(t) => write_dims(writer, t),
            Value::Tensor4D(t) => write_dims(writer, t),
        }
    }

    fn read_item<R: Read + ?Sized>(reader: &mut R) -> Result<Self> {
        let code: u8 = read_fixed(reader)?;
        let column_type = ColumnType::try_from(code)?;
        let value = match column_type {
            ColumnType::Boolean => Value::Boolean(read_fixed(reader)?),
            ColumnType::SByte => Value::SByte(read_fixed(reader)?),
            ColumnType::Byte => Value::Byte(read_fixed(reader)?),
            ColumnType::Short => Value::Short(read_fixed(reader)?),
            ColumnType::UShort => Value::UShort(read_fixed(reader)?),
            ColumnType::Int => Value::Int(read_fixed(reader)?),
            ColumnType::UInt => Value::UInt(read_fixed(reader)?),
            ColumnType::Long => Value::Long(read_fixed(reader)?),
            ColumnType::ULong => Value::ULong(read_fixed(reader)?),
            ColumnType::Float => Value::Float(read_fixed(reader)?),
            ColumnType::Double => Value::Double(read_fixed(reader)?),
            ColumnType::Date => Value::Date(read_fixed::<Date, _>(reader)?),
            ColumnType::Timestamp => Value::Timestamp(read_fixed::<Timestamp, _>(reader)?),
            ColumnType::String => Value::String(Arc::<str>::read_item(reader)?),
            ColumnType::Binary => Value::Binary(read_bytes(reader)?),
            ColumnType::IndexList => {
                let (count, _) = read_varint(reader)?;
                let mut indices = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    indices.push(read_fixed(reader)?);
                }
                Value::IndexList(IndexList::new(indices))
            }
            ColumnType::WeightedIndexList => {
                let (count, _) = read_varint(reader)?;
                let mut items = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    items.push(WeightedIndex::read_item(reader)?);
                }
                Value::WeightedIndexList(WeightedIndexList::new(items))
            }
            ColumnType::Vector => {
                let (len, _) = read_varint(reader)?;
                Value::Vector(Vector::new(read_floats(reader, len as usize)?))
            }
            ColumnType::Matrix => {
                let ([rows, columns], len) = read_dims::<_, 2>(reader)?;
                Value::Matrix(Matrix::new(rows, columns, read_floats(reader, len)?)?)
            }
            ColumnType::Tensor3D => {
                let ([depth, rows, columns], len) = read_dims::<_, 3>(reader)?;
                Value::Tensor3D(Tensor3D::new(
                    depth,
                    rows,
                    columns,
                    read_floats(reader, len)?,
                )?)
            }
            ColumnType::Tensor4D => {
                let ([count, depth, rows, columns], len) = read_dims::<_, 4>(reader)?;
                Value::Tensor4D(Tensor4D::new(
                    count,
                    depth,
                    rows,
                    columns,
                    read_floats(reader, len)?,
                )?)
            }
        };
        Ok(value)
    }
}
