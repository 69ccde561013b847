//! # Logical Values
//!
//! `Value` is the dynamic, tagged representation of one cell. Rows are arrays
//! of `Value`, builders accept `Value`, and table operations move `Value`s
//! between readers and builders.
//!
//! ## Variable-Shaped Values
//!
//! | Type | Backing |
//! |------|---------|
//! | `String` | `Arc<str>` shared with the string pool |
//! | `Binary` | owned bytes copied out of the binary pool |
//! | `IndexList` | owned `u32` indices |
//! | `WeightedIndexList` | owned `(index, weight)` pairs |
//! | `Vector`, `Matrix`, `Tensor3D`, `Tensor4D` | `FloatSpan` over the float pool |
//!
//! `FloatSpan` is a zero-copy window into a shared `Arc<[f32]>`. Values built by
//! callers own their buffer; values decoded from a table borrow the resident
//! float pool without copying.
//!
//! ## Tensor Contract
//!
//! The storage layer never computes with tensors. Anything that can describe
//! its shape and hand out its flat row-major data implements [`FloatTensor`]
//! and can be appended to a tensor-shaped column.

use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::Arc;

use eyre::{ensure, Result};
use smallvec::{smallvec, SmallVec};

use crate::types::ColumnType;

/// Days since 1970-01-01.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Date(pub i32);

/// Microseconds since 1970-01-01T00:00:00Z.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Timestamp(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WeightedIndex {
    pub index: u32,
    pub weight: f32,
}

impl WeightedIndex {
    pub fn new(index: u32, weight: f32) -> Self {
        Self { index, weight }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct IndexList {
    indices: Vec<u32>,
}

impl IndexList {
    pub fn new(indices: Vec<u32>) -> Self {
        Self { indices }
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.indices
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn into_vec(self) -> Vec<u32> {
        self.indices
    }
}

impl From<Vec<u32>> for IndexList {
    fn from(indices: Vec<u32>) -> Self {
        Self::new(indices)
    }
}

impl FromIterator<u32> for IndexList {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct WeightedIndexList {
    items: Vec<WeightedIndex>,
}

impl WeightedIndexList {
    pub fn new(items: Vec<WeightedIndex>) -> Self {
        Self { items }
    }

    pub fn as_slice(&self) -> &[WeightedIndex] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl From<Vec<WeightedIndex>> for WeightedIndexList {
    fn from(items: Vec<WeightedIndex>) -> Self {
        Self::new(items)
    }
}

impl FromIterator<(u32, f32)> for WeightedIndexList {
    fn from_iter<I: IntoIterator<Item = (u32, f32)>>(iter: I) -> Self {
        Self::new(
            iter.into_iter()
                .map(|(index, weight)| WeightedIndex::new(index, weight))
                .collect(),
        )
    }
}

/// A window of `len` floats starting at `start` inside a shared buffer.
#[derive(Clone)]
pub struct FloatSpan {
    buffer: Arc<[f32]>,
    start: usize,
    len: usize,
}

impl FloatSpan {
    pub fn from_vec(data: Vec<f32>) -> Self {
        let len = data.len();
        Self {
            buffer: Arc::from(data),
            start: 0,
            len,
        }
    }

    /// Borrows `len` floats at `start` of `pool`, or `None` if the window does
    /// not fit.
    pub fn window(pool: &Arc<[f32]>, start: usize, len: usize) -> Option<Self> {
        let end = start.checked_add(len)?;
        if end > pool.len() {
            return None;
        }
        Some(Self {
            buffer: Arc::clone(pool),
            start,
            len,
        })
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.buffer[self.start..self.start + self.len]
    }

    /// True when this span borrows from `pool` rather than owning a copy.
    pub fn shares_buffer(&self, pool: &Arc<[f32]>) -> bool {
        Arc::ptr_eq(&self.buffer, pool)
    }
}

impl Deref for FloatSpan {
    type Target = [f32];

    fn deref(&self) -> &[f32] {
        self.as_slice()
    }
}

impl PartialEq for FloatSpan {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl std::fmt::Debug for FloatSpan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}

impl From<Vec<f32>> for FloatSpan {
    fn from(data: Vec<f32>) -> Self {
        Self::from_vec(data)
    }
}

/// Shape and flat data of a float tensor.
pub trait FloatTensor {
    /// Dimensions, outermost first. A vector has one dimension.
    fn shape(&self) -> SmallVec<[u32; 4]>;

    /// Row-major element data; its length is the product of `shape()`.
    fn data(&self) -> &[f32];

    fn size(&self) -> usize {
        self.data().len()
    }
}

fn check_shape(dims: &[u32], len: usize) -> Result<()> {
    let expected = dims
        .iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d as usize));
    ensure!(
        expected == Some(len),
        "tensor shape {:?} does not match {} elements",
        dims,
        len
    );
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct Vector {
    data: FloatSpan,
}

impl Vector {
    pub fn new(data: impl Into<FloatSpan>) -> Self {
        Self { data: data.into() }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn span(&self) -> &FloatSpan {
        &self.data
    }
}

impl FloatTensor for Vector {
    fn shape(&self) -> SmallVec<[u32; 4]> {
        smallvec![self.data.len() as u32]
    }

    fn data(&self) -> &[f32] {
        &self.data
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: u32,
    columns: u32,
    data: FloatSpan,
}

impl Matrix {
    pub fn new(rows: u32, columns: u32, data: impl Into<FloatSpan>) -> Result<Self> {
        let data = data.into();
        check_shape(&[rows, columns], data.len())?;
        Ok(Self {
            rows,
            columns,
            data,
        })
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn columns(&self) -> u32 {
        self.columns
    }

    pub fn get(&self, row: u32, column: u32) -> Option<f32> {
        if row >= self.rows || column >= self.columns {
            return None;
        }
        self.data
            .get(row as usize * self.columns as usize + column as usize)
            .copied()
    }

    pub fn span(&self) -> &FloatSpan {
        &self.data
    }
}

impl FloatTensor for Matrix {
    fn shape(&self) -> SmallVec<[u32; 4]> {
        smallvec![self.rows, self.columns]
    }

    fn data(&self) -> &[f32] {
        &self.data
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tensor3D {
    depth: u32,
    rows: u32,
    columns: u32,
    data: FloatSpan,
}

impl Tensor3D {
    pub fn new(depth: u32, rows: u32, columns: u32, data: impl Into<FloatSpan>) -> Result<Self> {
        let data = data.into();
        check_shape(&[depth, rows, columns], data.len())?;
        Ok(Self {
            depth,
            rows,
            columns,
            data,
        })
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn columns(&self) -> u32 {
        self.columns
    }

    pub fn span(&self) -> &FloatSpan {
        &self.data
    }
}

impl FloatTensor for Tensor3D {
    fn shape(&self) -> SmallVec<[u32; 4]> {
        smallvec![self.depth, self.rows, self.columns]
    }

    fn data(&self) -> &[f32] {
        &self.data
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tensor4D {
    count: u32,
    depth: u32,
    rows: u32,
    columns: u32,
    data: FloatSpan,
}

impl Tensor4D {
    pub fn new(
        count: u32,
        depth: u32,
        rows: u32,
        columns: u32,
        data: impl Into<FloatSpan>,
    ) -> Result<Self> {
        let data = data.into();
        check_shape(&[count, depth, rows, columns], data.len())?;
        Ok(Self {
            count,
            depth,
            rows,
            columns,
            data,
        })
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn columns(&self) -> u32 {
        self.columns
    }

    pub fn span(&self) -> &FloatSpan {
        &self.data
    }
}

impl FloatTensor for Tensor4D {
    fn shape(&self) -> SmallVec<[u32; 4]> {
        smallvec![self.count, self.depth, self.rows, self.columns]
    }

    fn data(&self) -> &[f32] {
        &self.data
    }
}

/// Builds the value of the given tensor column type from any `FloatTensor`.
pub fn tensor_value<T: FloatTensor + ?Sized>(column_type: ColumnType, tensor: &T) -> Result<Value> {
    let shape = tensor.shape();
    let rank = column_type
        .tensor_rank()
        .ok_or_else(|| eyre::eyre!("{} is not a tensor column type", column_type))?;
    ensure!(
        shape.len() == rank,
        "{} column expects rank {} but tensor has shape {:?}",
        column_type,
        rank,
        shape
    );
    let data = FloatSpan::from_vec(tensor.data().to_vec());
    Ok(match column_type {
        ColumnType::Vector => Value::Vector(Vector::new(data)),
        ColumnType::Matrix => Value::Matrix(Matrix::new(shape[0], shape[1], data)?),
        ColumnType::Tensor3D => Value::Tensor3D(Tensor3D::new(shape[0], shape[1], shape[2], data)?),
        _ => Value::Tensor4D(Tensor4D::new(shape[0], shape[1], shape[2], shape[3], data)?),
    })
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Boolean(bool),
    SByte(i8),
    Byte(u8),
    Short(i16),
    UShort(u16),
    Int(i32),
    UInt(u32),
    Long(i64),
    ULong(u64),
    Float(f32),
    Double(f64),
    Date(Date),
    Timestamp(Timestamp),
    String(Arc<str>),
    Binary(Vec<u8>),
    IndexList(IndexList),
    WeightedIndexList(WeightedIndexList),
    Vector(Vector),
    Matrix(Matrix),
    Tensor3D(Tensor3D),
    Tensor4D(Tensor4D),
}

impl Value {
    pub fn column_type(&self) -> ColumnType {
        match self {
            Value::Boolean(_) => ColumnType::Boolean,
            Value::SByte(_) => ColumnType::SByte,
            Value::Byte(_) => ColumnType::Byte,
            Value::Short(_) => ColumnType::Short,
            Value::UShort(_) => ColumnType::UShort,
            Value::Int(_) => ColumnType::Int,
            Value::UInt(_) => ColumnType::UInt,
            Value::Long(_) => ColumnType::Long,
            Value::ULong(_) => ColumnType::ULong,
            Value::Float(_) => ColumnType::Float,
            Value::Double(_) => ColumnType::Double,
            Value::Date(_) => ColumnType::Date,
            Value::Timestamp(_) => ColumnType::Timestamp,
            Value::String(_) => ColumnType::String,
            Value::Binary(_) => ColumnType::Binary,
            Value::IndexList(_) => ColumnType::IndexList,
            Value::WeightedIndexList(_) => ColumnType::WeightedIndexList,
            Value::Vector(_) => ColumnType::Vector,
            Value::Matrix(_) => ColumnType::Matrix,
            Value::Tensor3D(_) => ColumnType::Tensor3D,
            Value::Tensor4D(_) => ColumnType::Tensor4D,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::SByte(v) => Some(v as i64),
            Value::Byte(v) => Some(v as i64),
            Value::Short(v) => Some(v as i64),
            Value::UShort(v) => Some(v as i64),
            Value::Int(v) => Some(v as i64),
            Value::UInt(v) => Some(v as i64),
            Value::Long(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_index_list(&self) -> Option<&IndexList> {
        match self {
            Value::IndexList(list) => Some(list),
            _ => None,
        }
    }

    /// Writes the bytes that identify this value for grouping. Floats
    /// contribute their bit pattern so that every value is hashable.
    fn hash_key<H: Hasher>(&self, state: &mut H) {
        self.column_type().code().hash(state);
        match self {
            Value::Boolean(v) => v.hash(state),
            Value::SByte(v) => v.hash(state),
            Value::Byte(v) => v.hash(state),
            Value::Short(v) => v.hash(state),
            Value::UShort(v) => v.hash(state),
            Value::Int(v) => v.hash(state),
            Value::UInt(v) => v.hash(state),
            Value::Long(v) => v.hash(state),
            Value::ULong(v) => v.hash(state),
            Value::Float(v) => v.to_bits().hash(state),
            Value::Double(v) => v.to_bits().hash(state),
            Value::Date(v) => v.hash(state),
            Value::Timestamp(v) => v.hash(state),
            Value::String(v) => v.hash(state),
            Value::Binary(v) => v.hash(state),
            Value::IndexList(v) => v.hash(state),
            Value::WeightedIndexList(v) => {
                for item in v.as_slice() {
                    item.index.hash(state);
                    item.weight.to_bits().hash(state);
                }
            }
            Value::Vector(v) => hash_floats(&[], v.data(), state),
            Value::Matrix(v) => hash_floats(&v.shape(), v.data(), state),
            Value::Tensor3D(v) => hash_floats(&v.shape(), v.data(), state),
            Value::Tensor4D(v) => hash_floats(&v.shape(), v.data(), state),
        }
    }

    fn key_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Double(a), Value::Double(b)) => a.to_bits() == b.to_bits(),
            (Value::WeightedIndexList(a), Value::WeightedIndexList(b)) => {
                a.len() == b.len()
                    && a.as_slice().iter().zip(b.as_slice()).all(|(x, y)| {
                        x.index == y.index && x.weight.to_bits() == y.weight.to_bits()
                    })
            }
            (Value::Vector(a), Value::Vector(b)) => floats_bits_eq(a.data(), b.data()),
            (Value::Matrix(a), Value::Matrix(b)) => {
                a.shape() == b.shape() && floats_bits_eq(a.data(), b.data())
            }
            (Value::Tensor3D(a), Value::Tensor3D(b)) => {
                a.shape() == b.shape() && floats_bits_eq(a.data(), b.data())
            }
            (Value::Tensor4D(a), Value::Tensor4D(b)) => {
                a.shape() == b.shape() && floats_bits_eq(a.data(), b.data())
            }
            _ => self == other,
        }
    }
}

fn hash_floats<H: Hasher>(shape: &[u32], data: &[f32], state: &mut H) {
    shape.hash(state);
    data.len().hash(state);
    for f in data {
        f.to_bits().hash(state);
    }
}

fn floats_bits_eq(a: &[f32], b: &[f32]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
}

/// A tuple of values usable as a hash map key. Floats compare by bit pattern.
#[derive(Debug, Clone)]
pub struct GroupKey(pub Vec<Value>);

impl PartialEq for GroupKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.len() == other.0.len() && self.0.iter().zip(&other.0).all(|(a, b)| a.key_eq(b))
    }
}

impl Eq for GroupKey {}

impl Hash for GroupKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.len().hash(state);
        for value in &self.0 {
            value.hash_key(state);
        }
    }
}

macro_rules! impl_value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

impl_value_from! {
    bool => Boolean,
    i8 => SByte,
    u8 => Byte,
    i16 => Short,
    u16 => UShort,
    i32 => Int,
    u32 => UInt,
    i64 => Long,
    u64 => ULong,
    f32 => Float,
    f64 => Double,
    Date => Date,
    Timestamp => Timestamp,
    Arc<str> => String,
    Vec<u8> => Binary,
    IndexList => IndexList,
    WeightedIndexList => WeightedIndexList,
    Vector => Vector,
    Matrix => Matrix,
    Tensor3D => Tensor3D,
    Tensor4D => Tensor4D,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(Arc::from(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(Arc::from(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(key: &GroupKey) -> u64 {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn matrix_rejects_mismatched_shape() {
        assert!(Matrix::new(2, 3, vec![0.0; 5]).is_err());
        let m = Matrix::new(2, 3, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        assert_eq!(m.get(1, 2), Some(5.0));
        assert_eq!(m.get(2, 0), None);
    }

    #[test]
    fn float_span_window_borrows_the_pool() {
        let pool: Arc<[f32]> = Arc::from(vec![1.0, 2.0, 3.0, 4.0]);
        let span = FloatSpan::window(&pool, 1, 2).unwrap();
        assert_eq!(span.as_slice(), &[2.0, 3.0]);
        assert!(span.shares_buffer(&pool));
        assert!(FloatSpan::window(&pool, 3, 2).is_none());
    }

    #[test]
    fn group_key_treats_nan_as_equal_to_itself() {
        let a = GroupKey(vec![Value::Double(f64::NAN), Value::from("x")]);
        let b = GroupKey(vec![Value::Double(f64::NAN), Value::from("x")]);
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn group_key_distinguishes_types_with_equal_payload() {
        let a = GroupKey(vec![Value::Int(1)]);
        let b = GroupKey(vec![Value::UInt(1)]);
        assert_ne!(a, b);
    }

    #[test]
    fn tensor_value_checks_rank() {
        let v = Vector::new(vec![1.0, 2.0]);
        assert!(tensor_value(ColumnType::Matrix, &v).is_err());
        let value = tensor_value(ColumnType::Vector, &v).unwrap();
        assert_eq!(value.column_type(), ColumnType::Vector);
    }
}
