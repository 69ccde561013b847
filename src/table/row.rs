//! # Row Assembly
//!
//! Rows are assembled from one `AnyColumnReader` per column.
//!
//! ## Contiguous Ranges
//!
//! `Table::rows(range)` opens every column reader once and advances them in
//! lock-step. Each reader seeks to the range start on the first row and then
//! reads forward, so a range of `n` rows costs one seek per column instead of
//! one per cell.
//!
//! ## Arbitrary Row Sets
//!
//! `Table::rows_at(indices)` sorts and deduplicates the requested indices,
//! merges them into maximal contiguous runs and reads each run the same way.
//! The result keeps the caller's order and repeats rows the caller asked for
//! more than once.
//!
//! ```text
//! requested: [7, 2, 3, 9, 2, 8]
//! runs:      [2..=3, 7..=9]
//! result:    rows 7, 2, 3, 9, 2, 8
//! ```
//!
//! Readers are dropped when the iterator or the call ends, which releases
//! their cursors on every path, including errors.

use std::ops::{Index, Range, RangeInclusive};

use eyre::Result;
use hashbrown::HashMap;

use crate::error::TableError;
use crate::table::column::AnyColumnReader;
use crate::table::reader::Table;
use crate::types::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    index: u32,
    values: Vec<Value>,
}

impl Row {
    pub fn new(index: u32, values: Vec<Value>) -> Self {
        Self { index, values }
    }

    /// Row number in the source table.
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn get(&self, column: usize) -> Option<&Value> {
        self.values.get(column)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

impl Index<usize> for Row {
    type Output = Value;

    fn index(&self, column: usize) -> &Value {
        &self.values[column]
    }
}

/// Lock-step iterator over a contiguous range of rows.
#[derive(Debug)]
pub struct RowIter {
    readers: Vec<AnyColumnReader>,
    next: u32,
    end: u32,
}

impl RowIter {
    fn read_row(&mut self, index: u32) -> Result<Row> {
        let values = self
            .readers
            .iter_mut()
            .map(|reader| reader.get_value(index))
            .collect::<Result<Vec<_>>>()?;
        Ok(Row::new(index, values))
    }
}

impl Iterator for RowIter {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }
        let index = self.next;
        self.next += 1;
        let row = self.read_row(index);
        if row.is_err() {
            self.next = self.end;
        }
        Some(row)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.end.saturating_sub(self.next) as usize;
        (remaining, Some(remaining))
    }
}

/// Merges indices into sorted, disjoint, maximal runs.
pub fn coalesce_runs(indices: &[u32]) -> Vec<RangeInclusive<u32>> {
    let mut sorted = indices.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let mut runs: Vec<RangeInclusive<u32>> = Vec::new();
    for index in sorted {
        match runs.last_mut() {
            Some(run) if run.end().checked_add(1) == Some(index) => {
                *run = *run.start()..=index;
            }
            _ => runs.push(index..=index),
        }
    }
    runs
}

impl Table {
    fn open_all_columns(&self) -> Result<Vec<AnyColumnReader>> {
        (0..self.column_count())
            .map(|column| self.any_column(column))
            .collect()
    }

    fn check_row(&self, index: u32) -> Result<()> {
        if index >= self.row_count() {
            return Err(TableError::row_out_of_range(index as u64, self.row_count() as u64).into());
        }
        Ok(())
    }

    pub fn row(&self, index: u32) -> Result<Row> {
        self.check_row(index)?;
        let mut iter = self.rows(index..index + 1)?;
        match iter.next() {
            Some(row) => row,
            None => Err(TableError::row_out_of_range(index as u64, self.row_count() as u64).into()),
        }
    }

    /// Lazily reads the rows of `range`.
    pub fn rows(&self, range: Range<u32>) -> Result<RowIter> {
        self.ensure_open()?;
        if range.start > range.end || range.end > self.row_count() {
            return Err(TableError::row_out_of_range(range.end as u64, self.row_count() as u64).into());
        }
        Ok(RowIter {
            readers: self.open_all_columns()?,
            next: range.start,
            end: range.end,
        })
    }

    /// Reads the rows at `indices`, in the given order.
    pub fn rows_at(&self, indices: &[u32]) -> Result<Vec<Row>> {
        for &index in indices {
            self.check_row(index)?;
        }
        self.ensure_open()?;

        let mut iter = RowIter {
            readers: self.open_all_columns()?,
            next: 0,
            end: 0,
        };
        let mut fetched: HashMap<u32, Row> = HashMap::with_capacity(indices.len());
        for run in coalesce_runs(indices) {
            for index in run {
                let row = iter.read_row(index)?;
                fetched.insert(index, row);
            }
        }

        indices
            .iter()
            .map(|index| {
                fetched.get(index).cloned().ok_or_else(|| {
                    TableError::row_out_of_range(*index as u64, self.row_count() as u64).into()
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::TableBuilder;
    use crate::types::ColumnType;

    fn table() -> Table {
        let mut builder = TableBuilder::new();
        builder.add_column(ColumnType::Int, "n");
        builder.add_column(ColumnType::String, "s");
        for i in 0..10 {
            builder
                .append_row(&[Value::Int(i), Value::from(format!("r{}", i))])
                .unwrap();
        }
        Table::open_bytes(builder.write_to_vec().unwrap()).unwrap()
    }

    #[test]
    fn coalesce_merges_adjacent_indices() {
        assert_eq!(coalesce_runs(&[7, 2, 3, 9, 2, 8]), vec![2..=3, 7..=9]);
        assert_eq!(coalesce_runs(&[]), Vec::<RangeInclusive<u32>>::new());
        assert_eq!(coalesce_runs(&[5]), vec![5..=5]);
        assert_eq!(
            coalesce_runs(&[u32::MAX, 0, u32::MAX - 1]),
            vec![0..=0, u32::MAX - 1..=u32::MAX]
        );
    }

    #[test]
    fn rows_reads_a_contiguous_range() {
        let table = table();
        let rows: Vec<Row> = table.rows(3..6).unwrap().collect::<Result<_>>().unwrap();
        let ids: Vec<u32> = rows.iter().map(|r| r.index()).collect();
        assert_eq!(ids, vec![3, 4, 5]);
        assert_eq!(rows[1][1], Value::from("r4"));
    }

    #[test]
    fn rows_at_keeps_caller_order_and_duplicates() {
        let table = table();
        let rows = table.rows_at(&[7, 2, 3, 9, 2, 8]).unwrap();
        let ids: Vec<i64> = rows.iter().map(|r| r[0].as_i64().unwrap()).collect();
        assert_eq!(ids, vec![7, 2, 3, 9, 2, 8]);
    }

    #[test]
    fn rows_out_of_bounds_fail() {
        let table = table();
        assert!(table.row(10).is_err());
        assert!(table.rows(8..11).is_err());
        assert!(table.rows_at(&[1, 10]).is_err());
        assert_eq!(table.rows(10..10).unwrap().count(), 0);
    }
}
