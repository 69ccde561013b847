//! # Table Operations
//!
//! Operations that derive new tables from existing ones. Every operation
//! returns a `TableBuilder` (or, for group-by, one builder per group) filled
//! from the source readers. Nothing is written until the caller calls
//! `write_to`, and the builders spill through the source table's options like
//! any other builder.
//!
//! ## Operations
//!
//! | Operation | Result |
//! |-----------|--------|
//! | `project(columns, rows)` | the chosen columns, all rows or the given rows in the given order |
//! | `sample(k, rng)` | `k` rows drawn uniformly with replacement |
//! | `shuffle(rng)` | every row once, in a uniformly random order |
//! | `group_by(keys)` | one group per distinct key tuple, holding the non-key columns |
//! | `concatenate_rows(tables)` | rows of every table, in input order |
//! | `concatenate_columns(tables)` | columns of every table, in input order |
//!
//! ## Streaming
//!
//! Projection and concatenation copy column by column through one reader at
//! a time. Group-by makes a single lock-step pass over all columns. Neither
//! holds more than the pools of the source tables and the output buffers.
//!
//! ## Strings Across Tables
//!
//! When several sources feed one builder, the output string pool keeps the
//! slot of the first occurrence of each string; later tables reuse it.

use std::io::{Seek, Write};
use std::ops::Range;

use eyre::{ensure, Result};
use hashbrown::HashMap;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::TableError;
use crate::table::builder::TableBuilder;
use crate::table::header::TableHeader;
use crate::table::reader::Table;
use crate::types::{GroupKey, Metadata, Value};

/// Rows of the output, either a whole range or explicit indices.
enum RowSelection<'a> {
    All(Range<u32>),
    Indices(&'a [u32]),
}

impl Table {
    fn new_builder(&self) -> TableBuilder {
        let mut builder = TableBuilder::with_options(self.options().clone());
        *builder.metadata_mut() = self.metadata().clone();
        builder
    }

    fn copy_column(
        &self,
        column: usize,
        rows: &RowSelection<'_>,
        builder: &mut TableBuilder,
    ) -> Result<()> {
        let column_type = self.column_type(column)?;
        let metadata: Metadata = self.column_metadata(column)?.clone();
        let mut reader = self.any_column(column)?;
        let mut writer = builder.add_column_with_metadata(column_type, metadata);
        match rows {
            RowSelection::All(range) => {
                for row in range.clone() {
                    writer.append(reader.get_value(row)?)?;
                }
            }
            RowSelection::Indices(indices) => {
                for &row in indices.iter() {
                    writer.append(reader.get_value(row)?)?;
                }
            }
        }
        Ok(())
    }

    /// Copies `columns` (in the given order) and either every row or the rows
    /// at `rows` (in the given order, duplicates kept) into a new builder.
    pub fn project(&self, columns: &[usize], rows: Option<&[u32]>) -> Result<TableBuilder> {
        self.ensure_open()?;
        for &column in columns {
            self.column_type(column)?;
        }
        let selection = match rows {
            Some(indices) => {
                for &row in indices {
                    if row >= self.row_count() {
                        return Err(TableError::row_out_of_range(
                            row as u64,
                            self.row_count() as u64,
                        )
                        .into());
                    }
                }
                RowSelection::Indices(indices)
            }
            None => RowSelection::All(0..self.row_count()),
        };

        let mut builder = self.new_builder();
        for &column in columns {
            self.copy_column(column, &selection, &mut builder)?;
        }
        tracing::debug!(
            columns = columns.len(),
            rows = builder.row_count(),
            "projected table"
        );
        Ok(builder)
    }

    pub fn select_columns(&self, columns: &[usize]) -> Result<TableBuilder> {
        self.project(columns, None)
    }

    pub fn select_rows(&self, rows: &[u32]) -> Result<TableBuilder> {
        let columns: Vec<usize> = (0..self.column_count()).collect();
        self.project(&columns, Some(rows))
    }

    /// Draws `k` rows uniformly with replacement.
    pub fn sample<R: Rng>(&self, k: usize, rng: &mut R) -> Result<TableBuilder> {
        let row_count = self.row_count();
        if k > 0 && row_count == 0 {
            return Err(TableError::row_out_of_range(0, 0).into());
        }
        let rows: Vec<u32> = (0..k).map(|_| rng.random_range(0..row_count)).collect();
        self.select_rows(&rows)
    }

    /// Writes every row once in a uniformly random order.
    pub fn shuffle<R: Rng>(&self, rng: &mut R) -> Result<TableBuilder> {
        let mut rows: Vec<u32> = (0..self.row_count()).collect();
        rows.shuffle(rng);
        self.select_rows(&rows)
    }

    /// Partitions the rows by the values of the `keys` columns. Groups come
    /// out in the order their key first appears; each holds the non-key
    /// columns of its rows.
    pub fn group_by(&self, keys: &[usize]) -> Result<Vec<Group>> {
        self.ensure_open()?;
        ensure!(!keys.is_empty(), "group_by needs at least one key column");
        for &column in keys {
            self.column_type(column)?;
        }
        let value_columns: Vec<usize> = (0..self.column_count())
            .filter(|column| !keys.contains(column))
            .collect();

        let mut groups: Vec<Group> = Vec::new();
        let mut lookup: HashMap<GroupKey, usize> = HashMap::new();
        for row in self.rows(0..self.row_count())? {
            let row = row?;
            let index = row.index();
            let key = GroupKey(keys.iter().map(|&column| row[column].clone()).collect());
            let mut values: Vec<Option<Value>> = row.into_values().into_iter().map(Some).collect();

            let slot = match lookup.get(&key) {
                Some(&slot) => slot,
                None => {
                    let mut builder = self.new_builder();
                    for &column in &value_columns {
                        builder.add_column_with_metadata(
                            self.column_type(column)?,
                            self.column_metadata(column)?.clone(),
                        );
                    }
                    groups.push(Group {
                        key: key.0.clone(),
                        row_indices: Vec::new(),
                        builder,
                    });
                    lookup.insert(key, groups.len() - 1);
                    groups.len() - 1
                }
            };

            let group = &mut groups[slot];
            group.row_indices.push(index);
            for (output, &column) in value_columns.iter().enumerate() {
                if let Some(value) = values[column].take() {
                    group.builder.column_mut(output)?.append(value)?;
                }
            }
        }

        tracing::debug!(
            keys = keys.len(),
            groups = groups.len(),
            rows = self.row_count(),
            "grouped table"
        );
        Ok(groups)
    }

    /// Appends the rows of every table in input order. All tables must have
    /// the column types of the first one.
    pub fn concatenate_rows(tables: &[&Table]) -> Result<TableBuilder> {
        let Some(first) = tables.first() else {
            eyre::bail!("concatenate_rows needs at least one table");
        };
        let reference = first.column_types();
        for (index, table) in tables.iter().enumerate().skip(1) {
            let types = table.column_types();
            if types.len() != reference.len() {
                return Err(TableError::SchemaMismatch {
                    table: index,
                    reason: format!(
                        "{} columns, expected {}",
                        types.len(),
                        reference.len()
                    ),
                }
                .into());
            }
            if let Some(column) = (0..types.len()).find(|&c| types[c] != reference[c]) {
                return Err(TableError::SchemaMismatch {
                    table: index,
                    reason: format!(
                        "column {} is {}, expected {}",
                        column, types[column], reference[column]
                    ),
                }
                .into());
            }
        }

        let mut builder = first.new_builder();
        for (column, &column_type) in reference.iter().enumerate() {
            let metadata = first.column_metadata(column)?.clone();
            let mut writer = builder.add_column_with_metadata(column_type, metadata);
            for table in tables {
                let mut reader = table.any_column(column)?;
                for row in 0..table.row_count() {
                    writer.append(reader.get_value(row)?)?;
                }
            }
        }
        tracing::debug!(
            tables = tables.len(),
            rows = builder.row_count(),
            "concatenated tables by rows"
        );
        Ok(builder)
    }

    /// Places the columns of every table side by side in input order. All
    /// tables must have the row count of the first one.
    pub fn concatenate_columns(tables: &[&Table]) -> Result<TableBuilder> {
        let Some(first) = tables.first() else {
            eyre::bail!("concatenate_columns needs at least one table");
        };
        let expected = first.row_count();
        for (index, table) in tables.iter().enumerate().skip(1) {
            if table.row_count() != expected {
                return Err(TableError::RowCountMismatch {
                    table: index,
                    expected,
                    actual: table.row_count(),
                }
                .into());
            }
        }

        let mut builder = first.new_builder();
        let all_rows = RowSelection::All(0..expected);
        for table in tables {
            for column in 0..table.column_count() {
                table.copy_column(column, &all_rows, &mut builder)?;
            }
        }
        tracing::debug!(
            tables = tables.len(),
            columns = builder.column_count(),
            "concatenated tables by columns"
        );
        Ok(builder)
    }
}

/// One partition produced by `Table::group_by`.
#[derive(Debug)]
pub struct Group {
    key: Vec<Value>,
    row_indices: Vec<u32>,
    builder: TableBuilder,
}

impl Group {
    /// Values of the key columns shared by every row of the group.
    pub fn key(&self) -> &[Value] {
        &self.key
    }

    /// Source rows of the group, ascending.
    pub fn row_indices(&self) -> &[u32] {
        &self.row_indices
    }

    pub fn len(&self) -> usize {
        self.row_indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.row_indices.is_empty()
    }

    pub fn builder(&self) -> &TableBuilder {
        &self.builder
    }

    pub fn into_builder(self) -> TableBuilder {
        self.builder
    }

    pub fn write_to<W: Write + Seek>(self, out: &mut W) -> Result<TableHeader> {
        self.builder.write_to(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::table_error;
    use crate::types::ColumnType;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn numbers(n: i32) -> Table {
        let mut builder = TableBuilder::new();
        builder.metadata_mut().set("origin", "numbers");
        builder.add_column(ColumnType::Int, "n");
        builder.add_column(ColumnType::String, "parity");
        for i in 0..n {
            let parity = if i % 2 == 0 { "even" } else { "odd" };
            builder
                .append_row(&[Value::Int(i), Value::from(parity)])
                .unwrap();
        }
        Table::open_bytes(builder.write_to_vec().unwrap()).unwrap()
    }

    fn ints(table: &Table, column: usize) -> Vec<i32> {
        table
            .column::<i32>(column)
            .unwrap()
            .iter()
            .collect::<Result<_>>()
            .unwrap()
    }

    fn reopen(builder: TableBuilder) -> Table {
        Table::open_bytes(builder.write_to_vec().unwrap()).unwrap()
    }

    #[test]
    fn project_keeps_requested_order_and_metadata() {
        let table = numbers(6);
        let projected = reopen(table.project(&[1, 0], Some(&[5, 0, 5])).unwrap());
        assert_eq!(projected.column_count(), 2);
        assert_eq!(projected.column_name(0), Some("parity"));
        assert_eq!(projected.metadata().get("origin"), Some("numbers"));
        assert_eq!(ints(&projected, 1), vec![5, 0, 5]);
    }

    #[test]
    fn sample_draws_existing_rows() {
        let table = numbers(20);
        let mut rng = StdRng::seed_from_u64(7);
        let sampled = reopen(table.sample(50, &mut rng).unwrap());
        assert_eq!(sampled.row_count(), 50);
        for n in ints(&sampled, 0) {
            assert!((0..20).contains(&n));
        }
    }

    #[test]
    fn sampling_an_empty_table_fails() {
        let table = numbers(0);
        let mut rng = StdRng::seed_from_u64(1);
        assert!(table.sample(3, &mut rng).is_err());
        assert_eq!(reopen(table.sample(0, &mut rng).unwrap()).row_count(), 0);
    }

    #[test]
    fn group_by_partitions_in_first_appearance_order() {
        let table = numbers(5);
        let groups = table.group_by(&[1]).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].key(), &[Value::from("even")]);
        assert_eq!(groups[0].row_indices(), &[0, 2, 4]);
        assert_eq!(groups[1].row_indices(), &[1, 3]);

        let odd = groups.into_iter().nth(1).unwrap();
        let odd = reopen(odd.into_builder());
        assert_eq!(odd.column_count(), 1);
        assert_eq!(ints(&odd, 0), vec![1, 3]);
    }

    #[test]
    fn concatenate_rows_checks_schema() {
        let a = numbers(2);
        let b = numbers(3);
        let joined = reopen(Table::concatenate_rows(&[&a, &b]).unwrap());
        assert_eq!(ints(&joined, 0), vec![0, 1, 0, 1, 2]);

        let narrow = reopen(a.select_columns(&[0]).unwrap());
        let err = Table::concatenate_rows(&[&a, &narrow]).unwrap_err();
        assert!(matches!(
            table_error(&err),
            Some(TableError::SchemaMismatch { table: 1, .. })
        ));
    }

    #[test]
    fn concatenate_columns_checks_row_count() {
        let a = numbers(3);
        let b = numbers(3);
        let wide = reopen(Table::concatenate_columns(&[&a, &b]).unwrap());
        assert_eq!(wide.column_count(), 4);
        assert_eq!(ints(&wide, 2), vec![0, 1, 2]);

        let c = numbers(4);
        let err = Table::concatenate_columns(&[&a, &c]).unwrap_err();
        assert!(matches!(
            table_error(&err),
            Some(TableError::RowCountMismatch {
                table: 1,
                expected: 3,
                actual: 4
            })
        ));
    }
}
