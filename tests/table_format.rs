//! Integration tests for writing and reopening frozen tables.
//!
//! These tests go through the public API only: build a table, freeze it to a
//! byte stream, a file or a memory map, and read it back through typed
//! column readers, dynamic readers and rows.

mod common;

use std::io::{Cursor, Seek, SeekFrom, Write};
use std::sync::Arc;

use coltable::error::table_error;
use coltable::{
    ColumnType, Date, IndexList, Matrix, RangeKind, Table, TableBuilder, TableError,
    TableOptions, TempFileProvider, Tensor3D, Tensor4D, Timestamp, Value, Vector, WeightedIndex,
    WeightedIndexList,
};
use common::{all_rows, init_tracing_for_tests, reopen, scenario_builder, scenario_table};
use tempfile::tempdir;

fn one_of_each() -> Vec<Value> {
    vec![
        Value::Boolean(true),
        Value::SByte(-5),
        Value::Byte(250),
        Value::Short(-30_000),
        Value::UShort(60_000),
        Value::Int(-2_000_000_000),
        Value::UInt(4_000_000_000),
        Value::Long(i64::MIN),
        Value::ULong(u64::MAX),
        Value::Float(1.5),
        Value::Double(-0.25),
        Value::Date(Date(19_000)),
        Value::Timestamp(Timestamp(1_700_000_000_000)),
        Value::from("hello"),
        Value::Binary(vec![0, 1, 2, 255]),
        Value::IndexList(IndexList::new(vec![3, 1, 4])),
        Value::WeightedIndexList(WeightedIndexList::new(vec![
            WeightedIndex::new(7, 0.5),
            WeightedIndex::new(9, 2.0),
        ])),
        Value::Vector(Vector::new(vec![1.0, 2.0, 3.0])),
        Value::Matrix(Matrix::new(2, 2, vec![1.0, 2.0, 3.0, 4.0]).unwrap()),
        Value::Tensor3D(Tensor3D::new(1, 2, 2, vec![0.5; 4]).unwrap()),
        Value::Tensor4D(Tensor4D::new(2, 1, 1, 2, vec![9.0, 8.0, 7.0, 6.0]).unwrap()),
    ]
}

fn builder_for(rows: &[Vec<Value>]) -> TableBuilder {
    let mut builder = TableBuilder::new();
    for (i, value) in rows[0].iter().enumerate() {
        builder.add_column(value.column_type(), &format!("c{}", i));
    }
    for row in rows {
        builder.append_row(row).unwrap();
    }
    builder
}

mod round_trip_tests {
    use super::*;

    #[test]
    fn every_column_type_reads_back_unchanged() {
        init_tracing_for_tests();
        let first = one_of_each();
        let mut second = one_of_each();
        second[0] = Value::Boolean(false);
        second[13] = Value::from("");
        second[14] = Value::Binary(Vec::new());
        second[15] = Value::IndexList(IndexList::new(Vec::new()));
        second[17] = Value::Vector(Vector::new(Vec::new()));

        let rows = vec![first, second];
        let table = reopen(builder_for(&rows));

        assert_eq!(table.row_count(), 2);
        assert_eq!(table.column_count(), 21);
        assert_eq!(all_rows(&table), rows);
    }

    #[test]
    fn scenario_table_reads_by_column_row_and_group() {
        init_tracing_for_tests();
        let table = scenario_table();
        assert_eq!(table.row_count(), 3);
        assert_eq!(
            table.column_types(),
            vec![ColumnType::Int, ColumnType::String, ColumnType::IndexList]
        );

        let tags: Vec<String> = table
            .column::<String>(1)
            .unwrap()
            .iter()
            .collect::<eyre::Result<_>>()
            .unwrap();
        assert_eq!(tags, vec!["a", "b", "a"]);

        let row = table.row(2).unwrap();
        assert_eq!(row[0], Value::Int(3));
        assert_eq!(row[1], Value::from("a"));
        assert_eq!(row[2], Value::IndexList(IndexList::new(Vec::new())));

        let groups = table.group_by(&[1]).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].key(), &[Value::from("a")]);
        assert_eq!(groups[0].row_indices(), &[0, 2]);
        assert_eq!(groups[1].key(), &[Value::from("b")]);
        assert_eq!(groups[1].row_indices(), &[1]);
    }

    #[test]
    fn typed_readers_match_dynamic_reads() {
        let table = scenario_table();
        let mut ids = table.column::<i32>(0).unwrap();
        let mut links = table.column::<IndexList>(2).unwrap();
        for row in 0..table.row_count() {
            assert_eq!(Value::Int(ids.get(row).unwrap()), table.get_value(row, 0).unwrap());
            assert_eq!(
                Value::IndexList(links.get(row).unwrap()),
                table.get_value(row, 2).unwrap()
            );
        }
        assert_eq!(table.get::<i32>(1, 0).unwrap(), 2);
    }

    #[test]
    fn random_access_in_any_order() {
        let mut builder = TableBuilder::new();
        builder
            .add_column(ColumnType::Long, "n")
            .append_range((0..500i64).map(|i| i * 3))
            .unwrap();
        let table = reopen(builder);
        let mut reader = table.column::<i64>(0).unwrap();
        for row in [499u32, 0, 250, 251, 17, 17, 498] {
            assert_eq!(reader.get(row).unwrap(), row as i64 * 3);
        }
        let tail: Vec<i64> = reader
            .iter_from(497)
            .collect::<eyre::Result<_>>()
            .unwrap();
        assert_eq!(tail, vec![1491, 1494, 1497]);
    }

    #[test]
    fn metadata_survives_the_round_trip() {
        let mut builder = scenario_builder();
        builder.metadata_mut().set("source", "unit");
        builder
            .column_mut(2)
            .unwrap()
            .metadata_mut()
            .set("unit", "row-index");
        let table = reopen(builder);

        assert_eq!(table.metadata().get("source"), Some("unit"));
        assert_eq!(table.column_name(1), Some("tag"));
        assert_eq!(table.column_index("links"), Some(2));
        assert_eq!(
            table.column_metadata(2).unwrap().get("unit"),
            Some("row-index")
        );
    }

    #[test]
    fn empty_table_has_columns_but_no_rows() {
        let mut builder = TableBuilder::new();
        builder.add_column(ColumnType::String, "s");
        builder.add_column(ColumnType::Vector, "v");
        let table = reopen(builder);
        assert_eq!(table.row_count(), 0);
        assert_eq!(table.column_count(), 2);
        assert_eq!(table.rows(0..0).unwrap().count(), 0);
        assert_eq!(table.pool_load_count(), 0);
    }
}

mod layout_tests {
    use super::*;

    #[test]
    fn data_size_is_rows_times_record_sizes() {
        let table = scenario_table();
        let header = table.header();
        let record_bytes: u64 = table
            .column_types()
            .iter()
            .map(|t| t.record_size() as u64)
            .sum();
        assert_eq!(header.data_size(), record_bytes * table.row_count() as u64);
    }

    #[test]
    fn table_written_after_a_prefix_opens_from_its_start() {
        let mut out = Cursor::new(Vec::new());
        out.write_all(b"unrelated prefix").unwrap();
        let start = out.stream_position().unwrap() as usize;
        scenario_builder().write_to(&mut out).unwrap();

        let bytes = out.into_inner();
        let table = Table::open_bytes(bytes[start..].to_vec()).unwrap();
        assert_eq!(table.row_count(), 3);
        assert_eq!(table.get_value(1, 1).unwrap(), Value::from("b"));
    }

    #[test]
    fn write_to_reports_the_header_it_wrote() {
        let mut out = Cursor::new(Vec::new());
        let header = scenario_builder().write_to(&mut out).unwrap();
        out.seek(SeekFrom::Start(0)).unwrap();
        let table = Table::open_bytes(out.into_inner()).unwrap();
        assert_eq!(header.row_count(), table.header().row_count());
        assert_eq!(header.data_offset(), table.header().data_offset());
    }
}

mod source_tests {
    use super::*;

    #[test]
    fn file_and_mmap_sources_read_the_same_rows() {
        init_tracing_for_tests();
        let dir = tempdir().unwrap();
        let path = dir.path().join("scenario.tbl");
        let mut file = std::fs::File::create(&path).unwrap();
        scenario_builder().write_to(&mut file).unwrap();
        drop(file);

        let expected = all_rows(&scenario_table());
        let from_file = Table::open_file(&path).unwrap();
        let from_mmap = Table::open_mmap(&path).unwrap();
        assert_eq!(all_rows(&from_file), expected);
        assert_eq!(all_rows(&from_mmap), expected);
    }

    #[test]
    fn missing_file_fails_to_open() {
        let dir = tempdir().unwrap();
        assert!(Table::open_file(dir.path().join("absent.tbl")).is_err());
    }
}

mod spill_tests {
    use super::*;

    #[test]
    fn spilling_to_temp_files_produces_identical_bytes() {
        init_tracing_for_tests();
        let dir = tempdir().unwrap();
        let build = |options: TableOptions| {
            let mut builder = TableBuilder::with_options(options);
            builder.add_column(ColumnType::Int, "n");
            builder.add_column(ColumnType::String, "s");
            builder.add_column(ColumnType::Vector, "v");
            for i in 0..200 {
                builder
                    .append_row(&[
                        Value::Int(i),
                        Value::from(format!("value-{}", i % 13)),
                        Value::Vector(Vector::new(vec![i as f32; (i % 4) as usize])),
                    ])
                    .unwrap();
            }
            builder.write_to_vec().unwrap()
        };

        let in_memory = build(TableOptions::new());
        let spilled = build(
            TableOptions::new()
                .buffer_capacity(8)
                .temp_provider(Arc::new(TempFileProvider::in_dir(dir.path()))),
        );
        assert_eq!(in_memory, spilled);

        let table = Table::open_bytes(spilled).unwrap();
        assert_eq!(table.get_value(199, 1).unwrap(), Value::from("value-4"));
    }
}

mod error_tests {
    use super::*;

    fn kind(report: &eyre::Report) -> TableError {
        table_error(report).cloned().expect("table error")
    }

    #[test]
    fn bad_magic_is_corrupt() {
        let mut bytes = scenario_builder().write_to_vec().unwrap();
        bytes[0] ^= 0xFF;
        let err = Table::open_bytes(bytes).unwrap_err();
        assert!(matches!(kind(&err), TableError::CorruptTable { .. }));
    }

    #[test]
    fn truncated_stream_is_corrupt() {
        let bytes = scenario_builder().write_to_vec().unwrap();
        for len in [0, 10, 127, 140] {
            let err = Table::open_bytes(bytes[..len].to_vec()).unwrap_err();
            assert!(
                matches!(kind(&err), TableError::CorruptTable { .. }),
                "len {}",
                len
            );
        }
    }

    #[test]
    fn unknown_column_type_code_is_rejected() {
        let mut builder = TableBuilder::new();
        builder.add_column(ColumnType::Int, "n").append(7).unwrap();
        let mut bytes = builder.write_to_vec().unwrap();
        let table = Table::open_bytes(bytes.clone()).unwrap();
        let descriptor_at = table.header().data_offset() as usize - 8;
        bytes[descriptor_at] = 200;

        let err = Table::open_bytes(bytes).unwrap_err();
        assert_eq!(kind(&err), TableError::UnsupportedColumnType { code: 200 });
    }

    #[test]
    fn oversized_pool_references_are_corrupt() {
        let mut builder = TableBuilder::new();
        builder
            .add_column(ColumnType::Tensor3D, "cube")
            .append(Tensor3D::new(1, 2, 2, vec![1.0; 4]).unwrap())
            .unwrap();
        builder
            .add_column(ColumnType::Tensor4D, "block")
            .append(Tensor4D::new(1, 1, 2, 2, vec![2.0; 4]).unwrap())
            .unwrap();
        builder
            .add_column(ColumnType::IndexList, "links")
            .append(IndexList::new(vec![0, 1]))
            .unwrap();
        let mut bytes = builder.write_to_vec().unwrap();

        let data = Table::open_bytes(bytes.clone())
            .unwrap()
            .header()
            .data_offset() as usize;
        let cube = data;
        let block = cube + ColumnType::Tensor3D.record_size();
        let links = block + ColumnType::Tensor4D.record_size();
        bytes[cube + 4..cube + 16].fill(0xFF);
        bytes[block + 4..block + 20].fill(0xFF);
        bytes[links + 4..links + 8].fill(0xFF);

        let table = Table::open_bytes(bytes).unwrap();
        for column in 0..3 {
            let err = table.get_value(0, column).unwrap_err();
            assert!(
                matches!(kind(&err), TableError::CorruptTable { .. }),
                "column {}: {:?}",
                column,
                err
            );
        }
        assert!(table.row(0).is_err());
    }

    #[test]
    fn type_mismatch_on_typed_reader() {
        let table = scenario_table();
        let err = table.column::<String>(0).unwrap_err();
        assert!(matches!(
            kind(&err),
            TableError::TypeMismatch {
                column: 0,
                expected: ColumnType::String,
                actual: ColumnType::Int,
            }
        ));
    }

    #[test]
    fn out_of_range_row_and_column() {
        let table = scenario_table();
        let err = table.get_value(3, 0).unwrap_err();
        assert!(matches!(
            kind(&err),
            TableError::OutOfRange {
                kind: RangeKind::Row,
                index: 3,
                len: 3,
            }
        ));
        let err = table.get_value(0, 3).unwrap_err();
        assert!(matches!(
            kind(&err),
            TableError::OutOfRange {
                kind: RangeKind::Column,
                ..
            }
        ));
    }

    #[test]
    fn inconsistent_column_lengths_fail_the_write() {
        let mut builder = TableBuilder::new();
        builder.add_column(ColumnType::Int, "a").append(1).unwrap();
        builder.add_column(ColumnType::Int, "b");
        let mut out = Cursor::new(Vec::new());
        let err = builder.write_to(&mut out).unwrap_err();
        assert!(matches!(
            kind(&err),
            TableError::InconsistentColumnLength { .. }
        ));
        assert!(out.into_inner().is_empty());
    }

    #[test]
    fn closed_table_rejects_reads() {
        let table = scenario_table();
        let clone = table.clone();
        table.close();
        assert!(clone.is_closed());
        let err = clone.row(0).unwrap_err();
        assert!(matches!(kind(&err), TableError::DisposedAccess { .. }));
    }
}
