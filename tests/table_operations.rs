//! Integration tests for operations that derive new tables: projection,
//! sampling, shuffling, grouping and concatenation.

mod common;

use coltable::error::table_error;
use coltable::{ColumnType, Table, TableBuilder, TableError, Value, Vector};
use common::{all_rows, init_tracing_for_tests, reopen, scenario_table};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn numbered(rows: i32) -> Table {
    let mut builder = TableBuilder::new();
    builder
        .add_column(ColumnType::Int, "n")
        .append_range(0..rows)
        .unwrap();
    builder
        .add_column(ColumnType::String, "parity")
        .append_range((0..rows).map(|i| if i % 2 == 0 { "even" } else { "odd" }))
        .unwrap();
    builder
        .add_column(ColumnType::Vector, "v")
        .append_range((0..rows).map(|i| Vector::new(vec![i as f32, -(i as f32)])))
        .unwrap();
    reopen(builder)
}

fn ints(table: &Table, column: usize) -> Vec<i32> {
    table
        .column::<i32>(column)
        .unwrap()
        .iter()
        .collect::<eyre::Result<_>>()
        .unwrap()
}

mod projection_tests {
    use super::*;

    #[test]
    fn project_reorders_columns_and_rows() {
        init_tracing_for_tests();
        let table = numbered(6);
        let projected = reopen(table.project(&[2, 0], Some(&[5, 1, 1])).unwrap());

        assert_eq!(
            projected.column_types(),
            vec![ColumnType::Vector, ColumnType::Int]
        );
        assert_eq!(projected.column_name(0), Some("v"));
        assert_eq!(ints(&projected, 1), vec![5, 1, 1]);
        assert_eq!(
            projected.get_value(0, 0).unwrap(),
            Value::Vector(Vector::new(vec![5.0, -5.0]))
        );
    }

    #[test]
    fn select_columns_keeps_every_row() {
        let table = numbered(4);
        let selected = reopen(table.select_columns(&[1]).unwrap());
        assert_eq!(selected.row_count(), 4);
        assert_eq!(selected.get_value(3, 0).unwrap(), Value::from("odd"));
    }

    #[test]
    fn project_rejects_unknown_rows_and_columns() {
        let table = numbered(4);
        let err = table.project(&[0], Some(&[4])).unwrap_err();
        assert!(matches!(
            table_error(&err),
            Some(TableError::OutOfRange { .. })
        ));
        assert!(table.select_columns(&[3]).is_err());
    }
}

mod random_tests {
    use super::*;

    #[test]
    fn shuffle_is_a_permutation() {
        let table = numbered(50);
        let mut rng = StdRng::seed_from_u64(7);
        let shuffled = reopen(table.shuffle(&mut rng).unwrap());

        let mut values = ints(&shuffled, 0);
        assert_eq!(values.len(), 50);
        values.sort_unstable();
        assert_eq!(values, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn shuffled_rows_stay_intact() {
        let table = numbered(20);
        let mut rng = StdRng::seed_from_u64(11);
        let shuffled = reopen(table.shuffle(&mut rng).unwrap());
        for row in all_rows(&shuffled) {
            let n = row[0].as_i64().unwrap() as usize;
            assert_eq!(row, all_rows(&table)[n]);
        }
    }

    #[test]
    fn same_seed_gives_same_order() {
        let table = numbered(30);
        let a = reopen(table.shuffle(&mut StdRng::seed_from_u64(3)).unwrap());
        let b = reopen(table.shuffle(&mut StdRng::seed_from_u64(3)).unwrap());
        assert_eq!(ints(&a, 0), ints(&b, 0));
    }

    #[test]
    fn sample_draws_existing_rows() {
        let table = numbered(10);
        let mut rng = StdRng::seed_from_u64(42);
        let sampled = reopen(table.sample(25, &mut rng).unwrap());
        assert_eq!(sampled.row_count(), 25);
        for row in all_rows(&sampled) {
            let n = row[0].as_i64().unwrap();
            assert!((0..10).contains(&n));
            let parity = if n % 2 == 0 { "even" } else { "odd" };
            assert_eq!(row[1], Value::from(parity));
        }
    }

    #[test]
    fn sample_of_nothing_is_empty() {
        let table = numbered(0);
        let mut rng = StdRng::seed_from_u64(1);
        let sampled = reopen(table.sample(0, &mut rng).unwrap());
        assert_eq!(sampled.row_count(), 0);
        assert!(table.sample(1, &mut rng).is_err());
    }
}

mod group_tests {
    use super::*;

    #[test]
    fn groups_partition_the_rows() {
        init_tracing_for_tests();
        let table = numbered(9);
        let groups = table.group_by(&[1]).unwrap();
        assert_eq!(groups.len(), 2);

        let mut seen: Vec<u32> = groups
            .iter()
            .flat_map(|g| g.row_indices().to_vec())
            .collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..9).collect::<Vec<_>>());

        assert_eq!(groups[0].key(), &[Value::from("even")]);
        assert_eq!(groups[0].row_indices(), &[0, 2, 4, 6, 8]);
        assert_eq!(groups[1].row_indices(), &[1, 3, 5, 7]);
    }

    #[test]
    fn group_tables_hold_the_value_columns() {
        let table = numbered(5);
        let mut groups = table.group_by(&[1]).unwrap();
        let odd = reopen(groups.remove(1).into_builder());

        assert_eq!(odd.column_types(), vec![ColumnType::Int, ColumnType::Vector]);
        assert_eq!(ints(&odd, 0), vec![1, 3]);
        assert_eq!(
            odd.get_value(1, 1).unwrap(),
            Value::Vector(Vector::new(vec![3.0, -3.0]))
        );
    }

    #[test]
    fn composite_keys_group_by_the_whole_tuple() {
        let mut builder = TableBuilder::new();
        builder.add_column(ColumnType::String, "a");
        builder.add_column(ColumnType::Int, "b");
        builder.add_column(ColumnType::Double, "x");
        for (a, b, x) in [("p", 1, 0.5), ("p", 2, 1.5), ("p", 1, 2.5), ("q", 1, 3.5)] {
            builder
                .append_row(&[Value::from(a), Value::Int(b), Value::Double(x)])
                .unwrap();
        }
        let table = reopen(builder);
        let groups = table.group_by(&[0, 1]).unwrap();
        let indices: Vec<Vec<u32>> = groups.iter().map(|g| g.row_indices().to_vec()).collect();
        assert_eq!(indices, vec![vec![0, 2], vec![1], vec![3]]);
        assert_eq!(groups[2].key(), &[Value::from("q"), Value::Int(1)]);
    }

    #[test]
    fn group_by_needs_valid_keys() {
        let table = scenario_table();
        assert!(table.group_by(&[]).is_err());
        assert!(table.group_by(&[5]).is_err());
    }
}

mod concatenation_tests {
    use super::*;

    #[test]
    fn rows_are_appended_in_input_order() {
        let first = numbered(3);
        let second = numbered(2);
        let joined = reopen(Table::concatenate_rows(&[&first, &second]).unwrap());
        assert_eq!(ints(&joined, 0), vec![0, 1, 2, 0, 1]);
        assert_eq!(joined.get_value(4, 1).unwrap(), Value::from("odd"));
    }

    #[test]
    fn rows_require_matching_schemas() {
        let first = numbered(3);
        let other = scenario_table();
        let err = Table::concatenate_rows(&[&first, &other]).unwrap_err();
        assert!(matches!(
            table_error(&err),
            Some(TableError::SchemaMismatch { table: 1, .. })
        ));
    }

    #[test]
    fn columns_are_placed_side_by_side() {
        let left = numbered(3);
        let right = scenario_table();
        let joined = reopen(Table::concatenate_columns(&[&left, &right]).unwrap());
        assert_eq!(joined.column_count(), 6);
        assert_eq!(joined.column_name(4), Some("tag"));
        assert_eq!(joined.get_value(1, 4).unwrap(), Value::from("b"));
        assert_eq!(ints(&joined, 3), vec![1, 2, 3]);
    }

    #[test]
    fn columns_require_matching_row_counts() {
        let left = numbered(4);
        let right = scenario_table();
        let err = Table::concatenate_columns(&[&left, &right]).unwrap_err();
        assert_eq!(
            table_error(&err),
            Some(&TableError::RowCountMismatch {
                table: 1,
                expected: 4,
                actual: 3,
            })
        );
    }

    #[test]
    fn concatenation_needs_at_least_one_table() {
        assert!(Table::concatenate_rows(&[]).is_err());
        assert!(Table::concatenate_columns(&[]).is_err());
    }
}
