#![allow(dead_code)]

use std::sync::Once;

use coltable::{ColumnType, IndexList, Table, TableBuilder, Value};

static INIT: Once = Once::new();

/// Initialize tracing for test binaries. Safe to call multiple times.
pub fn init_tracing_for_tests() {
    INIT.call_once(|| {
        use tracing_subscriber::filter::EnvFilter;
        use tracing_subscriber::fmt;
        let filter = match std::env::var("RUST_LOG") {
            Ok(_) => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            Err(_) => EnvFilter::new("info"),
        };
        let _ = fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_test_writer()
            .try_init();
    });
}

/// The three-row table `(1,"a",[0,2]), (2,"b",[1]), (3,"a",[])`.
pub fn scenario_builder() -> TableBuilder {
    let mut builder = TableBuilder::new();
    builder.add_column(ColumnType::Int, "id");
    builder.add_column(ColumnType::String, "tag");
    builder.add_column(ColumnType::IndexList, "links");
    let rows = [(1, "a", vec![0u32, 2]), (2, "b", vec![1]), (3, "a", vec![])];
    for (id, tag, links) in rows {
        builder
            .append_row(&[
                Value::Int(id),
                Value::from(tag),
                Value::IndexList(IndexList::new(links)),
            ])
            .unwrap();
    }
    builder
}

pub fn scenario_table() -> Table {
    Table::open_bytes(scenario_builder().write_to_vec().unwrap()).unwrap()
}

pub fn reopen(builder: TableBuilder) -> Table {
    Table::open_bytes(builder.write_to_vec().unwrap()).unwrap()
}

/// Every row of `table` as value vectors.
pub fn all_rows(table: &Table) -> Vec<Vec<Value>> {
    table
        .rows(0..table.row_count())
        .unwrap()
        .map(|row| row.unwrap().into_values())
        .collect()
}
