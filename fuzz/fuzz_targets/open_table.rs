//! Fuzz testing for the table reader.
//!
//! Feeds arbitrary byte streams to `Table::open_bytes` and, when a stream is
//! accepted, reads every cell and every row. Malformed input must surface as
//! an error, never as a panic or an unbounded allocation.

#![no_main]

use coltable::Table;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(table) = Table::open_bytes(data.to_vec()) else {
        return;
    };
    for column in 0..table.column_count() {
        let Ok(mut reader) = table.any_column(column) else {
            continue;
        };
        for row in 0..reader.len() {
            if reader.get_value(row).is_err() {
                break;
            }
        }
    }
    if let Ok(rows) = table.rows(0..table.row_count()) {
        for row in rows {
            if row.is_err() {
                break;
            }
        }
    }
    table.close();
});
