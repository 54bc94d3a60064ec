//! Fuzz target: `rows::parse_rows`
//!
//! Any line soup is either converted or rejected with a configuration
//! error; it never panics.
//!
//! cargo fuzz run fuzz_config_rows

#![no_main]

use libfuzzer_sys::fuzz_target;
use vector_cycle::rows::{self, ConfigRow};

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    let config_rows: Vec<ConfigRow> = text
        .lines()
        .enumerate()
        .map(|(i, line)| ConfigRow::new(i + 1, line))
        .filter(|row| !row.fields.is_empty())
        .collect();
    let _ = rows::parse_rows(&config_rows, |s| vec![format!("{s}_board_state")], 0.0);
});
