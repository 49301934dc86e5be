//! Delimited text reader with per-cell type inference

use crate::error::Result;
use crate::table::{Cell, Table};
use std::io::{BufRead, BufReader, Read};

/// Read delimited text; the first line after `skip_rows` is the header
pub fn read(bytes: &[u8], delimiter: u8, skip_rows: usize) -> Result<Table> {
    read_from(bytes, delimiter, skip_rows)
}

/// Same as [`read`] over any reader
pub fn read_from<R: Read>(source: R, delimiter: u8, skip_rows: usize) -> Result<Table> {
    let mut buffered = BufReader::new(source);

    let mut line = Vec::new();
    for _ in 0..skip_rows {
        line.clear();
        if buffered.read_until(b'\n', &mut line)? == 0 {
            break;
        }
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(buffered);

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();

    let mut table = Table::new(headers);
    for record in reader.records() {
        let record = record?;
        table.push_row(record.iter().map(Cell::infer).collect());
    }

    Ok(table)
}
