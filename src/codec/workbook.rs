//! Spreadsheet reader (xlsx, xlsb, xls, ods)

use super::FileFormat;
use crate::error::{ConnectorError, Result};
use crate::table::{Cell, Table};
use calamine::{open_workbook_auto_from_rs, Data, Ods, Range, Reader, Xls, Xlsb, Xlsx};
use chrono::NaiveDateTime;
use std::fmt::Display;
use std::io::Cursor;

type Source = Cursor<Vec<u8>>;

/// Read one worksheet; its first row is the header
pub fn read(bytes: &[u8], format: FileFormat, sheet: &str) -> Result<Table> {
    let source = Cursor::new(bytes.to_vec());

    let range = match format {
        FileFormat::Xlsx => sheet_range(Xlsx::<Source>::new(source), sheet)?,
        FileFormat::Xlsb => sheet_range(Xlsb::<Source>::new(source), sheet)?,
        FileFormat::Xls => sheet_range(Xls::<Source>::new(source), sheet)?,
        FileFormat::Ods => sheet_range(Ods::<Source>::new(source), sheet)?,
        _ => sheet_range(open_workbook_auto_from_rs(source), sheet)?,
    };

    Ok(range_to_table(&range))
}

fn sheet_range<R, E>(workbook: std::result::Result<R, E>, sheet: &str) -> Result<Range<Data>>
where
    R: Reader<Source>,
    R::Error: Display,
    E: Display,
{
    let mut workbook =
        workbook.map_err(|e| ConnectorError::Decode(format!("workbook: {e}")))?;
    workbook
        .worksheet_range(sheet)
        .map_err(|e| ConnectorError::Decode(format!("worksheet '{sheet}': {e}")))
}

fn range_to_table(range: &Range<Data>) -> Table {
    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Table::default();
    };

    let columns = header.iter().enumerate().map(|(i, cell)| match cell {
        Data::Empty => format!("Unnamed: {i}"),
        other => other.to_string(),
    });

    let mut table = Table::new(columns);
    for row in rows {
        table.push_row(row.iter().map(to_cell).collect());
    }
    table
}

/// Integral floats become integers; workbooks store every number as a float
fn to_cell(data: &Data) -> Cell {
    match data {
        Data::Int(i) => Cell::Int(*i),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => Cell::Int(*f as i64),
        Data::Float(f) => Cell::Float(*f),
        Data::String(s) if s.is_empty() => Cell::Null,
        Data::String(s) => Cell::Text(s.clone()),
        Data::Bool(b) => Cell::Bool(*b),
        Data::DateTime(dt) => dt.as_datetime().map(Cell::DateTime).unwrap_or_default(),
        Data::DateTimeIso(s) => NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
            .map(Cell::DateTime)
            .unwrap_or_else(|_| Cell::Text(s.clone())),
        Data::DurationIso(s) => Cell::Text(s.clone()),
        Data::Error(_) | Data::Empty => Cell::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integral_float_becomes_int() {
        assert_eq!(to_cell(&Data::Float(3.0)), Cell::Int(3));
        assert_eq!(to_cell(&Data::Float(3.25)), Cell::Float(3.25));
        assert_eq!(to_cell(&Data::String(String::new())), Cell::Null);
    }

    #[test]
    fn test_garbage_is_decode_error() {
        let err = read(b"definitely not a workbook", FileFormat::Xlsx, "Sheet1").unwrap_err();
        assert!(matches!(err, ConnectorError::Decode(_)));
    }
}
