//! Parquet reader built on the row-oriented record API

use crate::error::Result;
use crate::table::{Cell, Table};
use bytes::Bytes;
use chrono::{DateTime, NaiveDate};
use parquet::file::reader::{FileReader, SerializedFileReader};
use parquet::record::Field;

pub fn read(bytes: &[u8]) -> Result<Table> {
    let reader = SerializedFileReader::new(Bytes::copy_from_slice(bytes))?;

    let columns: Vec<String> = reader
        .metadata()
        .file_metadata()
        .schema_descr()
        .root_schema()
        .get_fields()
        .iter()
        .map(|f| f.name().to_string())
        .collect();

    let mut table = Table::new(columns);
    for row in reader.get_row_iter(None)? {
        let row = row?;
        table.push_row(row.get_column_iter().map(|(_, field)| to_cell(field)).collect());
    }

    Ok(table)
}

/// Days from 0001-01-01 to 1970-01-01
const DAYS_FROM_CE_TO_EPOCH: i32 = 719_163;

fn to_cell(field: &Field) -> Cell {
    match field {
        Field::Null => Cell::Null,
        Field::Bool(b) => Cell::Bool(*b),
        Field::Byte(v) => Cell::Int(*v as i64),
        Field::Short(v) => Cell::Int(*v as i64),
        Field::Int(v) => Cell::Int(*v as i64),
        Field::Long(v) => Cell::Int(*v),
        Field::UByte(v) => Cell::Int(*v as i64),
        Field::UShort(v) => Cell::Int(*v as i64),
        Field::UInt(v) => Cell::Int(*v as i64),
        Field::ULong(v) => i64::try_from(*v)
            .map(Cell::Int)
            .unwrap_or(Cell::Float(*v as f64)),
        Field::Float(v) => Cell::Float(*v as f64),
        Field::Double(v) => Cell::Float(*v),
        Field::Str(s) => Cell::Text(s.clone()),
        Field::Date(days) => days
            .checked_add(DAYS_FROM_CE_TO_EPOCH)
            .and_then(NaiveDate::from_num_days_from_ce_opt)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(Cell::DateTime)
            .unwrap_or_default(),
        Field::TimestampMillis(ms) => DateTime::from_timestamp_millis(*ms)
            .map(|dt| Cell::DateTime(dt.naive_utc()))
            .unwrap_or_default(),
        Field::TimestampMicros(us) => DateTime::from_timestamp_micros(*us)
            .map(|dt| Cell::DateTime(dt.naive_utc()))
            .unwrap_or_default(),
        other => Cell::Text(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_field_is_days_since_epoch() {
        let cell = to_cell(&Field::Date(0));
        let expected = NaiveDate::from_ymd_opt(1970, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(cell, Cell::DateTime(expected));
    }

    #[test]
    fn test_out_of_range_date_is_null() {
        assert_eq!(to_cell(&Field::Date(i32::MAX)), Cell::Null);
        assert_eq!(to_cell(&Field::Date(i32::MIN)), Cell::Null);
    }

    #[test]
    fn test_numeric_fields() {
        assert_eq!(to_cell(&Field::Int(7)), Cell::Int(7));
        assert_eq!(to_cell(&Field::Double(0.5)), Cell::Float(0.5));
        assert_eq!(to_cell(&Field::Str("x".into())), Cell::Text("x".into()));
    }

    #[test]
    fn test_not_parquet_is_error() {
        assert!(read(b"PAR1 nope").is_err());
    }
}
