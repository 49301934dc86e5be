//! Content decoding
//!
//! Raw bytes fetched from the document store are turned into a [`Table`]
//! by a decoder chosen from the file name.
//!
//! # Module Structure
//!
//! - [`delimited`] - comma/semicolon separated text
//! - [`workbook`] - spreadsheet variants (xlsx, xlsb, xls, ods)
//! - [`archive`] - zip archives wrapping a single CSV
//! - [`columnar`] - parquet files

pub mod archive;
pub mod columnar;
pub mod delimited;
pub mod workbook;

use crate::error::{ConnectorError, Result};
use crate::table::Table;

/// Default worksheet for workbook reads and writes
pub const DEFAULT_SHEET: &str = "Sheet1";

/// Decoder selected for a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Xlsx,
    Xlsb,
    Xls,
    Ods,
    Parquet,
    /// Zip archive whose first entry is a CSV file
    ZipCsv,
    /// Delimiter-configurable text with leading rows to skip
    Text,
    /// Source code; downloaded, never decoded
    Script,
    /// Anything else; decoded by workbook auto-detection
    Other,
}

impl FileFormat {
    /// Classify by file name suffix (case-insensitive)
    pub fn from_name(name: &str) -> Self {
        let ext = name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "csv" => FileFormat::Csv,
            "xlsx" | "xlsm" => FileFormat::Xlsx,
            "xlsb" => FileFormat::Xlsb,
            "xls" => FileFormat::Xls,
            "ods" => FileFormat::Ods,
            "parquet" => FileFormat::Parquet,
            "zip" => FileFormat::ZipCsv,
            "txt" => FileFormat::Text,
            "py" => FileFormat::Script,
            _ => FileFormat::Other,
        }
    }
}

/// Options for decoders that take them
#[derive(Debug, Clone)]
pub struct ReadOptions {
    /// Worksheet to read from workbooks
    pub sheet_name: String,
    /// Field separator for `.txt` files
    pub separator: u8,
    /// Leading lines to skip in `.txt` files
    pub skip_rows: usize,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            sheet_name: DEFAULT_SHEET.to_string(),
            separator: b';',
            skip_rows: 1,
        }
    }
}

/// Decode `bytes` with the decoder for `format`
pub fn decode(bytes: &[u8], format: FileFormat, options: &ReadOptions) -> Result<Table> {
    tracing::debug!("Decoding {} bytes as {:?}", bytes.len(), format);

    let mut table = match format {
        FileFormat::Csv => delimited::read(bytes, b',', 0)?,
        FileFormat::Text => delimited::read(bytes, options.separator, options.skip_rows)?,
        FileFormat::ZipCsv => archive::read_first_csv(bytes)?,
        FileFormat::Parquet => columnar::read(bytes)?,
        FileFormat::Xlsx | FileFormat::Xlsb | FileFormat::Xls | FileFormat::Ods | FileFormat::Other => {
            workbook::read(bytes, format, &options.sheet_name)?
        }
        FileFormat::Script => {
            return Err(ConnectorError::UnsupportedFormat(
                "script files are not tabular; download them instead".to_string(),
            ))
        }
    };

    table.normalize_numeric();
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_case_insensitive() {
        assert_eq!(FileFormat::from_name("report.CSV"), FileFormat::Csv);
        assert_eq!(FileFormat::from_name("Book.Xlsx"), FileFormat::Xlsx);
        assert_eq!(FileFormat::from_name("dump.ZIP"), FileFormat::ZipCsv);
        assert_eq!(FileFormat::from_name("a.b.parquet"), FileFormat::Parquet);
        assert_eq!(FileFormat::from_name("notes.txt"), FileFormat::Text);
        assert_eq!(FileFormat::from_name("job.py"), FileFormat::Script);
        assert_eq!(FileFormat::from_name("no_extension"), FileFormat::Other);
    }

    #[test]
    fn test_script_is_rejected() {
        let err = decode(b"print(1)", FileFormat::Script, &ReadOptions::default()).unwrap_err();
        assert!(matches!(err, ConnectorError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_text_defaults() {
        let options = ReadOptions::default();
        let bytes = b"exported by system\nname;value\na;1\nb;2\n";
        let table = decode(bytes, FileFormat::Text, &options).unwrap();

        assert_eq!(table.columns(), ["name", "value"]);
        assert_eq!(table.num_rows(), 2);
    }
}
