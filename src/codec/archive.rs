//! Zip archives wrapping a CSV export

use super::delimited;
use crate::error::{ConnectorError, Result};
use crate::table::Table;
use std::io::{Cursor, Read};
use zip::ZipArchive;

/// Decode the first entry of the archive as comma-separated text
pub fn read_first_csv(bytes: &[u8]) -> Result<Table> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    if archive.is_empty() {
        return Err(ConnectorError::Decode("zip archive has no entries".to_string()));
    }

    let mut entry = archive.by_index(0)?;
    tracing::debug!("Reading archive entry {}", entry.name());

    let mut content = Vec::new();
    entry.read_to_end(&mut content)?;

    delimited::read(&content, b',', 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    #[test]
    fn test_reads_first_entry() {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer.start_file("export.csv", SimpleFileOptions::default()).unwrap();
        writer.write_all(b"a,b\n1,2\n").unwrap();
        writer.start_file("ignored.csv", SimpleFileOptions::default()).unwrap();
        writer.write_all(b"x\n9\n").unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let table = read_first_csv(&bytes).unwrap();
        assert_eq!(table.columns(), ["a", "b"]);
        assert_eq!(table.num_rows(), 1);
    }
}
