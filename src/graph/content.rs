//! Content reader/writer
//!
//! Moves file content between the document library and the caller:
//! decoded reads, raw downloads and uploads, deletes, and in-place
//! worksheet range rewrites.

use super::client::GraphClient;
use super::locator::{self, FileRef, Target};
use crate::codec::{self, FileFormat, ReadOptions};
use crate::error::{ConnectorError, Result};
use crate::table::Table;
use serde_json::json;
use std::path::{Path, PathBuf};

/// Item address used by path-independent endpoints.
///
/// Shared links are resolved to the drive item id first; paths are used
/// directly.
async fn item_url(client: &GraphClient, file: &FileRef) -> Result<(String, String)> {
    match file.target()? {
        Target::SharedLink(_) => {
            let item = locator::drive_item(client, file).await?;
            Ok((client.drive_item_url(&item.id), item.name))
        }
        Target::Path { folder, name } => {
            Ok((client.drive_path_url(folder.as_deref(), &name), name))
        }
    }
}

/// Download a file and decode it into a table, picking the decoder from
/// the file name.
pub async fn read_item(client: &GraphClient, file: &FileRef, options: &ReadOptions) -> Result<Table> {
    let (url, name) = item_url(client, file).await?;

    let format = FileFormat::from_name(&name);
    if format == FileFormat::Script {
        return Err(ConnectorError::UnsupportedFormat(format!(
            "'{name}' is not tabular; download it instead"
        )));
    }

    let token = client.get_token().await?;
    let bytes = client.http.get_bytes(&format!("{url}/content"), Some(&token)).await?;
    tracing::debug!("Read {} bytes from '{}' as {:?}", bytes.len(), name, format);

    codec::decode(&bytes, format, options)
}

/// Download a file into `dir`, keeping its name. Returns the local path.
pub async fn download_item(client: &GraphClient, file: &FileRef, dir: &Path) -> Result<PathBuf> {
    let item = locator::drive_item(client, file).await?;
    let url = item
        .download_url
        .as_deref()
        .ok_or_else(|| ConnectorError::malformed(format!("no download URL for '{}'", item.name)))?;

    // Pre-authenticated URL, no bearer token
    let bytes = client.http.get_bytes(url, None).await?;

    let target = dir.join(&item.name);
    tokio::fs::write(&target, &bytes).await?;
    tracing::info!("Downloaded '{}' to {}", item.name, target.display());

    client
        .audit("download_item", &format!("{file:?}, dir={}", dir.display()), 200)
        .await;

    Ok(target)
}

/// Upload a local file to the location `file` names, replacing any
/// existing content. Returns the upload status (200 or 201).
pub async fn upload_item(client: &GraphClient, file: &FileRef, local: &Path) -> Result<u16> {
    let data = tokio::fs::read(local).await?;
    let (url, name) = item_url(client, file).await?;

    let token = client.get_token().await?;
    let reply = client
        .http
        .put_bytes(&format!("{url}/content"), &token, data)
        .await?;
    tracing::info!("Uploaded {} as '{}' ({})", local.display(), name, reply.status);

    client
        .audit("upload_item", &format!("{file:?}, local={}", local.display()), reply.status)
        .await;

    Ok(reply.status)
}

/// List item to delete
#[derive(Debug, Clone)]
pub enum ItemRef {
    Id(String),
    File(FileRef),
}

/// Delete a list item. Returns the delete status (204 on success).
pub async fn delete_item(client: &GraphClient, item: &ItemRef) -> Result<u16> {
    let item_id = match item {
        ItemRef::Id(id) => id.clone(),
        ItemRef::File(file) => locator::search_item_id(client, file).await?,
    };

    let reply = client.delete(&client.list_url(&format!("items/{item_id}"))).await?;
    tracing::info!("Deleted list item {} ({})", item_id, reply.status);

    client
        .audit("delete_item", &format!("{item:?}"), reply.status)
        .await;

    Ok(reply.status)
}

/// Spreadsheet column letters for a 1-based column number
/// (1 → `A`, 26 → `Z`, 27 → `AA`).
pub fn column_letter(mut column: usize) -> String {
    let mut letters = Vec::new();
    while column > 0 {
        let rem = (column - 1) % 26;
        letters.push(b'A' + rem as u8);
        column = (column - 1) / 26;
    }
    letters.reverse();
    String::from_utf8_lossy(&letters).into_owned()
}

/// Range covering `rows` × `columns` data cells below a header row
pub fn range_address(rows: usize, columns: usize) -> Result<String> {
    if rows == 0 || columns == 0 {
        return Err(ConnectorError::missing("a non-empty table"));
    }
    Ok(format!("A2:{}{}", column_letter(columns), rows + 1))
}

/// Overwrite the data rows of a worksheet with `table`, keeping the
/// header row.
///
/// The range is cleared first, then written. The two calls are not
/// atomic: a failure between them leaves the range empty.
pub async fn write_range(
    client: &GraphClient,
    file: &FileRef,
    table: &Table,
    sheet: &str,
) -> Result<u16> {
    let address = range_address(table.num_rows(), table.num_columns())?;
    let (item, _) = item_url(client, file).await?;
    let range_url = format!("{item}/workbook/worksheets('{sheet}')/range(address='{address}')");

    let cleared = client.post(&format!("{range_url}/clear"), None).await?;
    if cleared.status != 204 {
        return Err(ConnectorError::Api {
            status: cleared.status,
            body: format!("failed to clear {address}: {}", cleared.body),
        });
    }

    let body = json!({ "values": table.to_json_rows() });
    let reply = client.patch(&range_url, &body).await?;
    tracing::debug!("Wrote {} to '{}' ({})", address, sheet, reply.status);

    Ok(reply.status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_letters() {
        assert_eq!(column_letter(1), "A");
        assert_eq!(column_letter(3), "C");
        assert_eq!(column_letter(26), "Z");
        assert_eq!(column_letter(27), "AA");
        assert_eq!(column_letter(52), "AZ");
        assert_eq!(column_letter(703), "AAA");
    }

    #[test]
    fn test_range_address() {
        assert_eq!(range_address(2, 3).unwrap(), "A2:C3");
        assert_eq!(range_address(1, 28).unwrap(), "A2:AB2");
        assert!(matches!(
            range_address(0, 3),
            Err(ConnectorError::MissingArgument(_))
        ));
    }
}
