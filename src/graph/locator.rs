//! Resource location
//!
//! Turns a human-facing file reference (shared link, full path, or name plus
//! parent folder) into backend identifiers and metadata.

use super::client::GraphClient;
use crate::error::{ConnectorError, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::Value;

/// Header that lets the list query filter on a non-indexed column
const PREFER_NON_INDEXED: &str = "HonorNonIndexedQueriesWarningMayFailRandomly";

/// Reference to a file in the document library.
///
/// Precedence when several fields are set:
/// `file_url` > `file_path` > `file_name` + `parent_folder`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileRef {
    /// Sharing link copied from the web UI
    pub file_url: Option<String>,
    /// `folder/sub/name.ext` relative to the drive root
    pub file_path: Option<String>,
    pub file_name: Option<String>,
    pub parent_folder: Option<String>,
}

impl FileRef {
    pub fn shared_link(url: impl Into<String>) -> Self {
        Self {
            file_url: Some(url.into()),
            ..Default::default()
        }
    }

    pub fn path(path: impl Into<String>) -> Self {
        Self {
            file_path: Some(path.into()),
            ..Default::default()
        }
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            file_name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn in_folder(mut self, folder: impl Into<String>) -> Self {
        self.parent_folder = Some(folder.into());
        self
    }

    /// Resolve the precedence rules into a single addressing mode
    pub fn target(&self) -> Result<Target> {
        if let Some(url) = non_empty(&self.file_url) {
            return Ok(Target::SharedLink(url.to_string()));
        }

        if let Some(path) = non_empty(&self.file_path) {
            let path = path.trim_matches('/');
            return Ok(match path.rsplit_once('/') {
                Some((folder, name)) => Target::Path {
                    folder: Some(folder.to_string()),
                    name: name.to_string(),
                },
                None => Target::Path {
                    folder: None,
                    name: path.to_string(),
                },
            });
        }

        match (non_empty(&self.file_name), non_empty(&self.parent_folder)) {
            (Some(name), folder) => Ok(Target::Path {
                folder: folder.map(|f| f.trim_matches('/').to_string()),
                name: name.to_string(),
            }),
            (None, Some(_)) => Err(ConnectorError::missing("file name for the given parent folder")),
            (None, None) => Err(ConnectorError::missing(
                "one of file_url, file_path or file_name",
            )),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Addressing mode of a [`FileRef`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    SharedLink(String),
    Path { folder: Option<String>, name: String },
}

/// Encode a sharing link as the opaque token the shares endpoint expects
pub fn share_token(url: &str) -> String {
    format!("u!{}", URL_SAFE_NO_PAD.encode(url.as_bytes()))
}

/// Drive item metadata
#[derive(Debug, Clone)]
pub struct DriveItem {
    pub id: String,
    pub name: String,
    pub e_tag: Option<String>,
    pub download_url: Option<String>,
    pub raw: Value,
}

impl DriveItem {
    pub fn from_json(value: Value) -> Result<Self> {
        let field = |key: &str| value.get(key).and_then(|v| v.as_str()).map(str::to_string);

        let id = field("id").ok_or_else(|| ConnectorError::malformed("drive item without id"))?;
        let name =
            field("name").ok_or_else(|| ConnectorError::malformed("drive item without name"))?;

        Ok(Self {
            id,
            name,
            e_tag: field("eTag"),
            download_url: field("@microsoft.graph.downloadUrl"),
            raw: value,
        })
    }

    /// Lowercase GUID carried in the eTag
    pub fn guid(&self) -> Result<String> {
        let etag = self
            .e_tag
            .as_deref()
            .ok_or_else(|| ConnectorError::malformed(format!("drive item '{}' has no eTag", self.name)))?;
        etag_guid(etag)
    }
}

/// Extract the lowercase GUID from an eTag such as `"{5C1D...},3"`
pub fn etag_guid(etag: &str) -> Result<String> {
    let malformed = || ConnectorError::malformed(format!("eTag without GUID: {etag}"));

    let start = etag.find('{').ok_or_else(malformed)?;
    let len = etag[start + 1..].find('}').ok_or_else(malformed)?;
    let guid = &etag[start + 1..start + 1 + len];
    if guid.is_empty() {
        return Err(malformed());
    }

    Ok(guid.to_lowercase())
}

/// Fetch drive item metadata for a file reference
pub async fn drive_item(client: &GraphClient, file: &FileRef) -> Result<DriveItem> {
    let url = match file.target()? {
        Target::SharedLink(link) => client.share_url(&share_token(&link)),
        Target::Path { folder, name } => client.drive_path_url(folder.as_deref(), &name),
    };

    let response = client.get(&url).await?;
    DriveItem::from_json(response)
}

/// GUID of the file, shared by its drive item and its list item
pub async fn item_guid(client: &GraphClient, file: &FileRef) -> Result<String> {
    drive_item(client, file).await?.guid()
}

/// Pre-authenticated download URL for the file
pub async fn download_url(client: &GraphClient, file: &FileRef) -> Result<String> {
    let item = drive_item(client, file).await?;
    item.download_url
        .ok_or_else(|| ConnectorError::malformed(format!("no download URL for '{}'", item.name)))
}

/// File name as stored (useful for shared links)
pub async fn file_name(client: &GraphClient, file: &FileRef) -> Result<String> {
    Ok(drive_item(client, file).await?.name)
}

/// Resolve a file reference to its list item id.
///
/// Several files may share a name across folders. Without a parent folder
/// (or a shared link) such a collision is reported as
/// [`ConnectorError::Ambiguous`] rather than guessed.
pub async fn search_item_id(client: &GraphClient, file: &FileRef) -> Result<String> {
    let (name, pinned) = match file.target()? {
        Target::SharedLink(_) => (file_name(client, file).await?, true),
        Target::Path { folder, name } => (name, folder.is_some()),
    };

    let filter = format!("fields/FileLeafRef eq '{}'", name.replace('\'', "''"));
    let url = format!(
        "{}?$select=lastModifiedDateTime,id,contentType&$expand=fields($select=FileLeafRef,id)&$filter={}",
        client.list_url("items"),
        urlencoding::encode(&filter)
    );

    let token = client.get_token().await?;
    let response = client
        .http
        .get_with_header(&url, &token, "Prefer", PREFER_NON_INDEXED)
        .await?;

    let entries = response
        .get("value")
        .and_then(|v| v.as_array())
        .ok_or_else(|| ConnectorError::malformed("list items response without 'value'"))?;

    match entries.len() {
        0 => return Err(ConnectorError::NotFound(format!("no file named '{name}'"))),
        1 if !pinned => return list_item_id(&entries[0]),
        n if !pinned => {
            return Err(ConnectorError::Ambiguous(format!(
                "{n} files named '{name}'; give the parent folder to pick one"
            )))
        }
        _ => {}
    }

    let guid = item_guid(client, file).await?;
    let matched = entries.iter().find(|entry| {
        entry
            .get("@odata.etag")
            .and_then(|v| v.as_str())
            .map(|etag| etag.to_lowercase().contains(&guid))
            .unwrap_or(false)
    });

    match matched {
        Some(entry) => list_item_id(entry),
        None => Err(ConnectorError::NotFound(format!(
            "'{name}' not found in the given folder"
        ))),
    }
}

fn list_item_id(entry: &Value) -> Result<String> {
    entry
        .get("fields")
        .and_then(|f| f.get("id"))
        .or_else(|| entry.get("id"))
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| ConnectorError::malformed("list item without id"))
}

/// File name of a list item
pub async fn search_item_name(client: &GraphClient, item_id: &str) -> Result<String> {
    let response = client.get(&client.list_url(&format!("items/{item_id}"))).await?;

    response
        .get("fields")
        .and_then(|f| f.get("FileLeafRef"))
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| ConnectorError::malformed(format!("list item {item_id} has no FileLeafRef")))
}

/// Drive-relative path (`folder/name`) of a list item
pub async fn item_path(client: &GraphClient, item_id: &str) -> Result<String> {
    let response = client
        .get(&client.list_url(&format!("items/{item_id}/driveItem")))
        .await?;

    let name = response
        .get("name")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ConnectorError::malformed("drive item without name"))?;
    let parent = response
        .get("parentReference")
        .and_then(|p| p.get("path"))
        .and_then(|v| v.as_str())
        .ok_or_else(|| ConnectorError::malformed("drive item without parentReference.path"))?;

    let folder = parent
        .split_once("root:")
        .map(|(_, rest)| rest.trim_matches('/'))
        .ok_or_else(|| ConnectorError::malformed(format!("unexpected parent path: {parent}")))?;

    Ok(if folder.is_empty() {
        name.to_string()
    } else {
        format!("{folder}/{name}")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence_url_over_path_over_name() {
        let file = FileRef {
            file_url: Some("https://tenant.sharepoint.com/:x:/s/a".into()),
            file_path: Some("A/b.csv".into()),
            file_name: Some("c.csv".into()),
            parent_folder: Some("D".into()),
        };
        assert!(matches!(file.target().unwrap(), Target::SharedLink(_)));

        let file = FileRef {
            file_url: None,
            ..file
        };
        assert_eq!(
            file.target().unwrap(),
            Target::Path {
                folder: Some("A".into()),
                name: "b.csv".into()
            }
        );
    }

    #[test]
    fn test_name_with_folder() {
        let target = FileRef::named("data.xlsx").in_folder("/Reports/2024/").target().unwrap();
        assert_eq!(
            target,
            Target::Path {
                folder: Some("Reports/2024".into()),
                name: "data.xlsx".into()
            }
        );
    }

    #[test]
    fn test_missing_reference() {
        assert!(matches!(
            FileRef::default().target(),
            Err(ConnectorError::MissingArgument(_))
        ));
        assert!(matches!(
            FileRef::default().in_folder("Reports").target(),
            Err(ConnectorError::MissingArgument(_))
        ));
    }

    #[test]
    fn test_share_token_is_unpadded_url_safe() {
        let token = share_token("https://contoso.sharepoint.com/:x:/s/team/abc?e=1");
        assert!(token.starts_with("u!"));
        assert!(!token.contains('='));
        assert!(!token.contains('+'));
        assert!(!token.contains('/'));
    }

    #[test]
    fn test_etag_guid() {
        assert_eq!(
            etag_guid("\"{5C1D8A5E-AAAA-BBBB-CCCC-0123456789AB},3\"").unwrap(),
            "5c1d8a5e-aaaa-bbbb-cccc-0123456789ab"
        );
        assert!(matches!(
            etag_guid("\"no-guid,3\""),
            Err(ConnectorError::MalformedResponse(_))
        ));
        assert!(etag_guid("{}").is_err());
    }

    #[test]
    fn test_drive_item_requires_id() {
        let err = DriveItem::from_json(serde_json::json!({"name": "x"})).unwrap_err();
        assert!(matches!(err, ConnectorError::MalformedResponse(_)));
    }
}
