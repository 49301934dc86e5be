//! Paginated listings
//!
//! Graph collections come back one page at a time with an
//! `@odata.nextLink` pointing at the next page. [`fetch_all_pages`] follows
//! the chain until it ends.

use super::client::GraphClient;
use crate::error::{ConnectorError, Result};
use serde_json::Value;

/// One page of a collection
pub struct Page {
    pub items: Vec<Value>,
    pub next_link: Option<String>,
    pub status: u16,
}

/// Every entry of a collection and the status of its last page
pub struct Listing {
    pub items: Vec<Value>,
    pub status: u16,
}

/// Fetch one page
pub async fn fetch_page(client: &GraphClient, url: &str) -> Result<Page> {
    let reply = client.get_reply(url).await?;

    let items = match reply.body.get("value") {
        Some(Value::Array(items)) => items.clone(),
        Some(Value::Null) | None => Vec::new(),
        Some(_) => return Err(ConnectorError::malformed("'value' is not an array")),
    };

    let next_link = reply
        .body
        .get("@odata.nextLink")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    Ok(Page {
        items,
        next_link,
        status: reply.status,
    })
}

/// Follow `@odata.nextLink` from `first_url` to the last page
pub async fn fetch_listing(client: &GraphClient, first_url: &str) -> Result<Listing> {
    let mut items = Vec::new();
    let mut url = first_url.to_string();
    let mut pages = 0usize;

    let status = loop {
        let page = fetch_page(client, &url).await?;
        pages += 1;
        items.extend(page.items);

        match page.next_link {
            Some(next) => url = next,
            None => break page.status,
        }
    };

    tracing::debug!("Fetched {} entries over {} page(s)", items.len(), pages);
    Ok(Listing { items, status })
}

/// Fetch all entries of a collection (auto-paginate)
pub async fn fetch_all_pages(client: &GraphClient, first_url: &str) -> Result<Vec<Value>> {
    Ok(fetch_listing(client, first_url).await?.items)
}

/// Folder to list, by list item id or by drive path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FolderRef {
    Id(String),
    Path(String),
}

impl FolderRef {
    fn children_url(&self, client: &GraphClient) -> String {
        match self {
            FolderRef::Id(id) => client.list_url(&format!("items/{id}/driveItem/children")),
            FolderRef::Path(path) => format!("{}/children", client.drive_folder_url(path)),
        }
    }

    fn describe(&self) -> String {
        match self {
            FolderRef::Id(id) => format!("folder_id={id}"),
            FolderRef::Path(path) => format!("folder_path={path}"),
        }
    }
}

/// Which children to keep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntryKind {
    Files,
    Folders,
    #[default]
    All,
}

impl EntryKind {
    /// An entry is a folder iff it carries a `folder` facet
    pub fn accepts(self, entry: &Value) -> bool {
        let is_folder = entry.get("folder").is_some();
        match self {
            EntryKind::Files => !is_folder,
            EntryKind::Folders => is_folder,
            EntryKind::All => true,
        }
    }
}

/// Names of a folder's children, in the order the service returns them
pub async fn list_children(
    client: &GraphClient,
    folder: &FolderRef,
    kind: EntryKind,
) -> Result<Vec<String>> {
    let listing = fetch_listing(client, &folder.children_url(client)).await?;

    let names: Vec<String> = listing
        .items
        .iter()
        .filter(|entry| kind.accepts(entry))
        .filter_map(|entry| entry.get("name").and_then(|v| v.as_str()))
        .map(|name| name.to_string())
        .collect();

    client
        .audit(
            "list_children",
            &format!("{}, kind={:?}", folder.describe(), kind),
            listing.status,
        )
        .await;

    Ok(names)
}

/// `folder/file` paths of every file under `folder`, descending at most
/// `layers` levels (1 = the folder itself only).
pub async fn collect_file_paths(
    client: &GraphClient,
    folder: &FolderRef,
    layers: usize,
) -> Result<Vec<String>> {
    let root = match folder {
        FolderRef::Path(path) => path.trim_matches('/').to_string(),
        FolderRef::Id(id) => super::locator::item_path(client, id).await?,
    };

    let mut paths = Vec::new();
    let mut pending = vec![(root, layers.max(1))];

    while let Some((path, remaining)) = pending.pop() {
        let here = FolderRef::Path(path.clone());

        let files = list_children(client, &here, EntryKind::Files).await?;
        paths.extend(files.into_iter().map(|name| format!("{path}/{name}")));

        if remaining > 1 {
            let folders = list_children(client, &here, EntryKind::Folders).await?;
            // Reverse so subfolders are walked in listing order
            for name in folders.into_iter().rev() {
                pending.push((format!("{path}/{name}"), remaining - 1));
            }
        }
    }

    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entry_kind_uses_folder_facet() {
        let file = json!({"name": "a.csv", "file": {}});
        let folder = json!({"name": "Reports", "folder": {"childCount": 3}});

        assert!(EntryKind::Files.accepts(&file));
        assert!(!EntryKind::Files.accepts(&folder));
        assert!(EntryKind::Folders.accepts(&folder));
        assert!(!EntryKind::Folders.accepts(&file));
        assert!(EntryKind::All.accepts(&file) && EntryKind::All.accepts(&folder));
    }
}
