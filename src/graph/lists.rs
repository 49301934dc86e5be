//! SharePoint lists as tables

use super::client::GraphClient;
use super::lister::fetch_all_pages;
use crate::error::{ConnectorError, Result};
use crate::table::{Cell, Table};
use serde_json::Value;

const CATALOGUE_COLUMNS: [&str; 3] = ["name", "id", "displayName"];

/// Lists of the current site: `name`, `id`, `displayName`
pub async fn show_all_lists(client: &GraphClient) -> Result<Table> {
    let lists = fetch_all_pages(client, &client.site_url("lists")).await?;
    Ok(catalogue(&lists))
}

fn catalogue(lists: &[Value]) -> Table {
    let mut table = Table::new(CATALOGUE_COLUMNS);
    for list in lists {
        let row = CATALOGUE_COLUMNS
            .iter()
            .map(|key| list.get(*key).map(Cell::from_json).unwrap_or_default())
            .collect();
        table.push_row(row);
    }
    table
}

/// Records of the list whose display name is `list_name`, one row per
/// item built from its `fields`.
pub async fn read_list(client: &GraphClient, list_name: &str) -> Result<Table> {
    if list_name.is_empty() {
        return Err(ConnectorError::missing("list name"));
    }

    let lists = fetch_all_pages(client, &client.site_url("lists")).await?;
    let list_id = lists
        .iter()
        .find(|list| list.get("displayName").and_then(|v| v.as_str()) == Some(list_name))
        .and_then(|list| list.get("id").and_then(|v| v.as_str()))
        .ok_or_else(|| ConnectorError::NotFound(format!("list '{list_name}'")))?;

    let items = fetch_all_pages(
        client,
        &client.site_url(&format!("lists/{list_id}/items?expand=fields")),
    )
    .await?;

    let fields: Vec<Value> = items
        .into_iter()
        .filter_map(|mut item| item.get_mut("fields").map(Value::take))
        .collect();

    tracing::debug!("Read {} record(s) from list '{}'", fields.len(), list_name);
    Ok(Table::from_json_records(&fields))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_catalogue_keeps_three_columns() {
        let lists = vec![
            json!({"name": "Tasks", "id": "l-1", "displayName": "Team Tasks", "webUrl": "x"}),
            json!({"name": "Docs", "id": "l-2"}),
        ];
        let table = catalogue(&lists);
        assert_eq!(table.columns(), ["name", "id", "displayName"]);
        assert_eq!(table.num_rows(), 2);
        assert_eq!(table.rows()[1][2], Cell::Null);
    }
}
