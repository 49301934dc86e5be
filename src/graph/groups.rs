//! Security groups and membership
//!
//! Identities (e-mail addresses) are resolved to directory object ids
//! through a roster CSV kept in the document library. Membership changes
//! issue one call per resolved id, in sequence, with no rollback.

use super::client::GraphClient;
use super::content;
use super::lister::fetch_all_pages;
use super::locator::FileRef;
use crate::codec::ReadOptions;
use crate::error::{ConnectorError, Result};
use crate::table::{Cell, Table};
use serde_json::{json, Value};
use std::collections::HashMap;

const SECURITY_GROUP_FILTER: &str = "mailEnabled eq false and securityEnabled eq true";

/// Result of a membership batch
#[derive(Debug, Clone, Default)]
pub struct MembershipOutcome {
    pub group_id: String,
    /// Object id and response status of each call, in call order
    pub applied: Vec<(String, u16)>,
    /// Identities not found in the roster
    pub unresolved: Vec<String>,
}

impl MembershipOutcome {
    /// Status of the final call
    pub fn last_status(&self) -> Option<u16> {
        self.applied.last().map(|(_, status)| *status)
    }

    pub fn all_succeeded(&self) -> bool {
        self.applied.iter().all(|(_, status)| (200..300).contains(status))
    }
}

#[derive(Debug, Clone, Copy)]
enum Change {
    Add,
    Remove,
}

impl Change {
    fn operation(self) -> &'static str {
        match self {
            Change::Add => "add_members",
            Change::Remove => "remove_members",
        }
    }
}

async fn security_groups(client: &GraphClient) -> Result<Vec<Value>> {
    let url = client.graph_url(&format!(
        "groups?$filter={}",
        urlencoding::encode(SECURITY_GROUP_FILTER)
    ));
    fetch_all_pages(client, &url).await
}

fn display_name(group: &Value) -> Option<&str> {
    group.get("displayName").and_then(|v| v.as_str())
}

fn id_of(group: &Value) -> Option<&str> {
    group.get("id").and_then(|v| v.as_str())
}

/// Catalogue of security groups, all pages
pub async fn list_groups(client: &GraphClient) -> Result<Table> {
    let groups = security_groups(client).await?;
    Ok(Table::from_json_records(&groups))
}

/// Members of each named group with a `groupName` column.
/// Names that match no group contribute nothing.
pub async fn list_members(client: &GraphClient, group_names: &[String]) -> Result<Table> {
    let groups = security_groups(client).await?;

    let mut seen = Vec::new();
    let mut result = Table::default();

    for group in &groups {
        let (Some(name), Some(id)) = (display_name(group), id_of(group)) else {
            continue;
        };
        if !group_names.iter().any(|n| n == name) || seen.contains(&id) {
            continue;
        }
        seen.push(id);

        let members = fetch_all_pages(client, &client.graph_url(&format!("groups/{id}/members"))).await?;
        let mut table = Table::from_json_records(&members);
        table.set_constant_column("groupName", Cell::Text(name.to_string()));
        result.append(table);
    }

    Ok(result)
}

/// Lowercase e-mail to object id, read from the roster CSV
pub async fn load_roster(client: &GraphClient) -> Result<HashMap<String, String>> {
    let file = FileRef::path(client.settings.roster_path.as_str());
    let table = content::read_item(client, &file, &ReadOptions::default()).await?;
    roster_from_table(&table)
}

fn roster_from_table(table: &Table) -> Result<HashMap<String, String>> {
    let (Some(email), Some(object_id)) = (table.column_index("email"), table.column_index("object_id"))
    else {
        return Err(ConnectorError::malformed(
            "roster must have 'email' and 'object_id' columns",
        ));
    };

    Ok(table
        .rows()
        .iter()
        .filter(|row| !row[email].is_null() && !row[object_id].is_null())
        .map(|row| (row[email].to_string().to_lowercase(), row[object_id].to_string()))
        .collect())
}

/// Add identities to a group
pub async fn add_members(
    client: &GraphClient,
    group: &str,
    identities: &[String],
) -> Result<MembershipOutcome> {
    change_members(client, group, identities, Change::Add).await
}

/// Remove identities from a group
pub async fn remove_members(
    client: &GraphClient,
    group: &str,
    identities: &[String],
) -> Result<MembershipOutcome> {
    change_members(client, group, identities, Change::Remove).await
}

async fn change_members(
    client: &GraphClient,
    group: &str,
    identities: &[String],
    change: Change,
) -> Result<MembershipOutcome> {
    if group.is_empty() {
        return Err(ConnectorError::missing("group name"));
    }
    if identities.is_empty() {
        return Err(ConnectorError::missing("identities"));
    }

    let groups = security_groups(client).await?;
    let group_id = groups
        .iter()
        .find(|g| display_name(g) == Some(group))
        .and_then(id_of)
        .ok_or_else(|| ConnectorError::NotFound(format!("group '{group}'")))?
        .to_string();

    let roster = load_roster(client).await?;
    let (object_ids, unresolved) = resolve(&roster, identities);

    if !unresolved.is_empty() {
        tracing::warn!("Not in roster, skipped: {}", unresolved.join(", "));
    }
    if object_ids.is_empty() {
        return Err(ConnectorError::NotFound(
            "none of the identities are in the roster".to_string(),
        ));
    }

    let mut outcome = MembershipOutcome {
        group_id: group_id.clone(),
        applied: Vec::with_capacity(object_ids.len()),
        unresolved,
    };

    for object_id in object_ids {
        let result = match change {
            Change::Add => {
                let body = json!({
                    "@odata.id": client.graph_url(&format!("directoryObjects/{object_id}"))
                });
                client
                    .post(&client.graph_url(&format!("groups/{group_id}/members/$ref")), Some(&body))
                    .await
            }
            Change::Remove => {
                client
                    .delete(&client.graph_url(&format!("groups/{group_id}/members/{object_id}/$ref")))
                    .await
            }
        };

        // Upstream rejections are recorded per identity; transport faults abort
        let status = match result {
            Ok(reply) => reply.status,
            Err(e) => match e.status() {
                Some(status) => status,
                None => return Err(e),
            },
        };
        tracing::info!("{:?} {} in group '{}': {}", change, object_id, group, status);
        outcome.applied.push((object_id, status));
    }

    client
        .audit(
            change.operation(),
            &format!("group={group}, identities={identities:?}"),
            outcome.last_status().unwrap_or_default(),
        )
        .await;

    Ok(outcome)
}

/// Case-fold identities and split them into resolved object ids
/// (deduplicated, first-seen order) and unresolved identities.
fn resolve(roster: &HashMap<String, String>, identities: &[String]) -> (Vec<String>, Vec<String>) {
    let mut object_ids: Vec<String> = Vec::new();
    let mut unresolved = Vec::new();

    for identity in identities {
        let key = identity.trim().to_lowercase();
        match roster.get(&key) {
            Some(id) if !object_ids.contains(id) => object_ids.push(id.clone()),
            Some(_) => {}
            None => unresolved.push(identity.clone()),
        }
    }

    (object_ids, unresolved)
}
