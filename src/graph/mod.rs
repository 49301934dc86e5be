//! Document platform (Microsoft Graph) connector
//!
//! File storage, list records and group membership for one SharePoint
//! site at a time, plus the audit log that mutating calls append to.
//!
//! # Module Structure
//!
//! - [`auth`] - Client-credentials tokens, optionally cached
//! - [`client`] - Main client holding the site context and URL helpers
//! - [`http`] - HTTP utilities for REST API calls
//! - [`locator`] - File references to ids, names and download URLs
//! - [`lister`] - `@odata.nextLink` pagination and folder listings
//! - [`content`] - Reading, downloading, uploading and range writes
//! - [`groups`] - Security groups and membership changes
//! - [`audit`] - Append-only execution log kept in a workbook
//! - [`lists`] - SharePoint list catalogue and records
//!
//! # Example
//!
//! ```ignore
//! use dataconnect::config::Config;
//! use dataconnect::graph::{client::GraphClient, content, locator::FileRef};
//!
//! async fn example() -> dataconnect::error::Result<()> {
//!     let config = Config::load();
//!     let client = GraphClient::from_env(config.graph, None)?;
//!     let file = FileRef::path("Shared Document/Reports/sales.csv");
//!     let table = content::read_item(&client, &file, &Default::default()).await?;
//!     Ok(())
//! }
//! ```

pub mod audit;
pub mod auth;
pub mod client;
pub mod content;
pub mod groups;
pub mod http;
pub mod lister;
pub mod lists;
pub mod locator;
