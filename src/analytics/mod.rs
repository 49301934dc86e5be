//! Web analytics reporting connector
//!
//! Runs `runReport` against the Analytics Data API and returns the rows as
//! a [`Table`](crate::table::Table).
//!
//! # Module Structure
//!
//! - [`auth`] - Token acquisition through `gcp_auth`
//! - [`client`] - Report client
//! - [`report`] - Request presets and response shaping

pub mod auth;
pub mod client;
pub mod report;
