//! dataconnect - connectors for data-integration jobs
//!
//! Reads and writes files on a Graph document site, manages security-group
//! membership, pulls analytics reports and runs templated SQL, all of it
//! producing or consuming a [`table::Table`].

pub mod analytics;
pub mod codec;
pub mod config;
pub mod error;
pub mod graph;
pub mod runlog;
pub mod sql;
pub mod table;

pub use error::{ConnectorError, Result};
pub use table::{Cell, Table};

/// Version injected at compile time via DATACONNECT_VERSION env var (set by
/// CI/CD), or "dev" for local builds.
pub const VERSION: &str = match option_env!("DATACONNECT_VERSION") {
    Some(v) => v,
    None => "dev",
};
