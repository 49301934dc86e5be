use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use dataconnect::analytics::client::AnalyticsClient;
use dataconnect::analytics::report::{ReportCategory, ReportRequest};
use dataconnect::codec::{self, FileFormat, ReadOptions};
use dataconnect::config::Config;
use dataconnect::graph::client::GraphClient;
use dataconnect::graph::content::{self, ItemRef};
use dataconnect::graph::groups::{self, MembershipOutcome};
use dataconnect::graph::lister::{self, EntryKind, FolderRef};
use dataconnect::graph::lists;
use dataconnect::graph::locator::FileRef;
use dataconnect::runlog::{setup_logger, LogSettings};
use dataconnect::sql::{LoadMode, LoadOptions, SqlClient, TableTarget, Variables};
use dataconnect::{Cell, Table, VERSION};
use std::path::{Path, PathBuf};
use tracing::Level;

/// Connectors for document sites, security groups, analytics and SQL
#[derive(Parser, Debug)]
#[command(name = "dataconnect", version, about, long_about = None)]
struct Args {
    /// Configuration file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Site profile whose credentials to use
    #[arg(long, global = true)]
    profile: Option<String>,

    /// Log level
    #[arg(long, value_enum, default_value = "info", global = true)]
    log_level: LogLevel,

    /// Directory for log files
    #[arg(long, default_value = "./logs", global = true)]
    log_dir: PathBuf,

    /// Log file name, without extension
    #[arg(long, default_value = "application", global = true)]
    log_name: String,

    /// Start a timestamped log file instead of appending
    #[arg(long, global = true)]
    new_log_file: bool,

    /// Log to stderr only
    #[arg(long, global = true)]
    no_log_file: bool,

    /// Write result tables to this CSV file instead of stdout
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Level {
        match self {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Kind {
    Files,
    Folders,
    All,
}

impl From<Kind> for EntryKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Files => EntryKind::Files,
            Kind::Folders => EntryKind::Folders,
            Kind::All => EntryKind::All,
        }
    }
}

/// File on the document site
#[derive(clap::Args, Debug, Clone)]
struct FileArgs {
    /// Sharing link
    #[arg(long)]
    url: Option<String>,

    /// Path relative to the drive root
    #[arg(long)]
    path: Option<String>,

    /// File name, searched in the list when no folder is given
    #[arg(long)]
    name: Option<String>,

    /// Folder holding `--name`
    #[arg(long)]
    folder: Option<String>,
}

impl FileArgs {
    fn file_ref(&self) -> FileRef {
        FileRef {
            file_url: self.url.clone(),
            file_path: self.path.clone(),
            file_name: self.name.clone(),
            parent_folder: self.folder.clone(),
        }
    }
}

/// Folder on the document site
#[derive(clap::Args, Debug, Clone)]
struct FolderArgs {
    /// Folder path relative to the drive root
    #[arg(long, conflicts_with = "folder_id", required_unless_present = "folder_id")]
    folder_path: Option<String>,

    /// List item id of the folder
    #[arg(long)]
    folder_id: Option<String>,
}

impl FolderArgs {
    fn folder_ref(&self) -> FolderRef {
        match (&self.folder_id, &self.folder_path) {
            (Some(id), _) => FolderRef::Id(id.clone()),
            (None, path) => FolderRef::Path(path.clone().unwrap_or_default()),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show every list of the site
    Lists,

    /// Read the records of a list
    ListItems {
        #[arg(long)]
        list: String,
    },

    /// List the children of a folder
    Ls {
        #[command(flatten)]
        folder: FolderArgs,

        #[arg(long, value_enum, default_value = "all")]
        kind: Kind,

        /// Collect file paths this many folder levels deep
        #[arg(long)]
        recursive: Option<usize>,
    },

    /// Read a file into a table
    Read {
        #[command(flatten)]
        file: FileArgs,

        #[arg(long, default_value = codec::DEFAULT_SHEET)]
        sheet: String,

        /// Field separator for .txt files
        #[arg(long, default_value = ";")]
        separator: char,

        /// Leading lines to skip in .txt files
        #[arg(long, default_value_t = 1)]
        skip_rows: usize,
    },

    /// Download a file to a local directory
    Download {
        #[command(flatten)]
        file: FileArgs,

        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },

    /// Upload a local file
    Upload {
        #[command(flatten)]
        file: FileArgs,

        /// Local file to send
        #[arg(long)]
        local: PathBuf,
    },

    /// Delete a list item, by id or by file
    Delete {
        #[arg(long, conflicts_with_all = ["url", "path", "name"])]
        item_id: Option<String>,

        #[command(flatten)]
        file: FileArgs,
    },

    /// Overwrite a worksheet range with the contents of a local file
    WriteRange {
        #[command(flatten)]
        file: FileArgs,

        #[arg(long, default_value = codec::DEFAULT_SHEET)]
        sheet: String,

        /// Local file with the rows to write
        #[arg(long)]
        local: PathBuf,
    },

    /// Show the security groups
    Groups,

    /// List the members of one or more groups
    Members {
        #[arg(long = "group", required = true)]
        groups: Vec<String>,
    },

    /// Add identities to a group
    AddMember {
        #[arg(long)]
        group: String,

        /// Email address of a member
        #[arg(long = "identity", required = true)]
        identities: Vec<String>,
    },

    /// Remove identities from a group
    RemoveMember {
        #[arg(long)]
        group: String,

        #[arg(long = "identity", required = true)]
        identities: Vec<String>,
    },

    /// Run an analytics report
    Report {
        /// Property id (defaults to the configured one)
        #[arg(long)]
        property: Option<String>,

        /// Preset dimensions and metrics: page or event
        #[arg(long)]
        category: Option<ReportCategory>,

        #[arg(long = "dimension")]
        dimensions: Vec<String>,

        #[arg(long = "metric")]
        metrics: Vec<String>,

        /// YYYY-MM-DD, defaults to yesterday
        #[arg(long)]
        start: Option<NaiveDate>,

        #[arg(long)]
        end: Option<NaiveDate>,
    },

    /// Run a SQL template file or a single query
    Sql {
        /// Connection name, the prefix of its environment variables
        #[arg(long)]
        conn: Option<String>,

        #[arg(long, conflicts_with = "query", required_unless_present = "query")]
        file: Option<PathBuf>,

        #[arg(long)]
        query: Option<String>,

        /// Template variable as key=value
        #[arg(long = "var", value_parser = parse_variable)]
        vars: Vec<(String, String)>,
    },

    /// Load a local file into a database table
    Load {
        #[arg(long)]
        conn: Option<String>,

        #[arg(long)]
        local: PathBuf,

        #[arg(long)]
        schema: Option<String>,

        #[arg(long)]
        table: String,

        /// Keep existing rows
        #[arg(long)]
        append: bool,

        /// Do not add the load-time column
        #[arg(long)]
        no_updated_time: bool,

        /// SQL type for a column as column=TYPE, instead of the inferred one
        #[arg(long = "type", value_parser = parse_variable)]
        types: Vec<(String, String)>,
    },
}

impl Command {
    fn step_name(&self) -> &'static str {
        match self {
            Command::Lists => "show lists",
            Command::ListItems { .. } => "read list",
            Command::Ls { .. } => "list folder",
            Command::Read { .. } => "read file",
            Command::Download { .. } => "download file",
            Command::Upload { .. } => "upload file",
            Command::Delete { .. } => "delete item",
            Command::WriteRange { .. } => "write range",
            Command::Groups => "show groups",
            Command::Members { .. } => "list members",
            Command::AddMember { .. } => "add members",
            Command::RemoveMember { .. } => "remove members",
            Command::Report { .. } => "analytics report",
            Command::Sql { .. } => "run sql",
            Command::Load { .. } => "load table",
        }
    }
}

fn parse_variable(raw: &str) -> std::result::Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))
}

impl Args {
    fn log_settings(&self) -> LogSettings {
        LogSettings {
            level: self.log_level.to_tracing_level(),
            save_log: !self.no_log_file,
            new_file_per_run: self.new_log_file,
            log_name: self.log_name.clone(),
            log_dir: self.log_dir.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load(),
    };

    let mut logger = setup_logger(&args.log_settings()).context("Failed to set up logging")?;
    tracing::info!("dataconnect {} started", VERSION);

    let step = args.command.step_name();
    let table = logger
        .run_step_async(step, run(&args.command, &config, args.profile.as_deref()))
        .await;

    if let Some(table) = table {
        emit(&table, args.output.as_deref())?;
    }

    Ok(())
}

fn graph_client(config: &Config, profile: Option<&str>) -> Result<GraphClient> {
    GraphClient::from_env(config.graph.clone(), profile).context("Failed to create Graph client")
}

async fn sql_client(config: &Config, conn: Option<&str>) -> Result<SqlClient> {
    let conn = conn.unwrap_or(&config.sql.default_connection);
    SqlClient::from_env(conn)
        .await
        .with_context(|| format!("Failed to connect with {conn}"))
}

fn read_local(path: &Path) -> Result<Table> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    Ok(codec::decode(&bytes, FileFormat::from_name(name), &ReadOptions::default())?)
}

fn single_column(name: &str, values: impl IntoIterator<Item = String>) -> Table {
    let mut table = Table::new([name]);
    for value in values {
        table.push_row(vec![Cell::Text(value)]);
    }
    table
}

fn outcome_table(outcome: &MembershipOutcome) -> Table {
    for identity in &outcome.unresolved {
        tracing::warn!("Not in roster: {}", identity);
    }
    let mut table = Table::new(["object_id", "status"]);
    for (object_id, status) in &outcome.applied {
        table.push_row(vec![Cell::Text(object_id.clone()), Cell::Int(i64::from(*status))]);
    }
    table
}

/// Run one command; tables are printed by the caller
async fn run(command: &Command, config: &Config, profile: Option<&str>) -> Result<Option<Table>> {
    match command {
        Command::Lists => {
            let client = graph_client(config, profile)?;
            Ok(Some(lists::show_all_lists(&client).await?))
        }
        Command::ListItems { list } => {
            let client = graph_client(config, profile)?;
            Ok(Some(lists::read_list(&client, list).await?))
        }
        Command::Ls {
            folder,
            kind,
            recursive,
        } => {
            let client = graph_client(config, profile)?;
            let folder = folder.folder_ref();
            let table = match recursive {
                Some(layers) => single_column(
                    "path",
                    lister::collect_file_paths(&client, &folder, *layers).await?,
                ),
                None => single_column(
                    "name",
                    lister::list_children(&client, &folder, (*kind).into()).await?,
                ),
            };
            Ok(Some(table))
        }
        Command::Read {
            file,
            sheet,
            separator,
            skip_rows,
        } => {
            let client = graph_client(config, profile)?;
            let separator = u8::try_from(*separator).context("Separator must be a single-byte character")?;
            let options = ReadOptions {
                sheet_name: sheet.clone(),
                separator,
                skip_rows: *skip_rows,
            };
            Ok(Some(content::read_item(&client, &file.file_ref(), &options).await?))
        }
        Command::Download { file, dir } => {
            let client = graph_client(config, profile)?;
            let saved = content::download_item(&client, &file.file_ref(), dir).await?;
            tracing::info!("Saved {}", saved.display());
            Ok(None)
        }
        Command::Upload { file, local } => {
            let client = graph_client(config, profile)?;
            let status = content::upload_item(&client, &file.file_ref(), local).await?;
            tracing::info!("Upload finished with status {}", status);
            Ok(None)
        }
        Command::Delete { item_id, file } => {
            let client = graph_client(config, profile)?;
            let item = match item_id {
                Some(id) => ItemRef::Id(id.clone()),
                None => ItemRef::File(file.file_ref()),
            };
            let status = content::delete_item(&client, &item).await?;
            tracing::info!("Delete finished with status {}", status);
            Ok(None)
        }
        Command::WriteRange { file, sheet, local } => {
            let client = graph_client(config, profile)?;
            let table = read_local(local)?;
            let status = content::write_range(&client, &file.file_ref(), &table, sheet).await?;
            tracing::info!("Wrote {} row(s), status {}", table.num_rows(), status);
            Ok(None)
        }
        Command::Groups => {
            let client = graph_client(config, profile)?;
            Ok(Some(groups::list_groups(&client).await?))
        }
        Command::Members { groups: names } => {
            let client = graph_client(config, profile)?;
            Ok(Some(groups::list_members(&client, names).await?))
        }
        Command::AddMember { group, identities } => {
            let client = graph_client(config, profile)?;
            let outcome = groups::add_members(&client, group, identities).await?;
            Ok(Some(outcome_table(&outcome)))
        }
        Command::RemoveMember { group, identities } => {
            let client = graph_client(config, profile)?;
            let outcome = groups::remove_members(&client, group, identities).await?;
            Ok(Some(outcome_table(&outcome)))
        }
        Command::Report {
            property,
            category,
            dimensions,
            metrics,
            start,
            end,
        } => {
            let client = AnalyticsClient::from_settings(&config.analytics)
                .await
                .context("Failed to create analytics client")?;
            let request = ReportRequest {
                property_id: property.clone().unwrap_or_default(),
                category: *category,
                dimensions: dimensions.clone(),
                metrics: metrics.clone(),
                start_date: *start,
                end_date: *end,
            };
            Ok(Some(client.extract(&request).await?))
        }
        Command::Sql {
            conn,
            file,
            query,
            vars,
        } => {
            let client = sql_client(config, conn.as_deref()).await?;
            let variables: Variables = vars.iter().cloned().collect();
            let result = match file {
                Some(path) => client.execute_file(path, &variables).await,
                None => {
                    let query = query.as_deref().unwrap_or_default();
                    client.read_query(query, &variables).await
                }
            };
            client.close().await;
            Ok(Some(result?))
        }
        Command::Load {
            conn,
            local,
            schema,
            table,
            append,
            no_updated_time,
            types,
        } => {
            let data = read_local(local)?;
            let client = sql_client(config, conn.as_deref()).await?;
            let options = LoadOptions {
                mode: if *append { LoadMode::Append } else { LoadMode::Replace },
                add_updated_time: !no_updated_time,
                type_overrides: types.iter().cloned().collect(),
            };
            let result = client
                .load_data(&data, &TableTarget::new(schema.as_deref(), table), &options)
                .await;
            client.close().await;
            result?;
            Ok(None)
        }
    }
}

fn emit(table: &Table, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            table.write_csv(file)?;
            tracing::info!("Wrote {} row(s) to {}", table.num_rows(), path.display());
        }
        None => table.write_csv(std::io::stdout().lock())?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delete_by_file_reference() {
        let args = Args::try_parse_from([
            "dataconnect", "delete", "--name", "budget.xlsx", "--folder", "Finance",
        ])
        .unwrap();

        let Command::Delete { item_id, file } = args.command else {
            panic!("expected delete");
        };
        assert!(item_id.is_none());
        assert_eq!(file.file_ref(), FileRef::named("budget.xlsx").in_folder("Finance"));
    }

    #[test]
    fn test_delete_id_conflicts_with_file() {
        let result = Args::try_parse_from(["dataconnect", "delete", "--item-id", "7", "--path", "a/b.csv"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_load_type_overrides() {
        let args = Args::try_parse_from([
            "dataconnect", "load", "--local", "orders.csv", "--table", "orders",
            "--type", "code=VARCHAR(12)", "--type", "note=TEXT",
        ])
        .unwrap();

        let Command::Load { types, .. } = args.command else {
            panic!("expected load");
        };
        assert_eq!(
            types,
            [
                ("code".to_string(), "VARCHAR(12)".to_string()),
                ("note".to_string(), "TEXT".to_string())
            ]
        );
        assert!(Args::try_parse_from(["dataconnect", "load", "--local", "x.csv", "--table", "t", "--type", "bad"]).is_err());
    }
}
