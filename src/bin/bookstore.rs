use bookstore::cli::{self as prog_cli, Report};
use bookstore::config::{self, AppConfig, OutputFormat};
use bookstore::utils::logger;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "bookstore", version, about = "plp_bookstore statements over an in-memory document store", long_about = None)]
struct Cli {
    /// Path to a config file (TOML)
    #[arg(long, help = "Path to a config file (TOML). If omitted, the standard locations are tried.")]
    config: Option<PathBuf>,
    #[arg(long, help = "Database name (default plp_bookstore)")]
    database: Option<String>,
    #[arg(long, help = "Collection name (default books)")]
    collection: Option<String>,
    #[arg(long, help = "Documents per page for `page` (default 5)")]
    page_size: Option<usize>,
    #[arg(long, value_enum, help = "Output format (default ndjson)")]
    format: Option<OutputFormat>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Run every bookstore statement in order and print each step")]
    Run,
    #[command(about = "Find documents matching a filter")]
    Find {
        #[arg(help = "Filter as JSON, e.g. '{\"genre\":\"Fiction\"}'")]
        filter: String,
        #[arg(long, help = "Comma-separated fields to keep")]
        project: Option<String>,
        #[arg(long, help = "Drop _id from projected output")]
        no_id: bool,
        #[arg(long, allow_hyphen_values = true, help = "Sort fields, e.g. -price,title")]
        sort: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        skip: Option<usize>,
    },
    #[command(about = "Count documents matching a filter")]
    Count { filter: String },
    #[command(name = "update-one", about = "Apply an update to the first matching document")]
    UpdateOne {
        filter: String,
        #[arg(help = "Update as JSON, e.g. '{\"$set\":{\"price\":13.49}}'")]
        update: String,
    },
    #[command(name = "delete-one", about = "Delete the first matching document")]
    DeleteOne { filter: String },
    #[command(about = "Run an aggregation pipeline given as a JSON array")]
    Aggregate { pipeline: String },
    #[command(about = "Run one of the canned aggregation reports")]
    Report {
        #[arg(value_enum)]
        kind: Report,
    },
    #[command(about = "Print one page (1-based) of the collection")]
    Page {
        n: usize,
        #[arg(long, allow_hyphen_values = true)]
        sort: Option<String>,
    },
    #[command(about = "Create the title and author/year indexes and list them")]
    Indexes,
    #[command(about = "Show the winning plan and execution stats for a filter")]
    Explain {
        filter: String,
        #[arg(long, help = "Create the bookstore indexes before explaining")]
        with_indexes: bool,
    },
}

impl From<Commands> for prog_cli::Command {
    fn from(c: Commands) -> Self {
        match c {
            Commands::Run => Self::Run,
            Commands::Find { filter, project, no_id, sort, limit, skip } => {
                Self::Find { filter_json: filter, project, no_id, sort, limit, skip }
            }
            Commands::Count { filter } => Self::Count { filter_json: filter },
            Commands::UpdateOne { filter, update } => Self::UpdateOne { filter_json: filter, update_json: update },
            Commands::DeleteOne { filter } => Self::DeleteOne { filter_json: filter },
            Commands::Aggregate { pipeline } => Self::Aggregate { pipeline_json: pipeline },
            Commands::Report { kind } => Self::Report(kind),
            Commands::Page { n, sort } => Self::Page { n, sort },
            Commands::Indexes => Self::Indexes,
            Commands::Explain { filter, with_indexes } => Self::Explain { filter_json: filter, with_indexes },
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let overrides = AppConfig {
        database: cli.database,
        collection: cli.collection,
        page_size: cli.page_size,
        format: cli.format,
        ..AppConfig::default()
    };
    let cfg = config::load_config(overrides, cli.config.as_deref())?;
    if let Some(dir) = cfg.log_dir.as_deref() {
        logger::configure_logging(
            Some(dir),
            Some(cfg.log_level()),
            logger::retention_from_env(),
            logger::devlog_from_env(),
        )?;
    }
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    prog_cli::run_seeded(&cfg, cli.command.into(), &mut out)
}
