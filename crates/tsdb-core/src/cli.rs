//! Command-line arguments for `tsdb-logstore`.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::filter::LevelFilter;
use tsdb_client::{EventQuery, SqlValue, DEFAULT_LIMIT};
use tsdb_config::ValidationError;

use crate::install::{InstallOptions, DEFAULT_COMPRESS_AFTER_HOURS};
use crate::logging::{LogConfig, LogFormat};

/// TimescaleDB event log store: install, check, query, ingest.
#[derive(Parser, Debug)]
#[command(name = "tsdb-logstore")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug)]
pub struct GlobalOpts {
    /// Settings file (overrides TSDB_LOGSTORE_CONFIG)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format on stdout
    #[arg(long, short = 'f', global = true, value_enum, default_value_t = OutputFormat::Human)]
    pub format: OutputFormat,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Log format on stderr
    #[arg(long, global = true, value_enum)]
    pub log_format: Option<LogFormat>,
}

impl GlobalOpts {
    /// Level requested by flags, if any.
    pub fn log_level(&self) -> Option<LevelFilter> {
        if self.quiet {
            return Some(LevelFilter::ERROR);
        }
        match self.verbose {
            0 => None,
            1 => Some(LevelFilter::DEBUG),
            _ => Some(LevelFilter::TRACE),
        }
    }

    pub fn log_config(&self) -> LogConfig {
        LogConfig::from_env(self.log_level(), self.log_format)
    }
}

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Plain text lines
    #[default]
    Human,
    /// One JSON document
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the event table, hypertable, indexes and compression policy
    Install(InstallArgs),

    /// Test the connection and show server versions
    Check,

    /// Count stored events
    Count(FilterArgs),

    /// List stored events
    Events(EventsArgs),

    /// Aggregate statistics for a time window
    Stats(StatsArgs),

    /// Write events from a JSON-lines file
    Ingest(IngestArgs),
}

#[derive(Args, Debug)]
pub struct InstallArgs {
    /// Schema to install into
    #[arg(long)]
    pub schema: Option<String>,

    /// Compress chunks older than N hours
    #[arg(long, value_name = "N", conflicts_with = "no_compression_policy")]
    pub compress_after_hours: Option<u64>,

    /// Enable compression without registering a policy
    #[arg(long)]
    pub no_compression_policy: bool,
}

impl InstallArgs {
    pub fn options(&self) -> Result<InstallOptions, ValidationError> {
        let mut options = InstallOptions::default();
        if let Some(schema) = &self.schema {
            options = options.with_schema(schema)?;
        }
        let hours = if self.no_compression_policy {
            None
        } else {
            Some(
                self.compress_after_hours
                    .unwrap_or(DEFAULT_COMPRESS_AFTER_HOURS),
            )
        };
        Ok(options.with_compress_after_hours(hours))
    }
}

#[derive(Args, Debug, Default)]
pub struct FilterArgs {
    /// SQL condition with $1, $2... placeholders
    #[arg(long = "where", value_name = "CONDITION")]
    pub condition: Option<String>,

    /// Placeholder value, repeatable, in order
    #[arg(long = "param", value_name = "VALUE", requires = "condition")]
    pub params: Vec<String>,
}

impl FilterArgs {
    /// Parameters as text; the server-declared type decides the conversion.
    pub fn sql_params(&self) -> Vec<SqlValue> {
        self.params.iter().map(|p| SqlValue::from(p.as_str())).collect()
    }
}

#[derive(Args, Debug)]
pub struct EventsArgs {
    #[command(flatten)]
    pub filter: FilterArgs,

    /// Sort column and direction, e.g. "userid DESC"
    #[arg(long, default_value = "time DESC")]
    pub order_by: String,

    #[arg(long, default_value_t = DEFAULT_LIMIT)]
    pub limit: i64,

    #[arg(long, default_value_t = 0)]
    pub offset: i64,
}

impl EventsArgs {
    pub fn query(&self) -> EventQuery {
        let mut query = EventQuery::new()
            .order_by(self.order_by.as_str())
            .limit(self.limit)
            .offset(self.offset);
        if let Some(condition) = &self.filter.condition {
            query = query.filter(condition.as_str(), self.filter.sql_params());
        }
        query
    }
}

#[derive(Args, Debug)]
pub struct StatsArgs {
    /// Window start (RFC 3339), default 24 hours ago
    #[arg(long, value_parser = parse_timestamp)]
    pub start: Option<DateTime<Utc>>,

    /// Window end (RFC 3339), default now
    #[arg(long, value_parser = parse_timestamp)]
    pub end: Option<DateTime<Utc>>,
}

#[derive(Args, Debug)]
pub struct IngestArgs {
    /// JSON-lines file, one event per line ("-" for stdin)
    pub file: PathBuf,

    /// Events per transaction (default: buffersize setting)
    #[arg(long)]
    pub batch_size: Option<usize>,
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("invalid RFC 3339 timestamp {:?}: {}", raw, e))
}
