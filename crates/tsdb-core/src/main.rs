//! `tsdb-logstore` - TimescaleDB event log store CLI.

use std::fs::File;
use std::io::{self, BufRead, BufReader};

use clap::Parser;
use serde::Serialize;
use tracing::{debug, error, info_span};
use tsdb_client::{ClientError, TimescaleClient};
use tsdb_common::Error;
use tsdb_config::{load_settings, validate_for_save, SettingsSaveContext, StoreSettings};
use tsdb_core::cli::{
    Cli, Commands, EventsArgs, FilterArgs, GlobalOpts, IngestArgs, InstallArgs, OutputFormat,
    StatsArgs,
};
use tsdb_core::logging::{generate_run_id, init_logging};
use tsdb_core::store::LogStore;
use tsdb_core::{ingest, read_event_lines, ExitCode, Installer, TsdbStore};

type CmdResult = Result<ExitCode, Error>;

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        // --help and --version
        Err(e) if !e.use_stderr() => e.exit(),
        Err(e) => {
            let _ = e.print();
            std::process::exit(ExitCode::ArgsError.as_i32());
        }
    };
    init_logging(&cli.global.log_config());

    let run_id = generate_run_id();
    let span = info_span!("run", run_id = %run_id);
    let _guard = span.enter();

    let result = match &cli.command {
        Commands::Install(args) => run_install(&cli.global, args),
        Commands::Check => run_check(&cli.global),
        Commands::Count(args) => run_count(&cli.global, args),
        Commands::Events(args) => run_events(&cli.global, args),
        Commands::Stats(args) => run_stats(&cli.global, args),
        Commands::Ingest(args) => run_ingest(&cli.global, args),
    };

    let code = result.unwrap_or_else(|err| {
        error!(error = %err, code = err.code(), "command failed");
        eprintln!("{}", err.format_human());
        ExitCode::from(&err)
    });
    std::process::exit(code.as_i32());
}

fn load(global: &GlobalOpts) -> Result<StoreSettings, Error> {
    let (settings, source) = load_settings(global.config.as_deref())?;
    debug!(source = %source, "settings loaded");
    Ok(settings)
}

fn open_client(settings: &StoreSettings) -> Result<TimescaleClient, Error> {
    let config = settings.connection_config()?;
    Ok(TimescaleClient::open(config)?)
}

/// Print `value` as JSON, or `lines` as text.
fn emit<T: Serialize>(format: OutputFormat, value: &T, lines: &[String]) -> Result<(), Error> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Human => {
            for line in lines {
                println!("{}", line);
            }
        }
    }
    Ok(())
}

fn run_install(global: &GlobalOpts, args: &InstallArgs) -> CmdResult {
    let settings = load(global)?;
    let options = args.options()?;
    let report = Installer::new().install(&settings, &options)?;
    emit(global.format, &report, &report.summary_lines())?;
    Ok(if report.is_complete() {
        ExitCode::Clean
    } else {
        ExitCode::Partial
    })
}

#[derive(Serialize)]
struct CheckOutput {
    settings: serde_json::Map<String, serde_json::Value>,
    server_version: Option<String>,
    timescaledb_version: Option<String>,
}

fn run_check(global: &GlobalOpts) -> CmdResult {
    let settings = load(global)?;
    let rows = settings.display_rows();

    let mut ctx = SettingsSaveContext::begin();
    let mut versions = (None, None);
    let mut failure: Option<ClientError> = None;
    let outcome = validate_for_save(&settings, &mut ctx, |config| {
        match TimescaleClient::open(config.clone()) {
            Ok(mut client) => {
                versions = (client.get_version(), client.get_extension_version());
                Ok(())
            }
            Err(e) => {
                let message = e.to_string();
                failure = Some(e);
                Err(message)
            }
        }
    });
    if let Some(e) = failure {
        return Err(e.into());
    }
    outcome?;

    let (server_version, timescaledb_version) = versions;
    let mut lines: Vec<String> = rows.iter().map(|(k, v)| format!("{:<14}{}", k, v)).collect();
    lines.push(format!(
        "{:<14}{}",
        "server",
        server_version.as_deref().unwrap_or("unknown")
    ));
    lines.push(format!(
        "{:<14}{}",
        "timescaledb",
        timescaledb_version.as_deref().unwrap_or("not installed")
    ));
    lines.push("✓ connection ok".to_string());

    let output = CheckOutput {
        settings: rows
            .into_iter()
            .map(|(k, v)| (k.to_string(), serde_json::Value::String(v)))
            .collect(),
        server_version,
        timescaledb_version,
    };
    emit(global.format, &output, &lines)?;
    Ok(ExitCode::Clean)
}

fn run_count(global: &GlobalOpts, args: &FilterArgs) -> CmdResult {
    let settings = load(global)?;
    let mut client = open_client(&settings)?;
    let count = client.count_events(args.condition.as_deref(), &args.sql_params());
    emit(
        global.format,
        &serde_json::json!({ "count": count }),
        &[count.to_string()],
    )?;
    Ok(ExitCode::Clean)
}

fn run_events(global: &GlobalOpts, args: &EventsArgs) -> CmdResult {
    let settings = load(global)?;
    let mut client = open_client(&settings)?;
    let rows = client.get_events(&args.query());
    let lines = rows
        .iter()
        .map(serde_json::to_string)
        .collect::<Result<Vec<_>, _>>()?;
    emit(global.format, &rows, &lines)?;
    Ok(ExitCode::Clean)
}

fn run_stats(global: &GlobalOpts, args: &StatsArgs) -> CmdResult {
    let settings = load(global)?;
    let mut client = open_client(&settings)?;
    let stats = client.get_statistics(args.start, args.end);
    let lines = match &stats {
        Some(row) => row.iter().map(|(k, v)| format!("{:<20}{}", k, v)).collect(),
        None => vec!["no statistics available".to_string()],
    };
    emit(global.format, &stats, &lines)?;
    Ok(ExitCode::Clean)
}

fn run_ingest(global: &GlobalOpts, args: &IngestArgs) -> CmdResult {
    let settings = load(global)?;
    let reader: Box<dyn BufRead> = if args.file.as_os_str() == "-" {
        Box::new(io::stdin().lock())
    } else {
        Box::new(BufReader::new(File::open(&args.file)?))
    };
    let records = read_event_lines(reader)?;
    let batch_size = args.batch_size.unwrap_or(settings.buffersize);

    let mut store = TsdbStore::new(open_client(&settings)?);
    let summary = ingest(&mut store, records, batch_size)?;
    if let Err(e) = store.dispose() {
        debug!(error = %e, "dispose after ingest");
    }

    emit(
        global.format,
        &summary,
        &[format!(
            "{} written, {} failed in {} batches",
            summary.written, summary.failed, summary.batches
        )],
    )?;
    Ok(if summary.failed == 0 {
        ExitCode::Clean
    } else {
        ExitCode::Partial
    })
}
