use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tabsync_core::{JsonTableSource, Record, Settings, TableSource, normalize_tables};
use tabsync_sqlite::{BatchOutcome, Store, TableColumns};
use tracing::{Level, debug, info, warn};

/// Number of normalized records echoed back per ingested file.
const PREVIEW_RECORDS: usize = 2;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Verbosity {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<Verbosity> for Level {
    fn from(verbosity: Verbosity) -> Self {
        match verbosity {
            Verbosity::Error => Level::ERROR,
            Verbosity::Warn => Level::WARN,
            Verbosity::Info => Level::INFO,
            Verbosity::Debug => Level::DEBUG,
            Verbosity::Trace => Level::TRACE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "tabsync")]
#[command(about = "Ingest extracted tables into a self-evolving SQLite table")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct GlobalArgs {
    /// YAML settings file (see `init-config`).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// SQLite database file; overrides settings and environment.
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Table all records are written to.
    #[arg(long, global = true)]
    table: Option<String>,
    /// Directory where inputs are staged while they are processed.
    #[arg(long, global = true)]
    upload_dir: Option<PathBuf>,
    /// Log level for diagnostics written to stderr.
    #[arg(long, global = true, default_value = "warn")]
    verbosity: Verbosity,
    /// Log output format.
    #[arg(long, global = true, default_value = "text")]
    log_format: LogFormat,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Ingest one or more extracted-table JSON documents.
    Ingest(IngestArgs),
    /// Print every stored record as a JSON array.
    List,
    /// Print the current column set of the table (null when absent).
    Columns,
    /// Show table existence, column count and row count.
    Status,
    /// Write the default settings to a YAML file.
    InitConfig(InitConfigArgs),
}

#[derive(Debug, Args)]
struct IngestArgs {
    /// JSON documents holding a list of tables (rows of cells).
    #[arg(required = true)]
    files: Vec<PathBuf>,
    /// Number of parallel ingestion jobs (default: number of CPUs).
    #[arg(long)]
    jobs: Option<usize>,
}

#[derive(Debug, Args)]
struct InitConfigArgs {
    /// Output YAML path.
    path: PathBuf,
    /// Overwrite an existing file.
    #[arg(long)]
    force: bool,
}

fn main() {
    let cli = Cli::parse();
    setup_logging(cli.global.verbosity, cli.global.log_format);

    let result = match cli.command {
        Command::Ingest(args) => run_ingest(&cli.global, args),
        Command::List => run_list(&cli.global),
        Command::Columns => run_columns(&cli.global),
        Command::Status => run_status(&cli.global),
        Command::InitConfig(args) => run_init_config(args),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn setup_logging(verbosity: Verbosity, format: LogFormat) {
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(Level::from(verbosity))
        .with_target(false)
        .with_writer(std::io::stderr);

    if format == LogFormat::Json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

// ---------------------------------------------------------------------------
// ingest command
// ---------------------------------------------------------------------------

/// Per-file result printed by `ingest`.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum FileReport {
    Processed {
        filename: String,
        extraction_summary: BatchOutcome,
        preview_data: Vec<Record>,
    },
    Failed {
        filename: String,
        error: String,
    },
}

impl FileReport {
    fn is_failed(&self) -> bool {
        matches!(self, FileReport::Failed { .. })
    }
}

fn run_ingest(global: &GlobalArgs, args: IngestArgs) -> Result<(), String> {
    use rayon::prelude::*;

    let settings = resolve_settings(global)?;
    let store = open_store(&settings)?;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(args.jobs.unwrap_or(0))
        .build()
        .map_err(|e| format!("Failed to create thread pool: {e}"))?;

    let reports: Vec<FileReport> = pool.install(|| {
        args.files
            .par_iter()
            .enumerate()
            .map(|(slot, path)| {
                let filename = display_name(path);
                match ingest_file(&store, &settings, path, slot) {
                    Ok((extraction_summary, preview_data)) => FileReport::Processed {
                        filename,
                        extraction_summary,
                        preview_data,
                    },
                    Err(error) => {
                        warn!(file = %filename, %error, "ingest failed");
                        FileReport::Failed { filename, error }
                    }
                }
            })
            .collect()
    });

    let json = serde_json::to_string_pretty(&reports)
        .map_err(|e| format!("Failed to serialize results: {e}"))?;
    println!("{json}");

    store
        .close()
        .map_err(|e| format!("Failed to close store: {e}"))?;

    let failed = reports.iter().filter(|r| r.is_failed()).count();
    if failed > 0 {
        return Err(format!("{failed} of {} inputs failed", reports.len()));
    }
    Ok(())
}

fn ingest_file(
    store: &Store,
    settings: &Settings,
    path: &Path,
    slot: usize,
) -> Result<(BatchOutcome, Vec<Record>), String> {
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if !is_json {
        return Err("Invalid file type. Only JSON table documents are supported.".to_string());
    }

    let size = fs::metadata(path)
        .map_err(|e| format!("Failed to read '{}': {e}", path.display()))?
        .len();
    if size > settings.max_file_size_bytes() {
        return Err(format!(
            "File too large: {size} bytes exceeds the {} MB limit",
            settings.max_file_size_mb
        ));
    }

    let contents = fs::read(path).map_err(|e| format!("Failed to read '{}': {e}", path.display()))?;
    let staged = StagedFile::create(&settings.upload_dir, &contents, slot)
        .map_err(|e| format!("Failed to stage upload: {e}"))?;
    debug!(staged = %staged.path.display(), "staged input");

    let tables = JsonTableSource::new(&staged.path)
        .tables()
        .map_err(|e| format!("Table extraction failed: {e}"))?;
    let batch = normalize_tables(&tables);
    let outcome = store
        .process_records(&batch)
        .map_err(|e| format!("Processing failed: {e}"))?;

    info!(file = %display_name(path), records = batch.len(), "ingested");
    let preview = batch.records().iter().take(PREVIEW_RECORDS).cloned().collect();
    Ok((outcome, preview))
}

/// A copy of an input under the upload directory, removed on drop.
struct StagedFile {
    path: PathBuf,
}

impl StagedFile {
    fn create(dir: &Path, contents: &[u8], slot: usize) -> std::io::Result<Self> {
        fs::create_dir_all(dir)?;
        let digest = Sha256::digest(contents);
        let path = dir.join(format!("{digest:x}_{slot}.json"));
        fs::write(&path, contents)?;
        Ok(Self { path })
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_file(&self.path) {
            warn!(staged = %self.path.display(), %err, "failed to remove staged file");
        }
    }
}

// ---------------------------------------------------------------------------
// read commands
// ---------------------------------------------------------------------------

fn run_list(global: &GlobalArgs) -> Result<(), String> {
    let settings = resolve_settings(global)?;
    let store = open_store(&settings)?;
    let records = store
        .list_all_records()
        .map_err(|e| format!("Failed to list records: {e}"))?;
    let json = serde_json::to_string_pretty(&records)
        .map_err(|e| format!("Failed to serialize records: {e}"))?;
    println!("{json}");
    store
        .close()
        .map_err(|e| format!("Failed to close store: {e}"))
}

fn run_columns(global: &GlobalArgs) -> Result<(), String> {
    let settings = resolve_settings(global)?;
    let store = open_store(&settings)?;
    let columns = store
        .columns()
        .map_err(|e| format!("Failed to inspect table: {e}"))?;
    let names = match &columns {
        TableColumns::TableAbsent => None,
        TableColumns::Present(names) => Some(names),
    };
    let json = serde_json::to_string(&names)
        .map_err(|e| format!("Failed to serialize columns: {e}"))?;
    println!("{json}");
    store
        .close()
        .map_err(|e| format!("Failed to close store: {e}"))
}

fn run_status(global: &GlobalArgs) -> Result<(), String> {
    let settings = resolve_settings(global)?;
    let store = open_store(&settings)?;
    let status = store
        .status()
        .map_err(|e| format!("Failed to get store status: {e}"))?;
    println!("{} - Store Status:", settings.project_name);
    println!("  Database: {}", settings.database_path.display());
    println!("  Table: {}", status.table);
    println!(
        "  Table exists: {}",
        if status.table_exists { "yes" } else { "no" }
    );
    println!("  Column count: {}", status.column_count);
    println!("  Row count: {}", status.row_count);
    store
        .close()
        .map_err(|e| format!("Failed to close store: {e}"))
}

// ---------------------------------------------------------------------------
// init-config command
// ---------------------------------------------------------------------------

fn run_init_config(args: InitConfigArgs) -> Result<(), String> {
    if args.path.exists() && !args.force {
        return Err(format!(
            "'{}' already exists; pass --force to overwrite",
            args.path.display()
        ));
    }
    Settings::default()
        .save(&args.path)
        .map_err(|e| format!("Failed to write settings '{}': {e}", args.path.display()))?;
    println!("Default settings written to '{}'.", args.path.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Resolves settings: file (or defaults), then environment, then flags.
fn resolve_settings(global: &GlobalArgs) -> Result<Settings, String> {
    let mut settings = match &global.config {
        Some(path) => Settings::load(path)
            .map_err(|e| format!("Failed to load settings '{}': {e}", path.display()))?,
        None => Settings::default(),
    };
    settings
        .apply_env()
        .map_err(|e| format!("Invalid environment override: {e}"))?;

    if let Some(db) = &global.db {
        settings.database_path = db.clone();
    }
    if let Some(table) = &global.table {
        settings.table_name = table.clone();
    }
    if let Some(dir) = &global.upload_dir {
        settings.upload_dir = dir.clone();
    }

    settings
        .validate()
        .map_err(|e| format!("Invalid settings: {e}"))?;
    Ok(settings)
}

fn open_store(settings: &Settings) -> Result<Store, String> {
    Store::open(
        &settings.database_path,
        settings.table_name.as_str(),
        Duration::from_millis(settings.busy_timeout_ms),
    )
    .map_err(|e| {
        format!(
            "Failed to open database '{}': {e}",
            settings.database_path.display()
        )
    })
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
