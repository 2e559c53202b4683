// crates/statevault-cli/src/main.rs
// ============================================================================
// Module: State Vault CLI Entry Point
// Description: Operator commands over a durable State Vault store.
// Purpose: Export, import, verify, list, and clear local state from a shell.
// Dependencies: clap, statevault-core, statevault-config, statevault-store-sqlite, tracing-subscriber
// ============================================================================

//! ## Overview
//! The `statevault` binary opens the `SQLite` store named by `statevault.toml`
//! (or `--store-path`) and runs one maintenance command against it. Logs go
//! to stderr, filtered by `STATEVAULT_LOG` (default `warn`); command output
//! goes to stdout. Inputs are untrusted: bundle files are size-limited before
//! parsing and `clear` requires explicit confirmation.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::fs::File;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Args;
use clap::CommandFactory;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use serde::Serialize;
use serde_json::Value;
use statevault_config::StateVaultConfig;
use statevault_config::StorageType;
use statevault_config::config_toml_example;
use statevault_core::BackupHealth;
use statevault_core::ChecksumValidator;
use statevault_core::ExportBundle;
use statevault_core::HashAlgorithm;
use statevault_core::StateStore;
use statevault_core::StoreError;
use statevault_store_sqlite::MAX_VALUE_BYTES;
use statevault_store_sqlite::SqliteKeyValueStorage;
use statevault_store_sqlite::SqliteStoreConfig;
use thiserror::Error;
use tracing::info;
use tracing::warn;
use tracing_subscriber::EnvFilter;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum size of an import bundle: the current record plus the backup list.
const MAX_BUNDLE_BYTES: usize = MAX_VALUE_BYTES * 2;
/// Environment variable holding the log filter.
const LOG_ENV: &str = "STATEVAULT_LOG";
/// Log filter used when `STATEVAULT_LOG` is unset or invalid.
const DEFAULT_LOG_FILTER: &str = "warn";

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "statevault", version, disable_help_subcommand = true)]
struct Cli {
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Write the current state and every backup as a JSON bundle.
    Export(ExportCommand),
    /// Replace the current state and backups with a JSON bundle.
    Import(ImportCommand),
    /// Check the current state and every backup against their checksums.
    Verify(VerifyCommand),
    /// Backup history utilities.
    Backups {
        /// Selected backups subcommand.
        #[command(subcommand)]
        command: BackupsCommand,
    },
    /// Remove the current state and every backup.
    Clear(ClearCommand),
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Backups subcommands.
#[derive(Subcommand, Debug)]
enum BackupsCommand {
    /// List backups, newest first.
    List(BackupsListCommand),
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Load and validate a configuration file.
    Check(ConfigCheckCommand),
    /// Print an annotated example configuration.
    Example,
}

/// Store location inputs shared by store commands.
#[derive(Args, Debug, Clone, Default)]
struct StoreLocationArgs {
    /// Optional config file path (defaults to statevault.toml or `STATEVAULT_CONFIG`).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Optional direct `SQLite` store path (overrides the configured path).
    #[arg(long = "store-path", value_name = "PATH")]
    store_path: Option<PathBuf>,
}

/// Output formats for structured commands.
#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
enum OutputFormat {
    /// Canonical JSON output.
    Json,
    /// Human-readable text output.
    Text,
}

/// Arguments for `export`.
#[derive(Args, Debug)]
struct ExportCommand {
    /// Store location settings.
    #[command(flatten)]
    location: StoreLocationArgs,
    /// Output file (defaults to stdout).
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,
}

/// Arguments for `import`.
#[derive(Args, Debug)]
struct ImportCommand {
    /// Store location settings.
    #[command(flatten)]
    location: StoreLocationArgs,
    /// Bundle file produced by `export`.
    #[arg(long, value_name = "PATH")]
    input: PathBuf,
}

/// Arguments for `verify`.
#[derive(Args, Debug)]
struct VerifyCommand {
    /// Store location settings.
    #[command(flatten)]
    location: StoreLocationArgs,
    /// Output format for the report.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

/// Arguments for `backups list`.
#[derive(Args, Debug)]
struct BackupsListCommand {
    /// Store location settings.
    #[command(flatten)]
    location: StoreLocationArgs,
    /// Output format for the listing.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

/// Arguments for `clear`.
#[derive(Args, Debug)]
struct ClearCommand {
    /// Store location settings.
    #[command(flatten)]
    location: StoreLocationArgs,
    /// Confirms removal of the current state and every backup.
    #[arg(long)]
    yes: bool,
}

/// Arguments for `config check`.
#[derive(Args, Debug)]
struct ConfigCheckCommand {
    /// Optional config file path (defaults to statevault.toml or `STATEVAULT_CONFIG`).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

// ============================================================================
// SECTION: Output Types
// ============================================================================

/// Integrity status of the current record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct CurrentReport {
    /// Whether a current record exists.
    present: bool,
    /// Whether the current record verifies.
    valid: bool,
    /// Schema version of the current record.
    version: Option<String>,
    /// Write time of the current record.
    timestamp: Option<String>,
    /// Failure reason when invalid.
    reason: Option<String>,
}

/// Overall verification outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum VerifyStatus {
    /// Every stored envelope verifies.
    Pass,
    /// At least one stored envelope is corrupt.
    Fail,
}

/// Output of `verify`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct VerifyReport {
    /// Digest algorithm the checks were run with.
    algorithm: HashAlgorithm,
    /// Current record status.
    current: CurrentReport,
    /// Backup statuses, newest first.
    backups: Vec<BackupHealth>,
    /// Whether `load` would return state (current valid or a backup valid).
    recoverable: bool,
    /// Overall status.
    status: VerifyStatus,
}

/// One row of `backups list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct BackupSummary {
    /// Backup identifier.
    id: String,
    /// Creation-order sequence number.
    sequence: u64,
    /// Write time of the wrapped save.
    timestamp: String,
    /// Schema version of the wrapped envelope.
    version: String,
    /// Checksum of the wrapped envelope.
    checksum: String,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for user-facing messages.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
fn main() -> ExitCode {
    init_logging();
    match run() {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Installs the stderr log subscriber.
fn init_logging() {
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Executes the CLI command dispatcher.
fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    let Some(command) = cli.command else {
        show_help()?;
        return Ok(ExitCode::SUCCESS);
    };
    match command {
        Commands::Export(command) => command_export(&command),
        Commands::Import(command) => command_import(&command),
        Commands::Verify(command) => command_verify(&command),
        Commands::Backups {
            command,
        } => match command {
            BackupsCommand::List(command) => command_backups_list(&command),
        },
        Commands::Clear(command) => command_clear(&command),
        Commands::Config {
            command,
        } => match command {
            ConfigCommand::Check(command) => command_config_check(&command),
            ConfigCommand::Example => command_config_example(),
        },
    }
}

/// Emits the top-level help message for the CLI.
fn show_help() -> CliResult<()> {
    let mut command = Cli::command();
    command.print_help().map_err(|err| CliError::new(output_error("stdout", &err)))?;
    write_stdout_line("").map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(())
}

// ============================================================================
// SECTION: Store Commands
// ============================================================================

/// Executes `export`.
fn command_export(command: &ExportCommand) -> CliResult<ExitCode> {
    let store = open_store(&command.location)?;
    let bundle =
        store.export_state().map_err(|err| CliError::new(format!("export failed: {err}")))?;
    let mut bytes = serde_json::to_vec_pretty(&bundle)
        .map_err(|err| CliError::new(format!("export failed: {err}")))?;
    bytes.push(b'\n');
    match &command.output {
        Some(path) => {
            fs::write(path, &bytes).map_err(|err| {
                CliError::new(format!("failed to write {}: {err}", path.display()))
            })?;
            info!(path = %path.display(), backups = bundle.backups.len(), "exported bundle");
            write_stdout_line(&format!(
                "exported {} backup(s) to {}",
                bundle.backups.len(),
                path.display()
            ))
            .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        }
        None => {
            write_stdout_bytes(&bytes).map_err(|err| CliError::new(output_error("stdout", &err)))?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Executes `import`.
fn command_import(command: &ImportCommand) -> CliResult<ExitCode> {
    let bundle = read_bundle(&command.input)?;
    let store = open_store(&command.location)?;
    if bundle.version != store.version() {
        warn!(
            bundle_version = %bundle.version,
            store_version = %store.version(),
            "importing bundle written under a different schema version"
        );
    }
    let state = if bundle.state.is_some() { "present" } else { "absent" };
    let backups = bundle.backups.len();
    store.import_state(bundle).map_err(|err| CliError::new(format!("import failed: {err}")))?;
    write_stdout_line(&format!("imported bundle: state {state}, {backups} backup(s)"))
        .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

/// Executes `verify`.
fn command_verify(command: &VerifyCommand) -> CliResult<ExitCode> {
    let store = open_store(&command.location)?;
    let report = build_verify_report(&store)?;
    emit_output(&report, command.format, render_verify_text(&report))?;
    let code = match report.status {
        VerifyStatus::Pass => ExitCode::SUCCESS,
        VerifyStatus::Fail => ExitCode::FAILURE,
    };
    Ok(code)
}

/// Executes `backups list`.
fn command_backups_list(command: &BackupsListCommand) -> CliResult<ExitCode> {
    let store = open_store(&command.location)?;
    let rows = backup_summaries(&store);
    emit_output(&rows, command.format, render_backups_text(&rows))?;
    Ok(ExitCode::SUCCESS)
}

/// Executes `clear`.
fn command_clear(command: &ClearCommand) -> CliResult<ExitCode> {
    if !command.yes {
        return Err(CliError::new(
            "clear removes the current state and every backup; rerun with --yes".to_string(),
        ));
    }
    let store = open_store(&command.location)?;
    store.clear_all().map_err(|err| CliError::new(format!("clear failed: {err}")))?;
    write_stdout_line("cleared current state and backups")
        .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Config Commands
// ============================================================================

/// Executes `config check`.
fn command_config_check(command: &ConfigCheckCommand) -> CliResult<ExitCode> {
    let config = load_config(command.config.as_deref())?;
    let persistence = config.persistence;
    let storage = match config.storage.storage_type {
        StorageType::Memory => "memory",
        StorageType::Sqlite => "sqlite",
    };
    let facility = config.sync.facility_id.as_deref().unwrap_or("none");
    write_stdout_line(&format!(
        "config ok: storage {storage}, auto_save {}, max_backup_count {}, retry_attempts {}, \
         facility {facility}",
        persistence.auto_save(),
        persistence.max_backup_count(),
        persistence.retry_attempts()
    ))
    .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

/// Executes `config example`.
fn command_config_example() -> CliResult<ExitCode> {
    write_stdout_bytes(config_toml_example().as_bytes())
        .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Store Resolution
// ============================================================================

/// Loads configuration, mapping failures to a CLI error.
fn load_config(path: Option<&Path>) -> CliResult<StateVaultConfig> {
    StateVaultConfig::load(path).map_err(|err| CliError::new(format!("config load failed: {err}")))
}

/// Resolves the `SQLite` settings and state config for store commands.
///
/// `--store-path` wins over the configured path. Without `--config`, a direct
/// store path uses default settings instead of looking for a config file.
fn resolve_store(location: &StoreLocationArgs) -> CliResult<(SqliteStoreConfig, StateVaultConfig)> {
    if let Some(store_path) = &location.store_path {
        let config = match location.config.as_deref() {
            Some(path) => load_config(Some(path))?,
            None => StateVaultConfig::default(),
        };
        let sqlite = SqliteStoreConfig {
            path: store_path.clone(),
            busy_timeout_ms: config.storage.busy_timeout_ms,
            journal_mode: config.storage.journal_mode,
            sync_mode: config.storage.sync_mode,
        };
        return Ok((sqlite, config));
    }
    let config = load_config(location.config.as_deref())?;
    if config.storage.storage_type == StorageType::Memory {
        return Err(CliError::new(
            "memory storage holds no durable state; set storage.type = \"sqlite\" or pass \
             --store-path"
                .to_string(),
        ));
    }
    let sqlite = config
        .storage
        .sqlite_config()
        .ok_or_else(|| CliError::new("sqlite storage requires path".to_string()))?;
    Ok((sqlite, config))
}

/// Opens the store named by `location`.
fn open_store(location: &StoreLocationArgs) -> CliResult<StateStore<Value>> {
    let (sqlite, config) = resolve_store(location)?;
    let path = sqlite.path.clone();
    let storage = SqliteKeyValueStorage::new(sqlite).map_err(|err| {
        CliError::new(format!("failed to open store {}: {err}", path.display()))
    })?;
    Ok(StateStore::new(
        Arc::new(storage),
        config.state.schema_version,
        config.persistence.max_backup_count(),
    ))
}

// ============================================================================
// SECTION: Reports
// ============================================================================

/// Verifies the current record and every backup without loading or repairing.
fn build_verify_report(store: &StateStore<Value>) -> CliResult<VerifyReport> {
    let validator = ChecksumValidator::default();
    let current = match store.load_envelope() {
        Ok(None) => CurrentReport {
            present: false,
            valid: false,
            version: None,
            timestamp: None,
            reason: None,
        },
        Ok(Some(envelope)) => {
            let outcome = validator.verify(&envelope);
            CurrentReport {
                present: true,
                valid: outcome.is_ok(),
                version: Some(envelope.version),
                timestamp: Some(envelope.timestamp),
                reason: outcome.err().map(|err| err.to_string()),
            }
        }
        Err(StoreError::Decode(reason)) => CurrentReport {
            present: true,
            valid: false,
            version: None,
            timestamp: None,
            reason: Some(format!("malformed envelope: {reason}")),
        },
        Err(err) => return Err(CliError::new(format!("verify failed: {err}"))),
    };
    let backups = store.recovery().inspect();
    let backups_valid = backups.iter().all(|backup| backup.valid);
    let current_ok = !current.present || current.valid;
    let recoverable = current.valid || backups.iter().any(|backup| backup.valid);
    let status =
        if current_ok && backups_valid { VerifyStatus::Pass } else { VerifyStatus::Fail };
    Ok(VerifyReport {
        algorithm: validator.algorithm(),
        current,
        backups,
        recoverable,
        status,
    })
}

/// Summarizes the backup list, newest first.
fn backup_summaries(store: &StateStore<Value>) -> Vec<BackupSummary> {
    store
        .backups()
        .list()
        .into_iter()
        .map(|backup| BackupSummary {
            id: backup.id,
            sequence: backup.sequence,
            timestamp: backup.timestamp,
            version: backup.version,
            checksum: backup.checksum.value,
        })
        .collect()
}

/// Renders a verify report as text.
fn render_verify_text(report: &VerifyReport) -> String {
    let mut lines = Vec::with_capacity(report.backups.len().saturating_add(3));
    let current = &report.current;
    lines.push(match (current.present, current.valid) {
        (false, _) => "current: absent".to_string(),
        (true, true) => format!(
            "current: valid (version {}, {})",
            current.version.as_deref().unwrap_or("?"),
            current.timestamp.as_deref().unwrap_or("?")
        ),
        (true, false) => {
            format!("current: invalid ({})", current.reason.as_deref().unwrap_or("unknown"))
        }
    });
    for backup in &report.backups {
        if backup.valid {
            lines.push(format!("backup {} (seq {}): valid", backup.id, backup.sequence));
        } else {
            lines.push(format!(
                "backup {} (seq {}): invalid ({})",
                backup.id,
                backup.sequence,
                backup.reason.as_deref().unwrap_or("unknown")
            ));
        }
    }
    lines.push(format!("recoverable: {}", if report.recoverable { "yes" } else { "no" }));
    lines.push(format!(
        "status: {}",
        match report.status {
            VerifyStatus::Pass => "pass",
            VerifyStatus::Fail => "fail",
        }
    ));
    lines.join("\n")
}

/// Renders backup summaries as tab-separated text.
fn render_backups_text(rows: &[BackupSummary]) -> String {
    if rows.is_empty() {
        return "no backups".to_string();
    }
    rows.iter()
        .map(|row| {
            format!("{}\t{}\t{}\t{}\t{}", row.id, row.sequence, row.timestamp, row.version, row.checksum)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ============================================================================
// SECTION: Input Helpers
// ============================================================================

/// Errors raised while reading size-limited inputs.
#[derive(Debug)]
enum ReadLimitError {
    /// I/O failure while reading.
    Io(std::io::Error),
    /// Input exceeded the size limit.
    TooLarge {
        /// Observed size in bytes.
        size: u64,
        /// Allowed limit in bytes.
        limit: usize,
    },
}

/// Reads a file from disk while enforcing a hard size limit.
fn read_bytes_with_limit(path: &Path, max_bytes: usize) -> Result<Vec<u8>, ReadLimitError> {
    let file = File::open(path).map_err(ReadLimitError::Io)?;
    let size = file.metadata().map_err(ReadLimitError::Io)?.len();
    let limit = u64::try_from(max_bytes).map_err(|_| ReadLimitError::TooLarge {
        size,
        limit: max_bytes,
    })?;
    if size > limit {
        return Err(ReadLimitError::TooLarge {
            size,
            limit: max_bytes,
        });
    }
    let mut limited = file.take(limit.saturating_add(1));
    let mut bytes = Vec::new();
    limited.read_to_end(&mut bytes).map_err(ReadLimitError::Io)?;
    if bytes.len() > max_bytes {
        return Err(ReadLimitError::TooLarge {
            size: u64::try_from(bytes.len()).unwrap_or(u64::MAX),
            limit: max_bytes,
        });
    }
    Ok(bytes)
}

/// Reads and parses an export bundle.
fn read_bundle(path: &Path) -> CliResult<ExportBundle> {
    let bytes = read_bytes_with_limit(path, MAX_BUNDLE_BYTES).map_err(|err| match err {
        ReadLimitError::Io(err) => {
            CliError::new(format!("failed to read bundle {}: {err}", path.display()))
        }
        ReadLimitError::TooLarge {
            size,
            limit,
        } => CliError::new(format!(
            "bundle {} exceeds size limit ({size} > {limit} bytes)",
            path.display()
        )),
    })?;
    serde_json::from_slice(&bytes)
        .map_err(|err| CliError::new(format!("invalid bundle {}: {err}", path.display())))
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Emits structured output as canonical JSON or text.
fn emit_output<T: Serialize>(value: &T, format: OutputFormat, text: String) -> CliResult<()> {
    let mut bytes = match format {
        OutputFormat::Json => serde_jcs::to_vec(value)
            .map_err(|err| CliError::new(format!("failed to render json: {err}")))?,
        OutputFormat::Text => text.into_bytes(),
    };
    if bytes.last() != Some(&b'\n') {
        bytes.push(b'\n');
    }
    write_stdout_bytes(&bytes).map_err(|err| CliError::new(output_error("stdout", &err)))
}

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes raw bytes to stdout without adding a newline.
fn write_stdout_bytes(bytes: &[u8]) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    stdout.write_all(bytes)
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output stream failure.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    format!("failed to write to {stream}: {error}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
