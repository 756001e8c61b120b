//! Binary entry point for the graphport CLI.
#![forbid(unsafe_code)]

#[path = "cli/config.rs"]
mod config;
#[path = "cli/ui.rs"]
mod ui;

use std::error::Error;
use std::io;
use std::path::PathBuf;

use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use graphport::{
    cli::import_export::{list_labels, run_export, run_import, CliError, ExportConfig, ImportConfig},
    export::ExportOptions,
    import::{IdMode, ImportOptions},
    storage::Synchronous,
    value::CellPolicy,
};
use tracing_subscriber::EnvFilter;

use config::{CliConfig, Profile};
use ui::{SpinnerReporter, Theme, Ui};

#[derive(Parser, Debug)]
#[command(
    name = "graphport",
    version,
    about = "Bulk import/export of property graphs between CSV/JSON files and a graph store",
    disable_help_subcommand = true
)]
struct Cli {
    #[arg(
        long,
        global = true,
        env = "GRAPHPORT_CONFIG",
        value_name = "FILE",
        help = "CLI config file (defaults to the user config directory)"
    )]
    config: Option<PathBuf>,

    #[arg(long, global = true, value_name = "NAME", help = "Config profile to apply")]
    profile: Option<String>,

    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = OutputFormat::Text,
        help = "Output format for structured responses"
    )]
    format: OutputFormat,

    #[arg(
        long,
        global = true,
        value_name = "FILTER",
        help = "Log filter for stderr (overrides RUST_LOG; default warn)"
    )]
    log_level: Option<String>,

    #[arg(short, long, global = true, help = "Suppress spinners and decorations")]
    quiet: bool,

    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = ThemeArg::Auto,
        help = "Colour output when stdout is a terminal, or never"
    )]
    theme: ThemeArg,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct ImportCmd {
    #[arg(value_name = "INPUT", help = "Interchange file or directory of them")]
    input: PathBuf,

    #[arg(long, value_name = "DB", help = "Database file")]
    db: Option<PathBuf>,

    #[arg(long, help = "Create the database if it does not exist")]
    create: bool,

    #[arg(long, value_name = "N", help = "Records per store round-trip")]
    batch_size: Option<usize>,

    #[arg(long, value_enum, default_value_t = IdModeArg::Store, help = "Who assigns vertex ids")]
    id_mode: IdModeArg,

    #[arg(long, help = "Fail on labels missing from the store instead of creating them")]
    no_create_labels: bool,

    #[arg(long, help = "Do not keep external ids as the `id` property")]
    drop_external_id: bool,

    #[arg(long, help = "Rebuild endpoint id tables from the store when needed")]
    resolve_from_store: bool,

    #[arg(long, value_enum, help = "How CSV cells become values")]
    cell_policy: Option<CellPolicyArg>,

    #[arg(long, value_enum, help = "SQLite synchronous mode")]
    synchronous: Option<SynchronousArg>,
}

#[derive(Args, Debug)]
struct ExportCmd {
    #[arg(value_name = "OUT_DIR", help = "Directory to write label files into")]
    out_dir: PathBuf,

    #[arg(long, value_name = "DB", help = "Database file")]
    db: Option<PathBuf>,

    #[arg(long, value_name = "N", help = "Records written between flushes")]
    batch_size: Option<usize>,

    #[arg(long, value_enum, help = "Treat literal-looking strings as nested values")]
    cell_policy: Option<CellPolicyArg>,

    #[arg(long, default_value = "id", help = "Vertex property written as the external id")]
    id_property: String,
}

#[derive(Args, Debug)]
struct LabelsCmd {
    #[arg(long, value_name = "DB", help = "Database file")]
    db: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(about = "Import vertex and edge files into a database")]
    Import(ImportCmd),

    #[command(about = "Export every label of a database into a directory")]
    Export(ExportCmd),

    #[command(about = "List the labels of a database")]
    Labels(LabelsCmd),

    #[command(about = "Print shell completions")]
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum ThemeArg {
    Auto,
    Plain,
}

impl From<ThemeArg> for Theme {
    fn from(theme: ThemeArg) -> Self {
        match theme {
            ThemeArg::Auto => Theme::Auto,
            ThemeArg::Plain => Theme::Plain,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub(crate) enum SynchronousArg {
    Full,
    Normal,
    Off,
}

impl From<SynchronousArg> for Synchronous {
    fn from(mode: SynchronousArg) -> Self {
        match mode {
            SynchronousArg::Full => Synchronous::Full,
            SynchronousArg::Normal => Synchronous::Normal,
            SynchronousArg::Off => Synchronous::Off,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub(crate) enum CellPolicyArg {
    Scalars,
    Reinterpret,
}

impl From<CellPolicyArg> for CellPolicy {
    fn from(policy: CellPolicyArg) -> Self {
        match policy {
            CellPolicyArg::Scalars => CellPolicy::Scalars,
            CellPolicyArg::Reinterpret => CellPolicy::Reinterpret,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum IdModeArg {
    Store,
    Preallocate,
}

impl From<IdModeArg> for IdMode {
    fn from(mode: IdModeArg) -> Self {
        match mode {
            IdModeArg::Store => IdMode::StoreAssigned,
            IdModeArg::Preallocate => IdMode::Preallocated,
        }
    }
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32, Box<dyn Error>> {
    let cli = Cli::parse();
    if let Command::Completions { shell } = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "graphport", &mut io::stdout());
        return Ok(0);
    }

    init_tracing(cli.log_level.as_deref());
    let config = CliConfig::load(cli.config.clone())?;
    let profile = config.select(cli.profile.as_deref())?;
    if let Some(profile) = profile {
        tracing::debug!(
            profile = %profile.name,
            config = ?config.path(),
            "cli.profile.selected"
        );
    }
    let ui = Ui::new(cli.theme.into(), cli.quiet);

    match cli.command {
        Command::Import(cmd) => {
            let cfg = build_import_config(&cmd, &config, profile)?;
            let spinner = ui.spinner(format!("Importing {}", cfg.input.display()));
            let result = run_import(&cfg, &mut SpinnerReporter::new(&spinner));
            let elapsed = spinner.finish();
            let summary = result?;
            emit(cli.format, &summary, || {
                ui.import_summary(&cfg.db_path, &summary, elapsed)
            })?;
            Ok(if summary.failures() == 0 { 0 } else { 2 })
        }
        Command::Export(cmd) => {
            let cfg = build_export_config(&cmd, &config, profile)?;
            let spinner = ui.spinner(format!("Exporting to {}", cfg.out_dir.display()));
            let result = run_export(&cfg, &mut SpinnerReporter::new(&spinner));
            let elapsed = spinner.finish();
            let summary = result?;
            emit(cli.format, &summary, || {
                ui.export_summary(&cfg.db_path, &summary, elapsed)
            })?;
            Ok(0)
        }
        Command::Labels(cmd) => {
            let db_path = resolve_db(cmd.db, &config, profile)?;
            let labels = list_labels(&db_path)?;
            emit(cli.format, &labels, || ui.labels(&labels))?;
            Ok(0)
        }
        Command::Completions { .. } => Ok(0),
    }
}

fn init_tracing(level: Option<&str>) {
    let filter = match level {
        Some(directives) => EnvFilter::new(directives),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn resolve_db(
    explicit: Option<PathBuf>,
    config: &CliConfig,
    profile: Option<&Profile>,
) -> Result<PathBuf, CliError> {
    explicit
        .or_else(|| profile.and_then(|p| p.database.clone()))
        .or_else(|| config.default_db_path().cloned())
        .ok_or_else(|| {
            CliError::Message("no database given (pass --db or set one in the CLI config)".into())
        })
}

fn build_import_config(
    cmd: &ImportCmd,
    config: &CliConfig,
    profile: Option<&Profile>,
) -> Result<ImportConfig, CliError> {
    let db_path = resolve_db(cmd.db.clone(), config, profile)?;
    let defaults = ImportOptions::default();
    let create_labels = if cmd.no_create_labels {
        false
    } else {
        profile
            .and_then(|p| p.create_labels)
            .unwrap_or(defaults.create_labels)
    };
    let options = ImportOptions {
        batch_size: cmd
            .batch_size
            .or_else(|| profile.and_then(|p| p.batch_size))
            .unwrap_or(defaults.batch_size),
        id_mode: cmd.id_mode.into(),
        retain_external_id: !cmd.drop_external_id,
        create_labels,
        resolve_from_store: cmd.resolve_from_store,
        cell_policy: cmd
            .cell_policy
            .or_else(|| profile.and_then(|p| p.cell_policy))
            .map(CellPolicy::from)
            .unwrap_or(defaults.cell_policy),
        cancel: defaults.cancel,
    };
    Ok(ImportConfig {
        db_path,
        create_if_missing: cmd.create,
        synchronous: cmd
            .synchronous
            .or_else(|| profile.and_then(|p| p.synchronous))
            .map(Synchronous::from)
            .unwrap_or_default(),
        input: cmd.input.clone(),
        options,
    })
}

fn build_export_config(
    cmd: &ExportCmd,
    config: &CliConfig,
    profile: Option<&Profile>,
) -> Result<ExportConfig, CliError> {
    let db_path = resolve_db(cmd.db.clone(), config, profile)?;
    let defaults = ExportOptions::default();
    let id_property = cmd.id_property.trim();
    if id_property.is_empty() {
        return Err(CliError::Message("--id-property must not be empty".into()));
    }
    Ok(ExportConfig {
        db_path,
        out_dir: cmd.out_dir.clone(),
        options: ExportOptions {
            batch_size: cmd
                .batch_size
                .or_else(|| profile.and_then(|p| p.batch_size))
                .unwrap_or(defaults.batch_size),
            cell_policy: cmd
                .cell_policy
                .or_else(|| profile.and_then(|p| p.cell_policy))
                .map(CellPolicy::from)
                .unwrap_or(defaults.cell_policy),
            id_property: id_property.to_string(),
        },
    })
}

fn emit<T, F>(format: OutputFormat, value: &T, printer: F) -> Result<(), Box<dyn Error>>
where
    T: serde::Serialize,
    F: FnOnce(),
{
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{json}");
        }
        OutputFormat::Text => printer(),
    }
    Ok(())
}
