//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

#[derive(Parser)]
#[command(
    name = "hsi",
    version,
    about = "Health sector indicator ETL - clean wide spreadsheet exports into long format",
    long_about = "Clean irregular spreadsheet exports of health indicators into long-format\n\
                  tables, recording runs, quality checks, lineage, and source files."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Pipeline config file (default: ./hsi.toml when present).
    #[arg(long = "config", value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Adjust log verbosity (-v for info, -vv for debug, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Clean every raw sheet and record the batch.
    Run(RunArgs),

    /// Show quality and lineage totals for one run.
    Summary(SummaryArgs),

    /// List recent runs.
    Runs(RunsArgs),

    /// List the source file catalog.
    Files(FilesArgs),
}

#[derive(Parser)]
pub struct RunArgs {
    /// Directory of raw sheet CSVs (overrides `raw_dir`).
    #[arg(long = "raw-dir", value_name = "DIR")]
    pub raw_dir: Option<PathBuf>,

    /// Output directory for clean files (overrides `clean_dir`).
    #[arg(long = "clean-dir", value_name = "DIR")]
    pub clean_dir: Option<PathBuf>,

    /// Observability database (overrides `database`).
    #[arg(long = "database", value_name = "PATH")]
    pub database: Option<PathBuf>,

    /// Clean and validate without writing clean files.
    #[arg(long = "dry-run")]
    pub dry_run: bool,

    /// Write sheets even when completeness or validity checks fail.
    #[arg(long = "no-fail-on-quality-errors")]
    pub no_fail_on_quality_errors: bool,
}

#[derive(Parser)]
pub struct SummaryArgs {
    #[arg(value_name = "RUN_ID")]
    pub run_id: String,

    #[arg(long = "database", value_name = "PATH")]
    pub database: Option<PathBuf>,
}

#[derive(Parser)]
pub struct RunsArgs {
    #[arg(long = "limit", default_value_t = 20)]
    pub limit: usize,

    #[arg(long = "database", value_name = "PATH")]
    pub database: Option<PathBuf>,
}

#[derive(Parser)]
pub struct FilesArgs {
    #[arg(long = "database", value_name = "PATH")]
    pub database: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
