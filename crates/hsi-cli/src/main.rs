//! Health sector indicator ETL CLI.

use std::io::{self, IsTerminal};

use clap::{ColorChoice, Parser};
use hsi_cli::cli::{Cli, Command, LogFormatArg, LogLevelArg};
use hsi_cli::commands::{run_files, run_pipeline, run_runs, run_summary};
use hsi_cli::config::PipelineConfig;
use hsi_cli::logging::{LogConfig, LogFormat, init_logging};
use hsi_cli::summary::print_batch;
use tracing::level_filters::LevelFilter;

fn main() {
    let cli = Cli::parse();
    cli.color.write_global();
    let log_config = log_config_from_cli(&cli);
    if let Err(error) = init_logging(&log_config) {
        eprintln!("error: failed to initialize logging: {error}");
        std::process::exit(1);
    }
    let config = match PipelineConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("error: {error:#}");
            std::process::exit(2);
        }
    };
    let result = match &cli.command {
        Command::Run(args) => run_pipeline(config, args).map(|result| {
            print_batch(&result);
            if result.all_failed { 1 } else { 0 }
        }),
        Command::Summary(args) => run_summary(&config, args).map(|()| 0),
        Command::Runs(args) => run_runs(&config, args).map(|()| 0),
        Command::Files(args) => run_files(&config, args).map(|()| 0),
    };
    let exit_code = result.unwrap_or_else(|error| {
        eprintln!("error: {error:#}");
        1
    });
    std::process::exit(exit_code);
}

/// Logging configuration from CLI flags: `--log-level` beats `-v`/`-q`, and
/// either beats `RUST_LOG`.
fn log_config_from_cli(cli: &Cli) -> LogConfig {
    let mut config = LogConfig {
        level_filter: cli.verbosity.tracing_level_filter(),
        ..LogConfig::default()
    };
    config.use_env_filter = !(cli.verbosity.is_present() || cli.log_level.is_some());
    if let Some(level) = cli.log_level {
        config.level_filter = match level {
            LogLevelArg::Error => LevelFilter::ERROR,
            LogLevelArg::Warn => LevelFilter::WARN,
            LogLevelArg::Info => LevelFilter::INFO,
            LogLevelArg::Debug => LevelFilter::DEBUG,
            LogLevelArg::Trace => LevelFilter::TRACE,
        };
    }
    config.format = match cli.log_format {
        LogFormatArg::Pretty => LogFormat::Pretty,
        LogFormatArg::Compact => LogFormat::Compact,
        LogFormatArg::Json => LogFormat::Json,
    };
    config.log_file = cli.log_file.clone();
    config.with_ansi = match cli.color.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => cli.log_file.is_none() && io::stderr().is_terminal(),
    };
    config
}
