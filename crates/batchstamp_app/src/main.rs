mod app;
mod cli;
mod config;
mod effects;
mod prompt;
mod ui;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use stamp_logging::{stamp_debug, stamp_error, stamp_info, stamp_warn, LogLevel};

use crate::cli::{Cli, Invocation};
use crate::config::{AppConfig, CONFIG_FILENAME};

const EXIT_WRONG_ARGUMENTS: u8 = 2;

fn main() -> ExitCode {
    let cli = Cli::parse();

    match stamp_logging::initialize(cli.log_level, cli.logfile_level, cli.logfile_dir.as_deref()) {
        Ok(Some(path)) => stamp_debug!("Diagnostics log at {:?}", path),
        Ok(None) => {}
        Err(err) => {
            eprintln!("{err}");
            eprintln!(
                "Add '--logfile-level {}' to disable logging to a file or use '--logfile-dir <path>' to set directory for logfile.",
                LogLevel::None
            );
            return ExitCode::from(EXIT_WRONG_ARGUMENTS);
        }
    }

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILENAME));
    let config = match AppConfig::load(&config_path) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::from(EXIT_WRONG_ARGUMENTS);
        }
    };

    let invocation = match cli.resolve(&config) {
        Ok(invocation) => invocation,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::from(EXIT_WRONG_ARGUMENTS);
        }
    };
    log_parameters(&invocation);

    let report = match app::run_batch(&invocation, &config) {
        Ok(report) => report,
        Err(err) => {
            stamp_error!("{:#}", err);
            eprintln!("Error: {err:#}");
            return ExitCode::from(app::EXIT_FAILED);
        }
    };

    for line in report.summary_lines() {
        println!("{line}");
    }
    if let Some(path) = &invocation.report_json {
        match app::write_report_json(path, &report) {
            Ok(written) => stamp_info!("Report written to {:?}", written),
            Err(err) => stamp_warn!("{:#}", err),
        }
    }
    ExitCode::from(app::exit_status(&report))
}

fn log_parameters(invocation: &Invocation) {
    if let Some(file) = &invocation.input.file {
        stamp_info!("Parameter - input-file: {}", file.display());
    }
    for dir in &invocation.input.include {
        let mode = if dir.recursive {
            "recursive"
        } else {
            "non-recursive"
        };
        stamp_info!("Parameter - input-directory ({}): {}", mode, dir.path.display());
    }
    stamp_info!(
        "Parameter - time-server url: {}",
        invocation.options.time_server_url
    );
    if let Some(out) = &invocation.options.file_out {
        stamp_info!("Parameter - output file: {}", out.display());
    }
    for dir in &invocation.input.exclude {
        stamp_info!("Parameter - exclude-directory: {}", dir.display());
    }
    stamp_info!(
        "Parameter - extensions: {} -> {}",
        invocation.options.in_extensions.join(", "),
        invocation.options.out_extension
    );
}
