#![deny(missing_docs)]
//! Shared logging utilities for the batchstamp workspace.
//!
//! This crate provides the `stamp_*` logging macros used across the codebase,
//! the console/file logger setup used by the binary, and a minimal test
//! initializer for the global logger.

use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use log::LevelFilter;
use simplelog::{
    ColorChoice, CombinedLogger, Config, ConfigBuilder, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};

/// Name of the diagnostic log file created by [`initialize`].
pub const LOG_FILE_NAME: &str = "batchstamp.log";

/// `trace` record through the `log` facade.
#[macro_export]
macro_rules! stamp_trace {
    ($($arg:tt)*) => {{
        log::trace!($($arg)*);
    }};
}

/// `info` record through the `log` facade.
#[macro_export]
macro_rules! stamp_info {
    ($($arg:tt)*) => {{
        log::info!($($arg)*);
    }};
}

/// `debug` record through the `log` facade.
#[macro_export]
macro_rules! stamp_debug {
    ($($arg:tt)*) => {{
        log::debug!($($arg)*);
    }};
}

/// `warn` record through the `log` facade.
#[macro_export]
macro_rules! stamp_warn {
    ($($arg:tt)*) => {{
        log::warn!($($arg)*);
    }};
}

/// `error` record through the `log` facade.
#[macro_export]
macro_rules! stamp_error {
    ($($arg:tt)*) => {{
        log::error!($($arg)*);
    }};
}

/// Verbosity accepted on the command line and in the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Logging disabled.
    None,
    /// Errors only.
    Error,
    /// Warnings and errors.
    Warn,
    /// Informational messages.
    #[default]
    Info,
    /// Debug output.
    Debug,
    /// Everything.
    Trace,
}

impl LogLevel {
    /// All accepted names, in increasing verbosity.
    pub const NAMES: [&'static str; 6] = ["none", "error", "warn", "info", "debug", "trace"];

    /// Maps to the `log` crate filter.
    pub fn filter(self) -> LevelFilter {
        match self {
            LogLevel::None => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::None => "none",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        };
        f.write_str(name)
    }
}

impl FromStr for LogLevel {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(LogLevel::None),
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            _ => Err(LoggingError::UnknownLevel(s.to_string())),
        }
    }
}

/// Errors raised while configuring the global logger.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    /// The level name is not one of [`LogLevel::NAMES`].
    #[error("illegal log level '{0}' (allowed values: none, error, warn, info, debug, trace)")]
    UnknownLevel(String),
    /// The diagnostic log file could not be created.
    #[error("could not create log file {path:?}: {source}")]
    FileCreate {
        /// Attempted location.
        path: PathBuf,
        /// Underlying IO failure.
        source: std::io::Error,
    },
}

/// Initializes the global logger with a terminal sink and an optional file sink.
///
/// The file sink writes [`LOG_FILE_NAME`] inside `file_dir` (current directory
/// when `None`) unless `file_level` is [`LogLevel::None`]. Returns the path of
/// the created file, if any.
pub fn initialize(
    console_level: LogLevel,
    file_level: LogLevel,
    file_dir: Option<&Path>,
) -> Result<Option<PathBuf>, LoggingError> {
    let config = build_config();
    let mut loggers: Vec<Box<dyn SharedLogger>> = Vec::new();

    if console_level != LogLevel::None {
        loggers.push(TermLogger::new(
            console_level.filter(),
            config.clone(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ));
    }

    let mut created = None;
    if file_level != LogLevel::None {
        let path = file_dir
            .unwrap_or_else(|| Path::new("."))
            .join(LOG_FILE_NAME);
        let file = File::create(&path).map_err(|source| LoggingError::FileCreate {
            path: path.clone(),
            source,
        })?;
        loggers.push(WriteLogger::new(file_level.filter(), config, file));
        created = Some(path);
    }

    // A logger installed earlier (tests, embedding) wins.
    let _ = CombinedLogger::init(loggers);
    Ok(created)
}

fn build_config() -> Config {
    ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_target_level(LevelFilter::Error)
        .build()
}

/// Terminal-only logger for tests. A logger installed earlier is kept.
pub fn initialize_for_tests() {
    let level = match cfg!(debug_assertions) {
        true => LevelFilter::Debug,
        false => LevelFilter::Info,
    };
    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}
