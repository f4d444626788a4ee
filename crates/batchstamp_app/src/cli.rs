use std::collections::BTreeSet;
use std::path::PathBuf;

use batchstamp_core::{IncludeDir, InputSpec, StampOptions, EXTENSION_BDOC, EXTENSION_DDOC};
use clap::Parser;
use stamp_logging::LogLevel;

use crate::config::AppConfig;

/// Timestamp DigiDoc containers in bulk against an RFC 3161 time server.
///
/// Input is either a single file (--file-in) or a whole directory (--dir-in).
#[derive(Debug, Parser)]
#[command(name = "batchstamp", version)]
pub struct Cli {
    /// File to be timestamped.
    #[arg(
        long,
        value_name = "FILE",
        conflicts_with = "dir_in",
        required_unless_present = "dir_in"
    )]
    pub file_in: Option<PathBuf>,

    /// Input directory (*.ddoc, *.bdoc); searched recursively with -R.
    #[arg(long, value_name = "DIR")]
    pub dir_in: Option<PathBuf>,

    /// Search input directories recursively.
    #[arg(short = 'R', long)]
    pub recursive: bool,

    /// Stamp only *.ddoc files.
    #[arg(long)]
    pub ddoc: bool,

    /// Stamp only *.bdoc files; wins over --ddoc when both are given.
    #[arg(long)]
    pub bdoc: bool,

    /// Time server url, e.g. http://demo.sk.ee/tsa (default from config file).
    #[arg(long, value_name = "URL")]
    pub ts_url: Option<String>,

    /// Extension for output files (default from config file, else 'asics').
    #[arg(long, value_name = "EXT", conflicts_with = "file_out")]
    pub ext_out: Option<String>,

    /// Output file; only valid with --file-in.
    #[arg(long, value_name = "FILE", requires = "file_in")]
    pub file_out: Option<PathBuf>,

    /// Directory to exclude from the file search. May be repeated.
    #[arg(long = "excl-dir", value_name = "DIR")]
    pub excl_dirs: Vec<PathBuf>,

    /// Ignore exclude directories from the config file.
    #[arg(long)]
    pub no_config_excludes: bool,

    /// Show the found files and choose which to stamp.
    #[arg(long)]
    pub preview: bool,

    /// Answer yes to every question (low disk space, preview).
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Config file (default ./batchstamp.ron).
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory for per-batch report logs (default from config file, else
    /// current directory).
    #[arg(long, value_name = "DIR")]
    pub batch_log_dir: Option<PathBuf>,

    /// Also write the final report as JSON.
    #[arg(long, value_name = "FILE")]
    pub report_json: Option<PathBuf>,

    /// Console log level: none, error, warn, info, debug, trace.
    #[arg(long, value_name = "LEVEL", default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    /// Logfile log level: none, error, warn, info, debug, trace.
    #[arg(long, value_name = "LEVEL", default_value_t = LogLevel::Debug)]
    pub logfile_level: LogLevel,

    /// Logfile directory (default current directory).
    #[arg(long, value_name = "DIR")]
    pub logfile_dir: Option<PathBuf>,
}

/// Argument combinations clap cannot check on its own.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum UsageError {
    #[error("Input file '{}' does not exist.", .0.display())]
    MissingFile(PathBuf),
    #[error("Input directory '{}' does not exist.", .0.display())]
    MissingDir(PathBuf),
    #[error("Illegal output file extension '{0}'")]
    IllegalExtension(String),
    #[error("Time server url not set")]
    NoTimeServer,
    #[error("--file-out can only be set with --file-in")]
    FileOutWithoutFileIn,
}

/// Fully resolved batch request: command line merged over the config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub options: StampOptions,
    pub input: InputSpec,
    pub batch_log_dir: PathBuf,
    pub assume_yes: bool,
    pub report_json: Option<PathBuf>,
}

impl Cli {
    pub fn resolve(&self, config: &AppConfig) -> Result<Invocation, UsageError> {
        // clap drops `requires` when the required arg conflicts with a present one.
        if self.file_out.is_some() && self.file_in.is_none() {
            return Err(UsageError::FileOutWithoutFileIn);
        }
        if let Some(file) = &self.file_in {
            if !file.exists() {
                return Err(UsageError::MissingFile(file.clone()));
            }
        }
        if let Some(dir) = &self.dir_in {
            if !dir.exists() {
                return Err(UsageError::MissingDir(dir.clone()));
            }
        }

        let options = StampOptions {
            time_server_url: self
                .ts_url
                .as_deref()
                .unwrap_or(&config.time_server_url)
                .trim()
                .to_string(),
            in_extensions: self.extensions(),
            out_extension: self
                .ext_out
                .clone()
                .unwrap_or_else(|| config.out_extension.clone()),
            file_out: self.file_out.clone(),
            preview: self.preview || config.preview,
        };
        if !options.is_valid_out_extension() {
            return Err(UsageError::IllegalExtension(options.out_extension));
        }
        if options.time_server_url.is_empty() {
            return Err(UsageError::NoTimeServer);
        }

        let mut exclude: BTreeSet<PathBuf> = self.excl_dirs.iter().cloned().collect();
        if !self.no_config_excludes {
            exclude.extend(config.exclude_dirs.iter().cloned());
        }
        let input = InputSpec {
            include: self
                .dir_in
                .iter()
                .map(|path| IncludeDir {
                    path: path.clone(),
                    recursive: self.recursive,
                })
                .collect(),
            exclude: exclude.into_iter().collect(),
            file: self.file_in.clone(),
        }
        .normalized();

        Ok(Invocation {
            options,
            input,
            batch_log_dir: self
                .batch_log_dir
                .clone()
                .or_else(|| config.batch_log_dir.clone())
                .unwrap_or_else(|| PathBuf::from(".")),
            assume_yes: self.yes,
            report_json: self.report_json.clone(),
        })
    }

    fn extensions(&self) -> Vec<String> {
        if self.bdoc {
            vec![EXTENSION_BDOC.to_string()]
        } else if self.ddoc {
            vec![EXTENSION_DDOC.to_string()]
        } else {
            vec![EXTENSION_DDOC.to_string(), EXTENSION_BDOC.to_string()]
        }
    }
}
