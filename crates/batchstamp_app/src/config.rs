use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use batchstamp_core::DEFAULT_OUT_EXTENSION;
use batchstamp_engine::{EngineConfig, TimestamperSettings};
use serde::{Deserialize, Serialize};
use stamp_logging::stamp_info;

pub const CONFIG_FILENAME: &str = "batchstamp.ron";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file {path:?}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Settings persisted in `batchstamp.ron`. Every field is optional in the
/// file; command line flags take precedence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub time_server_url: String,
    pub out_extension: String,
    pub exclude_dirs: Vec<PathBuf>,
    pub preview: bool,
    /// Where per-batch report logs go; current directory when unset.
    pub batch_log_dir: Option<PathBuf>,
    pub worker_threads: usize,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub max_reply_bytes: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        let settings = TimestamperSettings::default();
        Self {
            time_server_url: String::new(),
            out_extension: DEFAULT_OUT_EXTENSION.to_string(),
            exclude_dirs: Vec::new(),
            preview: false,
            batch_log_dir: None,
            worker_threads: EngineConfig::default().worker_threads,
            connect_timeout_secs: settings.connect_timeout.as_secs(),
            request_timeout_secs: settings.request_timeout.as_secs(),
            max_reply_bytes: settings.max_reply_bytes,
        }
    }
}

impl AppConfig {
    /// Loads `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                stamp_info!("No config file at {:?}, using defaults", path);
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let config = ron::from_str(&content).map_err(|err| ConfigError::Parse {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        stamp_info!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            timestamper: TimestamperSettings {
                connect_timeout: Duration::from_secs(self.connect_timeout_secs),
                request_timeout: Duration::from_secs(self.request_timeout_secs),
                max_reply_bytes: self.max_reply_bytes,
            },
            worker_threads: self.worker_threads.max(1),
        }
    }
}
