use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use batchstamp_core::CrawlEvent;

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    ServerTested(Result<(), StampError>),
    Crawl(CrawlEvent),
    FreeSpace(BTreeMap<PathBuf, u64>),
    FileStamped {
        index: usize,
        result: Result<StampOutcome, StampError>,
    },    /// A background task died; the batch cannot continue.
    Fatal(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StampOutcome {
    pub output: PathBuf,
    pub reply_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} ({kind})")]
pub struct StampError {
    pub kind: FailureKind,
    pub message: String,
}

impl StampError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    UnexpectedContentType { content_type: String },
    TooLarge { max_bytes: u64, actual: Option<u64> },
    Rejected { status: u8 },
    MalformedReply,
    Network,
    Io,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::UnexpectedContentType { content_type } => {
                write!(f, "unexpected content type {content_type}")
            }
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "reply too large (max {max_bytes}, actual {actual:?})")
            }
            FailureKind::Rejected { status } => {
                write!(f, "time server rejected request (status {status})")
            }
            FailureKind::MalformedReply => write!(f, "malformed reply"),
            FailureKind::Network => write!(f, "network error"),
            FailureKind::Io => write!(f, "io error"),
        }
    }
}
