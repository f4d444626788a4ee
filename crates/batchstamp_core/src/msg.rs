use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::{InputSpec, JobId, StampOptions, StopReason};

/// Events streamed by a crawl job, each tagged with the job that produced it.
#[derive(Debug, Clone, PartialEq)]
pub enum CrawlEvent {
    ProcessingPath {
        job_id: JobId,
        path: PathBuf,
        /// Estimated traversal completion in `[0, 1]`.
        progress: f64,
    },
    ExcludingPath {
        job_id: JobId,
        path: PathBuf,
    },
    FoundFile {
        job_id: JobId,
        path: PathBuf,
        /// Mount point holding the file, when it could be resolved.
        partition: Option<PathBuf>,
        size: u64,
    },
    Done {
        job_id: JobId,
        /// Set when the walk stopped early.
        stopped: Option<StopReason>,
    },
}

impl CrawlEvent {
    pub fn job_id(&self) -> JobId {
        match self {
            CrawlEvent::ProcessingPath { job_id, .. }
            | CrawlEvent::ExcludingPath { job_id, .. }
            | CrawlEvent::FoundFile { job_id, .. }
            | CrawlEvent::Done { job_id, .. } => *job_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// Presentation layer asked for a new batch.
    Start {
        options: StampOptions,
        input: InputSpec,
    },
    /// User pressed cancel.
    Cancel,
    /// Batch log sink is open.
    LogOpened { path: PathBuf },
    /// Batch log sink could not be opened.
    LogOpenFailed { error: String },
    /// Connectivity test against the time server finished.
    ServerTested(Result<(), String>),
    /// Event from the background crawl job.
    Crawl(CrawlEvent),
    /// Available bytes per partition, answering `Effect::QueryFreeSpace`.
    FreeSpace(BTreeMap<PathBuf, u64>),
    /// User chose to continue despite the low disk space warning.
    LowSpaceProceed,
    /// User chose to abort on the low disk space warning.
    LowSpaceAbort,
    /// User accepted the file preview with the given selection.
    SelectionConfirmed(Vec<PathBuf>),
    /// User rejected the file preview.
    SelectionRejected,
    /// Timestamper finished one file.
    FileStamped {
        index: usize,
        result: Result<(), String>,
    },
    /// Unrecoverable error outside the normal flow.
    Fatal(String),
}
