use std::path::PathBuf;

use crate::{BatchReport, CandidateFile, InputSpec, JobId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Open a fresh batch log; answer with `Msg::LogOpened` or `Msg::LogOpenFailed`.
    OpenLog,
    AppendLog(String),
    CloseLog,
    /// Send a test request; answer with `Msg::ServerTested`.
    TestServer { url: String, digest: [u8; 32] },
    /// Run a crawl job on the worker pool; answer with `Msg::Crawl` events.
    SpawnCrawl {
        job_id: JobId,
        input: InputSpec,
        extensions: Vec<String>,
    },
    /// Answer with `Msg::FreeSpace`.
    QueryFreeSpace { partitions: Vec<PathBuf> },
    /// Ask the user whether to continue; answer with `Msg::LowSpaceProceed`
    /// or `Msg::LowSpaceAbort`.
    ConfirmLowSpace { warning: String },
    /// Show the candidate list; answer with `Msg::SelectionConfirmed` or
    /// `Msg::SelectionRejected`.
    PresentSelection { files: Vec<CandidateFile> },
    /// Timestamp one file; answer with `Msg::FileStamped`.
    StampFile {
        index: usize,
        total: usize,
        url: String,
        input: PathBuf,
        output: PathBuf,
    },
    /// The batch reached a terminal state.
    BatchFinished(BatchReport),
}
