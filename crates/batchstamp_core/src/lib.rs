//! Batchstamp core: pure batch state machine, progress model and report helpers.
mod effect;
mod input;
mod msg;
mod preflight;
mod progress;
mod registry;
mod result;
mod state;
mod update;
mod view_model;

pub use effect::Effect;
pub use input::{
    matches_extension, normalize_path, output_path_for, IncludeDir, InputSpec, StampOptions,
    DEFAULT_OUT_EXTENSION, EXTENSION_BDOC, EXTENSION_DDOC,
};
pub use msg::{CrawlEvent, Msg};
pub use preflight::{find_shortfalls, human_size, shortfall_warning, PartitionShortfall};
pub use progress::{progress_snapshot, ProgressInputs, ProgressSnapshot, StageWeights};
pub use registry::{JobId, JobRegistry, StopReason};
pub use result::{BatchReport, Disposition, ResultAccumulator, CANCELLED_BY_USER};
pub use state::{BatchSession, BatchState, CandidateFile, CandidateSet};
pub use update::{update, TEST_DIGEST};
pub use view_model::BatchViewModel;
