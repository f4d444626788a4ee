use crate::{BatchReport, BatchState};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BatchViewModel {
    pub state: BatchState,
    pub progress: u32,
    pub progress_max: u32,
    pub status: String,
    pub found: usize,
    pub excluded: usize,
    /// Set while the low disk space question is open.
    pub pending_space_warning: Option<String>,
    pub report: BatchReport,
    pub dirty: bool,
}
