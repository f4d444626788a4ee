use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::progress::{progress_snapshot, ProgressInputs, StageWeights};
use crate::view_model::BatchViewModel;
use crate::{BatchReport, InputSpec, JobId, JobRegistry, ResultAccumulator, StampOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BatchState {
    #[default]
    Idle,
    TestingServer,
    SearchingFiles,
    PreflightCheck,
    AwaitingUserFileSelection,
    Converting,
    Done,
    Cancelled,
    Failed,
}

impl BatchState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            BatchState::Done | BatchState::Cancelled | BatchState::Failed
        )
    }

    pub fn is_running(self) -> bool {
        !self.is_terminal() && self != BatchState::Idle
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateFile {
    pub path: PathBuf,
    pub partition: Option<PathBuf>,
    pub size: u64,
}

/// Discovered files in insertion order, unique by path.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CandidateSet {
    files: Vec<CandidateFile>,
    known: HashSet<PathBuf>,
}

impl CandidateSet {
    /// Returns false when the path is already present.
    pub fn insert(&mut self, file: CandidateFile) -> bool {
        if !self.known.insert(file.path.clone()) {
            return false;
        }
        self.files.push(file);
        true
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.known.contains(path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&CandidateFile> {
        self.files.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CandidateFile> {
        self.files.iter()
    }

    pub fn to_vec(&self) -> Vec<CandidateFile> {
        self.files.clone()
    }

    pub fn clear(&mut self) {
        self.files.clear();
        self.known.clear();
    }

    /// Keeps only `selected` paths, preserving discovery order.
    pub fn retain_selected(&mut self, selected: &[PathBuf]) {
        let wanted: HashSet<&PathBuf> = selected.iter().collect();
        self.files.retain(|file| wanted.contains(&file.path));
        self.known = self.files.iter().map(|file| file.path.clone()).collect();
    }

    /// Total size per partition; files with an unknown partition are skipped.
    pub fn bytes_per_partition(&self) -> BTreeMap<PathBuf, u64> {
        let mut totals = BTreeMap::new();
        for file in &self.files {
            if let Some(partition) = &file.partition {
                *totals.entry(partition.clone()).or_insert(0) += file.size;
            }
        }
        totals
    }
}

/// The file currently handed to the timestamper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct InFlight {
    pub(crate) index: usize,
    pub(crate) input: PathBuf,
    pub(crate) output: PathBuf,
}

/// Orchestrator state for one batch at a time.
#[derive(Debug, Clone)]
pub struct BatchSession {
    pub(crate) registry: Arc<JobRegistry>,
    pub(crate) weights: StageWeights,
    pub(crate) state: BatchState,
    pub(crate) options: StampOptions,
    pub(crate) input: InputSpec,
    pub(crate) job_id: Option<JobId>,
    pub(crate) candidates: CandidateSet,
    pub(crate) excluded: usize,
    pub(crate) search_fraction: f64,
    pub(crate) current_path: Option<PathBuf>,
    pub(crate) in_flight: Option<InFlight>,
    pub(crate) pending_space_warning: Option<String>,
    pub(crate) result: ResultAccumulator,
    pub(crate) progress_floor: u32,
    dirty: bool,
}

impl Default for BatchSession {
    fn default() -> Self {
        Self::new(Arc::new(JobRegistry::new()))
    }
}

impl BatchSession {
    pub fn new(registry: Arc<JobRegistry>) -> Self {
        Self {
            registry,
            weights: StageWeights::default(),
            state: BatchState::Idle,
            options: StampOptions::default(),
            input: InputSpec::default(),
            job_id: None,
            candidates: CandidateSet::default(),
            excluded: 0,
            search_fraction: 0.0,
            current_path: None,
            in_flight: None,
            pending_space_warning: None,
            result: ResultAccumulator::new(),
            progress_floor: 0,
            dirty: false,
        }
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    pub fn state(&self) -> BatchState {
        self.state
    }

    pub fn job_id(&self) -> Option<JobId> {
        self.job_id
    }

    pub fn candidates(&self) -> &CandidateSet {
        &self.candidates
    }

    /// Partial until the batch is terminal; see [`BatchReport::complete`].
    pub fn report(&self) -> BatchReport {
        self.result.snapshot()
    }

    pub fn view(&self) -> BatchViewModel {
        let progress = progress_snapshot(&self.progress_inputs());
        BatchViewModel {
            state: self.state,
            progress: progress.value,
            progress_max: progress.max,
            status: progress.status,
            found: self.candidates.len(),
            excluded: self.excluded,
            pending_space_warning: self.pending_space_warning.clone(),
            report: self.report(),
            dirty: self.dirty,
        }
    }

    /// Returns whether anything changed since the last call and clears the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn transition(&mut self, next: BatchState) {
        if self.state != next {
            stamp_logging::stamp_debug!("batch state {:?} -> {:?}", self.state, next);
            self.state = next;
            self.mark_dirty();
        }
    }

    /// Resets per-batch data and allocates a fresh crawl job id.
    pub(crate) fn begin_batch(&mut self, options: StampOptions, input: InputSpec) {
        self.registry.reset();
        self.job_id = Some(self.registry.start_new_job());
        self.options = options;
        self.input = input;
        self.candidates.clear();
        self.excluded = 0;
        self.search_fraction = 0.0;
        self.current_path = None;
        self.in_flight = None;
        self.pending_space_warning = None;
        self.result = ResultAccumulator::new();
        self.progress_floor = 0;
        self.transition(BatchState::TestingServer);
    }

    /// Raises the progress floor to the current value.
    pub(crate) fn refresh_progress(&mut self) {
        let snapshot = progress_snapshot(&self.progress_inputs());
        self.progress_floor = snapshot.value;
    }

    fn progress_inputs(&self) -> ProgressInputs {
        let report = self.result.snapshot();
        ProgressInputs {
            state: self.state,
            weights: self.weights,
            search_fraction: self.search_fraction,
            current_path: self.current_path.clone(),
            found: self.candidates.len(),
            selected: report.cnt_selected,
            converted: report.progress_converted,
            floor: self.progress_floor,
        }
    }
}
