use std::path::PathBuf;

use crate::BatchState;

/// Share of the progress scale owned by each stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageWeights {
    pub test: u32,
    pub search: u32,
    pub convert: u32,
}

impl StageWeights {
    pub const DEFAULT: StageWeights = StageWeights {
        test: 100,
        search: 500,
        convert: 400,
    };

    pub fn total(&self) -> u32 {
        self.test + self.search + self.convert
    }
}

impl Default for StageWeights {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressInputs {
    pub state: BatchState,
    pub weights: StageWeights,
    /// Crawl completion in `[0, 1]`.
    pub search_fraction: f64,
    pub current_path: Option<PathBuf>,
    pub found: usize,
    pub selected: usize,
    pub converted: usize,
    /// Highest value already reported in this batch.
    pub floor: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProgressSnapshot {
    pub value: u32,
    pub max: u32,
    pub status: String,
}

pub fn progress_snapshot(inputs: &ProgressInputs) -> ProgressSnapshot {
    let weights = inputs.weights;
    let searched = weights.test + weights.search;
    let raw = match inputs.state {
        BatchState::Idle | BatchState::TestingServer => 0,
        BatchState::SearchingFiles => {
            let fraction = inputs.search_fraction.clamp(0.0, 1.0);
            weights.test + (f64::from(weights.search) * fraction) as u32
        }
        BatchState::PreflightCheck | BatchState::AwaitingUserFileSelection => searched,
        BatchState::Converting => {
            if inputs.selected == 0 {
                weights.total()
            } else {
                let done = inputs.converted.min(inputs.selected) as u64;
                searched + (u64::from(weights.convert) * done / inputs.selected as u64) as u32
            }
        }
        BatchState::Done => weights.total(),
        BatchState::Cancelled | BatchState::Failed => inputs.floor,
    };

    let status = match inputs.state {
        BatchState::Idle => String::new(),
        BatchState::TestingServer => "Testing time server...".to_string(),
        BatchState::SearchingFiles => match &inputs.current_path {
            Some(path) => format!(
                "Searching {}... {} found so far...",
                path.display(),
                inputs.found
            ),
            None => format!("Searching files. {} found so far...", inputs.found),
        },
        BatchState::PreflightCheck => "Checking free disk space...".to_string(),
        BatchState::AwaitingUserFileSelection => {
            format!("Found {} files. Waiting for file selection...", inputs.found)
        }
        BatchState::Converting => format!(
            "Found {} files. {} left to be converted...",
            inputs.selected,
            inputs.selected.saturating_sub(inputs.converted)
        ),
        BatchState::Done => "Finished".to_string(),
        BatchState::Cancelled => "Cancelled".to_string(),
        BatchState::Failed => "Failed".to_string(),
    };

    ProgressSnapshot {
        value: raw.max(inputs.floor).min(weights.total()),
        max: weights.total(),
        status,
    }
}
