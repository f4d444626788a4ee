use std::path::PathBuf;

use batchstamp_core::{human_size, CandidateFile};
use dialoguer::{Confirm, MultiSelect};
use stamp_logging::stamp_warn;

/// Questions the batch may ask while it runs.
pub trait Prompter {
    /// True to continue despite the low disk space warning.
    fn confirm_low_space(&self, warning: &str) -> bool;

    /// Paths to stamp, or `None` when the user rejects the whole list.
    fn select_files(&self, files: &[CandidateFile]) -> Option<Vec<PathBuf>>;
}

pub struct TerminalPrompter {
    assume_yes: bool,
}

impl TerminalPrompter {
    pub fn new(assume_yes: bool) -> Self {
        Self { assume_yes }
    }
}

impl Prompter for TerminalPrompter {
    fn confirm_low_space(&self, warning: &str) -> bool {
        println!("{warning}");
        if self.assume_yes {
            return true;
        }
        match Confirm::new()
            .with_prompt("Continue timestamping anyway?")
            .default(false)
            .interact()
        {
            Ok(answer) => answer,
            Err(err) => {
                stamp_warn!("Could not ask about disk space, aborting: {}", err);
                false
            }
        }
    }

    fn select_files(&self, files: &[CandidateFile]) -> Option<Vec<PathBuf>> {
        if self.assume_yes {
            return Some(files.iter().map(|file| file.path.clone()).collect());
        }
        let labels: Vec<String> = files
            .iter()
            .map(|file| format!("{} ({})", file.path.display(), human_size(file.size)))
            .collect();
        let defaults = vec![true; files.len()];
        let chosen = MultiSelect::new()
            .with_prompt("Files to timestamp (space toggles, enter confirms, esc cancels)")
            .items(&labels)
            .defaults(&defaults)
            .interact_opt();
        match chosen {
            Ok(Some(indices)) => Some(
                indices
                    .into_iter()
                    .filter_map(|index| files.get(index))
                    .map(|file| file.path.clone())
                    .collect(),
            ),
            Ok(None) => None,
            Err(err) => {
                stamp_warn!("Could not show file selection, cancelling: {}", err);
                None
            }
        }
    }
}
