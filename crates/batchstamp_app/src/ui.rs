use batchstamp_core::{BatchState, BatchViewModel, StageWeights};
use indicatif::{ProgressBar, ProgressStyle};

/// Terminal rendering of the batch view model.
pub struct ProgressDisplay {
    bar: ProgressBar,
}

impl ProgressDisplay {
    pub fn new() -> Self {
        let bar = ProgressBar::new(u64::from(StageWeights::DEFAULT.total()));
        bar.set_style(
            ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {percent:>3}% {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        Self { bar }
    }

    pub fn render(&self, view: &BatchViewModel) {
        self.bar.set_length(u64::from(view.progress_max));
        self.bar.set_position(u64::from(view.progress));
        self.bar.set_message(view.status.clone());
        if view.state.is_terminal() {
            match view.state {
                BatchState::Done => self.bar.finish_with_message(view.status.clone()),
                _ => self.bar.abandon_with_message(view.status.clone()),
            }
        }
    }

    /// Runs `f` with the bar cleared so prompts stay readable.
    pub fn suspend<R>(&self, f: impl FnOnce() -> R) -> R {
        self.bar.suspend(f)
    }
}
