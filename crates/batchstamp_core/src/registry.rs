use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

pub type JobId = u64;

/// Why a job stopped being current.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The user cancelled the batch.
    Cancelled,
    /// A newer job was started.
    Superseded,
}

/// Shared job bookkeeping: the id of the current crawl job and the user
/// cancellation flag. Shared through `Arc` between the control loop and
/// background jobs.
#[derive(Debug, Default)]
pub struct JobRegistry {
    current: AtomicU64,
    cancelled: AtomicBool,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates the next job id and makes every earlier id stale.
    pub fn start_new_job(&self) -> JobId {
        self.current.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn current(&self) -> JobId {
        self.current.load(Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn is_superseded(&self, id: JobId) -> bool {
        id != self.current()
    }

    /// Cancellation takes precedence when both apply.
    pub fn stop_reason(&self, id: JobId) -> Option<StopReason> {
        if self.is_cancelled() {
            Some(StopReason::Cancelled)
        } else if self.is_superseded(id) {
            Some(StopReason::Superseded)
        } else {
            None
        }
    }

    pub fn is_current(&self, id: JobId) -> bool {
        self.stop_reason(id).is_none()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Clears the cancellation flag. Call before [`JobRegistry::start_new_job`].
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }
}
