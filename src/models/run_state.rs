use std::fmt;
use std::time::Duration;

/// Lifecycle of a single run.
///
/// `Idle → Running → {Completed, Cancelled}`. The only way back to `Idle`
/// is an explicit reset once the run has finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunStatus {
    #[default]
    Idle,
    Running,
    Completed,
    Cancelled,
}

impl RunStatus {
    /// True for the two terminal states.
    pub fn is_finished(self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Cancelled)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RunStatus::Idle => "Idle",
            RunStatus::Running => "Running",
            RunStatus::Completed => "Completed",
            RunStatus::Cancelled => "Cancelled",
        };
        f.write_str(label)
    }
}

/// What a module hands back: a success flag and a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleOutcome {
    pub success: bool,
    pub message: String,
}

impl ModuleOutcome {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Result of one processed module within a run
#[derive(Debug, Clone)]
pub struct ModuleReport {
    pub name: String,
    pub success: bool,
    pub message: String,
    pub duration: Duration,
}

/// Aggregated outcome of a run.
///
/// Modules skipped because of a stop request are counted by [`skipped`](Self::skipped),
/// never as failures.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub status: RunStatus,
    pub total_selected: usize,
    pub processed: usize,
    pub failed: usize,
    pub reports: Vec<ModuleReport>,
}

impl RunSummary {
    /// Modules that were selected but never invoked.
    pub fn skipped(&self) -> usize {
        self.total_selected - self.processed
    }

    /// Number of modules that reported success.
    pub fn succeeded(&self) -> usize {
        self.processed - self.failed
    }

    /// True when the run completed and no module failed.
    pub fn is_clean(&self) -> bool {
        self.status == RunStatus::Completed && self.failed == 0
    }

    /// One-line summary for status displays.
    pub fn summary(&self) -> String {
        format!(
            "{}: {} completed, {} failed, {} skipped (Total: {})",
            self.status,
            self.succeeded(),
            self.failed,
            self.skipped(),
            self.total_selected
        )
    }
}

/// Percent complete for a run, guarded against an empty selection.
pub fn percent_complete(processed: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        processed as f64 / total as f64 * 100.0
    }
}

/// Single source of truth for the state of the current run.
///
/// Wrapped in `Arc<RwLock<RunState>>` by [`crate::state::StateManager`]; mutate it
/// only through the manager so change events are emitted.
#[derive(Clone, Debug, Default)]
pub struct RunState {
    pub status: RunStatus,
    pub current_module: Option<String>,

    // Progress
    pub total_selected: usize,
    pub processed: usize,
    pub failed: usize,
    pub percent: f64,

    // Controls
    pub is_paused: bool,

    // Ordered user-facing log
    pub log_entries: Vec<String>,
}

impl RunState {
    pub fn is_running(&self) -> bool {
        self.status == RunStatus::Running
    }

    /// Clear everything belonging to the last run and return to `Idle`.
    pub fn reset(&mut self) {
        *self = RunState::default();
    }
}
