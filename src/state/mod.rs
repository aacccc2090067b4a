// State management module
//
// This module provides the StateManager which wraps RunState with thread-safe access
// using Arc<RwLock<T>> and emits change events for the presentation layer.

use crate::models::{RunState, RunStatus};
use anyhow::{Context, Result};
use camino::Utf8Path;
use std::fs;
use std::io::{BufWriter, Write};
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;

/// Change events emitted when run state is modified
///
/// The worker thread never touches presentation state directly; it mutates
/// [`RunState`] through the [`StateManager`] and front ends react to these events.
#[derive(Clone, Debug, PartialEq)]
pub enum StateChange {
    /// A run has started
    RunStarted {
        total_selected: usize,
    },

    /// The module being executed has changed
    ModuleChanged {
        module: String,
    },

    /// Progress counters have been updated
    ProgressUpdated {
        processed: usize,
        failed: usize,
        total: usize,
        percent: f64,
    },

    /// Run reached a terminal state
    RunFinished {
        status: RunStatus,
        processed: usize,
        failed: usize,
    },

    /// Pause flag flipped
    PauseToggled {
        paused: bool,
    },

    /// A run log entry was appended
    LogAppended {
        entry: String,
    },

    /// State has been reset to Idle
    StateReset,
}

/// Thread-safe run state manager with event emission
///
/// - Provides thread-safe access to [`RunState`] via `Arc<RwLock<T>>`
/// - Detects state changes and emits [`StateChange`] events
/// - Supports subscribing to state changes via tokio broadcast channels
///
/// Always go through [`update()`](Self::update) (or one of the convenience
/// transitions) so subscribers see every change.
pub struct StateManager {
    state: Arc<RwLock<RunState>>,

    /// Broadcast channel for emitting state change events
    state_tx: broadcast::Sender<StateChange>,
}

impl StateManager {
    /// Create a new StateManager with an idle state
    ///
    /// The broadcast buffer holds 256 events; a run emits a handful per module.
    pub fn new() -> Self {
        let (state_tx, _) = broadcast::channel(256);
        Self {
            state: Arc::new(RwLock::new(RunState::default())),
            state_tx,
        }
    }

    /// Get a cloned snapshot of the current state
    pub fn snapshot(&self) -> RunState {
        self.state.read().unwrap().clone()
    }

    /// Execute a function with read access to the state
    ///
    /// # Example
    /// ```ignore
    /// let running = state_manager.read(|state| state.is_running());
    /// ```
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&RunState) -> R,
    {
        let state = self.state.read().unwrap();
        f(&state)
    }

    /// Update the state and emit change events
    ///
    /// Captures the old state, applies `update_fn`, diffs the two and emits
    /// one event per detected change.
    ///
    /// # Returns
    /// The StateChange events that were emitted
    pub fn update<F>(&self, update_fn: F) -> Vec<StateChange>
    where
        F: FnOnce(&mut RunState),
    {
        let mut state = self.state.write().unwrap();
        let old_state = state.clone();

        update_fn(&mut state);

        let changes = Self::detect_changes(&old_state, &state);

        for change in &changes {
            // Ignore send errors - it's OK if no one is listening
            let _ = self.state_tx.send(change.clone());
        }

        changes
    }

    /// Subscribe to state change events
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.state_tx.subscribe()
    }

    fn detect_changes(old: &RunState, new: &RunState) -> Vec<StateChange> {
        let mut changes = Vec::new();

        if old.status != new.status {
            match new.status {
                RunStatus::Running => changes.push(StateChange::RunStarted {
                    total_selected: new.total_selected,
                }),
                RunStatus::Completed | RunStatus::Cancelled => {
                    changes.push(StateChange::RunFinished {
                        status: new.status,
                        processed: new.processed,
                        failed: new.failed,
                    })
                }
                // Reset emits its own event
                RunStatus::Idle => {}
            }
        }

        if old.current_module != new.current_module {
            if let Some(module) = &new.current_module {
                changes.push(StateChange::ModuleChanged {
                    module: module.clone(),
                });
            }
        }

        if old.processed != new.processed
            || old.failed != new.failed
            || old.total_selected != new.total_selected
        {
            changes.push(StateChange::ProgressUpdated {
                processed: new.processed,
                failed: new.failed,
                total: new.total_selected,
                percent: new.percent,
            });
        }

        if old.is_paused != new.is_paused {
            changes.push(StateChange::PauseToggled {
                paused: new.is_paused,
            });
        }

        if new.log_entries.len() > old.log_entries.len() {
            for entry in &new.log_entries[old.log_entries.len()..] {
                changes.push(StateChange::LogAppended {
                    entry: entry.clone(),
                });
            }
        }

        changes
    }

    // Convenience transitions

    /// Enter `Running` for a fresh run over `total_selected` modules
    pub fn start_run(&self, total_selected: usize) -> Vec<StateChange> {
        self.update(|state| {
            state.reset();
            state.status = RunStatus::Running;
            state.total_selected = total_selected;
        })
    }

    /// Enter `Running` unless a run is already active.
    ///
    /// The check and the transition happen under one write lock, so two
    /// callers can never both start a run.
    pub fn try_start_run(&self, total_selected: usize) -> bool {
        let mut started = false;
        self.update(|state| {
            if !state.is_running() {
                state.reset();
                state.status = RunStatus::Running;
                state.total_selected = total_selected;
                started = true;
            }
        });
        started
    }

    /// Mark `module` as the one currently executing
    pub fn begin_module(&self, module: &str) -> Vec<StateChange> {
        self.update(|state| {
            state.current_module = Some(module.to_string());
        })
    }

    /// Publish updated counters
    pub fn record_progress(&self, processed: usize, failed: usize, percent: f64) -> Vec<StateChange> {
        self.update(|state| {
            state.processed = processed;
            state.failed = failed;
            state.percent = percent;
        })
    }

    /// Enter a terminal state
    pub fn finish_run(&self, status: RunStatus) -> Vec<StateChange> {
        self.update(|state| {
            state.status = status;
            state.current_module = None;
        })
    }

    /// Record the pause flag
    pub fn set_paused(&self, paused: bool) -> Vec<StateChange> {
        self.update(|state| {
            state.is_paused = paused;
        })
    }

    /// Append an entry to the run log
    pub fn log(&self, entry: impl Into<String>) -> Vec<StateChange> {
        let entry = entry.into();
        tracing::debug!("Run log: {}", entry);
        self.update(|state| {
            state.log_entries.push(entry);
        })
    }

    /// Reset all run state back to `Idle`
    pub fn reset(&self) -> Vec<StateChange> {
        let mut changes = self.update(|state| {
            state.reset();
        });

        let reset_event = StateChange::StateReset;
        let _ = self.state_tx.send(reset_event.clone());
        changes.push(reset_event);

        changes
    }

    /// Write every run log entry to `path`, one per line, in append order
    ///
    /// # Returns
    /// The number of entries written
    pub fn export_log(&self, path: &Utf8Path) -> Result<usize> {
        let entries = self.read(|s| s.log_entries.clone());

        let file = fs::File::create(path)
            .with_context(|| format!("Failed to create log export file: {}", path))?;
        let mut writer = BufWriter::new(file);
        for entry in &entries {
            writeln!(writer, "{}", entry)
                .with_context(|| format!("Failed to write log export: {}", path))?;
        }
        writer
            .flush()
            .with_context(|| format!("Failed to flush log export: {}", path))?;

        tracing::info!("Exported {} log entries to {}", entries.len(), path);
        Ok(entries.len())
    }
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

// Make StateManager cloneable for sharing across threads
impl Clone for StateManager {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            state_tx: self.state_tx.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_new_state_manager() {
        let manager = StateManager::new();
        let state = manager.snapshot();

        assert_eq!(state.status, RunStatus::Idle);
        assert_eq!(state.processed, 0);
        assert!(state.log_entries.is_empty());
    }

    #[test]
    fn test_start_run() {
        let manager = StateManager::new();
        let changes = manager.start_run(4);

        assert!(matches!(changes[0], StateChange::RunStarted { total_selected: 4 }));
        assert!(matches!(changes[1], StateChange::ProgressUpdated { total: 4, .. }));

        let state = manager.snapshot();
        assert!(state.is_running());
        assert_eq!(state.total_selected, 4);
    }

    #[test]
    fn test_start_run_clears_previous_log() {
        let manager = StateManager::new();
        manager.log("old entry");
        manager.start_run(1);

        assert!(manager.snapshot().log_entries.is_empty());
    }

    #[test]
    fn test_try_start_run_rejects_second_run() {
        let manager = StateManager::new();
        assert!(manager.try_start_run(2));
        assert!(!manager.try_start_run(3));
        assert_eq!(manager.snapshot().total_selected, 2);

        manager.finish_run(RunStatus::Completed);
        assert!(manager.try_start_run(3));
    }

    #[test]
    fn test_begin_module() {
        let manager = StateManager::new();
        let changes = manager.begin_module("Data Extraction");

        assert_eq!(
            changes,
            vec![StateChange::ModuleChanged {
                module: "Data Extraction".to_string()
            }]
        );
    }

    #[test]
    fn test_finish_run() {
        let manager = StateManager::new();
        manager.start_run(2);
        manager.begin_module("A");
        manager.record_progress(2, 1, 100.0);

        let changes = manager.finish_run(RunStatus::Completed);
        assert!(matches!(
            changes[0],
            StateChange::RunFinished {
                status: RunStatus::Completed,
                processed: 2,
                failed: 1
            }
        ));

        let state = manager.snapshot();
        assert_eq!(state.status, RunStatus::Completed);
        assert!(state.current_module.is_none());
    }

    #[test]
    fn test_log_appends_in_order() {
        let manager = StateManager::new();
        manager.log("first");
        let changes = manager.log("second");

        assert_eq!(
            changes,
            vec![StateChange::LogAppended {
                entry: "second".to_string()
            }]
        );
        assert_eq!(manager.snapshot().log_entries, vec!["first", "second"]);
    }

    #[test]
    fn test_pause_toggle_event() {
        let manager = StateManager::new();
        let changes = manager.set_paused(true);
        assert_eq!(changes, vec![StateChange::PauseToggled { paused: true }]);

        // Setting the same value is not a change
        assert!(manager.set_paused(true).is_empty());
    }

    #[test]
    fn test_reset() {
        let manager = StateManager::new();
        manager.start_run(1);
        manager.finish_run(RunStatus::Cancelled);

        let changes = manager.reset();
        assert!(changes.contains(&StateChange::StateReset));
        assert_eq!(manager.snapshot().status, RunStatus::Idle);
    }

    #[test]
    fn test_export_log() {
        let temp_dir = TempDir::new().unwrap();
        let path = Utf8PathBuf::try_from(temp_dir.path().join("run.txt")).unwrap();

        let manager = StateManager::new();
        manager.log("Starting module: A");
        manager.log("[SUCCESS] A: done");
        manager.log("Finished module: A");

        let written = manager.export_log(&path).unwrap();
        assert_eq!(written, 3);

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "Starting module: A\n[SUCCESS] A: done\nFinished module: A\n"
        );
    }

    #[test]
    fn test_export_log_to_missing_directory_fails() {
        let temp_dir = TempDir::new().unwrap();
        let path = Utf8PathBuf::try_from(temp_dir.path().join("missing").join("run.txt")).unwrap();

        let manager = StateManager::new();
        manager.log("entry");
        assert!(manager.export_log(&path).is_err());
    }

    #[test]
    fn test_clone_shares_state() {
        let manager = StateManager::new();
        let clone = manager.clone();
        clone.log("shared");
        assert_eq!(manager.snapshot().log_entries.len(), 1);
    }
}
