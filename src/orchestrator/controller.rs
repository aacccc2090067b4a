// Run Controller - Validates start requests and owns the worker thread
//
// This module contains the RunController which coordinates between:
// - ModuleRegistry (what can run)
// - StateManager (run state and log)
// - Orchestrator (the worker loop)
//
// It handles:
// - Rejecting invalid start requests before any thread exists
// - Spawning exactly one worker per run
// - Forwarding stop/pause requests to the active run

use super::{ExecutionControl, Orchestrator};
use crate::models::RunSummary;
use crate::services::modules::{ModuleRegistry, RegistryError, RunPaths};
use crate::state::StateManager;
use anyhow::{Result, anyhow};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use thiserror::Error;

/// Reasons a run was refused
#[derive(Error, Debug)]
pub enum StartError {
    #[error("No modules selected")]
    NoModulesSelected,

    #[error(transparent)]
    UnknownModule(#[from] RegistryError),

    #[error("Please select a CAD folder or an input folder")]
    MissingInputFolder,

    #[error("Please select an output folder")]
    MissingOutputFolder,

    #[error("A run is already in progress")]
    AlreadyRunning,

    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ResetError {
    #[error("Cannot reset while a run is in progress")]
    RunInProgress,
}

/// Handle to a started run
pub struct RunHandle {
    worker: JoinHandle<RunSummary>,
}

impl RunHandle {
    /// Block until the worker finishes
    pub fn join(self) -> Result<RunSummary> {
        self.worker
            .join()
            .map_err(|_| anyhow!("Run worker thread panicked"))
    }

    pub fn is_finished(&self) -> bool {
        self.worker.is_finished()
    }
}

/// Front-end facing entry point for starting and steering runs
///
/// # Example
/// ```ignore
/// let controller = RunController::new(ModuleRegistry::with_defaults(&config), StateManager::new());
/// let handle = controller.start(&config.selected_modules, RunPaths::from_config(&config))?;
/// let summary = handle.join()?;
/// ```
pub struct RunController {
    registry: ModuleRegistry,
    state: StateManager,

    /// Control flags of the most recent run
    control: Mutex<Option<Arc<ExecutionControl>>>,
}

impl RunController {
    pub fn new(registry: ModuleRegistry, state: StateManager) -> Self {
        Self {
            registry,
            state,
            control: Mutex::new(None),
        }
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    pub fn state(&self) -> &StateManager {
        &self.state
    }

    pub fn is_running(&self) -> bool {
        self.state.read(|s| s.is_running())
    }

    /// Validate the request and start a run on a dedicated worker thread.
    ///
    /// Every check happens before the worker is spawned, so a refused request
    /// leaves no thread and no state change behind.
    pub fn start<S: AsRef<str>>(
        &self,
        selection: &[S],
        paths: RunPaths,
    ) -> Result<RunHandle, StartError> {
        if selection.is_empty() {
            tracing::warn!("Start refused: no modules selected");
            return Err(StartError::NoModulesSelected);
        }

        let modules = self.registry.select(selection)?;

        if paths.cad_input().is_none() {
            tracing::warn!("Start refused: no CAD or input folder");
            return Err(StartError::MissingInputFolder);
        }
        if paths.output_folder.is_none() {
            tracing::warn!("Start refused: no output folder");
            return Err(StartError::MissingOutputFolder);
        }

        // The slot stays locked across the transition, so anyone who sees
        // `Running` and then reads the slot gets this run's control
        let control = Arc::new(ExecutionControl::new());
        {
            let mut slot = self.lock_control();
            if !self.state.try_start_run(modules.len()) {
                tracing::warn!("Start refused: a run is already in progress");
                return Err(StartError::AlreadyRunning);
            }
            *slot = Some(Arc::clone(&control));
        }

        let orchestrator = Orchestrator::new(self.state.clone());
        let spawned = thread::Builder::new()
            .name("autotest-worker".to_string())
            .spawn(move || orchestrator.run(&modules, &paths, &control));

        match spawned {
            Ok(worker) => Ok(RunHandle { worker }),
            Err(e) => {
                tracing::error!("Failed to spawn worker thread: {}", e);
                self.state.reset();
                Err(StartError::Spawn(e))
            }
        }
    }

    /// Ask the active run to stop at the next module boundary
    ///
    /// # Returns
    /// `true` if a running run received a new stop request
    pub fn request_cancel(&self) -> bool {
        if !self.is_running() {
            return false;
        }

        let Some(control) = self.lock_control().clone() else {
            return false;
        };

        if control.request_stop() {
            tracing::info!("Cancellation requested");
            self.state.log("Cancellation requested");
            true
        } else {
            false
        }
    }

    /// Flip the pause flag of the active run.
    ///
    /// The flag is published and logged; the worker does not wait on it.
    ///
    /// # Returns
    /// The new pause value, or `None` when no run is active
    pub fn toggle_pause(&self) -> Option<bool> {
        if !self.is_running() {
            return None;
        }

        let control = self.lock_control().clone()?;
        let paused = control.toggle_pause();

        tracing::info!("Pause toggled: {}", paused);
        self.state.set_paused(paused);
        self.state.log(if paused { "Paused" } else { "Resumed" });
        Some(paused)
    }

    /// Clear counters and the run log. Refused while a run is active.
    pub fn reset(&self) -> Result<(), ResetError> {
        if self.is_running() {
            return Err(ResetError::RunInProgress);
        }

        *self.lock_control() = None;
        self.state.reset();
        tracing::info!("Run state reset");
        Ok(())
    }

    fn lock_control(&self) -> std::sync::MutexGuard<'_, Option<Arc<ExecutionControl>>> {
        // A poisoned lock only means a holder panicked; the Option inside is still valid
        self.control
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
