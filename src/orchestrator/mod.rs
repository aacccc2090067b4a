//! Run orchestration.
//!
//! - [`Orchestrator`]: runs a selected module list in order, catching module
//!   faults and aggregating a [`RunSummary`]
//! - [`ExecutionControl`]: stop/pause flags shared between the controlling
//!   thread and the worker, observed at module boundaries
//! - [`RunController`]: validates a start request and spawns the single worker thread
//!
//! # Cancellation
//!
//! Stop is checked once before each module. A module that is already running
//! always finishes; the remaining modules are skipped, not failed.
//!
//! The pause flag is recorded and logged but the worker loop does not wait
//! on it.

pub mod controller;

pub use controller::{ResetError, RunController, RunHandle, StartError};

use crate::models::{ModuleOutcome, ModuleReport, RunStatus, RunSummary, percent_complete};
use crate::services::modules::{ModuleDescriptor, ModuleError, RunPaths};
use crate::state::StateManager;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

/// Stop and pause flags for one run.
///
/// A fresh instance is created per run, so a stop request is never cleared
/// while its run is active.
#[derive(Debug, Default)]
pub struct ExecutionControl {
    stop: AtomicBool,
    pause: AtomicBool,
}

impl ExecutionControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    ///
    /// # Returns
    /// `true` if this call set the flag, `false` if it was already set
    pub fn request_stop(&self) -> bool {
        !self.stop.swap(true, Ordering::SeqCst)
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Flip the pause flag and return the new value
    pub fn toggle_pause(&self) -> bool {
        !self.pause.fetch_xor(true, Ordering::SeqCst)
    }

    pub fn is_paused(&self) -> bool {
        self.pause.load(Ordering::SeqCst)
    }
}

/// Sequential module runner
///
/// Publishes every step through the [`StateManager`]: module changes,
/// progress counters and the run log.
#[derive(Clone)]
pub struct Orchestrator {
    state: StateManager,
}

impl Orchestrator {
    pub fn new(state: StateManager) -> Self {
        Self { state }
    }

    /// Run `modules` in order against `paths`.
    ///
    /// Enters `Running` first if the caller has not already done so. The
    /// returned summary always satisfies `processed + skipped == total_selected`.
    pub fn run(
        &self,
        modules: &[ModuleDescriptor],
        paths: &RunPaths,
        control: &ExecutionControl,
    ) -> RunSummary {
        let total = modules.len();
        if !self.state.read(|s| s.is_running()) {
            self.state.start_run(total);
        }

        tracing::info!("Starting run of {} module(s)", total);

        let mut processed = 0;
        let mut failed = 0;
        let mut reports = Vec::with_capacity(total);
        let mut halted = false;

        for descriptor in modules {
            if control.is_stop_requested() {
                tracing::warn!(
                    "Stop requested - skipping {} remaining module(s)",
                    total - processed
                );
                halted = true;
                break;
            }

            let name = descriptor.name.as_str();
            self.state.begin_module(name);
            self.state.log(format!("Starting module: {}", name));
            tracing::info!("Running module {}/{}: {}", processed + 1, total, name);

            let start = Instant::now();
            let (success, message) = match invoke_module(descriptor, paths) {
                Ok(ModuleOutcome { success, message }) => {
                    if success {
                        self.state.log(format!("[SUCCESS] {}: {}", name, message));
                    } else {
                        tracing::warn!("Module {} failed: {}", name, message);
                        self.state.log(format!("[FAIL] {}: {}", name, message));
                    }
                    (success, message)
                }
                Err(e) => {
                    tracing::error!("Module {} raised a fault: {}", name, e);
                    self.state.log(format!("[ERROR] {}: {}", name, e));
                    (false, e.to_string())
                }
            };
            let duration = start.elapsed();

            processed += 1;
            if !success {
                failed += 1;
            }

            self.state
                .record_progress(processed, failed, percent_complete(processed, total));
            self.state.log(format!("Finished module: {}", name));

            reports.push(ModuleReport {
                name: name.to_string(),
                success,
                message,
                duration,
            });
        }

        // A stop that lands during the final module still cancels the run
        let status = if halted || control.is_stop_requested() {
            RunStatus::Cancelled
        } else {
            RunStatus::Completed
        };
        self.state.finish_run(status);

        let summary = RunSummary {
            status,
            total_selected: total,
            processed,
            failed,
            reports,
        };

        tracing::info!("Run finished - {}", summary.summary());
        summary
    }
}

/// Call a module, turning panics into [`ModuleError::Panicked`]
fn invoke_module(
    descriptor: &ModuleDescriptor,
    paths: &RunPaths,
) -> Result<ModuleOutcome, ModuleError> {
    panic::catch_unwind(AssertUnwindSafe(|| descriptor.module.run(paths)))
        .unwrap_or_else(|payload| Err(ModuleError::Panicked(panic_message(payload.as_ref()))))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
