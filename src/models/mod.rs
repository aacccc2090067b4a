//! Data models for the AutoTest application.
//!
//! - [`RunState`]: the state of the current run (status, progress, run log)
//! - [`RunSummary`] / [`ModuleReport`]: aggregated results handed back by the orchestrator
//! - [`ModuleOutcome`]: the `(success, message)` pair every module returns
//! - [`UserConfig`]: folders, module selection and validation settings loaded from `AutoTest Config.yaml`

pub mod config;
pub mod run_state;

pub use config::{DEFAULT_EXTRACTION_EXE, DEFAULT_TOLERANCE, UserConfig};
pub use run_state::{
    ModuleOutcome, ModuleReport, RunState, RunStatus, RunSummary, percent_complete,
};
