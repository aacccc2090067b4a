// AutoTest - Automated extraction and validation runner for CAD data pipelines
//
// This is the library crate containing the core business logic and data structures.
// The binary crate (main.rs) provides the console entry point.

pub mod config;
pub mod logging;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod state;
pub mod ui;

// Re-export commonly used types for convenience
pub use config::ConfigManager;
pub use models::{ModuleOutcome, RunState, RunStatus, RunSummary, UserConfig};
pub use orchestrator::{ExecutionControl, Orchestrator, RunController, StartError};
pub use services::{Comparator, ModuleRegistry, RunPaths, TestModule, ValidationOptions};
pub use state::{StateChange, StateManager};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
