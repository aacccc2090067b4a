//! AutoTest - Automated extraction and validation runner
//!
//! Main entry point for the console application.
//!
//! # Overview
//!
//! This binary drives one run of the selected test modules. It initializes:
//! - Configuration loading ([`ConfigManager`], YAML file plus `AUTOTEST_*` overrides)
//! - Logging infrastructure (file rotation + console output)
//! - Tokio runtime for Ctrl-C handling and stdin commands
//! - Run control ([`RunController`] - validates the request and owns the worker thread)
//!
//! The application uses a hybrid threading model:
//! - **Worker thread**: Runs the modules sequentially (blocking, synchronous)
//! - **Tokio workers**: Wait on Ctrl-C and stdin, forwarding cancel/pause requests
//! - **Console listener**: Background std::thread printing state changes
//! - **Main thread**: Joins the worker and reports the summary
//!
//! # Configuration Files
//!
//! Expected in `AutoTest Data/` directory:
//! - `AutoTest Config.yaml`: Folders, module selection, validation settings
//!
//! # Exit Codes
//!
//! - `0`: every selected module passed
//! - `1`: a module failed, or the run could not start
//! - `2`: the run was cancelled

use anyhow::{Context, Result};
use autotest::logging::{LogOptions, setup_logging_with_console};
use autotest::services::RunPaths;
use autotest::ui::{exit_code, read_commands, spawn_event_printer};
use autotest::{APP_NAME, ConfigManager, ModuleRegistry, RunController, StartError, StateManager, VERSION};
use camino::Utf8Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

fn main() -> Result<ExitCode> {
    let config_manager = ConfigManager::new("AutoTest Data")?;
    let config = config_manager.load_effective_config()?;

    let _guard = setup_logging_with_console(&LogOptions {
        log_dir: &config.log_dir,
        log_prefix: "autotest",
        debug_mode: config.debug_mode,
        console_output: config.debug_mode,
        json_file: false,
    })?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);
    tracing::info!("Using config file {}", config_manager.config_path());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(2)
        .thread_name("autotest-runtime")
        .build()?;

    let state_manager = StateManager::new();
    let registry = ModuleRegistry::with_defaults(&config);
    tracing::info!("Registered modules: {}", registry.names().join(", "));

    let controller = Arc::new(RunController::new(registry, state_manager.clone()));

    // Subscribe before starting so no event is missed
    let printer = spawn_event_printer(&state_manager).context("Failed to spawn console listener")?;

    let handle = match controller.start(&config.selected_modules, RunPaths::from_config(&config)) {
        Ok(handle) => handle,
        Err(e) => {
            tracing::error!("Run not started: {}", e);
            eprintln!("Run not started: {}", e);
            if matches!(e, StartError::NoModulesSelected | StartError::UnknownModule(_)) {
                eprintln!(
                    "Available modules: {}",
                    controller.registry().names().join(", ")
                );
            }
            return Ok(ExitCode::from(1));
        }
    };

    println!("Controls: p = pause/resume, c = cancel, Ctrl-C = cancel");

    let signal_controller = Arc::clone(&controller);
    runtime.spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Ctrl-C received");
            signal_controller.request_cancel();
        }
    });

    let input_controller = Arc::clone(&controller);
    runtime.spawn(async move {
        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        if let Err(e) = read_commands(&input_controller, stdin).await {
            tracing::warn!("Stopped reading console commands: {}", e);
        }
    });

    let summary = handle.join()?;

    if printer.join().is_err() {
        tracing::warn!("Console listener panicked");
    }

    println!("{}", summary.summary());
    for report in &summary.reports {
        println!(
            "  {:<24} {:<4} {:>7.2}s  {}",
            report.name,
            if report.success { "OK" } else { "FAIL" },
            report.duration.as_secs_f64(),
            report.message
        );
    }

    if let Some(path) = config.export_log_path() {
        match state_manager.export_log(Utf8Path::new(path)) {
            Ok(count) => println!("Exported {} log entries to {}", count, path),
            Err(e) => {
                tracing::error!("Log export failed: {:#}", e);
                eprintln!("Log export failed: {:#}", e);
            }
        }
    }

    // The stdin reader may be parked on a blocking read
    runtime.shutdown_timeout(Duration::from_secs(1));

    tracing::info!("Application shutdown complete");
    Ok(ExitCode::from(exit_code(summary.status, summary.failed)))
}
