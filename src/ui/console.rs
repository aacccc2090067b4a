// Console front end - Renders run state events and dispatches keyboard commands
//
// This replaces a windowed UI with:
// - A listener thread that prints StateChange events as they arrive
// - A line-based command reader (p = pause/resume, c = cancel)

use crate::models::RunStatus;
use crate::orchestrator::RunController;
use crate::state::{StateChange, StateManager};
use std::thread::{self, JoinHandle};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::broadcast::{Receiver, error::RecvError};

/// Commands accepted on stdin while a run is active
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    TogglePause,
    Cancel,
}

impl ConsoleCommand {
    /// Parse one input line; unknown input yields `None`
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim().to_ascii_lowercase().as_str() {
            "p" | "pause" | "resume" => Some(Self::TogglePause),
            "c" | "cancel" | "stop" => Some(Self::Cancel),
            _ => None,
        }
    }
}

/// Render a state change as a console line
///
/// Progress and log events produce output; the rest are reflected in them.
pub fn format_event(change: &StateChange) -> Option<String> {
    match change {
        StateChange::RunStarted { total_selected } => {
            Some(format!("Running {} module(s)", total_selected))
        }
        StateChange::ModuleChanged { module } => Some(format!("> {}", module)),
        StateChange::ProgressUpdated {
            processed,
            failed,
            total,
            percent,
        } if *total > 0 && *processed > 0 => Some(format!(
            "Progress: {}/{} ({:.0}%), {} failed",
            processed, total, percent, failed
        )),
        StateChange::ProgressUpdated { .. } => None,
        StateChange::LogAppended { entry } => Some(format!("  {}", entry)),
        StateChange::PauseToggled { .. } => None,
        StateChange::RunFinished {
            status,
            processed,
            failed,
        } => Some(format!(
            "Run {}: {} processed, {} failed",
            status.to_string().to_lowercase(),
            processed,
            failed
        )),
        StateChange::StateReset => Some("State reset".to_string()),
    }
}

/// Spawn a thread that prints state changes until the run finishes
///
/// # Returns
/// The listener's join handle
pub fn spawn_event_printer(state: &StateManager) -> std::io::Result<JoinHandle<()>> {
    let rx = state.subscribe();
    thread::Builder::new()
        .name("autotest-console".to_string())
        .spawn(move || print_events(rx))
}

fn print_events(mut rx: Receiver<StateChange>) {
    loop {
        match rx.blocking_recv() {
            Ok(change) => {
                if let Some(line) = format_event(&change) {
                    println!("{}", line);
                }
                if matches!(change, StateChange::RunFinished { .. }) {
                    break;
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!("Console listener lagged, skipped {} events", skipped);
            }
            Err(RecvError::Closed) => break,
        }
    }
}

/// Apply a command to the controller and describe the result
pub fn dispatch(controller: &RunController, command: ConsoleCommand) -> &'static str {
    match command {
        ConsoleCommand::TogglePause => match controller.toggle_pause() {
            Some(true) => "Pause requested (the current module keeps running)",
            Some(false) => "Resumed",
            None => "No run in progress",
        },
        ConsoleCommand::Cancel => {
            if controller.request_cancel() {
                "Stopping after the current module"
            } else {
                "Nothing to cancel"
            }
        }
    }
}

/// Read commands from `input` until EOF or the run leaves `Running`
pub async fn read_commands<R>(controller: &RunController, input: R) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        if !controller.is_running() {
            break;
        }
        match ConsoleCommand::parse(&line) {
            Some(command) => println!("{}", dispatch(controller, command)),
            None if line.trim().is_empty() => {}
            None => println!("Unknown command '{}' (p = pause/resume, c = cancel)", line.trim()),
        }
    }
    Ok(())
}

/// Exit code for a finished run: 0 only when every selected module passed
pub fn exit_code(status: RunStatus, failed: usize) -> u8 {
    match (status, failed) {
        (RunStatus::Completed, 0) => 0,
        (RunStatus::Cancelled, _) => 2,
        _ => 1,
    }
}
