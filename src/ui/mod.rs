// UI module - Console front end
//
// This module contains:
// - Event printer: renders StateChange events from the StateManager
// - Command reader: maps stdin lines to pause/cancel requests on the RunController

pub mod console;

pub use console::{ConsoleCommand, dispatch, exit_code, format_event, read_commands, spawn_event_printer};
