// UI module - terminal interaction
//
// This module contains:
// - Operator: confirmation prompts, transient status lines and "press enter" waits
// - Settings summary rendered before packing starts

pub mod console;
pub mod summary;

pub use console::{ConsoleOperator, Operator};
pub use summary::{log_project_summary, render_project_summary};
