// MapPacker - Batch packer and Steam Workshop uploader for Source engine maps
//
// This is the library crate containing the packing/publishing pipeline and its data model.
// The binary crate (main.rs) provides the command-line entry point.

pub mod app;
pub mod config;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod services;
pub mod ui;

// Re-export commonly used types for convenience
pub use app::{PipelineOptions, RunOutcome, run_pipeline};
pub use config::{ConfigError, ConfigManager};
pub use metrics::RunMetrics;
pub use models::{ArchiveSet, MapOptions, Project, Settings};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
