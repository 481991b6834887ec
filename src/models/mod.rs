//! Data models for the map packer.
//!
//! - [`Settings`]: Global settings from the `settings` section of `settings.json`
//! - [`ArchiveSet`]: One archive-set document (`configs/<name>.json`) with its maps and shared assets
//! - [`MapOptions`]: Per-map packing options plus the embedded [`WorkshopOptions`]
//! - [`Project`]: The validated, asset-resolved view of everything a run works from
//!
//! # Lifecycle
//!
//! All of these are built once at startup by [`ConfigManager`](crate::config::ConfigManager)
//! and are read-only afterwards, except [`WorkshopOptions::details`] which the publisher fills
//! in once an id is matched against the remote catalog.

pub mod config;
pub mod project;

pub use config::{
    ARCHIVE_EXTENSION, ArchiveSetDocument, CatalogItem, ExtensionWhitelist, ItemKind, MapOptions,
    Settings, SettingsDocument, Visibility, WorkshopOptions,
};
pub use project::{ArchiveSet, Project};
