//! Services module - the packing and publishing pipeline.
//!
//! The services have no dependencies on the terminal layer beyond the [`Operator`](crate::ui::Operator)
//! trait, so each one can be driven from tests with fakes.
//!
//! # Components
//!
//! - [`AssetResolver`]: Expands `prefix//internal/path` asset specifications into
//!   [`AssetEntry`] pairs, walking directories and applying the extension whitelist.
//!
//! - [`BspZip`]: The external map archiver behind the [`ArchiveTool`] trait. Handles:
//!   - `-repack` (decompress before injecting, compress afterwards)
//!   - `-addlist` (inject a manifest of assets and write the output map)
//!
//! - [`Packer`]: Runs every enabled map through stage → decompress → inject → compress →
//!   finalize inside one scratch directory, reporting each step in a [`PackReport`].
//!
//! - [`Publisher`]: Pages through the user's workshop catalog, reconciles configured ids
//!   against it and uploads the confirmed maps one at a time with a cooldown in between.
//!   Talks to the workshop through [`WorkshopClient`]; `SteamWorkshop` (feature `steam`)
//!   is the real implementation.
//!
//! # Failure model
//!
//! Every error type here is fatal to the run. The one deliberate exception is a non-zero
//! archiver exit code, which is logged as a warning and packing continues.

pub mod archiver;
pub mod assets;
pub mod packer;
pub mod publisher;
#[cfg(feature = "steam")]
pub mod steam;
pub mod workshop;

pub use archiver::{ArchiveTool, ArchiveToolError, BspZip, ToolStatus};
pub use assets::{AssetEntry, AssetError, AssetResolver, AssetSpec};
pub use packer::{MapReport, PackError, PackReport, PackStep, Packer, write_manifest};
pub use publisher::{
    PublishOutcome, PublishSettings, Publisher, filter_publish_candidates,
};
#[cfg(feature = "steam")]
pub use steam::SteamWorkshop;
pub use workshop::{
    CatalogAccumulator, CatalogPage, Completer, ItemUpdate, Pending, PublishError,
    SubmitOutcome, WorkshopClient, await_completion,
};
