#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Wire and in-memory data model for fragmenter (§3).
//!
//! `modules.json` and `install.json` serialise these types exactly, using
//! camelCase field names, UTF-8 text, hex-encoded hash strings, and JSON
//! `null` only for optional absent fields (§6).

mod manifest;
mod module;
mod plan;

pub use manifest::{Base, DistributionManifest, InstallManifest, InstalledModule};
pub use module::{DistributedModule, DistributionModuleFile};
pub use plan::{PlannedUpdate, UpdatePlan};

/// Module names `base` and `full` are reserved (§3 invariants).
pub const RESERVED_NAMES: [&str; 2] = ["base", "full"];
