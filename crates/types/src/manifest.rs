//! Distribution and install manifests (§3, §6).

use crate::module::DistributedModule;
use crate::RESERVED_NAMES;
use fragmenter_errors::FragmenterError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// The files left at the install destination after every module directory
/// is carved out, and the fragment containing them (§3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Base {
    pub hash: String,
    pub files: Vec<String>,
    pub split_file_count: u32,
    pub complete_file_size: u64,
    pub complete_file_size_uncompressed: u64,
}

/// The server-side description of the currently available package state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DistributionManifest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub modules: Vec<DistributedModule>,
    pub base: Base,
    pub full_hash: String,
    pub full_split_file_count: u32,
    pub full_complete_file_size: u64,
    pub full_complete_file_size_uncompressed: u64,
}

impl DistributionManifest {
    /// Enforce the §3 uniqueness/reserved-name invariants.
    ///
    /// # Errors
    /// `InvalidDistributionManifest` if a module name repeats (case
    /// sensitive) or uses a reserved name (`base`, `full`).
    pub fn validate(&self) -> Result<(), FragmenterError> {
        let mut seen = HashSet::new();
        for module in &self.modules {
            let name = module.name();
            if RESERVED_NAMES.contains(&name) {
                return Err(FragmenterError::invalid_manifest(format!(
                    "module name {name} is reserved"
                )));
            }
            if !seen.insert(name) {
                return Err(FragmenterError::invalid_manifest(format!(
                    "duplicate module name {name}"
                )));
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn module(&self, name: &str) -> Option<&DistributedModule> {
        self.modules.iter().find(|m| m.name() == name)
    }
}

/// A module entry recorded in an [`InstallManifest`]; the alternatives
/// shape has collapsed to the single key that is actually on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InstalledModule {
    pub name: String,
    pub dest_dir: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub installed_alternative_key: Option<String>,
    /// Verified hash of the fragment that produced this module (§3).
    pub hash: String,
    pub split_file_count: u32,
    pub complete_file_size: u64,
    pub complete_file_size_uncompressed: u64,
}

/// The client-side record of what is currently installed, including the
/// source URL it was installed from (§3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InstallManifest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub modules: Vec<InstalledModule>,
    pub base: Base,
    pub full_hash: String,
    pub full_split_file_count: u32,
    pub full_complete_file_size: u64,
    pub full_complete_file_size_uncompressed: u64,
    pub source: String,
}

impl InstallManifest {
    #[must_use]
    pub fn module(&self, name: &str) -> Option<&InstalledModule> {
        self.modules.iter().find(|m| m.name == name)
    }
}
