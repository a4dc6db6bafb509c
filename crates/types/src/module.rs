//! Module kinds: simple vs. alternatives (§3 Data Model, §9 Design Note).
//!
//! Design Note: the source's tagged union via string discriminant is
//! modelled here as a genuine sum type with exhaustive matching; nothing
//! outside this module inspects a `kind` string.

use fragmenter_errors::FragmenterError;
use serde::{Deserialize, Serialize};

/// One downloadable fragment for a module or one of its alternatives.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DistributionModuleFile {
    pub key: String,
    /// Relative URL under the distribution's base URL (§6).
    pub path: String,
    pub hash: String,
    #[serde(default = "default_compression")]
    pub compression: String,
    pub split_file_count: u32,
    pub complete_file_size: u64,
    pub complete_file_size_uncompressed: u64,
}

fn default_compression() -> String {
    "zip".to_string()
}

/// A module as it appears in a [`super::DistributionManifest`] (§3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DistributedModule {
    Simple {
        name: String,
        dest_dir: String,
        download_file: DistributionModuleFile,
    },
    Alternatives {
        name: String,
        dest_dir: String,
        alternatives: Vec<DistributionModuleFile>,
    },
}

impl DistributedModule {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Simple { name, .. } | Self::Alternatives { name, .. } => name,
        }
    }

    #[must_use]
    pub fn dest_dir(&self) -> &str {
        match self {
            Self::Simple { dest_dir, .. } | Self::Alternatives { dest_dir, .. } => dest_dir,
        }
    }

    /// Resolve the file to fetch for this module given a caller-selected
    /// alternative key (§4.C Selection rule, §3 invariant).
    ///
    /// # Errors
    /// `InvalidOptions` if an alternatives module has no key selected or
    /// the selected key doesn't name one of its alternatives.
    pub fn resolve(&self, selected_key: Option<&str>) -> Result<&DistributionModuleFile, FragmenterError> {
        match self {
            Self::Simple { download_file, .. } => Ok(download_file),
            Self::Alternatives {
                name, alternatives, ..
            } => {
                let key = selected_key.ok_or_else(|| {
                    FragmenterError::invalid_options(format!(
                        "module {name} is an alternatives module but no alternative key was supplied"
                    ))
                })?;
                alternatives.iter().find(|f| f.key == key).ok_or_else(|| {
                    FragmenterError::invalid_options(format!(
                        "module {name} has no alternative with key {key}"
                    ))
                })
            }
        }
    }

    /// The installed alternative key to record for this module, or `None`
    /// for a simple module.
    #[must_use]
    pub fn alternative_key(&self, selected_key: Option<&str>) -> Option<String> {
        match self {
            Self::Simple { .. } => None,
            Self::Alternatives { .. } => selected_key.map(str::to_string),
        }
    }
}
