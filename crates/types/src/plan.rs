//! The update planner's output (§3 `UpdatePlan`, §8 partition property).

use crate::manifest::{DistributionManifest, InstallManifest, InstalledModule};
use crate::module::DistributedModule;

/// A module present in both manifests whose resolved fragment differs
/// (chosen alternative key, or hash) from what is installed (§4.E step 6).
#[derive(Debug, Clone)]
pub struct PlannedUpdate {
    pub module: DistributedModule,
    pub previous: InstalledModule,
    pub selected_alternative_key: Option<String>,
}

/// The diff of installed vs. distributed modules, and the derived install
/// strategy (§3, §4.E).
#[derive(Debug, Clone)]
pub struct UpdatePlan {
    pub needs_update: bool,
    pub is_fresh_install: bool,
    pub base_changed: bool,
    pub will_fully_redownload: bool,
    pub added: Vec<(DistributedModule, Option<String>)>,
    pub removed: Vec<InstalledModule>,
    pub updated: Vec<PlannedUpdate>,
    pub unchanged: Vec<InstalledModule>,
    pub download_size: Option<u64>,
    pub required_disk_space: Option<u64>,
    pub distribution: DistributionManifest,
    pub existing: Option<InstallManifest>,
}

impl UpdatePlan {
    /// Every distinct module name touched by this plan's added/updated sets,
    /// in distribution order — the set the orchestrator downloads (§4.F).
    #[must_use]
    pub fn modules_to_fetch(&self) -> Vec<&DistributedModule> {
        self.distribution
            .modules
            .iter()
            .filter(|m| {
                self.added.iter().any(|(am, _)| am.name() == m.name())
                    || self.updated.iter().any(|u| u.module.name() == m.name())
            })
            .collect()
    }
}
