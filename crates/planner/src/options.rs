//! Planner configuration (§6, recognised-options subset relevant to planning).

use std::collections::HashMap;

/// Options the Update Planner consults (§4.E, §6).
#[derive(Debug, Clone, Default)]
pub struct PlannerOptions {
    /// Module name → chosen alternative key. Required for every
    /// `alternatives` module in the distribution.
    pub module_alternatives_map: HashMap<String, String>,
    /// Append a random cache-busting query parameter when fetching
    /// `modules.json`.
    pub force_manifest_cache_bust: bool,
    /// `(0,1]`; upgrade to a full redownload when
    /// `|added ∪ updated| / max(1, |existing.modules|)` exceeds this.
    pub force_full_install_ratio: Option<f64>,
}

impl PlannerOptions {
    #[must_use]
    pub fn selected_key_for(&self, module_name: &str) -> Option<&str> {
        self.module_alternatives_map
            .get(module_name)
            .map(String::as_str)
    }
}
