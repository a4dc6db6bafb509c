//! Installer configuration (§6 recognised options).

use std::collections::HashMap;
use std::path::PathBuf;

/// Default cap on per-module retry attempts (§4.F, §6).
pub const DEFAULT_MAX_MODULE_RETRIES: u32 = 5;

/// Options the Install Orchestrator consults. Builder-style so defaults
/// only need to be named at the call sites that override them, mirroring
/// the teacher's configuration layer.
#[derive(Debug, Clone)]
pub struct InstallConfig {
    pub temporary_directory: Option<PathBuf>,
    pub max_module_retries: u32,
    pub force_fresh_install: bool,
    pub force_cache_bust: bool,
    pub force_manifest_cache_bust: bool,
    pub disable_fallback_to_full: bool,
    pub module_alternatives_map: HashMap<String, String>,
    pub force_full_install_ratio: Option<f64>,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            temporary_directory: None,
            max_module_retries: DEFAULT_MAX_MODULE_RETRIES,
            force_fresh_install: false,
            force_cache_bust: false,
            force_manifest_cache_bust: false,
            disable_fallback_to_full: false,
            module_alternatives_map: HashMap::new(),
            force_full_install_ratio: None,
        }
    }
}

impl InstallConfig {
    #[must_use]
    pub fn with_temporary_directory(mut self, dir: PathBuf) -> Self {
        self.temporary_directory = Some(dir);
        self
    }

    #[must_use]
    pub fn with_max_module_retries(mut self, retries: u32) -> Self {
        self.max_module_retries = retries;
        self
    }

    #[must_use]
    pub fn with_force_fresh_install(mut self, value: bool) -> Self {
        self.force_fresh_install = value;
        self
    }

    #[must_use]
    pub fn with_force_cache_bust(mut self, value: bool) -> Self {
        self.force_cache_bust = value;
        self
    }

    #[must_use]
    pub fn with_force_manifest_cache_bust(mut self, value: bool) -> Self {
        self.force_manifest_cache_bust = value;
        self
    }

    #[must_use]
    pub fn with_disable_fallback_to_full(mut self, value: bool) -> Self {
        self.disable_fallback_to_full = value;
        self
    }

    #[must_use]
    pub fn with_alternative(mut self, module_name: impl Into<String>, key: impl Into<String>) -> Self {
        self.module_alternatives_map.insert(module_name.into(), key.into());
        self
    }

    #[must_use]
    pub fn with_force_full_install_ratio(mut self, ratio: f64) -> Self {
        self.force_full_install_ratio = Some(ratio);
        self
    }
}
