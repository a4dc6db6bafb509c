//! 4.E Update Planner — diff distribution vs. install manifests.

use crate::options::PlannerOptions;
use fragmenter_errors::FragmenterError;
use fragmenter_net::NetClient;
use fragmenter_types::{DistributionManifest, InstallManifest, PlannedUpdate, UpdatePlan};
use rand::Rng;
use std::collections::HashSet;
use std::path::Path;

pub struct Planner {
    client: NetClient,
}

impl Planner {
    #[must_use]
    pub fn new(client: NetClient) -> Self {
        Self { client }
    }

    /// Produce an [`UpdatePlan`] for `dest_dir` against `base_url` (§4.E).
    ///
    /// # Errors
    /// `NetworkError` if `modules.json` cannot be fetched; `InvalidDistributionManifest`
    /// if it fails §3's name invariants; `InvalidOptions` if an alternatives
    /// module has no selected key in `options.module_alternatives_map`.
    pub async fn plan(
        &self,
        base_url: &str,
        dest_dir: &Path,
        options: &PlannerOptions,
    ) -> Result<UpdatePlan, FragmenterError> {
        let distribution = self.fetch_manifest(base_url, options).await?;
        distribution.validate()?;

        let install_json = dest_dir.join("install.json");
        let existing = read_install_manifest(&install_json).await?;

        let Some(existing) = existing else {
            return Ok(fresh_install_plan(distribution, options)?);
        };

        build_plan(distribution, existing, options)
    }

    async fn fetch_manifest(
        &self,
        base_url: &str,
        options: &PlannerOptions,
    ) -> Result<DistributionManifest, FragmenterError> {
        let mut url = format!("{}/modules.json", base_url.trim_end_matches('/'));
        if options.force_manifest_cache_bust {
            let token: u64 = rand::rng().random();
            url.push_str(&format!("?cache={token:x}"));
        }
        let response = self.client.get(&url, 0).await?;
        if !response.status().is_success() {
            return Err(FragmenterError::new(
                fragmenter_errors::ErrorCode::NetworkError,
                format!("HTTP {} fetching {url}", response.status()),
            ));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| fragmenter_errors::Classifier::classify_reqwest(&e))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| FragmenterError::invalid_manifest(format!("malformed modules.json: {e}")))
    }
}

async fn read_install_manifest(path: &Path) -> Result<Option<InstallManifest>, FragmenterError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => {
            let manifest: InstallManifest = serde_json::from_slice(&bytes).map_err(|e| {
                FragmenterError::invalid_manifest(format!("malformed install.json: {e}"))
            })?;
            Ok(Some(manifest))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(fragmenter_errors::io_error_with_path(&e, path)),
    }
}

fn fresh_install_plan(
    distribution: DistributionManifest,
    options: &PlannerOptions,
) -> Result<UpdatePlan, FragmenterError> {
    let mut added = Vec::with_capacity(distribution.modules.len());
    for module in &distribution.modules {
        let key = options.selected_key_for(module.name());
        module.resolve(key)?;
        added.push((module.clone(), key.map(str::to_string)));
    }

    Ok(UpdatePlan {
        needs_update: true,
        is_fresh_install: true,
        base_changed: true,
        will_fully_redownload: false,
        added,
        removed: Vec::new(),
        updated: Vec::new(),
        unchanged: Vec::new(),
        download_size: Some(distribution.full_complete_file_size),
        required_disk_space: Some(distribution.full_complete_file_size_uncompressed),
        distribution,
        existing: None,
    })
}

fn build_plan(
    distribution: DistributionManifest,
    existing: InstallManifest,
    options: &PlannerOptions,
) -> Result<UpdatePlan, FragmenterError> {
    let base_changed = existing.base.hash != distribution.base.hash;

    let distributed_names: HashSet<&str> =
        distribution.modules.iter().map(|m| m.name()).collect();
    let existing_names: HashSet<&str> = existing.modules.iter().map(|m| m.name.as_str()).collect();

    let mut added = Vec::new();
    let mut removed = Vec::new();
    let mut updated = Vec::new();
    let mut unchanged = Vec::new();

    for module in &distribution.modules {
        let name = module.name();
        if !existing_names.contains(name) {
            let key = options.selected_key_for(name);
            module.resolve(key)?;
            added.push((module.clone(), key.map(str::to_string)));
        }
    }

    for installed in &existing.modules {
        if !distributed_names.contains(installed.name.as_str()) {
            removed.push(installed.clone());
        }
    }

    for module in &distribution.modules {
        let name = module.name();
        let Some(installed) = existing.modules.iter().find(|m| m.name == name) else {
            continue;
        };
        let selected_key = options.selected_key_for(name);
        let resolved = module.resolve(selected_key)?;

        let key_differs = module.alternative_key(selected_key) != installed.installed_alternative_key;
        let hash_differs = resolved.hash != installed.hash;

        if key_differs || hash_differs {
            updated.push(PlannedUpdate {
                module: module.clone(),
                previous: installed.clone(),
                selected_alternative_key: selected_key.map(str::to_string),
            });
        } else {
            unchanged.push(installed.clone());
        }
    }

    let needs_update = base_changed || !added.is_empty() || !removed.is_empty() || !updated.is_empty();

    let mut download_size = Some(
        added
            .iter()
            .map(|(m, key)| m.resolve(key.as_deref()).map(|f| f.complete_file_size))
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .sum::<u64>()
            + updated
                .iter()
                .map(|u| {
                    u.module
                        .resolve(u.selected_alternative_key.as_deref())
                        .map(|f| f.complete_file_size)
                })
                .collect::<Result<Vec<_>, _>>()?
                .into_iter()
                .sum::<u64>(),
    );
    let mut required_disk_space = Some(
        added
            .iter()
            .map(|(m, key)| {
                m.resolve(key.as_deref())
                    .map(|f| f.complete_file_size_uncompressed)
            })
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .sum::<u64>()
            + updated
                .iter()
                .map(|u| {
                    u.module
                        .resolve(u.selected_alternative_key.as_deref())
                        .map(|f| f.complete_file_size_uncompressed)
                })
                .collect::<Result<Vec<_>, _>>()?
                .into_iter()
                .sum::<u64>(),
    );

    let mut will_fully_redownload = false;
    if let Some(ratio) = options.force_full_install_ratio {
        let touched = added.len() + updated.len();
        let denom = existing.modules.len().max(1);
        #[allow(clippy::cast_precision_loss)]
        if (touched as f64 / denom as f64) > ratio {
            will_fully_redownload = true;
            download_size = Some(distribution.full_complete_file_size);
            required_disk_space = Some(distribution.full_complete_file_size_uncompressed);
        }
    }

    Ok(UpdatePlan {
        needs_update,
        is_fresh_install: false,
        base_changed,
        will_fully_redownload,
        added,
        removed,
        updated,
        unchanged,
        download_size,
        required_disk_space,
        distribution,
        existing: Some(existing),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use fragmenter_types::{Base, DistributedModule, DistributionModuleFile, InstalledModule};

    fn base(hash: &str) -> Base {
        Base {
            hash: hash.to_string(),
            files: vec!["readme.txt".into()],
            split_file_count: 1,
            complete_file_size: 1,
            complete_file_size_uncompressed: 1,
        }
    }

    fn simple(name: &str, hash: &str) -> DistributedModule {
        DistributedModule::Simple {
            name: name.to_string(),
            dest_dir: name.to_string(),
            download_file: DistributionModuleFile {
                key: name.to_string(),
                path: format!("{name}.zip"),
                hash: hash.to_string(),
                compression: "zip".into(),
                split_file_count: 1,
                complete_file_size: 10,
                complete_file_size_uncompressed: 20,
            },
        }
    }

    fn installed(name: &str, hash: &str) -> InstalledModule {
        InstalledModule {
            name: name.to_string(),
            dest_dir: name.to_string(),
            installed_alternative_key: None,
            hash: hash.to_string(),
            split_file_count: 1,
            complete_file_size: 10,
            complete_file_size_uncompressed: 20,
        }
    }

    fn distribution(modules: Vec<DistributedModule>, base_hash: &str) -> DistributionManifest {
        DistributionManifest {
            version: None,
            modules,
            base: base(base_hash),
            full_hash: "full".into(),
            full_split_file_count: 1,
            full_complete_file_size: 100,
            full_complete_file_size_uncompressed: 200,
        }
    }

    #[test]
    fn classifies_added_removed_updated_unchanged() {
        let dist = distribution(
            vec![simple("a", "h1"), simple("b", "h2-new")],
            "base-same",
        );
        let existing = InstallManifest {
            version: None,
            modules: vec![installed("a", "h1"), installed("b", "h2-old"), installed("c", "h3")],
            base: base("base-same"),
            full_hash: "full".into(),
            full_split_file_count: 1,
            full_complete_file_size: 100,
            full_complete_file_size_uncompressed: 200,
            source: "https://example.com".into(),
        };

        let plan = build_plan(dist, existing, &PlannerOptions::default()).unwrap();
        assert!(plan.added.is_empty());
        assert_eq!(plan.removed.len(), 1);
        assert_eq!(plan.removed[0].name, "c");
        assert_eq!(plan.updated.len(), 1);
        assert_eq!(plan.updated[0].module.name(), "b");
        assert_eq!(plan.unchanged.len(), 1);
        assert_eq!(plan.unchanged[0].name, "a");
        assert!(!plan.base_changed);
        assert!(plan.needs_update);
    }

    #[test]
    fn no_op_when_nothing_changed() {
        let dist = distribution(vec![simple("a", "h1")], "base");
        let existing = InstallManifest {
            version: None,
            modules: vec![installed("a", "h1")],
            base: base("base"),
            full_hash: "full".into(),
            full_split_file_count: 1,
            full_complete_file_size: 100,
            full_complete_file_size_uncompressed: 200,
            source: "https://example.com".into(),
        };

        let plan = build_plan(dist, existing, &PlannerOptions::default()).unwrap();
        assert!(!plan.needs_update);
        assert!(plan.updated.is_empty());
        assert!(plan.removed.is_empty());
        assert!(plan.added.is_empty());
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        const NAMES: [&str; 5] = ["a", "b", "c", "d", "e"];

        proptest! {
            /// Every distributed module lands in exactly one of
            /// added/updated/unchanged, and every existing module not in the
            /// distribution lands in removed — the four buckets partition the
            /// union of distributed and installed names (§4.E).
            #[test]
            fn classification_partitions_module_names(
                in_existing in proptest::collection::vec(any::<bool>(), 5),
                in_distribution in proptest::collection::vec(any::<bool>(), 5),
                hash_same in proptest::collection::vec(any::<bool>(), 5),
            ) {
                let dist_modules: Vec<DistributedModule> = NAMES
                    .iter()
                    .zip(&in_distribution)
                    .filter(|(_, present)| **present)
                    .map(|(name, _)| simple(name, "h-new-or-same"))
                    .collect();
                let existing_modules: Vec<InstalledModule> = NAMES
                    .iter()
                    .enumerate()
                    .zip(&in_existing)
                    .filter(|(_, present)| **present)
                    .map(|((i, name), _)| {
                        let hash = if hash_same[i] { "h-new-or-same" } else { "h-old" };
                        installed(name, hash)
                    })
                    .collect();

                let dist = distribution(dist_modules, "base");
                let existing = InstallManifest {
                    version: None,
                    modules: existing_modules,
                    base: base("base"),
                    full_hash: "full".into(),
                    full_split_file_count: 1,
                    full_complete_file_size: 100,
                    full_complete_file_size_uncompressed: 200,
                    source: "https://example.com".into(),
                };

                let plan = build_plan(dist, existing, &PlannerOptions::default()).unwrap();

                for (i, name) in NAMES.iter().enumerate() {
                    let distributed = in_distribution[i];
                    let was_installed = in_existing[i];
                    let same = hash_same[i];

                    let in_added = plan.added.iter().any(|(m, _)| m.name() == *name);
                    let in_updated = plan.updated.iter().any(|u| u.module.name() == *name);
                    let in_unchanged = plan.unchanged.iter().any(|m| m.name == *name);
                    let in_removed = plan.removed.iter().any(|m| m.name == *name);

                    let bucket_count = [in_added, in_updated, in_unchanged, in_removed]
                        .iter()
                        .filter(|b| **b)
                        .count();
                    prop_assert!(bucket_count <= 1, "{name} landed in more than one bucket");

                    match (distributed, was_installed) {
                        (true, false) => prop_assert!(in_added, "{name} should be added"),
                        (true, true) if same => prop_assert!(in_unchanged, "{name} should be unchanged"),
                        (true, true) => prop_assert!(in_updated, "{name} should be updated"),
                        (false, true) => prop_assert!(in_removed, "{name} should be removed"),
                        (false, false) => prop_assert_eq!(bucket_count, 0, "{name} should appear nowhere"),
                    }
                }
            }
        }
    }
}
