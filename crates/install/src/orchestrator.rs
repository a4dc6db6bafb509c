//! 4.F Install Orchestrator: sequence phases, back up, apply, restore on
//! failure, fall back to a full install, write the new manifest.

use crate::config::InstallConfig;
use fragmenter_errors::{ErrorCode, FragmenterError};
use fragmenter_events::{AppEvent, Phase, SinkHandle};
use fragmenter_fragment::{ModuleDecompressor, ModuleDownloadRequest, ModuleDownloader};
use fragmenter_net::{FileDownloader, NetClient, NetConfig, StreamDownloader};
use fragmenter_planner::{Planner, PlannerOptions};
use fragmenter_types::{
    DistributedModule, DistributionManifest, DistributionModuleFile, InstallManifest,
    InstalledModule, UpdatePlan,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Result of a completed public `install()` call.
pub struct InstallOutcome {
    pub changed: bool,
    pub manifest: InstallManifest,
}

/// Drives one installation run against `dest_dir` from `base_url` (§4.F).
/// Owned for the duration of a single run; concurrent runs against the
/// same `dest_dir` are undefined (§5).
pub struct Installer {
    base_url: String,
    dest_dir: PathBuf,
    config: InstallConfig,
    sink: SinkHandle,
    cancel: CancellationToken,
    net_client: NetClient,
}

impl Installer {
    /// # Errors
    /// Returns an error if the underlying HTTP client fails to build.
    pub fn new(
        base_url: impl Into<String>,
        dest_dir: impl Into<PathBuf>,
        config: InstallConfig,
        sink: SinkHandle,
        cancel: CancellationToken,
    ) -> Result<Self, FragmenterError> {
        Ok(Self {
            base_url: base_url.into(),
            dest_dir: dest_dir.into(),
            config,
            sink,
            cancel,
            net_client: NetClient::new(NetConfig::default())?,
        })
    }

    /// Run the full update-check → install → finish pipeline (§4.F).
    ///
    /// # Errors
    /// Propagates whatever the planner, fragment pipeline, or filesystem
    /// layer raises after restore has been attempted.
    pub async fn install(&self) -> Result<InstallOutcome, FragmenterError> {
        self.emit_phase(Phase::UpdateCheck, None, None);

        let planner = Planner::new(self.net_client.clone());
        let planner_options = PlannerOptions {
            module_alternatives_map: self.config.module_alternatives_map.clone(),
            force_manifest_cache_bust: self.config.force_manifest_cache_bust,
            force_full_install_ratio: self.config.force_full_install_ratio,
        };
        let plan = planner
            .plan(&self.base_url, &self.dest_dir, &planner_options)
            .await?;

        if !plan.needs_update {
            let existing = plan.existing.clone().ok_or_else(|| {
                FragmenterError::new(ErrorCode::Unknown, "no-op plan has no existing manifest")
            })?;
            return Ok(InstallOutcome {
                changed: false,
                manifest: existing,
            });
        }

        self.emit_phase(Phase::InstallBegin, None, None);

        let full_install = plan.is_fresh_install
            || self.config.force_fresh_install
            || plan.will_fully_redownload
            || plan.existing.as_ref().is_some_and(|existing| {
                existing.modules.iter().all(|m| {
                    plan.removed.iter().any(|r| r.name == m.name)
                        || plan.updated.iter().any(|u| u.previous.name == m.name)
                })
            });

        let temp_dir =
            fragmenter_platform::unique_temp_dir(self.config.temporary_directory.as_deref())
                .await?;

        let outcome = self.run(&plan, full_install, &temp_dir).await;

        match outcome {
            Ok(manifest) => {
                let _ = fragmenter_platform::remove_tree(&temp_dir).await;
                self.emit_phase(Phase::Done, None, None);
                Ok(InstallOutcome {
                    changed: true,
                    manifest,
                })
            }
            Err(e) => {
                let restore_dir = temp_dir.join("restore");
                if tokio::fs::try_exists(&restore_dir).await.unwrap_or(false) {
                    self.emit_phase(Phase::InstallFailRestore, None, None);
                    if let Err(restore_err) = self.restore(&restore_dir).await {
                        self.sink.on_event(AppEvent::Error {
                            message: restore_err.to_string(),
                        });
                    }
                }
                let _ = fragmenter_platform::remove_tree(&temp_dir).await;
                self.sink.on_event(AppEvent::Error {
                    message: e.to_string(),
                });
                if e.code == ErrorCode::UserAborted {
                    self.sink.on_event(AppEvent::Cancelled);
                }
                self.emit_phase(Phase::Done, None, None);
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        plan: &UpdatePlan,
        full_install: bool,
        temp_dir: &Path,
    ) -> Result<InstallManifest, FragmenterError> {
        self.sink.on_event(AppEvent::BackupStarted);
        fragmenter_platform::move_tree_contents(&self.dest_dir, &temp_dir.join("restore")).await?;
        self.sink.on_event(AppEvent::BackupFinished);

        let result = if full_install {
            self.apply_full_install(plan, temp_dir).await
        } else {
            self.apply_modular_update(plan, temp_dir).await
        };

        let (result, actually_full) = match result {
            Err(e)
                if e.code == ErrorCode::MaxModuleRetries
                    && !full_install
                    && !self.config.disable_fallback_to_full =>
            {
                (self.apply_full_install(plan, temp_dir).await, true)
            }
            other => (other, full_install),
        };
        result?;

        self.emit_phase(Phase::InstallFinish, None, None);
        let manifest = self.build_final_manifest(plan, actually_full)?;
        let manifest_path = self.dest_dir.join("install.json");
        let json = serde_json::to_vec_pretty(&manifest)
            .map_err(|e| FragmenterError::new(ErrorCode::Unknown, e.to_string()))?;
        tokio::fs::write(&manifest_path, json)
            .await
            .map_err(|e| fragmenter_errors::io_error_with_path(&e, &manifest_path))?;
        Ok(manifest)
    }

    async fn restore(&self, restore_dir: &Path) -> Result<(), FragmenterError> {
        fragmenter_platform::empty_dir(&self.dest_dir).await?;
        fragmenter_platform::move_tree_contents(restore_dir, &self.dest_dir).await
    }

    async fn apply_full_install(
        &self,
        plan: &UpdatePlan,
        temp_dir: &Path,
    ) -> Result<(), FragmenterError> {
        fragmenter_platform::empty_dir(&self.dest_dir).await?;
        let full_module = full_fragment_module(&plan.distribution);
        self.install_module_into(
            &full_module,
            None,
            None,
            temp_dir,
            &plan.distribution.full_hash,
            &self.dest_dir,
        )
        .await
    }

    async fn apply_modular_update(
        &self,
        plan: &UpdatePlan,
        temp_dir: &Path,
    ) -> Result<(), FragmenterError> {
        let restore_dir = temp_dir.join("restore");

        if plan.base_changed {
            if let Some(existing) = &plan.existing {
                for rel in &existing.base.files {
                    fragmenter_platform::remove_tree(&self.dest_dir.join(rel)).await?;
                }
            }
            let base_module = base_fragment_module(&plan.distribution);
            let extract_dir = self
                .download_decompress_retry(
                    &base_module,
                    None,
                    None,
                    temp_dir,
                    &plan.distribution.full_hash,
                )
                .await?;
            fragmenter_platform::move_listed_files(
                &plan.distribution.base.files,
                &extract_dir,
                &self.dest_dir,
            )
            .await?;
        } else if let Some(existing) = &plan.existing {
            fragmenter_platform::move_listed_files(
                &existing.base.files,
                &restore_dir,
                &self.dest_dir,
            )
            .await?;
        }

        for removed in &plan.removed {
            fragmenter_platform::remove_tree(&self.dest_dir.join(&removed.dest_dir)).await?;
        }
        for updated in &plan.updated {
            fragmenter_platform::remove_tree(&self.dest_dir.join(&updated.previous.dest_dir))
                .await?;
        }

        for (index, module) in plan.modules_to_fetch().into_iter().enumerate() {
            let selected_key = self
                .config
                .module_alternatives_map
                .get(module.name())
                .map(String::as_str);
            let dest = self.dest_dir.join(module.dest_dir());
            self.install_module_into(
                module,
                selected_key,
                Some(index),
                temp_dir,
                &plan.distribution.full_hash,
                &dest,
            )
            .await?;
        }

        for unchanged in &plan.unchanged {
            let dest = self.dest_dir.join(&unchanged.dest_dir);
            let src = restore_dir.join(&unchanged.dest_dir);
            if tokio::fs::try_exists(&src).await.unwrap_or(false) {
                fragmenter_platform::remove_tree(&dest).await?;
                fragmenter_platform::move_entry(&src, &dest).await?;
            }
        }

        Ok(())
    }

    /// Download, decompress, and move one resolved fragment's contents
    /// into `dest`, retrying up to `maxModuleRetries` times (§4.F).
    async fn install_module_into(
        &self,
        module: &DistributedModule,
        selected_key: Option<&str>,
        module_index: Option<usize>,
        temp_dir: &Path,
        full_hash: &str,
        dest: &Path,
    ) -> Result<(), FragmenterError> {
        let extract_dir = self
            .download_decompress_retry(module, selected_key, module_index, temp_dir, full_hash)
            .await?;

        let module_name = module.name().to_string();
        fragmenter_platform::remove_tree(dest).await?;
        let total = fragmenter_platform::count_files(&extract_dir).await?;
        self.sink.on_event(AppEvent::CopyStarted {
            module: module_name.clone(),
            total,
        });
        let sink = self.sink.clone();
        let module_for_progress = module_name.clone();
        fragmenter_platform::move_tree_with_progress(&extract_dir, dest, move |moved, _| {
            sink.on_event(AppEvent::CopyProgress {
                module: module_for_progress.clone(),
                moved,
                total,
            });
        })
        .await?;
        self.sink
            .on_event(AppEvent::CopyFinished { module: module_name });
        Ok(())
    }

    /// Download the fragment and decompress it, retrying the whole
    /// attempt up to `maxModuleRetries` times with `2^retryCount` backoff
    /// (§4.F per-module retry).
    async fn download_decompress_retry(
        &self,
        module: &DistributedModule,
        selected_key: Option<&str>,
        module_index: Option<usize>,
        temp_dir: &Path,
        full_hash: &str,
    ) -> Result<PathBuf, FragmenterError> {
        let module_name = module.name().to_string();
        let mut retry_count = 0u32;

        loop {
            if self.cancel.is_cancelled() {
                return Err(FragmenterError::user_aborted());
            }
            self.emit_phase(
                Phase::InstallModuleDownload,
                Some(module_name.clone()),
                module_index,
            );

            match self
                .download_and_decompress(module, selected_key, retry_count, temp_dir, full_hash)
                .await
            {
                Ok(dir) => {
                    self.emit_phase(
                        Phase::InstallModuleDecompress,
                        Some(module_name.clone()),
                        module_index,
                    );
                    return Ok(dir);
                }
                Err(e) if e.code == ErrorCode::UserAborted || e.is_unrecoverable() => {
                    return Err(e);
                }
                Err(e) => {
                    self.sink.on_event(AppEvent::Error {
                        message: e.to_string(),
                    });
                    retry_count += 1;
                    if retry_count > self.config.max_module_retries {
                        return Err(FragmenterError::max_module_retries(
                            &module_name,
                            retry_count - 1,
                        ));
                    }
                    let wait = 2u64.saturating_pow(retry_count);
                    self.sink.on_event(AppEvent::RetryScheduled {
                        module: module_name.clone(),
                        retry_count,
                        wait_seconds: wait,
                    });
                    tokio::select! {
                        biased;
                        () = self.cancel.cancelled() => return Err(FragmenterError::user_aborted()),
                        () = tokio::time::sleep(Duration::from_secs(wait)) => {}
                    }
                    self.sink.on_event(AppEvent::RetryStarted {
                        module: module_name.clone(),
                        retry_count,
                    });
                }
            }
        }
    }

    async fn download_and_decompress(
        &self,
        module: &DistributedModule,
        selected_key: Option<&str>,
        retry_count: u32,
        temp_dir: &Path,
        full_hash: &str,
    ) -> Result<PathBuf, FragmenterError> {
        let file = module.resolve(selected_key)?;
        let zip_dir = temp_dir.join("zips");
        tokio::fs::create_dir_all(&zip_dir)
            .await
            .map_err(|e| fragmenter_errors::io_error_with_path(&e, &zip_dir))?;

        let downloader = ModuleDownloader::new(FileDownloader::new(StreamDownloader::new(
            self.net_client.clone(),
        )));
        let request = ModuleDownloadRequest {
            base_url: &self.base_url,
            module,
            selected_alternative_key: selected_key,
            full_hash,
            dest_dir: &zip_dir,
            retry_count,
            force_cache_bust: self.config.force_cache_bust,
        };
        let zip_path = downloader.download(&request, &self.sink, &self.cancel).await?;

        let extract_dir = temp_dir.join("extract").join(module.name());
        ModuleDecompressor::extract(&zip_path, &extract_dir, &file.hash, module.name(), &self.sink)
            .await?;
        Ok(extract_dir)
    }

    fn build_final_manifest(
        &self,
        plan: &UpdatePlan,
        full_install: bool,
    ) -> Result<InstallManifest, FragmenterError> {
        let modules = if full_install {
            plan.distribution
                .modules
                .iter()
                .map(|m| {
                    installed_module_from(
                        m,
                        self.config.module_alternatives_map.get(m.name()).map(String::as_str),
                    )
                })
                .collect::<Result<Vec<_>, _>>()?
        } else {
            let mut modules = plan.unchanged.clone();
            for (module, key) in &plan.added {
                modules.push(installed_module_from(module, key.as_deref())?);
            }
            for updated in &plan.updated {
                modules.push(installed_module_from(
                    &updated.module,
                    updated.selected_alternative_key.as_deref(),
                )?);
            }
            modules
        };

        Ok(InstallManifest {
            version: plan.distribution.version.clone(),
            modules,
            base: plan.distribution.base.clone(),
            full_hash: plan.distribution.full_hash.clone(),
            full_split_file_count: plan.distribution.full_split_file_count,
            full_complete_file_size: plan.distribution.full_complete_file_size,
            full_complete_file_size_uncompressed: plan.distribution.full_complete_file_size_uncompressed,
            source: self.base_url.clone(),
        })
    }

    fn emit_phase(&self, phase: Phase, module: Option<String>, module_index: Option<usize>) {
        self.sink.on_event(AppEvent::PhaseChanged {
            phase,
            module,
            module_index,
        });
    }
}

fn installed_module_from(
    module: &DistributedModule,
    selected_key: Option<&str>,
) -> Result<InstalledModule, FragmenterError> {
    let file = module.resolve(selected_key)?;
    Ok(InstalledModule {
        name: module.name().to_string(),
        dest_dir: module.dest_dir().to_string(),
        installed_alternative_key: module.alternative_key(selected_key),
        hash: file.hash.clone(),
        split_file_count: file.split_file_count,
        complete_file_size: file.complete_file_size,
        complete_file_size_uncompressed: file.complete_file_size_uncompressed,
    })
}

/// Synthesize a `Simple` module wrapping the full fragment so the same
/// Module Downloader/Decompressor machinery handles it (§6 on-server
/// layout names it `full.zip`; `full`/`base` are reserved module names
/// for exactly this reason).
fn full_fragment_module(distribution: &DistributionManifest) -> DistributedModule {
    DistributedModule::Simple {
        name: "full".to_string(),
        dest_dir: String::new(),
        download_file: DistributionModuleFile {
            key: "full".to_string(),
            path: "full.zip".to_string(),
            hash: distribution.full_hash.clone(),
            compression: "zip".to_string(),
            split_file_count: distribution.full_split_file_count,
            complete_file_size: distribution.full_complete_file_size,
            complete_file_size_uncompressed: distribution.full_complete_file_size_uncompressed,
        },
    }
}

fn base_fragment_module(distribution: &DistributionManifest) -> DistributedModule {
    DistributedModule::Simple {
        name: "base".to_string(),
        dest_dir: String::new(),
        download_file: DistributionModuleFile {
            key: "base".to_string(),
            path: "base.zip".to_string(),
            hash: distribution.base.hash.clone(),
            compression: "zip".to_string(),
            split_file_count: distribution.base.split_file_count,
            complete_file_size: distribution.base.complete_file_size,
            complete_file_size_uncompressed: distribution.base.complete_file_size_uncompressed,
        },
    }
}
