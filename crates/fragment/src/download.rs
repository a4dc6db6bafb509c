//! 4.C Module Downloader — select a fragment file, fetch it whole or as
//! ordered split parts, and concatenate into one ZIP.

use crate::url::{build as build_url, part_suffix};
use fragmenter_errors::FragmenterError;
use fragmenter_events::{AppEvent, SinkHandle};
use fragmenter_net::FileDownloader;
use fragmenter_types::DistributedModule;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

/// Everything the Module Downloader needs to fetch one module's fragment.
pub struct ModuleDownloadRequest<'a> {
    pub base_url: &'a str,
    pub module: &'a DistributedModule,
    pub selected_alternative_key: Option<&'a str>,
    pub full_hash: &'a str,
    pub dest_dir: &'a Path,
    pub retry_count: u32,
    pub force_cache_bust: bool,
}

pub struct ModuleDownloader {
    file_downloader: FileDownloader,
}

impl ModuleDownloader {
    #[must_use]
    pub fn new(file_downloader: FileDownloader) -> Self {
        Self { file_downloader }
    }

    /// Fetch `request`'s resolved fragment file into `<destDir>/<name>.zip`,
    /// returning the path to the assembled ZIP.
    ///
    /// # Errors
    /// `InvalidParameters` if an alternatives module has no matching key
    /// (§4.C selection rule); otherwise whatever [`FileDownloader::download`]
    /// raises for the whole file, or for the failing part on a split
    /// download — a merge failure is not retried (§4.C).
    pub async fn download(
        &self,
        request: &ModuleDownloadRequest<'_>,
        sink: &SinkHandle,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, FragmenterError> {
        let file = request.module.resolve(request.selected_alternative_key)?;
        let module_name = request.module.name();
        let zip_path = request.dest_dir.join(format!("{module_name}.zip"));

        sink.on_event(AppEvent::DownloadStarted {
            module: module_name.to_string(),
            url: request.base_url.to_string(),
            total_size: Some(file.complete_file_size),
        });

        if file.split_file_count <= 1 {
            let url = build_url(
                request.base_url,
                &file.path,
                &file.hash,
                request.full_hash,
                request.retry_count,
                request.force_cache_bust,
            );
            let total = file.complete_file_size;
            let module_for_progress = module_name.to_string();
            let sink_for_progress = sink.clone();
            let module_for_interrupt = module_name.to_string();
            let sink_for_interrupt = sink.clone();

            let outcome = self
                .file_downloader
                .download(
                    &url,
                    &zip_path,
                    cancel,
                    move |loaded, known_total| {
                        sink_for_progress.on_event(AppEvent::DownloadProgress {
                            module: module_for_progress.clone(),
                            loaded,
                            total: known_total.or(Some(total)),
                            part_index: Some(1),
                            num_parts: Some(1),
                        });
                    },
                    move |_retry| {
                        sink_for_interrupt.on_event(AppEvent::DownloadInterrupted {
                            module: module_for_interrupt.clone(),
                            user_action: false,
                        });
                    },
                )
                .await?;

            sink.on_event(AppEvent::DownloadFinished {
                module: module_name.to_string(),
                bytes: outcome.bytes_downloaded,
            });
            return Ok(zip_path);
        }

        let num_parts = file.split_file_count;
        let total_size = file.complete_file_size;
        let mut loaded_before_part = 0u64;
        let mut tmp_paths = Vec::with_capacity(num_parts as usize);

        for part_index in 1..=num_parts {
            let part_url = build_url(
                request.base_url,
                &format!("{}{}", file.path, part_suffix(part_index, num_parts)),
                &file.hash,
                request.full_hash,
                request.retry_count,
                request.force_cache_bust,
            );
            let tmp_path = request.dest_dir.join(format!(
                "{module_name}.zip.fg-tmp{}",
                part_suffix(part_index, num_parts).trim_start_matches(".sf-part")
            ));

            let base = loaded_before_part;
            let module_for_progress = module_name.to_string();
            let sink_for_progress = sink.clone();
            let module_for_interrupt = module_name.to_string();
            let sink_for_interrupt = sink.clone();

            let outcome = self
                .file_downloader
                .download(
                    &part_url,
                    &tmp_path,
                    cancel,
                    move |loaded, _known_total| {
                        sink_for_progress.on_event(AppEvent::DownloadProgress {
                            module: module_for_progress.clone(),
                            loaded: base + loaded,
                            total: Some(total_size),
                            part_index: Some(part_index),
                            num_parts: Some(num_parts),
                        });
                    },
                    move |_retry| {
                        sink_for_interrupt.on_event(AppEvent::DownloadInterrupted {
                            module: module_for_interrupt.clone(),
                            user_action: false,
                        });
                    },
                )
                .await?;

            loaded_before_part += outcome.bytes_downloaded;
            tmp_paths.push(tmp_path);
        }

        concatenate_parts(&tmp_paths, &zip_path).await?;

        sink.on_event(AppEvent::DownloadFinished {
            module: module_name.to_string(),
            bytes: loaded_before_part,
        });
        Ok(zip_path)
    }
}

/// Append each part's bytes to `dest` in index order, deleting the part
/// immediately after it is appended (§4.C split path).
async fn concatenate_parts(parts: &[PathBuf], dest: &Path) -> Result<(), FragmenterError> {
    let mut out = tokio::fs::File::create(dest)
        .await
        .map_err(|e| fragmenter_errors::io_error_with_path(&e, dest))?;
    for part in parts {
        let bytes = tokio::fs::read(part)
            .await
            .map_err(|e| fragmenter_errors::io_error_with_path(&e, part))?;
        out.write_all(&bytes)
            .await
            .map_err(|e| fragmenter_errors::io_error_with_path(&e, dest))?;
        tokio::fs::remove_file(part)
            .await
            .map_err(|e| fragmenter_errors::io_error_with_path(&e, part))?;
    }
    out.flush()
        .await
        .map_err(|e| fragmenter_errors::io_error_with_path(&e, dest))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fragmenter_events::NullSink;
    use fragmenter_net::{NetClient, NetConfig, StreamDownloader};
    use fragmenter_types::DistributionModuleFile;
    use httpmock::MockServer;
    use std::sync::Arc;

    fn file(path: &str, hash: &str, split_file_count: u32, size: u64) -> DistributionModuleFile {
        DistributionModuleFile {
            key: "m".to_string(),
            path: path.to_string(),
            hash: hash.to_string(),
            compression: "zip".to_string(),
            split_file_count,
            complete_file_size: size,
            complete_file_size_uncompressed: size,
        }
    }

    fn downloader() -> ModuleDownloader {
        let client = NetClient::new(NetConfig::default()).unwrap();
        ModuleDownloader::new(FileDownloader::new(StreamDownloader::new(client)))
    }

    #[tokio::test]
    async fn downloads_a_single_file_module() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(httpmock::Method::HEAD).path("/m.zip");
            then.status(200)
                .header("accept-ranges", "bytes")
                .header("content-length", "5");
        });
        server.mock(|when, then| {
            when.method(httpmock::Method::GET).path("/m.zip");
            then.status(200).body(b"fiver".to_vec());
        });

        let module = DistributedModule::Simple {
            name: "m".to_string(),
            dest_dir: "m".to_string(),
            download_file: file("m.zip", "h", 1, 5),
        };
        let dir = tempfile::tempdir().unwrap();
        let sink: SinkHandle = Arc::new(NullSink);
        let cancel = CancellationToken::new();

        let request = ModuleDownloadRequest {
            base_url: &server.url(""),
            module: &module,
            selected_alternative_key: None,
            full_hash: "full",
            dest_dir: dir.path(),
            retry_count: 0,
            force_cache_bust: false,
        };

        let zip_path = downloader().download(&request, &sink, &cancel).await.unwrap();
        assert_eq!(tokio::fs::read(&zip_path).await.unwrap(), b"fiver");
    }

    #[tokio::test]
    async fn reassembles_split_parts_in_order() {
        let server = MockServer::start();
        let parts: [&[u8]; 3] = [b"AAA", b"BBB", b"C"];
        for (i, part) in parts.iter().enumerate() {
            let suffix = part_suffix((i + 1) as u32, 3);
            let path = format!("/big.zip{suffix}");
            server.mock(|when, then| {
                when.method(httpmock::Method::HEAD).path(path.as_str());
                then.status(200)
                    .header("accept-ranges", "bytes")
                    .header("content-length", part.len().to_string());
            });
            server.mock(|when, then| {
                when.method(httpmock::Method::GET).path(path.as_str());
                then.status(200).body(part.to_vec());
            });
        }

        let module = DistributedModule::Simple {
            name: "big".to_string(),
            dest_dir: "big".to_string(),
            download_file: file("big.zip", "h", 3, 7),
        };
        let dir = tempfile::tempdir().unwrap();
        let sink: SinkHandle = Arc::new(NullSink);
        let cancel = CancellationToken::new();

        let request = ModuleDownloadRequest {
            base_url: &server.url(""),
            module: &module,
            selected_alternative_key: None,
            full_hash: "full",
            dest_dir: dir.path(),
            retry_count: 0,
            force_cache_bust: false,
        };

        let zip_path = downloader().download(&request, &sink, &cancel).await.unwrap();
        assert_eq!(tokio::fs::read(&zip_path).await.unwrap(), b"AAABBBC");
        assert!(!dir.path().join("big.zip.fg-tmp01").exists());
    }

    /// §8 S4 — a 3-part split module requests exactly `big.zip.sf-part01`,
    /// `big.zip.sf-part02`, `big.zip.sf-part03`: the client's padding must
    /// match what the server actually names the parts, not just whatever
    /// `part_suffix` happens to compute.
    #[tokio::test]
    async fn split_download_requests_the_literal_s4_part_paths() {
        let server = MockServer::start();
        let bodies: [&[u8]; 3] = [b"first-part", b"second-part", b"third"];
        let literal_paths = ["/big.zip.sf-part01", "/big.zip.sf-part02", "/big.zip.sf-part03"];

        let mut get_mocks = Vec::new();
        for (path, body) in literal_paths.iter().zip(&bodies) {
            server.mock(|when, then| {
                when.method(httpmock::Method::HEAD).path(*path);
                then.status(200)
                    .header("accept-ranges", "bytes")
                    .header("content-length", body.len().to_string());
            });
            get_mocks.push(server.mock(|when, then| {
                when.method(httpmock::Method::GET).path(*path);
                then.status(200).body(body.to_vec());
            }));
        }

        let module = DistributedModule::Simple {
            name: "big".to_string(),
            dest_dir: "big".to_string(),
            download_file: file("big.zip", "h", 3, 21),
        };
        let dir = tempfile::tempdir().unwrap();
        let sink: SinkHandle = Arc::new(NullSink);
        let cancel = CancellationToken::new();

        let request = ModuleDownloadRequest {
            base_url: &server.url(""),
            module: &module,
            selected_alternative_key: None,
            full_hash: "full",
            dest_dir: dir.path(),
            retry_count: 0,
            force_cache_bust: false,
        };

        let zip_path = downloader().download(&request, &sink, &cancel).await.unwrap();
        assert_eq!(
            tokio::fs::read(&zip_path).await.unwrap(),
            b"first-partsecond-partthird"
        );
        for mock in &get_mocks {
            mock.assert_hits(1);
        }
    }
}
