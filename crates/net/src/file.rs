//! 4.B File Downloader — HEAD probe, resumable retry loop, final flush.

use crate::retry::backoff_delay;
use crate::stream::StreamDownloader;
use bytes::Bytes;
use fragmenter_errors::{ErrorCode, FragmenterError};
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Retry ceiling for a single file's transport attempts (§4.B).
pub const MAX_RETRIES: u32 = 5;

/// Outcome of a completed download.
pub struct FileDownloadOutcome {
    pub bytes_downloaded: u64,
}

/// Resumable single-file downloader built on top of [`StreamDownloader`].
pub struct FileDownloader {
    stream: StreamDownloader,
}

impl FileDownloader {
    #[must_use]
    pub fn new(stream: StreamDownloader) -> Self {
        Self { stream }
    }

    /// Download `url` to `dest_path`, resuming from the last known offset
    /// when the server advertises `Accept-Ranges: bytes` and restarting
    /// from zero otherwise (§4.B).
    ///
    /// `on_progress(bytes_so_far, total_if_known)` fires after every chunk.
    /// `on_interrupted()` fires once per retry, before the backoff sleep.
    ///
    /// # Errors
    /// - `MaxModuleRetries` once the retry ceiling is exhausted without
    ///   completing the transfer.
    /// - `UserAborted` if `cancel` fires.
    /// - Any unrecoverable error classified by [`fragmenter_errors::Classifier`]
    ///   short-circuits immediately, without consuming a retry.
    pub async fn download(
        &self,
        url: &str,
        dest_path: &Path,
        cancel: &CancellationToken,
        mut on_progress: impl FnMut(u64, Option<u64>),
        mut on_interrupted: impl FnMut(u32),
    ) -> Result<FileDownloadOutcome, FragmenterError> {
        let head = self.stream.client().head(url).await?;
        let content_length = head.content_length();
        let resumable = head
            .headers()
            .get(reqwest::header::ACCEPT_RANGES)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.eq_ignore_ascii_case("bytes"));

        let mut buffers: Vec<Bytes> = Vec::new();
        let mut bytes_accumulated: u64 = 0;
        let mut retry: u32 = 0;

        let completed = loop {
            if cancel.is_cancelled() {
                return Err(FragmenterError::user_aborted());
            }

            let offset = if resumable { bytes_accumulated } else { 0 };
            if !resumable {
                buffers.clear();
                bytes_accumulated = 0;
            }
            let base = bytes_accumulated;

            let attempt = self
                .stream
                .stream(url, offset, cancel, |written| {
                    on_progress(base + written, content_length);
                })
                .await;

            match attempt {
                Ok(result) => {
                    buffers.extend(result.buffers);
                    bytes_accumulated = base + result.bytes_written;

                    let done = match content_length {
                        Some(total) => bytes_accumulated >= total,
                        None => true,
                    };
                    if done {
                        break true;
                    }
                    debug!(url, bytes_accumulated, "stream ended before expected size");
                }
                Err(e) if e.code == ErrorCode::UserAborted => return Err(e),
                Err(e) if e.is_unrecoverable() => return Err(e),
                Err(e) => warn!(url, error = %e, "download attempt failed, will retry"),
            }

            retry += 1;
            if retry > MAX_RETRIES {
                break false;
            }
            on_interrupted(retry);

            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(FragmenterError::user_aborted()),
                () = tokio::time::sleep(backoff_delay(retry)) => {}
            }
        };

        if !completed {
            return Err(FragmenterError::max_module_retries(url, retry));
        }

        if let Some(parent) = dest_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| fragmenter_errors::io_error_with_path(&e, parent))?;
        }
        let mut file = tokio::fs::File::create(dest_path)
            .await
            .map_err(|e| fragmenter_errors::io_error_with_path(&e, dest_path))?;
        for buf in &buffers {
            file.write_all(buf)
                .await
                .map_err(|e| fragmenter_errors::io_error_with_path(&e, dest_path))?;
        }
        file.flush()
            .await
            .map_err(|e| fragmenter_errors::io_error_with_path(&e, dest_path))?;

        Ok(FileDownloadOutcome {
            bytes_downloaded: bytes_accumulated,
        })
    }
}
