//! 4.A Stream Downloader — one ranged GET, fed to the caller as buffers.

use crate::client::NetClient;
use bytes::Bytes;
use fragmenter_errors::{Classifier, ErrorCode, FragmenterError};
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

/// Result of a single streaming attempt.
pub struct StreamResult {
    pub buffers: Vec<Bytes>,
    pub bytes_written: u64,
}

/// Issues one ranged GET and streams the response body as byte buffers.
/// Never retries — that policy lives in [`crate::FileDownloader`] (§4.A).
pub struct StreamDownloader {
    client: NetClient,
}

impl StreamDownloader {
    #[must_use]
    pub fn new(client: NetClient) -> Self {
        Self { client }
    }

    #[must_use]
    pub fn client(&self) -> &NetClient {
        &self.client
    }

    /// Stream `url` starting at `start_offset`, calling `on_progress` with
    /// cumulative bytes written after each buffer (§4.A).
    ///
    /// # Errors
    /// - `UserAborted` if `cancel` fires before the stream completes.
    /// - A classified `NetworkError`/`DownloadStreamClosed` on any other
    ///   transport failure.
    pub async fn stream(
        &self,
        url: &str,
        start_offset: u64,
        cancel: &CancellationToken,
        mut on_progress: impl FnMut(u64),
    ) -> Result<StreamResult, FragmenterError> {
        if cancel.is_cancelled() {
            return Err(FragmenterError::user_aborted());
        }

        let response = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(FragmenterError::user_aborted()),
            result = self.client.get(url, start_offset) => result?,
        };

        if !response.status().is_success() {
            return Err(FragmenterError::new(
                ErrorCode::NetworkError,
                format!("HTTP {} for {url}", response.status()),
            ));
        }

        let mut buffers = Vec::new();
        let mut bytes_written = 0u64;
        let mut body = response.bytes_stream();

        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(FragmenterError::user_aborted()),
                chunk = body.next() => chunk,
            };

            match next {
                Some(Ok(chunk)) => {
                    bytes_written += chunk.len() as u64;
                    buffers.push(chunk);
                    on_progress(bytes_written);
                }
                Some(Err(e)) => return Err(Classifier::classify_reqwest(&e)),
                None => break,
            }
        }

        Ok(StreamResult {
            buffers,
            bytes_written,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{NetClient, NetConfig};
    use httpmock::MockServer;

    #[tokio::test]
    async fn streams_full_body_and_reports_progress() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(httpmock::Method::GET).path("/file.bin");
            then.status(200).body(b"hello world".to_vec());
        });

        let client = NetClient::new(NetConfig::default()).unwrap();
        let downloader = StreamDownloader::new(client);
        let cancel = CancellationToken::new();

        let mut progress_calls = Vec::new();
        let result = downloader
            .stream(&server.url("/file.bin"), 0, &cancel, |b| progress_calls.push(b))
            .await
            .unwrap();

        assert_eq!(result.bytes_written, 11);
        assert!(!progress_calls.is_empty());
        mock.assert();
    }

    #[tokio::test]
    async fn cancellation_short_circuits() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(httpmock::Method::GET);
            then.status(200).body(b"data".to_vec());
        });

        let client = NetClient::new(NetConfig::default()).unwrap();
        let downloader = StreamDownloader::new(client);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = downloader
            .stream(&server.url("/x"), 0, &cancel, |_| {})
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::UserAborted);
    }
}
