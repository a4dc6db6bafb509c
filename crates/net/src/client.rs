//! Thin HTTP client wrapper, modelled on the teacher's `NetClient`.

use fragmenter_errors::{Classifier, FragmenterError};
use reqwest::Client;
use std::time::Duration;

/// Network client configuration (§4.A/§4.B).
#[derive(Debug, Clone)]
pub struct NetConfig {
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub user_agent: String,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(600),
            connect_timeout: Duration::from_secs(30),
            user_agent: format!("fragmenter/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// HTTP client wrapper used by the stream and file downloaders. A single
/// attempt; retry policy lives one layer up in [`crate::FileDownloader`]
/// (§4.A: "The downloader does not retry; it is a single attempt.").
#[derive(Clone)]
pub struct NetClient {
    client: Client,
}

impl NetClient {
    /// # Errors
    /// Returns an error if the underlying reqwest client fails to build.
    pub fn new(config: NetConfig) -> Result<Self, FragmenterError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent)
            .build()
            .map_err(|e| Classifier::classify_reqwest(&e))?;
        Ok(Self { client })
    }

    /// Issue a HEAD request, used by the file downloader to probe size and
    /// range support (§4.B step 1).
    ///
    /// # Errors
    /// Returns a classified `NetworkError` on transport failure.
    pub async fn head(&self, url: &str) -> Result<reqwest::Response, FragmenterError> {
        self.client
            .head(url)
            .send()
            .await
            .map_err(|e| Classifier::classify_reqwest(&e))
    }

    /// Issue a GET, with an optional `Range: bytes=s-` header (§4.A).
    ///
    /// # Errors
    /// Returns a classified `NetworkError` on transport failure.
    pub async fn get(
        &self,
        url: &str,
        start_offset: u64,
    ) -> Result<reqwest::Response, FragmenterError> {
        let mut builder = self.client.get(url);
        if start_offset > 0 {
            builder = builder.header("Range", format!("bytes={start_offset}-"));
        }
        builder.send().await.map_err(|e| Classifier::classify_reqwest(&e))
    }
}
