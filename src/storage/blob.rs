use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::storage::{ObjectStorage, StorageError};
use crate::utils::http::get_http_client;
use crate::utils::text::truncate_for_log;

#[derive(Debug, Deserialize)]
struct BlobPutResponse {
    url: Option<String>,
}

/// Public blob store addressed as `PUT {base}/{path}`.
#[derive(Debug, Clone)]
pub struct BlobStorage {
    client: Client,
    api_url: String,
    token: String,
}

impl BlobStorage {
    pub fn from_config(config: &Config) -> Self {
        BlobStorage {
            client: get_http_client().clone(),
            api_url: config.blob_api_url.trim_end_matches('/').to_string(),
            token: config.blob_read_write_token.clone(),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.token.trim().is_empty()
    }
}

#[async_trait]
impl ObjectStorage for BlobStorage {
    async fn store(
        &self,
        bytes: Vec<u8>,
        suggested_path: &str,
        content_type: &str,
    ) -> Result<String, StorageError> {
        if !self.is_configured() {
            return Err(StorageError::NotConfigured);
        }

        let size = bytes.len();
        let response = self
            .client
            .put(format!("{}/{}", self.api_url, suggested_path.trim_start_matches('/')))
            .bearer_auth(&self.token)
            .header("x-content-type", content_type)
            .header("x-add-random-suffix", "1")
            .body(bytes)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!("Blob upload failed with status {}: {}", status, truncate_for_log(&body, 500));
            return Err(StorageError::Rejected {
                status: status.as_u16(),
                detail: truncate_for_log(&body, 200),
            });
        }

        let parsed = response.json::<BlobPutResponse>().await?;
        match parsed.url.filter(|url| !url.trim().is_empty()) {
            Some(url) => {
                info!("Stored {} bytes at {}", size, url);
                Ok(url)
            }
            None => Err(StorageError::MissingUrl),
        }
    }
}
