pub mod blob;
pub mod media;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use blob::BlobStorage;

pub const REFERENCE_IMAGE_PREFIX: &str = "style-references";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("object storage is not configured")]
    NotConfigured,
    #[error("storage request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("storage rejected upload with status {status}: {detail}")]
    Rejected { status: u16, detail: String },
    #[error("storage response did not include a URL")]
    MissingUrl,
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Stores `bytes` and returns the public URL of the object.
    async fn store(
        &self,
        bytes: Vec<u8>,
        suggested_path: &str,
        content_type: &str,
    ) -> Result<String, StorageError>;
}

/// `style-references/{timestamp_ms}.{ext}`; the store adds its own random suffix.
pub fn reference_image_path(extension: &str, now: DateTime<Utc>) -> String {
    format!(
        "{}/{}.{}",
        REFERENCE_IMAGE_PREFIX,
        now.timestamp_millis(),
        extension
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn reference_path_uses_millisecond_timestamp() {
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(
            reference_image_path("png", now),
            "style-references/1704164645000.png"
        );
    }
}
