use std::sync::Arc;

use crate::config::Config;
use crate::handlers::generation::RetryPolicy;
use crate::handlers::validation::RequestValidator;
use crate::llm::{ImageGenerator, ReplicateClient, VisionModel};
use crate::storage::{BlobStorage, ObjectStorage};
use crate::style::{ExtractionSettings, PlatformCatalog, StyleExtractor};

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<PlatformCatalog>,
    pub extractor: Arc<StyleExtractor>,
    pub generator: Arc<dyn ImageGenerator>,
    pub storage: Arc<dyn ObjectStorage>,
    pub validator: Arc<RequestValidator>,
    pub retry: RetryPolicy,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(
        config: &Config,
        vision: Arc<dyn VisionModel>,
        generator: Arc<dyn ImageGenerator>,
        storage: Arc<dyn ObjectStorage>,
    ) -> Self {
        let catalog = Arc::new(config.platform_catalog.clone());
        let extractor = StyleExtractor::new(
            vision,
            catalog.clone(),
            ExtractionSettings::from_config(config),
        );
        AppState {
            catalog,
            extractor: Arc::new(extractor),
            generator,
            storage,
            validator: Arc::new(RequestValidator::from_config(config)),
            retry: RetryPolicy::from_config(config),
            max_upload_bytes: config.max_upload_bytes,
        }
    }

    /// Wires the Replicate and blob adapters.
    pub fn from_config(config: &Config) -> Self {
        let replicate = Arc::new(ReplicateClient::from_config(config));
        AppState::new(
            config,
            replicate.clone(),
            replicate,
            Arc::new(BlobStorage::from_config(config)),
        )
    }
}
