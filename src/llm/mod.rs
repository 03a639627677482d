pub mod errors;
pub mod replicate;

use std::fmt;

use async_trait::async_trait;

use crate::style::catalog::GenerationPreset;

pub use errors::{InvocationError, InvocationErrorKind, Operation};
pub use replicate::ReplicateClient;

/// Caller-supplied provider credential. Never printed in full.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(value: impl Into<String>) -> Self {
        ApiKey(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix: String = self.0.chars().take(3).collect();
        write!(f, "ApiKey({prefix}***)")
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingParams {
    pub max_tokens: u32,
    pub temperature: f32,
}

#[async_trait]
pub trait VisionModel: Send + Sync {
    /// Runs one multimodal call and returns the model's text.
    async fn invoke(
        &self,
        api_key: &ApiKey,
        instruction: &str,
        image_url: &str,
        params: SamplingParams,
    ) -> Result<String, InvocationError>;

    fn model_name(&self) -> &str;
}

#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Generates one image and returns its URL.
    async fn generate(
        &self,
        api_key: &ApiKey,
        prompt: &str,
        preset: &GenerationPreset,
    ) -> Result<String, InvocationError>;
}
