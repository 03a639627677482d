use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::llm::{ApiKey, ImageGenerator, InvocationError, SamplingParams, VisionModel};
use crate::storage::{ObjectStorage, StorageError};
use crate::style::catalog::GenerationPreset;

#[derive(Debug, Clone)]
pub struct VisionCall {
    pub instruction: String,
    pub image_url: String,
    pub params: SamplingParams,
}

/// Replays queued results in order and records every call.
pub struct ScriptedVision {
    responses: Mutex<VecDeque<Result<String, InvocationError>>>,
    calls: Mutex<Vec<VisionCall>>,
}

impl ScriptedVision {
    pub fn new(responses: Vec<Result<String, InvocationError>>) -> Self {
        ScriptedVision {
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<VisionCall> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl VisionModel for ScriptedVision {
    async fn invoke(
        &self,
        _api_key: &ApiKey,
        instruction: &str,
        image_url: &str,
        params: SamplingParams,
    ) -> Result<String, InvocationError> {
        self.calls.lock().push(VisionCall {
            instruction: instruction.to_string(),
            image_url: image_url.to_string(),
            params,
        });
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(InvocationError::failed("no scripted response left")))
    }

    fn model_name(&self) -> &str {
        "scripted/vision"
    }
}

#[derive(Debug, Clone)]
pub struct GenerationCall {
    pub prompt: String,
    pub model: String,
}

/// Pops results per model so concurrent calls stay deterministic.
pub struct ScriptedGenerator {
    responses: Mutex<Vec<(String, VecDeque<Result<String, InvocationError>>)>>,
    calls: Mutex<Vec<GenerationCall>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        ScriptedGenerator {
            responses: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn script(self, model: &str, results: Vec<Result<String, InvocationError>>) -> Self {
        self.responses
            .lock()
            .push((model.to_string(), results.into()));
        self
    }

    pub fn calls(&self) -> Vec<GenerationCall> {
        self.calls.lock().clone()
    }

    pub fn calls_for(&self, model: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.model == model)
            .count()
    }
}

#[async_trait]
impl ImageGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        _api_key: &ApiKey,
        prompt: &str,
        preset: &GenerationPreset,
    ) -> Result<String, InvocationError> {
        self.calls.lock().push(GenerationCall {
            prompt: prompt.to_string(),
            model: preset.model.clone(),
        });
        let mut responses = self.responses.lock();
        responses
            .iter_mut()
            .find(|(model, _)| model == &preset.model)
            .and_then(|(_, queue)| queue.pop_front())
            .unwrap_or_else(|| Err(InvocationError::failed("no scripted response left")))
    }
}

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub path: String,
    pub content_type: String,
    pub size: usize,
}

pub struct MemoryStorage {
    objects: Mutex<Vec<StoredObject>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        MemoryStorage {
            objects: Mutex::new(Vec::new()),
        }
    }

    pub fn objects(&self) -> Vec<StoredObject> {
        self.objects.lock().clone()
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    async fn store(
        &self,
        bytes: Vec<u8>,
        suggested_path: &str,
        content_type: &str,
    ) -> Result<String, StorageError> {
        self.objects.lock().push(StoredObject {
            path: suggested_path.to_string(),
            content_type: content_type.to_string(),
            size: bytes.len(),
        });
        Ok(format!(
            "https://test.public.blob.vercel-storage.com/{suggested_path}"
        ))
    }
}
