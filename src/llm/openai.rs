use crate::error::{Result, WebpilotError};
use crate::llm::{Embedder, LanguageModel, MultiModalModel};
use base64::Engine;
use serde_json::json;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Blocking client for any OpenAI-compatible chat-completions endpoint.
///
/// Implements [`LanguageModel`], [`MultiModalModel`] (screenshots as base64
/// data URLs) and [`Embedder`] against the same base URL.
pub struct OpenAiCompatible {
    client: reqwest::blocking::Client,
    base_url: String,
    api_key: String,
    model: String,
    embedding_model: String,
}

impl OpenAiCompatible {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| WebpilotError::ModelError(e.to_string()))?;
        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
        })
    }

    /// Read `OPENAI_API_KEY` (required) and `OPENAI_BASE_URL` (optional)
    /// from the environment
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| WebpilotError::ModelError("OPENAI_API_KEY is not set".to_string()))?;
        let mut this = Self::new(api_key)?;
        if let Ok(base_url) = std::env::var("OPENAI_BASE_URL") {
            this.base_url = base_url;
        }
        Ok(this)
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = model.into();
        self
    }

    fn chat(&self, content: serde_json::Value) -> Result<String> {
        let body = json!({
            "model": self.model,
            "messages": [{"role": "user", "content": content}],
        });
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .map_err(|e| WebpilotError::ModelError(e.to_string()))?;
        let status = response.status();
        let value: serde_json::Value = response
            .json()
            .map_err(|e| WebpilotError::ModelError(e.to_string()))?;
        if !status.is_success() {
            return Err(WebpilotError::ModelError(format!(
                "chat completion failed with {}: {}",
                status, value
            )));
        }
        value["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| {
                WebpilotError::ModelError("response carried no message content".to_string())
            })
    }
}

impl LanguageModel for OpenAiCompatible {
    fn complete(&self, prompt: &str) -> Result<String> {
        self.chat(json!(prompt))
    }
}

impl MultiModalModel for OpenAiCompatible {
    fn complete_with_images(&self, prompt: &str, images: &[Vec<u8>]) -> Result<String> {
        let mut parts = vec![json!({"type": "text", "text": prompt})];
        for image in images {
            let encoded = base64::engine::general_purpose::STANDARD.encode(image);
            parts.push(json!({
                "type": "image_url",
                "image_url": {"url": format!("data:image/png;base64,{}", encoded)},
            }));
        }
        self.chat(json!(parts))
    }
}

impl Embedder for OpenAiCompatible {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = json!({
            "model": self.embedding_model,
            "input": texts,
        });
        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .map_err(|e| WebpilotError::ModelError(e.to_string()))?;
        let status = response.status();
        let value: serde_json::Value = response
            .json()
            .map_err(|e| WebpilotError::ModelError(e.to_string()))?;
        if !status.is_success() {
            return Err(WebpilotError::ModelError(format!(
                "embedding request failed with {}: {}",
                status, value
            )));
        }
        let data = value["data"]
            .as_array()
            .ok_or_else(|| WebpilotError::ModelError("no embedding data in response".to_string()))?;
        let mut vectors = Vec::with_capacity(data.len());
        for entry in data {
            let embedding = entry["embedding"]
                .as_array()
                .ok_or_else(|| WebpilotError::ModelError("malformed embedding entry".to_string()))?
                .iter()
                .map(|v| v.as_f64().unwrap_or(0.0) as f32)
                .collect();
            vectors.push(embedding);
        }
        Ok(vectors)
    }
}
