use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::rag::OllamaHttp;

pub trait LanguageModel {
    /// Complete `prompt` and return the raw text output.
    fn complete(&self, prompt: &str) -> Result<String>;
}

#[derive(Serialize)]
struct GenRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenResponse {
    response: Option<String>,
}

/// Text generation through Ollama (`/api/generate`, non-streaming).
pub struct OllamaModel {
    http: OllamaHttp,
    model: String,
}

impl OllamaModel {
    pub fn new(http: OllamaHttp, model: impl Into<String>) -> Self {
        Self {
            http,
            model: model.into(),
        }
    }
}

impl LanguageModel for OllamaModel {
    fn complete(&self, prompt: &str) -> Result<String> {
        let req = GenRequest {
            model: &self.model,
            prompt,
            stream: false,
        };
        let resp: GenResponse = self
            .http
            .post("api/generate", &req)
            .with_context(|| format!("generating with {}", self.model))?;
        Ok(resp.response.unwrap_or_default())
    }
}
