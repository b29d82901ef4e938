pub mod embeddings;
pub mod llm;
pub mod prompt;
pub mod responder;
pub mod sentiment;

use anyhow::{Context, Result, anyhow};
use reqwest::blocking::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

use crate::config::{Config, EmbeddingBackend, SentimentBackend};
use crate::rag::embeddings::{Embedder, HashingEmbedder, OllamaEmbedder};
use crate::rag::llm::OllamaModel;
use crate::rag::sentiment::{PromptedClassifier, SentimentClassifier, ZeroShotClassifier};

/// Blocking JSON client for an Ollama server.
#[derive(Clone)]
pub struct OllamaHttp {
    client: Client,
    base: Url,
}

impl OllamaHttp {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        // a base without trailing slash would drop its last segment on join
        let mut base =
            Url::parse(base_url).with_context(|| format!("invalid Ollama url '{base_url}'"))?;
        if !base.path().ends_with('/') {
            base.set_path(&format!("{}/", base.path()));
        }
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base })
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        Self::new(
            &cfg.models.ollama_url,
            Duration::from_secs(cfg.models.timeout_secs),
        )
    }

    pub fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base.join(path)?)
    }

    pub fn post<B: Serialize, R: DeserializeOwned>(&self, path: &str, body: &B) -> Result<R> {
        let url = self.endpoint(path)?;
        let resp = self
            .client
            .post(url.clone())
            .json(body)
            .send()
            .with_context(|| format!("request to {url} failed"))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().unwrap_or_default();
            return Err(anyhow!("{url} returned {status}: {text}"));
        }
        resp.json()
            .with_context(|| format!("cannot parse response from {url}"))
    }
}

/// Document/query embedder selected by `models.embedding_backend`.
pub fn document_embedder(cfg: &Config) -> Result<Box<dyn Embedder>> {
    embedder_for(cfg, &cfg.models.embedding)
}

/// Sentiment classifier selected by `sentiment.backend`.
pub fn sentiment_classifier(cfg: &Config) -> Result<Box<dyn SentimentClassifier>> {
    cfg.check_sentiment_backend()?;
    Ok(match cfg.sentiment.backend {
        SentimentBackend::Embedding => Box::new(ZeroShotClassifier::new(
            embedder_for(cfg, &cfg.models.classifier)?,
            &cfg.sentiment,
        )?),
        SentimentBackend::Llm => Box::new(PromptedClassifier::new(
            Box::new(OllamaModel::new(
                OllamaHttp::from_config(cfg)?,
                cfg.models.llm.clone(),
            )),
            &cfg.sentiment,
        )?),
    })
}

fn embedder_for(cfg: &Config, model: &str) -> Result<Box<dyn Embedder>> {
    Ok(match cfg.models.embedding_backend {
        EmbeddingBackend::Ollama => Box::new(OllamaEmbedder::new(
            OllamaHttp::from_config(cfg)?,
            model,
        )),
        EmbeddingBackend::Hashing => Box::new(HashingEmbedder::default()),
    })
}
