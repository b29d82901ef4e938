use anyhow::{Context, Result, anyhow};
use chrono::{Local, NaiveDate};
use log::{info, warn};

use crate::config::Config;
use crate::domain::email::ReplyContext;
use crate::rag::embeddings::Embedder;
use crate::rag::llm::{LanguageModel, OllamaModel};
use crate::rag::prompt::{PromptTemplate, build_query};
use crate::rag::sentiment::SentimentClassifier;
use crate::rag::{OllamaHttp, document_embedder, sentiment_classifier};
use crate::store::vector::{ScoredChunk, VectorIndex};

/// Anything that can draft a reply for an email.
pub trait ResponseGenerator {
    fn generate(&self, body: &str, subject: &str) -> Result<ReplyContext>;
}

pub trait Retriever {
    fn retrieve(&self, query: &str) -> Result<Vec<ScoredChunk>>;
}

/// Nearest chunks from the persistent vector index.
pub struct VectorRetriever {
    embedder: Box<dyn Embedder>,
    index: VectorIndex,
    top_k: usize,
}

impl VectorRetriever {
    /// Fails when the index was built with a different embedding model.
    pub fn new(embedder: Box<dyn Embedder>, index: VectorIndex, top_k: usize) -> Result<Self> {
        match index.embedding_model()? {
            Some(built_with) if built_with != embedder.model() => {
                return Err(anyhow!(
                    "vector index was built with '{built_with}' but '{}' is configured; re-run ingest",
                    embedder.model()
                ));
            }
            None if !index.is_empty()? => {
                warn!("vector index has no embedding model recorded");
            }
            _ => {}
        }
        Ok(Self {
            embedder,
            index,
            top_k,
        })
    }
}

impl Retriever for VectorRetriever {
    fn retrieve(&self, query: &str) -> Result<Vec<ScoredChunk>> {
        let q = self.embedder.embed(query)?;
        self.index.search(&q, self.top_k)
    }
}

/// Classify, retrieve, prompt, complete.
pub struct Responder {
    classifier: Box<dyn SentimentClassifier>,
    retriever: Box<dyn Retriever>,
    prompt: PromptTemplate,
    model: Box<dyn LanguageModel>,
}

impl Responder {
    pub fn new(
        classifier: Box<dyn SentimentClassifier>,
        retriever: Box<dyn Retriever>,
        prompt: PromptTemplate,
        model: Box<dyn LanguageModel>,
    ) -> Self {
        Self {
            classifier,
            retriever,
            prompt,
            model,
        }
    }

    /// Wire the production pipeline from config.
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let classifier = sentiment_classifier(cfg)?;
        let index = VectorIndex::open(&cfg.paths.vector_dir).with_context(|| {
            format!(
                "opening vector index in {}",
                cfg.paths.vector_dir.display()
            )
        })?;
        let retriever = VectorRetriever::new(document_embedder(cfg)?, index, cfg.retrieval.top_k)?;
        let model = OllamaModel::new(OllamaHttp::from_config(cfg)?, cfg.models.llm.clone());
        Ok(Self::new(
            classifier,
            Box::new(retriever),
            PromptTemplate::new(cfg.prompt.template.clone()),
            Box::new(model),
        ))
    }

    pub fn generate_on(&self, today: NaiveDate, body: &str, subject: &str) -> Result<ReplyContext> {
        let sentiment = self.classifier.classify(body)?;
        let query = build_query(today, &sentiment.label, subject, body);

        let hits = self.retriever.retrieve(&query)?;
        info!(
            "sentiment {} ({:.3}), {} context chunks",
            sentiment.label,
            sentiment.score,
            hits.len()
        );
        let context = hits
            .iter()
            .map(|h| h.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let prompt = self.prompt.render(&context, &query);
        let reply = self.model.complete(&prompt)?.trim().to_string();

        Ok(ReplyContext { sentiment, reply })
    }
}

impl ResponseGenerator for Responder {
    fn generate(&self, body: &str, subject: &str) -> Result<ReplyContext> {
        self.generate_on(Local::now().date_naive(), body, subject)
    }
}
