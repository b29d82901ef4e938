pub mod loader;
pub mod splitter;

use anyhow::{Context, Result, anyhow};
use log::info;
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::config::Config;
use crate::ingest::loader::DocumentLoader;
use crate::ingest::splitter::{Chunk, TextSplitter};
use crate::rag::embeddings::Embedder;
use crate::store::vector::{NewChunk, VectorIndex};

/// Summary of one ingestion run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub documents: usize,
    pub chunks: usize,
    pub vector_dir: PathBuf,
}

/// Load documents from `paths.data_dir`, split, embed and persist them into
/// the vector index under `paths.vector_dir`.
///
/// Re-running replaces the chunks of every source seen in this run.
pub fn run_ingest(cfg: &Config, embedder: &dyn Embedder) -> Result<IngestReport> {
    let docs = DocumentLoader::new(&cfg.paths.data_dir).load()?;
    let splitter = TextSplitter::new(cfg.ingest.chunk_size, cfg.ingest.chunk_overlap)?;
    let chunks = splitter.split(&docs)?;
    info!("split {} documents into {} chunks", docs.len(), chunks.len());

    let mut by_source: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for Chunk { source, text } in chunks {
        by_source.entry(source).or_default().push(text);
    }

    let mut index = VectorIndex::open(&cfg.paths.vector_dir).with_context(|| {
        format!(
            "opening vector index in {}",
            cfg.paths.vector_dir.display()
        )
    })?;

    let batch_size = cfg.ingest.batch_size.max(1);
    let mut total = 0;
    for (source, texts) in &by_source {
        let mut rows = Vec::with_capacity(texts.len());
        for batch in texts.chunks(batch_size) {
            let vectors = embedder.embed_batch(batch)?;
            if vectors.len() != batch.len() {
                return Err(anyhow!(
                    "embedding backend returned {} vectors for {} inputs",
                    vectors.len(),
                    batch.len()
                ));
            }
            rows.extend(batch.iter().zip(vectors).map(|(text, embedding)| NewChunk {
                text: text.clone(),
                embedding,
            }));
        }
        index.replace_source(source, &rows)?;
        total += rows.len();
        info!("indexed {} chunks from {source}", rows.len());
    }
    index.set_embedding_model(embedder.model())?;

    Ok(IngestReport {
        documents: docs.len(),
        chunks: total,
        vector_dir: cfg.paths.vector_dir.clone(),
    })
}
