use anyhow::{Result, anyhow};
use rusqlite::{Connection, OptionalExtension, params};
use std::fs;
use std::path::Path;

use crate::rag::embeddings::{blob_to_f32_vec, cosine_similarity, f32_vec_to_blob};

pub const INDEX_FILE: &str = "index.sqlite3";

/// A chunk ready to be written: text plus its embedding.
#[derive(Debug, Clone)]
pub struct NewChunk {
    pub text: String,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub source: String,
    pub chunk_index: usize,
    pub text: String,
    pub score: f32,
}

/// Persistent nearest-neighbour index over chunk embeddings.
pub struct VectorIndex {
    conn: Connection,
}

impl VectorIndex {
    /// Open (or create) the index inside `dir`.
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let conn = Connection::open(dir.join(INDEX_FILE))?;
        let index = Self { conn };
        index.migrate()?;
        Ok(index)
    }

    fn migrate(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;

            CREATE TABLE IF NOT EXISTS chunks (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                source      TEXT NOT NULL,
                chunk_index INTEGER NOT NULL,
                text        TEXT NOT NULL,
                embedding   BLOB NOT NULL
            );

            CREATE INDEX IF NOT EXISTS chunks_source ON chunks(source);

            CREATE TABLE IF NOT EXISTS meta (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    /// Replace every chunk previously stored for `source`.
    pub fn replace_source(&mut self, source: &str, chunks: &[NewChunk]) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM chunks WHERE source = ?1", params![source])?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO chunks (source, chunk_index, text, embedding)
                VALUES (?1, ?2, ?3, ?4)
                "#,
            )?;
            for (i, c) in chunks.iter().enumerate() {
                stmt.execute(params![source, i as i64, c.text, f32_vec_to_blob(&c.embedding)])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// The `k` chunks most similar to `query`, best first.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        let mut stmt = self
            .conn
            .prepare("SELECT source, chunk_index, text, embedding FROM chunks")?;
        let mut rows = stmt.query([])?;

        let mut scored = Vec::new();
        while let Some(r) = rows.next()? {
            let blob: Vec<u8> = r.get(3)?;
            let embedding = blob_to_f32_vec(&blob).map_err(|e| anyhow!(e))?;
            scored.push(ScoredChunk {
                source: r.get(0)?,
                chunk_index: r.get::<_, i64>(1)? as usize,
                text: r.get(2)?,
                score: cosine_similarity(query, &embedding),
            });
        }

        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(k);
        Ok(scored)
    }

    pub fn len(&self) -> Result<usize> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM chunks", [], |r| r.get(0))?;
        Ok(n as usize)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn embedding_model(&self) -> Result<Option<String>> {
        Ok(self
            .conn
            .query_row(
                "SELECT value FROM meta WHERE key = 'embedding_model'",
                [],
                |r| r.get(0),
            )
            .optional()?)
    }

    pub fn set_embedding_model(&self, model: &str) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO meta (key, value) VALUES ('embedding_model', ?1)
            ON CONFLICT(key) DO UPDATE SET value=excluded.value
            "#,
            params![model],
        )?;
        Ok(())
    }
}
