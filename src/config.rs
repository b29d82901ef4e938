use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_TEMPLATE: &str = "You are acting as an Email Replier with a human touch, responding to customer emails in accordance with their expressed sentiments. Craft your replies considering the emotional tone conveyed by the customer in their emails. Your goal is to provide empathetic and context-appropriate responses that resonate with the customer's feelings.:
{context}

Question: {question}
";

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub imap: ImapConfig,
    pub smtp: SmtpConfig,
    pub models: ModelsConfig,
    pub sentiment: SentimentConfig,
    pub retrieval: RetrievalConfig,
    pub ingest: IngestConfig,
    pub session: SessionConfig,
    pub logging: LoggingConfig,
    pub prompt: PromptConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct PathsConfig {
    /// Source documents for ingestion.
    pub data_dir: PathBuf,
    pub vector_dir: PathBuf,
    pub cache_file: PathBuf,
    pub log_file: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("Data"),
            vector_dir: PathBuf::from("vectorstores/db"),
            cache_file: PathBuf::from("Email_Data/emails.xlsx"),
            log_file: PathBuf::from("logs/app.log"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ImapConfig {
    pub server: String,
    pub port: u16,
    pub mailbox: String,
    pub user: Option<String>,
    pub remember_password: bool,
}

impl Default for ImapConfig {
    fn default() -> Self {
        Self {
            server: "imap-mail.outlook.com".to_string(),
            port: 993,
            mailbox: "INBOX".to_string(),
            user: None,
            remember_password: false,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct SmtpConfig {
    pub server: String,
    pub port: u16,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            server: "smtp-mail.outlook.com".to_string(),
            port: 587,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingBackend {
    #[default]
    Ollama,
    Hashing,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ModelsConfig {
    pub ollama_url: String,
    pub embedding_backend: EmbeddingBackend,
    /// Model used to embed documents and queries.
    pub embedding: String,
    /// Model used to embed texts and label hypotheses for zero-shot sentiment.
    pub classifier: String,
    pub llm: String,
    pub timeout_secs: u64,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            ollama_url: "http://localhost:11434".to_string(),
            embedding_backend: EmbeddingBackend::Ollama,
            embedding: "nomic-embed-text".to_string(),
            classifier: "nomic-embed-text".to_string(),
            llm: "mistral".to_string(),
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SentimentBackend {
    /// Cosine similarity between the text and one hypothesis per label,
    /// embedded with `models.classifier`.
    #[default]
    Embedding,
    /// Ask `models.llm` to answer with one of the labels.
    Llm,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct SentimentConfig {
    pub backend: SentimentBackend,
    pub labels: Vec<String>,
    pub hypothesis_template: String,
    pub temperature: f32,
}

impl Default for SentimentConfig {
    fn default() -> Self {
        Self {
            backend: SentimentBackend::Embedding,
            labels: vec![
                "Positive".to_string(),
                "Negative".to_string(),
                "Neutral".to_string(),
            ],
            hypothesis_template: "This example is {}.".to_string(),
            temperature: 0.05,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 4 }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct IngestConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub batch_size: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 50,
            batch_size: 32,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FetchMode {
    /// Overwrite the cache with the latest batch of unseen emails.
    #[default]
    Replace,
    /// Keep earlier rows and add the new batch after them.
    Append,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct SessionConfig {
    pub fetch_mode: FetchMode,
    pub advance_after_reply: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct PromptConfig {
    pub template: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            template: DEFAULT_TEMPLATE.to_string(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.sentiment.labels.is_empty() {
            return Err(anyhow!("sentiment.labels must not be empty"));
        }
        if self.ingest.chunk_size == 0 {
            return Err(anyhow!("ingest.chunk_size must be positive"));
        }
        if self.ingest.chunk_overlap >= self.ingest.chunk_size {
            return Err(anyhow!(
                "ingest.chunk_overlap ({}) must be smaller than ingest.chunk_size ({})",
                self.ingest.chunk_overlap,
                self.ingest.chunk_size
            ));
        }
        for placeholder in ["{context}", "{question}"] {
            if !self.prompt.template.contains(placeholder) {
                return Err(anyhow!("prompt.template is missing {placeholder}"));
            }
        }
        Ok(())
    }

    /// Label hypotheses need semantic embeddings; hashed vectors tie on every
    /// label. Checked when the classifier is built, not on load, so `ingest`
    /// runs with either backend.
    pub fn check_sentiment_backend(&self) -> Result<()> {
        if self.sentiment.backend == SentimentBackend::Embedding
            && self.models.embedding_backend == EmbeddingBackend::Hashing
        {
            return Err(anyhow!(
                "sentiment.backend = \"embedding\" needs semantic embeddings; \
                 use sentiment.backend = \"llm\" with models.embedding_backend = \"hashing\""
            ));
        }
        Ok(())
    }
}

fn config_dir() -> Result<PathBuf> {
    Ok(dirs::config_dir()
        .ok_or_else(|| anyhow!("no config dir available"))?
        .join("rs_mail_responder"))
}

pub fn config_path() -> Result<PathBuf> {
    let mut p = config_dir()?;
    fs::create_dir_all(&p)?;
    p.push("config.toml");
    Ok(p)
}

/// Load the config at `path`, or at the default location when `None`.
///
/// A missing default config is written out as a template and the defaults are
/// used; a missing explicit path is an error.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let cfg = match path {
        Some(p) => read_config(p)?,
        None => {
            let p = config_path()?;
            if !p.exists() {
                let sample = Config::default();
                fs::write(&p, toml::to_string_pretty(&sample)?)?;
                eprintln!("Created template config at {}", p.display());
                sample
            } else {
                read_config(&p)?
            }
        }
    };
    cfg.validate()?;
    Ok(cfg)
}

fn read_config(path: &Path) -> Result<Config> {
    let s = fs::read_to_string(path)
        .map_err(|e| anyhow!("cannot read config {}: {e}", path.display()))?;
    let cfg: Config = toml::from_str(&s)?;
    Ok(cfg)
}
