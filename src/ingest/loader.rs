use anyhow::{Result, anyhow};
use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub source: String,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Pdf,
    Text,
    Html,
}

fn detect_format(path: &Path) -> Option<Format> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    match ext.as_str() {
        "pdf" => Some(Format::Pdf),
        "txt" | "md" | "markdown" => Some(Format::Text),
        "html" | "htm" => Some(Format::Html),
        _ => None,
    }
}

pub struct DocumentLoader {
    data_path: PathBuf,
}

impl DocumentLoader {
    pub fn new(data_path: impl Into<PathBuf>) -> Self {
        Self {
            data_path: data_path.into(),
        }
    }

    /// Load every supported file under the data directory, sorted by path.
    pub fn load(&self) -> Result<Vec<Document>> {
        if !self.data_path.exists() {
            return Err(anyhow!(
                "the specified path '{}' does not exist",
                self.data_path.display()
            ));
        }

        let mut paths: Vec<PathBuf> = WalkDir::new(&self.data_path)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| detect_format(p).is_some())
            .collect();
        paths.sort();

        let mut docs = Vec::with_capacity(paths.len());
        for path in paths {
            match extract(&path) {
                Ok(text) if text.trim().is_empty() => {
                    warn!("{} has no extractable text", path.display());
                }
                Ok(text) => docs.push(Document {
                    source: path.display().to_string(),
                    text,
                }),
                Err(e) => warn!("skipping {}: {e}", path.display()),
            }
        }

        if docs.is_empty() {
            return Err(anyhow!(
                "no documents found in '{}'",
                self.data_path.display()
            ));
        }
        info!("loaded {} documents from {}", docs.len(), self.data_path.display());
        Ok(docs)
    }
}

fn extract(path: &Path) -> Result<String> {
    match detect_format(path) {
        Some(Format::Text) => {
            let bytes = fs::read(path)?;
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        }
        Some(Format::Html) => {
            let html = fs::read(path)?;
            html2text::from_read(html.as_slice(), 100).map_err(|e| anyhow!("HTML: {e}"))
        }
        Some(Format::Pdf) => {
            // pdf-extract can panic on malformed PDFs
            let path_buf = path.to_path_buf();
            match std::panic::catch_unwind(move || pdf_extract::extract_text(&path_buf)) {
                Ok(Ok(text)) => Ok(text),
                Ok(Err(e)) => Err(anyhow!("PDF: {e}")),
                Err(_) => Err(anyhow!("PDF extraction panicked (malformed file)")),
            }
        }
        None => Err(anyhow!("unsupported file type")),
    }
}
