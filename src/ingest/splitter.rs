use anyhow::{Result, anyhow};

use crate::ingest::loader::Document;

const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub source: String,
    pub text: String,
}

/// Recursive character splitter.
///
/// Splits on the coarsest separator present in the text, merges the pieces
/// back into chunks of at most `chunk_size` characters, and carries up to
/// `chunk_overlap` characters of trailing pieces into the next chunk. Pieces
/// still too long are split again with the next finer separator.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 || chunk_overlap >= chunk_size {
            return Err(anyhow!(
                "invalid splitter settings: chunk_size {chunk_size}, overlap {chunk_overlap}"
            ));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn split(&self, documents: &[Document]) -> Result<Vec<Chunk>> {
        if documents.is_empty() {
            return Err(anyhow!("no documents provided for text splitting"));
        }
        Ok(documents
            .iter()
            .flat_map(|d| {
                self.split_text(&d.text).into_iter().map(|text| Chunk {
                    source: d.source.clone(),
                    text,
                })
            })
            .collect())
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &SEPARATORS)
    }

    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let (separator, finer) = pick_separator(text, separators);

        let pieces: Vec<&str> = if separator.is_empty() {
            text.char_indices()
                .map(|(i, c)| &text[i..i + c.len_utf8()])
                .collect()
        } else {
            text.split(separator).filter(|s| !s.is_empty()).collect()
        };

        let mut out = Vec::new();
        let mut pending: Vec<&str> = Vec::new();
        for piece in pieces {
            if char_len(piece) < self.chunk_size {
                pending.push(piece);
                continue;
            }
            if !pending.is_empty() {
                out.extend(self.merge(&pending, separator));
                pending.clear();
            }
            if finer.is_empty() {
                out.push(piece.to_string());
            } else {
                out.extend(self.split_recursive(piece, finer));
            }
        }
        if !pending.is_empty() {
            out.extend(self.merge(&pending, separator));
        }
        out
    }

    fn merge(&self, pieces: &[&str], separator: &str) -> Vec<String> {
        let sep_len = char_len(separator);
        let mut docs = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);
            let joined_len = |total: usize, current: &[&str]| {
                total + len + if current.is_empty() { 0 } else { sep_len }
            };

            if joined_len(total, &current) > self.chunk_size && !current.is_empty() {
                if let Some(doc) = join(&current, separator) {
                    docs.push(doc);
                }
                // drop leading pieces until what remains fits as overlap
                while total > self.chunk_overlap
                    || (joined_len(total, &current) > self.chunk_size && total > 0)
                {
                    let first = current.remove(0);
                    total -= char_len(first) + if current.is_empty() { 0 } else { sep_len };
                }
            }

            total += len + if current.is_empty() { 0 } else { sep_len };
            current.push(piece);
        }

        if let Some(doc) = join(&current, separator) {
            docs.push(doc);
        }
        docs
    }
}

fn pick_separator<'s>(text: &str, separators: &'s [&'s str]) -> (&'s str, &'s [&'s str]) {
    for (i, sep) in separators.iter().enumerate() {
        if sep.is_empty() || text.contains(sep) {
            return (sep, &separators[i + 1..]);
        }
    }
    ("", &[])
}

fn join(pieces: &[&str], separator: &str) -> Option<String> {
    let text = pieces.join(separator);
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}
