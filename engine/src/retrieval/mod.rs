//! Knowledge base retrieval
//!
//! Loads `.md` and `.txt` documents from the knowledge directory, splits
//! them into overlapping chunks and ranks chunks by term overlap with the
//! query. Retrieval never fails from the caller's point of view: an empty
//! result or an unreadable knowledge base yields [`NO_CONTEXT`].

use async_trait::async_trait;
use sdk::errors::EngineError;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::config::RetrievalConfig;

/// Returned whenever nothing relevant is found
pub const NO_CONTEXT: &str = "No relevant information found in the knowledge base.";

/// Separator placed between retrieved chunks
const CHUNK_SEPARATOR: &str = "\n\n---\n\n";

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "that", "this", "from", "are", "was", "were", "you", "your",
    "into", "about", "have", "has", "not", "but", "all", "any", "can", "will", "its", "our",
];

/// Retrieval collaborator used by workers
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Relevant context for `query`, or [`NO_CONTEXT`]
    async fn retrieve(&self, query: &str) -> String;
}

/// Retriever used when retrieval is disabled in config
pub struct DisabledRetriever;

#[async_trait]
impl Retriever for DisabledRetriever {
    async fn retrieve(&self, _query: &str) -> String {
        NO_CONTEXT.to_string()
    }
}

#[derive(Debug, Clone)]
struct Chunk {
    source: String,
    text: String,
    term_counts: HashMap<String, usize>,
}

/// In-memory knowledge base ranked by term overlap
#[derive(Debug, Default)]
pub struct KnowledgeBase {
    chunks: Vec<Chunk>,
    top_k: usize,
}

fn unreadable(dir: &Path, e: std::io::Error) -> EngineError {
    EngineError::Retrieval(format!("Failed to read {}: {}", dir.display(), e))
}

impl KnowledgeBase {
    /// Load every `.md` and `.txt` file in `dir`
    ///
    /// A missing directory gives an empty knowledge base.
    pub async fn load(dir: &Path, config: &RetrievalConfig) -> Result<Self, EngineError> {
        let mut kb = Self {
            chunks: Vec::new(),
            top_k: config.top_k,
        };

        if !dir.is_dir() {
            info!("Knowledge directory {} does not exist yet.", dir.display());
            return Ok(kb);
        }

        let mut entries = fs::read_dir(dir)
            .await
            .map_err(|e| unreadable(dir, e))?;

        let mut documents = 0;
        while let Some(entry) = entries.next_entry().await.map_err(|e| unreadable(dir, e))? {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            match path.extension().and_then(|s| s.to_str()) {
                Some("md") | Some("txt") => {}
                _ => continue,
            }

            let source = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            match fs::read_to_string(&path).await {
                Ok(text) => {
                    documents += 1;
                    kb.add_document(&source, &text, config.chunk_size, config.chunk_overlap);
                }
                Err(e) => {
                    warn!("Failed to read knowledge file {}: {}", path.display(), e);
                }
            }
        }

        info!(
            "Knowledge base loaded: {} document(s), {} chunk(s)",
            documents,
            kb.chunks.len()
        );
        Ok(kb)
    }

    /// Build a knowledge base from in-memory documents
    pub fn from_documents(documents: &[(&str, &str)], config: &RetrievalConfig) -> Self {
        let mut kb = Self {
            chunks: Vec::new(),
            top_k: config.top_k,
        };
        for (source, text) in documents {
            kb.add_document(source, text, config.chunk_size, config.chunk_overlap);
        }
        kb
    }

    fn add_document(&mut self, source: &str, text: &str, chunk_size: usize, overlap: usize) {
        for piece in chunk_text(text, chunk_size, overlap) {
            let mut term_counts = HashMap::new();
            for term in tokenize(&piece) {
                *term_counts.entry(term).or_insert(0) += 1;
            }
            self.chunks.push(Chunk {
                source: source.to_string(),
                text: piece,
                term_counts,
            });
        }
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// The `top_k` best chunks for `query`, best first
    ///
    /// Chunks are ranked by the number of distinct query terms they contain,
    /// then by total occurrences. Chunks matching nothing are never returned.
    pub fn search(&self, query: &str) -> Vec<&str> {
        let query_terms: HashSet<String> = tokenize(query).collect();
        if query_terms.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(usize, usize, usize)> = self
            .chunks
            .iter()
            .enumerate()
            .filter_map(|(idx, chunk)| {
                let mut distinct = 0;
                let mut total = 0;
                for term in &query_terms {
                    if let Some(count) = chunk.term_counts.get(term) {
                        distinct += 1;
                        total += count;
                    }
                }
                (distinct > 0).then_some((idx, distinct, total))
            })
            .collect();

        // Stable sort keeps document order for equal scores
        scored.sort_by(|a, b| b.1.cmp(&a.1).then(b.2.cmp(&a.2)));

        scored
            .into_iter()
            .take(self.top_k)
            .map(|(idx, _, _)| {
                debug!("Retrieved chunk from {}", self.chunks[idx].source);
                self.chunks[idx].text.as_str()
            })
            .collect()
    }
}

#[async_trait]
impl Retriever for KnowledgeBase {
    async fn retrieve(&self, query: &str) -> String {
        let hits = self.search(query);
        if hits.is_empty() {
            debug!("No knowledge base chunks matched the query");
            return NO_CONTEXT.to_string();
        }
        hits.join(CHUNK_SEPARATOR)
    }
}

/// Split `text` into windows of `size` characters overlapping by `overlap`
///
/// Windows end on whitespace when one exists in the second half of the
/// window, so words are rarely cut in two.
pub fn chunk_text(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let size = size.max(1);
    let overlap = overlap.min(size - 1);
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let mut end = (start + size).min(chars.len());
        if end < chars.len() {
            let floor = start + size / 2;
            if let Some(ws) = (floor..end).rev().find(|&i| chars[i].is_whitespace()) {
                end = ws;
            }
        }

        let piece: String = chars[start..end].iter().collect();
        let piece = piece.trim();
        if !piece.is_empty() {
            chunks.push(piece.to_string());
        }

        if end >= chars.len() {
            break;
        }
        // Always advance, even when the overlap would reach back past `start`
        start = end.saturating_sub(overlap).max(start + 1);
    }

    chunks
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= 3)
        .map(str::to_lowercase)
        .filter(|t| !STOPWORDS.contains(&t.as_str()))
}
