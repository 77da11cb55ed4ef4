use std::cell::RefCell;
use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};

use petchart_core::error::AppError;
use serde::{Deserialize, Serialize};

use super::similarity::cosine_similarity;

/// One indexed slice of a document. Identity is its position in the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkRecord {
    pub text: String,
    pub source: String,
    pub embedding: Vec<f32>,
}

/// Persisted artifact layout: `{"chunks": [{text, source, embedding}, ...]}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StoreDocument {
    #[serde(default)]
    pub chunks: Vec<ChunkRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievalHit {
    pub score: f32,
    pub text: String,
    pub source: String,
}

/// Ordered, append-only collection of embedded chunks.
///
/// Implementations assume a single writer: `append` is load + extend + save, so two
/// processes indexing into the same store at once can lose an update (last save wins).
pub trait ChunkStore {
    fn load(&self) -> Result<Vec<ChunkRecord>, AppError>;

    /// Replace the whole store.
    fn save(&self, chunks: &[ChunkRecord]) -> Result<(), AppError>;

    fn clear(&self) -> Result<(), AppError>;

    fn append(&self, records: Vec<ChunkRecord>) -> Result<usize, AppError> {
        let added = records.len();
        let mut chunks = self.load()?;
        chunks.extend(records);
        self.save(&chunks)?;
        Ok(added)
    }

    fn len(&self) -> Result<usize, AppError> {
        Ok(self.load()?.len())
    }

    fn is_empty(&self) -> Result<bool, AppError> {
        Ok(self.len()? == 0)
    }

    /// Linear scan ranked by cosine similarity, best first; ties keep insertion order.
    fn search(&self, query_embedding: &[f32], k: usize) -> Result<Vec<RetrievalHit>, AppError> {
        Ok(rank_by_similarity(self.load()?, query_embedding, k))
    }
}

pub(crate) fn rank_by_similarity(
    chunks: Vec<ChunkRecord>,
    query_embedding: &[f32],
    k: usize,
) -> Vec<RetrievalHit> {
    let mut scored: Vec<(f32, ChunkRecord)> = chunks
        .into_iter()
        .map(|c| (cosine_similarity(query_embedding, &c.embedding), c))
        .collect();

    // `sort_by` is stable, so equal scores stay in insertion order.
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
    scored.truncate(k);

    scored
        .into_iter()
        .map(|(score, c)| RetrievalHit {
            score,
            text: c.text,
            source: c.source,
        })
        .collect()
}

/// Store persisted as one JSON document, fully read on load and fully rewritten on save.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn open(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        self.path.as_path()
    }
}

impl ChunkStore for JsonFileStore {
    fn load(&self) -> Result<Vec<ChunkRecord>, AppError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let bytes = fs::read(&self.path).map_err(|e| {
            AppError::new("RAG_STORE_READ_FAILED", "Failed to read retrieval store")
                .with_details(format!("path={}; err={}", self.path.display(), e))
        })?;
        let doc: StoreDocument = serde_json::from_slice(&bytes).map_err(|e| {
            AppError::new("RAG_STORE_CORRUPT", "Failed to decode retrieval store")
                .with_details(format!("path={}; err={}", self.path.display(), e))
        })?;
        Ok(doc.chunks)
    }

    fn save(&self, chunks: &[ChunkRecord]) -> Result<(), AppError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                AppError::new("RAG_STORE_WRITE_FAILED", "Failed to create retrieval store directory")
                    .with_details(format!("path={}; err={}", parent.display(), e))
            })?;
        }

        let doc = StoreDocument {
            chunks: chunks.to_vec(),
        };
        let json = serde_json::to_vec(&doc).map_err(|e| {
            AppError::new("RAG_STORE_WRITE_FAILED", "Failed to encode retrieval store")
                .with_details(e.to_string())
        })?;

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, &json).map_err(|e| {
            AppError::new("RAG_STORE_WRITE_FAILED", "Failed to write retrieval store")
                .with_details(format!("path={}; err={}", tmp.display(), e))
        })?;
        fs::rename(&tmp, &self.path).map_err(|e| {
            AppError::new("RAG_STORE_WRITE_FAILED", "Failed to finalize retrieval store write")
                .with_details(format!(
                    "tmp={}; dest={}; err={}",
                    tmp.display(),
                    self.path.display(),
                    e
                ))
        })?;
        Ok(())
    }

    fn clear(&self) -> Result<(), AppError> {
        if !self.path.exists() {
            return Ok(());
        }
        fs::remove_file(&self.path).map_err(|e| {
            AppError::new("RAG_STORE_WRITE_FAILED", "Failed to remove retrieval store")
                .with_details(format!("path={}; err={}", self.path.display(), e))
        })
    }
}

/// In-process store for tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    chunks: RefCell<Vec<ChunkRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chunks(chunks: Vec<ChunkRecord>) -> Self {
        Self {
            chunks: RefCell::new(chunks),
        }
    }
}

impl ChunkStore for MemoryStore {
    fn load(&self) -> Result<Vec<ChunkRecord>, AppError> {
        Ok(self.chunks.borrow().clone())
    }

    fn save(&self, chunks: &[ChunkRecord]) -> Result<(), AppError> {
        *self.chunks.borrow_mut() = chunks.to_vec();
        Ok(())
    }

    fn clear(&self) -> Result<(), AppError> {
        self.chunks.borrow_mut().clear();
        Ok(())
    }

    fn append(&self, records: Vec<ChunkRecord>) -> Result<usize, AppError> {
        let added = records.len();
        self.chunks.borrow_mut().extend(records);
        Ok(added)
    }

    fn len(&self) -> Result<usize, AppError> {
        Ok(self.chunks.borrow().len())
    }
}
