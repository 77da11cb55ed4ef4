use std::collections::BTreeSet;
use std::path::Path;

use petchart_core::error::AppError;
use serde::{Deserialize, Serialize};

use crate::embeddings::Embedder;

pub mod chunking;
pub mod similarity;
pub mod store;

pub use chunking::{chunk_markdown, ChunkingOptions};
pub use similarity::cosine_similarity;
pub use store::{ChunkRecord, ChunkStore, JsonFileStore, MemoryStore, RetrievalHit, StoreDocument};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreStats {
    pub chunk_count: usize,
    pub sources: Vec<String>,
}

/// Indexes transcripts into a [`ChunkStore`] and answers similarity queries against it.
pub struct Retriever<'a> {
    store: &'a dyn ChunkStore,
    embedder: &'a dyn Embedder,
    model: &'a str,
}

impl<'a> Retriever<'a> {
    pub fn new(store: &'a dyn ChunkStore, embedder: &'a dyn Embedder, model: &'a str) -> Self {
        Self {
            store,
            embedder,
            model,
        }
    }

    /// Chunk, embed (one batched call) and append a document. Returns the number of chunks added.
    pub fn add_document(
        &self,
        name: &str,
        content: &str,
        opts: &ChunkingOptions,
    ) -> Result<usize, AppError> {
        let chunks = chunk_markdown(content, opts);
        if chunks.is_empty() {
            tracing::debug!(document = name, "document produced no chunks; skipping");
            return Ok(0);
        }

        let embeddings = self.embedder.embed(self.model, &chunks)?;
        if embeddings.len() != chunks.len() {
            return Err(AppError::new(
                "AI_EMBEDDINGS_FAILED",
                "Embedding count does not match chunk count",
            )
            .with_details(format!(
                "document={name}; chunks={}; embeddings={}",
                chunks.len(),
                embeddings.len()
            )));
        }

        let source = source_name(name);
        let records = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(text, embedding)| ChunkRecord {
                text,
                source: source.clone(),
                embedding,
            })
            .collect::<Vec<_>>();
        let added = self.store.append(records)?;
        tracing::info!(document = %source, chunks = added, "indexed document");
        Ok(added)
    }

    /// Top `k` chunks for `query`, best first. An empty store answers without embedding.
    pub fn search(&self, query: &str, k: usize) -> Result<Vec<RetrievalHit>, AppError> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let chunks = self.store.load()?;
        if chunks.is_empty() {
            return Ok(Vec::new());
        }

        let mut vectors = self.embedder.embed(self.model, &[query.to_string()])?;
        let query_embedding = match vectors.pop() {
            Some(v) if vectors.is_empty() => v,
            _ => {
                return Err(AppError::new(
                    "AI_EMBEDDINGS_FAILED",
                    "Expected exactly one query embedding",
                ))
            }
        };

        let hits = store::rank_by_similarity(chunks, &query_embedding, k);
        tracing::debug!(k, hits = hits.len(), "transcript search complete");
        Ok(hits)
    }

    pub fn stats(&self) -> Result<StoreStats, AppError> {
        let chunks = self.store.load()?;
        let sources: BTreeSet<String> = chunks.iter().map(|c| c.source.clone()).collect();
        Ok(StoreStats {
            chunk_count: chunks.len(),
            sources: sources.into_iter().collect(),
        })
    }

    pub fn clear(&self) -> Result<(), AppError> {
        self.store.clear()?;
        tracing::info!("cleared retrieval store");
        Ok(())
    }
}

fn source_name(name: &str) -> String {
    Path::new(name)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(name)
        .to_string()
}
