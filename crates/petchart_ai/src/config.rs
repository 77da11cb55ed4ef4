use std::fs;
use std::path::Path;

use petchart_core::error::AppError;
use serde::{Deserialize, Serialize};

use crate::retrieve::ChunkingOptions;

/// Settings consumed by the retrieval engine and the orchestrator.
///
/// Every field has a default, so a JSON file only needs the keys it overrides.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AgentConfig {
    pub model: String,
    pub embed_model: String,
    pub top_k: usize,
    pub max_tool_calls: u32,
    pub sql_max_rows: u64,
    pub target_chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: "llama3.1".to_string(),
            embed_model: "nomic-embed-text".to_string(),
            top_k: 4,
            max_tool_calls: 3,
            sql_max_rows: 50,
            target_chunk_size: 1000,
            chunk_overlap: 150,
        }
    }
}

impl AgentConfig {
    pub fn from_json_file(path: &Path) -> Result<Self, AppError> {
        let raw = fs::read_to_string(path).map_err(|e| {
            AppError::new("CONFIG_READ_FAILED", "Failed to read config file")
                .with_details(format!("path={}; err={}", path.display(), e))
        })?;
        let cfg: AgentConfig = serde_json::from_str(&raw).map_err(|e| {
            AppError::new("CONFIG_INVALID", "Failed to decode config file")
                .with_details(format!("path={}; err={}", path.display(), e))
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        let problem = if self.model.trim().is_empty() {
            Some("model must not be empty".to_string())
        } else if self.embed_model.trim().is_empty() {
            Some("embed_model must not be empty".to_string())
        } else if self.top_k == 0 {
            Some("top_k must be at least 1".to_string())
        } else if self.sql_max_rows == 0 {
            Some("sql_max_rows must be at least 1".to_string())
        } else if self.target_chunk_size == 0 {
            Some("target_chunk_size must be at least 1".to_string())
        } else if self.chunk_overlap >= self.target_chunk_size {
            Some(format!(
                "chunk_overlap ({}) must be smaller than target_chunk_size ({})",
                self.chunk_overlap, self.target_chunk_size
            ))
        } else {
            None
        };

        match problem {
            Some(details) => Err(AppError::new("CONFIG_INVALID", "Invalid agent configuration")
                .with_details(details)),
            None => Ok(()),
        }
    }

    pub fn chunking(&self) -> ChunkingOptions {
        ChunkingOptions {
            target_size: self.target_chunk_size,
            overlap: self.chunk_overlap,
        }
    }
}
