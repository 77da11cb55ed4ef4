//! Evidence tools the orchestrator can invoke: transcript search and structured queries.

use std::path::Path;

use petchart_core::db::{self, QueryRows};
use petchart_core::error::AppError;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::retrieve::Retriever;
use crate::sql_guard::{check_read_only, enforce_cap};

/// Query-execution capability over the structured diagnostics store.
pub trait QueryExecutor {
    fn execute(&self, sql: &str) -> Result<QueryRows, AppError>;
}

pub struct SqliteExecutor {
    conn: Connection,
}

impl SqliteExecutor {
    pub fn open_read_only(path: &Path) -> Result<Self, AppError> {
        Ok(Self {
            conn: db::open_read_only(path)?,
        })
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }
}

impl QueryExecutor for SqliteExecutor {
    fn execute(&self, sql: &str) -> Result<QueryRows, AppError> {
        db::read_query(&self.conn, sql)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievedChunk {
    /// 1-based position in this result list; a label, not a stable id.
    pub chunk_id: usize,
    pub text: String,
    pub score: f32,
    pub source_doc: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TranscriptSearch {
    pub chunks: Vec<RetrievedChunk>,
    pub count: usize,
}

pub fn search_transcripts(
    retriever: &Retriever<'_>,
    query: &str,
    top_k: usize,
) -> Result<TranscriptSearch, AppError> {
    let chunks = retriever
        .search(query, top_k)?
        .into_iter()
        .enumerate()
        .map(|(i, hit)| RetrievedChunk {
            chunk_id: i + 1,
            text: hit.text,
            score: hit.score,
            source_doc: hit.source,
        })
        .collect::<Vec<_>>();
    Ok(TranscriptSearch {
        count: chunks.len(),
        chunks,
    })
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Map<String, Value>>,
    pub row_count: usize,
    pub error: Option<String>,
    /// The statement actually sent to the executor, after the row cap was applied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executed_sql: Option<String>,
}

impl QueryResult {
    fn failed(error: String, executed_sql: Option<String>) -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
            row_count: 0,
            error: Some(error),
            executed_sql,
        }
    }

    pub fn has_rows(&self) -> bool {
        self.error.is_none() && !self.rows.is_empty()
    }
}

/// Gate, cap and execute a generated query. Never fails: rejections and execution
/// errors come back in `error`.
pub fn query_structured(executor: &dyn QueryExecutor, sql: &str, max_rows: u64) -> QueryResult {
    if let Err(rejection) = check_read_only(sql) {
        return QueryResult::failed(rejection.to_string(), None);
    }

    let capped = enforce_cap(sql, max_rows);
    match executor.execute(&capped) {
        Ok(mut res) => {
            // The LIMIT rewrite is lexical, so rows past the cap are dropped here too.
            let cap = usize::try_from(max_rows).unwrap_or(usize::MAX);
            if res.rows.len() > cap {
                tracing::warn!(
                    sql = %capped,
                    rows = res.rows.len(),
                    cap,
                    "truncating rows past the cap"
                );
                res.rows.truncate(cap);
            }
            QueryResult {
                columns: res.columns,
                row_count: res.rows.len(),
                rows: res.rows,
                error: None,
                executed_sql: Some(capped),
            }
        }
        Err(e) => {
            tracing::warn!(sql = %capped, error = %e.describe(), "structured query failed");
            QueryResult::failed(e.describe(), Some(capped))
        }
    }
}
