use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::tools::{QueryResult, RetrievedChunk};

/// Rows kept per structured result, both in the bundle and in the composing prompt.
pub const PREVIEW_ROWS: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SqlEvidence {
    pub query: String,
    pub columns: Vec<String>,
    pub row_count: usize,
    pub preview: Vec<Map<String, Value>>,
}

impl SqlEvidence {
    pub fn from_result(query: &str, res: &QueryResult) -> Self {
        Self {
            query: query.to_string(),
            columns: res.columns.clone(),
            row_count: res.row_count,
            preview: res.rows.iter().take(PREVIEW_ROWS).cloned().collect(),
        }
    }
}

/// Everything gathered during one turn. Owned by that turn only.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EvidenceBundle {
    pub retrieved_chunks: Vec<RetrievedChunk>,
    pub sql_queries: Vec<String>,
    pub sql_results: Vec<SqlEvidence>,
}

impl EvidenceBundle {
    pub fn has_transcripts(&self) -> bool {
        !self.retrieved_chunks.is_empty()
    }

    pub fn has_structured_rows(&self) -> bool {
        self.sql_results.iter().any(|r| r.row_count > 0)
    }

    pub fn is_empty(&self) -> bool {
        self.retrieved_chunks.is_empty() && self.sql_results.is_empty()
    }
}

pub(crate) fn sql_context_block(evidence: &SqlEvidence, refined: bool) -> String {
    let title = if refined {
        "Lab Results (refined query)"
    } else {
        "Lab Results"
    };
    let mut out = format!(
        "{title}:\nColumns: {}\nTotal rows: {}\nSample rows:\n",
        evidence.columns.join(", "),
        evidence.row_count
    );
    for row in evidence.preview.iter() {
        out.push_str(&Value::Object(row.clone()).to_string());
        out.push('\n');
    }
    out
}

pub(crate) fn sql_placeholder(res: &QueryResult, refined: bool) -> String {
    match (&res.error, refined) {
        (Some(err), false) => format!("SQL Error: {err}"),
        (Some(err), true) => format!("Refined SQL Error: {err}"),
        (None, false) => "SQL query returned no results.".to_string(),
        (None, true) => "Refined SQL query returned no results.".to_string(),
    }
}

pub(crate) fn transcript_context_block(chunks: &[RetrievedChunk]) -> String {
    if chunks.is_empty() {
        return "No relevant transcript excerpts found.".to_string();
    }
    let mut out = "Visit Transcript Excerpts:\n".to_string();
    for c in chunks {
        out.push_str(&format!(
            "[{}] From {} (score: {:.3}):\n{}\n\n",
            c.chunk_id, c.source_doc, c.score, c.text
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transcript_block_labels_chunks_and_scores() {
        let block = transcript_context_block(&[RetrievedChunk {
            chunk_id: 1,
            text: "Start a bland diet.".to_string(),
            score: 0.91234,
            source_doc: "discharge.md".to_string(),
        }]);
        assert!(block.starts_with("Visit Transcript Excerpts:\n"));
        assert!(block.contains("[1] From discharge.md (score: 0.912):\nStart a bland diet."));
    }

    #[test]
    fn preview_is_bounded() {
        let rows = (0..25)
            .map(|i| {
                let mut m = Map::new();
                m.insert("n".to_string(), Value::from(i));
                m
            })
            .collect::<Vec<_>>();
        let res = QueryResult {
            columns: vec!["n".to_string()],
            row_count: rows.len(),
            rows,
            error: None,
            executed_sql: None,
        };
        let ev = SqlEvidence::from_result("SELECT n FROM t", &res);
        assert_eq!(ev.row_count, 25);
        assert_eq!(ev.preview.len(), PREVIEW_ROWS);
        assert!(sql_context_block(&ev, false).contains("Total rows: 25"));
    }
}
