mod common;

use std::cell::RefCell;

use petchart_ai::retrieve::{ChunkRecord, MemoryStore, Retriever};
use petchart_ai::tools::{query_structured, search_transcripts, QueryExecutor};
use petchart_core::db::QueryRows;
use petchart_core::error::AppError;
use pretty_assertions::assert_eq;

use common::{seeded_executor, KeywordEmbedder};

/// Records what reaches the executor.
#[derive(Default)]
struct RecordingExecutor {
    seen: RefCell<Vec<String>>,
}

impl QueryExecutor for RecordingExecutor {
    fn execute(&self, sql: &str) -> Result<QueryRows, AppError> {
        self.seen.borrow_mut().push(sql.to_string());
        Ok(QueryRows {
            columns: vec!["n".to_string()],
            rows: Vec::new(),
            row_count: 0,
        })
    }
}

#[test]
fn rejected_query_never_reaches_executor() {
    let exec = RecordingExecutor::default();
    let res = query_structured(&exec, "DELETE FROM test_results", 50);

    assert_eq!(res.error.as_deref(), Some("forbidden keyword: DELETE"));
    assert!(res.columns.is_empty());
    assert!(res.rows.is_empty());
    assert_eq!(res.row_count, 0);
    assert_eq!(res.executed_sql, None);
    assert!(exec.seen.borrow().is_empty());
}

#[test]
fn accepted_query_is_capped_before_execution() {
    let exec = RecordingExecutor::default();
    let res = query_structured(&exec, "SELECT COUNT(*) AS n FROM pets", 25);

    assert_eq!(res.error, None);
    assert_eq!(
        exec.seen.borrow().as_slice(),
        ["SELECT COUNT(*) AS n FROM pets LIMIT 25".to_string()]
    );
    assert_eq!(
        res.executed_sql.as_deref(),
        Some("SELECT COUNT(*) AS n FROM pets LIMIT 25")
    );
}

#[test]
fn latest_cbc_rows_come_back_from_the_demo_database() {
    let (_dir, _path, exec) = seeded_executor();
    let res = query_structured(
        &exec,
        "SELECT analyte_code, value_num, unit, flag FROM v_results \
         WHERE pet_name = 'Daisy' AND test_name = 'CBC' ORDER BY analyte_code",
        50,
    );

    assert_eq!(res.error, None);
    assert_eq!(res.columns, vec!["analyte_code", "value_num", "unit", "flag"]);
    assert!(res.row_count > 0);
    assert_eq!(res.row_count, res.rows.len());
    let wbc = res
        .rows
        .iter()
        .find(|r| r["analyte_code"] == "WBC")
        .expect("WBC row");
    assert_eq!(wbc["flag"], "H");
}

#[test]
fn row_cap_limits_returned_rows() {
    let (_dir, _path, exec) = seeded_executor();
    let res = query_structured(&exec, "SELECT * FROM v_results", 5);
    assert_eq!(res.error, None);
    assert_eq!(res.row_count, 5);
}

#[test]
fn trailing_comment_cannot_swallow_the_cap() {
    let (_dir, _path, exec) = seeded_executor();
    let res = query_structured(&exec, "SELECT * FROM v_results -- all rows", 5);

    assert_eq!(res.error, None);
    assert_eq!(res.row_count, 5);
    assert_eq!(res.rows.len(), 5);
    assert_eq!(
        res.executed_sql.as_deref(),
        Some("SELECT * FROM v_results -- all rows\nLIMIT 5")
    );
}

#[test]
fn subquery_limit_does_not_unbound_the_outer_query() {
    let (_dir, _path, exec) = seeded_executor();
    let res = query_structured(
        &exec,
        "SELECT * FROM v_results WHERE visit_id IN (SELECT visit_id FROM visits LIMIT 1)",
        5,
    );

    assert_eq!(res.error, None);
    assert_eq!(res.row_count, 5);
    assert_eq!(res.rows.len(), 5);
}

/// Ignores the statement and always hands back `n` rows.
struct FixedRowsExecutor {
    n: usize,
}

impl QueryExecutor for FixedRowsExecutor {
    fn execute(&self, _sql: &str) -> Result<QueryRows, AppError> {
        let rows = (0..self.n)
            .map(|i| {
                let mut row = serde_json::Map::new();
                row.insert("n".to_string(), serde_json::Value::from(i));
                row
            })
            .collect::<Vec<_>>();
        Ok(QueryRows {
            columns: vec!["n".to_string()],
            row_count: rows.len(),
            rows,
        })
    }
}

#[test]
fn rows_past_the_cap_are_dropped_after_execution() {
    let res = query_structured(&FixedRowsExecutor { n: 18 }, "SELECT n FROM pets", 5);
    assert_eq!(res.error, None);
    assert_eq!(res.row_count, 5);
    let ns = res.rows.iter().map(|r| r["n"].clone()).collect::<Vec<_>>();
    assert_eq!(ns, (0..5).map(serde_json::Value::from).collect::<Vec<_>>());

    let small = query_structured(&FixedRowsExecutor { n: 3 }, "SELECT n FROM pets", 5);
    assert_eq!(small.row_count, 3);
}

#[test]
fn missing_table_is_surfaced_as_error_text() {
    let (_dir, _path, exec) = seeded_executor();
    let res = query_structured(&exec, "SELECT * FROM lab_panels", 50);

    let err = res.error.expect("error");
    assert!(err.contains("DB_QUERY_FAILED"), "{err}");
    assert!(err.contains("lab_panels"), "{err}");
    assert_eq!(res.row_count, 0);
    assert_eq!(
        res.executed_sql.as_deref(),
        Some("SELECT * FROM lab_panels LIMIT 50")
    );
}

#[test]
fn transcript_hits_get_sequential_labels() {
    let store = MemoryStore::with_chunks(vec![
        ChunkRecord {
            text: "Drinking more water".to_string(),
            source: "intake.md".to_string(),
            embedding: vec![0.0, 1.0, 0.0, 0.0],
        },
        ChunkRecord {
            text: "Recheck kidney values".to_string(),
            source: "plan.md".to_string(),
            embedding: vec![1.0, 0.0, 0.0, 0.0],
        },
        ChunkRecord {
            text: "Kidney diet discussed".to_string(),
            source: "plan.md".to_string(),
            embedding: vec![1.0, 0.0, 1.0, 0.0],
        },
    ]);
    let embedder = KeywordEmbedder::default();
    let retriever = Retriever::new(&store, &embedder, "mock");

    let found = search_transcripts(&retriever, "kidney", 2).expect("search");
    assert_eq!(found.count, 2);
    let ids = found.chunks.iter().map(|c| c.chunk_id).collect::<Vec<_>>();
    assert_eq!(ids, vec![1, 2]);
    assert_eq!(found.chunks[0].text, "Recheck kidney values");
    assert_eq!(found.chunks[0].source_doc, "plan.md");
}
