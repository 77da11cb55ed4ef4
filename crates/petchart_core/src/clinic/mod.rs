use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VisitSummary {
    pub visit_id: String,
    pub visit_datetime: String,
    pub pet_name: String,
    pub species: String,
    pub chief_complaint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VisitTest {
    pub test_id: String,
    pub test_name: String,
    pub specimen_type: Option<String>,
    pub ordered_datetime: Option<String>,
    pub result_datetime: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalyteResult {
    pub test_name: String,
    pub analyte_code: String,
    pub analyte_name: String,
    pub value_num: Option<f64>,
    pub value_text: Option<String>,
    pub unit: Option<String>,
    pub flag: Option<String>,
}

impl AnalyteResult {
    pub fn is_abnormal(&self) -> bool {
        matches!(self.flag.as_deref(), Some("H") | Some("L"))
    }
}

fn query_err(what: &str, e: rusqlite::Error) -> AppError {
    AppError::new("DB_QUERY_FAILED", format!("Failed to query {what}")).with_details(e.to_string())
}

fn analyte_from_row(row: &Row<'_>) -> rusqlite::Result<AnalyteResult> {
    Ok(AnalyteResult {
        analyte_code: row.get(0)?,
        analyte_name: row.get(1)?,
        value_num: row.get(2)?,
        value_text: row.get(3)?,
        unit: row.get(4)?,
        flag: row.get(5)?,
        test_name: row.get(6)?,
    })
}

/// Most recent visits first.
pub fn recent_visits(conn: &Connection, limit: u32) -> Result<Vec<VisitSummary>, AppError> {
    let mut stmt = conn
        .prepare(
            r#"
      SELECT v.visit_id, v.visit_datetime, p.name AS pet_name, p.species, v.chief_complaint
      FROM visits v
      JOIN pets p ON p.pet_id = v.pet_id
      ORDER BY v.visit_datetime DESC
      LIMIT ?1
      "#,
        )
        .map_err(|e| query_err("visits", e))?;
    let rows = stmt
        .query_map(params![limit], |row| {
            Ok(VisitSummary {
                visit_id: row.get(0)?,
                visit_datetime: row.get(1)?,
                pet_name: row.get(2)?,
                species: row.get(3)?,
                chief_complaint: row.get(4)?,
            })
        })
        .map_err(|e| query_err("visits", e))?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(|e| query_err("visits", e))
}

pub fn visit_tests(conn: &Connection, visit_id: &str) -> Result<Vec<VisitTest>, AppError> {
    let mut stmt = conn
        .prepare(
            r#"
      SELECT test_id, test_name, specimen_type, ordered_datetime, result_datetime, status
      FROM tests
      WHERE visit_id = ?1
      ORDER BY ordered_datetime, test_id
      "#,
        )
        .map_err(|e| query_err("visit tests", e))?;
    let rows = stmt
        .query_map(params![visit_id], |row| {
            Ok(VisitTest {
                test_id: row.get(0)?,
                test_name: row.get(1)?,
                specimen_type: row.get(2)?,
                ordered_datetime: row.get(3)?,
                result_datetime: row.get(4)?,
                status: row.get(5)?,
            })
        })
        .map_err(|e| query_err("visit tests", e))?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(|e| query_err("visit tests", e))
}

/// Results flagged high or low for one visit, capped at 50 rows.
pub fn abnormal_results(conn: &Connection, visit_id: &str) -> Result<Vec<AnalyteResult>, AppError> {
    let mut stmt = conn
        .prepare(
            r#"
      SELECT analyte_code, analyte_name, value_num, value_text, unit, flag, test_name
      FROM v_results
      WHERE visit_id = ?1 AND flag IN ('H', 'L')
      ORDER BY test_name, analyte_code
      LIMIT 50
      "#,
        )
        .map_err(|e| query_err("abnormal results", e))?;
    let rows = stmt
        .query_map(params![visit_id], analyte_from_row)
        .map_err(|e| query_err("abnormal results", e))?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(|e| query_err("abnormal results", e))
}

/// All results for one visit, optionally narrowed to a single test, capped at 50 rows.
pub fn test_results(
    conn: &Connection,
    visit_id: &str,
    test_name: Option<&str>,
) -> Result<Vec<AnalyteResult>, AppError> {
    let mut stmt = conn
        .prepare(
            r#"
      SELECT analyte_code, analyte_name, value_num, value_text, unit, flag, test_name
      FROM v_results
      WHERE visit_id = ?1 AND (?2 IS NULL OR test_name = ?2)
      ORDER BY test_name, analyte_code
      LIMIT 50
      "#,
        )
        .map_err(|e| query_err("test results", e))?;
    let rows = stmt
        .query_map(params![visit_id, test_name], analyte_from_row)
        .map_err(|e| query_err("test results", e))?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(|e| query_err("test results", e))
}
