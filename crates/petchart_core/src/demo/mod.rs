use rusqlite::{params, Connection, Transaction};
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::{Duration, OffsetDateTime};

use crate::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DemoSeedSummary {
    pub already_seeded: bool,
    pub pet_name: String,
    pub visit_datetime: Option<String>,
    pub tests: Vec<String>,
    pub results_inserted: usize,
}

// (analyte_id, code, name, unit, dog reference low, dog reference high)
const ANALYTES: [(&str, &str, &str, &str, f64, f64); 18] = [
    ("ANALYTE001", "WBC", "White Blood Cell Count", "10^3/μL", 6.0, 17.0),
    ("ANALYTE002", "RBC", "Red Blood Cell Count", "10^6/μL", 5.5, 8.5),
    ("ANALYTE003", "HCT", "Hematocrit", "%", 37.0, 55.0),
    ("ANALYTE004", "HGB", "Hemoglobin", "g/dL", 12.0, 18.0),
    ("ANALYTE005", "PLT", "Platelet Count", "10^3/μL", 200.0, 500.0),
    ("ANALYTE006", "NEU", "Neutrophils", "%", 60.0, 77.0),
    ("ANALYTE007", "LYM", "Lymphocytes", "%", 12.0, 30.0),
    ("ANALYTE008", "BUN", "Blood Urea Nitrogen", "mg/dL", 7.0, 27.0),
    ("ANALYTE009", "CREA", "Creatinine", "mg/dL", 0.5, 1.6),
    ("ANALYTE010", "ALT", "Alanine Aminotransferase", "U/L", 10.0, 100.0),
    ("ANALYTE011", "ALP", "Alkaline Phosphatase", "U/L", 23.0, 212.0),
    ("ANALYTE012", "GLU", "Glucose", "mg/dL", 70.0, 120.0),
    ("ANALYTE013", "TP", "Total Protein", "g/dL", 5.2, 7.2),
    ("ANALYTE014", "ALB", "Albumin", "g/dL", 2.5, 4.0),
    ("ANALYTE015", "GLOB", "Globulin", "g/dL", 2.3, 3.5),
    ("ANALYTE016", "NA", "Sodium", "mEq/L", 140.0, 154.0),
    ("ANALYTE017", "K", "Potassium", "mEq/L", 3.5, 5.6),
    ("ANALYTE018", "CL", "Chloride", "mEq/L", 105.0, 115.0),
];

// (result_id, test_id, analyte_id, value, flag). The first seven belong to the CBC.
const RESULTS: [(&str, &str, &str, f64, &str); 18] = [
    ("RESULT001", "TEST001", "ANALYTE001", 18.5, "H"),
    ("RESULT002", "TEST001", "ANALYTE002", 5.8, "N"),
    ("RESULT003", "TEST001", "ANALYTE003", 42.0, "N"),
    ("RESULT004", "TEST001", "ANALYTE004", 14.2, "N"),
    ("RESULT005", "TEST001", "ANALYTE005", 185.0, "L"),
    ("RESULT006", "TEST001", "ANALYTE006", 78.0, "H"),
    ("RESULT007", "TEST001", "ANALYTE007", 15.0, "N"),
    ("RESULT008", "TEST002", "ANALYTE008", 32.0, "H"),
    ("RESULT009", "TEST002", "ANALYTE009", 1.8, "H"),
    ("RESULT010", "TEST002", "ANALYTE010", 85.0, "N"),
    ("RESULT011", "TEST002", "ANALYTE011", 245.0, "H"),
    ("RESULT012", "TEST002", "ANALYTE012", 95.0, "N"),
    ("RESULT013", "TEST002", "ANALYTE013", 6.8, "N"),
    ("RESULT014", "TEST002", "ANALYTE014", 3.2, "N"),
    ("RESULT015", "TEST002", "ANALYTE015", 3.6, "N"),
    ("RESULT016", "TEST002", "ANALYTE016", 148.0, "N"),
    ("RESULT017", "TEST002", "ANALYTE017", 4.2, "N"),
    ("RESULT018", "TEST002", "ANALYTE018", 108.0, "N"),
];

fn seed_err(what: &str, e: impl std::fmt::Display) -> AppError {
    AppError::new("DB_SEED_FAILED", format!("Failed to seed demo {what}")).with_details(e.to_string())
}

fn rfc3339(ts: OffsetDateTime) -> Result<String, AppError> {
    ts.format(&Rfc3339).map_err(|e| {
        AppError::new("DB_SEED_FAILED", "Failed to format demo timestamp").with_details(e.to_string())
    })
}

/// Seed Daisy the dog with one visit, a CBC and a chemistry panel.
///
/// Re-seeding is a no-op once Daisy exists. Results are reported two hours after `visit_at`.
pub fn seed_demo_patient(
    conn: &mut Connection,
    visit_at: OffsetDateTime,
) -> Result<DemoSeedSummary, AppError> {
    let existing: i64 = conn
        .query_row("SELECT COUNT(*) FROM pets WHERE name = 'Daisy'", [], |row| row.get(0))
        .map_err(|e| seed_err("pet lookup", e))?;
    if existing > 0 {
        tracing::info!("demo patient already present; skipping seed");
        return Ok(DemoSeedSummary {
            already_seeded: true,
            pet_name: "Daisy".to_string(),
            visit_datetime: None,
            tests: Vec::new(),
            results_inserted: 0,
        });
    }

    let visit_ts = rfc3339(visit_at)?;
    let result_ts = rfc3339(visit_at + Duration::hours(2))?;

    let tx = conn.transaction().map_err(|e| {
        AppError::new("DB_TX_FAILED", "Failed to start seed transaction").with_details(e.to_string())
    })?;
    insert_patient(&tx, &visit_ts)?;
    insert_catalog(&tx)?;
    let tests = insert_tests(&tx, &visit_ts, &result_ts)?;
    let results_inserted = insert_results(&tx)?;
    tx.commit().map_err(|e| {
        AppError::new("DB_TX_FAILED", "Failed to commit seed transaction").with_details(e.to_string())
    })?;

    tracing::info!(visit = %visit_ts, results = results_inserted, "seeded demo patient");
    Ok(DemoSeedSummary {
        already_seeded: false,
        pet_name: "Daisy".to_string(),
        visit_datetime: Some(visit_ts),
        tests,
        results_inserted,
    })
}

fn insert_patient(tx: &Transaction<'_>, visit_ts: &str) -> Result<(), AppError> {
    tx.execute(
        "INSERT INTO owners (owner_id, full_name, phone, email) VALUES (?1, ?2, ?3, ?4)",
        params!["OWNER001", "Alex Morgan", "555-0100", "alex.morgan@example.com"],
    )
    .map_err(|e| seed_err("owner", e))?;

    tx.execute(
        r#"INSERT INTO pets (pet_id, owner_id, name, species, breed, sex, date_of_birth, weight_kg)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
        params!["PET001", "OWNER001", "Daisy", "Dog", "Mixed breed", "FN", "2018-03-15", 18.2],
    )
    .map_err(|e| seed_err("pet", e))?;

    tx.execute(
        r#"INSERT INTO visits (visit_id, pet_id, clinic_name, visit_datetime, chief_complaint, notes)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
        params![
            "VISIT001",
            "PET001",
            "Happy Paws Veterinary Clinic",
            visit_ts,
            "Vomiting, lethargy, decreased appetite for 2 days",
            "Patient presented with acute onset of vomiting and lethargy. Owner reports decreased appetite and some dehydration."
        ],
    )
    .map_err(|e| seed_err("visit", e))?;
    Ok(())
}

fn insert_catalog(tx: &Transaction<'_>) -> Result<(), AppError> {
    let mut analyte = tx
        .prepare("INSERT INTO analytes (analyte_id, analyte_code, analyte_name, unit) VALUES (?1, ?2, ?3, ?4)")
        .map_err(|e| seed_err("analytes", e))?;
    let mut range = tx
        .prepare(
            r#"INSERT INTO reference_ranges (range_id, species, analyte_id, low_value, high_value, notes)
               VALUES (?1, 'Dog', ?2, ?3, ?4, NULL)"#,
        )
        .map_err(|e| seed_err("reference ranges", e))?;

    for (i, (id, code, name, unit, low, high)) in ANALYTES.iter().enumerate() {
        analyte
            .execute(params![id, code, name, unit])
            .map_err(|e| seed_err("analytes", e))?;
        range
            .execute(params![format!("RANGE{:03}", i + 1), id, low, high])
            .map_err(|e| seed_err("reference ranges", e))?;
    }
    Ok(())
}

fn insert_tests(tx: &Transaction<'_>, visit_ts: &str, result_ts: &str) -> Result<Vec<String>, AppError> {
    let tests = [("TEST001", "CBC", "Blood"), ("TEST002", "Chemistry Panel", "Serum")];
    for (id, name, specimen) in tests.iter() {
        tx.execute(
            r#"INSERT INTO tests (test_id, visit_id, test_name, specimen_type, ordered_datetime, result_datetime, status)
               VALUES (?1, 'VISIT001', ?2, ?3, ?4, ?5, 'Final')"#,
            params![id, name, specimen, visit_ts, result_ts],
        )
        .map_err(|e| seed_err("tests", e))?;
    }
    Ok(tests.iter().map(|(_, name, _)| name.to_string()).collect())
}

fn insert_results(tx: &Transaction<'_>) -> Result<usize, AppError> {
    let mut stmt = tx
        .prepare(
            r#"INSERT INTO test_results (result_id, test_id, analyte_id, value_num, value_text, unit, flag, comment)
               VALUES (?1, ?2, ?3, ?4, NULL, (SELECT unit FROM analytes WHERE analyte_id = ?3), ?5, NULL)"#,
        )
        .map_err(|e| seed_err("results", e))?;
    for (id, test_id, analyte_id, value, flag) in RESULTS.iter() {
        stmt.execute(params![id, test_id, analyte_id, value, flag])
            .map_err(|e| seed_err("results", e))?;
    }
    Ok(RESULTS.len())
}

/// Delete every clinical row, keeping the schema.
pub fn clear_demo_data(conn: &mut Connection) -> Result<(), AppError> {
    let tx = conn.transaction().map_err(|e| {
        AppError::new("DB_TX_FAILED", "Failed to start clear transaction").with_details(e.to_string())
    })?;
    for table in [
        "test_results",
        "tests",
        "visits",
        "pets",
        "owners",
        "reference_ranges",
        "analytes",
    ] {
        tx.execute(&format!("DELETE FROM {table}"), []).map_err(|e| {
            AppError::new("DB_CLEAR_FAILED", "Failed to clear diagnostics data")
                .with_details(format!("table={table}; err={e}"))
        })?;
    }
    tx.commit().map_err(|e| {
        AppError::new("DB_TX_FAILED", "Failed to commit clear transaction").with_details(e.to_string())
    })?;
    tracing::info!("cleared diagnostics data");
    Ok(())
}
