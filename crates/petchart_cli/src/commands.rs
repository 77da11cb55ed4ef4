use std::fs;
use std::path::PathBuf;

use petchart_ai::agent::{AgenticResponse, Orchestrator};
use petchart_ai::embeddings::ollama_embed::OllamaEmbedder;
use petchart_ai::llm::ollama_llm::OllamaLlm;
use petchart_ai::ollama::OllamaClient;
use petchart_ai::retrieve::{JsonFileStore, Retriever, StoreStats};
use petchart_ai::tools::SqliteExecutor;
use petchart_core::clinic::{abnormal_results, recent_visits, test_results, AnalyteResult};
use petchart_core::db;
use petchart_core::demo::{clear_demo_data, seed_demo_patient};
use petchart_core::error::AppError;
use time::{Duration, OffsetDateTime};

use crate::settings::Settings;

fn open_and_migrate(settings: &Settings) -> Result<rusqlite::Connection, AppError> {
    let mut conn = db::open(&settings.db_path)?;
    db::migrate(&mut conn)?;
    Ok(conn)
}

fn ollama(settings: &Settings) -> Result<OllamaClient, AppError> {
    OllamaClient::new(&settings.ollama_url)
}

pub fn init_db(settings: &Settings) -> Result<String, AppError> {
    let _conn = open_and_migrate(settings)?;
    Ok(format!(
        "Diagnostics database ready at {}",
        settings.db_path.display()
    ))
}

pub fn seed_demo(settings: &Settings) -> Result<String, AppError> {
    let mut conn = open_and_migrate(settings)?;
    let visit_at = OffsetDateTime::now_utc() - Duration::days(2);
    let summary = seed_demo_patient(&mut conn, visit_at)?;

    if summary.already_seeded {
        return Ok(format!(
            "Demo patient {} already present; nothing inserted",
            summary.pet_name
        ));
    }
    Ok(format!(
        "Seeded {} (visit {}): {} with {} results",
        summary.pet_name,
        summary.visit_datetime.as_deref().unwrap_or("-"),
        summary.tests.join(", "),
        summary.results_inserted
    ))
}

pub fn clear_demo(settings: &Settings) -> Result<String, AppError> {
    let mut conn = open_and_migrate(settings)?;
    clear_demo_data(&mut conn)?;
    Ok("Cleared all diagnostics data".to_string())
}

pub fn index(settings: &Settings, files: &[PathBuf]) -> Result<String, AppError> {
    let store = JsonFileStore::open(settings.store_path.clone());
    let embedder = OllamaEmbedder::new(ollama(settings)?);
    let retriever = Retriever::new(&store, &embedder, &settings.agent.embed_model);
    let chunking = settings.agent.chunking();

    let mut lines = Vec::new();
    for file in files {
        let content = fs::read_to_string(file).map_err(|e| {
            AppError::new("INDEX_READ_FAILED", "Failed to read document")
                .with_details(format!("path={}; err={}", file.display(), e))
        })?;
        let name = file.to_string_lossy();
        let added = retriever.add_document(&name, &content, &chunking)?;
        lines.push(format!("{}: {added} chunks", file.display()));
    }
    Ok(lines.join("\n"))
}

pub fn clear_store(settings: &Settings) -> Result<String, AppError> {
    let store = JsonFileStore::open(settings.store_path.clone());
    let embedder = OllamaEmbedder::new(ollama(settings)?);
    Retriever::new(&store, &embedder, &settings.agent.embed_model).clear()?;
    Ok(format!("Cleared {}", settings.store_path.display()))
}

pub fn stats(settings: &Settings) -> Result<String, AppError> {
    let store = JsonFileStore::open(settings.store_path.clone());
    let embedder = OllamaEmbedder::new(ollama(settings)?);
    let stats = Retriever::new(&store, &embedder, &settings.agent.embed_model).stats()?;
    Ok(render_stats(&stats))
}

fn render_stats(stats: &StoreStats) -> String {
    let mut out = format!("Chunks: {}\nSources: {}", stats.chunk_count, stats.sources.len());
    for source in &stats.sources {
        out.push_str(&format!("\n  - {source}"));
    }
    out
}

pub fn visits(settings: &Settings, limit: u32) -> Result<String, AppError> {
    let conn = open_and_migrate(settings)?;
    let visits = recent_visits(&conn, limit)?;
    if visits.is_empty() {
        return Ok("No visits recorded".to_string());
    }
    Ok(visits
        .iter()
        .map(|v| {
            format!(
                "{}  {}  {} ({})  {}",
                v.visit_id,
                v.visit_datetime,
                v.pet_name,
                v.species,
                v.chief_complaint.as_deref().unwrap_or("")
            )
            .trim_end()
            .to_string()
        })
        .collect::<Vec<_>>()
        .join("\n"))
}

pub fn results(
    settings: &Settings,
    visit_id: &str,
    test: Option<&str>,
    abnormal_only: bool,
) -> Result<String, AppError> {
    let conn = open_and_migrate(settings)?;
    let rows = if abnormal_only {
        abnormal_results(&conn, visit_id)?
            .into_iter()
            .filter(|r| test.map_or(true, |t| r.test_name == t))
            .collect()
    } else {
        test_results(&conn, visit_id, test)?
    };
    if rows.is_empty() {
        return Ok(format!("No results for visit {visit_id}"));
    }
    Ok(rows.iter().map(render_result).collect::<Vec<_>>().join("\n"))
}

fn render_result(r: &AnalyteResult) -> String {
    let value = match (r.value_num, r.value_text.as_deref()) {
        (Some(v), _) => v.to_string(),
        (None, Some(t)) => t.to_string(),
        (None, None) => "-".to_string(),
    };
    let line = format!(
        "{:<16} {:<6} {:<28} {:>8} {:<10} {}",
        r.test_name,
        r.analyte_code,
        r.analyte_name,
        value,
        r.unit.as_deref().unwrap_or(""),
        r.flag.as_deref().unwrap_or("")
    );
    line.trim_end().to_string()
}

pub fn ask(settings: &Settings, question: &str, as_json: bool) -> Result<String, AppError> {
    let client = ollama(settings)?;
    let llm = OllamaLlm::new(client.clone());
    let embedder = OllamaEmbedder::new(client);
    let store = JsonFileStore::open(settings.store_path.clone());
    let executor = SqliteExecutor::open_read_only(&settings.db_path)?;

    let retriever = Retriever::new(&store, &embedder, &settings.agent.embed_model);
    let orchestrator = Orchestrator::new(&llm, retriever, &executor, &settings.agent);
    let response = orchestrator.answer(question, &[])?;

    if as_json {
        return serde_json::to_string_pretty(&response).map_err(|e| {
            AppError::new("OUTPUT_ENCODE_FAILED", "Failed to encode response")
                .with_details(e.to_string())
        });
    }
    Ok(render_answer(&response))
}

fn render_answer(response: &AgenticResponse) -> String {
    format!(
        "{}\n\nConfidence: {} ({})",
        response.final_answer.trim(),
        response.confidence.as_str(),
        response.confidence_reason
    )
}

pub fn health(settings: &Settings) -> Result<String, AppError> {
    let client = ollama(settings)?;
    client.health_check()?;
    Ok(format!("Ollama reachable at {}", client.base_url()))
}
