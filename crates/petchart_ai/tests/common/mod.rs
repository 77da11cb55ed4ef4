#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::path::PathBuf;

use petchart_ai::embeddings::Embedder;
use petchart_ai::llm::{ChatMessage, GenerationOptions, Llm};
use petchart_ai::tools::SqliteExecutor;
use petchart_core::db;
use petchart_core::demo::seed_demo_patient;
use petchart_core::error::AppError;
use tempfile::TempDir;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Diagnostics database on disk with the demo patient, reopened read-only.
pub fn seeded_executor() -> (TempDir, PathBuf, SqliteExecutor) {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("diagnostics.sqlite");
    {
        let mut conn = db::open(&path).expect("open");
        db::migrate(&mut conn).expect("migrate");
        let at = OffsetDateTime::parse("2026-01-09T10:00:00Z", &Rfc3339).expect("timestamp");
        seed_demo_patient(&mut conn, at).expect("seed");
    }
    let exec = SqliteExecutor::open_read_only(&path).expect("open read-only");
    (dir, path, exec)
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub messages: Vec<ChatMessage>,
    pub options: GenerationOptions,
}

/// Replies from a fixed script, in order, and records every request.
pub struct ScriptedLlm {
    replies: RefCell<VecDeque<String>>,
    pub calls: RefCell<Vec<RecordedCall>>,
}

impl ScriptedLlm {
    pub fn new(replies: &[&str]) -> Self {
        Self {
            replies: RefCell::new(replies.iter().map(|s| s.to_string()).collect()),
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }

    pub fn prompt(&self, idx: usize) -> String {
        self.calls.borrow()[idx]
            .messages
            .iter()
            .map(|m| m.content.clone())
            .collect::<Vec<_>>()
            .join("\n---\n")
    }
}

impl Llm for ScriptedLlm {
    fn complete(
        &self,
        _model: &str,
        messages: &[ChatMessage],
        options: GenerationOptions,
    ) -> Result<String, AppError> {
        self.calls.borrow_mut().push(RecordedCall {
            messages: messages.to_vec(),
            options,
        });
        self.replies
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| AppError::new("AI_COMPLETION_FAILED", "script exhausted"))
    }
}

/// Embeds text as letter counts for a handful of keywords.
#[derive(Default)]
pub struct KeywordEmbedder {
    pub calls: Cell<usize>,
}

const KEYWORDS: [&str; 4] = ["kidney", "water", "diet", "vomit"];

impl Embedder for KeywordEmbedder {
    fn embed(&self, _model: &str, inputs: &[String]) -> Result<Vec<Vec<f32>>, AppError> {
        self.calls.set(self.calls.get() + 1);
        Ok(inputs
            .iter()
            .map(|s| {
                let lower = s.to_lowercase();
                KEYWORDS
                    .iter()
                    .map(|k| lower.matches(k).count() as f32)
                    .collect()
            })
            .collect())
    }
}
