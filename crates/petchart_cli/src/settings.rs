use std::path::PathBuf;

use petchart_ai::config::AgentConfig;
use petchart_core::error::AppError;

pub const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";
pub const DEFAULT_DB_PATH: &str = "diagnostics.sqlite";
pub const DEFAULT_STORE_PATH: &str = "rag_store.json";

/// Values given explicitly on the command line. They win over everything else.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub config: Option<PathBuf>,
    pub ollama_url: Option<String>,
    pub db_path: Option<PathBuf>,
    pub store_path: Option<PathBuf>,
    pub model: Option<String>,
    pub embed_model: Option<String>,
}

/// Fully resolved runtime settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub agent: AgentConfig,
    pub ollama_url: String,
    pub db_path: PathBuf,
    pub store_path: PathBuf,
}

impl Settings {
    /// Config file, then `PETCHART_*` environment variables, then flags.
    pub fn resolve(flags: &Overrides) -> Result<Self, AppError> {
        Self::resolve_with(flags, |key| std::env::var(key).ok())
    }

    pub(crate) fn resolve_with(
        flags: &Overrides,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, AppError> {
        let mut agent = match flags.config.as_deref() {
            Some(path) => AgentConfig::from_json_file(path)?,
            None => AgentConfig::default(),
        };

        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());
        if let Some(model) = flags.model.clone().or_else(|| env("PETCHART_CHAT_MODEL")) {
            agent.model = model;
        }
        if let Some(model) = flags
            .embed_model
            .clone()
            .or_else(|| env("PETCHART_EMBED_MODEL"))
        {
            agent.embed_model = model;
        }
        agent.validate()?;

        let ollama_url = flags
            .ollama_url
            .clone()
            .or_else(|| env("PETCHART_OLLAMA_URL"))
            .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string());
        let db_path = flags
            .db_path
            .clone()
            .or_else(|| env("PETCHART_DB_PATH").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH));
        let store_path = flags
            .store_path
            .clone()
            .or_else(|| env("PETCHART_STORE_PATH").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_PATH));

        Ok(Self {
            agent,
            ollama_url,
            db_path,
            store_path,
        })
    }
}
