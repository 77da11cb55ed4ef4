pub mod agent;
pub mod config;
pub mod embeddings;
pub mod llm;
pub mod ollama;
pub mod retrieve;
pub mod sql_guard;
pub mod tools;
