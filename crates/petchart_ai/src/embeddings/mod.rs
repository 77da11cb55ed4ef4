use petchart_core::error::AppError;

/// Embedding capability. Batched and order-preserving: output `i` embeds input `i`.
pub trait Embedder {
    fn embed(&self, model: &str, inputs: &[String]) -> Result<Vec<Vec<f32>>, AppError>;
}

pub mod ollama_embed;
