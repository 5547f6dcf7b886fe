//! Embedding generation for semantic search over course content.
//!
//! Course titles and content chunks are embedded at index time; queries and
//! course names are embedded at search time. All vectors in one store must
//! come from the same model and dimension count.

mod openai;

pub use openai::OpenAIEmbedder;

use crate::config::EmbeddingSettings;
use crate::error::{PensumError, Result};
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed many texts, preserving input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn dimensions(&self) -> usize;
}

/// Create the embedder configured in settings.
pub fn create_embedder(settings: &EmbeddingSettings) -> Result<Arc<dyn Embedder>> {
    if settings.dimensions == 0 {
        return Err(PensumError::Config(
            "embedding.dimensions must be greater than zero".to_string(),
        ));
    }
    Ok(Arc::new(OpenAIEmbedder::with_config(
        &settings.model,
        settings.dimensions as usize,
    )?))
}

/// Reject vectors whose length differs from `expected`.
pub(crate) fn check_dimensions(embedding: &[f32], expected: usize) -> Result<()> {
    if embedding.len() != expected {
        return Err(PensumError::Embedding(format!(
            "Expected {} dimensions, got {}",
            expected,
            embedding.len()
        )));
    }
    Ok(())
}
