//! Embedding trait and vector utilities.
//!
//! Defines the [`Embedder`] trait that embedding backends implement, plus
//! pure helpers for vector serialization and distance computation.
//!
//! Concrete providers (local fastembed, OpenAI, Ollama) live in the
//! `convo-recall` app crate.

use anyhow::Result;
use async_trait::async_trait;

use crate::models::Exchange;

/// Dimensionality of exchange embeddings.
pub const EMBEDDING_DIMS: usize = 384;

/// Maximum number of characters of an exchange fed to the embedder.
pub const MAX_EMBEDDING_CHARS: usize = 2000;

/// Text in, fixed-length vector out.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"all-minilm-l6-v2"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality.
    fn dims(&self) -> usize;
    /// Embed a batch of texts, returning one vector per input in order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Embed a single string.
pub async fn embed_one(embedder: &dyn Embedder, text: &str) -> Result<Vec<f32>> {
    embedder
        .embed(&[text.to_string()])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("Empty embedding response"))
}

/// The text embedded for an exchange: both turns, truncated to
/// [`MAX_EMBEDDING_CHARS`] characters.
pub fn exchange_embedding_text(exchange: &Exchange) -> String {
    let combined = format!(
        "User: {}\n\nAssistant: {}",
        exchange.user_message, exchange.assistant_message
    );
    combined.chars().take(MAX_EMBEDDING_CHARS).collect()
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// # Example
///
/// ```rust
/// use convo_recall_core::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12); // 3 × 4 bytes
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Euclidean distance between two vectors.
///
/// Returns `f64::INFINITY` for vectors of different lengths so they sort
/// behind every comparable candidate.
pub fn l2_distance(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return f64::INFINITY;
    }
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = (*x as f64) - (*y as f64);
            d * d
        })
        .sum::<f64>()
        .sqrt()
}
