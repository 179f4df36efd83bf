//! Embedding service.
//!
//! Thin facade over the LLM provider's embedding endpoint, plus the cosine
//! similarity used everywhere retrieval scores are computed.

use std::sync::Arc;

use crate::core::errors::ApiError;
use crate::llm::LlmProvider;

#[derive(Clone)]
pub struct EmbeddingService {
    provider: Arc<dyn LlmProvider>,
    model: String,
}

impl EmbeddingService {
    pub fn new(provider: Arc<dyn LlmProvider>, model: String) -> Self {
        Self { provider, model }
    }

    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, ApiError> {
        let input = [text.to_string()];
        let mut embeddings = self.provider.embed(&input, &self.model).await?;
        embeddings
            .pop()
            .ok_or_else(|| ApiError::Provider("provider returned no embedding".to_string()))
    }

    /// Embeds all texts in a single provider call. Empty input makes no call.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let embeddings = self.provider.embed(texts, &self.model).await?;
        if embeddings.len() != texts.len() {
            return Err(ApiError::Provider(format!(
                "embedding batch mismatch: {} texts, {} vectors",
                texts.len(),
                embeddings.len()
            )));
        }
        Ok(embeddings)
    }
}

/// Cosine similarity, clamped to [-1, 1].
///
/// Degenerate inputs (length mismatch, empty, zero norm) score 0.0 so a bad
/// vector can never rank above the threshold or poison an average with NaN.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    try_cosine_similarity(a, b).unwrap_or(0.0)
}

/// Cosine similarity when it is defined; `None` for degenerate inputs.
/// Averages over similarities should skip `None` rather than count it as 0.
pub fn try_cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    let denom = norm_a * norm_b;

    if denom <= f32::EPSILON {
        None
    } else {
        Some((dot / denom).clamp(-1.0, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(left: f32, right: f32) -> bool {
        (left - right).abs() < 1e-5
    }

    #[test]
    fn cosine_is_one_for_identical_vectors() {
        let vec = vec![1.0, 2.0, 3.0, 4.0];
        assert!(approx_eq(cosine_similarity(&vec, &vec), 1.0));
    }

    #[test]
    fn cosine_is_zero_for_orthogonal_vectors() {
        assert!(approx_eq(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0));
    }

    #[test]
    fn cosine_is_negative_for_opposed_vectors() {
        assert!(approx_eq(cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]), -1.0));
    }

    #[test]
    fn zero_norm_scores_zero_not_nan() {
        let score = cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]);
        assert!(approx_eq(score, 0.0));
        assert!(!score.is_nan());
    }

    #[test]
    fn length_mismatch_scores_zero() {
        assert!(approx_eq(cosine_similarity(&[1.0, 0.0], &[1.0]), 0.0));
    }

    #[test]
    fn degenerate_inputs_are_undefined_not_zero() {
        assert_eq!(try_cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), None);
        assert_eq!(try_cosine_similarity(&[1.0, 0.0], &[1.0]), None);
        assert!(try_cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]).is_some());
    }
}
