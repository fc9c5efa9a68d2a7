//! Brute-force cosine similarity store

use async_trait::async_trait;
use kbchat_application::{RetrievalError, VectorStore};
use kbchat_domain::Passage;

/// An immutable snapshot of embedded passages.
///
/// Search is O(n); fine for the document counts a chat session ingests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryVectorStore {
    entries: Vec<(Vec<f32>, Passage)>,
}

impl InMemoryVectorStore {
    pub fn new(entries: Vec<(Vec<f32>, Passage)>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn similarity_search(
        &self,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<Passage>, RetrievalError> {
        if let Some((first, _)) = self.entries.first()
            && first.len() != vector.len()
        {
            return Err(RetrievalError::Unavailable(format!(
                "query has {} dimensions, index has {}",
                vector.len(),
                first.len()
            )));
        }

        let mut scored: Vec<(f64, &Passage)> = self
            .entries
            .iter()
            .map(|(embedding, passage)| (cosine_similarity(vector, embedding), passage))
            .collect();
        // Stable sort keeps ingestion order among equal scores.
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(_, passage)| passage.clone())
            .collect())
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let dot: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| (*x as f64) * (*y as f64))
        .sum();
    let norm_a = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> InMemoryVectorStore {
        InMemoryVectorStore::new(vec![
            (vec![1.0, 0.0], Passage::new("east")),
            (vec![0.0, 1.0], Passage::new("north")),
            (vec![0.7, 0.7], Passage::new("north-east")),
        ])
    }

    #[tokio::test]
    async fn test_results_ranked_by_similarity() {
        let hits = store().similarity_search(&[1.0, 0.1], 3).await.unwrap();
        let names: Vec<_> = hits.iter().map(|p| p.content.as_str()).collect();
        assert_eq!(names, vec!["east", "north-east", "north"]);
    }

    #[tokio::test]
    async fn test_k_bounds_results() {
        let hits = store().similarity_search(&[0.0, 1.0], 1).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].content, "north");
    }

    #[tokio::test]
    async fn test_empty_store_is_an_empty_result() {
        let hits = InMemoryVectorStore::default()
            .similarity_search(&[1.0], 3)
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_an_error() {
        let err = store().similarity_search(&[1.0, 0.0, 0.0], 3).await;
        assert!(matches!(err, Err(RetrievalError::Unavailable(_))));
    }

    #[test]
    fn test_zero_vector_scores_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }
}
