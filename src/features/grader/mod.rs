
use std::sync::Arc;
use tracing::debug;

use crate::config::validate_similarity_threshold;
use crate::embeddings::{EmbeddingProvider, embed_blocking};
use crate::{Result, StudyError};

/// Cosine similarity in `[-1, 1]`, or `None` when either vector has zero
/// magnitude or the lengths differ
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f64> {
    if a.len() != b.len() {
        return None;
    }

    let (dot, norm_a, norm_b) = a.iter().zip(b).fold(
        (0.0_f64, 0.0_f64, 0.0_f64),
        |(dot, na, nb), (&x, &y)| {
            let (x, y) = (f64::from(x), f64::from(y));
            (dot + x * y, na + x * x, nb + y * y)
        },
    );

    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }

    Some((dot / (norm_a * norm_b).sqrt()).clamp(-1.0, 1.0))
}

/// Semantic answer check: true iff the two answers' embeddings are at least
/// `threshold` cosine-similar
#[inline]
pub fn is_correct(
    embedder: &dyn EmbeddingProvider,
    candidate: &str,
    reference: &str,
    threshold: f32,
) -> Result<bool> {
    validate_similarity_threshold(threshold)?;
    let vectors = embedder.embed(&[candidate.to_string(), reference.to_string()])?;
    Ok(passes(&vectors, threshold)?.0)
}

fn passes(vectors: &[Vec<f32>], threshold: f32) -> Result<(bool, Option<f64>)> {
    let [candidate, reference] = vectors else {
        return Err(StudyError::Provider(format!(
            "Expected 2 embeddings for grading, got {}",
            vectors.len()
        )));
    };

    if candidate.len() != reference.len() {
        return Err(StudyError::Provider(format!(
            "Embeddings for grading differ in size: {} vs {} dimensions",
            candidate.len(),
            reference.len()
        )));
    }

    let similarity = cosine_similarity(candidate, reference);
    let correct = similarity.is_some_and(|s| s >= f64::from(threshold));
    Ok((correct, similarity))
}

#[derive(Clone)]
pub struct AnswerGrader {
    embedder: Arc<dyn EmbeddingProvider>,
    threshold: f32,
}

impl std::fmt::Debug for AnswerGrader {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnswerGrader")
            .field("embedder", &self.embedder.model_name())
            .field("threshold", &self.threshold)
            .finish()
    }
}

impl AnswerGrader {
    #[inline]
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, threshold: f32) -> Result<Self> {
        validate_similarity_threshold(threshold)?;
        Ok(Self {
            embedder,
            threshold,
        })
    }

    #[inline]
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    #[inline]
    pub async fn grade(&self, candidate: &str, reference: &str) -> Result<bool> {
        Ok(self.score(candidate, reference).await?.0)
    }

    /// Verdict together with the similarity it was based on (`None` for a
    /// zero-magnitude embedding)
    #[inline]
    pub async fn score(&self, candidate: &str, reference: &str) -> Result<(bool, Option<f64>)> {
        let vectors = embed_blocking(
            Arc::clone(&self.embedder),
            vec![candidate.to_string(), reference.to_string()],
        )
        .await?;

        let (correct, similarity) = passes(&vectors, self.threshold)?;
        debug!(
            "Graded answer: similarity {:?}, threshold {}, correct {}",
            similarity, self.threshold, correct
        );
        Ok((correct, similarity))
    }
}
