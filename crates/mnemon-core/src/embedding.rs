//! # Embedding Provider Contract
//!
//! The embedding provider turns block content into a fixed-length numeric
//! vector. The engine consumes it through the [`EmbeddingProvider`] trait;
//! the real implementation lives outside the core and is injected.
//!
//! The zero-vector rule is core behavior: empty text yields a
//! deterministic all-zero vector of the configured dimension without
//! invoking the provider at all.

use crate::types::MnemonError;

// =============================================================================
// EMBEDDING PROVIDER TRAIT
// =============================================================================

/// The EmbeddingProvider trait defines the embedding boundary.
///
/// Implementors should be stateless and side-effect free from the
/// engine's point of view; `embed` is a blocking call.
pub trait EmbeddingProvider {
    /// The fixed output dimension of this provider.
    fn dimension(&self) -> usize;

    /// Embed non-empty text into a vector of `dimension()` elements.
    fn embed(&self, text: &str) -> Result<Vec<f32>, MnemonError>;

    /// Embed text, short-circuiting empty input to the all-zero vector
    /// without invoking the provider.
    fn embed_or_zero(&self, text: &str) -> Result<Vec<f32>, MnemonError> {
        if text.is_empty() {
            Ok(vec![0.0; self.dimension()])
        } else {
            self.embed(text)
        }
    }
}

// =============================================================================
// DISTANCE METRIC
// =============================================================================

/// Squared Euclidean distance between two vectors.
///
/// Returns `None` on dimension mismatch or empty input. For unit-length
/// vectors the value lies in `[0, 4]`; the loose smart-insert threshold
/// of `1.0` then corresponds to a cosine similarity of at least `0.5`.
#[must_use]
pub fn squared_l2(a: &[f32], b: &[f32]) -> Option<f64> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let mut sum = 0.0f64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let d = f64::from(x) - f64::from(y);
        sum += d * d;
    }
    Some(sum)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedProvider {
        dim: usize,
        calls: std::cell::Cell<usize>,
    }

    impl EmbeddingProvider for FixedProvider {
        fn dimension(&self) -> usize {
            self.dim
        }

        fn embed(&self, _text: &str) -> Result<Vec<f32>, MnemonError> {
            self.calls.set(self.calls.get() + 1);
            Ok(vec![1.0; self.dim])
        }
    }

    #[test]
    fn empty_text_yields_zero_vector_without_provider_call() {
        let provider = FixedProvider {
            dim: 4,
            calls: std::cell::Cell::new(0),
        };
        let v = provider.embed_or_zero("").expect("embed");
        assert_eq!(v, vec![0.0; 4]);
        assert_eq!(provider.calls.get(), 0);
    }

    #[test]
    fn non_empty_text_invokes_provider() {
        let provider = FixedProvider {
            dim: 2,
            calls: std::cell::Cell::new(0),
        };
        let v = provider.embed_or_zero("hello").expect("embed");
        assert_eq!(v, vec![1.0, 1.0]);
        assert_eq!(provider.calls.get(), 1);
    }

    #[test]
    fn squared_l2_identical_vectors_is_zero() {
        let v = vec![0.5, 0.5, 0.1];
        assert_eq!(squared_l2(&v, &v), Some(0.0));
    }

    #[test]
    fn squared_l2_rejects_mismatched_dimensions() {
        assert_eq!(squared_l2(&[1.0], &[1.0, 2.0]), None);
        assert_eq!(squared_l2(&[], &[]), None);
    }

    #[test]
    fn squared_l2_orthogonal_unit_vectors() {
        let a = [1.0, 0.0];
        let b = [0.0, 1.0];
        let d = squared_l2(&a, &b).expect("distance");
        assert!((d - 2.0).abs() < 1e-9);
    }
}
