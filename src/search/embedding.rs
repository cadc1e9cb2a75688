//! Embedding provider capability and the built-in harmonic projection model
//!
//! The model is deterministic and training-free: each token is read as a
//! base-2^16 integer, reduced modulo a set of coprime moduli, and every
//! residue is projected onto the unit circle. A text vector is the mean of
//! its token vectors, L2-normalized.

use std::f64::consts::TAU;

use crate::error::{FinderError, Result};

/// Output dimension: two coordinates (sin, cos) per modulus
pub const EMBEDDING_DIM: usize = 384;

const MODULI_COUNT: usize = EMBEDDING_DIM / 2;

/// Code points considered per token
const MAX_TOKEN_CHARS: usize = 64;

/// Text in, fixed-dimension L2-normalized vector out.
///
/// Implementations hold immutable state after construction, so one instance
/// is shared by the builder and the search engine.
pub trait EmbeddingProvider: Send + Sync {
    fn dimension(&self) -> usize;

    /// Embed an ordered batch; output is one vector per input, same order
    fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single non-blank text
    fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(FinderError::EmptyInput);
        }
        self.embed(&[text])?
            .pop()
            .ok_or_else(|| FinderError::NotFound("embedding for query".to_string()))
    }
}

/// Harmonic token projection embedding model
#[derive(Debug, Clone)]
pub struct HarmonicEmbedder {
    moduli: Vec<u64>,
}

impl HarmonicEmbedder {
    pub fn new() -> Self {
        Self {
            moduli: first_primes(MODULI_COUNT),
        }
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut sum = vec![0.0f64; EMBEDDING_DIM];
        let mut count = 0usize;

        for token in split_tokens(text) {
            let n = token_value(&token);
            for (i, &m) in self.moduli.iter().enumerate() {
                let theta = TAU * (n % m) as f64 / m as f64;
                sum[2 * i] += theta.sin();
                sum[2 * i + 1] += theta.cos();
            }
            count += 1;
        }

        if count == 0 {
            return vec![0.0; EMBEDDING_DIM];
        }

        // Mean pooling cancels under normalization, so only the norm matters
        let norm = sum.iter().map(|x| x * x).sum::<f64>().sqrt();
        if norm > 0.0 {
            sum.iter().map(|x| (x / norm) as f32).collect()
        } else {
            sum.iter().map(|&x| x as f32).collect()
        }
    }
}

impl Default for HarmonicEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl EmbeddingProvider for HarmonicEmbedder {
    fn dimension(&self) -> usize {
        EMBEDDING_DIM
    }

    fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

/// Lowercased words split on whitespace and ASCII punctuation
fn split_tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| c.is_whitespace() || c.is_ascii_punctuation())
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase)
}

/// N = sum(u_j * 2^16^(L-j)), wrapping on overflow
fn token_value(token: &str) -> u64 {
    token
        .chars()
        .take(MAX_TOKEN_CHARS)
        .fold(0u64, |n, c| n.wrapping_mul(65_536).wrapping_add(c as u64))
}

fn first_primes(count: usize) -> Vec<u64> {
    let mut primes: Vec<u64> = Vec::with_capacity(count);
    let mut candidate = 2u64;
    while primes.len() < count {
        if primes
            .iter()
            .take_while(|&&p| p * p <= candidate)
            .all(|&p| candidate % p != 0)
        {
            primes.push(candidate);
        }
        candidate += 1;
    }
    primes
}

/// Dot product; equals cosine similarity for L2-normalized inputs
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(v: &[f32]) -> f32 {
        v.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    #[test]
    fn test_first_primes() {
        let primes = first_primes(10);
        assert_eq!(primes, vec![2, 3, 5, 7, 11, 13, 17, 19, 23, 29]);
        assert_eq!(first_primes(MODULI_COUNT).len(), MODULI_COUNT);
    }

    #[test]
    fn test_deterministic_across_instances() {
        let a = HarmonicEmbedder::new();
        let b = HarmonicEmbedder::new();
        let text = "the quick brown fox";
        assert_eq!(a.embed_one(text).unwrap(), b.embed_one(text).unwrap());
    }

    #[test]
    fn test_normalized_output() {
        let model = HarmonicEmbedder::new();
        let v = model.embed_one("stock market finance").unwrap();
        assert_eq!(v.len(), EMBEDDING_DIM);
        assert!((norm(&v) - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_batch_preserves_order() {
        let model = HarmonicEmbedder::new();
        let batch = model.embed(&["cat dog", "stock market"]).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0], model.embed_one("cat dog").unwrap());
        assert_eq!(batch[1], model.embed_one("stock market").unwrap());
    }

    #[test]
    fn test_shared_tokens_raise_similarity() {
        let model = HarmonicEmbedder::new();
        let q = model.embed_one("gpu memory").unwrap();
        let near = model.embed_one("gpu memory sharing").unwrap();
        let far = model.embed_one("cooking recipes").unwrap();
        assert!(dot(&q, &near) > dot(&q, &far));
        assert!((dot(&q, &q) - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_blank_input() {
        let model = HarmonicEmbedder::new();
        assert!(matches!(model.embed_one("   "), Err(FinderError::EmptyInput)));
        // Blank entries inside a batch are allowed and map to the zero vector
        let batch = model.embed(&[""]).unwrap();
        assert!(batch[0].iter().all(|&x| x == 0.0));
    }
}
