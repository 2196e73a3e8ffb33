//! Cosine similarity, for dense feature vectors and for 0/1 incidence vectors.

use std::collections::BTreeSet;

/// Cosine of the angle between two equally long vectors.
///
/// Returns 0 when either vector has zero norm.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    let mut dot = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Cosine similarity of two 0/1 vectors given as the sets of their nonzero
/// positions: |A ∩ B| / sqrt(|A| * |B|).
pub fn binary_cosine<T: Ord>(a: &BTreeSet<T>, b: &BTreeSet<T>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let shared = small.iter().filter(|x| large.contains(x)).count();
    shared as f64 / ((a.len() * b.len()) as f64).sqrt()
}
