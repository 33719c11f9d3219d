//! Vector and set similarity measures.

use recsys_core::{RecError, RecResult};
use std::collections::HashSet;
use std::hash::Hash;

fn check_lengths(a: &[f64], b: &[f64]) -> RecResult<()> {
    if a.len() != b.len() {
        return Err(RecError::InvalidInput(format!(
            "vector length mismatch: {} vs {}",
            a.len(),
            b.len()
        )));
    }
    Ok(())
}

/// Cosine of the angle between `a` and `b`. Zero when either vector has
/// zero magnitude.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> RecResult<f64> {
    check_lengths(a, b)?;

    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }
    // Rounding can push identical vectors a hair past 1.0
    Ok((dot / (norm_a * norm_b)).clamp(-1.0, 1.0))
}

/// |A ∩ B| / |A ∪ B|, with two empty sets scoring 0.
pub fn jaccard_similarity<T: Eq + Hash>(a: &HashSet<T>, b: &HashSet<T>) -> f64 {
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    if union == 0 {
        return 0.0;
    }
    intersection as f64 / union as f64
}

/// Pearson correlation over the paired prefix of `a` and `b`. Zero when
/// there are fewer than two pairs or either series has no variance.
pub fn pearson_correlation(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n < 2 {
        return 0.0;
    }
    let (a, b) = (&a[..n], &b[..n]);
    let mean_a = a.iter().sum::<f64>() / n as f64;
    let mean_b = b.iter().sum::<f64>() / n as f64;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in a.iter().zip(b) {
        let dx = x - mean_a;
        let dy = y - mean_b;
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }

    if var_a == 0.0 || var_b == 0.0 {
        return 0.0;
    }
    cov / (var_a.sqrt() * var_b.sqrt())
}

pub fn euclidean_distance(a: &[f64], b: &[f64]) -> RecResult<f64> {
    check_lengths(a, b)?;
    Ok(a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt())
}

pub fn manhattan_distance(a: &[f64], b: &[f64]) -> RecResult<f64> {
    check_lengths(a, b)?;
    Ok(a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum())
}

/// Maps euclidean distance into (0, 1]: `1 / (1 + d)`.
pub fn euclidean_similarity(a: &[f64], b: &[f64]) -> RecResult<f64> {
    Ok(1.0 / (1.0 + euclidean_distance(a, b)?))
}
