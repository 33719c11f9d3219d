//! Score post-processing: normalization, weighting and re-ranking passes.

use chrono::{DateTime, Utc};
use recsys_core::types::Recommendation;
use recsys_core::{RecError, RecResult};
use std::collections::HashMap;

const SECONDS_PER_YEAR: f64 = 365.0 * 24.0 * 3600.0;

/// Min-max scale into [0, 1]. When every score is equal each output is 1.
pub fn normalize_scores(scores: &[f64]) -> Vec<f64> {
    if scores.is_empty() {
        return Vec::new();
    }
    let min = scores.iter().copied().fold(f64::INFINITY, f64::min);
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    if range == 0.0 {
        return vec![1.0; scores.len()];
    }
    scores.iter().map(|s| (s - min) / range).collect()
}

pub fn weighted_average(scores: &[f64], weights: &[f64]) -> RecResult<f64> {
    if scores.len() != weights.len() {
        return Err(RecError::InvalidInput(format!(
            "scores and weights differ in length: {} vs {}",
            scores.len(),
            weights.len()
        )));
    }
    let total_weight: f64 = weights.iter().sum();
    if total_weight == 0.0 {
        return Ok(0.0);
    }
    let weighted: f64 = scores.iter().zip(weights).map(|(s, w)| s * w).sum();
    Ok(weighted / total_weight)
}

/// Walks the list in its current order and lowers each score by
/// `weight × (earlier items sharing its category + earlier items sharing its
/// brand)`. The first item of a category or brand is never penalized.
pub fn apply_diversity_penalty(mut recs: Vec<Recommendation>, weight: f64) -> Vec<Recommendation> {
    let mut seen_categories: HashMap<String, usize> = HashMap::new();
    let mut seen_brands: HashMap<String, usize> = HashMap::new();

    for rec in recs.iter_mut() {
        let category_seen = seen_categories
            .get(&rec.product.category)
            .copied()
            .unwrap_or(0);
        let brand_seen = rec
            .product
            .brand
            .as_ref()
            .and_then(|b| seen_brands.get(b).copied())
            .unwrap_or(0);

        let penalty = weight * (category_seen + brand_seen) as f64;
        rec.score = (rec.score - penalty).max(0.0);

        *seen_categories
            .entry(rec.product.category.clone())
            .or_insert(0) += 1;
        if let Some(brand) = &rec.product.brand {
            *seen_brands.entry(brand.clone()).or_insert(0) += 1;
        }
    }
    recs
}

/// Adds `weight × max(0, 1 − age / 1 year)` to each score, capped at 1.0.
pub fn apply_recency_boost(recs: Vec<Recommendation>, weight: f64) -> Vec<Recommendation> {
    apply_recency_boost_at(recs, weight, Utc::now())
}

pub fn apply_recency_boost_at(
    mut recs: Vec<Recommendation>,
    weight: f64,
    now: DateTime<Utc>,
) -> Vec<Recommendation> {
    for rec in recs.iter_mut() {
        let age_secs = (now - rec.product.created_at).num_seconds().max(0) as f64;
        let freshness = (1.0 - age_secs / SECONDS_PER_YEAR).max(0.0);
        rec.score = (rec.score + weight * freshness).min(1.0);
    }
    recs
}

/// Stable descending sort by score.
pub fn sort_by_score(recs: &mut [Recommendation]) {
    recs.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}
