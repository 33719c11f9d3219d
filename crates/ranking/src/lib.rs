//! Similarity and ranking primitives shared by the scoring engines.
//! Everything here is pure and side-effect free.

pub mod ranking;
pub mod similarity;

pub use ranking::{
    apply_diversity_penalty, apply_recency_boost, apply_recency_boost_at, normalize_scores,
    sort_by_score, weighted_average,
};
pub use similarity::{
    cosine_similarity, euclidean_distance, euclidean_similarity, jaccard_similarity,
    manhattan_distance, pearson_correlation,
};
