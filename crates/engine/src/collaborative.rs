//! Neighborhood collaborative filtering over implicit feedback.
//!
//! Each user's behavior list becomes an item-score vector (purchase 5,
//! cart 3, wishlist 2, view 1, rating its own value; the strongest signal
//! per product wins). Neighbors are users whose vectors have a cosine
//! similarity above the configured threshold, measured over the items both
//! users touched. Candidates are products neighbors liked that the
//! requesting user has not interacted with yet.

use crate::catalog::CatalogSnapshot;
use parking_lot::RwLock;
use recsys_cache::LocalCache;
use recsys_core::config::{CacheConfig, CollaborativeConfig};
use recsys_core::types::{
    ReasonType, Recommendation, RecommendationReason, SimilarityScore, User, UserBehavior,
};
use recsys_ranking::{cosine_similarity, sort_by_score};
use std::collections::{HashMap, HashSet};
use tracing::debug;

pub const USER_BASED_ALGORITHM: &str = "user_based_cf";
pub const ITEM_BASED_ALGORITHM: &str = "item_based_cf";

/// Most similar items kept per product by the item-based precompute.
const MAX_SIMILAR_ITEMS: usize = 20;

pub type ItemScores = HashMap<String, f64>;

/// Collapse a behavior list into product -> strongest implicit weight.
pub fn item_scores(behaviors: &[UserBehavior]) -> ItemScores {
    let mut scores = ItemScores::new();
    for behavior in behaviors {
        let Some(weight) = behavior.behavior_type.base_weight(behavior.value) else {
            continue;
        };
        scores
            .entry(behavior.product_id.clone())
            .and_modify(|s| *s = s.max(weight))
            .or_insert(weight);
    }
    scores
}

/// Cosine similarity restricted to the items both users scored. Returns the
/// similarity and the number of shared items.
pub fn user_similarity(a: &ItemScores, b: &ItemScores) -> (f64, usize) {
    let mut common: Vec<&String> = a.keys().filter(|k| b.contains_key(*k)).collect();
    if common.is_empty() {
        return (0.0, 0);
    }
    common.sort();
    let va: Vec<f64> = common.iter().map(|k| a[*k]).collect();
    let vb: Vec<f64> = common.iter().map(|k| b[*k]).collect();
    // Equal length by construction
    let similarity = cosine_similarity(&va, &vb).unwrap_or(0.0);
    (similarity, common.len())
}

pub struct CollaborativeFilter {
    config: CollaborativeConfig,
    neighbors: LocalCache<String, Vec<SimilarityScore>>,
    /// product -> [(similar product, similarity)], filled by the precompute.
    item_similarities: RwLock<HashMap<String, Vec<(String, f64)>>>,
}

impl CollaborativeFilter {
    pub fn new(config: CollaborativeConfig, cache: &CacheConfig) -> Self {
        Self {
            config,
            neighbors: LocalCache::with_ttl_secs("neighbors", cache.ttl_secs, cache.max_size),
            item_similarities: RwLock::new(HashMap::new()),
        }
    }

    /// Neighbors of `user_id`, most similar first. Cached per user.
    pub fn find_similar_users(
        &self,
        user_id: &str,
        user_scores: &ItemScores,
        all_behaviors: &HashMap<String, Vec<UserBehavior>>,
    ) -> Vec<SimilarityScore> {
        if let Some(cached) = self.neighbors.get(&user_id.to_string()) {
            return cached;
        }

        let mut neighbors: Vec<SimilarityScore> = all_behaviors
            .iter()
            .filter(|(other_id, _)| other_id.as_str() != user_id)
            .filter_map(|(other_id, behaviors)| {
                let other_scores = item_scores(behaviors);
                let (similarity, common_items) = user_similarity(user_scores, &other_scores);
                (common_items > 0 && similarity >= self.config.min_similarity).then(|| {
                    SimilarityScore {
                        user_id: user_id.to_string(),
                        similar_user_id: other_id.clone(),
                        similarity,
                        common_items,
                    }
                })
            })
            .collect();

        neighbors.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.similar_user_id.cmp(&b.similar_user_id))
        });
        neighbors.truncate(self.config.max_neighbors);

        debug!(user_id = %user_id, neighbors = neighbors.len(), "Computed similar users");
        self.neighbors.put(user_id.to_string(), neighbors.clone());
        neighbors
    }

    /// User-based recommendations. An empty list means no neighbor was found;
    /// degrading from there is the orchestrator's job.
    pub fn get_recommendations(
        &self,
        user: &User,
        all_behaviors: &HashMap<String, Vec<UserBehavior>>,
        catalog: &CatalogSnapshot,
        limit: usize,
    ) -> Vec<Recommendation> {
        let user_scores = item_scores(&user.behavior_history);
        if user_scores.is_empty() {
            return Vec::new();
        }

        let neighbors = self.find_similar_users(&user.id, &user_scores, all_behaviors);
        if neighbors.is_empty() {
            return Vec::new();
        }

        let mut candidates: HashMap<String, f64> = HashMap::new();
        let mut supporters: HashMap<String, usize> = HashMap::new();
        for neighbor in &neighbors {
            let Some(behaviors) = all_behaviors.get(&neighbor.similar_user_id) else {
                continue;
            };
            for (product_id, score) in item_scores(behaviors) {
                if user_scores.contains_key(&product_id) {
                    continue;
                }
                *candidates.entry(product_id.clone()).or_insert(0.0) += score * neighbor.similarity;
                *supporters.entry(product_id).or_insert(0) += 1;
            }
        }

        let max_score = candidates.values().copied().fold(0.0_f64, f64::max);
        if max_score <= 0.0 {
            return Vec::new();
        }

        let mut recs: Vec<Recommendation> = candidates
            .into_iter()
            .filter_map(|(product_id, raw)| {
                let product = catalog.get(&product_id)?.clone();
                let score = raw / max_score;
                let support = supporters.get(&product_id).copied().unwrap_or(0);
                let explanation = if support == 1 {
                    "A shopper with similar taste liked this".to_string()
                } else {
                    format!("{support} shoppers with similar taste liked this")
                };
                Some(Recommendation::new(
                    product,
                    score,
                    RecommendationReason {
                        reason_type: ReasonType::Collaborative,
                        explanation,
                        confidence: score,
                        factors: vec!["similar_users".to_string()],
                    },
                    USER_BASED_ALGORITHM,
                ))
            })
            .collect();

        // HashMap order is arbitrary; tie-break on id for stable output
        recs.sort_by(|a, b| a.product_id.cmp(&b.product_id));
        sort_by_score(&mut recs);
        recs.truncate(limit);
        recs
    }

    /// Build product-to-product similarities from every user's item scores.
    /// Until this runs, item-based recommendations are empty.
    pub fn precompute_item_similarities(&self, all_behaviors: &HashMap<String, Vec<UserBehavior>>) {
        // product -> user -> score
        let mut columns: HashMap<String, ItemScores> = HashMap::new();
        for (user_id, behaviors) in all_behaviors {
            for (product_id, score) in item_scores(behaviors) {
                columns
                    .entry(product_id)
                    .or_default()
                    .insert(user_id.clone(), score);
            }
        }

        let mut product_ids: Vec<&String> = columns.keys().collect();
        product_ids.sort();

        let mut similarities: HashMap<String, Vec<(String, f64)>> = HashMap::new();
        for (i, a) in product_ids.iter().enumerate() {
            for b in product_ids.iter().skip(i + 1) {
                let (similarity, common) = user_similarity(&columns[*a], &columns[*b]);
                if common == 0 || similarity < self.config.min_similarity {
                    continue;
                }
                similarities
                    .entry((*a).clone())
                    .or_default()
                    .push(((*b).clone(), similarity));
                similarities
                    .entry((*b).clone())
                    .or_default()
                    .push(((*a).clone(), similarity));
            }
        }

        for list in similarities.values_mut() {
            list.sort_by(|x, y| {
                y.1.partial_cmp(&x.1)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| x.0.cmp(&y.0))
            });
            list.truncate(MAX_SIMILAR_ITEMS);
        }

        debug!(products = similarities.len(), "Item similarities precomputed");
        *self.item_similarities.write() = similarities;
    }

    pub fn has_item_similarities(&self) -> bool {
        !self.item_similarities.read().is_empty()
    }

    pub fn get_item_based_recommendations(
        &self,
        user: &User,
        catalog: &CatalogSnapshot,
        limit: usize,
    ) -> Vec<Recommendation> {
        let user_scores = item_scores(&user.behavior_history);
        let similarities = self.item_similarities.read();
        if user_scores.is_empty() || similarities.is_empty() {
            return Vec::new();
        }

        let mut candidates: HashMap<String, f64> = HashMap::new();
        let mut sources: HashMap<String, HashSet<String>> = HashMap::new();
        for (product_id, score) in &user_scores {
            let Some(similar) = similarities.get(product_id) else {
                continue;
            };
            for (other_id, similarity) in similar {
                if user_scores.contains_key(other_id) {
                    continue;
                }
                *candidates.entry(other_id.clone()).or_insert(0.0) += score * similarity;
                sources
                    .entry(other_id.clone())
                    .or_default()
                    .insert(product_id.clone());
            }
        }

        let max_score = candidates.values().copied().fold(0.0_f64, f64::max);
        if max_score <= 0.0 {
            return Vec::new();
        }

        let mut recs: Vec<Recommendation> = candidates
            .into_iter()
            .filter_map(|(product_id, raw)| {
                let product = catalog.get(&product_id)?.clone();
                let score = raw / max_score;
                let mut factors: Vec<String> = sources
                    .get(&product_id)
                    .map(|s| s.iter().map(|id| format!("similar_to:{id}")).collect())
                    .unwrap_or_default();
                factors.sort();
                Some(Recommendation::new(
                    product,
                    score,
                    RecommendationReason {
                        reason_type: ReasonType::Collaborative,
                        explanation: "Often liked together with items you've shown interest in"
                            .to_string(),
                        confidence: score,
                        factors,
                    },
                    ITEM_BASED_ALGORITHM,
                ))
            })
            .collect();

        recs.sort_by(|a, b| a.product_id.cmp(&b.product_id));
        sort_by_score(&mut recs);
        recs.truncate(limit);
        recs
    }

    pub fn cached_neighbor_sets(&self) -> usize {
        self.neighbors.len()
    }

    pub fn purge_expired(&self) -> usize {
        self.neighbors.evict_expired()
    }

    pub fn clear_cache(&self) {
        self.neighbors.clear();
    }
}
