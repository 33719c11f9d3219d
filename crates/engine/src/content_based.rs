//! Attribute-based filtering.
//!
//! Personalized mode scores the catalog against a preference profile derived
//! from the user's behavior history. Similar-items mode scores the catalog
//! against one target product and caches the result per target.

use crate::catalog::CatalogSnapshot;
use recsys_cache::LocalCache;
use recsys_core::config::{CacheConfig, ContentWeights};
use recsys_core::types::{
    BehaviorType, PriceRange, Product, ProductSimilarity, ReasonType, Recommendation,
    RecommendationReason, User, UserBehavior, UserPreferences,
};
use recsys_core::{RecError, RecResult};
use recsys_ranking::{jaccard_similarity, sort_by_score};
use std::collections::{HashMap, HashSet};
use tracing::debug;

pub const CONTENT_ALGORITHM: &str = "content_based";
pub const SIMILAR_ITEMS_ALGORITHM: &str = "content_similarity";

const MIN_SCORE: f64 = 0.1;
const MAX_PREFERRED_CATEGORIES: usize = 10;
const MAX_PREFERRED_BRANDS: usize = 10;
const MAX_PREFERRED_TAGS: usize = 20;
const TAG_MATCH_THRESHOLD: f64 = 0.3;
const PRICE_CLOSENESS_THRESHOLD: f64 = 0.7;
const ATTRIBUTE_OVERLAP_WEIGHT: f64 = 0.1;

/// Ranks keys by descending frequency, ties broken alphabetically.
fn top_by_frequency(counts: HashMap<String, usize>, limit: usize) -> Vec<String> {
    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.into_iter().take(limit).map(|(k, _)| k).collect()
}

/// Derive a preference profile from behavior history. Behaviors on
/// products missing from the catalog only contribute purchase amounts.
pub fn build_preferences(behaviors: &[UserBehavior], catalog: &CatalogSnapshot) -> UserPreferences {
    let mut categories: HashMap<String, usize> = HashMap::new();
    let mut brands: HashMap<String, usize> = HashMap::new();
    let mut tags: HashMap<String, usize> = HashMap::new();
    let mut purchase_prices: Vec<f64> = Vec::new();

    for behavior in behaviors {
        let product = catalog.get(&behavior.product_id);
        if let Some(product) = product {
            *categories.entry(product.category.clone()).or_insert(0) += 1;
            if let Some(brand) = &product.brand {
                *brands.entry(brand.clone()).or_insert(0) += 1;
            }
            for tag in &product.tags {
                *tags.entry(tag.clone()).or_insert(0) += 1;
            }
        }
        if behavior.behavior_type == BehaviorType::Purchase {
            if let Some(price) = product.map(|p| p.price).or(behavior.value) {
                purchase_prices.push(price);
            }
        }
    }

    let price_range = if purchase_prices.is_empty() {
        PriceRange::unbounded()
    } else {
        let avg = purchase_prices.iter().sum::<f64>() / purchase_prices.len() as f64;
        PriceRange::new(avg * 0.5, avg * 2.0)
    };

    UserPreferences::default()
        .with_categories(top_by_frequency(categories, MAX_PREFERRED_CATEGORIES))
        .with_brands(top_by_frequency(brands, MAX_PREFERRED_BRANDS))
        .with_tags(top_by_frequency(tags, MAX_PREFERRED_TAGS))
        .with_price_range(price_range)
}

/// 1.0 inside the range, falling linearly to 0 with the relative distance
/// from the nearest bound.
pub fn price_score(price: f64, range: &PriceRange) -> f64 {
    if range.is_unbounded() || range.contains(price) {
        return 1.0;
    }
    if price < range.min {
        if range.min <= 0.0 {
            return 1.0;
        }
        (1.0 - (range.min - price) / range.min).max(0.0)
    } else {
        if range.max <= 0.0 {
            return 0.0;
        }
        (1.0 - (price - range.max) / range.max).max(0.0)
    }
}

fn tag_set(tags: &[String]) -> HashSet<&str> {
    tags.iter().map(String::as_str).collect()
}

/// Fraction of key/value pairs two attribute maps agree on.
fn attribute_overlap(
    a: &HashMap<String, serde_json::Value>,
    b: &HashMap<String, serde_json::Value>,
) -> f64 {
    let largest = a.len().max(b.len());
    if largest == 0 {
        return 0.0;
    }
    let matching = a.iter().filter(|(k, v)| b.get(*k) == Some(*v)).count();
    matching as f64 / largest as f64
}

/// Personalized score and the factor tags that matched.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentScore {
    pub score: f64,
    pub factors: Vec<String>,
    pub tag_similarity: f64,
}

pub struct ContentBasedFilter {
    weights: ContentWeights,
    similar_items: LocalCache<String, Vec<ProductSimilarity>>,
}

impl ContentBasedFilter {
    pub fn new(weights: ContentWeights, cache: &CacheConfig) -> Self {
        Self {
            weights,
            similar_items: LocalCache::with_ttl_secs(
                "product_similarity",
                cache.ttl_secs,
                cache.max_size,
            ),
        }
    }

    pub fn weights(&self) -> &ContentWeights {
        &self.weights
    }

    /// Weighted attribute match divided by the weight of the signals that
    /// were actually available, so a missing signal does not drag the score.
    pub fn score_product(&self, product: &Product, prefs: &UserPreferences) -> ContentScore {
        let w = &self.weights;
        let mut applied = 0.0;
        let mut total = 0.0;
        let mut factors = Vec::new();
        let mut tag_similarity = 0.0;

        if !prefs.categories.is_empty() {
            applied += w.category;
            if prefs.categories.contains(&product.category) {
                total += w.category;
                factors.push(format!("category:{}", product.category));
            }
        }

        if !prefs.brands.is_empty() {
            applied += w.brand;
            if let Some(brand) = product.brand.as_ref().filter(|b| prefs.brands.contains(b)) {
                total += w.brand;
                factors.push(format!("brand:{brand}"));
            }
        }

        if !prefs.price_range.is_unbounded() {
            applied += w.price;
            total += w.price * price_score(product.price, &prefs.price_range);
            if prefs.price_range.contains(product.price) {
                factors.push("price_range".to_string());
            }
        }

        if !prefs.tags.is_empty() {
            applied += w.tags;
            tag_similarity = jaccard_similarity(&tag_set(&prefs.tags), &tag_set(&product.tags));
            total += w.tags * tag_similarity;
            if tag_similarity >= TAG_MATCH_THRESHOLD {
                factors.push("tags".to_string());
            }
        }

        applied += w.rating;
        total += w.rating * (product.rating / 5.0).clamp(0.0, 1.0);
        if product.rating >= 4.0 {
            factors.push("highly_rated".to_string());
        }

        let score = if applied > 0.0 { total / applied } else { 0.0 };
        ContentScore {
            score,
            factors,
            tag_similarity,
        }
    }

    fn explain(product: &Product, prefs: &UserPreferences, score: &ContentScore) -> String {
        let mut parts = Vec::new();
        if prefs.categories.contains(&product.category) {
            parts.push(format!("matches your interest in {}", product.category));
        }
        if let Some(brand) = product.brand.as_ref().filter(|b| prefs.brands.contains(b)) {
            parts.push(format!("is from {brand}, a brand you like"));
        }
        if score.tag_similarity >= TAG_MATCH_THRESHOLD {
            parts.push("shares features you like".to_string());
        }
        if parts.is_empty() {
            "Based on your browsing history".to_string()
        } else {
            format!("This {}", parts.join(" and "))
        }
    }

    /// Dispatches to similar-items mode when `target_product_id` is given,
    /// personalized mode otherwise.
    pub fn get_recommendations(
        &self,
        user: &User,
        catalog: &CatalogSnapshot,
        target_product_id: Option<&str>,
        limit: usize,
    ) -> Vec<Recommendation> {
        match target_product_id {
            Some(target) => match self.similar_product_recommendations(target, catalog, limit) {
                Ok(recs) => recs,
                Err(e) => {
                    debug!(error = %e, "Target product unresolved, no similar items");
                    Vec::new()
                }
            },
            None => self.personalized(user, catalog, limit),
        }
    }

    pub fn personalized(
        &self,
        user: &User,
        catalog: &CatalogSnapshot,
        limit: usize,
    ) -> Vec<Recommendation> {
        // No history, no profile; cold start is left to the popularity branch
        if user.behavior_history.is_empty() {
            return Vec::new();
        }
        let prefs = build_preferences(&user.behavior_history, catalog);
        let seen: HashSet<&str> = user
            .behavior_history
            .iter()
            .map(|b| b.product_id.as_str())
            .collect();

        let mut recs: Vec<Recommendation> = catalog
            .products()
            .iter()
            .filter(|p| !seen.contains(p.id.as_str()))
            .filter_map(|product| {
                let scored = self.score_product(product, &prefs);
                if scored.score <= MIN_SCORE {
                    return None;
                }
                let explanation = Self::explain(product, &prefs, &scored);
                Some(Recommendation::new(
                    product.clone(),
                    scored.score,
                    RecommendationReason {
                        reason_type: ReasonType::Content,
                        explanation,
                        confidence: scored.score,
                        factors: scored.factors,
                    },
                    CONTENT_ALGORITHM,
                ))
            })
            .collect();

        sort_by_score(&mut recs);
        recs.truncate(limit);
        debug!(user_id = %user.id, count = recs.len(), "Content-based recommendations");
        recs
    }

    /// Pairwise similarity between two products with human readable reasons.
    pub fn product_similarity(&self, target: &Product, candidate: &Product) -> ProductSimilarity {
        let w = &self.weights;
        let mut similarity = 0.0;
        let mut reasons = Vec::new();

        if target.category == candidate.category {
            similarity += w.category;
            reasons.push("same category".to_string());
        }

        if target.brand.is_some() && target.brand == candidate.brand {
            similarity += w.brand;
            reasons.push("same brand".to_string());
        }

        let tags = jaccard_similarity(&tag_set(&target.tags), &tag_set(&candidate.tags));
        similarity += w.tags * tags;
        if tags >= TAG_MATCH_THRESHOLD {
            reasons.push("shared tags".to_string());
        }

        let avg_price = (target.price + candidate.price) / 2.0;
        if avg_price > 0.0 {
            let closeness = 1.0 - (target.price - candidate.price).abs() / avg_price;
            if closeness > PRICE_CLOSENESS_THRESHOLD {
                similarity += w.price * closeness;
                reasons.push("similar price".to_string());
            }
        }

        similarity += w.rating * (1.0 - (target.rating - candidate.rating).abs() / 5.0).max(0.0);

        let overlap = attribute_overlap(&target.attributes, &candidate.attributes);
        if overlap > 0.0 {
            similarity += ATTRIBUTE_OVERLAP_WEIGHT * overlap;
            reasons.push("matching specifications".to_string());
        }

        ProductSimilarity {
            product_id: target.id.clone(),
            similar_product_id: candidate.id.clone(),
            similarity: similarity.min(1.0),
            reasons,
        }
    }

    /// Products most similar to `target_id`, cached per target.
    pub fn find_similar_products(
        &self,
        target_id: &str,
        catalog: &CatalogSnapshot,
        limit: usize,
    ) -> RecResult<Vec<ProductSimilarity>> {
        if let Some(mut cached) = self.similar_items.get(&target_id.to_string()) {
            cached.truncate(limit);
            return Ok(cached);
        }

        let target = catalog
            .get(target_id)
            .ok_or_else(|| RecError::product_not_found(target_id))?;

        let mut similar: Vec<ProductSimilarity> = catalog
            .products()
            .iter()
            .filter(|p| p.id != target.id)
            .map(|candidate| self.product_similarity(target, candidate))
            .filter(|s| s.similarity > MIN_SCORE)
            .collect();
        similar.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        self.similar_items.put(target_id.to_string(), similar.clone());
        similar.truncate(limit);
        Ok(similar)
    }

    pub fn similar_product_recommendations(
        &self,
        target_id: &str,
        catalog: &CatalogSnapshot,
        limit: usize,
    ) -> RecResult<Vec<Recommendation>> {
        let similar = self.find_similar_products(target_id, catalog, limit)?;
        let target_name = catalog
            .get(target_id)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| target_id.to_string());

        Ok(similar
            .into_iter()
            .filter_map(|s| {
                let product = catalog.get(&s.similar_product_id)?.clone();
                let explanation = if s.reasons.is_empty() {
                    format!("Similar to {target_name}")
                } else {
                    format!("Similar to {target_name}: {}", s.reasons.join(", "))
                };
                let factors = s.reasons.iter().map(|r| r.replace(' ', "_")).collect();
                Some(Recommendation::new(
                    product,
                    s.similarity,
                    RecommendationReason {
                        reason_type: ReasonType::Content,
                        explanation,
                        confidence: s.similarity,
                        factors,
                    },
                    SIMILAR_ITEMS_ALGORITHM,
                ))
            })
            .collect())
    }

    pub fn cached_targets(&self) -> usize {
        self.similar_items.len()
    }

    pub fn purge_expired(&self) -> usize {
        self.similar_items.evict_expired()
    }

    pub fn clear_cache(&self) {
        self.similar_items.clear();
    }
}
