//! Non-personalized branches: catalog-wide popularity and trend growth.

use crate::catalog::CatalogSnapshot;
use chrono::{DateTime, Duration, Utc};
use recsys_core::types::{Product, ReasonType, Recommendation, RecommendationReason, UserBehavior};
use recsys_ranking::sort_by_score;
use std::collections::HashMap;

pub const POPULARITY_ALGORITHM: &str = "popularity";
pub const TRENDING_ALGORITHM: &str = "trending";

/// Review volume at which the review signal saturates.
const REVIEW_SATURATION: f64 = 1000.0;
const INTERACTION_SHARE: f64 = 0.7;
const POPULAR_CONFIDENCE: f64 = 0.7;

/// Rating scaled by how many reviews back it, in [0, 1].
fn catalog_quality(product: &Product) -> f64 {
    let volume = ((1.0 + product.review_count as f64).ln() / (1.0 + REVIEW_SATURATION).ln()).min(1.0);
    (product.rating / 5.0).clamp(0.0, 1.0) * volume
}

/// Summed implicit weights per product across every user.
fn interaction_totals(all_behaviors: &HashMap<String, Vec<UserBehavior>>) -> HashMap<&str, f64> {
    let mut totals: HashMap<&str, f64> = HashMap::new();
    for behaviors in all_behaviors.values() {
        for behavior in behaviors {
            if let Some(weight) = behavior.behavior_type.base_weight(behavior.value) {
                *totals.entry(behavior.product_id.as_str()).or_insert(0.0) += weight;
            }
        }
    }
    totals
}

fn finish(mut recs: Vec<Recommendation>, limit: usize) -> Vec<Recommendation> {
    recs.sort_by(|a, b| a.product_id.cmp(&b.product_id));
    sort_by_score(&mut recs);
    recs.truncate(limit);
    recs
}

/// Most popular products, normalized so the leader scores 1.0. Interaction
/// volume dominates when behavior data is available; otherwise the ranking
/// falls back to rating and review volume alone.
pub fn popular_products(
    catalog: &CatalogSnapshot,
    all_behaviors: Option<&HashMap<String, Vec<UserBehavior>>>,
    limit: usize,
) -> Vec<Recommendation> {
    let totals = all_behaviors.map(interaction_totals).unwrap_or_default();
    let max_total = totals.values().copied().fold(0.0_f64, f64::max);

    let raw: Vec<(&Product, f64, f64)> = catalog
        .products()
        .iter()
        .map(|product| {
            let interactions = totals.get(product.id.as_str()).copied().unwrap_or(0.0);
            let quality = catalog_quality(product);
            let score = if max_total > 0.0 {
                INTERACTION_SHARE * (interactions / max_total) + (1.0 - INTERACTION_SHARE) * quality
            } else {
                quality
            };
            (product, score, interactions)
        })
        .filter(|(_, score, _)| *score > 0.0)
        .collect();

    let max_score = raw.iter().map(|(_, s, _)| *s).fold(0.0_f64, f64::max);
    if max_score <= 0.0 {
        return Vec::new();
    }

    let recs = raw
        .into_iter()
        .map(|(product, score, interactions)| {
            let mut factors = Vec::new();
            if interactions > 0.0 {
                factors.push("interactions".to_string());
            }
            if product.rating >= 4.0 {
                factors.push("highly_rated".to_string());
            }
            Recommendation::new(
                product.clone(),
                score / max_score,
                RecommendationReason {
                    reason_type: ReasonType::Popular,
                    explanation: "Popular with other shoppers".to_string(),
                    confidence: POPULAR_CONFIDENCE,
                    factors,
                },
                POPULARITY_ALGORITHM,
            )
        })
        .collect();
    finish(recs, limit)
}

/// Products whose interaction count grew between the previous window and
/// the current one, normalized by the strongest growth.
pub fn trending_products(
    catalog: &CatalogSnapshot,
    all_behaviors: &HashMap<String, Vec<UserBehavior>>,
    window_days: i64,
    now: DateTime<Utc>,
    limit: usize,
) -> Vec<Recommendation> {
    let window = Duration::days(window_days.max(1));
    let current_start = now - window;
    let previous_start = current_start - window;

    let mut counts: HashMap<&str, (u32, u32)> = HashMap::new();
    for behaviors in all_behaviors.values() {
        for behavior in behaviors {
            let ts = behavior.timestamp;
            if ts > now || ts <= previous_start {
                continue;
            }
            let entry = counts.entry(behavior.product_id.as_str()).or_insert((0, 0));
            if ts > current_start {
                entry.0 += 1;
            } else {
                entry.1 += 1;
            }
        }
    }

    let growth: Vec<(&str, f64, u32, u32)> = counts
        .into_iter()
        .filter_map(|(id, (current, previous))| {
            let g = (current as f64 - previous as f64) / previous.max(1) as f64;
            (g > 0.0).then_some((id, g, current, previous))
        })
        .collect();

    let max_growth = growth.iter().map(|(_, g, _, _)| *g).fold(0.0_f64, f64::max);
    if max_growth <= 0.0 {
        return Vec::new();
    }

    let recs = growth
        .into_iter()
        .filter_map(|(id, g, current, previous)| {
            let product = catalog.get(id)?.clone();
            let score = g / max_growth;
            let explanation = if previous == 0 {
                "New and quickly gaining attention".to_string()
            } else {
                let pct = (current as f64 / previous as f64 - 1.0) * 100.0;
                format!("Trending: interest up {pct:.0}% recently")
            };
            Some(Recommendation::new(
                product,
                score,
                RecommendationReason {
                    reason_type: ReasonType::Trending,
                    explanation,
                    confidence: score,
                    factors: vec!["growth".to_string()],
                },
                TRENDING_ALGORITHM,
            ))
        })
        .collect();
    finish(recs, limit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use recsys_core::types::BehaviorType;

    fn product(id: &str, rating: f64, reviews: u32) -> Product {
        Product {
            id: id.to_string(),
            name: id.to_string(),
            category: "general".to_string(),
            rating,
            review_count: reviews,
            ..Default::default()
        }
    }

    #[test]
    fn test_popular_by_interactions() {
        let catalog = CatalogSnapshot::new(vec![product("a", 0.0, 0), product("b", 0.0, 0)]);
        let mut all = HashMap::new();
        all.insert(
            "u1".to_string(),
            vec![
                UserBehavior::new("u1", BehaviorType::Purchase, "a"),
                UserBehavior::new("u1", BehaviorType::View, "b"),
            ],
        );
        all.insert(
            "u2".to_string(),
            vec![UserBehavior::new("u2", BehaviorType::Purchase, "a")],
        );

        let recs = popular_products(&catalog, Some(&all), 10);
        assert_eq!(recs[0].product_id, "a");
        assert_eq!(recs[0].score, 1.0);
        assert!((recs[1].score - 0.1).abs() < 1e-9);
        assert_eq!(recs[0].reason.reason_type, ReasonType::Popular);
    }

    #[test]
    fn test_popular_without_behaviors_uses_catalog_quality() {
        let catalog = CatalogSnapshot::new(vec![
            product("meh", 3.0, 10),
            product("great", 4.8, 900),
            product("unrated", 0.0, 0),
        ]);
        let recs = popular_products(&catalog, None, 10);
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].product_id, "great");
        assert_eq!(recs[0].score, 1.0);
    }

    #[test]
    fn test_popular_respects_limit() {
        let catalog = CatalogSnapshot::new(
            (0..10).map(|i| product(&format!("p{i}"), 4.0, i * 10)).collect(),
        );
        assert_eq!(popular_products(&catalog, None, 3).len(), 3);
    }

    #[test]
    fn test_trending_growth() {
        let now = Utc::now();
        let catalog = CatalogSnapshot::new(vec![
            product("rising", 0.0, 0),
            product("falling", 0.0, 0),
            product("new", 0.0, 0),
        ]);
        let recent = |p: &str| UserBehavior::new("u", BehaviorType::View, p).at(now - Duration::days(1));
        let older = |p: &str| UserBehavior::new("u", BehaviorType::View, p).at(now - Duration::days(10));

        let mut all = HashMap::new();
        all.insert(
            "u".to_string(),
            vec![
                recent("rising"),
                recent("rising"),
                recent("rising"),
                older("rising"),
                recent("falling"),
                older("falling"),
                older("falling"),
                recent("new"),
            ],
        );

        let recs = trending_products(&catalog, &all, 7, now, 10);
        let ids: Vec<&str> = recs.iter().map(|r| r.product_id.as_str()).collect();
        assert_eq!(ids, vec!["rising", "new"]);
        assert_eq!(recs[0].score, 1.0);
        assert!((recs[1].score - 0.5).abs() < 1e-9);
        assert_eq!(recs[0].reason.reason_type, ReasonType::Trending);
        assert!(recs[0].reason.explanation.contains("200%"));
    }

    #[test]
    fn test_trending_empty_without_activity() {
        let catalog = CatalogSnapshot::new(vec![product("a", 5.0, 100)]);
        assert!(trending_products(&catalog, &HashMap::new(), 7, Utc::now(), 10).is_empty());
    }
}
