//! Degraded response used when generation fails: popular products first,
//! then randomly sampled catalog products until the configured minimum is
//! reached. Both sources are labeled with low confidence.

use crate::catalog::CatalogSnapshot;
use crate::popularity::popular_products;
use rand::seq::SliceRandom;
use rand::Rng;
use recsys_core::config::FallbackConfig;
use recsys_core::types::{Product, ReasonType, Recommendation, RecommendationReason, UserBehavior};
use std::collections::{HashMap, HashSet};

pub const POPULAR_FALLBACK_ALGORITHM: &str = "popularity_fallback";
pub const RANDOM_FALLBACK_ALGORITHM: &str = "random_fallback";

const POPULAR_FALLBACK_CONFIDENCE: f64 = 0.5;
const RANDOM_SCORE: f64 = 0.1;
const RANDOM_CONFIDENCE: f64 = 0.1;

/// Request-level constraints the fallback list must still honor.
pub struct FallbackScope<'a> {
    pub category: Option<&'a str>,
    pub exclude: &'a HashSet<String>,
    pub limit: usize,
}

impl FallbackScope<'_> {
    fn admits(&self, product: &Product) -> bool {
        !self.exclude.contains(&product.id)
            && self.category.map_or(true, |c| product.category == c)
    }
}

pub fn build_fallback<R: Rng + ?Sized>(
    catalog: &CatalogSnapshot,
    all_behaviors: Option<&HashMap<String, Vec<UserBehavior>>>,
    policy: &FallbackConfig,
    scope: &FallbackScope<'_>,
    rng: &mut R,
) -> Vec<Recommendation> {
    let mut recs: Vec<Recommendation> = Vec::new();

    if policy.use_popular {
        recs = popular_products(catalog, all_behaviors, catalog.len())
            .into_iter()
            .filter(|r| scope.admits(&r.product))
            .take(scope.limit)
            .map(|mut r| {
                r.algorithm = POPULAR_FALLBACK_ALGORITHM.to_string();
                r.reason.explanation = "Popular right now".to_string();
                r.reason.confidence = POPULAR_FALLBACK_CONFIDENCE;
                r.reason.factors.push("fallback".to_string());
                r
            })
            .collect();
    }

    let target = policy.min_recommendations.min(scope.limit);
    if policy.use_random && recs.len() < target {
        let taken: HashSet<String> = recs.iter().map(|r| r.product_id.clone()).collect();
        let pool: Vec<&Product> = catalog
            .products()
            .iter()
            .filter(|p| scope.admits(p) && !taken.contains(&p.id))
            .collect();
        let needed = target - recs.len();
        recs.extend(pool.choose_multiple(rng, needed).map(|product| {
            Recommendation::new(
                (*product).clone(),
                RANDOM_SCORE,
                RecommendationReason {
                    reason_type: ReasonType::Popular,
                    explanation: "Something new to discover".to_string(),
                    confidence: RANDOM_CONFIDENCE,
                    factors: vec!["fallback".to_string(), "random".to_string()],
                },
                RANDOM_FALLBACK_ALGORITHM,
            )
        }));
    }

    recs
}
