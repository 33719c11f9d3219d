//! End-to-end tests for the hybrid recommendation flow over the in-memory
//! store, plus a failing behavior store to drive the fallback path.

use async_trait::async_trait;
use recsys_core::config::{AlgorithmSetting, AlgorithmsConfig, FallbackConfig, RankingConfig};
use recsys_core::types::{BehaviorType, InteractionType, Product, UserBehavior};
use recsys_core::{BehaviorStore, InMemoryStore, RecError, RecResult, RecommendationConfig};
use recsys_engine::{RecommendationAlgorithm, RecommendationEngine, RecommendationRequest};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

fn product(id: &str, category: &str, brand: &str, price: f64, rating: f64) -> Product {
    Product {
        id: id.to_string(),
        name: format!("Product {id}"),
        category: category.to_string(),
        brand: Some(brand.to_string()),
        price,
        rating,
        review_count: 120,
        ..Default::default()
    }
}

fn seeded_store() -> Arc<InMemoryStore> {
    let store = Arc::new(InMemoryStore::new());
    for p in [
        product("p1", "electronics", "acme", 500.0, 4.5),
        product("p2", "electronics", "acme", 520.0, 4.2),
        product("p3", "electronics", "zen", 450.0, 3.9),
        product("p4", "furniture", "oak", 50.0, 4.0),
        product("p5", "books", "inkwell", 20.0, 4.7),
        product("p6", "electronics", "zen", 480.0, 4.1),
        product("p7", "furniture", "oak", 300.0, 3.5),
    ] {
        store.insert_product(p);
    }

    let behaviors = [
        ("alice", BehaviorType::Purchase, "p1"),
        ("alice", BehaviorType::View, "p3"),
        ("bob", BehaviorType::Purchase, "p1"),
        ("bob", BehaviorType::Purchase, "p2"),
        ("bob", BehaviorType::Purchase, "p6"),
        ("carol", BehaviorType::Purchase, "p1"),
        ("carol", BehaviorType::Purchase, "p2"),
        ("carol", BehaviorType::View, "p5"),
    ];
    for (user, kind, product_id) in behaviors {
        store.insert_behavior(UserBehavior::new(user, kind, product_id));
    }
    store
}

fn engine_with(config: RecommendationConfig) -> (RecommendationEngine, Arc<InMemoryStore>) {
    let store = seeded_store();
    let engine = RecommendationEngine::new(config, store.clone(), store.clone());
    (engine, store)
}

/// Behavior store that is always down.
struct UnavailableBehaviors;

#[async_trait]
impl BehaviorStore for UnavailableBehaviors {
    async fn get_user_behaviors(&self, _user_id: &str) -> RecResult<Vec<UserBehavior>> {
        Err(RecError::Upstream("behavior store unavailable".to_string()))
    }

    async fn append_user_behavior(&self, _user_id: &str, _behavior: UserBehavior) -> RecResult<()> {
        Err(RecError::Upstream("behavior store unavailable".to_string()))
    }

    async fn get_all_user_behaviors(&self) -> RecResult<HashMap<String, Vec<UserBehavior>>> {
        Err(RecError::Upstream("behavior store unavailable".to_string()))
    }
}

fn failing_engine(fallback: FallbackConfig) -> RecommendationEngine {
    let store = seeded_store();
    RecommendationEngine::new(
        RecommendationConfig::default().with_fallback(fallback),
        store,
        Arc::new(UnavailableBehaviors),
    )
}

#[tokio::test]
async fn test_hybrid_respects_limit_and_dedupes() {
    let (engine, _) = engine_with(RecommendationConfig::default());
    for limit in [1, 3, 10] {
        let response = engine
            .get_recommendations(&RecommendationRequest::new("alice", limit))
            .await
            .unwrap();
        let recs = &response.recommendations;
        assert!(!recs.is_empty());
        assert!(recs.len() <= limit);
        let ids: HashSet<&str> = recs.iter().map(|r| r.product_id.as_str()).collect();
        assert_eq!(ids.len(), recs.len());
        assert!(recs.windows(2).all(|w| w[0].score >= w[1].score));
        assert!(recs.iter().all(|r| r.score > 0.1));
        assert_eq!(response.metadata.total_count, recs.len());
        assert!(!response.metadata.fallback_used);
        assert_eq!(response.metadata.algorithm, "hybrid");
    }
}

#[tokio::test]
async fn test_collaborative_branch_leads_for_alice() {
    let (engine, _) = engine_with(RecommendationConfig::default());
    let response = engine
        .get_recommendations(
            &RecommendationRequest::new("alice", 5)
                .with_algorithm(RecommendationAlgorithm::Collaborative),
        )
        .await
        .unwrap();
    let recs = &response.recommendations;
    // bob and carol both bought p2
    assert_eq!(recs[0].product_id, "p2");
    assert_eq!(recs[0].score, 1.0);
    assert!(recs.iter().all(|r| r.product_id != "p1" && r.product_id != "p3"));
    assert!(recs.iter().all(|r| r.algorithm == "user_based_cf"));
}

#[tokio::test]
async fn test_second_request_is_cache_hit() {
    let (engine, _) = engine_with(RecommendationConfig::default());
    let request = RecommendationRequest::new("alice", 5);

    let first = engine.get_recommendations(&request).await.unwrap();
    let second = engine.get_recommendations(&request).await.unwrap();

    assert!(!first.metadata.cache_hit);
    assert!(second.metadata.cache_hit);
    let ids = |r: &recsys_engine::RecommendationResponse| {
        r.recommendations
            .iter()
            .map(|x| (x.product_id.clone(), x.score))
            .collect::<Vec<_>>()
    };
    assert_eq!(ids(&first), ids(&second));
    assert_eq!(engine.cache_stats().responses.hits, 1);

    // A different limit is a different cache entry
    let other = engine
        .get_recommendations(&RecommendationRequest::new("alice", 4))
        .await
        .unwrap();
    assert!(!other.metadata.cache_hit);

    engine.clear_cache();
    let after_clear = engine.get_recommendations(&request).await.unwrap();
    assert!(!after_clear.metadata.cache_hit);
}

#[tokio::test]
async fn test_business_rules_filter_category_and_exclusions() {
    let (engine, _) = engine_with(RecommendationConfig::default());
    let response = engine
        .get_recommendations(
            &RecommendationRequest::new("alice", 10)
                .with_category("electronics")
                .excluding(vec!["p2".to_string()]),
        )
        .await
        .unwrap();
    let recs = &response.recommendations;
    assert!(!recs.is_empty());
    assert!(recs.iter().all(|r| r.product.category == "electronics"));
    assert!(recs.iter().all(|r| r.product_id != "p2"));
}

#[tokio::test]
async fn test_cache_hit_still_applies_exclusions() {
    let (engine, _) = engine_with(RecommendationConfig::default());
    let request =
        RecommendationRequest::new("dave", 3).with_algorithm(RecommendationAlgorithm::Popular);

    let first = engine.get_recommendations(&request).await.unwrap();
    let top = first.recommendations[0].product_id.clone();

    let second = engine
        .get_recommendations(&request.clone().excluding(vec![top.clone()]))
        .await
        .unwrap();
    assert!(second.metadata.cache_hit);
    assert!(second.recommendations.iter().all(|r| r.product_id != top));
    assert_eq!(second.recommendations.len(), first.recommendations.len() - 1);
    assert_eq!(second.metadata.total_count, second.recommendations.len());

    // The cached entry itself is untouched
    let third = engine.get_recommendations(&request).await.unwrap();
    assert_eq!(third.recommendations[0].product_id, top);
}

#[tokio::test]
async fn test_category_below_candidate_window_is_still_found() {
    let store = Arc::new(InMemoryStore::new());
    for i in 0..6 {
        store.insert_product(product(&format!("e{i}"), "electronics", "acme", 100.0, 4.9));
    }
    store.insert_product(product("b0", "books", "inkwell", 15.0, 3.0));
    let engine =
        RecommendationEngine::new(RecommendationConfig::default(), store.clone(), store.clone());

    let response = engine
        .get_recommendations(
            &RecommendationRequest::new("dave", 1)
                .with_category("books")
                .with_algorithm(RecommendationAlgorithm::Popular),
        )
        .await
        .unwrap();
    let ids: Vec<&str> = response
        .recommendations
        .iter()
        .map(|r| r.product_id.as_str())
        .collect();
    assert_eq!(ids, vec!["b0"]);
    assert!(!response.metadata.fallback_used);
}

#[tokio::test]
async fn test_weights_scale_branch_scores() {
    let (engine, _) = engine_with(RecommendationConfig::default());

    let explicit = engine
        .get_recommendations(
            &RecommendationRequest::new("dave", 10).with_algorithm(RecommendationAlgorithm::Popular),
        )
        .await
        .unwrap();
    assert_eq!(explicit.recommendations[0].score, 1.0);
    assert_eq!(explicit.metadata.algorithm, "popular");

    let hybrid = engine
        .get_recommendations(&RecommendationRequest::new("dave", 10))
        .await
        .unwrap();
    // dave has no history: only popular (0.2) and trending (0.1) contribute
    assert!(hybrid
        .recommendations
        .iter()
        .all(|r| r.score <= 0.2 + 1e-9));
    assert!(hybrid
        .recommendations
        .iter()
        .any(|r| r.algorithm == "popularity"));
}

#[tokio::test]
async fn test_disabled_branches_do_not_contribute() {
    let config = RecommendationConfig::default().with_algorithms(AlgorithmsConfig {
        collaborative: AlgorithmSetting::disabled(),
        content_based: AlgorithmSetting::new(true, 1.0),
        popular: AlgorithmSetting::disabled(),
        trending: AlgorithmSetting::disabled(),
    });
    let (engine, _) = engine_with(config);
    let response = engine
        .get_recommendations(&RecommendationRequest::new("alice", 10))
        .await
        .unwrap();
    assert!(!response.recommendations.is_empty());
    assert!(response
        .recommendations
        .iter()
        .all(|r| r.algorithm == "content_based"));
}

#[tokio::test]
async fn test_similar_items_for_target_product() {
    let (engine, _) = engine_with(RecommendationConfig::default());
    let response = engine
        .get_recommendations(
            &RecommendationRequest::new("alice", 3)
                .with_product("p1")
                .with_algorithm(RecommendationAlgorithm::ContentBased),
        )
        .await
        .unwrap();
    let recs = &response.recommendations;
    assert_eq!(recs[0].product_id, "p2");
    assert!(recs.iter().all(|r| r.product_id != "p1"));
    assert!(recs[0].reason.explanation.contains("same brand"));
    assert_eq!(engine.cache_stats().similar_item_sets, 1);
}

#[tokio::test]
async fn test_fallback_when_behavior_store_fails() {
    let engine = failing_engine(FallbackConfig::default());
    let response = engine
        .get_recommendations(&RecommendationRequest::new("alice", 10))
        .await
        .unwrap();
    assert!(response.metadata.fallback_used);
    assert_eq!(response.metadata.algorithm, "fallback");
    assert!(!response.recommendations.is_empty());
    assert!(response.recommendations.len() <= 10);
    assert!(response
        .recommendations
        .iter()
        .all(|r| r.reason.confidence <= 0.5));
    // Fallback responses are not cached
    assert_eq!(engine.cache_stats().responses.entries, 0);
}

#[tokio::test]
async fn test_fallback_random_only_pads_to_minimum() {
    let engine = failing_engine(FallbackConfig {
        use_popular: false,
        use_random: true,
        min_recommendations: 4,
    });
    let response = engine
        .get_recommendations(&RecommendationRequest::new("alice", 10))
        .await
        .unwrap();
    assert_eq!(response.recommendations.len(), 4);
    assert!(response
        .recommendations
        .iter()
        .all(|r| r.algorithm == "random_fallback"));
}

#[tokio::test]
async fn test_fallback_disabled_returns_empty_without_error() {
    let engine = failing_engine(FallbackConfig {
        use_popular: false,
        use_random: false,
        min_recommendations: 5,
    });
    let response = engine
        .get_recommendations(&RecommendationRequest::new("alice", 10))
        .await
        .unwrap();
    assert!(response.recommendations.is_empty());
    assert_eq!(response.metadata.total_count, 0);
    assert!(response.metadata.fallback_used);
}

#[tokio::test]
async fn test_invalid_request_fails_fast() {
    let (engine, _) = engine_with(RecommendationConfig::default());
    let err = engine
        .get_recommendations(&RecommendationRequest::new("", 5))
        .await
        .unwrap_err();
    assert!(matches!(err, RecError::InvalidInput(_)));
    let err = engine
        .get_recommendations(&RecommendationRequest::new("alice", 0))
        .await
        .unwrap_err();
    assert!(matches!(err, RecError::InvalidInput(_)));
}

#[tokio::test]
async fn test_tracking_feeds_collaborative_filtering() {
    let (engine, store) = engine_with(RecommendationConfig::default());
    let request = RecommendationRequest::new("erin", 5)
        .with_algorithm(RecommendationAlgorithm::Collaborative);

    let before = engine.get_recommendations(&request).await.unwrap();
    assert!(before.recommendations.is_empty());

    engine
        .tracker()
        .track_interaction("erin", "p6", InteractionType::Purchase)
        .await;
    assert_eq!(store.behavior_count("erin"), 1);

    engine.clear_cache();
    let after = engine.get_recommendations(&request).await.unwrap();
    let ids: Vec<&str> = after
        .recommendations
        .iter()
        .map(|r| r.product_id.as_str())
        .collect();
    // bob also bought p6
    assert!(ids.contains(&"p1") && ids.contains(&"p2"));
    assert!(!ids.contains(&"p6"));
}

#[tokio::test]
async fn test_tracking_failure_is_swallowed() {
    let engine = failing_engine(FallbackConfig::default());
    engine
        .tracker()
        .track_interaction("alice", "p1", InteractionType::View)
        .await;
}

#[tokio::test]
async fn test_item_based_after_precompute() {
    let (engine, _) = engine_with(RecommendationConfig::default());
    let request = RecommendationRequest::new("alice", 5)
        .with_algorithm(RecommendationAlgorithm::ItemBased);

    let before = engine.get_recommendations(&request).await.unwrap();
    assert!(before.recommendations.is_empty());

    engine.precompute_item_similarities().await.unwrap();
    engine.clear_cache();
    let after = engine.get_recommendations(&request).await.unwrap();
    assert!(!after.recommendations.is_empty());
    assert!(after
        .recommendations
        .iter()
        .all(|r| r.algorithm == "item_based_cf" && r.product_id != "p1"));
}

#[tokio::test]
async fn test_diversity_reranking_spreads_categories() {
    let config = RecommendationConfig::default()
        .with_algorithms(AlgorithmsConfig {
            collaborative: AlgorithmSetting::disabled(),
            content_based: AlgorithmSetting::disabled(),
            popular: AlgorithmSetting::new(true, 1.0),
            trending: AlgorithmSetting::disabled(),
        })
        .with_ranking(RankingConfig {
            diversity_weight: 0.5,
            recency_weight: 0.0,
        });
    let (engine, _) = engine_with(config);
    let response = engine
        .get_recommendations(&RecommendationRequest::new("dave", 3))
        .await
        .unwrap();
    let categories: HashSet<&str> = response
        .recommendations
        .iter()
        .map(|r| r.product.category.as_str())
        .collect();
    assert!(categories.len() >= 2);
}
