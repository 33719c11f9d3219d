//! Hybrid recommendation orchestrator.
//!
//! Per request: cache check, then on a miss the scoring branches run as
//! independent blocking tasks and are joined before the merge. Business
//! rules, dedupe and sort follow, and the response is cached. Any failure
//! while generating switches to the fallback path instead of propagating.
//!
//! Branch weights multiply each branch's [0, 1] score and are never
//! renormalized, so hybrid scores are a ranking signal, not a probability.

use crate::catalog::CatalogSnapshot;
use crate::collaborative::CollaborativeFilter;
use crate::content_based::ContentBasedFilter;
use crate::fallback::{build_fallback, FallbackScope};
use crate::popularity::{popular_products, trending_products};
use crate::tracker::InteractionTracker;
use chrono::{DateTime, Utc};
use recsys_cache::{CacheStats, LocalCache};
use recsys_core::types::{Recommendation, User, UserBehavior};
use recsys_core::{BehaviorStore, CatalogStore, RecError, RecResult, RecommendationConfig};
use recsys_ranking::{apply_diversity_penalty, apply_recency_boost, sort_by_score};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Recommendations at or below this score are dropped by the business rules.
const MIN_RESULT_SCORE: f64 = 0.1;
/// Each branch is asked for `limit × CANDIDATE_MULTIPLIER` candidates so the
/// filters and re-ranking passes still have enough left to fill `limit`.
const CANDIDATE_MULTIPLIER: usize = 3;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationAlgorithm {
    Hybrid,
    Collaborative,
    ItemBased,
    ContentBased,
    Popular,
    Trending,
}

impl RecommendationAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hybrid => "hybrid",
            Self::Collaborative => "collaborative",
            Self::ItemBased => "item_based",
            Self::ContentBased => "content_based",
            Self::Popular => "popular",
            Self::Trending => "trending",
        }
    }
}

impl std::str::FromStr for RecommendationAlgorithm {
    type Err = RecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hybrid" => Ok(Self::Hybrid),
            "collaborative" => Ok(Self::Collaborative),
            "item_based" => Ok(Self::ItemBased),
            "content_based" => Ok(Self::ContentBased),
            "popular" => Ok(Self::Popular),
            "trending" => Ok(Self::Trending),
            other => Err(RecError::InvalidInput(format!("unknown algorithm: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationRequest {
    pub user_id: String,
    /// Switches the content branch into similar-items mode.
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    pub limit: usize,
    /// Run only this engine instead of the weighted hybrid.
    #[serde(default)]
    pub algorithm: Option<RecommendationAlgorithm>,
    #[serde(default)]
    pub exclude_product_ids: Vec<String>,
}

impl RecommendationRequest {
    pub fn new(user_id: impl Into<String>, limit: usize) -> Self {
        Self {
            user_id: user_id.into(),
            product_id: None,
            category: None,
            limit,
            algorithm: None,
            exclude_product_ids: Vec::new(),
        }
    }

    pub fn with_product(mut self, product_id: impl Into<String>) -> Self {
        self.product_id = Some(product_id.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_algorithm(mut self, algorithm: RecommendationAlgorithm) -> Self {
        self.algorithm = Some(algorithm);
        self
    }

    pub fn excluding(mut self, product_ids: Vec<String>) -> Self {
        self.exclude_product_ids = product_ids;
        self
    }

    fn validate(&self) -> RecResult<()> {
        if self.user_id.trim().is_empty() {
            return Err(RecError::InvalidInput("user id must be non-empty".to_string()));
        }
        if self.limit == 0 {
            return Err(RecError::InvalidInput("limit must be positive".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseMetadata {
    pub request_id: Uuid,
    pub algorithm: String,
    pub generated_at: DateTime<Utc>,
    pub cache_hit: bool,
    pub fallback_used: bool,
    pub total_count: usize,
    pub processing_time_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationResponse {
    pub recommendations: Vec<Recommendation>,
    pub metadata: ResponseMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    user_id: String,
    product_id: Option<String>,
    category: Option<String>,
    algorithm: Option<RecommendationAlgorithm>,
    limit: usize,
}

impl From<&RecommendationRequest> for CacheKey {
    fn from(req: &RecommendationRequest) -> Self {
        Self {
            user_id: req.user_id.clone(),
            product_id: req.product_id.clone(),
            category: req.category.clone(),
            algorithm: req.algorithm,
            limit: req.limit,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineCacheStats {
    pub responses: CacheStats,
    pub neighbor_sets: usize,
    pub similar_item_sets: usize,
}

/// Everything a generate pass reads, fetched once and shared by the branches.
struct GenerateInputs {
    user: Arc<User>,
    catalog: Arc<CatalogSnapshot>,
    all_behaviors: Arc<HashMap<String, Vec<UserBehavior>>>,
}

pub struct RecommendationEngine {
    config: RecommendationConfig,
    catalog: Arc<dyn CatalogStore>,
    behaviors: Arc<dyn BehaviorStore>,
    collaborative: Arc<CollaborativeFilter>,
    content: Arc<ContentBasedFilter>,
    responses: LocalCache<CacheKey, RecommendationResponse>,
    tracker: InteractionTracker,
}

impl RecommendationEngine {
    pub fn new(
        config: RecommendationConfig,
        catalog: Arc<dyn CatalogStore>,
        behaviors: Arc<dyn BehaviorStore>,
    ) -> Self {
        let collaborative = Arc::new(CollaborativeFilter::new(
            config.collaborative.clone(),
            &config.cache,
        ));
        let content = Arc::new(ContentBasedFilter::new(config.content.clone(), &config.cache));
        let responses =
            LocalCache::with_ttl_secs("responses", config.cache.ttl_secs, config.cache.max_size);
        let tracker = InteractionTracker::new(behaviors.clone());

        Self {
            config,
            catalog,
            behaviors,
            collaborative,
            content,
            responses,
            tracker,
        }
    }

    pub fn config(&self) -> &RecommendationConfig {
        &self.config
    }

    pub fn tracker(&self) -> &InteractionTracker {
        &self.tracker
    }

    pub fn collaborative(&self) -> &CollaborativeFilter {
        &self.collaborative
    }

    pub fn content(&self) -> &ContentBasedFilter {
        &self.content
    }

    pub async fn get_recommendations(
        &self,
        request: &RecommendationRequest,
    ) -> RecResult<RecommendationResponse> {
        request.validate()?;
        let started = Instant::now();
        metrics::counter!("recsys.requests").increment(1);

        let key = CacheKey::from(request);
        if let Some(mut cached) = self.responses.get(&key) {
            // Exclusions are not part of the key
            if !request.exclude_product_ids.is_empty() {
                let excluded: HashSet<&str> = request
                    .exclude_product_ids
                    .iter()
                    .map(String::as_str)
                    .collect();
                cached
                    .recommendations
                    .retain(|r| !excluded.contains(r.product_id.as_str()));
                cached.metadata.total_count = cached.recommendations.len();
            }
            cached.metadata.cache_hit = true;
            cached.metadata.processing_time_ms = started.elapsed().as_millis() as u64;
            debug!(user_id = %request.user_id, "Serving recommendations from cache");
            return Ok(cached);
        }

        let algorithm = request
            .algorithm
            .unwrap_or(RecommendationAlgorithm::Hybrid);

        let response = match self.generate(request, algorithm).await {
            Ok(candidates) => {
                let recs = self.finalize(candidates, request);
                let response = self.respond(recs, algorithm.as_str(), false, started);
                self.responses.put(key, response.clone());
                response
            }
            Err(e) => {
                metrics::counter!("recsys.fallback").increment(1);
                warn!(error = %e, user_id = %request.user_id, "Generation failed, using fallback");
                let recs = self.fallback(request).await;
                self.respond(recs, "fallback", true, started)
            }
        };

        metrics::histogram!("recsys.latency_ms").record(response.metadata.processing_time_ms as f64);
        info!(
            user_id = %request.user_id,
            algorithm = %response.metadata.algorithm,
            count = response.metadata.total_count,
            fallback = response.metadata.fallback_used,
            "Recommendations generated"
        );
        Ok(response)
    }

    fn respond(
        &self,
        recommendations: Vec<Recommendation>,
        algorithm: &str,
        fallback_used: bool,
        started: Instant,
    ) -> RecommendationResponse {
        RecommendationResponse {
            metadata: ResponseMetadata {
                request_id: Uuid::new_v4(),
                algorithm: algorithm.to_string(),
                generated_at: Utc::now(),
                cache_hit: false,
                fallback_used,
                total_count: recommendations.len(),
                processing_time_ms: started.elapsed().as_millis() as u64,
            },
            recommendations,
        }
    }

    async fn load_inputs(&self, user_id: &str) -> RecResult<GenerateInputs> {
        let (products, user_behaviors, all_behaviors) = tokio::try_join!(
            self.catalog.get_products(None),
            self.behaviors.get_user_behaviors(user_id),
            self.behaviors.get_all_user_behaviors(),
        )?;
        Ok(GenerateInputs {
            user: Arc::new(User::new(user_id).with_behaviors(user_behaviors)),
            catalog: Arc::new(CatalogSnapshot::new(products)),
            all_behaviors: Arc::new(all_behaviors),
        })
    }

    /// Runs the requested branches concurrently. Branch output is concatenated
    /// in a fixed order: collaborative, content, popular, trending. Any branch
    /// failing fails the whole pass.
    async fn generate(
        &self,
        request: &RecommendationRequest,
        algorithm: RecommendationAlgorithm,
    ) -> RecResult<Vec<Recommendation>> {
        let inputs = self.load_inputs(&request.user_id).await?;
        let scope = BranchScope {
            category: request.category.clone(),
            limit: request.limit.saturating_mul(CANDIDATE_MULTIPLIER),
        };
        let algos = &self.config.algorithms;

        // Explicit single-engine requests use raw scores
        let (collab_w, content_w, popular_w, trending_w) = match algorithm {
            RecommendationAlgorithm::Hybrid => (
                algos.collaborative.enabled.then_some(algos.collaborative.weight),
                algos.content_based.enabled.then_some(algos.content_based.weight),
                algos.popular.enabled.then_some(algos.popular.weight),
                algos.trending.enabled.then_some(algos.trending.weight),
            ),
            RecommendationAlgorithm::Collaborative | RecommendationAlgorithm::ItemBased => {
                (Some(1.0), None, None, None)
            }
            RecommendationAlgorithm::ContentBased => (None, Some(1.0), None, None),
            RecommendationAlgorithm::Popular => (None, None, Some(1.0), None),
            RecommendationAlgorithm::Trending => (None, None, None, Some(1.0)),
        };

        let collaborative = {
            let cf = self.collaborative.clone();
            let user = inputs.user.clone();
            let all = inputs.all_behaviors.clone();
            let catalog = inputs.catalog.clone();
            let item_based = algorithm == RecommendationAlgorithm::ItemBased;
            spawn_branch(collab_w, scope.clone(), move |limit| {
                if item_based {
                    cf.get_item_based_recommendations(&user, &catalog, limit)
                } else {
                    cf.get_recommendations(&user, &all, &catalog, limit)
                }
            })
        };

        let content = {
            let cb = self.content.clone();
            let user = inputs.user.clone();
            let catalog = inputs.catalog.clone();
            let target = request.product_id.clone();
            spawn_branch(content_w, scope.clone(), move |limit| {
                cb.get_recommendations(&user, &catalog, target.as_deref(), limit)
            })
        };

        let popular = {
            let all = inputs.all_behaviors.clone();
            let catalog = inputs.catalog.clone();
            spawn_branch(popular_w, scope.clone(), move |limit| {
                popular_products(&catalog, Some(&all), limit)
            })
        };

        let trending = {
            let all = inputs.all_behaviors.clone();
            let catalog = inputs.catalog.clone();
            let window_days = self.config.trending.window_days;
            spawn_branch(trending_w, scope, move |limit| {
                trending_products(&catalog, &all, window_days, Utc::now(), limit)
            })
        };

        let (collaborative, content, popular, trending) =
            tokio::try_join!(collaborative, content, popular, trending)
                .map_err(|e| RecError::Internal(anyhow_join(e)))?;

        debug!(
            user_id = %request.user_id,
            collaborative = collaborative.len(),
            content = content.len(),
            popular = popular.len(),
            trending = trending.len(),
            "Branches joined"
        );

        let mut merged = collaborative;
        merged.extend(content);
        merged.extend(popular);
        merged.extend(trending);
        Ok(merged)
    }

    /// Business rules, dedupe, stable sort, optional re-ranking, truncation.
    fn finalize(
        &self,
        candidates: Vec<Recommendation>,
        request: &RecommendationRequest,
    ) -> Vec<Recommendation> {
        let excluded: HashSet<&str> = request
            .exclude_product_ids
            .iter()
            .map(String::as_str)
            .collect();

        let mut seen: HashSet<String> = HashSet::new();
        let mut recs: Vec<Recommendation> = candidates
            .into_iter()
            .filter(|r| !excluded.contains(r.product_id.as_str()))
            .filter(|r| {
                request
                    .category
                    .as_deref()
                    .map_or(true, |c| r.product.category == c)
            })
            .filter(|r| r.score > MIN_RESULT_SCORE)
            .filter(|r| seen.insert(r.product_id.clone()))
            .collect();
        sort_by_score(&mut recs);

        let ranking = &self.config.ranking;
        if ranking.diversity_weight > 0.0 {
            recs = apply_diversity_penalty(recs, ranking.diversity_weight);
        }
        if ranking.recency_weight > 0.0 {
            recs = apply_recency_boost(recs, ranking.recency_weight);
        }
        if ranking.diversity_weight > 0.0 || ranking.recency_weight > 0.0 {
            sort_by_score(&mut recs);
        }

        recs.truncate(request.limit);
        recs
    }

    async fn fallback(&self, request: &RecommendationRequest) -> Vec<Recommendation> {
        let policy = &self.config.fallback;
        if !policy.use_popular && !policy.use_random {
            return Vec::new();
        }

        let products = match self.catalog.get_products(request.category.as_deref()).await {
            Ok(products) => products,
            Err(e) => {
                warn!(error = %e, "Catalog unavailable, fallback is empty");
                return Vec::new();
            }
        };
        let all_behaviors = if policy.use_popular {
            match self.behaviors.get_all_user_behaviors().await {
                Ok(all) => Some(all),
                Err(e) => {
                    debug!(error = %e, "Behavior store unavailable, ranking by catalog only");
                    None
                }
            }
        } else {
            None
        };

        let catalog = CatalogSnapshot::new(products);
        let exclude: HashSet<String> = request.exclude_product_ids.iter().cloned().collect();
        let scope = FallbackScope {
            category: request.category.as_deref(),
            exclude: &exclude,
            limit: request.limit,
        };
        let mut rng = rand::thread_rng();
        build_fallback(&catalog, all_behaviors.as_ref(), policy, &scope, &mut rng)
    }

    /// Fill the item-based similarity table from the behavior store.
    pub async fn precompute_item_similarities(&self) -> RecResult<()> {
        let all = self.behaviors.get_all_user_behaviors().await?;
        let cf = self.collaborative.clone();
        tokio::task::spawn_blocking(move || cf.precompute_item_similarities(&all))
            .await
            .map_err(|e| RecError::Internal(anyhow_join(e)))?;
        Ok(())
    }

    pub fn cache_stats(&self) -> EngineCacheStats {
        EngineCacheStats {
            responses: self.responses.stats(),
            neighbor_sets: self.collaborative.cached_neighbor_sets(),
            similar_item_sets: self.content.cached_targets(),
        }
    }

    /// Drop expired entries from every cache. Returns the number removed.
    pub fn purge_expired(&self) -> usize {
        self.responses.evict_expired()
            + self.collaborative.purge_expired()
            + self.content.purge_expired()
    }

    pub fn clear_cache(&self) {
        self.responses.clear();
        self.collaborative.clear_cache();
        self.content.clear_cache();
    }
}

/// Candidate window shared by every branch of one request.
#[derive(Debug, Clone)]
struct BranchScope {
    category: Option<String>,
    limit: usize,
}

/// Spawn one scoring branch on the blocking pool. A disabled branch
/// (no weight) resolves to an empty list. With a category in scope the
/// branch is scored uncapped and filtered to that category before truncation.
fn spawn_branch<F>(
    weight: Option<f64>,
    scope: BranchScope,
    score: F,
) -> JoinHandle<Vec<Recommendation>>
where
    F: FnOnce(usize) -> Vec<Recommendation> + Send + 'static,
{
    tokio::task::spawn_blocking(move || match weight {
        Some(weight) => {
            let mut recs = match scope.category.as_deref() {
                Some(category) => {
                    let mut recs = score(usize::MAX);
                    recs.retain(|r| r.product.category == category);
                    recs.truncate(scope.limit);
                    recs
                }
                None => score(scope.limit),
            };
            for rec in recs.iter_mut() {
                rec.score *= weight;
            }
            recs
        }
        None => Vec::new(),
    })
}

fn anyhow_join(e: tokio::task::JoinError) -> anyhow::Error {
    anyhow::anyhow!("scoring branch aborted: {e}")
}
