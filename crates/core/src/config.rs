use crate::error::RecResult;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Root application configuration. Loaded from an optional TOML file and
/// environment variables with the prefix `RECSYS__`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub recommendation: RecommendationConfig,
}

impl AppConfig {
    pub fn load(path: Option<&str>) -> RecResult<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(true));
        }
        let config = builder
            .add_source(
                config::Environment::with_prefix("RECSYS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        let app: Self = config.try_deserialize()?;
        debug!(
            file = path.unwrap_or("<none>"),
            trending_weight = app.recommendation.algorithms.trending.weight,
            "Configuration loaded"
        );
        Ok(app)
    }
}

/// Engine configuration. Weights are multiplicative scalers applied to each
/// branch's [0, 1] score; they are not required to sum to 1.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecommendationConfig {
    #[serde(default)]
    pub algorithms: AlgorithmsConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub fallback: FallbackConfig,
    #[serde(default)]
    pub collaborative: CollaborativeConfig,
    #[serde(default)]
    pub content: ContentWeights,
    #[serde(default)]
    pub ranking: RankingConfig,
    #[serde(default)]
    pub trending: TrendingConfig,
}

impl RecommendationConfig {
    pub fn with_algorithms(mut self, algorithms: AlgorithmsConfig) -> Self {
        self.algorithms = algorithms;
        self
    }

    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_fallback(mut self, fallback: FallbackConfig) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn with_collaborative(mut self, collaborative: CollaborativeConfig) -> Self {
        self.collaborative = collaborative;
        self
    }

    pub fn with_content(mut self, content: ContentWeights) -> Self {
        self.content = content;
        self
    }

    pub fn with_ranking(mut self, ranking: RankingConfig) -> Self {
        self.ranking = ranking;
        self
    }

    pub fn with_trending(mut self, trending: TrendingConfig) -> Self {
        self.trending = trending;
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct AlgorithmSetting {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub weight: f64,
}

impl AlgorithmSetting {
    pub fn new(enabled: bool, weight: f64) -> Self {
        Self { enabled, weight }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            weight: 0.0,
        }
    }
}

/// Per-branch switches and weights for the hybrid.
///
/// Results must score above 0.1 to survive the business rules, and a
/// branch's weighted score never exceeds its weight. With the default
/// trending weight of 0.1 the trending branch therefore never reaches a
/// hybrid response; raise it above 0.1 to let trending items through.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlgorithmsConfig {
    #[serde(default = "default_collaborative_setting")]
    pub collaborative: AlgorithmSetting,
    #[serde(default = "default_content_setting")]
    pub content_based: AlgorithmSetting,
    #[serde(default = "default_popular_setting")]
    pub popular: AlgorithmSetting,
    #[serde(default = "default_trending_setting")]
    pub trending: AlgorithmSetting,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_cache_max_size")]
    pub max_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackConfig {
    #[serde(default = "default_enabled")]
    pub use_popular: bool,
    #[serde(default = "default_enabled")]
    pub use_random: bool,
    #[serde(default = "default_min_recommendations")]
    pub min_recommendations: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollaborativeConfig {
    #[serde(default = "default_min_similarity")]
    pub min_similarity: f64,
    #[serde(default = "default_max_neighbors")]
    pub max_neighbors: usize,
}

/// Attribute weights for content-based scoring.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContentWeights {
    #[serde(default = "default_category_weight")]
    pub category: f64,
    #[serde(default = "default_brand_weight")]
    pub brand: f64,
    #[serde(default = "default_price_weight")]
    pub price: f64,
    #[serde(default = "default_tags_weight")]
    pub tags: f64,
    #[serde(default = "default_rating_weight")]
    pub rating: f64,
}

/// Post-merge re-ranking. Zero disables the corresponding pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RankingConfig {
    #[serde(default)]
    pub diversity_weight: f64,
    #[serde(default)]
    pub recency_weight: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendingConfig {
    #[serde(default = "default_trending_window_days")]
    pub window_days: i64,
}

// Default functions
fn default_enabled() -> bool {
    true
}
fn default_collaborative_setting() -> AlgorithmSetting {
    AlgorithmSetting::new(true, 0.4)
}
fn default_content_setting() -> AlgorithmSetting {
    AlgorithmSetting::new(true, 0.3)
}
fn default_popular_setting() -> AlgorithmSetting {
    AlgorithmSetting::new(true, 0.2)
}
fn default_trending_setting() -> AlgorithmSetting {
    AlgorithmSetting::new(true, 0.1)
}
fn default_cache_ttl_secs() -> u64 {
    3600
}
fn default_cache_max_size() -> usize {
    1000
}
fn default_min_recommendations() -> usize {
    5
}
fn default_min_similarity() -> f64 {
    0.1
}
fn default_max_neighbors() -> usize {
    50
}
fn default_category_weight() -> f64 {
    0.30
}
fn default_brand_weight() -> f64 {
    0.20
}
fn default_price_weight() -> f64 {
    0.15
}
fn default_tags_weight() -> f64 {
    0.25
}
fn default_rating_weight() -> f64 {
    0.10
}
fn default_trending_window_days() -> i64 {
    7
}

impl Default for AlgorithmsConfig {
    fn default() -> Self {
        Self {
            collaborative: default_collaborative_setting(),
            content_based: default_content_setting(),
            popular: default_popular_setting(),
            trending: default_trending_setting(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl_secs(),
            max_size: default_cache_max_size(),
        }
    }
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            use_popular: true,
            use_random: true,
            min_recommendations: default_min_recommendations(),
        }
    }
}

impl Default for CollaborativeConfig {
    fn default() -> Self {
        Self {
            min_similarity: default_min_similarity(),
            max_neighbors: default_max_neighbors(),
        }
    }
}

impl Default for ContentWeights {
    fn default() -> Self {
        Self {
            category: default_category_weight(),
            brand: default_brand_weight(),
            price: default_price_weight(),
            tags: default_tags_weight(),
            rating: default_rating_weight(),
        }
    }
}

impl Default for TrendingConfig {
    fn default() -> Self {
        Self {
            window_days: default_trending_window_days(),
        }
    }
}
