use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Catalog product snapshot. Owned by the external catalog store; the engine
/// only reads it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: f64,
    pub category: String,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub attributes: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub image_url: Option<String>,
    /// Average rating on a 0-5 scale.
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub review_count: u32,
    #[serde(default)]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: DateTime<Utc>,
}

/// Read model of a shopper as seen by the engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub preferences: UserPreferences,
    #[serde(default)]
    pub demographics: HashMap<String, String>,
    #[serde(default)]
    pub behavior_history: Vec<UserBehavior>,
}

impl User {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_behaviors(mut self, behaviors: Vec<UserBehavior>) -> Self {
        self.behavior_history = behaviors;
        self
    }

    pub fn with_preferences(mut self, preferences: UserPreferences) -> Self {
        self.preferences = preferences;
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PriceRange {
    pub min: f64,
    pub max: f64,
}

impl PriceRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// The range used when no purchase history exists.
    pub fn unbounded() -> Self {
        Self {
            min: 0.0,
            max: f64::MAX,
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.min <= 0.0 && self.max >= f64::MAX
    }

    pub fn contains(&self, price: f64) -> bool {
        price >= self.min && price <= self.max
    }
}

impl Default for PriceRange {
    fn default() -> Self {
        Self::unbounded()
    }
}

/// Preference profile derived from behavior history. Every field is always
/// present; updates go through the `with_*` methods.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserPreferences {
    /// Most frequent first.
    pub categories: Vec<String>,
    pub brands: Vec<String>,
    pub price_range: PriceRange,
    pub tags: Vec<String>,
    pub attribute_weights: HashMap<String, f64>,
}

impl UserPreferences {
    pub fn with_categories(mut self, categories: Vec<String>) -> Self {
        self.categories = categories;
        self
    }

    pub fn with_brands(mut self, brands: Vec<String>) -> Self {
        self.brands = brands;
        self
    }

    pub fn with_price_range(mut self, range: PriceRange) -> Self {
        self.price_range = range;
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_attribute_weight(mut self, key: impl Into<String>, weight: f64) -> Self {
        self.attribute_weights.insert(key.into(), weight);
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BehaviorType {
    View,
    Purchase,
    Cart,
    Wishlist,
    Rating,
    Search,
}

impl BehaviorType {
    /// Implicit-feedback weight used for collaborative item vectors.
    /// Ratings carry their own value; searches are not product signals.
    pub fn base_weight(&self, value: Option<f64>) -> Option<f64> {
        match self {
            BehaviorType::Purchase => Some(5.0),
            BehaviorType::Cart => Some(3.0),
            BehaviorType::Wishlist => Some(2.0),
            BehaviorType::View => Some(1.0),
            BehaviorType::Rating => Some(value.unwrap_or(0.0)),
            BehaviorType::Search => None,
        }
    }
}

/// Append-only interaction record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserBehavior {
    pub user_id: String,
    pub behavior_type: BehaviorType,
    pub product_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub context: HashMap<String, serde_json::Value>,
}

impl UserBehavior {
    pub fn new(
        user_id: impl Into<String>,
        behavior_type: BehaviorType,
        product_id: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            behavior_type,
            product_id: product_id.into(),
            timestamp: Utc::now(),
            value: None,
            context: HashMap::new(),
        }
    }

    pub fn with_value(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Interaction kinds accepted by the tracker.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InteractionType {
    View,
    Click,
    Purchase,
}

impl InteractionType {
    pub fn behavior_type(&self) -> BehaviorType {
        match self {
            InteractionType::View | InteractionType::Click => BehaviorType::View,
            InteractionType::Purchase => BehaviorType::Purchase,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ReasonType {
    Collaborative,
    Content,
    Popular,
    Trending,
    RecentlyViewed,
    CrossSell,
    UpSell,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecommendationReason {
    pub reason_type: ReasonType,
    pub explanation: String,
    pub confidence: f64,
    pub factors: Vec<String>,
}

/// A single ranked suggestion. Built per request and never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub product_id: String,
    pub product: Product,
    /// In [0, 1] for single-engine output; hybrid scores are scaled by the
    /// configured branch weight.
    pub score: f64,
    pub reason: RecommendationReason,
    pub algorithm: String,
}

impl Recommendation {
    pub fn new(
        product: Product,
        score: f64,
        reason: RecommendationReason,
        algorithm: impl Into<String>,
    ) -> Self {
        Self {
            product_id: product.id.clone(),
            product,
            score,
            reason,
            algorithm: algorithm.into(),
        }
    }
}

/// User-pair similarity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimilarityScore {
    pub user_id: String,
    pub similar_user_id: String,
    pub similarity: f64,
    pub common_items: usize,
}

/// Product-pair similarity with human readable reasons.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductSimilarity {
    pub product_id: String,
    pub similar_product_id: String,
    pub similarity: f64,
    pub reasons: Vec<String>,
}

/// Outward-facing quality summary. Computed by analytics, not by the engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecommendationMetrics {
    pub click_through_rate: f64,
    pub conversion_rate: f64,
    pub average_order_value: f64,
    pub diversity: f64,
    pub novelty: f64,
    pub coverage: f64,
}
