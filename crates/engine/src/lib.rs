//! Hybrid product recommendation engine: collaborative and content-based
//! filtering, popularity and trend branches, weighted merge, response
//! caching, graceful fallback and interaction tracking.

pub mod catalog;
pub mod collaborative;
pub mod content_based;
pub mod engine;
pub mod fallback;
pub mod popularity;
pub mod tracker;

pub use catalog::CatalogSnapshot;
pub use collaborative::CollaborativeFilter;
pub use content_based::ContentBasedFilter;
pub use engine::{
    EngineCacheStats, RecommendationAlgorithm, RecommendationEngine, RecommendationRequest,
    RecommendationResponse, ResponseMetadata,
};
pub use tracker::InteractionTracker;
