//! Interaction tracking. Appends behavior records that feed later
//! collaborative and content profiles. Failures never reach the caller.

use recsys_core::types::{InteractionType, UserBehavior};
use recsys_core::{BehaviorStore, RecError, RecResult};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct InteractionTracker {
    store: Arc<dyn BehaviorStore>,
}

impl InteractionTracker {
    pub fn new(store: Arc<dyn BehaviorStore>) -> Self {
        Self { store }
    }

    /// Record an interaction, logging and discarding any failure.
    pub async fn track_interaction(&self, user_id: &str, product_id: &str, kind: InteractionType) {
        if let Err(e) = self.record(user_id, product_id, kind).await {
            metrics::counter!("recsys.tracking.errors").increment(1);
            warn!(
                error = %e,
                user_id = %user_id,
                product_id = %product_id,
                "Failed to track interaction"
            );
        }
    }

    /// Fallible variant for callers that want the outcome.
    pub async fn record(&self, user_id: &str, product_id: &str, kind: InteractionType) -> RecResult<()> {
        if user_id.trim().is_empty() || product_id.trim().is_empty() {
            return Err(RecError::InvalidInput(
                "user id and product id must be non-empty".to_string(),
            ));
        }
        let behavior = UserBehavior::new(user_id, kind.behavior_type(), product_id);
        self.store.append_user_behavior(user_id, behavior).await?;
        debug!(user_id = %user_id, product_id = %product_id, kind = ?kind, "Interaction tracked");
        Ok(())
    }
}
