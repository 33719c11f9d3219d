//! Storage boundary. The engine reads the catalog and behavior history through
//! these traits and never owns persistence.

use crate::error::RecResult;
use crate::types::{Product, UserBehavior};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn get_product(&self, id: &str) -> RecResult<Option<Product>>;

    /// All products, or only those in `category` when given.
    async fn get_products(&self, category: Option<&str>) -> RecResult<Vec<Product>>;
}

#[async_trait]
pub trait BehaviorStore: Send + Sync {
    async fn get_user_behaviors(&self, user_id: &str) -> RecResult<Vec<UserBehavior>>;

    async fn append_user_behavior(&self, user_id: &str, behavior: UserBehavior) -> RecResult<()>;

    async fn get_all_user_behaviors(&self) -> RecResult<HashMap<String, Vec<UserBehavior>>>;
}

/// Process-local store backing both traits. Used by the demo runner and tests.
#[derive(Default)]
pub struct InMemoryStore {
    products: DashMap<String, Product>,
    behaviors: DashMap<String, Vec<UserBehavior>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_product(&self, product: Product) {
        self.products.insert(product.id.clone(), product);
    }

    pub fn insert_behavior(&self, behavior: UserBehavior) {
        self.behaviors
            .entry(behavior.user_id.clone())
            .or_default()
            .push(behavior);
    }

    pub fn product_count(&self) -> usize {
        self.products.len()
    }

    pub fn behavior_count(&self, user_id: &str) -> usize {
        self.behaviors.get(user_id).map(|b| b.len()).unwrap_or(0)
    }
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn get_product(&self, id: &str) -> RecResult<Option<Product>> {
        Ok(self.products.get(id).map(|p| p.clone()))
    }

    async fn get_products(&self, category: Option<&str>) -> RecResult<Vec<Product>> {
        let mut products: Vec<Product> = self
            .products
            .iter()
            .filter(|entry| category.map_or(true, |c| entry.value().category == c))
            .map(|entry| entry.value().clone())
            .collect();
        // DashMap iteration order is arbitrary
        products.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(products)
    }
}

#[async_trait]
impl BehaviorStore for InMemoryStore {
    async fn get_user_behaviors(&self, user_id: &str) -> RecResult<Vec<UserBehavior>> {
        Ok(self
            .behaviors
            .get(user_id)
            .map(|b| b.clone())
            .unwrap_or_default())
    }

    async fn append_user_behavior(&self, user_id: &str, behavior: UserBehavior) -> RecResult<()> {
        self.behaviors
            .entry(user_id.to_string())
            .or_default()
            .push(behavior);
        Ok(())
    }

    async fn get_all_user_behaviors(&self) -> RecResult<HashMap<String, Vec<UserBehavior>>> {
        Ok(self
            .behaviors
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BehaviorType;

    fn product(id: &str, category: &str) -> Product {
        Product {
            id: id.to_string(),
            name: id.to_string(),
            category: category.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_catalog_filtering() {
        let store = InMemoryStore::new();
        store.insert_product(product("p2", "books"));
        store.insert_product(product("p1", "electronics"));
        store.insert_product(product("p3", "electronics"));

        let all = store.get_products(None).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].id, "p1");

        let electronics = store.get_products(Some("electronics")).await.unwrap();
        assert_eq!(electronics.len(), 2);
        assert!(store.get_product("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_behavior_append_and_read() {
        let store = InMemoryStore::new();
        store
            .append_user_behavior("u1", UserBehavior::new("u1", BehaviorType::View, "p1"))
            .await
            .unwrap();
        store.insert_behavior(UserBehavior::new("u2", BehaviorType::Purchase, "p2"));

        assert_eq!(store.get_user_behaviors("u1").await.unwrap().len(), 1);
        assert!(store.get_user_behaviors("nobody").await.unwrap().is_empty());
        assert_eq!(store.get_all_user_behaviors().await.unwrap().len(), 2);
        assert_eq!(store.behavior_count("u2"), 1);
    }
}
