//! Per-request catalog snapshot: products fetched once from the catalog
//! store and indexed by id so the engines can resolve candidates cheaply.

use recsys_core::types::Product;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    products: Vec<Product>,
    by_id: HashMap<String, usize>,
}

impl CatalogSnapshot {
    pub fn new(products: Vec<Product>) -> Self {
        let mut by_id = HashMap::with_capacity(products.len());
        for (idx, product) in products.iter().enumerate() {
            // First occurrence wins on duplicate ids
            by_id.entry(product.id.clone()).or_insert(idx);
        }
        Self { products, by_id }
    }

    pub fn get(&self, product_id: &str) -> Option<&Product> {
        self.by_id.get(product_id).map(|&idx| &self.products[idx])
    }

    pub fn contains(&self, product_id: &str) -> bool {
        self.by_id.contains_key(product_id)
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

impl From<Vec<Product>> for CatalogSnapshot {
    fn from(products: Vec<Product>) -> Self {
        Self::new(products)
    }
}
