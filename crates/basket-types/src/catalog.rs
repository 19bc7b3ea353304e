//! Product catalog boundary.
//!
//! The cart never computes prices or decides whether a product exists; it
//! asks a [`Catalog`]. Pricing, tax and stock rules live behind this trait.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::cart::ProductId;

/// Point-in-time view of a product as reported by the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub id: ProductId,
    pub name: String,
    pub price: f64,
    #[serde(default = "default_in_stock")]
    pub in_stock: bool,
}

fn default_in_stock() -> bool {
    true
}

impl ProductSnapshot {
    pub fn new(id: ProductId, name: impl Into<String>, price: f64) -> Self {
        Self {
            id,
            name: name.into(),
            price,
            in_stock: true,
        }
    }

    /// Mark the product as out of stock.
    pub fn out_of_stock(mut self) -> Self {
        self.in_stock = false;
        self
    }
}

/// Resolves product references. `None` means the product does not exist.
pub trait Catalog: Send + Sync {
    fn resolve_product(&self, id: ProductId) -> Option<ProductSnapshot>;
}

impl<C: Catalog + ?Sized> Catalog for Arc<C> {
    fn resolve_product(&self, id: ProductId) -> Option<ProductSnapshot> {
        (**self).resolve_product(id)
    }
}

/// Errors loading a catalog file.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read catalog file '{path}': {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse catalog file '{path}': {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
}

/// Catalog held in memory, shareable across threads.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    products: RwLock<HashMap<ProductId, ProductSnapshot>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_products(products: impl IntoIterator<Item = ProductSnapshot>) -> Self {
        let catalog = Self::new();
        for product in products {
            catalog.insert(product);
        }
        catalog
    }

    /// Load a JSON array of products.
    pub fn from_json_file(path: &Path) -> Result<Self, CatalogError> {
        let contents = std::fs::read_to_string(path).map_err(|e| CatalogError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        let products: Vec<ProductSnapshot> =
            serde_json::from_str(&contents).map_err(|e| CatalogError::Parse {
                path: path.display().to_string(),
                source: e,
            })?;
        Ok(Self::with_products(products))
    }

    pub fn insert(&self, product: ProductSnapshot) {
        self.products.write().insert(product.id, product);
    }

    pub fn remove(&self, id: ProductId) -> Option<ProductSnapshot> {
        self.products.write().remove(&id)
    }

    pub fn len(&self) -> usize {
        self.products.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.read().is_empty()
    }
}

impl Catalog for InMemoryCatalog {
    fn resolve_product(&self, id: ProductId) -> Option<ProductSnapshot> {
        self.products.read().get(&id).cloned()
    }
}
