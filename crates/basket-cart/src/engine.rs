//! The mutation engine and its operations.

use std::collections::BTreeMap;
use std::num::NonZeroU32;
use std::sync::Arc;

use basket_types::{CartPayload, Catalog, LineItem, LineQuery, ProductId};
use tracing::debug;

use crate::error::{CartError, Result};

/// An add-to-cart request.
#[derive(Debug, Clone, PartialEq)]
pub struct AddItem {
    pub product_id: ProductId,
    pub variation_id: Option<ProductId>,
    pub options: BTreeMap<String, String>,
    /// Requested quantity as supplied by the client; values below 1 become 1.
    pub quantity: i64,
}

impl AddItem {
    pub fn new(product_id: ProductId, quantity: i64) -> Self {
        Self {
            product_id,
            variation_id: None,
            options: BTreeMap::new(),
            quantity,
        }
    }

    /// Add a specific variation of the product.
    pub fn with_variation(mut self, variation_id: ProductId) -> Self {
        self.variation_id = Some(variation_id);
        self
    }

    /// Add a chosen option (e.g. `attribute_size = L`).
    pub fn with_option(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(name.into(), value.into());
        self
    }
}

/// What an operation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A product was added or merged into an existing line.
    Added {
        line_key: String,
        quantity: u32,
        /// The cart had no lines before this add.
        first_line: bool,
    },
    /// A line was removed.
    Removed { line_key: String },
    /// A line's quantity changed.
    QuantityChanged { line_key: String, quantity: u32 },
    /// Batch update applied to `applied` lines; `ignored` keys were unknown.
    QuantitiesSet { applied: usize, ignored: usize },
    /// All lines were dropped.
    Cleared { removed_lines: usize },
}

impl Outcome {
    /// Whether this add created the cart's first line.
    pub fn created_first_line(&self) -> bool {
        matches!(
            self,
            Outcome::Added {
                first_line: true,
                ..
            }
        )
    }

    /// Short human-readable description, used as the response message.
    pub fn message(&self) -> &'static str {
        match self {
            Outcome::Added { .. } => "Item added to cart",
            Outcome::Removed { .. } => "Item removed from cart",
            Outcome::QuantityChanged { .. } => "Item quantity updated",
            Outcome::QuantitiesSet { .. } => "Cart updated",
            Outcome::Cleared { .. } => "Cart cleared",
        }
    }
}

/// A new payload plus what changed.
#[derive(Debug, Clone, PartialEq)]
pub struct Mutation {
    pub payload: CartPayload,
    pub outcome: Outcome,
}

/// Applies cart-altering operations to a payload.
///
/// Deterministic given the catalog snapshot; holds no cart state of its own.
#[derive(Clone)]
pub struct CartMutationEngine {
    catalog: Arc<dyn Catalog>,
}

impl CartMutationEngine {
    pub fn new(catalog: Arc<dyn Catalog>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &Arc<dyn Catalog> {
        &self.catalog
    }

    /// Add a product, merging into the existing line for the same product
    /// and options.
    ///
    /// Not idempotent: repeating the call keeps increasing the quantity.
    pub fn add_item(&self, payload: &CartPayload, request: &AddItem) -> Result<Mutation> {
        let product = self
            .catalog
            .resolve_product(request.product_id)
            .ok_or(CartError::ProductNotFound(request.product_id))?;
        if !product.in_stock {
            return Err(CartError::ProductUnavailable(product.id));
        }

        // A variation carries its own price and stock.
        let priced = match request.variation_id {
            Some(variation_id) => {
                let variation = self
                    .catalog
                    .resolve_product(variation_id)
                    .ok_or(CartError::ProductNotFound(variation_id))?;
                if !variation.in_stock {
                    return Err(CartError::ProductUnavailable(variation_id));
                }
                variation
            }
            None => product,
        };

        let line = LineItem::with_options(
            request.product_id,
            request.variation_id,
            request.options.clone(),
            clamp_quantity(request.quantity),
        )
        .with_unit_price(priced.price);
        let line_key = line.key.clone();

        let first_line = payload.is_empty();
        let mut next = payload.clone();
        let quantity = next.merge_line(line);

        debug!(
            product_id = request.product_id,
            line_key = %line_key,
            quantity,
            first_line,
            "Added item"
        );

        Ok(Mutation {
            payload: next,
            outcome: Outcome::Added {
                line_key,
                quantity,
                first_line,
            },
        })
    }

    /// Remove the line matched by `query`.
    pub fn remove_item(&self, payload: &CartPayload, query: &LineQuery) -> Result<Mutation> {
        let line_key = locate(payload, query)?;
        let mut next = payload.clone();
        next.remove(&line_key);

        Ok(Mutation {
            payload: next,
            outcome: Outcome::Removed { line_key },
        })
    }

    /// Add one to the matched line.
    pub fn increment_item(&self, payload: &CartPayload, query: &LineQuery) -> Result<Mutation> {
        let line_key = locate(payload, query)?;
        let current = payload.get(&line_key).map_or(1, |l| l.quantity);
        let quantity = NonZeroU32::new(current.saturating_add(1)).unwrap_or(NonZeroU32::MIN);

        let mut next = payload.clone();
        next.set_quantity(&line_key, quantity);

        Ok(Mutation {
            payload: next,
            outcome: Outcome::QuantityChanged {
                line_key,
                quantity: quantity.get(),
            },
        })
    }

    /// Subtract one from the matched line, removing it when it was at 1.
    pub fn decrement_item(&self, payload: &CartPayload, query: &LineQuery) -> Result<Mutation> {
        let line_key = locate(payload, query)?;
        let current = payload.get(&line_key).map_or(1, |l| l.quantity);
        let mut next = payload.clone();

        let outcome = match NonZeroU32::new(current.saturating_sub(1)) {
            Some(quantity) => {
                next.set_quantity(&line_key, quantity);
                Outcome::QuantityChanged {
                    line_key,
                    quantity: quantity.get(),
                }
            }
            None => {
                next.remove(&line_key);
                Outcome::Removed { line_key }
            }
        };

        Ok(Mutation {
            payload: next,
            outcome,
        })
    }

    /// Set quantities for existing lines.
    ///
    /// Unknown keys are ignored. Non-positive quantities become 1; removal
    /// goes through [`Self::remove_item`].
    pub fn batch_set_quantities(
        &self,
        payload: &CartPayload,
        quantities: &BTreeMap<String, i64>,
    ) -> Mutation {
        let mut next = payload.clone();
        let mut applied = 0;
        let mut ignored = 0;

        for (key, requested) in quantities {
            if next.set_quantity(key, clamp_quantity(*requested)) {
                applied += 1;
            } else {
                ignored += 1;
            }
        }

        if ignored > 0 {
            debug!(applied, ignored, "Ignored unknown line keys in batch update");
        }

        Mutation {
            payload: next,
            outcome: Outcome::QuantitiesSet { applied, ignored },
        }
    }

    /// Drop every line.
    pub fn clear(&self, payload: &CartPayload) -> Mutation {
        Mutation {
            payload: CartPayload::new(),
            outcome: Outcome::Cleared {
                removed_lines: payload.len(),
            },
        }
    }
}

fn locate(payload: &CartPayload, query: &LineQuery) -> Result<String> {
    payload
        .find(query)
        .map(|line| line.key.clone())
        .ok_or_else(|| CartError::ItemNotFound(query.clone()))
}

/// Coerce a client-supplied quantity into `1..=u32::MAX`.
fn clamp_quantity(requested: i64) -> NonZeroU32 {
    let clamped = requested.clamp(1, i64::from(u32::MAX)) as u32;
    NonZeroU32::new(clamped).unwrap_or(NonZeroU32::MIN)
}
