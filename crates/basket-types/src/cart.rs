//! Cart payload types.

use std::collections::BTreeMap;
use std::fmt;
use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Catalog identity of a product.
pub type ProductId = u64;

/// Length of a derived line key (hex characters).
const LINE_KEY_LEN: usize = 32;

/// Derive the stable line key for a product and its chosen options.
///
/// The same product with the same variation and options always maps to the
/// same key, so repeated adds merge into one line.
pub fn derive_line_key(
    product_id: ProductId,
    variation_id: Option<ProductId>,
    options: &BTreeMap<String, String>,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(product_id.to_le_bytes());
    hasher.update(variation_id.unwrap_or(0).to_le_bytes());
    for (name, value) in options {
        hash_field(&mut hasher, name);
        hash_field(&mut hasher, value);
    }
    let digest = format!("{:x}", hasher.finalize());
    digest[..LINE_KEY_LEN].to_string()
}

/// Length-prefixed so option names and values can hold any characters.
fn hash_field(hasher: &mut Sha256, field: &str) {
    hasher.update((field.len() as u64).to_le_bytes());
    hasher.update(field.as_bytes());
}

/// One line of a cart: a product (plus options) and a quantity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub key: String,
    pub product_id: ProductId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variation_id: Option<ProductId>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, String>,
    pub quantity: u32,
    /// Unit price cached from the catalog snapshot when the line was last added.
    /// Display only; current pricing always comes from the catalog.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<f64>,
}

impl LineItem {
    /// Create a line for a plain product (no variation, no options).
    pub fn new(product_id: ProductId, quantity: NonZeroU32) -> Self {
        Self::with_options(product_id, None, BTreeMap::new(), quantity)
    }

    /// Create a line for a product with a variation and chosen options.
    pub fn with_options(
        product_id: ProductId,
        variation_id: Option<ProductId>,
        options: BTreeMap<String, String>,
        quantity: NonZeroU32,
    ) -> Self {
        Self {
            key: derive_line_key(product_id, variation_id, &options),
            product_id,
            variation_id,
            options,
            quantity: quantity.get(),
            unit_price: None,
        }
    }

    /// Set the cached unit price.
    pub fn with_unit_price(mut self, price: f64) -> Self {
        self.unit_price = Some(price);
        self
    }
}

/// How a caller addresses a line: by explicit line key or by product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineQuery {
    /// Exact line key.
    ByKey(String),
    /// First line (in cart order) holding this product.
    ByProduct(ProductId),
}

impl fmt::Display for LineQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineQuery::ByKey(key) => write!(f, "line '{}'", key),
            LineQuery::ByProduct(id) => write!(f, "product {}", id),
        }
    }
}

/// Ordered cart contents, keyed by line key.
///
/// Every line has quantity >= 1 and line keys are unique. Lines are only
/// reachable immutably; changes go through methods that keep both rules.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<LineItem>", into = "Vec<LineItem>")]
pub struct CartPayload {
    lines: Vec<LineItem>,
}

impl CartPayload {
    /// An empty cart.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a payload from raw lines, coercing zero quantities to 1 and
    /// merging lines that share a key.
    pub fn from_lines(lines: impl IntoIterator<Item = LineItem>) -> Self {
        let mut payload = Self::new();
        for mut line in lines {
            line.quantity = line.quantity.max(1);
            match payload.position(&line.key) {
                Some(idx) => {
                    let existing = &mut payload.lines[idx];
                    existing.quantity = existing.quantity.saturating_add(line.quantity);
                }
                None => payload.lines.push(line),
            }
        }
        payload
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Number of distinct lines.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Sum of all line quantities.
    pub fn total_quantity(&self) -> u64 {
        self.lines.iter().map(|l| u64::from(l.quantity)).sum()
    }

    pub fn lines(&self) -> &[LineItem] {
        &self.lines
    }

    pub fn get(&self, key: &str) -> Option<&LineItem> {
        self.lines.iter().find(|l| l.key == key)
    }

    /// Resolve a query to a line. Key lookups are exact; product lookups take
    /// the first matching line in cart order.
    pub fn find(&self, query: &LineQuery) -> Option<&LineItem> {
        match query {
            LineQuery::ByKey(key) => self.get(key),
            LineQuery::ByProduct(id) => self.lines.iter().find(|l| l.product_id == *id),
        }
    }

    /// Insert a line, or add its quantity to the existing line with the same key.
    ///
    /// Returns the resulting quantity of that line.
    pub fn merge_line(&mut self, line: LineItem) -> u32 {
        match self.position(&line.key) {
            Some(idx) => {
                let existing = &mut self.lines[idx];
                existing.quantity = existing.quantity.saturating_add(line.quantity.max(1));
                if line.unit_price.is_some() {
                    existing.unit_price = line.unit_price;
                }
                existing.quantity
            }
            None => {
                let quantity = line.quantity.max(1);
                self.lines.push(LineItem { quantity, ..line });
                quantity
            }
        }
    }

    /// Set the quantity of an existing line. Returns false if the key is unknown.
    pub fn set_quantity(&mut self, key: &str, quantity: NonZeroU32) -> bool {
        match self.position(key) {
            Some(idx) => {
                self.lines[idx].quantity = quantity.get();
                true
            }
            None => false,
        }
    }

    /// Remove a line by key.
    pub fn remove(&mut self, key: &str) -> Option<LineItem> {
        self.position(key).map(|idx| self.lines.remove(idx))
    }

    /// Keep only the lines matching `keep`, returning how many were dropped.
    pub fn retain<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&LineItem) -> bool,
    {
        let before = self.lines.len();
        self.lines.retain(|l| keep(l));
        before - self.lines.len()
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.lines.iter().position(|l| l.key == key)
    }
}

impl From<Vec<LineItem>> for CartPayload {
    fn from(lines: Vec<LineItem>) -> Self {
        Self::from_lines(lines)
    }
}

impl From<CartPayload> for Vec<LineItem> {
    fn from(payload: CartPayload) -> Self {
        payload.lines
    }
}
