//! Cart endpoints.
//!
//! Every handler resolves the session first, so the token in use can be
//! echoed even when the request itself is rejected.

use std::collections::BTreeMap;

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use basket_cart::{AddItem, Outcome};
use basket_session::{CartOperation, CartState};
use basket_types::{Catalog, LineItem, LineQuery, ProductId, ProductSnapshot};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ServerError};
use crate::state::AppState;
use crate::token::{CartToken, TokenHeader};

// ─────────────────────────────────────────────────────────────────────────────
// Request/Response Types
// ─────────────────────────────────────────────────────────────────────────────

/// Request to add a product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddItemRequest {
    /// Product ID. Also accepted as `product_id`.
    #[serde(alias = "product_id")]
    pub id: i64,
    /// Quantity to add; values below 1 become 1.
    #[serde(default = "default_quantity")]
    pub quantity: i64,
    /// Variation ID, for variable products.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variation_id: Option<i64>,
    /// Chosen variation attributes.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variation: BTreeMap<String, String>,
}

fn default_quantity() -> i64 {
    1
}

impl AddItemRequest {
    fn into_operation(self) -> Result<CartOperation> {
        let product_id = positive_id(self.id)
            .ok_or_else(|| ServerError::BadRequest("Invalid product ID".to_string()))?;

        let mut request = AddItem::new(product_id, self.quantity);
        if let Some(variation_id) = self.variation_id.and_then(positive_id) {
            request = request.with_variation(variation_id);
        }
        for (name, value) in self.variation {
            request = request.with_option(name, value);
        }

        Ok(CartOperation::Add(request))
    }
}

/// Identifies one line: by `key`, or by product `id`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LineTarget {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
}

impl LineTarget {
    /// An explicit key wins over a product id.
    fn into_query(self) -> Result<LineQuery> {
        if let Some(key) = self.key.filter(|k| !k.is_empty()) {
            return Ok(LineQuery::ByKey(key));
        }
        self.id
            .and_then(positive_id)
            .map(LineQuery::ByProduct)
            .ok_or_else(|| ServerError::BadRequest("Either key or id is required".to_string()))
    }
}

/// One cart line priced from the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartLineView {
    pub key: String,
    pub product_id: ProductId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variation_id: Option<ProductId>,
    pub quantity: u32,
    pub unit_price: f64,
    pub line_total: f64,
    pub product: ProductSnapshot,
}

/// Cart response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartResponse {
    pub cart_key: String,
    pub token: String,
    pub expiry: DateTime<Utc>,
    /// Sum of quantities over the lines in `cart`.
    pub items_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub cart: Vec<CartLineView>,
}

impl CartResponse {
    /// Build the light view. Lines whose product no longer resolves are left
    /// out; the reaper removes them from storage.
    pub fn build(state: &CartState, catalog: &dyn Catalog) -> Self {
        let cart: Vec<CartLineView> = state
            .payload
            .lines()
            .iter()
            .filter_map(|line| line_view(line, catalog))
            .collect();
        let items_count = cart.iter().map(|l| u64::from(l.quantity)).sum();

        Self {
            cart_key: state.cart_key.clone(),
            token: state.token.clone(),
            expiry: state.expiry,
            items_count,
            message: state.outcome.as_ref().map(|o| o.message().to_string()),
            cart,
        }
    }
}

fn line_view(line: &LineItem, catalog: &dyn Catalog) -> Option<CartLineView> {
    let product = catalog.resolve_product(line.product_id)?;
    let unit_price = line
        .variation_id
        .and_then(|id| catalog.resolve_product(id))
        .map_or(product.price, |variation| variation.price);

    Some(CartLineView {
        key: line.key.clone(),
        product_id: line.product_id,
        variation_id: line.variation_id,
        quantity: line.quantity,
        unit_price,
        line_total: unit_price * f64::from(line.quantity),
        product,
    })
}

fn positive_id(id: i64) -> Option<ProductId> {
    ProductId::try_from(id).ok().filter(|id| *id > 0)
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/cart - Get (or start) the cart.
pub async fn get_cart_handler(
    State(state): State<AppState>,
    CartToken(token): CartToken,
) -> Response {
    match state.service.resolve(token).await {
        Ok(resolved) => respond(&state, CartState::from(&resolved)),
        Err(e) => ServerError::from(e).into_response(),
    }
}

/// POST /api/v1/cart/add - Add a product.
///
/// Returns 201 when this created the cart's first line.
pub async fn add_item_handler(
    State(state): State<AppState>,
    CartToken(token): CartToken,
    body: std::result::Result<Json<AddItemRequest>, JsonRejection>,
) -> Response {
    mutate(&state, token, || parse(body)?.into_operation()).await
}

/// PATCH /api/v1/cart - Set quantities for existing lines.
pub async fn update_quantities_handler(
    State(state): State<AppState>,
    CartToken(token): CartToken,
    body: std::result::Result<Json<BTreeMap<String, i64>>, JsonRejection>,
) -> Response {
    mutate(&state, token, || Ok(CartOperation::SetQuantities(parse(body)?))).await
}

/// POST /api/v1/cart/remove-item - Remove a line.
pub async fn remove_item_handler(
    State(state): State<AppState>,
    CartToken(token): CartToken,
    body: std::result::Result<Json<LineTarget>, JsonRejection>,
) -> Response {
    mutate(&state, token, || Ok(CartOperation::Remove(parse(body)?.into_query()?))).await
}

/// POST /api/v1/cart/add-one - Increase a line's quantity by one.
pub async fn add_one_handler(
    State(state): State<AppState>,
    CartToken(token): CartToken,
    body: std::result::Result<Json<LineTarget>, JsonRejection>,
) -> Response {
    mutate(&state, token, || Ok(CartOperation::Increment(parse(body)?.into_query()?))).await
}

/// POST /api/v1/cart/remove-one - Decrease a line's quantity by one.
pub async fn remove_one_handler(
    State(state): State<AppState>,
    CartToken(token): CartToken,
    body: std::result::Result<Json<LineTarget>, JsonRejection>,
) -> Response {
    mutate(&state, token, || Ok(CartOperation::Decrement(parse(body)?.into_query()?))).await
}

/// DELETE /api/v1/cart, POST /api/v1/cart/clear - Empty the cart.
pub async fn clear_cart_handler(
    State(state): State<AppState>,
    CartToken(token): CartToken,
) -> Response {
    mutate(&state, token, || Ok(CartOperation::Clear)).await
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn parse<T>(body: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    body.map(|Json(value)| value)
        .map_err(|e| ServerError::BadRequest(e.body_text()))
}

/// Resolve, build the operation, apply it, and answer with the token in use.
async fn mutate<F>(state: &AppState, token: Option<String>, operation: F) -> Response
where
    F: FnOnce() -> Result<CartOperation>,
{
    let resolved = match state.service.resolve(token).await {
        Ok(resolved) => resolved,
        Err(e) => return ServerError::from(e).into_response(),
    };

    let result = match operation() {
        Ok(operation) => state
            .service
            .apply(&resolved, operation)
            .await
            .map_err(ServerError::from),
        Err(e) => Err(e),
    };

    match result {
        Ok(cart) => respond(state, cart),
        Err(e) => (TokenHeader(resolved.token), e).into_response(),
    }
}

fn respond(state: &AppState, cart: CartState) -> Response {
    let status = if cart.outcome.as_ref().is_some_and(Outcome::created_first_line) {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    let body = CartResponse::build(&cart, state.service.catalog().as_ref());
    (status, TokenHeader(cart.token), Json(body)).into_response()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::token::CART_TOKEN_HEADER;
    use axum::{
        Router,
        body::Body,
        http::{Method, Request},
        routing::{get, post},
    };
    use basket_session::{CartService, SessionConfig};
    use basket_store::{SqliteCartStore, StoreConfig};
    use basket_token::{TokenCodec, TokenConfig};
    use basket_types::InMemoryCatalog;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn create_test_state() -> (AppState, Arc<InMemoryCatalog>) {
        let codec = TokenCodec::new(TokenConfig::new("route-secret", "test")).unwrap();
        let store = Arc::new(SqliteCartStore::open_in_memory(codec, StoreConfig::default()).unwrap());
        let catalog = Arc::new(InMemoryCatalog::with_products([
            ProductSnapshot::new(42, "Mug", 9.5),
            ProductSnapshot::new(7, "Tee", 20.0),
        ]));
        let service = CartService::new(store, catalog.clone(), SessionConfig::default());
        (AppState::new(service, ServerConfig::default()), catalog)
    }

    fn create_test_router(state: AppState) -> Router {
        Router::new()
            .route(
                "/cart",
                get(get_cart_handler)
                    .patch(update_quantities_handler)
                    .delete(clear_cart_handler),
            )
            .route("/cart/add", post(add_item_handler))
            .route("/cart/remove-item", post(remove_item_handler))
            .route("/cart/add-one", post(add_one_handler))
            .route("/cart/remove-one", post(remove_one_handler))
            .with_state(state)
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, Option<String>, serde_json::Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(CART_TOKEN_HEADER, token);
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let echoed = response
            .headers()
            .get(CART_TOKEN_HEADER)
            .map(|v| v.to_str().unwrap().to_string());
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, echoed, json)
    }

    #[tokio::test]
    async fn test_get_cart_creates_session() {
        let (state, _) = create_test_state();
        let app = create_test_router(state);

        let (status, echoed, body) = send(&app, Method::GET, "/cart", None, None).await;
        assert_eq!(status, StatusCode::OK);

        let cart: CartResponse = serde_json::from_value(body).unwrap();
        assert_eq!(echoed.as_deref(), Some(cart.token.as_str()));
        assert!(cart.cart_key.starts_with("ck_"));
        assert_eq!(cart.items_count, 0);
        assert!(cart.cart.is_empty());
    }

    #[tokio::test]
    async fn test_add_returns_created_then_ok() {
        let (state, _) = create_test_state();
        let app = create_test_router(state);

        let (status, token, body) = send(
            &app,
            Method::POST,
            "/cart/add",
            None,
            Some(serde_json::json!({"id": 42, "quantity": 2})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let token = token.unwrap();
        let cart: CartResponse = serde_json::from_value(body).unwrap();
        assert_eq!(cart.items_count, 2);
        assert_eq!(cart.cart[0].line_total, 19.0);
        assert_eq!(cart.message.as_deref(), Some("Item added to cart"));

        let (status, echoed, body) = send(
            &app,
            Method::POST,
            "/cart/add",
            Some(&token),
            Some(serde_json::json!({"product_id": 42, "quantity": 1})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(echoed.as_deref(), Some(token.as_str()));
        let cart: CartResponse = serde_json::from_value(body).unwrap();
        assert_eq!(cart.cart.len(), 1);
        assert_eq!(cart.cart[0].quantity, 3);
    }

    #[tokio::test]
    async fn test_add_invalid_product_id() {
        let (state, _) = create_test_state();
        let app = create_test_router(state);

        let (status, echoed, body) = send(
            &app,
            Method::POST,
            "/cart/add",
            None,
            Some(serde_json::json!({"id": 0})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(echoed.is_some());
        assert_eq!(body["code"], "bad_request");
    }

    #[tokio::test]
    async fn test_add_unknown_product_is_not_found() {
        let (state, _) = create_test_state();
        let app = create_test_router(state);

        let (status, echoed, body) = send(
            &app,
            Method::POST,
            "/cart/add",
            None,
            Some(serde_json::json!({"id": 999})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(echoed.is_some());
        assert_eq!(body["code"], "not_found");
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request() {
        let (state, _) = create_test_state();
        let app = create_test_router(state);

        let (status, _, body) = send(
            &app,
            Method::POST,
            "/cart/add",
            None,
            Some(serde_json::json!({"quantity": "lots"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "bad_request");
    }

    #[tokio::test]
    async fn test_line_operations() {
        let (state, _) = create_test_state();
        let app = create_test_router(state);

        let (_, token, _) = send(
            &app,
            Method::POST,
            "/cart/add",
            None,
            Some(serde_json::json!({"id": 42})),
        )
        .await;
        let token = token.unwrap();

        let (status, _, body) = send(
            &app,
            Method::POST,
            "/cart/add-one",
            Some(&token),
            Some(serde_json::json!({"id": 42})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let cart: CartResponse = serde_json::from_value(body).unwrap();
        assert_eq!(cart.cart[0].quantity, 2);
        let key = cart.cart[0].key.clone();

        let (_, _, body) = send(
            &app,
            Method::POST,
            "/cart/remove-one",
            Some(&token),
            Some(serde_json::json!({"key": key})),
        )
        .await;
        let cart: CartResponse = serde_json::from_value(body).unwrap();
        assert_eq!(cart.cart[0].quantity, 1);

        let (status, _, body) = send(
            &app,
            Method::POST,
            "/cart/remove-item",
            Some(&token),
            Some(serde_json::json!({"key": key})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let cart: CartResponse = serde_json::from_value(body).unwrap();
        assert!(cart.cart.is_empty());

        let (status, _, _) = send(
            &app,
            Method::POST,
            "/cart/remove-item",
            Some(&token),
            Some(serde_json::json!({"id": 42})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_line_target_requires_key_or_id() {
        let (state, _) = create_test_state();
        let app = create_test_router(state);

        let (status, _, _) = send(
            &app,
            Method::POST,
            "/cart/remove-item",
            None,
            Some(serde_json::json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_patch_and_delete() {
        let (state, _) = create_test_state();
        let app = create_test_router(state);

        let (_, token, body) = send(
            &app,
            Method::POST,
            "/cart/add",
            None,
            Some(serde_json::json!({"id": 7})),
        )
        .await;
        let token = token.unwrap();
        let cart: CartResponse = serde_json::from_value(body).unwrap();
        let key = cart.cart[0].key.clone();

        let (status, _, body) = send(
            &app,
            Method::PATCH,
            "/cart",
            Some(&token),
            Some(serde_json::json!({ key.clone(): 4, "unknown": 2 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let cart: CartResponse = serde_json::from_value(body).unwrap();
        assert_eq!(cart.items_count, 4);

        let (status, _, body) = send(&app, Method::DELETE, "/cart", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        let cart: CartResponse = serde_json::from_value(body).unwrap();
        assert_eq!(cart.items_count, 0);
        assert_eq!(cart.message.as_deref(), Some("Cart cleared"));
    }

    #[tokio::test]
    async fn test_invalid_token_gets_fresh_cart() {
        let (state, _) = create_test_state();
        let app = create_test_router(state);

        let (status, echoed, body) =
            send(&app, Method::GET, "/cart", Some("not-a-token"), None).await;
        assert_eq!(status, StatusCode::OK);
        let echoed = echoed.unwrap();
        assert_ne!(echoed, "not-a-token");
        let cart: CartResponse = serde_json::from_value(body).unwrap();
        assert_eq!(cart.token, echoed);
    }

    #[tokio::test]
    async fn test_missing_products_hidden_from_view() {
        let (state, catalog) = create_test_state();
        let app = create_test_router(state);

        let (_, token, _) = send(
            &app,
            Method::POST,
            "/cart/add",
            None,
            Some(serde_json::json!({"id": 42})),
        )
        .await;
        let token = token.unwrap();
        send(
            &app,
            Method::POST,
            "/cart/add",
            Some(&token),
            Some(serde_json::json!({"id": 7, "quantity": 2})),
        )
        .await;

        catalog.remove(7);

        let (_, _, body) = send(&app, Method::GET, "/cart", Some(&token), None).await;
        let cart: CartResponse = serde_json::from_value(body).unwrap();
        assert_eq!(cart.cart.len(), 1);
        assert_eq!(cart.cart[0].product_id, 42);
        assert_eq!(cart.items_count, 1);
    }
}
