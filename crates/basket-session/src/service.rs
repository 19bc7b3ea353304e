//! Per-request cart pipeline: resolve, mutate, save.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use basket_cart::{AddItem, CartMutationEngine, Mutation, Outcome};
use basket_store::{CartSessionStore, StoreError};
use basket_types::{CartPayload, Catalog, LineQuery};
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::resolver::{ResolvedSession, SessionResolver};

/// A cart-altering request.
#[derive(Debug, Clone, PartialEq)]
pub enum CartOperation {
    Add(AddItem),
    Remove(LineQuery),
    Increment(LineQuery),
    Decrement(LineQuery),
    SetQuantities(BTreeMap<String, i64>),
    Clear,
}

impl CartOperation {
    fn name(&self) -> &'static str {
        match self {
            CartOperation::Add(_) => "add",
            CartOperation::Remove(_) => "remove",
            CartOperation::Increment(_) => "increment",
            CartOperation::Decrement(_) => "decrement",
            CartOperation::SetQuantities(_) => "set_quantities",
            CartOperation::Clear => "clear",
        }
    }
}

/// Cart contents after a request, with the token the client must keep.
#[derive(Debug, Clone)]
pub struct CartState {
    pub cart_key: String,
    pub payload: CartPayload,
    pub expiry: DateTime<Utc>,
    pub token: String,
    /// Present when the request mutated the cart.
    pub outcome: Option<Outcome>,
}

impl From<&ResolvedSession> for CartState {
    fn from(resolved: &ResolvedSession) -> Self {
        Self {
            cart_key: resolved.session.cart_key.clone(),
            payload: resolved.session.payload.clone(),
            expiry: resolved.session.expiry,
            token: resolved.token.clone(),
            outcome: None,
        }
    }
}

/// A cart consumed at checkout. The row no longer exists.
#[derive(Debug, Clone)]
pub struct Handoff {
    pub cart_key: String,
    pub payload: CartPayload,
}

/// Runs cart requests against a store and a catalog.
///
/// Holds no cart state between requests; every request re-loads its row.
/// Concurrent mutations of the same cart are last-writer-wins.
#[derive(Clone)]
pub struct CartService {
    store: Arc<dyn CartSessionStore>,
    resolver: SessionResolver,
    engine: CartMutationEngine,
    config: SessionConfig,
}

impl CartService {
    pub fn new(
        store: Arc<dyn CartSessionStore>,
        catalog: Arc<dyn Catalog>,
        config: SessionConfig,
    ) -> Self {
        Self {
            resolver: SessionResolver::new(Arc::clone(&store)),
            engine: CartMutationEngine::new(catalog),
            store,
            config,
        }
    }

    pub fn store(&self) -> &Arc<dyn CartSessionStore> {
        &self.store
    }

    pub fn catalog(&self) -> &Arc<dyn Catalog> {
        self.engine.catalog()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Resolve the presented token, creating a session when needed.
    pub async fn resolve(&self, token: Option<String>) -> Result<ResolvedSession> {
        let resolver = self.resolver.clone();
        self.blocking(move || resolver.resolve(token.as_deref()))
            .await
    }

    /// Resolve without creating a session.
    pub async fn resolve_strict(&self, token: Option<String>) -> Result<ResolvedSession> {
        let resolver = self.resolver.clone();
        self.blocking(move || resolver.resolve_strict(token.as_deref()))
            .await
    }

    /// Apply `operation` to a resolved session and persist the result with
    /// a full TTL extension.
    ///
    /// The whole payload is written in one call after the mutation succeeds;
    /// a rejected mutation writes nothing.
    ///
    /// A `StorageUnavailable` timeout does not roll back a save that had
    /// already started, so the write may still land.
    pub async fn apply(
        &self,
        resolved: &ResolvedSession,
        operation: CartOperation,
    ) -> Result<CartState> {
        let store = Arc::clone(&self.store);
        let engine = self.engine.clone();
        let rotate = self.config.rotate_on_save;
        let cart_key = resolved.session.cart_key.clone();
        let payload = resolved.session.payload.clone();
        let token = resolved.token.clone();

        self.blocking(move || {
            let op = operation.name();
            let Mutation { payload, outcome } = mutate(&engine, &payload, operation)?;

            let expiry = match store.save(&cart_key, &payload, true) {
                Ok(expiry) => expiry,
                Err(StoreError::NotFound(key)) => return Err(SessionError::SessionGone(key)),
                Err(e) => return Err(e.into()),
            };

            let token = if rotate {
                store
                    .codec()
                    .issue(&cart_key, store.default_ttl())
                    .map_err(StoreError::from)?
            } else {
                token
            };

            debug!(cart_key = %cart_key, op, lines = payload.len(), "Cart mutated");

            Ok(CartState {
                cart_key,
                payload,
                expiry,
                token,
                outcome: Some(outcome),
            })
        })
        .await
    }

    /// Consume a cart for checkout: strict resolution, then delete the row.
    ///
    /// Returns the payload that was stored. The token becomes useless.
    pub async fn handoff(&self, token: Option<String>) -> Result<Handoff> {
        let resolved = self.resolve_strict(token).await?;
        let store = Arc::clone(&self.store);
        let cart_key = resolved.session.cart_key.clone();

        self.blocking(move || store.delete(&cart_key).map_err(SessionError::from))
            .await?;

        info!(cart_key = %resolved.session.cart_key, lines = resolved.session.payload.len(), "Cart handed off");

        Ok(Handoff {
            cart_key: resolved.session.cart_key,
            payload: resolved.session.payload,
        })
    }

    /// Check that the store answers within the request timeout.
    pub async fn ping(&self) -> Result<()> {
        let store = Arc::clone(&self.store);
        self.blocking(move || Ok(store.ping()?)).await
    }

    /// Run a blocking store call on the blocking pool, bounded by the
    /// request timeout.
    ///
    /// A call still queued when the deadline passes never touches the store.
    /// One that is already running is left to finish in the background.
    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let timeout = self.config.request_timeout;
        let deadline = Instant::now() + timeout;
        let task = tokio::task::spawn_blocking(move || {
            if Instant::now() >= deadline {
                return Err(SessionError::StorageUnavailable(
                    "store call expired before it started".to_string(),
                ));
            }
            f()
        });
        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(SessionError::Task(e.to_string())),
            Err(_) => Err(SessionError::StorageUnavailable(format!(
                "store call exceeded {}ms",
                timeout.as_millis()
            ))),
        }
    }
}

fn mutate(
    engine: &CartMutationEngine,
    payload: &CartPayload,
    operation: CartOperation,
) -> Result<Mutation> {
    let mutation = match operation {
        CartOperation::Add(request) => engine.add_item(payload, &request)?,
        CartOperation::Remove(query) => engine.remove_item(payload, &query)?,
        CartOperation::Increment(query) => engine.increment_item(payload, &query)?,
        CartOperation::Decrement(query) => engine.decrement_item(payload, &query)?,
        CartOperation::SetQuantities(quantities) => {
            engine.batch_set_quantities(payload, &quantities)
        }
        CartOperation::Clear => engine.clear(payload),
    };
    Ok(mutation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use basket_cart::CartError;
    use basket_store::{
        CartSession, CleanupReport, IssuedSession, SqliteCartStore, StoreConfig,
    };
    use basket_token::{TokenCodec, TokenConfig};
    use basket_types::{InMemoryCatalog, ProductSnapshot};
    use chrono::Duration;
    use std::time::Duration as StdDuration;

    fn codec() -> TokenCodec {
        TokenCodec::new(TokenConfig::new("service-secret", "test")).unwrap()
    }

    fn catalog() -> Arc<InMemoryCatalog> {
        Arc::new(InMemoryCatalog::with_products([
            ProductSnapshot::new(42, "Mug", 9.5),
            ProductSnapshot::new(7, "Tee", 20.0),
        ]))
    }

    fn service_with(store: Arc<SqliteCartStore>, config: SessionConfig) -> CartService {
        CartService::new(store, catalog(), config)
    }

    fn setup() -> (Arc<SqliteCartStore>, CartService) {
        let store = Arc::new(SqliteCartStore::open_in_memory(codec(), StoreConfig::default()).unwrap());
        let service = service_with(Arc::clone(&store), SessionConfig::default());
        (store, service)
    }

    async fn add(service: &CartService, token: Option<String>, id: u64, qty: i64) -> CartState {
        let resolved = service.resolve(token).await.unwrap();
        service
            .apply(&resolved, CartOperation::Add(AddItem::new(id, qty)))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_add_add_load_scenario() {
        let (store, service) = setup();

        let first = add(&service, None, 42, 2).await;
        assert!(first.outcome.as_ref().unwrap().created_first_line());

        let second = add(&service, Some(first.token.clone()), 42, 1).await;
        assert_eq!(second.cart_key, first.cart_key);
        assert_eq!(second.token, first.token);

        let loaded = store.load(&first.cart_key).unwrap();
        assert_eq!(loaded.payload.len(), 1);
        assert_eq!(loaded.payload.lines()[0].product_id, 42);
        assert_eq!(loaded.payload.lines()[0].quantity, 3);
    }

    #[tokio::test]
    async fn test_rejected_mutation_writes_nothing() {
        let (store, service) = setup();
        let state = add(&service, None, 42, 1).await;
        let before = store.load(&state.cart_key).unwrap();

        let resolved = service.resolve(Some(state.token)).await.unwrap();
        let err = service
            .apply(&resolved, CartOperation::Add(AddItem::new(999, 1)))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Cart(CartError::ProductNotFound(999))));

        assert_eq!(store.load(&state.cart_key).unwrap(), before);
    }

    #[tokio::test]
    async fn test_save_after_delete_is_session_gone() {
        let (store, service) = setup();
        let resolved = service.resolve(None).await.unwrap();
        store.delete(resolved.cart_key()).unwrap();

        let err = service
            .apply(&resolved, CartOperation::Clear)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::SessionGone(_)));
    }

    #[tokio::test]
    async fn test_last_writer_wins() {
        // Two requests resolve the same cart, then both save. The later save
        // replaces the earlier one; the first add is lost. This is accepted
        // behavior without a per-cart lock.
        let (store, service) = setup();
        let created = service.resolve(None).await.unwrap();

        let a = service.resolve(Some(created.token.clone())).await.unwrap();
        let b = service.resolve(Some(created.token.clone())).await.unwrap();

        service
            .apply(&a, CartOperation::Add(AddItem::new(42, 1)))
            .await
            .unwrap();
        service
            .apply(&b, CartOperation::Add(AddItem::new(7, 1)))
            .await
            .unwrap();

        let loaded = store.load(created.cart_key()).unwrap();
        assert_eq!(loaded.payload.len(), 1);
        assert_eq!(loaded.payload.lines()[0].product_id, 7);
    }

    #[tokio::test]
    async fn test_rotate_on_save_issues_fresh_token() {
        let store = Arc::new(SqliteCartStore::open_in_memory(codec(), StoreConfig::default()).unwrap());
        let service = service_with(
            Arc::clone(&store),
            SessionConfig::default().with_rotate_on_save(true),
        );

        let resolved = service.resolve(None).await.unwrap();
        let stale_token = store
            .codec()
            .issue_at(resolved.cart_key(), Duration::hours(48), Utc::now() - Duration::hours(1))
            .unwrap();
        let stale = ResolvedSession {
            token: stale_token.clone(),
            ..resolved
        };

        let state = service.apply(&stale, CartOperation::Clear).await.unwrap();
        assert_ne!(state.token, stale_token);

        let claims = store.codec().verify(&state.token).unwrap();
        assert_eq!(claims.cart_key, state.cart_key);
        assert!((claims.exp - state.expiry.timestamp()).abs() <= 1);
    }

    #[tokio::test]
    async fn test_handoff_deletes_row() {
        let (store, service) = setup();
        let state = add(&service, None, 42, 2).await;

        let handoff = service.handoff(Some(state.token.clone())).await.unwrap();
        assert_eq!(handoff.cart_key, state.cart_key);
        assert_eq!(handoff.payload.total_quantity(), 2);
        assert_eq!(store.row_count().unwrap(), 0);

        let err = service.handoff(Some(state.token)).await.unwrap_err();
        assert!(matches!(err, SessionError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_handoff_without_token() {
        let (_store, service) = setup();
        let err = service.handoff(None).await.unwrap_err();
        assert!(matches!(err, SessionError::MissingToken));
    }

    /// Store whose calls block longer than any reasonable request timeout.
    struct StalledStore {
        codec: TokenCodec,
    }

    impl CartSessionStore for StalledStore {
        fn codec(&self) -> &TokenCodec {
            &self.codec
        }

        fn create_with_ttl(&self, _ttl: Duration) -> basket_store::Result<IssuedSession> {
            std::thread::sleep(StdDuration::from_millis(500));
            Err(StoreError::Unavailable("stalled".into()))
        }

        fn load(&self, cart_key: &str) -> basket_store::Result<CartSession> {
            Err(StoreError::NotFound(cart_key.to_string()))
        }

        fn save(
            &self,
            cart_key: &str,
            _payload: &CartPayload,
            _extend_ttl: bool,
        ) -> basket_store::Result<DateTime<Utc>> {
            Err(StoreError::NotFound(cart_key.to_string()))
        }

        fn delete(&self, _cart_key: &str) -> basket_store::Result<()> {
            Ok(())
        }

        fn cleanup(&self, _catalog: Option<&dyn Catalog>) -> basket_store::Result<CleanupReport> {
            Ok(CleanupReport::default())
        }
    }

    #[tokio::test]
    async fn test_stalled_store_times_out() {
        let store = Arc::new(StalledStore { codec: codec() });
        let service = CartService::new(
            store,
            catalog(),
            SessionConfig::default().with_request_timeout(StdDuration::from_millis(50)),
        );

        let err = service.resolve(None).await.unwrap_err();
        assert!(matches!(err, SessionError::StorageUnavailable(_)));
    }

    #[tokio::test]
    async fn test_expired_call_never_writes() {
        let (store, service) = setup();
        let resolved = service.resolve(None).await.unwrap();
        let key = resolved.session.cart_key.clone();

        let hurried = service_with(
            Arc::clone(&store),
            SessionConfig::default().with_request_timeout(StdDuration::ZERO),
        );
        let err = hurried
            .apply(&resolved, CartOperation::Add(AddItem::new(42, 1)))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::StorageUnavailable(_)));

        // Let the abandoned blocking task run to completion.
        tokio::time::sleep(StdDuration::from_millis(100)).await;
        assert!(store.load(&key).unwrap().payload.is_empty());
        assert_eq!(store.row_count().unwrap(), 1);
    }
}
