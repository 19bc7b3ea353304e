//! HTTP transport for basket cart sessions.
//!
//! Exposes the cart pipeline over a small REST API. Clients carry their cart
//! in an opaque token sent in `X-Cart-Token` (or `Cart-Token`, or
//! `Authorization: Bearer`), and every cart response echoes the token they
//! should keep.
//!
//! # Example
//!
//! ```ignore
//! use basket_server::{Server, ServerConfig};
//!
//! let config = ServerConfig::new().with_bind_address("127.0.0.1:8080".parse()?);
//! let server = Server::new(cart_service, config);
//! server.run().await?;
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod routes;
pub mod state;
pub mod token;

pub use config::ServerConfig;
pub use error::{ErrorResponse, Result, ServerError};
pub use logging::request_logging_middleware;
pub use routes::{CartResponse, HandoffResponse};
pub use state::AppState;
pub use token::{CART_TOKEN_ALIAS_HEADER, CART_TOKEN_HEADER, CartToken, TokenHeader};

use std::future::Future;
use std::net::SocketAddr;

use axum::{Router, middleware};
use basket_session::CartService;
use tokio::net::TcpListener;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// The basket HTTP server.
pub struct Server {
    state: AppState,
}

impl Server {
    /// Create a new server over the given cart service.
    pub fn new(service: CartService, config: ServerConfig) -> Self {
        Self {
            state: AppState::new(service, config),
        }
    }

    /// Create a server from a pre-built application state.
    pub fn from_state(state: AppState) -> Self {
        Self { state }
    }

    /// Build the router with all routes and middleware.
    pub fn router(&self) -> Router {
        Router::new()
            .merge(routes::health_routes())
            .nest("/api/v1", self.api_routes())
            .layer(middleware::from_fn_with_state(
                self.state.clone(),
                logging::request_logging_middleware,
            ))
            .layer(RequestBodyLimitLayer::new(self.state.config.max_body_size))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// API routes (v1).
    fn api_routes(&self) -> Router<AppState> {
        use axum::routing::{get, post};

        Router::new()
            .route(
                "/cart",
                get(routes::get_cart_handler)
                    .patch(routes::update_quantities_handler)
                    .delete(routes::clear_cart_handler),
            )
            .route("/cart/clear", post(routes::clear_cart_handler))
            .route("/cart/add", post(routes::add_item_handler))
            .route("/cart/remove-item", post(routes::remove_item_handler))
            .route("/cart/add-one", post(routes::add_one_handler))
            .route("/cart/remove-one", post(routes::remove_one_handler))
            .route("/checkout/handoff", post(routes::handoff_handler))
    }

    /// Run the server on the configured address.
    pub async fn run(self) -> Result<()> {
        let addr = self.state.config.bind_address;
        self.run_on(addr).await
    }

    /// Run the server on a specific address (useful for testing).
    pub async fn run_on(self, addr: SocketAddr) -> Result<()> {
        self.serve(addr, std::future::pending()).await
    }

    /// Run on the configured address until `signal` resolves.
    ///
    /// In-flight requests are allowed to finish.
    pub async fn run_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.state.config.bind_address;
        self.serve(addr, signal).await
    }

    async fn serve<F>(self, addr: SocketAddr, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let router = self.router();

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Internal(format!("Failed to bind {}: {}", addr, e)))?;

        info!("Starting server on {}", addr);

        axum::serve(listener, router)
            .with_graceful_shutdown(signal)
            .await
            .map_err(|e| ServerError::Internal(format!("Server error: {}", e)))?;

        info!("Server stopped");
        Ok(())
    }

    /// Get the configured bind address.
    pub fn bind_address(&self) -> SocketAddr {
        self.state.config.bind_address
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }
}
