//! Application state shared across handlers.

use std::sync::Arc;

use basket_session::CartService;

use crate::config::ServerConfig;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Cart request pipeline.
    pub service: CartService,

    /// Server configuration.
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Create a new application state.
    pub fn new(service: CartService, config: ServerConfig) -> Self {
        Self {
            service,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}
