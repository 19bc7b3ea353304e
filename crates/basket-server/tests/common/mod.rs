//! Common test utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use reqwest::Client;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use basket_server::{CART_TOKEN_HEADER, Server, ServerConfig};
use basket_session::{CartService, SessionConfig};
use basket_store::{SqliteCartStore, StoreConfig};
use basket_token::{TokenCodec, TokenConfig};
use basket_types::{InMemoryCatalog, ProductSnapshot};

pub const TEST_SECRET: &str = "integration-secret";

/// A test server that runs in the background over an on-disk store.
pub struct TestServer {
    /// The server's address.
    pub addr: SocketAddr,
    /// HTTP client configured for this server.
    pub client: Client,
    /// Direct handle on the store the server writes to.
    pub store: Arc<SqliteCartStore>,
    /// Catalog shared with the server; tests may add or remove products.
    pub catalog: Arc<InMemoryCatalog>,
    /// Handle to the server task.
    _handle: JoinHandle<()>,
    /// Holds the database file.
    pub temp_dir: TempDir,
}

impl TestServer {
    /// Start a new test server with default configuration.
    pub async fn start() -> Result<Self> {
        Self::start_with(ServerConfig::new(), SessionConfig::default()).await
    }

    /// Start a new test server with explicit server and session settings.
    pub async fn start_with(config: ServerConfig, session: SessionConfig) -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let addr = find_available_port().await?;

        let store = Arc::new(SqliteCartStore::open(
            &temp_dir.path().join("carts.db"),
            codec(),
            StoreConfig::default(),
        )?);
        let catalog = Arc::new(InMemoryCatalog::with_products([
            ProductSnapshot::new(42, "Mug", 9.5),
            ProductSnapshot::new(43, "Mug (blue)", 11.0),
            ProductSnapshot::new(7, "Tee", 20.0),
            ProductSnapshot::new(8, "Sold-out hat", 15.0).out_of_stock(),
        ]));

        let service = CartService::new(store.clone(), catalog.clone(), session);
        let config = config.with_bind_address(addr).with_request_logging(false);

        let server = Server::new(service, config);
        let handle = tokio::spawn(async move {
            let _ = server.run_on(addr).await;
        });

        let client = Client::new();
        wait_for_server(&client, addr).await?;

        Ok(Self {
            addr,
            client,
            store,
            catalog,
            _handle: handle,
            temp_dir,
        })
    }

    /// Get the base URL for the server.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.base_url(), path)
    }

    /// GET under `/api/v1`, carrying `token` in `X-Cart-Token` when given.
    pub fn get(&self, path: &str, token: Option<&str>) -> reqwest::RequestBuilder {
        with_token(self.client.get(self.url(path)), token)
    }

    /// POST under `/api/v1`.
    pub fn post(&self, path: &str, token: Option<&str>) -> reqwest::RequestBuilder {
        with_token(self.client.post(self.url(path)), token)
    }

    /// PATCH under `/api/v1`.
    pub fn patch(&self, path: &str, token: Option<&str>) -> reqwest::RequestBuilder {
        with_token(self.client.patch(self.url(path)), token)
    }

    /// DELETE under `/api/v1`.
    pub fn delete(&self, path: &str, token: Option<&str>) -> reqwest::RequestBuilder {
        with_token(self.client.delete(self.url(path)), token)
    }
}

/// Codec matching the one the test server verifies with.
pub fn codec() -> TokenCodec {
    TokenCodec::new(TokenConfig::new(TEST_SECRET, "https://shop.test"))
        .expect("valid test secret")
}

/// The token echoed by a response.
pub fn echoed_token(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get(CART_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn with_token(builder: reqwest::RequestBuilder, token: Option<&str>) -> reqwest::RequestBuilder {
    match token {
        Some(token) => builder.header(CART_TOKEN_HEADER, token),
        None => builder,
    }
}

/// Find an available port for the test server.
async fn find_available_port() -> Result<SocketAddr> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(addr)
}

/// Wait for the server to become ready.
async fn wait_for_server(client: &Client, addr: SocketAddr) -> Result<()> {
    let url = format!("http://{}/health", addr);

    let ready = timeout(Duration::from_secs(5), async {
        loop {
            match client.get(&url).send().await {
                Ok(resp) if resp.status().is_success() => break,
                _ => tokio::time::sleep(Duration::from_millis(50)).await,
            }
        }
    })
    .await;

    match ready {
        Ok(()) => Ok(()),
        Err(_) => anyhow::bail!("Timeout waiting for server to start"),
    }
}
