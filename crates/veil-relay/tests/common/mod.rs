//! Common test utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Result;
use reqwest::Client;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use veil_relay::{AppState, RelayConfig, RelayServer, UpstreamSessionResolver};
use veil_session::{SessionStore, StoreConfig};

/// A relay server that runs in the background.
pub struct TestServer {
    /// The server's address.
    pub addr: SocketAddr,
    /// HTTP client for this server.
    pub client: Client,
    /// Store shared with the running server.
    pub store: SessionStore,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl TestServer {
    /// Start a relay without an identity layer.
    pub async fn start() -> Result<Self> {
        Self::start_with(base_config(), None).await
    }

    /// Start a relay whose callback resolves sessions at `identity_url`.
    pub async fn start_with_identity(identity_url: &str) -> Result<Self> {
        let config = base_config().with_auth_base_url(identity_url);
        Self::start_with(config, Some(identity_url)).await
    }

    /// Start a relay with a custom config.
    pub async fn start_with(config: RelayConfig, identity_url: Option<&str>) -> Result<Self> {
        let addr = find_available_port().await?;
        let config = config
            .with_bind_address(addr)
            .with_public_base_url(format!("http://{}", addr));

        let mut state = AppState::new(config);
        if let Some(url) = identity_url {
            state = state.with_ambient_resolver(UpstreamSessionResolver::new(url)?);
        }
        let store = state.store.clone();

        let (tx, rx) = oneshot::channel();
        let server = RelayServer::from_state(state);
        let handle = tokio::spawn(async move {
            let _ = server
                .run_with_shutdown(addr, async {
                    let _ = rx.await;
                })
                .await;
        });

        let client = Client::new();
        wait_for_server(&client, addr).await?;

        Ok(Self {
            addr,
            client,
            store,
            shutdown: Some(tx),
            handle,
        })
    }

    /// Get the base URL for the server.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// GET request builder.
    pub fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.get(format!("{}{}", self.base_url(), path))
    }

    /// POST request builder.
    pub fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.post(format!("{}{}", self.base_url(), path))
    }

    /// Stop the server and wait for it to exit.
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        timeout(Duration::from_secs(5), &mut self.handle).await??;
        Ok(())
    }
}

/// Config used by every test server: no rate limit, no request logs.
pub fn base_config() -> RelayConfig {
    RelayConfig::new()
        .with_rate_limiting(false)
        .with_request_logging(false)
        .with_store_config(StoreConfig::new().with_sweep_interval(Duration::from_millis(50)))
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

    let result = timeout(Duration::from_secs(5), async {
        loop {
            match client.get(&url).send().await {
                Ok(resp) if resp.status().is_success() => return,
                _ => tokio::time::sleep(Duration::from_millis(50)).await,
            }
        }
    })
    .await;

    match result {
        Ok(()) => Ok(()),
        Err(_) => anyhow::bail!("Timeout waiting for server to start"),
    }
}
