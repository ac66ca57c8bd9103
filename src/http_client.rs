//! Shared HTTP Client Module
//!
//! Provides a global, lazily-initialized HTTP client for Microsoft Graph with
//! connection pooling, so token requests and drive calls reuse the same
//! connections across events.

use once_cell::sync::OnceCell;
use reqwest::Client;
use std::time::Duration;

/// Timeout for Graph token and drive requests
const GRAPH_TIMEOUT: Duration = Duration::from_secs(60);

static GRAPH_CLIENT: OnceCell<Client> = OnceCell::new();

/// Build a pooled client with the given request timeout
pub fn build_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(timeout)
        .pool_max_idle_per_host(8)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .tcp_nodelay(true)
        .build()
}

/// Get the global Graph HTTP client.
///
/// Created on first access and reused for all subsequent calls.
pub fn graph_client() -> Result<&'static Client, reqwest::Error> {
    GRAPH_CLIENT.get_or_try_init(|| build_client(GRAPH_TIMEOUT))
}
