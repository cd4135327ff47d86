//! The HTTP provider used by the RPC block stream and the call tracer.

use std::time::Duration;

use alloy_provider::RootProvider;
use alloy_rpc_client::RpcClient;
use alloy_transport_http::Http;
use anyhow::Context;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub type HttpProvider = RootProvider<Http<reqwest::Client>>;

/// Connects to `rpc_url` with a 30 second request timeout.
/// The API key, if any, is sent as a bearer token.
pub fn http_provider(
    rpc_url: &str,
    api_key: Option<&str>,
) -> Result<HttpProvider, anyhow::Error> {
    http_provider_with_timeout(rpc_url, api_key, DEFAULT_TIMEOUT)
}

pub fn http_provider_with_timeout(
    rpc_url: &str,
    api_key: Option<&str>,
    timeout: Duration,
) -> Result<HttpProvider, anyhow::Error> {
    let url = rpc_url
        .parse()
        .with_context(|| format!("Invalid RPC URL: {}", rpc_url))?;
    let client = reqwest::Client::builder()
        .default_headers(auth_headers(api_key)?)
        .timeout(timeout)
        .build()
        .context("Failed to build HTTP client")?;
    let transport = Http::with_client(client, url);
    Ok(RootProvider::new(RpcClient::new(transport, false)))
}

fn auth_headers(api_key: Option<&str>) -> Result<HeaderMap, anyhow::Error> {
    let mut headers = HeaderMap::new();
    if let Some(api_key) = api_key {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", api_key))
            .context("API key is not a valid header value")?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }
    Ok(headers)
}
