//! Endpoint derivation from the server base URL.
//!
//! The real-time endpoint is always the base URL's own host with the scheme
//! swapped for its WebSocket counterpart, so a TLS-terminating reverse proxy
//! in front of the backend needs no extra configuration.

use reqwest::Url;

use crate::error::ClientError;

/// Fixed path of the real-time endpoint
pub const WS_PATH: &str = "/ws";

/// Parse a base URL such as `https://agent.example.com:8443/app`.
pub fn parse_base(base: &str) -> Result<Url, ClientError> {
    let url = Url::parse(base).map_err(|e| ClientError::InvalidServerUrl(e.to_string()))?;
    if url.host_str().is_none() {
        return Err(ClientError::InvalidServerUrl(format!("{base}: missing host")));
    }
    Ok(url)
}

/// `wss:` for `https:` pages, `ws:` otherwise; the port only when explicit.
pub fn websocket_url(base: &Url) -> String {
    let scheme = if base.scheme() == "https" { "wss:" } else { "ws:" };
    let host = base.host_str().unwrap_or("localhost");

    let mut url = format!("{scheme}//{host}");
    // `Url::port` is None for the scheme's default port, matching a browser's `location.port`.
    if let Some(port) = base.port() {
        url.push_str(&format!(":{port}"));
    }
    url.push_str(WS_PATH);
    url
}

/// Origin (`scheme://host[:port]`) the REST endpoints hang off.
pub fn api_origin(base: &Url) -> String {
    base.origin().ascii_serialization()
}
