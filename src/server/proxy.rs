// src/server/proxy.rs

use crate::config::Upstream;
use bytes::Bytes;
use serde::Serialize;
use std::convert::Infallible;
use tracing::{info, warn};
use url::Url;
use warp::{http::Method, http::StatusCode, Reply};

/// Shared client + upstream target for the forecast proxy route.
pub struct ProxyContext {
    client: reqwest::Client,
    upstream: Option<Upstream>,
}

#[derive(Serialize)]
struct ProxyError {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl ProxyContext {
    pub fn new(upstream: Option<Upstream>) -> Self {
        Self {
            client: reqwest::Client::new(),
            upstream,
        }
    }
}

/// Forward the incoming request verbatim to the upstream forecasting API
/// and relay its status and body. Non-2xx upstream responses are relayed
/// as-is, not treated as transport failures.
pub async fn forward(
    ctx: std::sync::Arc<ProxyContext>,
    method: Method,
    query: String,
    authorization: Option<String>,
    content_type: Option<String>,
    body: Bytes,
) -> Result<impl Reply, Infallible> {
    let upstream = match &ctx.upstream {
        Some(upstream) => upstream,
        None => {
            return Ok(reply_error(
                StatusCode::BAD_GATEWAY,
                "No upstream forecasting API configured",
                None,
            ))
        }
    };

    let target = match build_target(&upstream.base_url, &query) {
        Ok(url) => url,
        Err(e) => {
            return Ok(reply_error(
                StatusCode::BAD_GATEWAY,
                "Invalid upstream URL",
                Some(e),
            ))
        }
    };

    info!(%method, target = %target, "proxying forecast request");

    let req_method = reqwest::Method::from_bytes(method.as_str().as_bytes())
        .unwrap_or(reqwest::Method::GET);
    let mut request = ctx.client.request(req_method, target);

    // Forward the caller's token, falling back to the configured one.
    if let Some(auth) =
        authorization.or_else(|| upstream.token.as_ref().map(|t| format!("Bearer {t}")))
    {
        request = request.header("Authorization", auth);
    }
    if let Some(ct) = content_type {
        request = request.header("Content-Type", ct);
    }
    request = request.header("Accept", "application/json");
    if method != Method::GET && method != Method::HEAD && !body.is_empty() {
        request = request.body(body);
    }

    let response = match request.send().await {
        Ok(response) => response,
        Err(e) => {
            warn!(error = %e, "upstream request failed");
            return Ok(reply_error(
                StatusCode::BAD_GATEWAY,
                "Failed to proxy request",
                Some(e.to_string()),
            ));
        }
    };

    let status = StatusCode::from_u16(response.status().as_u16())
        .unwrap_or(StatusCode::BAD_GATEWAY);
    let text = match response.text().await {
        Ok(text) => text,
        Err(e) => {
            return Ok(reply_error(
                StatusCode::BAD_GATEWAY,
                "Failed to read upstream response",
                Some(e.to_string()),
            ))
        }
    };

    if !status.is_success() {
        warn!(%status, "upstream returned error");
        return Ok(reply_error(
            status,
            &format!("API responded with status {status}"),
            Some(text),
        ));
    }

    // Upstream sometimes answers with bare text; wrap that so callers
    // always get JSON back.
    let json: serde_json::Value = serde_json::from_str(&text)
        .unwrap_or_else(|_| serde_json::json!({ "message": text }));
    Ok(warp::reply::with_status(warp::reply::json(&json), status))
}

fn build_target(base_url: &str, query: &str) -> Result<Url, String> {
    let mut url = Url::parse(base_url).map_err(|e| e.to_string())?;
    if !query.is_empty() {
        url.set_query(Some(query));
    }
    Ok(url)
}

fn reply_error(
    status: StatusCode,
    message: &str,
    details: Option<String>,
) -> warp::reply::WithStatus<warp::reply::Json> {
    warp::reply::with_status(
        warp::reply::json(&ProxyError {
            error: message.to_string(),
            details,
        }),
        status,
    )
}
