//! Search proxy: forwards browser queries to the search index.
//!
//! The upstream credential never reaches the browser; the site posts to this
//! server and receives the upstream response verbatim.

use anyhow::{bail, Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Json, Router,
};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use testimap_core::Config;
use tower_http::trace::TraceLayer;

const ALLOW_METHODS: &str = "POST, OPTIONS";
const ALLOW_HEADERS: &str = "Content-Type";

/// Command-line values that take precedence over the config file.
#[derive(Debug, Default)]
pub struct ProxyOverrides {
    pub port: Option<u16>,
    pub upstream_url: Option<String>,
    pub api_key: Option<String>,
    pub allow_origin: Option<String>,
}

#[derive(Debug)]
struct ProxySettings {
    path: String,
    upstream_url: String,
    api_key: String,
    allow_origin: HeaderValue,
}

#[derive(Clone)]
struct ProxyState {
    client: reqwest::Client,
    settings: Arc<ProxySettings>,
}

/// Start the proxy and serve until interrupted
pub async fn proxy_server(config_path: &Path, overrides: ProxyOverrides) -> Result<()> {
    let config = Config::load(config_path).context("Failed to load configuration")?;
    let proxy = config.proxy;

    let upstream_url = overrides.upstream_url.unwrap_or(proxy.upstream_url);
    if upstream_url.trim().is_empty() {
        bail!("No upstream URL configured (set proxy.upstream_url or SEARCH_UPSTREAM_URL)");
    }
    if !proxy.path.starts_with('/') {
        bail!("Proxy path {:?} must start with '/'", proxy.path);
    }
    let allow_origin = overrides.allow_origin.unwrap_or(proxy.allow_origin);
    let allow_origin = HeaderValue::from_str(&allow_origin)
        .with_context(|| format!("Invalid allow_origin value {:?}", allow_origin))?;

    let settings = ProxySettings {
        path: proxy.path,
        upstream_url,
        api_key: overrides.api_key.unwrap_or(proxy.api_key),
        allow_origin,
    };
    let client = reqwest::Client::builder()
        .user_agent(concat!("testimap-proxy/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")?;

    let path = settings.path.clone();
    let app = router(ProxyState {
        client,
        settings: Arc::new(settings),
    });

    let addr = format!("{}:{}", proxy.bind, overrides.port.unwrap_or(proxy.port));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    tracing::info!("Search proxy listening on http://{}{}", addr, path);
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

fn router(state: ProxyState) -> Router {
    let path = state.settings.path.clone();
    Router::new()
        .route(&path, any(handle))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn handle(State(state): State<ProxyState>, method: Method, body: Bytes) -> Response {
    let response = match method {
        Method::OPTIONS => StatusCode::NO_CONTENT.into_response(),
        Method::POST => forward(&state, body).await,
        _ => (
            StatusCode::METHOD_NOT_ALLOWED,
            Json(json!({ "error": format!("Use POST {}", state.settings.path) })),
        )
            .into_response(),
    };
    with_cors(response, &state.settings.allow_origin)
}

/// Relay the body upstream and mirror the upstream status and payload.
async fn forward(state: &ProxyState, body: Bytes) -> Response {
    let settings = &state.settings;
    let mut request = state
        .client
        .post(&settings.upstream_url)
        .header(header::CONTENT_TYPE, "application/json")
        .body(body);
    if !settings.api_key.is_empty() {
        request = request.bearer_auth(&settings.api_key);
    }

    let upstream = match request.send().await {
        Ok(upstream) => upstream,
        Err(err) => return proxy_failure(err),
    };
    let status = upstream.status();
    let text = match upstream.text().await {
        Ok(text) => text,
        Err(err) => return proxy_failure(err),
    };

    match serde_json::from_str::<Value>(&text) {
        Ok(value) => (status, Json(value)).into_response(),
        Err(_) => (status, text).into_response(),
    }
}

fn proxy_failure(err: reqwest::Error) -> Response {
    tracing::error!("Proxy error: {}", err);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "Proxy request failed" })),
    )
        .into_response()
}

fn with_cors(mut response: Response, allow_origin: &HeaderValue) -> Response {
    let headers = response.headers_mut();
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, allow_origin.clone());
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOW_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOW_HEADERS),
    );
    response
}
