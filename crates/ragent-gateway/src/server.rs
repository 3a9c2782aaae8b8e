use crate::error::ApiError;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderValue, Method},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use ragent_agent::{AskResponse, HealthStatus, Orchestrator};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Longest accepted query, in characters.
pub const MAX_QUERY_CHARS: usize = 2000;

/// Listener and CORS settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// TCP port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Comma-separated allowed origins, or `*` for any.
    #[serde(default = "default_cors_origins")]
    pub cors_origins: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_cors_origins() -> String {
    "*".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: default_cors_origins(),
        }
    }
}

impl ServerConfig {
    /// `host:port` for the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Shared application state.
pub struct AppState {
    /// Answers questions for every request.
    pub orchestrator: Arc<Orchestrator>,
}

/// Body of `POST /api/ask`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskRequest {
    /// The question, 1 to 2000 characters.
    pub query: String,
    /// Session to continue, if any.
    #[serde(default)]
    pub session_id: Option<String>,
}

/// The HTTP gateway.
pub struct GatewayServer;

impl GatewayServer {
    /// Build the router with tracing and CORS layers applied.
    pub fn build(orchestrator: Arc<Orchestrator>, config: &ServerConfig) -> Router {
        let state = Arc::new(AppState { orchestrator });

        Router::new()
            .route("/", get(root_handler))
            .route("/api/ask", post(ask_handler))
            .route("/api/health", get(health_handler))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(cors_layer(&config.cors_origins)),
            )
    }
}

fn cors_layer(origins: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    if origins.trim() == "*" {
        return cors.allow_origin(Any);
    }
    let allowed: Vec<HeaderValue> = origins
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| match s.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %s, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    cors.allow_origin(allowed)
}

/// Reject empty, whitespace-only, and oversized queries.
fn validate_query(query: &str) -> Result<(), ApiError> {
    if query.trim().is_empty() {
        return Err(ApiError::Validation("query must not be empty".to_string()));
    }
    let chars = query.chars().count();
    if chars > MAX_QUERY_CHARS {
        return Err(ApiError::Validation(format!(
            "query is {chars} characters, the limit is {MAX_QUERY_CHARS}"
        )));
    }
    Ok(())
}

async fn root_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": "Ragent API",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "endpoints": ["/api/ask", "/api/health"],
    }))
}

async fn ask_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<AskResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::Validation(e.body_text()))?;
    validate_query(&request.query)?;

    info!(
        chars = request.query.chars().count(),
        session_id = request.session_id.as_deref().unwrap_or("new"),
        "Received query"
    );

    // Run the turn on its own task so a client disconnect cannot cut it off
    // between the model call and the session update.
    let orchestrator = state.orchestrator.clone();
    let task = tokio::spawn(async move {
        orchestrator
            .ask(&request.query, request.session_id.as_deref())
            .await
    });

    match task.await {
        Ok(Ok(response)) => Ok(Json(response)),
        Ok(Err(e)) => {
            error!(error = %e, external = e.is_external(), "Error processing query");
            Err(ApiError::Internal)
        }
        Err(e) => {
            error!(error = %e, "Query task failed");
            Err(ApiError::Internal)
        }
    }
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthStatus> {
    Json(state.orchestrator.health().await)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_query_bounds() {
        assert!(validate_query("What is the leave policy?").is_ok());
        assert!(validate_query(&"a".repeat(MAX_QUERY_CHARS)).is_ok());
        assert!(validate_query(&"a".repeat(MAX_QUERY_CHARS + 1)).is_err());
        assert!(validate_query("").is_err());
        assert!(validate_query(" \n\t ").is_err());
    }

    #[test]
    fn test_validate_counts_characters_not_bytes() {
        // 2000 two-byte characters.
        assert!(validate_query(&"é".repeat(MAX_QUERY_CHARS)).is_ok());
    }

    #[test]
    fn test_server_config_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr(), "0.0.0.0:8000");
        assert_eq!(config.cors_origins, "*");
    }
}
