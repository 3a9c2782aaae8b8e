//! HTTP surface for Ragent.
//!
//! Exposes the orchestrator over three routes: a service banner at `/`,
//! `POST /api/ask`, and `GET /api/health`. Requests are validated here,
//! before they reach the orchestrator.

/// Error responses.
pub mod error;
/// Router construction, shared state, and handlers.
pub mod server;

pub use error::{ApiError, ErrorResponse};
pub use server::{AppState, AskRequest, GatewayServer, ServerConfig, MAX_QUERY_CHARS};
