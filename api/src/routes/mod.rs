use axum::Router;

use crate::state::AppState;

pub mod health;
pub mod mcp_http;
pub mod sse;

/// Every route the server exposes, before state and layers are applied.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(mcp_http::router())
        .merge(sse::router())
}
