use axum::http::{HeaderName, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::routes::mcp_http::SESSION_HEADER;

/// Build a CORS layer from a comma-separated origin list.
///
/// - Origins: `*` allows any origin, otherwise only the listed ones
/// - Methods: GET, POST, DELETE, OPTIONS
/// - Headers: Authorization, Content-Type, `mcp-session-id` (also exposed)
/// - Max age: 3600s
pub fn build_cors_layer(origins: &str) -> CorsLayer {
    let origin_values: Vec<&str> = origins
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .collect();

    let allow_origin = if origin_values.is_empty() || origin_values.contains(&"*") {
        AllowOrigin::from(Any)
    } else {
        let parsed: Vec<HeaderValue> = origin_values
            .into_iter()
            .filter_map(|origin| match origin.parse::<HeaderValue>() {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin, "ignoring unparseable CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(parsed)
    };

    let session_header = HeaderName::from_static(SESSION_HEADER);
    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            HeaderName::from_static("authorization"),
            HeaderName::from_static("content-type"),
            session_header.clone(),
        ])
        .expose_headers([session_header])
        .max_age(std::time::Duration::from_secs(3600))
}
