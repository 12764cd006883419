use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use futures::StreamExt;
use serde::Deserialize;

use crate::routes::mcp_http::{MESSAGES_PATH, SESSION_HEADER};
use crate::state::AppState;

const SSE_PATH: &str = "/sse";
const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

#[derive(Debug, Deserialize)]
pub struct CloseSessionQuery {
    #[serde(rename = "sessionId")]
    pub session_id: String,
}

pub fn router() -> Router<AppState> {
    Router::new().route(SSE_PATH, get(open_stream).delete(close_stream))
}

/// Open a push stream. The first event is `endpoint`, naming the URI that
/// call-style requests for this session should be posted to.
async fn open_stream(State(state): State<AppState>) -> Response {
    let opened = state.sessions.open(MESSAGES_PATH);
    let events = opened.stream.map(|frame| {
        Ok::<Event, Infallible>(Event::default().event(frame.event).data(frame.data))
    });

    let mut response = Sse::new(events)
        .keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL))
        .into_response();
    match HeaderValue::from_str(&opened.token) {
        Ok(value) => {
            response
                .headers_mut()
                .insert(HeaderName::from_static(SESSION_HEADER), value);
        }
        Err(err) => {
            tracing::warn!(error = %err, "session token is not a valid header value");
        }
    }
    response
}

/// Explicit close. Unknown or already closed sessions are not an error.
async fn close_stream(
    State(state): State<AppState>,
    Query(query): Query<CloseSessionQuery>,
) -> StatusCode {
    state.sessions.close(&query.session_id);
    StatusCode::NO_CONTENT
}
