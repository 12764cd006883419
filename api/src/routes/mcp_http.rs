use axum::body::Bytes;
use axum::extract::{RawQuery, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::Value;
use uuid::Uuid;

use crate::session::{PushError, SseFrame};
use crate::state::AppState;

const MCP_PATH: &str = "/mcp";
/// Call endpoint announced to streaming sessions.
pub const MESSAGES_PATH: &str = "/messages";
pub const SESSION_HEADER: &str = "mcp-session-id";
const SESSION_QUERY_PARAM: &str = "sessionId";

pub fn router() -> Router<AppState> {
    Router::new()
        .route(MCP_PATH, post(mcp_post).get(mcp_get))
        .route(MESSAGES_PATH, post(mcp_post))
}

async fn mcp_get() -> Response {
    StatusCode::METHOD_NOT_ALLOWED.into_response()
}

/// Answer one envelope or a batch synchronously; when the caller names an
/// open session, the same response is also pushed to its stream.
async fn mcp_post(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request_id = Uuid::now_v7();
    let session_id = session_token(query.as_deref(), &headers);

    let response = state.server.handle_bytes(&body).await;

    if let Some(token) = session_id.as_deref() {
        match state.sessions.push(token, SseFrame::message(&response)) {
            Ok(()) => {}
            Err(PushError::UnknownSession) => {
                tracing::debug!(
                    event = "mcp_session_unknown",
                    request_id = %request_id,
                    session_id = %token,
                    "no open session for token, replying directly only"
                );
            }
            Err(err) => {
                tracing::warn!(
                    event = "mcp_session_push_dropped",
                    request_id = %request_id,
                    session_id = %token,
                    reason = %err,
                    "MCP response not delivered to session stream"
                );
            }
        }
    }

    tracing::debug!(
        event = "mcp_http_request",
        request_id = %request_id,
        session_id = ?session_id,
        body_len = body.len(),
        batch = response.is_array(),
        "MCP HTTP request handled"
    );

    (StatusCode::OK, Json(response)).into_response()
}

/// Session token from the `sessionId` query parameter or the session header.
fn session_token(query: Option<&str>, headers: &HeaderMap) -> Option<String> {
    let from_query = query.and_then(|raw| {
        url::form_urlencoded::parse(raw.as_bytes())
            .find(|(key, _)| key == SESSION_QUERY_PARAM)
            .map(|(_, value)| value.into_owned())
    });
    from_query
        .or_else(|| {
            headers
                .get(SESSION_HEADER)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        })
        .filter(|token| !token.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::{HeaderValue, Request};
    use futures::StreamExt;
    use serde_json::json;
    use tower::ServiceExt;

    use super::*;
    use crate::state::test_state;

    async fn post_json(app: Router, uri: &str, body: String) -> (StatusCode, Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .expect("request should build"),
            )
            .await
            .expect("request should succeed");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn direct_call_answers_single_envelope() {
        let app = router().with_state(test_state());
        let (status, response) = post_json(
            app,
            MCP_PATH,
            json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": "tools/call",
                "params": { "name": "get_year", "arguments": { "id": 2023 } }
            })
            .to_string(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(response["id"], 1);
        assert_eq!(response["result"]["isError"], false);
    }

    #[tokio::test]
    async fn direct_call_answers_batch_in_order() {
        let app = router().with_state(test_state());
        let (_, response) = post_json(
            app,
            MCP_PATH,
            json!([
                { "jsonrpc": "2.0", "id": "a", "method": "ping" },
                { "id": "b", "method": "ping" },
                { "jsonrpc": "2.0", "id": "c", "method": "tools/list" }
            ])
            .to_string(),
        )
        .await;
        let responses = response.as_array().unwrap();
        assert_eq!(responses.len(), 3);
        assert_eq!(responses[0]["id"], "a");
        assert_eq!(responses[1]["error"]["code"], -32600);
        assert_eq!(responses[2]["result"]["tools"][0]["name"], "get_year");
    }

    #[tokio::test]
    async fn undecodable_body_is_parse_error() {
        let app = router().with_state(test_state());
        let (status, response) = post_json(app, MCP_PATH, "{not json".to_string()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(response["id"], Value::Null);
        assert_eq!(response["error"]["code"], -32700);
    }

    #[tokio::test]
    async fn messages_push_to_open_session_and_reply_directly() {
        let state = test_state();
        let mut opened = state.sessions.open(MESSAGES_PATH);
        let endpoint = opened.stream.next().await.unwrap();
        let app = router().with_state(state);

        let request = json!({ "jsonrpc": "2.0", "id": 42, "method": "ping" });
        let (_, direct) = post_json(app, &endpoint.data, request.to_string()).await;
        assert_eq!(direct["id"], 42);

        let pushed = opened.stream.next().await.unwrap();
        assert_eq!(pushed.event, "message");
        assert_eq!(serde_json::from_str::<Value>(&pushed.data).unwrap(), direct);
    }

    #[tokio::test]
    async fn unknown_session_still_gets_direct_reply() {
        let app = router().with_state(test_state());
        let (status, response) = post_json(
            app,
            "/messages?sessionId=deadbeef",
            json!({ "jsonrpc": "2.0", "id": 7, "method": "ping" }).to_string(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(response["result"], json!({}));
    }

    #[tokio::test]
    async fn closed_session_push_is_dropped_silently() {
        let state = test_state();
        let opened = state.sessions.open(MESSAGES_PATH);
        let token = opened.token.clone();
        drop(opened);
        let app = router().with_state(state);

        let (_, response) = post_json(
            app,
            &format!("/mcp?sessionId={token}"),
            json!({ "jsonrpc": "2.0", "id": 8, "method": "initialize" }).to_string(),
        )
        .await;
        assert_eq!(response["id"], 8);
        assert!(response["result"]["protocolVersion"].is_string());
    }

    #[test]
    fn session_token_prefers_query_then_header() {
        let mut headers = HeaderMap::new();
        headers.insert(SESSION_HEADER, HeaderValue::from_static("from-header"));
        assert_eq!(
            session_token(Some("sessionId=from-query&x=1"), &headers).as_deref(),
            Some("from-query")
        );
        assert_eq!(
            session_token(Some("x=1"), &headers).as_deref(),
            Some("from-header")
        );
        assert_eq!(session_token(None, &HeaderMap::new()), None);
        assert_eq!(session_token(Some("sessionId="), &HeaderMap::new()), None);
    }

    #[tokio::test]
    async fn get_on_mcp_is_not_allowed() {
        let app = router().with_state(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri(MCP_PATH)
                    .body(Body::empty())
                    .expect("request should build"),
            )
            .await
            .expect("request should succeed");
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
