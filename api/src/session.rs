use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::Stream;
use serde_json::Value;
use statbridge_core::token::generate_session_token;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_stream::wrappers::ReceiverStream;

/// Frames buffered per session before pushes start being dropped.
const SESSION_CHANNEL_CAPACITY: usize = 64;

/// One named event destined for a session's stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub event: &'static str,
    pub data: String,
}

impl SseFrame {
    /// First frame of every session: where to send call-style requests.
    pub fn endpoint(uri: String) -> Self {
        Self {
            event: "endpoint",
            data: uri,
        }
    }

    pub fn message(response: &Value) -> Self {
        Self {
            event: "message",
            data: response.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PushError {
    #[error("no open session for token")]
    UnknownSession,
    #[error("session buffer is full")]
    ChannelFull,
    #[error("session stream is closed")]
    ChannelClosed,
}

struct Session {
    tx: mpsc::Sender<SseFrame>,
    opened_at: DateTime<Utc>,
}

/// Open streaming sessions keyed by token.
///
/// Backed by a sharded map, so opens and closes of different tokens do not
/// contend on one lock.
#[derive(Default)]
pub struct SessionTable {
    sessions: DashMap<String, Session>,
}

pub struct OpenedSession {
    pub token: String,
    pub stream: SessionStream,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new session. The returned stream starts with an `endpoint`
    /// frame naming `{endpoint}?sessionId={token}` and closes the session
    /// when dropped.
    pub fn open(self: &Arc<Self>, endpoint: &str) -> OpenedSession {
        let (tx, rx) = mpsc::channel(SESSION_CHANNEL_CAPACITY);
        loop {
            let token = generate_session_token();
            match self.sessions.entry(token.clone()) {
                Entry::Occupied(_) => continue,
                Entry::Vacant(slot) => {
                    // A fresh channel always has room for the first frame.
                    let _ = tx.try_send(SseFrame::endpoint(format!(
                        "{endpoint}?sessionId={token}"
                    )));
                    slot.insert(Session {
                        tx,
                        opened_at: Utc::now(),
                    });
                    tracing::info!(
                        event = "mcp_session_opened",
                        session_id = %token,
                        "MCP streaming session opened"
                    );
                    return OpenedSession {
                        stream: SessionStream {
                            inner: ReceiverStream::new(rx),
                            _guard: SessionGuard {
                                table: Arc::clone(self),
                                token: token.clone(),
                            },
                        },
                        token,
                    };
                }
            }
        }
    }

    /// Best-effort delivery of `frame` to an open session.
    pub fn push(&self, token: &str, frame: SseFrame) -> Result<(), PushError> {
        let tx = match self.sessions.get(token) {
            Some(session) => session.tx.clone(),
            None => return Err(PushError::UnknownSession),
        };
        tx.try_send(frame).map_err(|err| match err {
            TrySendError::Full(_) => PushError::ChannelFull,
            TrySendError::Closed(_) => PushError::ChannelClosed,
        })
    }

    /// Remove a session and release its sender. Returns whether it was open;
    /// unknown or already closed tokens are a no-op.
    pub fn close(&self, token: &str) -> bool {
        let Some((_, session)) = self.sessions.remove(token) else {
            return false;
        };
        let open_secs = (Utc::now() - session.opened_at).num_seconds();
        drop(session);
        tracing::info!(
            event = "mcp_session_closed",
            session_id = %token,
            open_secs,
            "MCP streaming session closed"
        );
        true
    }

    /// Close every open session; used on shutdown so streams terminate.
    pub fn close_all(&self) -> usize {
        let tokens: Vec<String> = self
            .sessions
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        tokens.iter().filter(|token| self.close(token)).count()
    }

    pub fn contains(&self, token: &str) -> bool {
        self.sessions.contains_key(token)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Closes its session when the owning stream goes away.
struct SessionGuard {
    table: Arc<SessionTable>,
    token: String,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.table.close(&self.token);
    }
}

/// Frames pushed to one session, ending when the session is closed.
pub struct SessionStream {
    inner: ReceiverStream<SseFrame>,
    _guard: SessionGuard,
}

impl Stream for SessionStream {
    type Item = SseFrame;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<SseFrame>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use futures::StreamExt;
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn open_issues_unique_tokens_and_endpoint_frame() {
        let table = Arc::new(SessionTable::new());
        let mut tokens = HashSet::new();
        let mut streams = Vec::new();
        for _ in 0..50 {
            let opened = table.open("/messages");
            assert!(tokens.insert(opened.token.clone()));
            streams.push(opened);
        }
        assert_eq!(table.len(), 50);

        let first = streams.first_mut().unwrap();
        let frame = first.stream.next().await.unwrap();
        assert_eq!(frame.event, "endpoint");
        assert_eq!(frame.data, format!("/messages?sessionId={}", first.token));
    }

    #[tokio::test]
    async fn push_delivers_message_frames() {
        let table = Arc::new(SessionTable::new());
        let mut opened = table.open("/messages");
        let _endpoint = opened.stream.next().await;

        let response = json!({ "jsonrpc": "2.0", "id": 1, "result": {} });
        table
            .push(&opened.token, SseFrame::message(&response))
            .unwrap();
        let frame = opened.stream.next().await.unwrap();
        assert_eq!(frame.event, "message");
        assert_eq!(serde_json::from_str::<Value>(&frame.data).unwrap(), response);
    }

    #[tokio::test]
    async fn close_is_idempotent_and_ends_the_stream() {
        let table = Arc::new(SessionTable::new());
        let mut opened = table.open("/messages");
        let token = opened.token.clone();

        assert!(table.close(&token));
        assert!(!table.close(&token));
        assert!(!table.close("never-issued"));
        assert!(table.is_empty());

        assert_eq!(
            table.push(&token, SseFrame::message(&json!({}))),
            Err(PushError::UnknownSession)
        );

        // The endpoint frame was queued before close; then the stream ends.
        assert_eq!(opened.stream.next().await.unwrap().event, "endpoint");
        assert!(opened.stream.next().await.is_none());
    }

    #[test]
    fn dropping_the_stream_closes_the_session() {
        let table = Arc::new(SessionTable::new());
        let opened = table.open("/messages");
        assert!(table.contains(&opened.token));
        let token = opened.token.clone();
        drop(opened);
        assert!(!table.contains(&token));
    }

    #[test]
    fn full_buffer_drops_pushes_without_closing() {
        let table = Arc::new(SessionTable::new());
        let opened = table.open("/messages");
        // One slot is taken by the endpoint frame.
        for _ in 1..SESSION_CHANNEL_CAPACITY {
            table
                .push(&opened.token, SseFrame::message(&json!({})))
                .unwrap();
        }
        assert_eq!(
            table.push(&opened.token, SseFrame::message(&json!({}))),
            Err(PushError::ChannelFull)
        );
        assert!(table.contains(&opened.token));
    }

    #[test]
    fn close_all_empties_the_table() {
        let table = Arc::new(SessionTable::new());
        let _a = table.open("/messages");
        let _b = table.open("/messages");
        assert_eq!(table.close_all(), 2);
        assert!(table.is_empty());
    }
}
