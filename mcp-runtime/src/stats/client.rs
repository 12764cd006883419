use std::time::Duration;

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde_json::{Value, json};
use statbridge_core::error::{ToolError, codes};
use thiserror::Error;
use url::Url;

/// Upper bound on the upstream body echoed back in a failure detail.
const ERROR_BODY_PREVIEW_CHARS: usize = 500;

#[derive(Debug, Clone)]
pub struct StatsClientConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid base URL '{url}': {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("base URL '{0}' cannot carry a path")]
    UnsupportedBaseUrl(String),
    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

/// HTTP client for the upstream statistical data API.
#[derive(Debug, Clone)]
pub struct StatsClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: Option<String>,
    timeout: Duration,
}

impl StatsClient {
    pub fn new(config: StatsClientConfig) -> Result<Self, ClientError> {
        let base_url =
            Url::parse(&config.base_url).map_err(|source| ClientError::InvalidBaseUrl {
                url: config.base_url.clone(),
                source,
            })?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::UnsupportedBaseUrl(config.base_url));
        }
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("statbridge/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url,
            api_key: config.api_key.filter(|key| !key.trim().is_empty()),
            timeout: config.timeout,
        })
    }

    /// Build the URL for `segments` below the base path; each segment is
    /// percent-encoded on its own.
    pub fn endpoint(&self, segments: &[&str], query: &[(String, String)]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        url
    }

    pub async fn get(&self, segments: &[&str], query: &[(String, String)]) -> Result<Value, ToolError> {
        let url = self.endpoint(segments, query);
        let mut request = self.http.get(url.clone()).header(ACCEPT, "application/json");
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|err| {
            let message = if err.is_timeout() {
                format!(
                    "request to {} timed out after {}s",
                    url.path(),
                    self.timeout.as_secs()
                )
            } else {
                format!("request to {} failed: {err}", url.path())
            };
            ToolError::new(codes::UPSTREAM_UNREACHABLE, message)
                .with_docs_hint("Check STATBRIDGE_API_URL and that the data service is reachable.")
        })?;

        let status = response.status();
        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.contains("json"));
        let body = response.bytes().await.map_err(|err| {
            ToolError::new(
                codes::UPSTREAM_UNREACHABLE,
                format!("failed reading response from {}: {err}", url.path()),
            )
        })?;

        if !status.is_success() {
            tracing::warn!(
                event = "stats_upstream_status",
                path = %url.path(),
                status = status.as_u16(),
                "statistical data API returned a non-success status"
            );
            return Err(ToolError::new(
                codes::UPSTREAM_STATUS,
                format!("upstream returned HTTP {status} for {}", url.path()),
            )
            .with_details(json!({
                "status": status.as_u16(),
                "body": body_preview(&body),
            })));
        }

        decode_body(&body, is_json)
    }
}

/// JSON bodies are decoded; anything else (CSV, plain text) is returned as a string.
fn decode_body(bytes: &[u8], is_json: bool) -> Result<Value, ToolError> {
    if is_json {
        return serde_json::from_slice(bytes).map_err(|err| {
            ToolError::new(
                codes::INVALID_RESPONSE,
                format!("upstream sent malformed JSON: {err}"),
            )
        });
    }
    Ok(Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

fn body_preview(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    if text.chars().count() <= ERROR_BODY_PREVIEW_CHARS {
        return text.into_owned();
    }
    let mut preview: String = text.chars().take(ERROR_BODY_PREVIEW_CHARS).collect();
    preview.push('…');
    preview
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base_url: &str) -> StatsClient {
        StatsClient::new(StatsClientConfig {
            base_url: base_url.to_string(),
            api_key: None,
            timeout: Duration::from_secs(2),
        })
        .unwrap()
    }

    #[test]
    fn endpoint_appends_encoded_segments_and_query() {
        let client = client("https://stats.example.org/api/v1/");
        let url = client.endpoint(
            &["datasets", "gdp/quarterly", "observations"],
            &[("region".to_string(), "BE 1".to_string())],
        );
        assert_eq!(
            url.as_str(),
            "https://stats.example.org/api/v1/datasets/gdp%2Fquarterly/observations?region=BE+1"
        );
    }

    #[test]
    fn endpoint_works_without_trailing_slash() {
        let client = client("http://localhost:8080/v1");
        assert_eq!(
            client.endpoint(&["years", "2023"], &[]).as_str(),
            "http://localhost:8080/v1/years/2023"
        );
    }

    #[test]
    fn new_rejects_unusable_base_urls() {
        let err = StatsClient::new(StatsClientConfig {
            base_url: "not a url".to_string(),
            api_key: None,
            timeout: Duration::from_secs(1),
        })
        .expect_err("must fail");
        assert!(matches!(err, ClientError::InvalidBaseUrl { .. }));

        let err = StatsClient::new(StatsClientConfig {
            base_url: "mailto:stats@example.org".to_string(),
            api_key: None,
            timeout: Duration::from_secs(1),
        })
        .expect_err("must fail");
        assert!(matches!(err, ClientError::UnsupportedBaseUrl(_)));
    }

    #[test]
    fn decode_body_handles_json_text_and_garbage() {
        assert_eq!(decode_body(br#"{"a":1}"#, true).unwrap(), json!({ "a": 1 }));
        assert_eq!(decode_body(b"a,b\n1,2\n", false).unwrap(), json!("a,b\n1,2\n"));
        let err = decode_body(b"<html>", true).unwrap_err();
        assert_eq!(err.code, codes::INVALID_RESPONSE);
    }

    #[test]
    fn body_preview_truncates_long_bodies() {
        let long = "x".repeat(ERROR_BODY_PREVIEW_CHARS + 10);
        let preview = body_preview(long.as_bytes());
        assert_eq!(preview.chars().count(), ERROR_BODY_PREVIEW_CHARS + 1);
        assert!(preview.ends_with('…'));
    }

    #[tokio::test]
    async fn unreachable_upstream_is_reported_as_tool_error() {
        let client = client("http://127.0.0.1:9/v1");
        let err = client
            .get(&["years", "2023"], &[])
            .await
            .expect_err("nothing listens on port 9");
        assert_eq!(err.code, codes::UPSTREAM_UNREACHABLE);
        assert!(err.message.contains("/v1/years/2023"));
    }
}
