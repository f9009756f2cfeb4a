/*
[INPUT]:  Command address, JSON body, optional caller headers
[OUTPUT]: Parsed JSON response or TaskerError
[POS]:    HTTP layer - request/response command channel
[UPDATE]: When changing request encoding or response handling
*/

use crate::config::HttpConfig;
use crate::http::{Result, TaskerError};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::HeaderMap;
use serde_json::Value;
use tracing::debug;
use url::Url;

/// One-shot request/response transport used for dispatch and terminate commands.
///
/// Implementations make at most one attempt per call.
#[async_trait]
pub trait CommandChannel: Send + Sync {
    async fn send(&self, address: &Url, payload: &Value, headers: Option<&HeaderMap>)
    -> Result<Value>;
}

/// Command channel over HTTP POST with JSON bodies
#[derive(Debug, Clone)]
pub struct HttpCommandChannel {
    http_client: Client,
}

impl HttpCommandChannel {
    /// Create a channel with default timeouts
    pub fn new() -> Result<Self> {
        Self::with_config(&HttpConfig::default())
    }

    /// Create a channel with custom timeouts
    pub fn with_config(config: &HttpConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout())
            .build()?;
        Ok(Self { http_client })
    }

    /// Wrap an existing reqwest client
    pub fn from_client(http_client: Client) -> Self {
        Self { http_client }
    }
}

#[async_trait]
impl CommandChannel for HttpCommandChannel {
    async fn send(
        &self,
        address: &Url,
        payload: &Value,
        headers: Option<&HeaderMap>,
    ) -> Result<Value> {
        let mut builder = self.http_client.post(address.clone()).json(payload);
        if let Some(headers) = headers {
            builder = builder.headers(headers.clone());
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;
        debug!(url = %address, status = status.as_u16(), bytes = body.len(), "command response");

        if !status.is_success() {
            return Err(TaskerError::api_error(status, body));
        }

        Ok(parse_body(body))
    }
}

fn parse_body(body: String) -> Value {
    if body.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(&body).unwrap_or(Value::String(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn url(server: &MockServer, endpoint: &str) -> Url {
        Url::parse(&format!("{}{}", server.uri(), endpoint)).expect("mock url")
    }

    #[tokio::test]
    async fn test_send_posts_json_with_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/dispose"))
            .and(header("authorization", "Bearer abc"))
            .and(body_json(json!({"task_id": "A1", "n": 3})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"accepted": true})))
            .expect(1)
            .mount(&server)
            .await;

        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer abc"));

        let channel = HttpCommandChannel::new().expect("client");
        let response = channel
            .send(
                &url(&server, "/dispose"),
                &json!({"task_id": "A1", "n": 3}),
                Some(&headers),
            )
            .await
            .expect("dispatch ok");
        assert_eq!(response, json!({"accepted": true}));
    }

    #[tokio::test]
    async fn test_send_maps_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/terminate"))
            .respond_with(ResponseTemplate::new(404).set_body_string("unknown task"))
            .mount(&server)
            .await;

        let channel = HttpCommandChannel::new().expect("client");
        let err = channel
            .send(&url(&server, "/terminate"), &json!({"task_id": "X"}), None)
            .await
            .expect_err("404 is an error");
        match err {
            TaskerError::Api { code, message } => {
                assert_eq!(code, 404);
                assert_eq!(message, "unknown task");
            }
            other => panic!("Expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_send_handles_empty_and_text_bodies() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/empty"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/text"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let channel = HttpCommandChannel::new().expect("client");
        let empty = channel
            .send(&url(&server, "/empty"), &json!({}), None)
            .await
            .expect("empty ok");
        assert_eq!(empty, Value::Null);

        let text = channel
            .send(&url(&server, "/text"), &json!({}), None)
            .await
            .expect("text ok");
        assert_eq!(text, json!("ok"));
    }

    #[tokio::test]
    async fn test_send_connection_refused_is_http_error() {
        let channel = HttpCommandChannel::new().expect("client");
        let address = Url::parse("http://127.0.0.1:9/dispose").expect("url");
        let err = channel
            .send(&address, &json!({}), None)
            .await
            .expect_err("nothing listens on the discard port");
        assert!(matches!(err, TaskerError::Http(_)));
    }
}
