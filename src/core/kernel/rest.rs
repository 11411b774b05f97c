use crate::core::errors::NakamaError;
use async_trait::async_trait;
use reqwest::{Client, Method, Response, StatusCode};
use secrecy::{ExposeSecret, Secret};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{instrument, trace};

/// How a request authenticates against the server
#[derive(Clone, Copy)]
pub enum Credentials<'a> {
    /// Basic auth with the server key, used before a session exists
    ServerKey,
    /// Bearer auth with a session's access token
    Bearer(&'a str),
}

impl std::fmt::Debug for Credentials<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ServerKey => f.write_str("ServerKey"),
            Self::Bearer(_) => f.write_str("Bearer([REDACTED])"),
        }
    }
}

/// REST client trait for making HTTP requests
///
/// The session-aware client only talks to the server through this trait,
/// so tests can swap in a scripted implementation.
#[async_trait]
pub trait RestClient: Send + Sync {
    /// Make a request and return the response body as JSON
    ///
    /// # Arguments
    /// * `method` - HTTP method
    /// * `endpoint` - The API endpoint path
    /// * `query_params` - Query parameters as key-value pairs, keys may repeat
    /// * `body` - Optional JSON request body
    /// * `credentials` - How to authenticate the request
    ///
    /// # Returns
    /// The response body, `Value::Null` for empty responses
    async fn request(
        &self,
        method: Method,
        endpoint: &str,
        query_params: &[(&str, &str)],
        body: Option<&Value>,
        credentials: Credentials<'_>,
    ) -> Result<Value, NakamaError>;

    /// Make a GET request
    async fn get(
        &self,
        endpoint: &str,
        query_params: &[(&str, &str)],
        credentials: Credentials<'_>,
    ) -> Result<Value, NakamaError> {
        self.request(Method::GET, endpoint, query_params, None, credentials)
            .await
    }

    /// Make a POST request
    async fn post(
        &self,
        endpoint: &str,
        query_params: &[(&str, &str)],
        body: &Value,
        credentials: Credentials<'_>,
    ) -> Result<Value, NakamaError> {
        self.request(Method::POST, endpoint, query_params, Some(body), credentials)
            .await
    }

    /// Make a POST request with strongly-typed response
    async fn post_json<T: DeserializeOwned + Send>(
        &self,
        endpoint: &str,
        query_params: &[(&str, &str)],
        body: &Value,
        credentials: Credentials<'_>,
    ) -> Result<T, NakamaError> {
        let value = self.post(endpoint, query_params, body, credentials).await?;
        serde_json::from_value(value).map_err(|e| {
            NakamaError::DeserializationError(format!("Failed to deserialize JSON: {}", e))
        })
    }

    /// Make a DELETE request
    async fn delete(
        &self,
        endpoint: &str,
        query_params: &[(&str, &str)],
        credentials: Credentials<'_>,
    ) -> Result<Value, NakamaError> {
        self.request(Method::DELETE, endpoint, query_params, None, credentials)
            .await
    }
}

/// Configuration for the REST client
#[derive(Clone, Debug)]
pub struct RestClientConfig {
    /// Base URL for the API
    pub base_url: String,
    /// Server key used for basic auth
    pub server_key: Secret<String>,
    /// Request timeout in milliseconds
    pub timeout_ms: u64,
    /// User agent string to include in requests
    pub user_agent: String,
}

impl RestClientConfig {
    pub fn new(base_url: String, server_key: Secret<String>) -> Self {
        Self {
            base_url,
            server_key,
            timeout_ms: 7_000,
            user_agent: concat!("nakama-client-rs/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

/// Implementation of `RestClient` using reqwest
#[derive(Clone)]
pub struct ReqwestRest {
    client: Client,
    config: RestClientConfig,
}

impl std::fmt::Debug for ReqwestRest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestRest")
            .field("base_url", &self.config.base_url)
            .field("timeout_ms", &self.config.timeout_ms)
            .finish_non_exhaustive()
    }
}

impl ReqwestRest {
    pub fn new(config: RestClientConfig) -> Result<Self, NakamaError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_millis(config.timeout_ms))
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| NakamaError::NetworkError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn build_url(&self, endpoint: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), endpoint)
    }

    #[instrument(skip(self, response), fields(status = %response.status()))]
    async fn handle_response(&self, response: Response) -> Result<Value, NakamaError> {
        let status = response.status();
        let response_text = response.text().await?;

        trace!(bytes = response_text.len(), "response body received");

        if status.is_success() {
            if status == StatusCode::NO_CONTENT || response_text.trim().is_empty() {
                return Ok(Value::Null);
            }
            Ok(serde_json::from_str(&response_text)?)
        } else {
            Err(NakamaError::ApiError {
                code: status.as_u16(),
                message: error_message(&response_text),
            })
        }
    }
}

/// Pull the human-readable message out of a server error body
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

#[async_trait]
impl RestClient for ReqwestRest {
    #[instrument(skip(self, query_params, body), fields(method = %method, endpoint = %endpoint, credentials = ?credentials))]
    async fn request(
        &self,
        method: Method,
        endpoint: &str,
        query_params: &[(&str, &str)],
        body: Option<&Value>,
        credentials: Credentials<'_>,
    ) -> Result<Value, NakamaError> {
        let url = self.build_url(endpoint);
        let mut request = self.client.request(method, &url);

        request = match credentials {
            Credentials::ServerKey => {
                request.basic_auth(self.config.server_key.expose_secret(), Some(""))
            }
            Credentials::Bearer(token) => request.bearer_auth(token),
        };

        if !query_params.is_empty() {
            request = request.query(query_params);
        }

        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;

        self.handle_response(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Answer exactly one HTTP request with a canned response
    async fn serve_once(response: impl Into<String>) -> String {
        let response = response.into();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut request: Vec<u8> = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf).await.unwrap();
                if n == 0 {
                    return;
                }
                request.extend_from_slice(&buf[..n]);
            }
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn rest(base_url: String) -> ReqwestRest {
        ReqwestRest::new(RestClientConfig::new(
            base_url,
            Secret::new("defaultkey".to_string()),
        ))
        .unwrap()
    }

    #[tokio::test]
    async fn test_refused_connection_is_http_error() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let err = rest(format!("http://127.0.0.1:{}", port))
            .get("/v2/account", &[], Credentials::Bearer("t"))
            .await
            .unwrap_err();
        assert!(matches!(err, NakamaError::HttpError(ref e) if e.is_connect()));
    }

    #[tokio::test]
    async fn test_malformed_success_body_is_json_error() {
        let base = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 8\r\nConnection: close\r\n\r\nnot json",
        )
        .await;
        let err = rest(base)
            .get("/v2/account", &[], Credentials::Bearer("t"))
            .await
            .unwrap_err();
        assert!(matches!(err, NakamaError::JsonError(_)));
    }

    #[tokio::test]
    async fn test_no_content_is_null_and_errors_carry_server_message() {
        let base = serve_once("HTTP/1.1 204 No Content\r\nConnection: close\r\n\r\n").await;
        let value = rest(base)
            .delete("/v2/account", &[], Credentials::Bearer("t"))
            .await
            .unwrap();
        assert_eq!(value, Value::Null);

        let body = r#"{"error":"Auth token invalid","code":16,"message":"Auth token invalid"}"#;
        let response = format!(
            "HTTP/1.1 401 Unauthorized\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        let err = rest(serve_once(response).await)
            .get("/v2/account", &[], Credentials::Bearer("t"))
            .await
            .unwrap_err();
        assert!(matches!(err, NakamaError::ApiError { code: 401, ref message } if message == "Auth token invalid"));
    }

    #[test]
    fn test_build_url_joins_without_double_slash() {
        let config = RestClientConfig::new(
            "http://127.0.0.1:7350/".to_string(),
            Secret::new("defaultkey".to_string()),
        );
        let rest = ReqwestRest::new(config).unwrap();
        assert_eq!(rest.build_url("/v2/account"), "http://127.0.0.1:7350/v2/account");
    }

    #[test]
    fn test_error_message_prefers_server_message() {
        let body = r#"{"error":"Auth token invalid","code":16,"message":"Auth token invalid"}"#;
        assert_eq!(error_message(body), "Auth token invalid");
        assert_eq!(error_message("502 Bad Gateway"), "502 Bad Gateway");
    }

    #[test]
    fn test_credentials_debug_hides_token() {
        let rendered = format!("{:?}", Credentials::Bearer("eyJhbGciOi"));
        assert!(!rendered.contains("eyJ"));
    }
}
