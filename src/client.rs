use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Method, StatusCode};
use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::client_logger::ClientLogger;
use crate::config::ClientConfig;
use crate::credentials::CredentialStore;
use crate::error::{Error, Result};
use crate::observability::{
    CLIENT_REQUEST_DURATION, CLIENT_REQUEST_ERRORS, CLIENT_REQUESTS, CLIENT_UNAUTHORIZED,
};
use crate::types::{ChatMessage, HistoryItem, SessionId, SessionSummary};
use crate::validate::{FieldPath, decode_envelope};

/// Invoked after the backend answers 401 and the credentials were purged.
///
/// The transport has no notion of routes; the host decides what a rejected
/// session means for the user (see [`LoginRedirect`](crate::LoginRedirect)).
pub trait UnauthorizedHandler: Send + Sync {
    /// React to rejected credentials.
    fn on_unauthorized(&self);
}

/// The chat operations the synchronization layer needs from a backend.
#[async_trait::async_trait]
pub trait ChatBackend: Send + Sync + 'static {
    /// Ask `question`, in `session_id` if given, otherwise in a new session.
    async fn send_message(
        &self,
        question: &str,
        session_id: Option<&SessionId>,
    ) -> Result<ChatMessage>;

    /// List the user's sessions, most recent first.
    async fn list_sessions(&self) -> Result<Vec<SessionSummary>>;

    /// Fetch the history of one session, oldest first.
    async fn session_messages(&self, session_id: &SessionId) -> Result<Vec<ChatMessage>>;
}

/// Client for the chat REST API.
#[derive(Clone)]
pub struct ApiClient {
    client: ReqwestClient,
    base_url: Url,
    timeout: Duration,
    credentials: Arc<dyn CredentialStore>,
    on_unauthorized: Option<Arc<dyn UnauthorizedHandler>>,
    logger: Option<Arc<dyn ClientLogger>>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url.as_str())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Create a new client.
    ///
    /// The bearer token is read from `credentials` on every request, so
    /// signing in or out takes effect without rebuilding the client.
    pub fn new(config: &ClientConfig, credentials: Arc<dyn CredentialStore>) -> Result<Self> {
        config.validate()?;
        let base_url = Url::parse(&config.base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(Error::url(
                format!("{} cannot be used as a base URL", config.base_url),
                None,
            ));
        }

        let timeout = config.timeout();
        let client = ReqwestClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                Error::http_client(
                    format!("Failed to build HTTP client: {}", e),
                    Some(Box::new(e)),
                )
            })?;

        Ok(Self {
            client,
            base_url,
            timeout,
            credentials,
            on_unauthorized: None,
            logger: None,
        })
    }

    /// Register the callback fired on HTTP 401.
    pub fn with_unauthorized_handler(mut self, handler: Arc<dyn UnauthorizedHandler>) -> Self {
        self.on_unauthorized = Some(handler);
        self
    }

    /// Register a logger that observes every exchange.
    pub fn with_logger(mut self, logger: Arc<dyn ClientLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// The credential store this client reads its token from.
    pub fn credentials(&self) -> &Arc<dyn CredentialStore> {
        &self.credentials
    }

    /// The base URL every endpoint is resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Fetch the legacy flat history, which is not grouped by session.
    pub async fn history(&self) -> Result<Vec<HistoryItem>> {
        let url = self.endpoint(&["api", "chat", "history"])?;
        let body = self.execute(Method::GET, url, None::<&()>).await?;
        decode_envelope(&body)
    }

    /// Create and return default headers for API requests.
    fn default_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(token) = self.credentials.token() {
            let value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
                Error::authentication("stored token cannot be sent as a header")
            })?;
            headers.insert(header::AUTHORIZATION, value);
        }
        Ok(headers)
    }

    /// Resolve path segments against the base URL, percent-encoding each.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::url("base URL cannot take path segments", None))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Issue one request and return the body of a successful response.
    async fn execute<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
    ) -> Result<Vec<u8>> {
        let path = url.path().to_string();
        CLIENT_REQUESTS.click();
        if let Some(logger) = &self.logger {
            logger.log_request(method.as_str(), &path);
        }

        let start = Instant::now();
        let mut request = self
            .client
            .request(method.clone(), url)
            .headers(self.default_headers()?);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            CLIENT_REQUEST_ERRORS.click();
            if e.is_timeout() {
                Error::timeout(
                    format!("Request timed out: {}", e),
                    Some(self.timeout.as_secs_f64()),
                )
            } else if e.is_connect() {
                Error::connection(format!("Connection error: {}", e), Some(Box::new(e)))
            } else {
                Error::http_client(format!("Request failed: {}", e), Some(Box::new(e)))
            }
        })?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|val| val.to_str().ok())
            .and_then(|val| val.parse::<u64>().ok());
        let bytes = response.bytes().await.map_err(|e| {
            CLIENT_REQUEST_ERRORS.click();
            Error::http_client(
                format!("Failed to read response: {}", e),
                Some(Box::new(e)),
            )
        })?;
        CLIENT_REQUEST_DURATION.add(start.elapsed().as_secs_f64());
        if let Some(logger) = &self.logger {
            logger.log_response(method.as_str(), &path, status.as_u16(), &bytes);
        }

        if !status.is_success() {
            CLIENT_REQUEST_ERRORS.click();
            if status == StatusCode::UNAUTHORIZED {
                self.handle_unauthorized();
            }
            return Err(error_from_response(status.as_u16(), retry_after, &bytes));
        }
        Ok(bytes.to_vec())
    }

    fn handle_unauthorized(&self) {
        CLIENT_UNAUTHORIZED.click();
        // A failed purge must not mask the 401 itself.
        let _ = self.credentials.clear();
        if let Some(handler) = &self.on_unauthorized {
            handler.on_unauthorized();
        }
    }
}

#[derive(Serialize)]
struct SendMessageBody<'a> {
    question: &'a str,
    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    session_id: Option<&'a str>,
}

#[async_trait::async_trait]
impl ChatBackend for ApiClient {
    async fn send_message(
        &self,
        question: &str,
        session_id: Option<&SessionId>,
    ) -> Result<ChatMessage> {
        let question = validate_question(question)?;
        let url = self.endpoint(&["api", "chat", "message"])?;
        let body = SendMessageBody {
            question,
            session_id: session_id.map(SessionId::as_str),
        };
        let response = self.execute(Method::POST, url, Some(&body)).await?;
        decode_envelope(&response)
    }

    async fn list_sessions(&self) -> Result<Vec<SessionSummary>> {
        let url = self.endpoint(&["api", "chat", "sessions"])?;
        let body = self.execute(Method::GET, url, None::<&()>).await?;
        decode_envelope(&body)
    }

    async fn session_messages(&self, session_id: &SessionId) -> Result<Vec<ChatMessage>> {
        let url = self.endpoint(&["api", "chat", "sessions", session_id.as_str(), "messages"])?;
        let body = self.execute(Method::GET, url, None::<&()>).await?;
        let items: Vec<HistoryItem> = decode_envelope(&body)?;
        Ok(items
            .into_iter()
            .map(|item| item.into_message(session_id.clone()))
            .collect())
    }
}

/// Trim `question` and reject it when nothing is left.
pub fn validate_question(question: &str) -> Result<&str> {
    let trimmed = question.trim();
    if trimmed.is_empty() {
        return Err(FieldPath::root()
            .field("question")
            .error("Question is required"));
    }
    Ok(trimmed)
}

/// Map a non-2xx response to an [`Error`].
///
/// The message comes from `error.message` in the body, then a top-level
/// `message`, then a short plain-text body, then a generic description of
/// the status.
fn error_from_response(status_code: u16, retry_after: Option<u64>, body: &[u8]) -> Error {
    let parsed: Option<Value> = serde_json::from_slice(body).ok();
    let nested = parsed.as_ref().and_then(|v| v.get("error"));
    let error_type = nested
        .and_then(|e| e.get("type"))
        .and_then(Value::as_str)
        .map(String::from);
    let param = nested
        .and_then(|e| e.get("param"))
        .and_then(Value::as_str)
        .map(String::from);
    let message = nested
        .and_then(|e| e.get("message"))
        .and_then(Value::as_str)
        .or_else(|| {
            parsed
                .as_ref()
                .and_then(|v| v.get("message"))
                .and_then(Value::as_str)
        })
        .map(String::from)
        .or_else(|| {
            if parsed.is_some() {
                return None;
            }
            let text = String::from_utf8_lossy(body);
            let text = text.trim();
            (!text.is_empty() && text.len() <= 200 && !text.starts_with('<'))
                .then(|| text.to_string())
        })
        .unwrap_or_else(|| format!("Request failed with status code {status_code}"));

    match status_code {
        400 => Error::bad_request(message, param),
        401 => Error::authentication(message),
        403 => Error::permission(message),
        404 => Error::not_found(message, None, None),
        408 => Error::timeout(message, None),
        429 => Error::rate_limit(message, retry_after),
        500 => Error::internal_server(message),
        502..=504 => Error::service_unavailable(message, retry_after),
        _ => Error::api(status_code, error_type, message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::MemoryCredentials;

    fn client(base_url: &str) -> ApiClient {
        let config = ClientConfig::new().with_base_url(base_url);
        ApiClient::new(&config, Arc::new(MemoryCredentials::new())).unwrap()
    }

    #[test]
    fn test_client_creation() {
        let config = ClientConfig::new()
            .with_base_url("https://chat.example.com/")
            .with_timeout(Duration::from_secs(30));
        let client = ApiClient::new(&config, Arc::new(MemoryCredentials::new())).unwrap();
        assert_eq!(client.base_url.as_str(), "https://chat.example.com/");
        assert_eq!(client.timeout, Duration::from_secs(30));
    }

    #[test]
    fn endpoints_resolve_against_base() {
        let client = client("http://localhost:5000");
        let url = client.endpoint(&["api", "chat", "sessions"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:5000/api/chat/sessions");

        let client = self::client("https://example.com/backend/");
        let url = client
            .endpoint(&["api", "chat", "sessions", "a b/c", "messages"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://example.com/backend/api/chat/sessions/a%20b%2Fc/messages"
        );
    }

    #[test]
    fn bearer_token_only_when_present() {
        let credentials = Arc::new(MemoryCredentials::new());
        let config = ClientConfig::default();
        let client = ApiClient::new(&config, credentials.clone()).unwrap();
        assert!(
            client
                .default_headers()
                .unwrap()
                .get(header::AUTHORIZATION)
                .is_none()
        );

        credentials
            .store(crate::credentials::Credentials::from_token("abc"))
            .unwrap();
        let headers = client.default_headers().unwrap();
        assert_eq!(headers.get(header::AUTHORIZATION).unwrap(), "Bearer abc");
    }

    #[test]
    fn question_must_not_be_blank() {
        assert_eq!(validate_question("  hi \n").unwrap(), "hi");
        let err = validate_question("   ").unwrap_err();
        assert!(err.is_validation());
        assert_eq!(err.path(), Some("question"));
    }

    #[test]
    fn error_message_prefers_nested_envelope() {
        let body = br#"{"error": {"message": "Quota exhausted", "type": "quota"}, "message": "outer"}"#;
        let err = error_from_response(402, None, body);
        assert_eq!(err.user_message(), "Quota exhausted");
        assert_eq!(err.status_code(), Some(402));
        assert!(matches!(err, Error::Api { error_type: Some(ref t), .. } if t == "quota"));
    }

    #[test]
    fn error_message_falls_back_to_top_level() {
        let err = error_from_response(404, None, br#"{"message": "Session not found"}"#);
        assert!(err.is_not_found());
        assert_eq!(err.user_message(), "Session not found");
    }

    #[test]
    fn error_message_generic_when_body_unhelpful() {
        let err = error_from_response(500, None, b"<html>oops</html>");
        assert!(err.is_server_error());
        assert_eq!(err.user_message(), "Request failed with status code 500");

        let err = error_from_response(503, Some(7), b"");
        assert!(matches!(
            err,
            Error::ServiceUnavailable {
                retry_after: Some(7),
                ..
            }
        ));

        let err = error_from_response(502, None, b"upstream down");
        assert_eq!(err.user_message(), "upstream down");
    }

    #[test]
    fn status_mapping() {
        assert!(error_from_response(401, None, b"{}").is_authentication());
        assert!(error_from_response(403, None, b"{}").is_permission());
        assert!(error_from_response(408, None, b"{}").is_timeout());
        assert!(matches!(
            error_from_response(429, Some(3), b"{}"),
            Error::RateLimit {
                retry_after: Some(3),
                ..
            }
        ));
        assert!(matches!(
            error_from_response(400, None, br#"{"error": {"message": "bad", "param": "question"}}"#),
            Error::BadRequest { param: Some(ref p), .. } if p == "question"
        ));
    }
}
