//! Session-cached HTTP client for the management controller.
//!
//! Every call goes through [`ControllerClient::request`], which attaches a
//! cached session, and on a 403 drops it, logs in once more and retries the
//! call exactly once.

use reqwest::{Client, Method, StatusCode, header};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use super::paths;
use super::session::{Session, fingerprint};
use super::store::{MemorySessionStore, SessionStore};
use crate::config::ControllerSettings;
use crate::error::{ControllerError, Result, SyncError};

/// HTTP methods used against the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// Read.
    Get,
    /// Create, or trigger an action.
    Post,
    /// Partial update.
    Put,
    /// Remove.
    Delete,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        };
        write!(f, "{s}")
    }
}

impl From<HttpMethod> for Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => Self::GET,
            HttpMethod::Post => Self::POST,
            HttpMethod::Put => Self::PUT,
            HttpMethod::Delete => Self::DELETE,
        }
    }
}

/// Outcome of one exchange with the controller.
enum Reply {
    Body(Value),
    AuthExpired,
}

/// Management controller client.
pub struct ControllerClient {
    http: Client,
    settings: ControllerSettings,
    fingerprint: String,
    sessions: Arc<dyn SessionStore>,
    auth_lock: Mutex<()>,
}

impl fmt::Debug for ControllerClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerClient")
            .field("settings", &self.settings)
            .field("sessions", &self.sessions.backend_type())
            .finish_non_exhaustive()
    }
}

impl ControllerClient {
    /// Creates a client backed by the given session store.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(settings: ControllerSettings, sessions: Arc<dyn SessionStore>) -> Result<Self> {
        let http = Client::builder()
            .timeout(settings.timeout())
            .danger_accept_invalid_certs(!settings.verify_tls())
            .build()
            .map_err(|e| ControllerError::connection(format!("Failed to create HTTP client: {e}")))?;

        let fingerprint = fingerprint(settings.host(), settings.username());

        Ok(Self {
            http,
            settings,
            fingerprint,
            sessions,
            auth_lock: Mutex::new(()),
        })
    }

    /// Creates a client with a private in-memory session cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_memory_store(settings: ControllerSettings) -> Result<Self> {
        Self::new(settings, Arc::new(MemorySessionStore::new()))
    }

    /// Sends one call with a valid session attached.
    ///
    /// Returns the decoded JSON body, or `Value::Null` for an empty body.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::Authentication` if login fails or the call is
    /// rejected as unauthorized twice, `Connection` on network failures,
    /// `Protocol` for non-JSON bodies and `Request` for other error statuses.
    pub async fn request(&self, method: HttpMethod, path: &str, body: Option<&Value>) -> Result<Value> {
        let session = self.session().await?;

        match self.send_once(method, path, body, &session).await? {
            Reply::Body(value) => Ok(value),
            Reply::AuthExpired => {
                warn!("Session rejected on {method} {path}, re-authenticating");
                let fresh = self.refresh(&session).await?;
                match self.send_once(method, path, body, &fresh).await? {
                    Reply::Body(value) => Ok(value),
                    Reply::AuthExpired => Err(ControllerError::authentication(format!(
                        "{method} {path} rejected again after re-authentication"
                    ))
                    .into()),
                }
            }
        }
    }

    /// `GET path`.
    ///
    /// # Errors
    ///
    /// See [`ControllerClient::request`].
    pub async fn get(&self, path: &str) -> Result<Value> {
        self.request(HttpMethod::Get, path, None).await
    }

    /// `POST path` with an optional JSON body.
    ///
    /// # Errors
    ///
    /// See [`ControllerClient::request`].
    pub async fn post(&self, path: &str, body: Option<&Value>) -> Result<Value> {
        self.request(HttpMethod::Post, path, body).await
    }

    /// `PUT path` with a JSON body.
    ///
    /// # Errors
    ///
    /// See [`ControllerClient::request`].
    pub async fn put(&self, path: &str, body: &Value) -> Result<Value> {
        self.request(HttpMethod::Put, path, Some(body)).await
    }

    /// `DELETE path`.
    ///
    /// # Errors
    ///
    /// See [`ControllerClient::request`].
    pub async fn delete(&self, path: &str) -> Result<Value> {
        self.request(HttpMethod::Delete, path, None).await
    }

    /// Returns a live cached session, logging in on a miss.
    async fn session(&self) -> Result<Session> {
        if let Some(session) = self.sessions.get(&self.fingerprint).await? {
            return Ok(session);
        }

        let _guard = self.auth_lock.lock().await;
        if let Some(session) = self.sessions.get(&self.fingerprint).await? {
            debug!("Session established by a concurrent caller");
            return Ok(session);
        }
        self.login().await
    }

    /// Replaces a session the controller rejected.
    ///
    /// A caller that waited on the lock picks up a session another caller
    /// already re-established instead of logging in again.
    async fn refresh(&self, stale: &Session) -> Result<Session> {
        let _guard = self.auth_lock.lock().await;
        if let Some(current) = self.sessions.get(&self.fingerprint).await? {
            if current != *stale {
                return Ok(current);
            }
        }
        self.sessions.remove(&self.fingerprint).await?;
        self.login().await
    }

    /// Performs the login exchange and caches the resulting session.
    async fn login(&self) -> Result<Session> {
        let url = self.url(paths::LOGIN)?;
        info!("Authenticating to controller {} as {}", self.settings.host(), self.settings.username());

        let credentials = json!({
            "username": self.settings.username(),
            "password": self.settings.password(),
        });

        let response = self
            .http
            .post(url)
            .json(&credentials)
            .send()
            .await
            .map_err(|e| ControllerError::connection(format!("POST {}: {e}", paths::LOGIN)))?;

        let status = response.status();
        info!("POST {} -> {}", paths::LOGIN, status.as_u16());

        let cookies = collect_cookies(response.headers());
        let text = response
            .text()
            .await
            .map_err(|e| ControllerError::connection(format!("POST {}: {e}", paths::LOGIN)))?;

        if !status.is_success() {
            return Err(ControllerError::authentication(format!(
                "login rejected ({}): {}",
                status.as_u16(),
                error_message(&text, status)
            ))
            .into());
        }

        let body: Value = serde_json::from_str(&text).map_err(|e| {
            ControllerError::protocol(format!("login response is not JSON: {e}"))
        })?;
        if body.get("status").and_then(Value::as_str) != Some("ok") {
            let message = body
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("login did not report status ok");
            return Err(ControllerError::authentication(message.to_string()).into());
        }
        if cookies.is_empty() {
            return Err(ControllerError::authentication("login returned no session cookie").into());
        }

        let session = Session::new(
            self.settings.host(),
            self.fingerprint.clone(),
            cookies,
            self.settings.session_ttl(),
        );
        self.sessions.put(session.clone()).await?;
        debug!("Session cached in {} store", self.sessions.backend_type());
        Ok(session)
    }

    async fn send_once(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&Value>,
        session: &Session,
    ) -> Result<Reply> {
        let url = self.url(path)?;

        let mut request = self
            .http
            .request(method.into(), url)
            .header(header::COOKIE, session.cookie_header());
        if let Some(body) = body {
            debug!("{method} {path} body: {body}");
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ControllerError::connection(format!("{method} {path}: {e}")))?;

        let status = response.status();
        info!("{method} {path} -> {}", status.as_u16());

        if status == StatusCode::FORBIDDEN {
            return Ok(Reply::AuthExpired);
        }

        let text = response
            .text()
            .await
            .map_err(|e| ControllerError::connection(format!("{method} {path}: {e}")))?;
        debug!("{method} {path} response: {text}");

        if !status.is_success() {
            return Err(ControllerError::request(status.as_u16(), error_message(&text, status)).into());
        }

        let value = parse_body(&text)?;
        if let Some(message) = reported_error(&value) {
            return Err(ControllerError::request(status.as_u16(), message).into());
        }

        Ok(Reply::Body(value))
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.settings
            .base_url()
            .join(path)
            .map_err(|e| SyncError::internal(format!("Invalid controller path '{path}': {e}")))
    }
}

/// Joins the `name=value` part of every `Set-Cookie` header.
fn collect_cookies(headers: &header::HeaderMap) -> String {
    headers
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|cookie| cookie.split(';').next())
        .map(str::trim)
        .filter(|pair| pair.contains('='))
        .collect::<Vec<_>>()
        .join("; ")
}

fn parse_body(text: &str) -> Result<Value> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(text)
        .map_err(|e| ControllerError::protocol(format!("response is not JSON: {e}")).into())
}

/// The message of a `{"status": "error"}` body.
fn reported_error(value: &Value) -> Option<String> {
    if value.get("status").and_then(Value::as_str) != Some("error") {
        return None;
    }
    Some(
        value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("controller reported an error")
            .to_string(),
    )
}

fn error_message(text: &str, status: StatusCode) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(text) {
        if let Some(message) = value.get("message").and_then(Value::as_str) {
            return message.to_string();
        }
    }
    let trimmed = text.trim();
    if trimmed.is_empty() {
        status.canonical_reason().unwrap_or("request failed").to_string()
    } else {
        trimmed.chars().take(512).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, Utc};
    use wiremock::matchers::{body_json, header as header_matcher, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const DEVICE_PATH: &str = "/mgmt/device/byip/10.0.0.5/config/rsNetFloodProfileTable";

    fn settings(server: &MockServer) -> ControllerSettings {
        ControllerSettings::new(server.uri(), "radware", "s3cret").unwrap()
    }

    fn login_ok(cookie: &str) -> ResponseTemplate {
        ResponseTemplate::new(200)
            .insert_header("set-cookie", format!("{cookie}; Path=/; HttpOnly"))
            .set_body_json(json!({"status": "ok"}))
    }

    async fn mount_login(server: &MockServer, cookie: &str, times: u64) {
        Mock::given(method("POST"))
            .and(path(paths::LOGIN))
            .and(body_json(json!({"username": "radware", "password": "s3cret"})))
            .respond_with(login_ok(cookie))
            .expect(times)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_session_reused_within_ttl() {
        let server = MockServer::start().await;
        mount_login(&server, "JSESSIONID=one", 1).await;
        Mock::given(method("GET"))
            .and(path(DEVICE_PATH))
            .and(header_matcher("cookie", "JSESSIONID=one"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"rsNetFloodProfileTable": []})))
            .expect(2)
            .mount(&server)
            .await;

        let client = ControllerClient::with_memory_store(settings(&server)).unwrap();
        client.get(DEVICE_PATH).await.unwrap();
        client.get(DEVICE_PATH).await.unwrap();
    }

    #[tokio::test]
    async fn test_expired_session_triggers_one_login() {
        let server = MockServer::start().await;
        mount_login(&server, "JSESSIONID=fresh", 1).await;
        Mock::given(method("GET"))
            .and(path(DEVICE_PATH))
            .and(header_matcher("cookie", "JSESSIONID=fresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let settings = settings(&server);
        let store = Arc::new(MemorySessionStore::new());
        let stale = Session::new(
            settings.host(),
            fingerprint(settings.host(), settings.username()),
            "JSESSIONID=stale",
            settings.session_ttl(),
        )
        .established_at(Utc::now() - ChronoDuration::seconds(700));
        store.put(stale).await.unwrap();

        let client = ControllerClient::new(settings, store).unwrap();
        client.get(DEVICE_PATH).await.unwrap();
    }

    #[tokio::test]
    async fn test_clients_share_injected_store() {
        let server = MockServer::start().await;
        mount_login(&server, "JSESSIONID=shared", 1).await;
        Mock::given(method("GET"))
            .and(path(DEVICE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(2)
            .mount(&server)
            .await;

        let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
        let first = ControllerClient::new(settings(&server), Arc::clone(&store)).unwrap();
        let second = ControllerClient::new(settings(&server), store).unwrap();
        first.get(DEVICE_PATH).await.unwrap();
        second.get(DEVICE_PATH).await.unwrap();
    }

    #[tokio::test]
    async fn test_forbidden_retries_once_after_relogin() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(paths::LOGIN))
            .respond_with(login_ok("JSESSIONID=first"))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(paths::LOGIN))
            .respond_with(login_ok("JSESSIONID=second"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(DEVICE_PATH))
            .and(header_matcher("cookie", "JSESSIONID=first"))
            .respond_with(ResponseTemplate::new(403))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(DEVICE_PATH))
            .and(header_matcher("cookie", "JSESSIONID=second"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let client = ControllerClient::with_memory_store(settings(&server)).unwrap();
        let body = client.get(DEVICE_PATH).await.unwrap();
        assert_eq!(body, json!({"ok": true}));
    }

    #[tokio::test]
    async fn test_second_forbidden_is_fatal() {
        let server = MockServer::start().await;
        mount_login(&server, "JSESSIONID=x", 2).await;
        Mock::given(method("GET"))
            .and(path(DEVICE_PATH))
            .respond_with(ResponseTemplate::new(403))
            .expect(2)
            .mount(&server)
            .await;

        let client = ControllerClient::with_memory_store(settings(&server)).unwrap();
        let err = client.get(DEVICE_PATH).await.unwrap_err();
        assert!(err.is_authentication());
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_login_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(paths::LOGIN))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "bad credentials"})))
            .mount(&server)
            .await;

        let client = ControllerClient::with_memory_store(settings(&server)).unwrap();
        let err = client.get(DEVICE_PATH).await.unwrap_err();
        assert!(err.is_authentication());
        assert!(err.to_string().contains("bad credentials"));
    }

    #[tokio::test]
    async fn test_error_statuses_and_bodies() {
        let server = MockServer::start().await;
        mount_login(&server, "JSESSIONID=e", 1).await;
        Mock::given(method("POST"))
            .and(path("/dup"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({"message": "entry exists"})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/soft-error"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"status": "error", "message": "invalid column"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/html"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/empty"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = ControllerClient::with_memory_store(settings(&server)).unwrap();

        let dup = client.post("/dup", Some(&json!({}))).await.unwrap_err();
        assert!(matches!(
            dup,
            SyncError::Controller(ControllerError::Request { status: 400, ref message }) if message == "entry exists"
        ));
        assert!(!dup.is_fatal());

        let soft = client.post("/soft-error", None).await.unwrap_err();
        assert!(matches!(soft, SyncError::Controller(ControllerError::Request { status: 200, .. })));

        let html = client.get("/html").await.unwrap_err();
        assert!(matches!(html, SyncError::Controller(ControllerError::Protocol { .. })));
        assert!(html.is_fatal());

        assert_eq!(client.delete("/empty").await.unwrap(), Value::Null);
    }

    #[tokio::test]
    async fn test_unreachable_controller_is_connection_error() {
        let settings = ControllerSettings::new("http://127.0.0.1:1", "u", "p")
            .unwrap()
            .with_timeout_secs(2)
            .unwrap();
        let client = ControllerClient::with_memory_store(settings).unwrap();
        let err = client.get("/anything").await.unwrap_err();
        assert!(matches!(err, SyncError::Controller(ControllerError::Connection { .. })));
    }

    #[test]
    fn test_collect_cookies() {
        let mut headers = header::HeaderMap::new();
        headers.append(header::SET_COOKIE, "JSESSIONID=abc; Path=/; Secure".parse().unwrap());
        headers.append(header::SET_COOKIE, "XSRF=def; Path=/".parse().unwrap());
        assert_eq!(collect_cookies(&headers), "JSESSIONID=abc; XSRF=def");
    }
}
