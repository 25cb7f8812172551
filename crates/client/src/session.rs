//! Client session context.
//!
//! Auth state lives in the `accessToken` and `refreshToken` cookies the
//! server sets, held by the reqwest cookie store. The context tracks the
//! current user and routes every 401 through the [`RefreshCoordinator`].

use std::sync::{PoisonError, RwLock};

use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use url::Url;

use crate::error::{ClientError, RefreshFailure};
use crate::refresh::RefreshCoordinator;

/// User summary returned by signup, login and profile.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionUser {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub role: String,
}

impl SessionUser {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// An explicitly owned client session.
///
/// Cheap to share behind an `Arc`; all methods take `&self`.
pub struct SessionContext {
    http: reqwest::Client,
    base: Url,
    refresh: RefreshCoordinator,
    user: RwLock<Option<SessionUser>>,
}

impl SessionContext {
    /// Create a session against an API base such as `http://localhost:5000/api/`.
    ///
    /// # Errors
    ///
    /// Returns error if the URL is invalid or the HTTP client fails to build.
    pub fn new(api_base: &str) -> Result<Self, ClientError> {
        let mut base = Url::parse(api_base)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let http = reqwest::Client::builder().cookie_store(true).build()?;

        Ok(Self {
            http,
            base,
            refresh: RefreshCoordinator::new(),
            user: RwLock::new(None),
        })
    }

    /// The user of the current session, if logged in.
    #[must_use]
    pub fn current_user(&self) -> Option<SessionUser> {
        self.user
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_user(&self, user: Option<SessionUser>) {
        *self.user.write().unwrap_or_else(PoisonError::into_inner) = user;
    }

    /// The refresh coordinator for this session.
    #[must_use]
    pub const fn refresh_coordinator(&self) -> &RefreshCoordinator {
        &self.refresh
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        Ok(self.base.join(path.trim_start_matches('/'))?)
    }

    /// Create an account and start a session.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Api` with the server's message on rejection.
    #[tracing::instrument(skip(self, password))]
    pub async fn signup(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<SessionUser, ClientError> {
        let body = json!({ "name": name, "email": email, "password": password });
        let response = self
            .send_once(Method::POST, "auth/signup", Some(&body))
            .await?;
        let user: SessionUser = decode(response).await?;
        self.set_user(Some(user.clone()));
        Ok(user)
    }

    /// Start a session.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Api` (401) for bad credentials.
    #[tracing::instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<SessionUser, ClientError> {
        let body = json!({ "email": email, "password": password });
        let response = self
            .send_once(Method::POST, "auth/login", Some(&body))
            .await?;
        let user: SessionUser = decode(response).await?;
        self.set_user(Some(user.clone()));
        Ok(user)
    }

    /// End the session. The local user is cleared even if the server call
    /// fails.
    ///
    /// # Errors
    ///
    /// Returns error if the logout request fails.
    pub async fn logout(&self) -> Result<(), ClientError> {
        self.set_user(None);
        let response = self.send_once(Method::POST, "auth/logout", None).await?;
        let _: Value = decode(response).await?;
        Ok(())
    }

    /// Load the current user from the server, refreshing the access token
    /// if needed.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::SessionExpired` if the refresh token is gone.
    pub async fn profile(&self) -> Result<SessionUser, ClientError> {
        let user: SessionUser = self.get("auth/profile").await?;
        self.set_user(Some(user.clone()));
        Ok(user)
    }

    /// Restore the session on startup. Returns the user, or `None` when no
    /// valid session exists.
    ///
    /// # Errors
    ///
    /// Returns transport errors; an expired session is not an error here.
    pub async fn check_auth(&self) -> Result<Option<SessionUser>, ClientError> {
        match self.profile().await {
            Ok(user) => Ok(Some(user)),
            Err(e) if e.is_unauthorized() => {
                self.set_user(None);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// `GET` a JSON resource.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.execute(Method::GET, path, None).await
    }

    /// `POST` a JSON body.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        self.execute(Method::POST, path, Some(serde_json::to_value(body)?))
            .await
    }

    /// `PUT` a JSON body.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub async fn put<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        self.execute(Method::PUT, path, Some(serde_json::to_value(body)?))
            .await
    }

    /// `DELETE` with an optional JSON body.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub async fn delete<T: DeserializeOwned>(
        &self,
        path: &str,
        body: Option<Value>,
    ) -> Result<T, ClientError> {
        self.execute(Method::DELETE, path, body).await
    }

    /// Send an authenticated request, decoding a JSON response.
    ///
    /// On 401 the access token is refreshed through the coordinator and the
    /// request is retried once. A second 401 is returned as-is.
    ///
    /// # Errors
    ///
    /// - `ClientError::SessionExpired` if the refresh fails (the local user
    ///   is cleared)
    /// - `ClientError::Api` for any other non-success status
    #[tracing::instrument(skip(self, body))]
    pub async fn execute<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<T, ClientError> {
        let observed = self.refresh.generation();
        let response = self.send_once(method.clone(), path, body.as_ref()).await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return decode(response).await;
        }

        tracing::debug!("Access token rejected, refreshing");
        let refresh_url = self.endpoint("auth/refresh-token")?;
        let http = self.http.clone();
        if let Err(e) = self
            .refresh
            .refresh(observed, move || refresh_access(http, refresh_url))
            .await
        {
            self.set_user(None);
            return Err(ClientError::SessionExpired(e));
        }

        let response = self.send_once(method, path, body.as_ref()).await?;
        decode(response).await
    }

    async fn send_once(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Response, ClientError> {
        let url = self.endpoint(path)?;
        let mut request = self.http.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }
        Ok(request.send().await?)
    }
}

/// `POST /auth/refresh-token` with the refresh cookie already in the jar.
async fn refresh_access(http: reqwest::Client, url: Url) -> Result<(), RefreshFailure> {
    let response = http
        .post(url)
        .send()
        .await
        .map_err(|e| RefreshFailure::Transport(e.to_string()))?;

    let status = response.status();
    if status.is_success() {
        return Ok(());
    }

    let message = error_message(response).await;
    Err(RefreshFailure::Rejected {
        status: status.as_u16(),
        message,
    })
}

async fn error_message(response: Response) -> String {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    serde_json::from_str::<ErrorBody>(&text).map_or_else(
        |_| {
            if text.is_empty() {
                status.canonical_reason().unwrap_or("error").to_string()
            } else {
                text
            }
        },
        |body| body.message,
    )
}

/// Decode a JSON success body, or map the server's `{"message"}` error body
/// to [`ClientError::Api`].
async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }
    Err(ClientError::Api {
        status: status.as_u16(),
        message: error_message(response).await,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode as AxumStatus, header};
    use axum::response::{AppendHeaders, IntoResponse, Response as AxumResponse};
    use axum::routing::{get, post};
    use axum::{Json, Router};

    use super::*;

    #[derive(Default)]
    struct Backend {
        refresh_calls: AtomicUsize,
        reject_refresh: AtomicBool,
    }

    fn has_cookie(headers: &HeaderMap, pair: &str) -> bool {
        headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .any(|v| v.split(';').any(|p| p.trim() == pair))
    }

    fn user_json() -> Json<Value> {
        Json(json!({ "id": 7, "name": "Ada", "email": "ada@example.com", "role": "customer" }))
    }

    fn unauthorized(message: &str) -> AxumResponse {
        (AxumStatus::UNAUTHORIZED, Json(json!({ "message": message }))).into_response()
    }

    async fn login() -> impl IntoResponse {
        (
            AppendHeaders([
                (header::SET_COOKIE, "accessToken=stale; Path=/; HttpOnly"),
                (header::SET_COOKIE, "refreshToken=r1; Path=/; HttpOnly"),
            ]),
            user_json(),
        )
    }

    async fn profile(headers: HeaderMap) -> AxumResponse {
        if has_cookie(&headers, "accessToken=fresh") {
            user_json().into_response()
        } else {
            unauthorized("Unauthorized - Access token expired")
        }
    }

    async fn refresh_token(State(backend): State<Arc<Backend>>, headers: HeaderMap) -> AxumResponse {
        backend.refresh_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;

        if backend.reject_refresh.load(Ordering::SeqCst) || !has_cookie(&headers, "refreshToken=r1") {
            return unauthorized("Invalid refresh token");
        }
        (
            AppendHeaders([(header::SET_COOKIE, "accessToken=fresh; Path=/; HttpOnly")]),
            Json(json!({ "message": "Token refreshed successfully" })),
        )
            .into_response()
    }

    async fn missing() -> AxumResponse {
        (AxumStatus::NOT_FOUND, Json(json!({ "message": "Product not found" }))).into_response()
    }

    async fn spawn_backend(backend: Arc<Backend>) -> String {
        let app = Router::new()
            .route("/api/auth/login", post(login))
            .route("/api/auth/profile", get(profile))
            .route("/api/auth/refresh-token", post(refresh_token))
            .route("/api/products/missing", get(missing))
            .with_state(backend);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/api")
    }

    #[tokio::test]
    async fn test_concurrent_unauthorized_requests_refresh_once() {
        let backend = Arc::new(Backend::default());
        let session = Arc::new(SessionContext::new(&spawn_backend(Arc::clone(&backend)).await).unwrap());

        session.login("ada@example.com", "password123").await.unwrap();

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let session = Arc::clone(&session);
                tokio::spawn(async move { session.profile().await })
            })
            .collect();

        for task in tasks {
            let user = task.await.unwrap().unwrap();
            assert_eq!(user.email, "ada@example.com");
        }

        assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 1);
        assert_eq!(session.refresh_coordinator().generation(), 1);
        assert_eq!(session.current_user().map(|u| u.id), Some(7));
    }

    #[tokio::test]
    async fn test_rejected_refresh_expires_session() {
        let backend = Arc::new(Backend::default());
        backend.reject_refresh.store(true, Ordering::SeqCst);
        let session = SessionContext::new(&spawn_backend(Arc::clone(&backend)).await).unwrap();

        session.login("ada@example.com", "password123").await.unwrap();
        assert!(session.current_user().is_some());

        let err = session.profile().await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::SessionExpired(RefreshFailure::Rejected { status: 401, .. })
        ));
        assert!(session.current_user().is_none());
        assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 1);

        assert_eq!(session.check_auth().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_other_errors_do_not_refresh() {
        let backend = Arc::new(Backend::default());
        let session = SessionContext::new(&spawn_backend(Arc::clone(&backend)).await).unwrap();

        let err = session.get::<Value>("products/missing").await.unwrap_err();
        match err {
            ClientError::Api { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, "Product not found");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let session = SessionContext::new("http://localhost:5000/api").unwrap();
        assert_eq!(
            session.endpoint("/cart").unwrap().as_str(),
            "http://localhost:5000/api/cart"
        );
    }
}
