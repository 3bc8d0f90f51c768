//! HTTP client for the admin backend.

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::Utc;
use hackadmin_shared::{
    AdminUser, ApiError, HackathonRequest, Page, PageFetcher, PageQuery, Plan, RefreshedToken,
    SessionStore, SessionUser, Subscription, TokenRefresher,
};
use reqwest::{
    cookie::{CookieStore, Jar},
    Client, RequestBuilder, Response, StatusCode,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Lifetime assumed when the backend says nothing about expiry.
pub const DEFAULT_ACCESS_TOKEN_TTL: Duration = Duration::from_secs(15 * 60);

/// REST client for the admin backend.
///
/// Holds the cookie jar the backend writes the rotating refresh credential
/// into, and reads the bearer token from the [`SessionStore`] on every call.
/// Clones share the jar and the session.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    jar: Arc<Jar>,
    base: String,
    base_url: Url,
    session: SessionStore,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct RejectRequest<'a> {
    reason: &'a str,
}

/// Token payload of the login and refresh endpoints.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    token: Option<String>,
    access_token: Option<String>,
    /// Epoch milliseconds.
    expires_at: Option<i64>,
    /// Seconds from now.
    expires_in: Option<i64>,
    user: Option<SessionUser>,
}

#[derive(Debug, Deserialize)]
struct JwtClaims {
    exp: Option<i64>,
}

impl ApiClient {
    /// Client rooted at `api_base` (e.g. `http://localhost:3000/api`) with an empty cookie jar.
    pub fn new(api_base: &str, session: SessionStore) -> Result<Self> {
        let base = api_base.trim().trim_end_matches('/').to_string();
        let base_url =
            Url::parse(&base).with_context(|| format!("invalid API base URL: {api_base}"))?;
        let jar = Arc::new(Jar::default());
        let http = Client::builder()
            .cookie_provider(jar.clone())
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            http,
            jar,
            base,
            base_url,
            session,
        })
    }

    /// Session the client reads its bearer token from.
    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    /// Cookies the jar would send to the API origin.
    pub fn cookie_header(&self) -> Option<String> {
        self.jar
            .cookies(&self.base_url)
            .and_then(|value| value.to_str().ok().map(str::to_string))
    }

    /// `POST {base}/auth/login`. Marks the session pending, then signs it in or
    /// signs it out depending on the answer.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Option<SessionUser>, ApiError> {
        self.session.set_pending();
        let result = async {
            let response = self
                .http
                .post(self.endpoint("auth/login"))
                .json(&LoginRequest {
                    email,
                    password,
                })
                .send()
                .await
                .map_err(transport_error)?;
            decode::<TokenResponse>(response).await
        }
        .await;

        match result.and_then(|body| {
            let (token, expires_at) = resolve_token(&body, Utc::now().timestamp_millis())?;
            Ok((body.user, token, expires_at))
        }) {
            Ok((user, token, expires_at)) => {
                tracing::info!("signed in, access token expires at {expires_at}");
                self.session.sign_in(user.clone(), token, expires_at);
                Ok(user)
            },
            Err(err) => {
                self.session.sign_out();
                Err(err)
            },
        }
    }

    /// Revokes the refresh credential server-side; the local session is
    /// cleared whatever the backend answers.
    pub async fn sign_out(&self) {
        let request = self.authorized(self.http.post(self.endpoint("auth/logout")));
        match request.send().await {
            Ok(response) if !response.status().is_success() => {
                tracing::warn!("logout returned HTTP {}", response.status());
            },
            Ok(_) => {},
            Err(err) => tracing::warn!("logout request failed: {err}"),
        }
        self.session.sign_out();
    }

    /// Fetch function for a [`hackadmin_shared::PaginatedQuery`] over the
    /// admin list that serves `T`.
    pub fn list_fetcher<T: AdminList>(&self) -> impl PageFetcher<T> {
        let api = self.clone();
        move |query: PageQuery, cancel: CancellationToken| {
            let api = api.clone();
            async move { T::list(&api, &query, cancel).await }
        }
    }

    /// `GET {base}/admin/hackathon-requests`.
    pub async fn list_hackathon_requests(
        &self,
        query: &PageQuery,
        cancel: CancellationToken,
    ) -> Result<Page<HackathonRequest>, ApiError> {
        self.fetch_page("hackathon-requests", query, cancel).await
    }

    /// `GET {base}/admin/users`.
    pub async fn list_users(
        &self,
        query: &PageQuery,
        cancel: CancellationToken,
    ) -> Result<Page<AdminUser>, ApiError> {
        self.fetch_page("users", query, cancel).await
    }

    /// `GET {base}/admin/plans`.
    pub async fn list_plans(
        &self,
        query: &PageQuery,
        cancel: CancellationToken,
    ) -> Result<Page<Plan>, ApiError> {
        self.fetch_page("plans", query, cancel).await
    }

    /// `GET {base}/admin/subscriptions`.
    pub async fn list_subscriptions(
        &self,
        query: &PageQuery,
        cancel: CancellationToken,
    ) -> Result<Page<Subscription>, ApiError> {
        self.fetch_page("subscriptions", query, cancel).await
    }

    /// `PATCH {base}/admin/hackathon-requests/{id}/approve`.
    pub async fn approve_request(&self, id: &str) -> Result<HackathonRequest, ApiError> {
        let response = self
            .authorized(
                self.http
                    .patch(self.endpoint(&format!("admin/hackathon-requests/{id}/approve"))),
            )
            .send()
            .await
            .map_err(transport_error)?;
        self.decode_authorized(response).await
    }

    /// `PATCH {base}/admin/hackathon-requests/{id}/reject` with the reason in the body.
    pub async fn reject_request(&self, id: &str, reason: &str) -> Result<HackathonRequest, ApiError> {
        let response = self
            .authorized(
                self.http
                    .patch(self.endpoint(&format!("admin/hackathon-requests/{id}/reject"))),
            )
            .json(&RejectRequest {
                reason,
            })
            .send()
            .await
            .map_err(transport_error)?;
        self.decode_authorized(response).await
    }

    /// `GET {base}/admin/{resource}` with page, limit and filters as query
    /// parameters. Resolves to `Cancelled` as soon as `cancel` fires.
    async fn fetch_page<T>(
        &self,
        resource: &str,
        query: &PageQuery,
        cancel: CancellationToken,
    ) -> Result<Page<T>, ApiError>
    where
        T: DeserializeOwned,
    {
        let request = self
            .authorized(self.http.get(self.endpoint(&format!("admin/{resource}"))))
            .query(&query.to_query_pairs());
        let send = async {
            let response = request.send().await.map_err(transport_error)?;
            self.decode_authorized(response).await
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ApiError::Cancelled),
            result = send => result,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base, path.trim_start_matches('/'))
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.session.access_token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// A 401 on an authenticated call means the backend already considers
    /// the token expired; flag it so the refresh scheduler acts immediately.
    async fn decode_authorized<T: DeserializeOwned>(&self, response: Response) -> Result<T, ApiError> {
        if response.status() == StatusCode::UNAUTHORIZED && self.session.flag_expired() {
            tracing::debug!("backend rejected access token, session flagged as expired");
        }
        decode(response).await
    }
}

/// Row types served by an admin list endpoint.
#[async_trait]
pub trait AdminList: DeserializeOwned + Send + Sized + 'static {
    /// Fetches one page of this list.
    async fn list(
        api: &ApiClient,
        query: &PageQuery,
        cancel: CancellationToken,
    ) -> Result<Page<Self>, ApiError>;
}

#[async_trait]
impl AdminList for HackathonRequest {
    async fn list(
        api: &ApiClient,
        query: &PageQuery,
        cancel: CancellationToken,
    ) -> Result<Page<Self>, ApiError> {
        api.list_hackathon_requests(query, cancel).await
    }
}

#[async_trait]
impl AdminList for AdminUser {
    async fn list(
        api: &ApiClient,
        query: &PageQuery,
        cancel: CancellationToken,
    ) -> Result<Page<Self>, ApiError> {
        api.list_users(query, cancel).await
    }
}

#[async_trait]
impl AdminList for Plan {
    async fn list(
        api: &ApiClient,
        query: &PageQuery,
        cancel: CancellationToken,
    ) -> Result<Page<Self>, ApiError> {
        api.list_plans(query, cancel).await
    }
}

#[async_trait]
impl AdminList for Subscription {
    async fn list(
        api: &ApiClient,
        query: &PageQuery,
        cancel: CancellationToken,
    ) -> Result<Page<Self>, ApiError> {
        api.list_subscriptions(query, cancel).await
    }
}

#[async_trait]
impl TokenRefresher for ApiClient {
    /// `POST {base}/auth/refresh` from this client so the rotated refresh
    /// cookie lands in its jar.
    async fn refresh(&self) -> Result<RefreshedToken, ApiError> {
        let response = self
            .http
            .post(self.endpoint("auth/refresh"))
            .send()
            .await
            .map_err(transport_error)?;
        let body = decode::<TokenResponse>(response).await?;
        let (access_token, expires_at) = resolve_token(&body, Utc::now().timestamp_millis())?;
        Ok(RefreshedToken {
            access_token,
            expires_at,
        })
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let status = response.status();
    if !status.is_success() {
        let message = response
            .json::<Value>()
            .await
            .ok()
            .and_then(|body| error_message(&body))
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
        return Err(ApiError::Http {
            status: status.as_u16(),
            message,
        });
    }
    response
        .json::<T>()
        .await
        .map_err(|err| ApiError::Decode(err.to_string()))
}

fn transport_error(err: reqwest::Error) -> ApiError {
    if err.is_decode() {
        ApiError::Decode(err.to_string())
    } else {
        ApiError::Network(err.to_string())
    }
}

/// `message` may be a string or a list of validation messages.
fn error_message(body: &Value) -> Option<String> {
    match body.get("message")? {
        Value::String(message) if !message.trim().is_empty() => Some(message.clone()),
        Value::Array(items) => {
            let joined = items
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join(", ");
            (!joined.is_empty()).then_some(joined)
        },
        _ => None,
    }
}

/// Picks the token (`token` or `accessToken`) and its expiry: explicit
/// `expiresAt`, then `expiresIn`, then the JWT `exp` claim, then the default
/// lifetime.
fn resolve_token(body: &TokenResponse, now_ms: i64) -> Result<(String, i64), ApiError> {
    let token = body
        .token
        .as_deref()
        .or(body.access_token.as_deref())
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(ApiError::MissingToken)?
        .to_string();

    let expires_at = body
        .expires_at
        .or_else(|| body.expires_in.map(|secs| now_ms + secs * 1000))
        .or_else(|| jwt_expiry_ms(&token))
        .unwrap_or(now_ms + DEFAULT_ACCESS_TOKEN_TTL.as_millis() as i64);
    Ok((token, expires_at))
}

fn jwt_expiry_ms(token: &str) -> Option<i64> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: JwtClaims = serde_json::from_slice(&bytes).ok()?;
    claims.exp.map(|exp| exp * 1000)
}
