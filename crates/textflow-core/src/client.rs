//! HTTP client for the analytics backend.

use std::future::Future;
use std::pin::Pin;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::models::{
    AnalyzeResponse, ContactRequest, HistoryEntry, InboxMessage, LoginRequest, MessageResponse,
    ResetPasswordRequest, SearchHit, SignupRequest,
};
use crate::submission::AnalyzeRequest;
use crate::{Config, CoreError};

/// Boxed future returned by [`AnalyticsBackend`] methods.
pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, CoreError>> + Send + 'a>>;

/// The remote analytics service, one method per endpoint.
pub trait AnalyticsBackend: Send + Sync {
    /// `POST /api/analyze`
    fn analyze<'a>(&'a self, request: &'a AnalyzeRequest) -> ApiFuture<'a, AnalyzeResponse>;

    /// `GET /api/history`, newest first.
    fn history(&self) -> ApiFuture<'_, Vec<HistoryEntry>>;

    /// `GET /api/inbox`, newest first.
    fn inbox(&self) -> ApiFuture<'_, Vec<InboxMessage>>;

    /// `GET /api/search?q=`
    fn search<'a>(&'a self, query: &'a str) -> ApiFuture<'a, Vec<SearchHit>>;

    /// `POST /api/login`. Resolves to the authenticated email.
    fn login<'a>(&'a self, email: &'a str, password: &'a str) -> ApiFuture<'a, String>;

    /// `POST /api/signup`
    fn signup<'a>(
        &'a self,
        full_name: &'a str,
        email: &'a str,
        password: &'a str,
    ) -> ApiFuture<'a, MessageResponse>;

    /// `POST /api/reset-password`
    fn reset_password<'a>(
        &'a self,
        email: &'a str,
        new_password: &'a str,
    ) -> ApiFuture<'a, MessageResponse>;

    /// `POST /api/contact`
    fn contact<'a>(
        &'a self,
        name: &'a str,
        email: &'a str,
        message: &'a str,
    ) -> ApiFuture<'a, MessageResponse>;

    /// `POST /api/cleanup`: purge search index, history and inbox.
    fn cleanup(&self) -> ApiFuture<'_, MessageResponse>;
}

/// [`AnalyticsBackend`] over HTTP with `reqwest`.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(config: &Config) -> Result<Self, CoreError> {
        let base_url = config.normalized_base_url();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(CoreError::Config(format!(
                "base URL must start with http:// or https://, got {:?}",
                config.base_url
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(concat!("textflow/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, CoreError> {
        let url = self.url(path);
        tracing::debug!(%url, "GET");
        let resp = self.client.get(&url).send().await?;
        read_json(resp).await
    }

    async fn post_json<B, T>(&self, path: &str, body: Option<&B>) -> Result<T, CoreError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        tracing::debug!(%url, "POST");
        let mut request = self.client.post(&url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let resp = request.send().await?;
        read_json(resp).await
    }
}

/// Decode a successful body as `T`, or turn an error status into a
/// [`CoreError`] carrying the backend's `error`/`message` text.
async fn read_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, CoreError> {
    let status = resp.status();
    let body = resp.text().await?;
    if !status.is_success() {
        return Err(error_from_body(status.as_u16(), &body));
    }
    Ok(serde_json::from_str(&body)?)
}

fn error_from_body(status: u16, body: &str) -> CoreError {
    let message = serde_json::from_str::<MessageResponse>(body)
        .ok()
        .and_then(|m| m.error.or(m.message))
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() || trimmed.starts_with('<') {
                format!("HTTP {}", status)
            } else {
                trimmed.chars().take(200).collect()
            }
        });

    if status == 401 {
        CoreError::Unauthorized(message)
    } else {
        CoreError::Api { status, message }
    }
}

impl AnalyticsBackend for ApiClient {
    fn analyze<'a>(&'a self, request: &'a AnalyzeRequest) -> ApiFuture<'a, AnalyzeResponse> {
        Box::pin(async move { self.post_json("/api/analyze", Some(request)).await })
    }

    fn history(&self) -> ApiFuture<'_, Vec<HistoryEntry>> {
        Box::pin(async move { self.get_json("/api/history").await })
    }

    fn inbox(&self) -> ApiFuture<'_, Vec<InboxMessage>> {
        Box::pin(async move { self.get_json("/api/inbox").await })
    }

    fn search<'a>(&'a self, query: &'a str) -> ApiFuture<'a, Vec<SearchHit>> {
        Box::pin(async move {
            let query = query.trim();
            if query.is_empty() {
                return Ok(vec![]);
            }
            let path = format!("/api/search?q={}", urlencoding::encode(query));
            self.get_json(&path).await
        })
    }

    fn login<'a>(&'a self, email: &'a str, password: &'a str) -> ApiFuture<'a, String> {
        Box::pin(async move {
            let resp: MessageResponse = self
                .post_json("/api/login", Some(&LoginRequest { email, password }))
                .await?;
            tracing::info!(%email, "logged in");
            Ok(resp.user.unwrap_or_else(|| email.to_string()))
        })
    }

    fn signup<'a>(
        &'a self,
        full_name: &'a str,
        email: &'a str,
        password: &'a str,
    ) -> ApiFuture<'a, MessageResponse> {
        Box::pin(async move {
            let body = SignupRequest {
                full_name,
                email,
                password,
            };
            self.post_json("/api/signup", Some(&body)).await
        })
    }

    fn reset_password<'a>(
        &'a self,
        email: &'a str,
        new_password: &'a str,
    ) -> ApiFuture<'a, MessageResponse> {
        Box::pin(async move {
            let body = ResetPasswordRequest {
                email,
                new_password,
            };
            self.post_json("/api/reset-password", Some(&body))
                .await
                .map_err(|e| match e {
                    CoreError::Api { status, .. } => CoreError::Api {
                        status,
                        message: "user not found".to_string(),
                    },
                    other => other,
                })
        })
    }

    fn contact<'a>(
        &'a self,
        name: &'a str,
        email: &'a str,
        message: &'a str,
    ) -> ApiFuture<'a, MessageResponse> {
        Box::pin(async move {
            let body = ContactRequest {
                name,
                email,
                message,
            };
            self.post_json("/api/contact", Some(&body)).await
        })
    }

    fn cleanup(&self) -> ApiFuture<'_, MessageResponse> {
        Box::pin(async move { self.post_json::<(), _>("/api/cleanup", None).await })
    }
}
