//! Client for the backend's `/auth/*` endpoints. These calls carry passwords
//! and tokens; nothing here may log request bodies or headers.

use crate::{
    api::{build_url, handle_empty_response, handle_json_response, http_client, map_request_error},
    config::AppConfig,
    errors::AppError,
    session::types::{
        ApiResponse, AuthResponseData, LoginCredentials, LogoutData, RefreshRequest,
        TokenRefreshData, UserPayload, VerifyTokenData, VerifyTokenRequest,
    },
};
use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info_span, Instrument};

/// Backend operations the session controller depends on.
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// `POST /auth/login`.
    async fn login(&self, credentials: &LoginCredentials) -> Result<AuthResponseData, AppError>;

    /// `POST /auth/logout`, best-effort server-side invalidation.
    async fn logout(&self, access_token: Option<&str>) -> Result<(), AppError>;

    /// `POST /auth/refresh`.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenRefreshData, AppError>;

    /// `GET /auth/me`.
    async fn current_user(&self, access_token: &str) -> Result<UserPayload, AppError>;

    /// `POST /auth/verify-token`.
    async fn verify_token(&self, token: &str) -> Result<VerifyTokenData, AppError>;
}

#[derive(Clone, Debug)]
pub struct HttpAuthApi {
    client: Client,
    base_url: String,
}

impl HttpAuthApi {
    /// # Errors
    /// Returns `AppError::Config` if the HTTP client cannot be built.
    pub fn new(config: &AppConfig) -> Result<Self, AppError> {
        Ok(Self::with_client(
            http_client(config.request_timeout)?,
            &config.api_base_url,
        ))
    }

    #[must_use]
    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim().to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        build_url(&self.base_url, path)
    }
}

#[async_trait]
impl AuthApi for HttpAuthApi {
    async fn login(&self, credentials: &LoginCredentials) -> Result<AuthResponseData, AppError> {
        let url = self.url("/auth/login");
        let span = info_span!("auth.login", http.method = "POST", url = %url);

        let response = self
            .client
            .post(&url)
            .json(&credentials.to_request())
            .send()
            .instrument(span)
            .await
            .map_err(|err| map_request_error(&err))?;

        let body: ApiResponse<AuthResponseData> =
            handle_json_response(response).await.map_err(|err| match err {
                AppError::Unauthorized(message) => AppError::Credentials(message),
                AppError::Http { status, message } if (400..500).contains(&status) => {
                    AppError::Credentials(message)
                }
                other => other,
            })?;

        Ok(body.data)
    }

    async fn logout(&self, access_token: Option<&str>) -> Result<(), AppError> {
        let url = self.url("/auth/logout");
        let span = info_span!("auth.logout", http.method = "POST", url = %url);

        let mut request = self.client.post(&url);
        if let Some(token) = access_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .instrument(span)
            .await
            .map_err(|err| map_request_error(&err))?;

        // The body is informational only; accept an empty or missing envelope.
        if response.status().is_success() {
            match response.json::<ApiResponse<LogoutData>>().await {
                Ok(body) => debug!("logout acknowledged: {}", body.data.message),
                Err(_) => debug!("logout acknowledged without a body"),
            }
            return Ok(());
        }

        handle_empty_response(response).await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenRefreshData, AppError> {
        let url = self.url("/auth/refresh");
        let span = info_span!("auth.refresh", http.method = "POST", url = %url);

        let response = self
            .client
            .post(&url)
            .json(&RefreshRequest { refresh_token })
            .send()
            .instrument(span)
            .await
            .map_err(|err| map_request_error(&err))?;

        let body: ApiResponse<TokenRefreshData> = handle_json_response(response).await?;
        Ok(body.data)
    }

    async fn current_user(&self, access_token: &str) -> Result<UserPayload, AppError> {
        let url = self.url("/auth/me");
        let span = info_span!("auth.me", http.method = "GET", url = %url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .instrument(span)
            .await
            .map_err(|err| map_request_error(&err))?;

        let body: ApiResponse<UserPayload> = handle_json_response(response).await?;
        Ok(body.data)
    }

    async fn verify_token(&self, token: &str) -> Result<VerifyTokenData, AppError> {
        let url = self.url("/auth/verify-token");
        let span = info_span!("auth.verify_token", http.method = "POST", url = %url);

        let response = self
            .client
            .post(&url)
            .json(&VerifyTokenRequest { token })
            .send()
            .instrument(span)
            .await
            .map_err(|err| map_request_error(&err))?;

        let body: ApiResponse<VerifyTokenData> = handle_json_response(response).await?;
        Ok(body.data)
    }
}
