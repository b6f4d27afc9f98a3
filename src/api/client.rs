//! Authenticated request helper for feature clients (positions, orders, ...).
//!
//! Every request carries the stored access token. A 401 from any endpoint
//! clears the credential store and notifies the registered
//! [`UnauthorizedHook`], which is how the session learns it has been revoked.

use crate::{
    api::{build_url, handle_json_response, http_client, map_request_error},
    config::AppConfig,
    errors::AppError,
    session::store::TokenStore,
};
use parking_lot::RwLock;
use reqwest::{Client, RequestBuilder};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tracing::{info_span, warn, Instrument};

/// Receives the "session revoked" signal raised by a 401 response.
pub trait UnauthorizedHook: Send + Sync {
    fn on_unauthorized(&self);
}

#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    store: TokenStore,
    hook: Arc<RwLock<Option<Arc<dyn UnauthorizedHook>>>>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("has_hook", &self.hook.read().is_some())
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// # Errors
    /// Returns `AppError::Config` if the HTTP client cannot be built.
    pub fn new(config: &AppConfig, store: TokenStore) -> Result<Self, AppError> {
        Ok(Self {
            client: http_client(config.request_timeout)?,
            base_url: config.api_base_url.trim().to_string(),
            store,
            hook: Arc::new(RwLock::new(None)),
        })
    }

    /// Registers the receiver of 401 notifications, replacing any previous one.
    pub fn set_unauthorized_hook(&self, hook: Arc<dyn UnauthorizedHook>) {
        *self.hook.write() = Some(hook);
    }

    /// # Errors
    /// Returns transport, status or decode failures as `AppError`.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, AppError> {
        let url = build_url(&self.base_url, path);
        let span = info_span!("api.get", http.method = "GET", url = %url);
        let request = self.authorize(self.client.get(&url));
        self.send(request, span).await
    }

    /// # Errors
    /// Returns transport, status or decode failures as `AppError`.
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, AppError>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let url = build_url(&self.base_url, path);
        let span = info_span!("api.post", http.method = "POST", url = %url);
        let request = self.authorize(self.client.post(&url).json(body));
        self.send(request, span).await
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.store.read_access() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        span: tracing::Span,
    ) -> Result<T, AppError> {
        let response = request
            .send()
            .instrument(span)
            .await
            .map_err(|err| map_request_error(&err))?;

        let result = handle_json_response(response).await;

        if let Err(AppError::Unauthorized(_)) = &result {
            warn!("Request rejected with 401, clearing credentials");
            self.store.clear();
            let hook = self.hook.read().clone();
            if let Some(hook) = hook {
                hook.on_unauthorized();
            }
        }

        result
    }
}
