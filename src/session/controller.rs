//! Auth session controller.
//!
//! Owns the in-memory [`Session`] and drives it through
//! `Bootstrapping → Unauthenticated ⇄ Authenticating → Authenticated ⇄ Refreshing`,
//! with `LoggingOut` as the way back. Observers subscribe to a `watch` channel
//! and always see a consistent snapshot: `is_authenticated` is true exactly
//! when `user` is present.
//!
//! Remote failures on recovery paths (bootstrap, scheduled refresh) are logged
//! and end in `Unauthenticated`. Only `login`, manual `refresh`,
//! `verify_token` and `reload_user` return their errors to the caller.

use crate::{
    api::{auth::AuthApi, auth::HttpAuthApi, client::UnauthorizedHook},
    config::AppConfig,
    errors::AppError,
    session::{
        clock::SystemClock,
        obfuscation::Obfuscator,
        scheduler::RefreshFuture,
        status::TokenStatus,
        storage::{FileStorage, KeyValueStorage, MemoryStorage},
        store::TokenStore,
        types::{LoginCredentials, TokenRefreshData, TokenVerification, User, UserSettings},
    },
};
use serde::Serialize;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Weak,
};
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, instrument, warn};

const LOGIN_FAILED: &str = "Login failed";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthPhase {
    #[default]
    Bootstrapping,
    Unauthenticated,
    Authenticating,
    Authenticated,
    Refreshing,
    LoggingOut,
}

/// Snapshot of the authentication state published to observers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Session {
    pub phase: AuthPhase,
    pub is_authenticated: bool,
    pub user: Option<User>,
    pub loading: bool,
    pub error: Option<String>,
}

impl Default for Session {
    fn default() -> Self {
        Self::bootstrapping()
    }
}

impl Session {
    /// Initial state: nothing known yet, navigation decisions suspended.
    #[must_use]
    pub const fn bootstrapping() -> Self {
        Self {
            phase: AuthPhase::Bootstrapping,
            is_authenticated: false,
            user: None,
            loading: true,
            error: None,
        }
    }

    #[must_use]
    pub const fn signed_out() -> Self {
        Self {
            phase: AuthPhase::Unauthenticated,
            is_authenticated: false,
            user: None,
            loading: false,
            error: None,
        }
    }

    #[must_use]
    pub const fn authenticated(user: User) -> Self {
        Self {
            phase: AuthPhase::Authenticated,
            is_authenticated: true,
            user: Some(user),
            loading: false,
            error: None,
        }
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.loading || self.phase == AuthPhase::Bootstrapping
    }
}

pub struct SessionController {
    api: Arc<dyn AuthApi>,
    store: TokenStore,
    state: watch::Sender<Session>,
    // Last refresh outcome, shared with callers that waited on the lock.
    refresh_flight: Mutex<Option<Result<(), AppError>>>,
    refresh_generation: AtomicU64,
    // Bumped whenever the session is torn down; in-flight refreshes that
    // started under an older epoch discard their tokens.
    epoch: AtomicU64,
    this: Weak<SessionController>,
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("phase", &self.state.borrow().phase)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl SessionController {
    #[must_use]
    pub fn new(api: Arc<dyn AuthApi>, store: TokenStore) -> Arc<Self> {
        let (state, _) = watch::channel(Session::bootstrapping());

        Arc::new_cyclic(|this| Self {
            api,
            store,
            state,
            refresh_flight: Mutex::new(None),
            refresh_generation: AtomicU64::new(0),
            epoch: AtomicU64::new(0),
            this: this.clone(),
        })
    }

    /// Wires the HTTP backend, the configured storage and the system clock.
    ///
    /// # Errors
    /// Returns `AppError::Config` if the configuration is invalid or the HTTP
    /// client cannot be built.
    pub fn from_config(config: &AppConfig) -> Result<Arc<Self>, AppError> {
        config.validate()?;

        let storage: Arc<dyn KeyValueStorage> = match &config.state_file {
            Some(path) => Arc::new(FileStorage::new(path.clone())),
            None => Arc::new(MemoryStorage::new()),
        };

        let store = TokenStore::new(
            storage,
            Obfuscator::new(&config.obfuscation_key),
            Arc::new(SystemClock),
            &config.storage_namespace,
        );

        Ok(Self::new(Arc::new(HttpAuthApi::new(config)?), store))
    }

    #[must_use]
    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    #[must_use]
    pub fn session(&self) -> Session {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    /// Rebuilds the session from stored credentials.
    #[instrument(skip(self))]
    pub async fn bootstrap(&self) {
        self.state.send_replace(Session::bootstrapping());

        // Read the refresh token first: reading an expiring access token
        // erases the whole record.
        let Some(refresh_token) = self.store.read_refresh() else {
            debug!("no stored credentials");
            self.sign_out_locally();
            return;
        };

        if let Some(access_token) = self.store.read_access() {
            match self.api.current_user(&access_token).await {
                Ok(payload) => {
                    self.rearm_from_stored_expiry();
                    self.register_refresh_callback();
                    self.state
                        .send_replace(Session::authenticated(User::from(payload)));
                    info!("Session restored from stored credentials");
                    return;
                }
                Err(err) if err.is_transport() => {
                    warn!(
                        "Backend unreachable while restoring session, trying refresh: {}",
                        err
                    );
                }
                Err(err) => {
                    warn!("Failed to load current user, trying refresh: {}", err);
                }
            }
        } else {
            debug!("stored access token expired, trying refresh");
        }

        if let Err(err) = self.single_flight(Some(refresh_token)).await {
            warn!("Session recovery failed: {}", err);
            return;
        }

        let Some(access_token) = self.store.read_access() else {
            warn!("Refreshed access token is already expiring");
            self.sign_out_locally();
            return;
        };

        match self.api.current_user(&access_token).await {
            Ok(payload) => {
                self.state
                    .send_replace(Session::authenticated(User::from(payload)));
                info!("Session restored after refresh");
            }
            Err(err) => {
                warn!("Failed to load current user after refresh: {}", err);
                self.sign_out_locally();
            }
        }
    }

    /// # Errors
    /// Returns `AppError::Credentials` for rejected or malformed credentials and
    /// any transport or storage failure. The session is left `Unauthenticated`
    /// with `error` set.
    #[instrument(skip(self, credentials))]
    pub async fn login(&self, credentials: &LoginCredentials) -> Result<User, AppError> {
        if let Err(err) = credentials.validate() {
            self.fail_login(&err);
            return Err(err);
        }

        self.state.send_replace(Session {
            phase: AuthPhase::Authenticating,
            is_authenticated: false,
            user: None,
            loading: true,
            error: None,
        });

        let result = match self.api.login(credentials).await {
            Ok(data) => self
                .store
                .save(&data.access_token, &data.refresh_token, data.expires_in)
                .map(|()| User::from(data.user)),
            Err(err) => Err(err),
        };

        match result {
            Ok(user) => {
                self.register_refresh_callback();
                self.state.send_replace(Session::authenticated(user.clone()));
                info!("Logged in as user {}", user.id);
                Ok(user)
            }
            Err(err) => {
                warn!("Login failed: {}", err);
                self.store.clear();
                self.fail_login(&err);
                Err(err)
            }
        }
    }

    /// Exchanges the stored refresh token for a new access token. Concurrent
    /// callers share a single request.
    ///
    /// # Errors
    /// Returns `AppError::NoRefreshToken` when nothing is stored, or the
    /// backend failure. Either way the session is reset and the store cleared.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<(), AppError> {
        self.single_flight(None).await
    }

    /// Best-effort remote invalidation followed by an unconditional local
    /// sign-out. Safe to call repeatedly.
    #[instrument(skip(self))]
    pub async fn logout(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.state.send_modify(|session| {
            session.phase = AuthPhase::LoggingOut;
            session.loading = true;
        });

        let access_token = self.store.read_access();
        if let Err(err) = self.api.logout(access_token.as_deref()).await {
            warn!("Remote logout failed: {}", err);
        }

        self.sign_out_locally();
        info!("Logged out");
    }

    /// Global 401 handler: drop credentials and reset the session so the
    /// route guard sends the user to the login page.
    pub fn handle_unauthorized(&self) {
        warn!("Backend rejected the session, signing out");
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.sign_out_locally();
    }

    /// # Errors
    /// Returns `AppError::Unauthorized` without a usable access token, or the
    /// backend failure. A 401 from the backend also signs the session out.
    pub async fn verify_token(&self) -> Result<TokenVerification, AppError> {
        let access_token = self
            .store
            .read_access()
            .ok_or_else(|| AppError::Unauthorized("No valid access token".to_string()))?;

        match self.api.verify_token(&access_token).await {
            Ok(data) => Ok(TokenVerification::from(data)),
            Err(err) => {
                if matches!(err, AppError::Unauthorized(_)) {
                    self.handle_unauthorized();
                }
                Err(err)
            }
        }
    }

    /// Re-fetches the current user while authenticated.
    ///
    /// # Errors
    /// Returns `AppError::Unauthorized` when there is no session; a 401 from
    /// the backend also signs the session out.
    pub async fn reload_user(&self) -> Result<User, AppError> {
        if !self.session().is_authenticated {
            return Err(AppError::Unauthorized("Not authenticated".to_string()));
        }

        let access_token = self
            .store
            .read_access()
            .ok_or_else(|| AppError::Unauthorized("No valid access token".to_string()))?;

        match self.api.current_user(&access_token).await {
            Ok(payload) => {
                let user = User::from(payload);
                self.state.send_modify(|session| {
                    if session.is_authenticated {
                        session.user = Some(user.clone());
                    }
                });
                Ok(user)
            }
            Err(err) => {
                if matches!(err, AppError::Unauthorized(_)) {
                    self.handle_unauthorized();
                }
                Err(err)
            }
        }
    }

    pub fn clear_error(&self) {
        self.state.send_if_modified(|session| session.error.take().is_some());
    }

    /// Reads a value out of the current user's settings.
    pub fn user_setting<T>(&self, accessor: impl FnOnce(&UserSettings) -> T) -> Option<T> {
        self.state
            .borrow()
            .user
            .as_ref()
            .map(|user| accessor(&user.settings))
    }

    /// Expiry status of the stored access token. Invalid while signed out or
    /// when the stored record is incomplete. Does not erase anything.
    #[must_use]
    pub fn token_status(&self, warning_threshold_minutes: i64) -> TokenStatus {
        if !self.state.borrow().is_authenticated || !self.store.has_stored_tokens() {
            return TokenStatus::INVALID;
        }

        self.store.expires_at().map_or(TokenStatus::INVALID, |expires_at| {
            TokenStatus::at(expires_at, self.store.now_millis(), warning_threshold_minutes)
        })
    }

    async fn single_flight(&self, refresh_token: Option<String>) -> Result<(), AppError> {
        let observed = self.refresh_generation.load(Ordering::SeqCst);
        let mut flight = self.refresh_flight.lock().await;

        if self.refresh_generation.load(Ordering::SeqCst) != observed {
            debug!("refresh completed while waiting, reusing its outcome");
            return flight.clone().unwrap_or(Ok(()));
        }

        let result = match refresh_token.or_else(|| self.store.read_refresh()) {
            Some(token) => self.exchange(&token).await,
            None => {
                warn!("No refresh token available, signing out");
                self.sign_out_locally();
                Err(AppError::NoRefreshToken)
            }
        };

        *flight = Some(result.clone());
        self.refresh_generation.fetch_add(1, Ordering::SeqCst);

        result
    }

    async fn exchange(&self, refresh_token: &str) -> Result<(), AppError> {
        let epoch = self.epoch.load(Ordering::SeqCst);

        self.state.send_if_modified(|session| {
            if session.phase == AuthPhase::Authenticated {
                session.phase = AuthPhase::Refreshing;
                true
            } else {
                false
            }
        });

        let response = self.api.refresh(refresh_token).await;

        if self.epoch.load(Ordering::SeqCst) != epoch {
            debug!("session ended during refresh, discarding the response");
            return Err(AppError::Unauthorized(
                "Session ended during refresh".to_string(),
            ));
        }

        let result =
            response.and_then(|data| self.persist_refreshed(refresh_token, &data));

        match result {
            Ok(()) => {
                self.register_refresh_callback();
                self.state.send_if_modified(|session| {
                    if session.phase == AuthPhase::Refreshing {
                        session.phase = AuthPhase::Authenticated;
                        true
                    } else {
                        false
                    }
                });
                info!("Access token refreshed");
                Ok(())
            }
            Err(err) => {
                warn!("Token refresh failed: {}", err);
                self.sign_out_locally();
                Err(err)
            }
        }
    }

    fn persist_refreshed(&self, held: &str, data: &TokenRefreshData) -> Result<(), AppError> {
        match data.refresh_token.as_deref().filter(|token| !token.is_empty()) {
            Some(rotated) => self
                .store
                .save(&data.access_token, rotated, data.expires_in),
            None if self.store.read_refresh().is_some() => self
                .store
                .update_access(&data.access_token, data.expires_in),
            // The record was erased on read; write the held refresh token back.
            None => self.store.save(&data.access_token, held, data.expires_in),
        }
    }

    fn register_refresh_callback(&self) {
        let this = self.this.clone();
        self.store
            .scheduler()
            .set_callback(Arc::new(move || -> RefreshFuture {
                let this = this.clone();
                Box::pin(async move {
                    match this.upgrade() {
                        Some(controller) => controller.refresh().await,
                        None => Ok(()),
                    }
                })
            }));
    }

    fn rearm_from_stored_expiry(&self) {
        if let Some(expires_at) = self.store.expires_at() {
            let remaining_secs = expires_at.saturating_sub(self.store.now_millis()) / 1000;
            self.store.scheduler().arm(remaining_secs);
        }
    }

    fn sign_out_locally(&self) {
        self.store.clear();
        self.store.scheduler().clear_callback();
        self.state.send_replace(Session::signed_out());
    }

    fn fail_login(&self, err: &AppError) {
        let message = err.user_message();
        let message = if message.trim().is_empty() {
            LOGIN_FAILED.to_string()
        } else {
            message
        };

        self.state.send_replace(Session {
            error: Some(message),
            ..Session::signed_out()
        });
    }
}

impl UnauthorizedHook for SessionController {
    fn on_unauthorized(&self) {
        self.handle_unauthorized();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{
        clock::{Clock, ManualClock},
        scheduler::ScheduleState,
        storage::MemoryStorage,
        types::{AuthResponseData, Theme, UserPayload, VerifyTokenData},
    };
    use async_trait::async_trait;
    use parking_lot::Mutex as SyncMutex;
    use secrecy::SecretString;
    use serde_json::json;
    use std::{
        collections::BTreeSet,
        sync::atomic::{AtomicBool, AtomicUsize},
        time::Duration,
    };

    const NOW: i64 = 1_700_000_000_000;

    fn user_payload() -> UserPayload {
        serde_json::from_value(json!({
            "id": 42,
            "email": "trader@example.com",
            "first_name": "Grace",
            "last_name": "Hopper",
            "roles": ["user"],
            "settings": { "theme": "dark" }
        }))
        .unwrap()
    }

    struct FakeApi {
        login: SyncMutex<Result<AuthResponseData, AppError>>,
        refresh: SyncMutex<Result<TokenRefreshData, AppError>>,
        valid_access: SyncMutex<BTreeSet<String>>,
        refresh_latency: Option<Duration>,
        logout_fails: AtomicBool,
        verify_rejects: AtomicBool,
        backend_down: AtomicBool,
        login_calls: AtomicUsize,
        refresh_calls: AtomicUsize,
        logout_calls: AtomicUsize,
    }

    impl FakeApi {
        fn new() -> Self {
            Self {
                login: SyncMutex::new(Ok(AuthResponseData {
                    access_token: "access-1".to_string(),
                    refresh_token: "refresh-1".to_string(),
                    expires_in: 3600,
                    user: user_payload(),
                })),
                refresh: SyncMutex::new(Err(AppError::Unauthorized(
                    "Refresh token revoked".to_string(),
                ))),
                valid_access: SyncMutex::new(BTreeSet::from(["access-1".to_string()])),
                refresh_latency: None,
                logout_fails: AtomicBool::new(false),
                verify_rejects: AtomicBool::new(false),
                backend_down: AtomicBool::new(false),
                login_calls: AtomicUsize::new(0),
                refresh_calls: AtomicUsize::new(0),
                logout_calls: AtomicUsize::new(0),
            }
        }

        fn refresh_succeeds(&self, access_token: &str, rotated: Option<&str>) {
            *self.refresh.lock() = Ok(TokenRefreshData {
                access_token: access_token.to_string(),
                refresh_token: rotated.map(ToString::to_string),
                expires_in: 3600,
            });
            self.valid_access.lock().insert(access_token.to_string());
        }
    }

    #[async_trait]
    impl AuthApi for FakeApi {
        async fn login(
            &self,
            _credentials: &LoginCredentials,
        ) -> Result<AuthResponseData, AppError> {
            self.login_calls.fetch_add(1, Ordering::SeqCst);
            self.login.lock().clone()
        }

        async fn logout(&self, _access_token: Option<&str>) -> Result<(), AppError> {
            self.logout_calls.fetch_add(1, Ordering::SeqCst);
            if self.logout_fails.load(Ordering::SeqCst) {
                Err(AppError::Network("connection refused".to_string()))
            } else {
                Ok(())
            }
        }

        async fn refresh(&self, _refresh_token: &str) -> Result<TokenRefreshData, AppError> {
            self.refresh_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(latency) = self.refresh_latency {
                tokio::time::sleep(latency).await;
            }
            self.refresh.lock().clone()
        }

        async fn current_user(&self, access_token: &str) -> Result<UserPayload, AppError> {
            if self.backend_down.load(Ordering::SeqCst) {
                return Err(AppError::Network("connection refused".to_string()));
            }
            if self.valid_access.lock().contains(access_token) {
                Ok(user_payload())
            } else {
                Err(AppError::Unauthorized("Token expired".to_string()))
            }
        }

        async fn verify_token(&self, token: &str) -> Result<VerifyTokenData, AppError> {
            if self.verify_rejects.load(Ordering::SeqCst) {
                return Err(AppError::Unauthorized("Token revoked".to_string()));
            }
            Ok(VerifyTokenData {
                valid: self.valid_access.lock().contains(token),
                user: Some(user_payload()),
                expires_at: None,
            })
        }
    }

    struct Fixture {
        controller: Arc<SessionController>,
        api: Arc<FakeApi>,
        storage: Arc<MemoryStorage>,
        clock: Arc<ManualClock>,
    }

    fn fixture_with(api: FakeApi) -> Fixture {
        let api = Arc::new(api);
        let storage = Arc::new(MemoryStorage::new());
        let clock = Arc::new(ManualClock::new(NOW));
        let store = TokenStore::new(
            Arc::clone(&storage) as Arc<dyn KeyValueStorage>,
            Obfuscator::new("trader_app_secret_key"),
            Arc::clone(&clock) as Arc<dyn Clock>,
            "trader",
        );
        let controller = SessionController::new(Arc::clone(&api) as Arc<dyn AuthApi>, store);

        Fixture {
            controller,
            api,
            storage,
            clock,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(FakeApi::new())
    }

    fn credentials(password: &str) -> LoginCredentials {
        LoginCredentials::new(
            "trader@example.com",
            SecretString::from(password.to_string()),
            false,
        )
    }

    #[test]
    fn starts_bootstrapping() {
        let f = fixture();
        let session = f.controller.session();
        assert_eq!(session.phase, AuthPhase::Bootstrapping);
        assert!(session.is_loading());
        assert!(!session.is_authenticated);
        assert!(session.user.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn login_persists_tokens_and_arms_refresh() {
        let f = fixture();
        let user = f.controller.login(&credentials("correct horse")).await.unwrap();

        assert_eq!(user.name, "Grace Hopper");
        assert_eq!(user.settings.theme, Theme::Dark);

        let session = f.controller.session();
        assert_eq!(session.phase, AuthPhase::Authenticated);
        assert!(session.is_authenticated);
        assert_eq!(session.user, Some(user));

        assert_eq!(f.storage.len(), 3);
        assert_ne!(f.storage.get("trader_access_token"), Some("access-1".to_string()));
        assert_eq!(f.controller.store().read_access(), Some("access-1".to_string()));

        match f.controller.store().scheduler().state() {
            ScheduleState::ArmedUntil { delay, .. } => {
                assert_eq!(delay, Duration::from_millis(3_300_000));
            }
            ScheduleState::Idle => panic!("login must arm the refresh timer"),
        }
    }

    #[tokio::test]
    async fn login_failure_sets_error_and_persists_nothing() {
        let api = FakeApi::new();
        *api.login.lock() = Err(AppError::Credentials("Invalid email or password".to_string()));
        let f = fixture_with(api);

        let err = f.controller.login(&credentials("correct horse")).await.unwrap_err();
        assert_eq!(err, AppError::Credentials("Invalid email or password".to_string()));

        let session = f.controller.session();
        assert_eq!(session.phase, AuthPhase::Unauthenticated);
        assert!(!session.is_authenticated);
        assert_eq!(session.error.as_deref(), Some("Invalid email or password"));
        assert!(f.storage.is_empty());
        assert!(!f.controller.store().scheduler().is_armed());

        f.controller.clear_error();
        assert_eq!(f.controller.session().error, None);
    }

    #[tokio::test]
    async fn login_failure_without_message_uses_fallback() {
        let api = FakeApi::new();
        *api.login.lock() = Err(AppError::Credentials(String::new()));
        let f = fixture_with(api);

        assert!(f.controller.login(&credentials("correct horse")).await.is_err());
        assert_eq!(f.controller.session().error.as_deref(), Some("Login failed"));
    }

    #[tokio::test]
    async fn invalid_credentials_never_reach_the_backend() {
        let f = fixture();

        let err = f.controller.login(&credentials("short")).await.unwrap_err();
        assert_eq!(
            err,
            AppError::Credentials("Password must be at least 8 characters".to_string())
        );
        assert_eq!(f.api.login_calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            f.controller.session().error.as_deref(),
            Some("Password must be at least 8 characters")
        );
    }

    #[tokio::test]
    async fn bootstrap_without_credentials_signs_out() {
        let f = fixture();
        f.controller.bootstrap().await;

        assert_eq!(f.controller.session(), Session::signed_out());
        assert_eq!(f.api.refresh_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn bootstrap_restores_live_session() {
        let f = fixture();
        f.controller.store().save("access-1", "refresh-1", 3600).unwrap();
        f.controller.store().scheduler().disarm();
        f.clock.advance_secs(600);

        f.controller.bootstrap().await;

        let session = f.controller.session();
        assert!(session.is_authenticated);
        assert_eq!(session.user.map(|user| user.id), Some(42));
        assert_eq!(f.api.refresh_calls.load(Ordering::SeqCst), 0);

        // re-armed for the remaining lifetime
        match f.controller.store().scheduler().state() {
            ScheduleState::ArmedUntil { delay, .. } => {
                assert_eq!(delay, Duration::from_secs(3000 - 300));
            }
            ScheduleState::Idle => panic!("bootstrap must re-arm the refresh timer"),
        }
    }

    #[tokio::test]
    async fn bootstrap_with_expired_token_and_failing_refresh_clears_storage() {
        let f = fixture();
        f.controller.store().save("access-1", "refresh-1", 3600).unwrap();
        // expired ten minutes ago
        f.clock.advance_secs(3600 + 600);

        f.controller.bootstrap().await;

        assert_eq!(f.api.refresh_calls.load(Ordering::SeqCst), 1);
        assert_eq!(f.controller.session(), Session::signed_out());
        assert!(f.storage.is_empty());
    }

    #[tokio::test]
    async fn bootstrap_recovers_through_refresh() {
        let f = fixture();
        f.api.refresh_succeeds("access-2", None);
        f.controller.store().save("access-1", "refresh-1", 3600).unwrap();
        f.clock.advance_secs(3600 + 600);

        f.controller.bootstrap().await;

        assert!(f.controller.session().is_authenticated);
        assert_eq!(f.controller.store().read_access(), Some("access-2".to_string()));
        assert_eq!(f.controller.store().read_refresh(), Some("refresh-1".to_string()));
    }

    #[tokio::test]
    async fn bootstrap_refreshes_when_user_fetch_fails() {
        let f = fixture();
        f.api.valid_access.lock().clear();
        f.api.refresh_succeeds("access-2", Some("refresh-2"));
        f.controller.store().save("access-1", "refresh-1", 3600).unwrap();

        f.controller.bootstrap().await;

        assert!(f.controller.session().is_authenticated);
        assert_eq!(f.api.refresh_calls.load(Ordering::SeqCst), 1);
        assert_eq!(f.controller.store().read_refresh(), Some("refresh-2".to_string()));
    }

    #[tokio::test]
    async fn bootstrap_treats_unreachable_backend_as_soft_failure() {
        let f = fixture();
        f.api.backend_down.store(true, Ordering::SeqCst);
        f.controller.store().save("access-1", "refresh-1", 3600).unwrap();

        f.controller.bootstrap().await;

        // falls through to the refresh path, which is rejected here
        assert_eq!(f.api.refresh_calls.load(Ordering::SeqCst), 1);
        assert_eq!(f.controller.session(), Session::signed_out());
        assert!(f.storage.is_empty());
    }

    #[tokio::test]
    async fn refresh_failure_resets_session() {
        let f = fixture();
        f.controller.login(&credentials("correct horse")).await.unwrap();

        let err = f.controller.refresh().await.unwrap_err();
        assert_eq!(err, AppError::Unauthorized("Refresh token revoked".to_string()));
        assert_eq!(f.controller.session(), Session::signed_out());
        assert!(f.storage.is_empty());
        assert!(!f.controller.store().scheduler().is_armed());
    }

    #[tokio::test]
    async fn refresh_without_token_is_an_error() {
        let f = fixture();
        assert_eq!(f.controller.refresh().await, Err(AppError::NoRefreshToken));
        assert_eq!(f.controller.session(), Session::signed_out());
    }

    #[tokio::test]
    async fn refresh_updates_access_and_keeps_user() {
        let f = fixture();
        f.api.refresh_succeeds("access-2", None);
        f.controller.login(&credentials("correct horse")).await.unwrap();

        f.controller.refresh().await.unwrap();

        let session = f.controller.session();
        assert_eq!(session.phase, AuthPhase::Authenticated);
        assert!(session.user.is_some());
        assert_eq!(f.controller.store().read_access(), Some("access-2".to_string()));
        assert_eq!(f.controller.store().read_refresh(), Some("refresh-1".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_refreshes_share_one_request() {
        let mut api = FakeApi::new();
        api.refresh_latency = Some(Duration::from_millis(50));
        let f = fixture_with(api);
        f.api.refresh_succeeds("access-2", Some("refresh-2"));
        f.controller.login(&credentials("correct horse")).await.unwrap();

        let (first, second) = tokio::join!(f.controller.refresh(), f.controller.refresh());

        assert_eq!(first, Ok(()));
        assert_eq!(second, Ok(()));
        assert_eq!(f.api.refresh_calls.load(Ordering::SeqCst), 1);
        assert_eq!(f.controller.store().read_refresh(), Some("refresh-2".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn logout_during_refresh_discards_new_tokens() {
        let mut api = FakeApi::new();
        api.refresh_latency = Some(Duration::from_millis(50));
        let f = fixture_with(api);
        f.api.refresh_succeeds("access-2", None);
        f.controller.login(&credentials("correct horse")).await.unwrap();

        let (refreshed, ()) = tokio::join!(f.controller.refresh(), f.controller.logout());

        assert!(refreshed.is_err());
        assert_eq!(f.controller.session(), Session::signed_out());
        assert!(f.storage.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn scheduled_refresh_fires_before_expiry() {
        let f = fixture();
        f.api.refresh_succeeds("access-2", None);
        f.controller.login(&credentials("correct horse")).await.unwrap();

        tokio::time::sleep(Duration::from_secs(3300) + Duration::from_millis(1)).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        assert_eq!(f.api.refresh_calls.load(Ordering::SeqCst), 1);
        assert_eq!(f.controller.store().read_access(), Some("access-2".to_string()));
        assert!(f.controller.store().scheduler().is_armed());
    }

    #[tokio::test]
    async fn logout_twice_is_idempotent() {
        let f = fixture();
        f.controller.login(&credentials("correct horse")).await.unwrap();

        f.controller.logout().await;
        assert_eq!(f.controller.session(), Session::signed_out());
        assert!(f.storage.is_empty());

        f.api.logout_fails.store(true, Ordering::SeqCst);
        f.controller.logout().await;
        assert_eq!(f.controller.session(), Session::signed_out());
        assert_eq!(f.api.logout_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unauthorized_hook_signs_out() {
        let f = fixture();
        f.controller.login(&credentials("correct horse")).await.unwrap();

        let hook: Arc<dyn UnauthorizedHook> = f.controller.clone();
        hook.on_unauthorized();

        assert_eq!(f.controller.session(), Session::signed_out());
        assert!(f.storage.is_empty());
    }

    #[tokio::test]
    async fn verify_and_reload_use_the_stored_token() {
        let f = fixture();
        assert!(matches!(
            f.controller.verify_token().await,
            Err(AppError::Unauthorized(_))
        ));
        assert!(f.controller.reload_user().await.is_err());

        f.controller.login(&credentials("correct horse")).await.unwrap();

        let verification = f.controller.verify_token().await.unwrap();
        assert!(verification.valid);
        assert_eq!(verification.user.map(|user| user.name), Some("Grace Hopper".to_string()));

        let user = f.controller.reload_user().await.unwrap();
        assert_eq!(user.email, "trader@example.com");
    }

    #[tokio::test]
    async fn reload_user_signs_out_on_401() {
        let f = fixture();
        f.controller.login(&credentials("correct horse")).await.unwrap();
        f.api.valid_access.lock().clear();

        assert!(matches!(
            f.controller.reload_user().await,
            Err(AppError::Unauthorized(_))
        ));
        assert_eq!(f.controller.session(), Session::signed_out());
    }

    #[tokio::test]
    async fn verify_token_signs_out_on_401() {
        let f = fixture();
        f.controller.login(&credentials("correct horse")).await.unwrap();
        f.api.verify_rejects.store(true, Ordering::SeqCst);

        assert_eq!(
            f.controller.verify_token().await,
            Err(AppError::Unauthorized("Token revoked".to_string()))
        );
        assert_eq!(f.controller.session(), Session::signed_out());
        assert!(f.storage.is_empty());
        assert!(!f.controller.store().scheduler().is_armed());
    }

    #[tokio::test]
    async fn token_status_is_invalid_without_a_session() {
        let f = fixture();
        f.controller.login(&credentials("correct horse")).await.unwrap();
        f.controller.handle_unauthorized();

        // a stray expiry key alone is not a credential
        f.storage.set("trader_token_expiry", &(NOW + 3_600_000).to_string()).unwrap();
        assert_eq!(f.controller.token_status(5), TokenStatus::INVALID);
    }

    #[tokio::test]
    async fn token_status_is_invalid_for_incomplete_record() {
        let f = fixture();
        f.controller.login(&credentials("correct horse")).await.unwrap();
        assert!(f.controller.token_status(5).is_valid);

        f.storage.remove("trader_refresh_token").unwrap();
        assert!(f.controller.session().is_authenticated);
        assert_eq!(f.controller.token_status(5), TokenStatus::INVALID);
    }

    #[tokio::test]
    async fn settings_and_status_follow_the_session() {
        let f = fixture();
        assert_eq!(f.controller.user_setting(|settings| settings.theme), None);
        assert_eq!(f.controller.token_status(5), TokenStatus::INVALID);

        f.controller.login(&credentials("correct horse")).await.unwrap();
        assert_eq!(
            f.controller.user_setting(|settings| settings.timezone.clone()),
            Some("UTC".to_string())
        );

        let status = f.controller.token_status(5);
        assert!(status.is_valid);
        assert_eq!(status.minutes_until_expiry, 60);

        f.clock.advance_secs(3600 - 240);
        assert!(f.controller.token_status(5).is_near_expiry);
    }

    #[tokio::test]
    async fn subscribers_observe_transitions() {
        let f = fixture();
        let mut rx = f.controller.subscribe();

        f.controller.login(&credentials("correct horse")).await.unwrap();
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().is_authenticated);

        f.controller.logout().await;
        assert!(!rx.borrow_and_update().is_authenticated);
    }
}
