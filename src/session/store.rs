//! Durable credential store.
//!
//! Access token, refresh token and expiry live under three namespaced keys.
//! Tokens are obfuscated at rest (see [`Obfuscator`]); the expiry is stored as
//! plain decimal milliseconds since the epoch. The keys are written one by one
//! with no transaction, so every read treats a partial or corrupt record as
//! absent.

use crate::{
    errors::AppError,
    session::{
        clock::Clock, obfuscation::Obfuscator, scheduler::RefreshScheduler,
        storage::KeyValueStorage,
    },
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Tokens inside this window before expiry are already treated as expired.
pub const SAFETY_MARGIN_MS: i64 = 5 * 60 * 1000;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenRecord {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageKeys {
    pub access_token: String,
    pub refresh_token: String,
    pub expiry: String,
}

impl StorageKeys {
    #[must_use]
    pub fn namespaced(namespace: &str) -> Self {
        let namespace = namespace.trim().trim_end_matches('_');
        Self {
            access_token: format!("{namespace}_access_token"),
            refresh_token: format!("{namespace}_refresh_token"),
            expiry: format!("{namespace}_token_expiry"),
        }
    }

    fn all(&self) -> [&str; 3] {
        [&self.access_token, &self.refresh_token, &self.expiry]
    }
}

#[derive(Clone)]
pub struct TokenStore {
    storage: Arc<dyn KeyValueStorage>,
    obfuscator: Obfuscator,
    clock: Arc<dyn Clock>,
    keys: StorageKeys,
    scheduler: RefreshScheduler,
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore")
            .field("keys", &self.keys)
            .field("scheduler", &self.scheduler)
            .finish_non_exhaustive()
    }
}

impl TokenStore {
    #[must_use]
    pub fn new(
        storage: Arc<dyn KeyValueStorage>,
        obfuscator: Obfuscator,
        clock: Arc<dyn Clock>,
        namespace: &str,
    ) -> Self {
        Self {
            storage,
            obfuscator,
            clock,
            keys: StorageKeys::namespaced(namespace),
            scheduler: RefreshScheduler::new(),
        }
    }

    #[must_use]
    pub fn scheduler(&self) -> &RefreshScheduler {
        &self.scheduler
    }

    #[must_use]
    pub fn keys(&self) -> &StorageKeys {
        &self.keys
    }

    #[must_use]
    pub fn now_millis(&self) -> i64 {
        self.clock.now_millis()
    }

    /// Persists a full credential set and arms the refresh timer.
    ///
    /// # Errors
    /// Returns `AppError::Storage` if any key cannot be written.
    pub fn save(
        &self,
        access_token: &str,
        refresh_token: &str,
        expires_in_secs: i64,
    ) -> Result<(), AppError> {
        let expires_at = self.expiry_from_now(expires_in_secs);

        self.storage.set(&self.keys.access_token, &self.obfuscator.obfuscate(access_token))?;
        self.storage.set(&self.keys.refresh_token, &self.obfuscator.obfuscate(refresh_token))?;
        self.storage.set(&self.keys.expiry, &expires_at.to_string())?;

        debug!("credentials stored, expires at {}", expires_at);

        self.scheduler.arm(expires_in_secs);

        Ok(())
    }

    /// Rewrites the access token and expiry, leaving the refresh token alone,
    /// and re-arms the refresh timer.
    ///
    /// # Errors
    /// Returns `AppError::Storage` if any key cannot be written.
    pub fn update_access(&self, access_token: &str, expires_in_secs: i64) -> Result<(), AppError> {
        let expires_at = self.expiry_from_now(expires_in_secs);

        self.storage.set(&self.keys.access_token, &self.obfuscator.obfuscate(access_token))?;
        self.storage.set(&self.keys.expiry, &expires_at.to_string())?;

        debug!("access token updated, expires at {}", expires_at);

        self.scheduler.arm(expires_in_secs);

        Ok(())
    }

    /// Returns the access token unless it is missing, corrupt, or inside the
    /// safety margin. Corrupt or expiring records are erased.
    #[must_use]
    pub fn read_access(&self) -> Option<String> {
        let stored = self.storage.get(&self.keys.access_token)?;

        let Some(token) = self.obfuscator.reveal(&stored).filter(|t| !t.is_empty()) else {
            warn!("Stored access token is unreadable, clearing credentials");
            self.clear();
            return None;
        };

        if self.is_expiring() {
            debug!("Stored access token is expired or inside the safety margin");
            self.clear();
            return None;
        }

        Some(token)
    }

    #[must_use]
    pub fn read_refresh(&self) -> Option<String> {
        let stored = self.storage.get(&self.keys.refresh_token)?;
        self.obfuscator.reveal(&stored).filter(|t| !t.is_empty())
    }

    /// Stored expiry in epoch milliseconds, `None` when missing or not numeric.
    #[must_use]
    pub fn expires_at(&self) -> Option<i64> {
        self.storage
            .get(&self.keys.expiry)
            .and_then(|raw| raw.trim().parse::<i64>().ok())
    }

    /// Both tokens are present and readable, regardless of expiry. Unlike
    /// [`Self::read_access`] this never erases the record.
    #[must_use]
    pub fn has_stored_tokens(&self) -> bool {
        let access = self
            .storage
            .get(&self.keys.access_token)
            .and_then(|stored| self.obfuscator.reveal(&stored))
            .filter(|token| !token.is_empty());

        access.is_some() && self.read_refresh().is_some()
    }

    #[must_use]
    pub fn has_valid_credentials(&self) -> bool {
        self.read_access().is_some() && self.read_refresh().is_some()
    }

    #[must_use]
    pub fn record(&self) -> Option<TokenRecord> {
        let access_token = self.read_access()?;
        let refresh_token = self.read_refresh()?;
        let expires_at = self.expires_at()?;

        Some(TokenRecord {
            access_token,
            refresh_token,
            expires_at,
        })
    }

    /// Erases every credential key and cancels the pending refresh. Storage
    /// failures are logged; clearing never fails for the caller.
    pub fn clear(&self) {
        for key in self.keys.all() {
            if let Err(err) = self.storage.remove(key) {
                warn!("Failed to remove {}: {}", key, err);
            }
        }

        self.scheduler.disarm();
    }

    fn is_expiring(&self) -> bool {
        self.expires_at().map_or(true, |expires_at| {
            self.clock.now_millis() >= expires_at.saturating_sub(SAFETY_MARGIN_MS)
        })
    }

    fn expiry_from_now(&self, expires_in_secs: i64) -> i64 {
        self.clock
            .now_millis()
            .saturating_add(expires_in_secs.saturating_mul(1000))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{clock::ManualClock, scheduler::ScheduleState, storage::MemoryStorage};
    use std::time::Duration;

    const NOW: i64 = 1_700_000_000_000;

    fn store_with(storage: &Arc<MemoryStorage>, clock: &Arc<ManualClock>) -> TokenStore {
        TokenStore::new(
            Arc::clone(storage) as Arc<dyn KeyValueStorage>,
            Obfuscator::new("trader_app_secret_key"),
            Arc::clone(clock) as Arc<dyn Clock>,
            "trader",
        )
    }

    fn fixture() -> (TokenStore, Arc<MemoryStorage>, Arc<ManualClock>) {
        let storage = Arc::new(MemoryStorage::new());
        let clock = Arc::new(ManualClock::new(NOW));
        (store_with(&storage, &clock), storage, clock)
    }

    #[test]
    fn keys_are_namespaced() {
        let keys = StorageKeys::namespaced("trader");
        assert_eq!(keys.access_token, "trader_access_token");
        assert_eq!(keys.refresh_token, "trader_refresh_token");
        assert_eq!(keys.expiry, "trader_token_expiry");
    }

    #[tokio::test]
    async fn save_then_read_round_trips() {
        let (store, storage, clock) = fixture();
        store.save("access-1", "refresh-1", 3600).unwrap();

        // tokens are not stored as plain text
        let raw = storage.get("trader_access_token").unwrap();
        assert_ne!(raw, "access-1");
        assert_eq!(
            storage.get("trader_token_expiry"),
            Some((NOW + 3_600_000).to_string())
        );

        clock.advance_secs(3600 - 301);
        assert_eq!(store.read_access(), Some("access-1".to_string()));
        assert_eq!(store.read_refresh(), Some("refresh-1".to_string()));
        assert!(store.has_valid_credentials());
        assert_eq!(
            store.record(),
            Some(TokenRecord {
                access_token: "access-1".to_string(),
                refresh_token: "refresh-1".to_string(),
                expires_at: NOW + 3_600_000,
            })
        );
    }

    #[tokio::test]
    async fn short_lived_token_is_absent_immediately() {
        for expires_in in [1, 60, 299, 300] {
            let (store, _storage, _clock) = fixture();
            store.save("access", "refresh", expires_in).unwrap();

            // refresh token is read before the access read erases the record
            assert_eq!(store.read_refresh(), Some("refresh".to_string()));
            assert_eq!(store.read_access(), None, "expires_in={expires_in}");
        }
    }

    #[tokio::test]
    async fn expired_access_read_erases_everything() {
        let (store, storage, clock) = fixture();
        store.save("access", "refresh", 3600).unwrap();

        clock.advance_secs(3600 - 299);
        assert_eq!(store.read_access(), None);
        assert!(storage.is_empty());
        assert_eq!(store.read_refresh(), None);
        assert!(!store.scheduler().is_armed());
    }

    #[tokio::test]
    async fn clear_empties_storage_and_disarms() {
        let (store, storage, _clock) = fixture();
        store.save("access", "refresh", 3600).unwrap();
        assert!(store.scheduler().is_armed());

        store.clear();

        assert!(storage.is_empty());
        assert_eq!(store.read_access(), None);
        assert_eq!(store.read_refresh(), None);
        assert!(!store.has_valid_credentials());
        assert_eq!(store.scheduler().state(), ScheduleState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn save_arms_scheduler_with_lead_time() {
        let (store, _storage, _clock) = fixture();
        store.save("access", "refresh", 3600).unwrap();

        match store.scheduler().state() {
            ScheduleState::ArmedUntil { delay, .. } => {
                assert_eq!(delay, Duration::from_millis(3_300_000));
            }
            ScheduleState::Idle => panic!("save must arm the scheduler"),
        }
    }

    #[tokio::test]
    async fn update_access_keeps_refresh_token() {
        let (store, _storage, clock) = fixture();
        store.save("access-1", "refresh-1", 600).unwrap();

        clock.advance_secs(400);
        store.update_access("access-2", 3600).unwrap();

        assert_eq!(store.read_access(), Some("access-2".to_string()));
        assert_eq!(store.read_refresh(), Some("refresh-1".to_string()));
        assert_eq!(store.expires_at(), Some(NOW + 400_000 + 3_600_000));
    }

    #[tokio::test]
    async fn stored_tokens_check_does_not_erase() {
        let (store, storage, clock) = fixture();
        assert!(!store.has_stored_tokens());

        store.save("access", "refresh", 3600).unwrap();
        clock.advance_secs(3600 - 60);

        assert!(store.has_stored_tokens());
        assert_eq!(storage.len(), 3);

        // the expiring read is what erases the record
        assert!(!store.has_valid_credentials());
        assert!(storage.is_empty());
    }

    #[test]
    fn partial_record_reads_as_absent() {
        let (store, storage, _clock) = fixture();
        let obfuscator = Obfuscator::new("trader_app_secret_key");
        storage
            .set("trader_access_token", &obfuscator.obfuscate("access"))
            .unwrap();

        // no expiry written
        assert_eq!(store.read_access(), None);
        assert!(storage.is_empty());
    }

    #[test]
    fn corrupt_values_read_as_absent() {
        let (store, storage, _clock) = fixture();
        storage.set("trader_access_token", "***").unwrap();
        storage.set("trader_refresh_token", "***").unwrap();
        storage.set("trader_token_expiry", "tomorrow").unwrap();

        assert_eq!(store.read_refresh(), None);
        assert_eq!(store.expires_at(), None);
        assert_eq!(store.read_access(), None);
        assert!(!store.has_valid_credentials());
    }

    #[tokio::test]
    async fn different_namespaces_do_not_collide() {
        let storage = Arc::new(MemoryStorage::new());
        let clock = Arc::new(ManualClock::new(NOW));
        let desk = TokenStore::new(
            Arc::clone(&storage) as Arc<dyn KeyValueStorage>,
            Obfuscator::new("k"),
            Arc::clone(&clock) as Arc<dyn Clock>,
            "desk",
        );
        let trader = store_with(&storage, &clock);

        desk.save("a", "r", 3600).unwrap();
        assert_eq!(trader.read_access(), None);
        assert_eq!(desk.read_access(), Some("a".to_string()));
    }
}
