//! Single-slot deferred refresh.
//!
//! At most one refresh task is pending per scheduler. Arming always cancels the
//! previous task before scheduling a new one, so the timer path can never issue
//! two refreshes for the same token.

use crate::errors::AppError;
use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use std::{sync::Arc, time::Duration};
use tokio::{runtime::Handle, task::JoinHandle, time::Instant};
use tracing::{debug, error, warn};

/// Seconds before expiry at which the refresh fires.
pub const REFRESH_LEAD_SECS: i64 = 300;
/// The refresh never fires sooner than this after arming.
pub const MIN_REFRESH_DELAY: Duration = Duration::from_secs(60);

pub type RefreshFuture = BoxFuture<'static, Result<(), AppError>>;
pub type RefreshCallback = Arc<dyn Fn() -> RefreshFuture + Send + Sync>;

/// Observable scheduler state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScheduleState {
    Idle,
    ArmedUntil { deadline: Instant, delay: Duration },
}

/// `max((expires_in - 300) * 1000, 60_000)` milliseconds.
#[must_use]
pub fn refresh_delay(expires_in_secs: i64) -> Duration {
    let lead_ms = expires_in_secs
        .saturating_sub(REFRESH_LEAD_SECS)
        .saturating_mul(1000);

    u64::try_from(lead_ms)
        .map(Duration::from_millis)
        .unwrap_or(MIN_REFRESH_DELAY)
        .max(MIN_REFRESH_DELAY)
}

struct Pending {
    generation: u64,
    deadline: Instant,
    delay: Duration,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct Slot {
    generation: u64,
    pending: Option<Pending>,
}

#[derive(Default)]
struct Inner {
    callback: Mutex<Option<RefreshCallback>>,
    slot: Mutex<Slot>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(pending) = self.slot.get_mut().pending.take() {
            pending.handle.abort();
        }
    }
}

#[derive(Clone, Default)]
pub struct RefreshScheduler {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for RefreshScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshScheduler")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl RefreshScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the function invoked when the timer fires. Last writer wins.
    pub fn set_callback(&self, callback: RefreshCallback) {
        *self.inner.callback.lock() = Some(callback);
    }

    pub fn clear_callback(&self) {
        *self.inner.callback.lock() = None;
    }

    /// Cancels any pending refresh and schedules a new one for a token that
    /// expires in `expires_in_secs`.
    pub fn arm(&self, expires_in_secs: i64) {
        let delay = refresh_delay(expires_in_secs);

        let Ok(runtime) = Handle::try_current() else {
            warn!("No async runtime available, automatic refresh not scheduled");
            self.disarm();
            return;
        };

        let mut slot = self.inner.slot.lock();
        if let Some(previous) = slot.pending.take() {
            previous.handle.abort();
        }

        slot.generation += 1;
        let generation = slot.generation;
        let deadline = Instant::now() + delay;
        let inner = Arc::downgrade(&self.inner);

        let handle = runtime.spawn(async move {
            tokio::time::sleep_until(deadline).await;

            let Some(inner) = inner.upgrade() else {
                return;
            };

            // Release the slot before running the callback: the refresh re-arms
            // the scheduler and must not abort the task it is running on.
            let callback = {
                let mut slot = inner.slot.lock();
                if slot.pending.as_ref().map(|pending| pending.generation) != Some(generation) {
                    return;
                }
                slot.pending = None;
                inner.callback.lock().clone()
            };
            drop(inner);

            let Some(callback) = callback else {
                debug!("Refresh timer fired without a registered callback");
                return;
            };

            if let Err(err) = callback().await {
                error!("Automatic token refresh failed: {}", err);
            }
        });

        debug!("Automatic refresh scheduled in {} ms", delay.as_millis());

        slot.pending = Some(Pending {
            generation,
            deadline,
            delay,
            handle,
        });
    }

    /// Cancels the pending refresh, if any.
    pub fn disarm(&self) {
        if let Some(pending) = self.inner.slot.lock().pending.take() {
            pending.handle.abort();
            debug!("Automatic refresh cancelled");
        }
    }

    #[must_use]
    pub fn state(&self) -> ScheduleState {
        self.inner
            .slot
            .lock()
            .pending
            .as_ref()
            .map_or(ScheduleState::Idle, |pending| ScheduleState::ArmedUntil {
                deadline: pending.deadline,
                delay: pending.delay,
            })
    }

    #[must_use]
    pub fn is_armed(&self) -> bool {
        matches!(self.state(), ScheduleState::ArmedUntil { .. })
    }
}
