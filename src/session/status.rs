//! Token expiry status and the periodic expiry monitor.

use crate::session::controller::SessionController;
use serde::Serialize;
use std::{sync::Arc, time::Duration};
use tokio::task::JoinHandle;
use tracing::{debug, info};

pub const MONITOR_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct TokenStatus {
    pub is_valid: bool,
    pub is_expired: bool,
    pub is_near_expiry: bool,
    pub minutes_until_expiry: i64,
}

impl TokenStatus {
    pub const INVALID: Self = Self {
        is_valid: false,
        is_expired: true,
        is_near_expiry: false,
        minutes_until_expiry: 0,
    };

    /// Status of a token expiring at `expires_at` (epoch ms) seen at `now`.
    /// `warning_threshold_minutes` marks the start of the near-expiry window.
    #[must_use]
    pub fn at(expires_at: i64, now: i64, warning_threshold_minutes: i64) -> Self {
        let minutes_until_expiry = (expires_at.saturating_sub(now) / 60_000).max(0);
        let is_expired = now >= expires_at;
        let is_near_expiry = !is_expired && minutes_until_expiry <= warning_threshold_minutes;

        Self {
            is_valid: !is_expired,
            is_expired,
            is_near_expiry,
            minutes_until_expiry,
        }
    }
}

/// Checks the token status now and then every [`MONITOR_INTERVAL`]; logs the
/// session out once the token is expired. The task ends when the session is
/// no longer authenticated.
pub fn spawn_expiry_monitor(
    controller: &Arc<SessionController>,
    warning_threshold_minutes: i64,
) -> JoinHandle<()> {
    let controller = Arc::downgrade(controller);

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(MONITOR_INTERVAL);

        loop {
            ticker.tick().await;

            let Some(controller) = controller.upgrade() else {
                return;
            };

            if !controller.session().is_authenticated {
                debug!("expiry monitor stopped, session is not authenticated");
                return;
            }

            let status = controller.token_status(warning_threshold_minutes);
            if status.is_expired {
                info!("Session token expired, logging out");
                controller.logout().await;
                return;
            }

            if status.is_near_expiry {
                debug!(
                    "session token expires in {} minutes",
                    status.minutes_until_expiry
                );
            }
        }
    })
}
