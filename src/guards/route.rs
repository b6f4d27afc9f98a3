//! Navigation decisions for protected and public routes. The guard is a UX
//! convenience; the backend still enforces access on every request.

use crate::{
    config::{DEFAULT_HOME_PATH, DEFAULT_LOGIN_PATH},
    session::Session,
};
use serde::{Deserialize, Serialize};

/// Router location with the navigation state the guard attaches on redirect.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub pathname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Box<Location>>,
}

impl Location {
    #[must_use]
    pub fn new(pathname: &str) -> Self {
        Self {
            pathname: pathname.to_string(),
            from: None,
        }
    }

    /// Location carrying `from` as its navigation state.
    #[must_use]
    pub fn with_from(mut self, from: Location) -> Self {
        self.from = Some(Box::new(from));
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum GuardDecision {
    /// Session still bootstrapping: show a placeholder, navigate nowhere.
    Loading,
    /// Navigate to `to`; `from` is the location to restore after login.
    Redirect {
        to: String,
        from: Option<Location>,
    },
    Render,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteGuard {
    login_path: String,
    default_path: String,
}

impl Default for RouteGuard {
    fn default() -> Self {
        Self::new(DEFAULT_LOGIN_PATH, DEFAULT_HOME_PATH)
    }
}

impl RouteGuard {
    #[must_use]
    pub fn new(login_path: &str, default_path: &str) -> Self {
        Self {
            login_path: login_path.to_string(),
            default_path: default_path.to_string(),
        }
    }

    #[must_use]
    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    #[must_use]
    pub fn default_path(&self) -> &str {
        &self.default_path
    }

    /// `require_auth` is true for protected pages and false for public ones
    /// such as the login page.
    #[must_use]
    pub fn decide(
        &self,
        require_auth: bool,
        session: &Session,
        location: &Location,
    ) -> GuardDecision {
        if session.is_loading() {
            return GuardDecision::Loading;
        }

        match (require_auth, session.is_authenticated) {
            (true, false) => GuardDecision::Redirect {
                to: self.login_path.clone(),
                from: Some(Location::new(&location.pathname)),
            },
            (false, true) => GuardDecision::Redirect {
                to: self.post_login_destination(location),
                from: None,
            },
            _ => GuardDecision::Render,
        }
    }

    /// Where a freshly authenticated user on `location` should land: the
    /// captured origin, or the default page. Never loops back to the login page.
    #[must_use]
    pub fn post_login_destination(&self, location: &Location) -> String {
        location
            .from
            .as_deref()
            .map(|from| from.pathname.as_str())
            .filter(|path| !path.is_empty() && *path != self.login_path)
            .unwrap_or(self.default_path.as_str())
            .to_string()
    }
}
