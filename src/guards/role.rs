//! Role-based rendering decisions and role helpers for the current session.

use crate::session::{types::PrimaryRole, Session, User};
use serde::Serialize;
use std::collections::BTreeSet;

pub const ACCESS_DENIED_TITLE: &str = "Access denied";
pub const ACCESS_DENIED_MESSAGE: &str = "You do not have permission to view this page.";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum RoleDecision {
    Render,
    /// No authenticated user: render the fallback if one was given, else nothing.
    Fallback,
    /// Authenticated but lacking every required role.
    Denied { view: DeniedView },
}

/// What to show instead of the guarded content.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeniedView {
    Fallback,
    Notice,
    Nothing,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoleGuard {
    required: BTreeSet<String>,
    has_fallback: bool,
    show_error: bool,
}

impl RoleGuard {
    #[must_use]
    pub fn new<I, S>(required: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            required: required.into_iter().map(Into::into).collect(),
            has_fallback: false,
            show_error: true,
        }
    }

    #[must_use]
    pub const fn with_fallback(mut self, has_fallback: bool) -> Self {
        self.has_fallback = has_fallback;
        self
    }

    /// When false, a denied user sees nothing instead of the notice.
    #[must_use]
    pub const fn with_show_error(mut self, show_error: bool) -> Self {
        self.show_error = show_error;
        self
    }

    #[must_use]
    pub fn required(&self) -> &BTreeSet<String> {
        &self.required
    }

    #[must_use]
    pub fn decide(&self, session: &Session) -> RoleDecision {
        let Some(user) = session.user.as_ref().filter(|_| session.is_authenticated) else {
            return RoleDecision::Fallback;
        };

        if self.allows(user) {
            return RoleDecision::Render;
        }

        let view = if self.has_fallback {
            DeniedView::Fallback
        } else if self.show_error {
            DeniedView::Notice
        } else {
            DeniedView::Nothing
        };

        RoleDecision::Denied { view }
    }

    #[must_use]
    pub fn allows(&self, user: &User) -> bool {
        !self.required.is_disjoint(&user.roles)
    }
}

/// Role and permission queries against whatever user the session holds.
#[derive(Clone, Copy, Debug)]
pub struct RoleCheck<'a> {
    user: Option<&'a User>,
}

impl<'a> RoleCheck<'a> {
    #[must_use]
    pub fn new(session: &'a Session) -> Self {
        Self {
            user: session.user.as_ref().filter(|_| session.is_authenticated),
        }
    }

    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.user.is_some_and(|user| user.has_role(role))
    }

    #[must_use]
    pub fn has_any_role(&self, roles: &[&str]) -> bool {
        roles.iter().any(|role| self.has_role(role))
    }

    #[must_use]
    pub fn has_permission(&self, permission: &str) -> bool {
        self.user.is_some_and(|user| user.has_permission(permission))
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.has_any_role(&["admin", "super_admin"])
    }

    #[must_use]
    pub fn is_super_admin(&self) -> bool {
        self.has_role("super_admin")
    }

    #[must_use]
    pub fn is_user(&self) -> bool {
        self.has_role("user")
    }

    #[must_use]
    pub fn current_roles(&self) -> Vec<&'a str> {
        self.user
            .map(|user| user.roles.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn primary_role(&self) -> Option<PrimaryRole> {
        self.user.map(|user| user.primary_role)
    }
}
