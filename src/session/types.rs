//! Wire payloads of the `/auth/*` endpoints and the decorated `User` kept in
//! the session. Requests carry passwords and tokens, so none of these types may
//! be logged with `{:?}` outside of tests.

use crate::errors::AppError;
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeSet;

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Every successful backend payload is wrapped in `{"data": ...}`.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
}

#[derive(Debug)]
pub struct LoginCredentials {
    pub email: String,
    pub password: SecretString,
    pub remember_me: bool,
}

impl LoginCredentials {
    #[must_use]
    pub fn new(email: &str, password: SecretString, remember_me: bool) -> Self {
        Self {
            email: email.trim().to_string(),
            password,
            remember_me,
        }
    }

    /// Mirrors the login form rules: required, well-formed email and a
    /// password of at least eight characters.
    ///
    /// # Errors
    /// Returns `AppError::Credentials` describing the first failed rule.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.email.is_empty() {
            return Err(AppError::Credentials("Email is required".to_string()));
        }

        if !valid_email(&self.email) {
            return Err(AppError::Credentials(
                "Please enter a valid email address".to_string(),
            ));
        }

        let password = self.password.expose_secret();
        if password.is_empty() {
            return Err(AppError::Credentials("Password is required".to_string()));
        }

        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(AppError::Credentials(format!(
                "Password must be at least {MIN_PASSWORD_LENGTH} characters"
            )));
        }

        Ok(())
    }

    pub(crate) fn to_request(&self) -> LoginRequest<'_> {
        LoginRequest {
            email: &self.email,
            password: self.password.expose_secret(),
            remember_me: self.remember_me.then_some(true),
        }
    }
}

fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|re| re.is_match(email))
}

#[derive(Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remember_me: Option<bool>,
}

#[derive(Serialize)]
pub(crate) struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}

#[derive(Serialize)]
pub(crate) struct VerifyTokenRequest<'a> {
    pub token: &'a str,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AuthResponseData {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub user: UserPayload,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TokenRefreshData {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_in: i64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct VerifyTokenData {
    pub valid: bool,
    #[serde(default)]
    pub user: Option<UserPayload>,
    #[serde(default)]
    pub expires_at: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct LogoutData {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: String,
}

/// Result of `POST /auth/verify-token` with the user already decorated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TokenVerification {
    pub valid: bool,
    pub user: Option<User>,
    pub expires_at: Option<String>,
}

impl From<VerifyTokenData> for TokenVerification {
    fn from(data: VerifyTokenData) -> Self {
        Self {
            valid: data.valid,
            user: data.user.map(User::from),
            expires_at: data.expires_at,
        }
    }
}

/// User as sent by the backend; settings may be missing or partial.
#[derive(Clone, Debug, Deserialize)]
pub struct UserPayload {
    pub id: u64,
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default)]
    pub last_login_at: Option<String>,
    #[serde(default)]
    pub roles: BTreeSet<String>,
    #[serde(default)]
    pub permissions: BTreeSet<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub settings: Option<PartialUserSettings>,
}

const fn default_true() -> bool {
    true
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimaryRole {
    User,
    Admin,
    SuperAdmin,
}

impl PrimaryRole {
    #[must_use]
    pub fn from_roles(roles: &BTreeSet<String>) -> Self {
        if roles.contains("super_admin") {
            Self::SuperAdmin
        } else if roles.contains("admin") {
            Self::Admin
        } else {
            Self::User
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
            Self::SuperAdmin => "super_admin",
        }
    }
}

/// Authenticated principal with display fields computed once at load time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: u64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    pub email_verified: bool,
    pub last_login_at: Option<String>,
    pub roles: BTreeSet<String>,
    pub permissions: BTreeSet<String>,
    pub avatar_url: Option<String>,
    pub name: String,
    pub primary_role: PrimaryRole,
    pub settings: UserSettings,
}

impl User {
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    #[must_use]
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }
}

/// "first last", trimmed, or the email when both name parts are blank.
#[must_use]
pub fn display_name(first_name: &str, last_name: &str, email: &str) -> String {
    let name = format!("{} {}", first_name.trim(), last_name.trim());
    let name = name.trim();
    if name.is_empty() {
        email.to_string()
    } else {
        name.to_string()
    }
}

impl From<UserPayload> for User {
    fn from(payload: UserPayload) -> Self {
        let name = display_name(&payload.first_name, &payload.last_name, &payload.email);
        let primary_role = PrimaryRole::from_roles(&payload.roles);
        let settings = UserSettings::merge(payload.settings.as_ref());

        Self {
            id: payload.id,
            email: payload.email,
            first_name: payload.first_name,
            last_name: payload.last_name,
            is_active: payload.is_active,
            email_verified: payload.email_verified,
            last_login_at: payload.last_login_at,
            roles: payload.roles,
            permissions: payload.permissions,
            avatar_url: payload.avatar_url,
            name,
            primary_role,
            settings,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Ru,
    Es,
    De,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Usd,
    Eur,
    Rub,
    Btc,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationSettings {
    pub telegram: bool,
    pub in_app: bool,
    pub push: bool,
    pub email: bool,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            telegram: false,
            in_app: true,
            push: false,
            email: true,
        }
    }
}

/// Fully specified user preferences. Defaults: system theme, English, UTC,
/// USD, in-app and email notifications on, telegram and push off.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSettings {
    pub theme: Theme,
    pub language: Language,
    pub timezone: String,
    pub currency: Currency,
    pub notifications: NotificationSettings,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            theme: Theme::default(),
            language: Language::default(),
            timezone: "UTC".to_string(),
            currency: Currency::default(),
            notifications: NotificationSettings::default(),
        }
    }
}

/// Settings as the backend may send them: any field can be missing, and
/// unknown enum values fall back to the default instead of failing the user.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct PartialUserSettings {
    #[serde(default)]
    pub theme: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub notifications: Option<PartialNotificationSettings>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct PartialNotificationSettings {
    #[serde(default)]
    pub telegram: Option<bool>,
    #[serde(default)]
    pub in_app: Option<bool>,
    #[serde(default)]
    pub push: Option<bool>,
    #[serde(default)]
    pub email: Option<bool>,
}

impl UserSettings {
    /// Overlays whatever the backend sent on top of the documented defaults.
    #[must_use]
    pub fn merge(partial: Option<&PartialUserSettings>) -> Self {
        let defaults = Self::default();
        let Some(partial) = partial else {
            return defaults;
        };

        let notifications = partial.notifications.as_ref().map_or(
            defaults.notifications,
            |n| NotificationSettings {
                telegram: n.telegram.unwrap_or(defaults.notifications.telegram),
                in_app: n.in_app.unwrap_or(defaults.notifications.in_app),
                push: n.push.unwrap_or(defaults.notifications.push),
                email: n.email.unwrap_or(defaults.notifications.email),
            },
        );

        Self {
            theme: parse_variant(partial.theme.as_deref()).unwrap_or(defaults.theme),
            language: parse_variant(partial.language.as_deref()).unwrap_or(defaults.language),
            timezone: partial
                .timezone
                .as_deref()
                .map(str::trim)
                .filter(|tz| !tz.is_empty())
                .map_or(defaults.timezone, ToString::to_string),
            currency: parse_variant(partial.currency.as_deref()).unwrap_or(defaults.currency),
            notifications,
        }
    }
}

fn parse_variant<T: DeserializeOwned>(value: Option<&str>) -> Option<T> {
    let value = value?.trim();
    serde_json::from_value(serde_json::Value::String(value.to_string())).ok()
}
