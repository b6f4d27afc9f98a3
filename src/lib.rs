//! # Traderdash (session core)
//!
//! `traderdash` owns the authentication lifecycle of the trading dashboard:
//! it logs users in against the backend's `/auth/*` API, keeps the issued
//! credentials in durable storage, refreshes the access token shortly before
//! it expires and decides what protected views may be shown.
//!
//! ## Credentials at rest
//!
//! Access token, refresh token and expiry are stored under three namespaced
//! keys. Tokens are XOR-obfuscated and base64 encoded so they never appear as
//! plain text; this is **not** encryption and offers no protection against a
//! reader of the state file. A token inside the five minute safety margin is
//! treated as expired and the whole record is erased on read.
//!
//! ## Refresh
//!
//! Every successful login or refresh arms a single deferred task that fires
//! five minutes before expiry (never sooner than one minute). Manual and
//! scheduled refreshes are single-flight: concurrent callers share one
//! request and its outcome. A failed refresh always ends the session.
//!
//! ## Guards
//!
//! Route and role guards are pure decisions over a [`session::Session`]
//! snapshot. They are a UX convenience; the backend enforces access.

pub mod api;
pub mod cli;
pub mod config;
pub mod errors;
pub mod guards;
pub mod session;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
