use crate::{
    cli::{
        actions::{open_session, print_json},
        globals::GlobalArgs,
    },
    session::TokenStatus,
};
use anyhow::{bail, Result};
use serde::Serialize;

#[derive(Serialize)]
struct StatusReport {
    stored_credentials: bool,
    #[serde(flatten)]
    status: TokenStatus,
}

/// # Errors
/// Returns an error if the configuration is invalid.
pub async fn logout(globals: &GlobalArgs) -> Result<()> {
    let (_, controller) = open_session(globals)?;
    controller.logout().await;
    println!("Logged out");
    Ok(())
}

/// # Errors
/// Returns an error if no refresh token is stored or the backend rejects it.
pub async fn refresh(globals: &GlobalArgs) -> Result<()> {
    let (config, controller) = open_session(globals)?;
    controller.refresh().await?;
    // Loads the user with the new access token so the status reflects the session.
    controller.bootstrap().await;
    print_json(&controller.token_status(config.warning_threshold_minutes))
}

/// # Errors
/// Returns an error if there is no session to restore.
pub async fn whoami(globals: &GlobalArgs) -> Result<()> {
    let (_, controller) = open_session(globals)?;
    controller.bootstrap().await;

    match controller.session().user {
        Some(user) => print_json(&user),
        None => bail!("Not logged in"),
    }
}

/// Restore the session, then report the access token's expiry.
/// # Errors
/// Returns an error if the configuration is invalid.
pub async fn status(globals: &GlobalArgs) -> Result<()> {
    let (config, controller) = open_session(globals)?;
    controller.bootstrap().await;

    print_json(&StatusReport {
        stored_credentials: controller.store().read_refresh().is_some(),
        status: controller.token_status(config.warning_threshold_minutes),
    })
}

/// # Errors
/// Returns an error if there is no usable access token or the backend fails.
pub async fn verify(globals: &GlobalArgs) -> Result<()> {
    let (_, controller) = open_session(globals)?;
    let verification = controller.verify_token().await?;
    print_json(&verification)
}
