pub mod access;
pub mod login;
pub mod session;
pub mod watch;

// Internal "interpreter" for `Action`.
// The match lives in a separate module so `mod.rs` stays small as actions grow.
mod run;

use crate::{cli::globals::GlobalArgs, config::AppConfig, session::SessionController};
use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug)]
pub enum Action {
    Login(login::Args),
    Logout(GlobalArgs),
    Refresh(GlobalArgs),
    Whoami(GlobalArgs),
    Status(GlobalArgs),
    Verify(GlobalArgs),
    Access(access::Args),
    Watch(GlobalArgs),
}

impl Action {
    /// Execute the action.
    /// # Errors
    /// Returns an error if the action fails.
    pub async fn execute(self) -> anyhow::Result<()> {
        run::execute(self).await
    }
}

/// Builds the controller over the configured backend and state file.
pub(crate) fn open_session(globals: &GlobalArgs) -> Result<(AppConfig, Arc<SessionController>)> {
    let config = globals.to_config()?;
    let controller = SessionController::from_config(&config)?;
    Ok((config, controller))
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
