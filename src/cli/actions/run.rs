use crate::cli::actions::{access, login, session, watch, Action};
use anyhow::Result;

/// Execute the provided action.
// This is the single dispatch point for all CLI actions.
/// # Errors
/// Returns an error if the action fails.
pub async fn execute(action: Action) -> Result<()> {
    match action {
        Action::Login(args) => login::execute(args).await,
        Action::Logout(globals) => session::logout(&globals).await,
        Action::Refresh(globals) => session::refresh(&globals).await,
        Action::Whoami(globals) => session::whoami(&globals).await,
        Action::Status(globals) => session::status(&globals).await,
        Action::Verify(globals) => session::verify(&globals).await,
        Action::Access(args) => access::execute(args).await,
        Action::Watch(globals) => watch::execute(&globals).await,
    }
}
