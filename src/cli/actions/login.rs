use crate::{
    cli::{
        actions::{open_session, print_json},
        globals::GlobalArgs,
    },
    session::LoginCredentials,
};
use anyhow::Result;
use secrecy::SecretString;
use tracing::debug;

#[derive(Debug)]
pub struct Args {
    pub globals: GlobalArgs,
    pub email: String,
    pub password: SecretString,
    pub remember_me: bool,
}

/// Log in and print the decorated user.
/// # Errors
/// Returns an error if the credentials are rejected or the backend is unreachable.
pub async fn execute(args: Args) -> Result<()> {
    let (config, controller) = open_session(&args.globals)?;
    debug!("logging in against {}", config.api_base_url);

    let credentials = LoginCredentials::new(&args.email, args.password, args.remember_me);
    let user = controller.login(&credentials).await?;

    print_json(&user)
}
