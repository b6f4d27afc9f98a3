//! Maps validated CLI matches to the action to run.

use crate::cli::{
    actions::{access, login, Action},
    commands::{
        CMD_ACCESS, CMD_LOGIN, CMD_LOGOUT, CMD_REFRESH, CMD_STATUS, CMD_VERIFY, CMD_WATCH,
        CMD_WHOAMI,
    },
    globals::GlobalArgs,
};
use anyhow::{anyhow, Context, Result};
use secrecy::SecretString;

/// # Errors
/// Returns an error if required arguments are missing or the subcommand is unknown.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let globals = GlobalArgs::parse(matches)?;

    let (name, sub) = matches
        .subcommand()
        .context("missing subcommand, see --help")?;

    let action = match name {
        CMD_LOGIN => Action::Login(login::Args {
            globals,
            email: sub
                .get_one::<String>("email")
                .cloned()
                .context("missing required argument: --email")?,
            password: sub
                .get_one::<String>("password")
                .cloned()
                .map(SecretString::from)
                .context("missing required argument: --password")?,
            remember_me: sub.get_flag("remember-me"),
        }),
        CMD_LOGOUT => Action::Logout(globals),
        CMD_REFRESH => Action::Refresh(globals),
        CMD_WHOAMI => Action::Whoami(globals),
        CMD_STATUS => Action::Status(globals),
        CMD_VERIFY => Action::Verify(globals),
        CMD_ACCESS => Action::Access(access::Args {
            globals,
            path: sub
                .get_one::<String>("path")
                .cloned()
                .context("missing required argument: --path")?,
            public: sub.get_flag("public"),
            from: sub.get_one::<String>("from").cloned(),
            roles: sub
                .get_many::<String>("role")
                .map(|roles| roles.cloned().collect())
                .unwrap_or_default(),
        }),
        CMD_WATCH => Action::Watch(globals),
        other => return Err(anyhow!("unknown subcommand: {other}")),
    };

    Ok(action)
}
