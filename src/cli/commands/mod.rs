pub mod backend;
pub mod logging;

use clap::{
    builder::styling::{AnsiColor, Effects, Styles},
    Arg, ArgAction, ColorChoice, Command,
};

pub const CMD_LOGIN: &str = "login";
pub const CMD_LOGOUT: &str = "logout";
pub const CMD_REFRESH: &str = "refresh";
pub const CMD_WHOAMI: &str = "whoami";
pub const CMD_STATUS: &str = "status";
pub const CMD_VERIFY: &str = "verify";
pub const CMD_ACCESS: &str = "access";
pub const CMD_WATCH: &str = "watch";

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("traderdash")
        .about("Trading dashboard session manager")
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(login())
        .subcommand(
            Command::new(CMD_LOGOUT).about("Invalidate the session and erase stored credentials"),
        )
        .subcommand(
            Command::new(CMD_REFRESH).about("Exchange the refresh token for a new access token"),
        )
        .subcommand(
            Command::new(CMD_WHOAMI).about("Restore the session and print the current user"),
        )
        .subcommand(
            Command::new(CMD_STATUS).about("Restore the session and show the token expiry status"),
        )
        .subcommand(
            Command::new(CMD_VERIFY).about("Ask the backend whether the access token is valid"),
        )
        .subcommand(access())
        .subcommand(
            Command::new(CMD_WATCH)
                .about("Keep the session alive with scheduled refreshes until interrupted"),
        );

    let command = backend::with_args(command);
    logging::with_args(command)
}

fn login() -> Command {
    Command::new(CMD_LOGIN)
        .about("Log in and store the issued credentials")
        .arg(
            Arg::new("email")
                .short('e')
                .long("email")
                .help("Account email")
                .env("TRADERDASH_EMAIL")
                .required(true),
        )
        .arg(
            Arg::new("password")
                .short('p')
                .long("password")
                .help("Account password")
                .env("TRADERDASH_PASSWORD")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new("remember-me")
                .long("remember-me")
                .help("Ask the backend for a long-lived session")
                .action(ArgAction::SetTrue),
        )
}

fn access() -> Command {
    Command::new(CMD_ACCESS)
        .about("Evaluate the route and role guards for a path")
        .arg(
            Arg::new("path")
                .long("path")
                .help("Route path to evaluate")
                .required(true),
        )
        .arg(
            Arg::new("public")
                .long("public")
                .help("Treat the route as public (e.g. the login page)")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("from")
                .long("from")
                .help("Origin captured by a previous redirect"),
        )
        .arg(
            Arg::new("role")
                .long("role")
                .help("Required role, repeat for any-of")
                .action(ArgAction::Append),
        )
}
