use crate::config::{
    DEFAULT_API_BASE_URL, DEFAULT_HOME_PATH, DEFAULT_LOGIN_PATH, DEFAULT_OBFUSCATION_KEY,
    DEFAULT_STORAGE_NAMESPACE,
};
use clap::{Arg, Command};

pub const ARG_API_URL: &str = "api-url";
pub const ARG_TIMEOUT: &str = "timeout";
pub const ARG_STATE_FILE: &str = "state-file";
pub const ARG_STORAGE_NAMESPACE: &str = "storage-namespace";
pub const ARG_OBFUSCATION_KEY: &str = "obfuscation-key";
pub const ARG_LOGIN_PATH: &str = "login-path";
pub const ARG_HOME_PATH: &str = "home-path";
pub const ARG_WARNING_MINUTES: &str = "warning-minutes";

pub const DEFAULT_STATE_FILE: &str = "traderdash-session.json";

#[must_use]
pub fn with_args(command: Command) -> Command {
    let command = with_api_args(command);
    let command = with_storage_args(command);
    let command = with_route_args(command);
    command.arg(
        Arg::new(ARG_WARNING_MINUTES)
            .long("warning-minutes")
            .help("Minutes before expiry that count as near expiry [default: 5]")
            .env("TRADERDASH_WARNING_MINUTES")
            .global(true)
            .value_parser(clap::value_parser!(i64).range(0..)),
    )
}

fn with_api_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_API_URL)
                .long("api-url")
                .help("Trading backend API base URL")
                .env("TRADERDASH_API_URL")
                .global(true)
                .default_value(DEFAULT_API_BASE_URL),
        )
        .arg(
            Arg::new(ARG_TIMEOUT)
                .long("timeout")
                .help("Request timeout in seconds")
                .env("TRADERDASH_TIMEOUT")
                .global(true)
                .default_value("10")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}

fn with_storage_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_STATE_FILE)
                .long("state-file")
                .help("File holding the stored credentials")
                .env("TRADERDASH_STATE_FILE")
                .global(true)
                .default_value(DEFAULT_STATE_FILE),
        )
        .arg(
            Arg::new(ARG_STORAGE_NAMESPACE)
                .long("storage-namespace")
                .help("Prefix of the credential storage keys")
                .env("TRADERDASH_STORAGE_NAMESPACE")
                .global(true)
                .default_value(DEFAULT_STORAGE_NAMESPACE),
        )
        .arg(
            Arg::new(ARG_OBFUSCATION_KEY)
                .long("obfuscation-key")
                .help("Key used to obfuscate stored tokens (not encryption)")
                .env("TRADERDASH_OBFUSCATION_KEY")
                .global(true)
                .hide_env_values(true)
                .default_value(DEFAULT_OBFUSCATION_KEY),
        )
}

fn with_route_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_LOGIN_PATH)
                .long("login-path")
                .help("Route the guard redirects unauthenticated users to")
                .env("TRADERDASH_LOGIN_PATH")
                .global(true)
                .default_value(DEFAULT_LOGIN_PATH),
        )
        .arg(
            Arg::new(ARG_HOME_PATH)
                .long("home-path")
                .help("Route used after login when no origin was captured")
                .env("TRADERDASH_HOME_PATH")
                .global(true)
                .default_value(DEFAULT_HOME_PATH),
        )
}
