use crate::{
    cli::{
        actions::{open_session, print_json},
        globals::GlobalArgs,
    },
    guards::{
        role::{ACCESS_DENIED_MESSAGE, ACCESS_DENIED_TITLE},
        DeniedView, GuardDecision, Location, RoleDecision, RoleGuard, RouteGuard,
    },
    session::Session,
};
use anyhow::Result;
use serde::Serialize;

#[derive(Debug)]
pub struct Args {
    pub globals: GlobalArgs,
    pub path: String,
    pub public: bool,
    pub from: Option<String>,
    pub roles: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct AccessReport {
    pub path: String,
    pub authenticated: bool,
    pub route: GuardDecision,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<RoleDecision>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

/// Evaluate both guards for `args.path` against `session`.
#[must_use]
pub fn evaluate(args: &Args, session: &Session) -> AccessReport {
    let guard = RouteGuard::new(&args.globals.login_path, &args.globals.home_path);

    let mut location = Location::new(&args.path);
    if let Some(from) = &args.from {
        location = location.with_from(Location::new(from));
    }

    let route = guard.decide(!args.public, session, &location);

    // Role checks only apply to content the route guard would render.
    let role = (!args.roles.is_empty() && route == GuardDecision::Render)
        .then(|| RoleGuard::new(args.roles.iter().cloned()).decide(session));

    let notice = match &role {
        Some(RoleDecision::Denied {
            view: DeniedView::Notice,
        }) => Some(format!("{ACCESS_DENIED_TITLE}: {ACCESS_DENIED_MESSAGE}")),
        _ => None,
    };

    AccessReport {
        path: args.path.clone(),
        authenticated: session.is_authenticated,
        route,
        role,
        notice,
    }
}

/// # Errors
/// Returns an error if the configuration is invalid.
pub async fn execute(args: Args) -> Result<()> {
    let (_, controller) = open_session(&args.globals)?;
    controller.bootstrap().await;

    print_json(&evaluate(&args, &controller.session()))
}
