//! UX-only access guards. They decide what to render or where to navigate
//! from the current [`Session`](crate::session::Session); real access control
//! lives on the API.

pub mod role;
pub mod route;

pub use self::role::{DeniedView, RoleCheck, RoleDecision, RoleGuard};
pub use self::route::{GuardDecision, Location, RouteGuard};
