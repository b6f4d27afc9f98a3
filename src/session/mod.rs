//! Session and token lifecycle: durable credentials, the deferred refresh
//! timer and the controller that ties them to the backend.

pub mod clock;
pub mod controller;
pub mod obfuscation;
pub mod scheduler;
pub mod status;
pub mod storage;
pub mod store;
pub mod types;

pub use self::controller::{AuthPhase, Session, SessionController};
pub use self::scheduler::{RefreshScheduler, ScheduleState};
pub use self::status::{spawn_expiry_monitor, TokenStatus};
pub use self::store::{TokenRecord, TokenStore};
pub use self::types::{LoginCredentials, PrimaryRole, User, UserSettings};
