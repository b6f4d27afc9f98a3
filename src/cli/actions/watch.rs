use crate::{
    cli::{actions::open_session, globals::GlobalArgs},
    session::{spawn_expiry_monitor, AuthPhase},
};
use anyhow::{bail, Result};
use tracing::{debug, info};

/// Restore the session and keep it alive until Ctrl-C or until it ends.
/// # Errors
/// Returns an error if there is no session to restore.
pub async fn execute(globals: &GlobalArgs) -> Result<()> {
    let (config, controller) = open_session(globals)?;
    controller.bootstrap().await;

    if !controller.session().is_authenticated {
        bail!("Not logged in");
    }

    let monitor = spawn_expiry_monitor(&controller, config.warning_threshold_minutes);
    let mut sessions = controller.subscribe();

    println!(
        "Watching session ({:?}), press Ctrl-C to stop",
        controller.store().scheduler().state()
    );

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, leaving stored credentials in place");
                break;
            }
            changed = sessions.changed() => {
                if changed.is_err() {
                    break;
                }

                let session = sessions.borrow_and_update().clone();
                debug!("session phase is now {:?}", session.phase);

                if session.phase == AuthPhase::Unauthenticated {
                    monitor.abort();
                    bail!("Session ended, log in again");
                }
            }
        }
    }

    monitor.abort();
    Ok(())
}
