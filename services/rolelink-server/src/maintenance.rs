use rolelink_oauth2::OAuthStateStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Periodically drop expired authorization states.
pub fn spawn_state_purger(states: Arc<dyn OAuthStateStore>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            match states.purge_expired().await {
                Ok(0) => {}
                Ok(purged) => debug!(purged, "Purged expired authorization states"),
                Err(e) => warn!("Failed to purge authorization states: {}", e),
            }
        }
    })
}
