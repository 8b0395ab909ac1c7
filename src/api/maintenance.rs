//! Background retention sweep over `login_history`.

use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info};

use crate::auth::{AuthResult, LoginHistoryLog};

/// Run one retention pass.
///
/// # Errors
/// Propagates validation and store errors from the purge.
pub async fn sweep_once(log: &LoginHistoryLog, retention_days: i64) -> AuthResult<u64> {
    let deleted = log.purge(retention_days).await?;
    if deleted > 0 {
        info!(deleted, retention_days, "purged old login history");
    }
    Ok(deleted)
}

pub fn spawn_history_sweeper(
    log: LoginHistoryLog,
    retention_days: i64,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let interval = if interval.is_zero() {
            Duration::from_secs(1)
        } else {
            interval
        };

        loop {
            if let Err(err) = sweep_once(&log, retention_days).await {
                error!("login history sweep failed: {err}");
            }

            sleep(interval).await;
        }
    })
}
