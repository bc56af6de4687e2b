//! Background deletion of expired and consumed confirmation tokens.

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::{App, Backend, EmailSender};

/// Run one purge pass using the configured retention.
pub async fn sweep_once<B: Backend, E: EmailSender>(app: &App<B, E>) -> u64 {
    match app.confirmation().purge_stale(app.config().token_retention).await {
        Ok(removed) => {
            if removed > 0 {
                tracing::info!(removed, "purged stale confirmation tokens");
            }
            removed
        }
        Err(e) => {
            tracing::warn!(error = %e, "token purge failed");
            0
        }
    }
}

/// Spawn the sweeper on the current runtime.
///
/// Returns `None` when `token_sweep_interval` is zero. The first pass runs
/// immediately.
pub fn sweeper_spawn<B: Backend, E: EmailSender>(app: App<B, E>) -> Option<JoinHandle<()>> {
    let interval = app.config().token_sweep_interval;
    if interval == Duration::ZERO {
        tracing::info!("token sweeper disabled");
        return None;
    }

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            sweep_once(&app).await;
        }
    }))
}
