//! Pending room sweeper.
//!
//! A room created over HTTP has no participants until its first join, and
//! the registry only deletes rooms when their last participant leaves. This
//! task deletes rooms that are still unjoined after `pending_room_ttl`.
//!
//! The task exits when its cancellation token is cancelled.

use crate::registry::RegistryHandle;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Start the pending room sweeper.
///
/// Checks every `interval` and deletes rooms nobody has joined within
/// `max_age` of their creation. Returns when `cancel_token` is cancelled.
#[instrument(skip_all, name = "room.task.pending_room_sweeper")]
pub async fn start_pending_room_sweeper(
    registry: RegistryHandle,
    interval: Duration,
    max_age: Duration,
    cancel_token: CancellationToken,
) {
    info!(
        target: "room.task.pending_room_sweeper",
        interval_seconds = interval.as_secs(),
        max_age_seconds = max_age.as_secs(),
        "Starting pending room sweeper"
    );

    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                run_sweep(&registry, max_age).await;
            }
            () = cancel_token.cancelled() => {
                info!(
                    target: "room.task.pending_room_sweeper",
                    "Pending room sweeper received shutdown signal, exiting"
                );
                break;
            }
        }
    }
}

/// Run a single sweep.
pub(crate) async fn run_sweep(registry: &RegistryHandle, max_age: Duration) {
    match registry.sweep_pending_rooms(max_age).await {
        Ok(0) => {
            debug!(target: "room.task.pending_room_sweeper", "No pending rooms expired");
        }
        Ok(count) => {
            info!(
                target: "room.task.pending_room_sweeper",
                deleted_count = count,
                "Deleted expired pending rooms"
            );
        }
        Err(e) => {
            warn!(
                target: "room.task.pending_room_sweeper",
                error = %e,
                "Pending room sweep failed"
            );
        }
    }
}
