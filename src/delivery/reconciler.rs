//! Reconciliation task: drains the retry queue whenever the link comes back.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::pipeline::DeliveryPipeline;

/// Call [`DeliveryPipeline::on_reconnect`] on every offline→online transition.
///
/// When the link is already up at start, one drain runs immediately so a
/// backlog persisted by a previous run is not left waiting for a flap.
pub async fn run_reconciler(pipeline: Arc<DeliveryPipeline>, cancel: CancellationToken) {
    let mut online_rx = pipeline.connectivity().subscribe();
    let mut was_online = *online_rx.borrow_and_update();

    if was_online {
        drain(&pipeline, "startup").await;
    }

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            changed = online_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let online = *online_rx.borrow_and_update();
                if online && !was_online {
                    drain(&pipeline, "reconnect").await;
                }
                was_online = online;
            }
        }
    }
    debug!("Reconciler stopped");
}

async fn drain(pipeline: &DeliveryPipeline, trigger: &'static str) {
    let report = pipeline.on_reconnect().await;
    if report.attempted > 0 {
        info!(
            trigger,
            attempted = report.attempted,
            delivered = report.delivered,
            requeued = report.requeued,
            dropped = report.dropped,
            "Retry queue reconciled"
        );
    }
}
