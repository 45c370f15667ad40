//! Background loops that run beside the event loop.

use std::sync::Arc;

use lightrelay_transport::Transport;
use tokio::time::MissedTickBehavior;

use crate::RelayEngine;

/// Sends the keepalive on every tick and re-registers with the balancer
/// when it has gone quiet.
///
/// Runs until the task is dropped.
pub async fn run_heartbeat<T: Transport>(engine: Arc<RelayEngine<T>>) {
    let mut interval = tokio::time::interval(engine.config().heartbeat_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        interval.tick().await;
        engine.heartbeat().await;

        let Some(balancer) = engine.balancer() else {
            continue;
        };
        if engine.take_balancer_silence(balancer.reregister_after()) {
            tracing::info!("no stats probe from load balancer, re-registering");
            let balancer = balancer.clone();
            tokio::spawn(async move {
                if let Err(e) = balancer.register().await {
                    tracing::warn!(error = %e, "re-registration failed");
                }
            });
        }
    }
}

/// Pushes room-list changes to the balancer and, when the node uses
/// balancer-issued room ids, keeps the id pool filled.
///
/// Several changes between two pushes collapse into one. Failures are
/// logged and dropped. Returns at once if the node has no balancer.
pub async fn run_balancer_sync<T: Transport>(engine: Arc<RelayEngine<T>>) {
    let Some(balancer) = engine.balancer().cloned() else {
        return;
    };
    let push = async {
        loop {
            engine.rooms_changed().await;
            if let Err(e) = balancer.notify_rooms_updated().await {
                tracing::debug!(error = %e, "room update not pushed to balancer");
            }
        }
    };
    if balancer.issues_room_ids() {
        tokio::join!(push, balancer.prefetch_room_ids());
    } else {
        push.await;
    }
}
