use std::sync::Arc;

use tokio::time::{Instant, MissedTickBehavior};

use crate::{LoadBalancer, NodeProbe};

/// Runs [`LoadBalancer::check_nodes`] every `ping_rate` until the task is
/// dropped. The first sweep happens one interval after start.
pub async fn run_health_checks<P: NodeProbe>(balancer: Arc<LoadBalancer<P>>) {
    let period = balancer.config().ping_rate;
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        interval.tick().await;
        let evicted = balancer.check_nodes().await;
        if evicted > 0 {
            let remaining = balancer.node_count().await;
            tracing::info!(
                evicted,
                remaining,
                "health check evicted nodes"
            );
        }
    }
}
