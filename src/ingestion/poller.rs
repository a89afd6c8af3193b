use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::sleep;

use super::feed::FeedClient;
use crate::services::orchestrator::Orchestrator;

/// Fixed-interval REST polling. Runs alongside the stream for the whole
/// process lifetime; both paths funnel into the same idempotent insert.
///
/// The interval is re-read from runtime settings every tick.
pub async fn run_poller(
    orchestrator: Arc<Orchestrator>,
    client: FeedClient,
    mut shutdown: watch::Receiver<bool>,
) {
    tracing::info!(
        interval_secs = orchestrator.settings().poll_interval_secs,
        "Feed poller started"
    );

    loop {
        let delay = orchestrator.settings().poll_interval();

        tokio::select! {
            _ = sleep(delay) => {}
            _ = shutdown.changed() => break,
        }

        let fetched = tokio::select! {
            outcomes = client.fetch_recent() => outcomes,
            _ = shutdown.changed() => break,
        };

        if fetched.is_empty() {
            tracing::debug!("Feed poll returned no outcomes");
            continue;
        }

        if let Some(report) = orchestrator.ingest_snapshot(fetched).await {
            tracing::info!(
                id = %report.outcome_id,
                signals = report.new_signals.len(),
                "New outcome detected via poller"
            );
        }
    }

    tracing::info!("Feed poller stopped");
}
