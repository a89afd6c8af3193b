use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus exporter and register all application metrics.
/// Returns a `PrometheusHandle` whose `render()` method produces the
/// text/plain Prometheus scrape payload.
pub fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    // Pre-register counters so they appear even before the first increment.
    counter!("outcomes_ingested_total").absolute(0);
    counter!("outcomes_duplicate_total").absolute(0);
    counter!("feed_reconnects_total").absolute(0);
    counter!("signals_verified_total", "result" => "WIN").absolute(0);
    counter!("signals_verified_total", "result" => "LOSS").absolute(0);

    gauge!("feed_degraded").set(0.0);
    gauge!("ws_clients").set(0.0);

    // Histogram is lazily created on first record; force creation.
    histogram!("pipeline_latency_seconds").record(0.0);

    Ok(handle)
}
