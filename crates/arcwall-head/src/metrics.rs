use axum::{response::IntoResponse, routing::get, Router};
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

/// A container for all Prometheus metric collectors for the head process.
///
/// Wrapped in an `Arc` and shared across the frame loop and the metrics
/// server task.
pub struct HeadMetrics {
    pub registry: Registry,
    /// Total number of frames started by the frame loop.
    pub frames_total: IntCounter,
    /// Number of remote nodes included in the launch plan.
    pub nodes_launched: IntGauge,
    /// Number of tiles enabled after topology build.
    pub tiles_enabled: IntGauge,
}

impl HeadMetrics {
    pub fn new() -> Self {
        let registry = Registry::new_custom(Some("arcwall_head".into()), None)
            .expect("Failed to create custom metrics registry");

        macro_rules! reg {
            ($metric:expr) => {{
                let collector = $metric;
                registry
                    .register(Box::new(collector.clone()))
                    .expect("Failed to register metric");
                collector
            }};
        }

        Self {
            frames_total: reg!(IntCounter::new(
                "frames_total",
                "Total number of frames started by the frame loop"
            )
            .unwrap()),
            nodes_launched: reg!(IntGauge::new(
                "nodes_launched",
                "Number of remote nodes in the launch plan"
            )
            .unwrap()),
            tiles_enabled: reg!(IntGauge::new(
                "tiles_enabled",
                "Number of tiles enabled after topology build"
            )
            .unwrap()),
            registry,
        }
    }

    /// Creates an `axum::Router` serving the metrics on `/metrics`.
    pub fn router(&self) -> Router {
        let registry = self.registry.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let registry = registry.clone();
                async move {
                    let metric_families = registry.gather();
                    let mut buffer = Vec::new();
                    let encoder = TextEncoder::new();
                    encoder
                        .encode(&metric_families, &mut buffer)
                        .expect("Failed to encode metrics");
                    String::from_utf8(buffer)
                        .expect("Metrics buffer is not valid UTF-8")
                        .into_response()
                }
            }),
        )
    }
}
