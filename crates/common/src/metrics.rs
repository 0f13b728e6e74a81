use std::net::SocketAddr;

use axum::{
    body::Body,
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
};
use eyre::bail;
use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec_with_registry, register_int_counter_vec_with_registry,
    register_int_counter_with_registry, register_int_gauge_vec_with_registry, Encoder,
    HistogramTimer, HistogramVec, IntCounter, IntCounterVec, IntGaugeVec, Registry, TextEncoder,
};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

const DEFAULT_METRICS_PORT: u16 = 9500;

/// Spawns the metrics server on `METRICS_PORT`, default 9500.
pub fn start_metrics_server() {
    let port = match std::env::var("METRICS_PORT") {
        Ok(port) => port.parse().unwrap_or_else(|_| {
            warn!(%port, "invalid METRICS_PORT, using default");
            DEFAULT_METRICS_PORT
        }),
        Err(_) => DEFAULT_METRICS_PORT,
    };

    crate::task::spawn(file!(), line!(), async move {
        if let Err(err) = MetricsProvider::new(port).run().await {
            error!(%err, "metrics server failed");
        }
    });
}

pub struct MetricsProvider {
    port: u16,
}

impl MetricsProvider {
    pub fn new(port: u16) -> Self {
        MetricsProvider { port }
    }

    pub async fn run(self) -> eyre::Result<()> {
        info!("starting metrics server on port {}", self.port);

        let router = axum::Router::new()
            .route("/metrics", get(handle_metrics))
            .route("/status", get(|| async { StatusCode::OK }));
        let address = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(&address).await?;

        axum::serve(listener, router).await?;

        bail!("metrics server stopped")
    }
}

async fn handle_metrics() -> Response {
    match prepare_metrics() {
        Ok(response) => response,
        Err(err) => {
            error!(?err, "failed to prepare metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn prepare_metrics() -> Result<Response, MetricsError> {
    let metrics = CRUCIBLE_METRICS_REGISTRY.gather();
    let encoder = TextEncoder::new();
    let s = encoder.encode_to_string(&metrics)?;

    Response::builder()
        .status(200)
        .header(CONTENT_TYPE, encoder.format_type())
        .body(Body::from(s))
        .map_err(MetricsError::FailedBody)
}

#[derive(Debug, thiserror::Error)]
enum MetricsError {
    #[error("failed encoding metrics {0}")]
    FailedEncoding(#[from] prometheus::Error),

    #[error("failed encoding body {0}")]
    FailedBody(#[from] axum::http::Error),
}

lazy_static! {
    pub static ref CRUCIBLE_METRICS_REGISTRY: Registry =
        Registry::new_custom(Some("crucible".to_string()), None).unwrap();

    //////////////// TASKS ////////////////
    pub static ref TASK_COUNT: IntGaugeVec = register_int_gauge_vec_with_registry!(
        "task_count",
        "Running tasks by spawn site",
        &["label"],
        &CRUCIBLE_METRICS_REGISTRY
    )
    .unwrap();

    //////////////// SCHEDULER ////////////////
    static ref SLOT_CYCLES: IntCounterVec = register_int_counter_vec_with_registry!(
        "slot_cycles_total",
        "Count of slot cycles by outcome",
        &["outcome"],
        &CRUCIBLE_METRICS_REGISTRY
    )
    .unwrap();

    static ref RATE_LIMITED: IntCounter = register_int_counter_with_registry!(
        "rate_limited_total",
        "Count of payload attribute events denied by the rate limiter",
        &CRUCIBLE_METRICS_REGISTRY
    )
    .unwrap();

    //////////////// ALGORITHMS ////////////////
    static ref ALGO_RESULTS: IntCounterVec = register_int_counter_vec_with_registry!(
        "algo_results_total",
        "Count of algorithm results by outcome",
        &["algo", "outcome"],
        &CRUCIBLE_METRICS_REGISTRY
    )
    .unwrap();

    static ref ALGO_LATENCY: HistogramVec = register_histogram_vec_with_registry!(
        "algo_latency_secs",
        "Time spent selecting bundles",
        &["algo"],
        vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0],
        &CRUCIBLE_METRICS_REGISTRY
    )
    .unwrap();

    static ref SIMULATIONS: IntCounterVec = register_int_counter_vec_with_registry!(
        "simulations_total",
        "Count of bundle simulations",
        &["is_success"],
        &CRUCIBLE_METRICS_REGISTRY
    )
    .unwrap();

    //////////////// RELAYS ////////////////
    static ref RELAY_SUBMISSIONS: IntCounterVec = register_int_counter_vec_with_registry!(
        "relay_submissions_total",
        "Count of relay submissions by status",
        &["relay", "status"],
        &CRUCIBLE_METRICS_REGISTRY
    )
    .unwrap();

    static ref RELAY_LATENCY: HistogramVec = register_histogram_vec_with_registry!(
        "relay_latency_secs",
        "Latency of relay submissions",
        &["relay"],
        vec![0.0005, 0.001, 0.0025, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0],
        &CRUCIBLE_METRICS_REGISTRY
    )
    .unwrap();
}

pub struct SchedulerMetrics;

impl SchedulerMetrics {
    pub fn cycle(outcome: &str) {
        SLOT_CYCLES.with_label_values(&[outcome]).inc();
    }

    pub fn rate_limited() {
        RATE_LIMITED.inc();
    }
}

pub struct AlgoMetrics;

impl AlgoMetrics {
    /// Records on drop
    pub fn timer(algo: &str) -> HistogramTimer {
        ALGO_LATENCY.with_label_values(&[algo]).start_timer()
    }

    pub fn result(algo: &str, outcome: &str) {
        ALGO_RESULTS.with_label_values(&[algo, outcome]).inc();
    }

    pub fn simulation(is_success: bool) {
        SIMULATIONS.with_label_values(&[is_success.to_string().as_str()]).inc();
    }
}

pub struct RelayMetrics;

impl RelayMetrics {
    /// Records on drop
    pub fn timer(relay: &str) -> HistogramTimer {
        RELAY_LATENCY.with_label_values(&[relay]).start_timer()
    }

    pub fn submission(relay: &str, status: &str) {
        RELAY_SUBMISSIONS.with_label_values(&[relay, status]).inc();
    }
}
