//! Metrics and tracing setup for the book service.
//!
//! Provides a global [`ServiceMetrics`] singleton backed by the `prometheus`
//! crate, plus an optional lightweight HTTP server for Prometheus scraping.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::net::SocketAddr;
use std::sync::OnceLock;

// ────────────────────────── Tracing ──────────────────────────

/// Initialize the tracing subscriber with env-filter.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    // A second call (e.g. from tests) keeps the first subscriber.
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

// ────────────────────────── Prometheus metrics ──────────────────────────

/// Global metrics instance.
static METRICS: OnceLock<ServiceMetrics> = OnceLock::new();

/// Retrieve (or lazily create) the global metrics singleton.
pub fn metrics() -> &'static ServiceMetrics {
    METRICS.get_or_init(ServiceMetrics::new)
}

/// All Prometheus metrics for a book service process.
pub struct ServiceMetrics {
    pub registry: Registry,

    // ── Server side ──
    pub rpcs_received: IntCounter,
    pub rpcs_received_by_type: IntCounterVec,
    /// Domain outcomes by `op` and `outcome` (ok, not_found, busy, interrupted).
    pub outcomes: IntCounterVec,
    /// Entries left out of a listing because their lock was contended.
    pub list_skipped: IntCounter,
    /// Live books in the store.
    pub books: IntGauge,

    // ── Client side ──
    pub rpcs_sent_by_type: IntCounterVec,
    pub client_retries: IntCounterVec,

    // ── Latency ──
    pub rpc_latency_secs: HistogramVec,
}

// Manual Debug impl because prometheus types don't derive Debug.
impl std::fmt::Debug for ServiceMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceMetrics").finish_non_exhaustive()
    }
}

/// Histogram buckets (seconds). The upper buckets cover the default lock
/// budget (5 s) and the client's cumulative backoff.
const LATENCY_BUCKETS: &[f64] = &[0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0];

impl ServiceMetrics {
    fn new() -> Self {
        let registry = Registry::new();

        let rpcs_received = IntCounter::with_opts(Opts::new(
            "bookstore_rpcs_received_total",
            "Total inbound RPCs received",
        ))
        .expect("rpcs_received counter");
        let rpcs_received_by_type = IntCounterVec::new(
            Opts::new(
                "bookstore_rpcs_received_by_type_total",
                "Inbound RPCs received, by type",
            ),
            &["rpc_type"],
        )
        .expect("rpcs_received_by_type counter vec");
        let outcomes = IntCounterVec::new(
            Opts::new(
                "bookstore_outcomes_total",
                "Store operation outcomes, by operation and outcome",
            ),
            &["op", "outcome"],
        )
        .expect("outcomes counter vec");
        let list_skipped = IntCounter::with_opts(Opts::new(
            "bookstore_list_skipped_total",
            "Books left out of a listing because they were locked",
        ))
        .expect("list_skipped counter");
        let books = IntGauge::with_opts(Opts::new("bookstore_books", "Books currently stored"))
            .expect("books gauge");

        let rpcs_sent_by_type = IntCounterVec::new(
            Opts::new(
                "bookstore_rpcs_sent_by_type_total",
                "Outbound RPC attempts, by type",
            ),
            &["rpc_type"],
        )
        .expect("rpcs_sent_by_type counter vec");
        let client_retries = IntCounterVec::new(
            Opts::new(
                "bookstore_client_retries_total",
                "Client retries after a retryable failure, by type",
            ),
            &["rpc_type"],
        )
        .expect("client_retries counter vec");

        let rpc_latency_secs = HistogramVec::new(
            HistogramOpts::new("bookstore_rpc_latency_seconds", "RPC latency in seconds")
                .buckets(LATENCY_BUCKETS.to_vec()),
            &["rpc_type", "direction"],
        )
        .expect("rpc_latency_secs histogram");

        // Register all metrics
        registry
            .register(Box::new(rpcs_received.clone()))
            .expect("register rpcs_received");
        registry
            .register(Box::new(rpcs_received_by_type.clone()))
            .expect("register rpcs_received_by_type");
        registry
            .register(Box::new(outcomes.clone()))
            .expect("register outcomes");
        registry
            .register(Box::new(list_skipped.clone()))
            .expect("register list_skipped");
        registry
            .register(Box::new(books.clone()))
            .expect("register books");
        registry
            .register(Box::new(rpcs_sent_by_type.clone()))
            .expect("register rpcs_sent_by_type");
        registry
            .register(Box::new(client_retries.clone()))
            .expect("register client_retries");
        registry
            .register(Box::new(rpc_latency_secs.clone()))
            .expect("register rpc_latency_secs");

        Self {
            registry,
            rpcs_received,
            rpcs_received_by_type,
            outcomes,
            list_skipped,
            books,
            rpcs_sent_by_type,
            client_retries,
            rpc_latency_secs,
        }
    }
}

/// Encode all registered metrics in Prometheus text exposition format.
pub fn encode_metrics() -> String {
    let m = metrics();
    let encoder = TextEncoder::new();
    let mut buf = Vec::new();
    if let Err(e) = encoder.encode(&m.registry.gather(), &mut buf) {
        tracing::warn!("prometheus text encoding failed: {}", e);
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// Helper: count an inbound RPC and start its latency timer. Returns a
/// guard that records elapsed time on drop.
pub fn inbound_rpc(rpc_type: &str) -> prometheus::HistogramTimer {
    let m = metrics();
    m.rpcs_received.inc();
    m.rpcs_received_by_type.with_label_values(&[rpc_type]).inc();
    start_rpc_timer(rpc_type, "inbound")
}

/// Helper: count one outbound attempt and start its latency timer.
pub fn outbound_rpc(rpc_type: &str) -> prometheus::HistogramTimer {
    metrics()
        .rpcs_sent_by_type
        .with_label_values(&[rpc_type])
        .inc();
    start_rpc_timer(rpc_type, "outbound")
}

/// Helper: start an RPC latency timer.
pub fn start_rpc_timer(rpc_type: &str, direction: &str) -> prometheus::HistogramTimer {
    metrics()
        .rpc_latency_secs
        .with_label_values(&[rpc_type, direction])
        .start_timer()
}

/// Helper: record a store operation outcome.
pub fn record_outcome(op: &str, outcome: &str) {
    metrics().outcomes.with_label_values(&[op, outcome]).inc();
}

// ────────────────────────── Metrics HTTP server ──────────────────────────

use bytes::Bytes;
use http_body_util::Full;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

async fn metrics_handler(
    req: Request<hyper::body::Incoming>,
) -> Result<Response<Full<Bytes>>, hyper::http::Error> {
    if req.uri().path() != "/metrics" {
        return Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Full::new(Bytes::from_static(b"not found\n")));
    }
    let body = encode_metrics();
    Response::builder()
        .status(StatusCode::OK)
        .header("content-type", "text/plain; version=0.0.4; charset=utf-8")
        .body(Full::new(Bytes::from(body)))
}

/// Serve Prometheus metrics on the given address (`GET /metrics`).
///
/// This spawns a lightweight HTTP/1.1 server. Call from a `tokio::spawn`.
pub async fn serve_metrics(
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("metrics server listening on http://{}/metrics", addr);

    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);
        tokio::spawn(async move {
            if let Err(e) = http1::Builder::new()
                .serve_connection(io, service_fn(metrics_handler))
                .await
            {
                tracing::debug!("metrics connection error: {}", e);
            }
        });
    }
}

// ────────────────────────── Tests ──────────────────────────
