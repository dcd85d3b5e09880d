// * Telemetry - JSON logging and the Prometheus exporter
// * Owns the two traffic gauges and the HTTP server scrapers pull them from

use prometheus::proto::MetricFamily;
use prometheus::{Encoder, Gauge, Registry, TextEncoder};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tokio::sync::oneshot;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogFormat;

pub const DOWNLOAD_METRIC: &str = "download_value_bytes";
pub const UPLOAD_METRIC: &str = "upload_value_bytes";
const METRIC_HELP: &str = "Value extracted from the webpage in bytes";

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Metric registry error: {0}")]
    Registry(#[from] prometheus::Error),

    #[error("Metrics server failed to bind: {0}")]
    Bind(#[from] hyper::Error),
}

/// Initializes the tracing subscriber
///
/// `RUST_LOG` wins over `level` when set.
///
/// # Example
/// ```ignore
/// use traffic_exporter::config::LogFormat;
/// use traffic_exporter::ops::telemetry;
///
/// telemetry::init_tracing("info", LogFormat::Json);
/// tracing::info!(url = "https://example.com", "Sampling");
/// ```
pub fn init_tracing(level: &str, format: LogFormat) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json())
            .init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().pretty())
            .init(),
    }
}

/// The download/upload gauge pair.
///
/// Both gauges are written under one lock and scrapes read under the same lock, so a scrape
/// never sees values from two different samples. Until the first [`GaugeState::publish`] the
/// exposition is empty, which Prometheus treats as "no data" rather than zero.
pub struct GaugeState {
    registry: Registry,
    download: Gauge,
    upload: Gauge,
    published: RwLock<bool>,
}

impl std::fmt::Debug for GaugeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GaugeState")
            .field("snapshot", &self.snapshot())
            .finish()
    }
}

impl GaugeState {
    pub fn new() -> Result<Self, TelemetryError> {
        let registry = Registry::new();
        let download = Gauge::new(DOWNLOAD_METRIC, METRIC_HELP)?;
        let upload = Gauge::new(UPLOAD_METRIC, METRIC_HELP)?;
        registry.register(Box::new(download.clone()))?;
        registry.register(Box::new(upload.clone()))?;

        Ok(Self {
            registry,
            download,
            upload,
            published: RwLock::new(false),
        })
    }

    /// Replaces both values in one step
    pub fn publish(&self, download: f64, upload: f64) {
        let mut published = self.published.write().unwrap_or_else(|e| e.into_inner());
        self.download.set(download);
        self.upload.set(upload);
        *published = true;
    }

    /// Last published `(download, upload)`, `None` before the first publish
    pub fn snapshot(&self) -> Option<(f64, f64)> {
        let published = self.published.read().unwrap_or_else(|e| e.into_inner());
        (*published).then(|| (self.download.get(), self.upload.get()))
    }

    pub fn gather(&self) -> Vec<MetricFamily> {
        let published = self.published.read().unwrap_or_else(|e| e.into_inner());
        if *published {
            self.registry.gather()
        } else {
            Vec::new()
        }
    }

    /// Text exposition format, as served on `/metrics`
    pub fn encode(&self) -> Result<String, TelemetryError> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

/// Metrics server handle for graceful shutdown
pub struct MetricsServerHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    running: Arc<AtomicBool>,
    local_addr: SocketAddr,
}

impl MetricsServerHandle {
    /// Signals the metrics server to shut down
    pub fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        self.running.store(false, Ordering::Relaxed);
    }

    /// Returns true if the server is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Address actually bound, useful when started on port 0
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

/// Starts the Prometheus metrics HTTP server on `0.0.0.0:port`
///
/// Must be called from within a tokio runtime. Fails only if the port cannot be bound.
pub fn start_metrics_server(
    port: u16,
    state: Arc<GaugeState>,
) -> Result<MetricsServerHandle, TelemetryError> {
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = running.clone();

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let builder = hyper::Server::try_bind(&addr)?;

    let make_svc = hyper::service::make_service_fn(move |_conn| {
        let state = state.clone();
        async move {
            Ok::<_, Infallible>(hyper::service::service_fn(move |req| {
                handle_metrics_request(req, state.clone())
            }))
        }
    });

    let server = builder.serve(make_svc);
    let local_addr = server.local_addr();
    let server = server.with_graceful_shutdown(async {
        let _ = shutdown_rx.await;
    });

    tokio::spawn(async move {
        tracing::info!(addr = %local_addr, "Metrics server started");

        if let Err(e) = server.await {
            tracing::error!(error = %e, "Metrics server error");
        }

        running_clone.store(false, Ordering::Relaxed);
        tracing::info!("Metrics server stopped");
    });

    Ok(MetricsServerHandle {
        shutdown_tx: Some(shutdown_tx),
        running,
        local_addr,
    })
}

/// Handles incoming HTTP requests to the metrics endpoint
async fn handle_metrics_request(
    req: hyper::Request<hyper::Body>,
    state: Arc<GaugeState>,
) -> Result<hyper::Response<hyper::Body>, Infallible> {
    let response = match req.uri().path() {
        "/metrics" => match state.encode() {
            Ok(body) => {
                let mut response = text_response(hyper::StatusCode::OK, body);
                response.headers_mut().insert(
                    hyper::header::CONTENT_TYPE,
                    hyper::header::HeaderValue::from_static(prometheus::TEXT_FORMAT),
                );
                response
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode metrics");
                text_response(hyper::StatusCode::INTERNAL_SERVER_ERROR, "Encoding failed")
            }
        },
        "/health" => text_response(hyper::StatusCode::OK, "OK"),
        "/ready" => text_response(hyper::StatusCode::OK, "READY"),
        _ => text_response(hyper::StatusCode::NOT_FOUND, "Not Found"),
    };
    Ok(response)
}

fn text_response(
    status: hyper::StatusCode,
    body: impl Into<hyper::Body>,
) -> hyper::Response<hyper::Body> {
    let mut response = hyper::Response::new(body.into());
    *response.status_mut() = status;
    response
}
