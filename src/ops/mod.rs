// * Operations: logging, the Prometheus exporter and failure alerts

pub mod alerting;
pub mod telemetry;

// * Re-exports for convenient access
pub use alerting::{AlertDeliveryError, AlertSink, LoggingAlerter, TelegramAlerter, TelegramConfig};
pub use telemetry::{
    init_tracing, start_metrics_server, GaugeState, MetricsServerHandle, TelemetryError,
    DOWNLOAD_METRIC, UPLOAD_METRIC,
};
