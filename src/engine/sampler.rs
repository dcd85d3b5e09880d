// * Sampling Loop - fetch, parse, publish or alert, sleep, forever
// * One cycle at a time; a failing cycle waits exactly as long as a good one

use std::fmt;
use std::future::Future;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::engine::size_parser::{parse_size, ParseError};
use crate::network::errors::FetchError;
use crate::network::fetcher::SampleFetcher;
use crate::ops::alerting::AlertSink;
use crate::ops::telemetry::GaugeState;

/// Which of the two totals a value belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Download,
    Upload,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Download => write!(f, "download"),
            Direction::Upload => write!(f, "upload"),
        }
    }
}

#[derive(Debug, Error)]
pub enum CycleFailure {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("{direction} value unreadable: {source}")]
    Parse {
        direction: Direction,
        #[source]
        source: ParseError,
    },
}

impl CycleFailure {
    /// One-line alert text naming the monitored site
    pub fn alert_message(&self, target: &str) -> String {
        match self {
            CycleFailure::Fetch(_) => format!("Error fetching data for {}", target),
            CycleFailure::Parse { .. } => format!("Error extracting data for {}", target),
        }
    }
}

/// Outcome of one cycle. Not kept past the cycle that produced it.
#[derive(Debug)]
pub enum CycleResult {
    Success { download: f64, upload: f64 },
    Failure(CycleFailure),
}

impl CycleResult {
    pub fn is_success(&self) -> bool {
        matches!(self, CycleResult::Success { .. })
    }
}

pub struct SamplingLoop<F, A> {
    fetcher: F,
    alerter: A,
    gauges: Arc<GaugeState>,
    interval: Duration,
    target: String,
    cycles: AtomicU64,
}

impl<F: SampleFetcher, A: AlertSink> SamplingLoop<F, A> {
    /// `target` identifies the monitored site in alerts, usually the landing page URL
    pub fn new(
        fetcher: F,
        alerter: A,
        gauges: Arc<GaugeState>,
        interval: Duration,
        target: impl Into<String>,
    ) -> Self {
        Self {
            fetcher,
            alerter,
            gauges,
            interval,
            target: target.into(),
            cycles: AtomicU64::new(0),
        }
    }

    /// Number of cycles started so far
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    /// Runs cycles forever. The first one starts immediately.
    pub async fn run(&self) {
        info!(
            target_url = %self.target,
            interval_secs = self.interval.as_secs(),
            "Sampling loop started"
        );
        loop {
            self.run_cycle().await;
            debug!(interval_secs = self.interval.as_secs(), "Sleeping until next cycle");
            tokio::time::sleep(self.interval).await;
        }
    }

    /// Runs cycles until `shutdown` resolves with `Ok`.
    ///
    /// A `shutdown` that fails (no signal handler available) is logged and then ignored, so the
    /// loop keeps running without cancelling the cycle in flight.
    pub async fn run_until<S>(&self, shutdown: S)
    where
        S: Future<Output = io::Result<()>>,
    {
        let shutdown = async {
            if let Err(e) = shutdown.await {
                warn!(error = %e, "Shutdown signal unavailable, running until killed");
                std::future::pending::<()>().await;
            }
        };

        tokio::select! {
            _ = self.run() => {}
            _ = shutdown => info!(cycles = self.cycles(), "Shutdown requested"),
        }
    }

    /// One fetch, parse and publish-or-alert pass
    pub async fn run_cycle(&self) -> CycleResult {
        let cycle = self.cycles.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(cycle, "Cycle started");

        match self.sample().await {
            Ok((download, upload)) => {
                self.gauges.publish(download, upload);
                info!(cycle, download, upload, "Published sample");
                CycleResult::Success { download, upload }
            }
            Err(failure) => {
                warn!(cycle, error = %failure, "Cycle failed, keeping previous values");
                self.alerter
                    .notify(&failure.alert_message(&self.target))
                    .await;
                CycleResult::Failure(failure)
            }
        }
    }

    async fn sample(&self) -> Result<(f64, f64), CycleFailure> {
        let raw = self.fetcher.fetch_raw_sample().await?;

        let download = parse_logged(Direction::Download, &raw.download);
        let upload = parse_logged(Direction::Upload, &raw.upload);

        Ok((download?, upload?))
    }
}

// * Both directions are parsed and logged even when the first one fails
fn parse_logged(direction: Direction, raw: &str) -> Result<f64, CycleFailure> {
    match parse_size(raw) {
        Ok(bytes) => {
            info!(%direction, bytes, "Value extracted");
            Ok(bytes)
        }
        Err(source) => {
            warn!(%direction, raw, error = %source, "Value not parsable");
            Err(CycleFailure::Parse { direction, source })
        }
    }
}
