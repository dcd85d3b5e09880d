use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use traffic_exporter::engine::sampler::{CycleFailure, CycleResult, Direction, SamplingLoop};
use traffic_exporter::network::{FetchError, RawSample, SampleFetcher};
use traffic_exporter::ops::{AlertSink, GaugeState};

// * Test Suite for the sampling loop, with scripted fetches and a recording alert sink

const TARGET: &str = "https://tracker.example/";
const INTERVAL: Duration = Duration::from_secs(3600);

#[derive(Default)]
struct ScriptedFetcher {
    script: Mutex<VecDeque<Result<RawSample, FetchError>>>,
    calls: AtomicUsize,
}

impl ScriptedFetcher {
    fn new(script: Vec<Result<RawSample, FetchError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SampleFetcher for ScriptedFetcher {
    async fn fetch_raw_sample(&self) -> Result<RawSample, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(FetchError::Navigation("script exhausted".into())))
    }
}

// * Same answer forever, for timing tests
struct FixedFetcher {
    sample: Option<RawSample>,
    calls: AtomicUsize,
}

#[async_trait]
impl SampleFetcher for FixedFetcher {
    async fn fetch_raw_sample(&self) -> Result<RawSample, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.sample
            .clone()
            .ok_or_else(|| FetchError::Timeout(60_000))
    }
}

#[derive(Default)]
struct RecordingAlerter {
    messages: Mutex<Vec<String>>,
}

impl RecordingAlerter {
    fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl AlertSink for RecordingAlerter {
    async fn notify(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

fn ok(download: &str, upload: &str) -> Result<RawSample, FetchError> {
    Ok(RawSample::new(download, upload))
}

fn fetch_err() -> Result<RawSample, FetchError> {
    Err(FetchError::MissingElement("#dl".into()))
}

fn harness(
    script: Vec<Result<RawSample, FetchError>>,
) -> (
    SamplingLoop<Arc<ScriptedFetcher>, Arc<RecordingAlerter>>,
    Arc<ScriptedFetcher>,
    Arc<RecordingAlerter>,
    Arc<GaugeState>,
) {
    let fetcher = ScriptedFetcher::new(script);
    let alerter = Arc::new(RecordingAlerter::default());
    let gauges = Arc::new(GaugeState::new().unwrap());
    let sampler = SamplingLoop::new(
        fetcher.clone(),
        alerter.clone(),
        gauges.clone(),
        INTERVAL,
        TARGET,
    );
    (sampler, fetcher, alerter, gauges)
}

#[tokio::test]
async fn test_success_publishes_pair_without_alert() {
    let (sampler, fetcher, alerter, gauges) = harness(vec![ok(" DL: 2 GiB", " UP: 512 MiB")]);

    let result = sampler.run_cycle().await;

    assert!(matches!(
        result,
        CycleResult::Success { download, upload }
            if download == 2.0 * 1024f64.powi(3) && upload == 512.0 * 1024f64.powi(2)
    ));
    assert_eq!(
        gauges.snapshot(),
        Some((2.0 * 1024f64.powi(3), 512.0 * 1024f64.powi(2)))
    );
    assert!(alerter.messages().is_empty());
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test]
async fn test_unparsable_value_leaves_gauges_and_alerts_once() {
    let (sampler, _fetcher, alerter, gauges) =
        harness(vec![ok("1 KiB", "2 KiB"), ok("3 KiB", "lots")]);

    assert!(sampler.run_cycle().await.is_success());
    let result = sampler.run_cycle().await;

    assert!(matches!(
        result,
        CycleResult::Failure(CycleFailure::Parse {
            direction: Direction::Upload,
            ..
        })
    ));
    // * The parsable download of the failing cycle is not published either
    assert_eq!(gauges.snapshot(), Some((1024.0, 2048.0)));
    assert_eq!(
        alerter.messages(),
        vec![format!("Error extracting data for {}", TARGET)]
    );
}

#[tokio::test]
async fn test_both_values_unparsable_alerts_once() {
    let (sampler, _fetcher, alerter, gauges) = harness(vec![ok("5 XB", "")]);

    assert!(!sampler.run_cycle().await.is_success());
    assert_eq!(gauges.snapshot(), None);
    assert_eq!(alerter.messages().len(), 1);
}

#[tokio::test]
async fn test_overflowing_value_leaves_gauges_and_alerts_once() {
    let huge = format!("{} TiB", "9".repeat(400));
    let (sampler, _fetcher, alerter, gauges) =
        harness(vec![ok("1 KiB", "2 KiB"), ok(&huge, "1 KiB")]);

    assert!(sampler.run_cycle().await.is_success());
    let result = sampler.run_cycle().await;

    assert!(matches!(
        result,
        CycleResult::Failure(CycleFailure::Parse {
            direction: Direction::Download,
            ..
        })
    ));
    assert_eq!(gauges.snapshot(), Some((1024.0, 2048.0)));
    assert!(!gauges.encode().unwrap().contains("Inf"));
    assert_eq!(
        alerter.messages(),
        vec![format!("Error extracting data for {}", TARGET)]
    );
}

#[tokio::test]
async fn test_fetch_error_leaves_gauges_and_alerts_once() {
    let (sampler, _fetcher, alerter, gauges) = harness(vec![fetch_err()]);

    let result = sampler.run_cycle().await;

    assert!(matches!(
        result,
        CycleResult::Failure(CycleFailure::Fetch(FetchError::MissingElement(_)))
    ));
    assert_eq!(gauges.snapshot(), None);
    assert!(gauges.encode().unwrap().is_empty());
    assert_eq!(
        alerter.messages(),
        vec![format!("Error fetching data for {}", TARGET)]
    );
}

#[tokio::test]
async fn test_stale_values_survive_failures() {
    let (sampler, _fetcher, alerter, gauges) = harness(vec![
        ok("1 B", "2 B"),
        fetch_err(),
        ok("3 B", "4 B"),
        ok("5 B", "?"),
        fetch_err(),
        ok("6 B", "7 B"),
    ]);

    let expected = [
        Some((1.0, 2.0)),
        Some((1.0, 2.0)),
        Some((3.0, 4.0)),
        Some((3.0, 4.0)),
        Some((3.0, 4.0)),
        Some((6.0, 7.0)),
    ];
    for want in expected {
        sampler.run_cycle().await;
        assert_eq!(gauges.snapshot(), want);
    }

    assert_eq!(alerter.messages().len(), 3);
    assert_eq!(sampler.cycles(), 6);
}

#[tokio::test(start_paused = true)]
async fn test_run_fires_immediately_then_every_interval() {
    let fetcher = Arc::new(FixedFetcher {
        sample: Some(RawSample::new("1 GiB", "1 TiB")),
        calls: AtomicUsize::new(0),
    });
    let alerter = Arc::new(RecordingAlerter::default());
    let gauges = Arc::new(GaugeState::new().unwrap());
    let sampler = SamplingLoop::new(
        fetcher.clone(),
        alerter.clone(),
        gauges.clone(),
        INTERVAL,
        TARGET,
    );

    // * Cycles at t=0, 1h and 2h fit before the deadline
    let outcome = tokio::time::timeout(INTERVAL * 2 + Duration::from_secs(1), sampler.run()).await;

    assert!(outcome.is_err(), "run() must never return");
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 3);
    assert!(alerter.messages().is_empty());
    assert!(gauges.snapshot().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_failing_cycles_use_same_interval() {
    let fetcher = Arc::new(FixedFetcher {
        sample: None,
        calls: AtomicUsize::new(0),
    });
    let alerter = Arc::new(RecordingAlerter::default());
    let gauges = Arc::new(GaugeState::new().unwrap());
    let sampler = SamplingLoop::new(
        fetcher.clone(),
        alerter.clone(),
        gauges.clone(),
        INTERVAL,
        TARGET,
    );

    let outcome = tokio::time::timeout(INTERVAL * 2 + Duration::from_secs(1), sampler.run()).await;

    assert!(outcome.is_err());
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 3);
    assert_eq!(alerter.messages().len(), 3);
    assert_eq!(gauges.snapshot(), None);
}

#[tokio::test(start_paused = true)]
async fn test_run_until_stops_on_signal() {
    let (sampler, fetcher, _alerter, _gauges) = harness(vec![ok("1 B", "2 B")]);

    let signal = async {
        tokio::time::sleep(Duration::from_secs(10)).await;
        Ok(())
    };
    tokio::time::timeout(INTERVAL, sampler.run_until(signal))
        .await
        .expect("loop should stop when the signal fires");

    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_run_until_keeps_running_without_signal_handler() {
    let fetcher = Arc::new(FixedFetcher {
        sample: Some(RawSample::new("1 GiB", "1 GiB")),
        calls: AtomicUsize::new(0),
    });
    let alerter = Arc::new(RecordingAlerter::default());
    let gauges = Arc::new(GaugeState::new().unwrap());
    let sampler = SamplingLoop::new(fetcher.clone(), alerter, gauges, INTERVAL, TARGET);

    let broken = async { Err(std::io::Error::new(std::io::ErrorKind::Other, "no signals")) };
    let outcome =
        tokio::time::timeout(INTERVAL * 2 + Duration::from_secs(1), sampler.run_until(broken)).await;

    // * Same cadence as run(): no extra fetch when the signal setup fails
    assert!(outcome.is_err());
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 3);
}
