use clap::Parser;
use std::sync::Arc;

use traffic_exporter::config::Settings;
use traffic_exporter::engine::SamplingLoop;
use traffic_exporter::network::BrowserFetcher;
use traffic_exporter::ops::{
    init_tracing, start_metrics_server, AlertSink, GaugeState, LoggingAlerter, TelegramAlerter,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // * A missing .env is the normal case in containers
    let _ = dotenvy::dotenv();

    let settings = Settings::parse();
    settings.validate()?;

    init_tracing(&settings.log_level, settings.log_format);
    tracing::info!(settings = ?settings, "Traffic exporter starting");

    let gauges = Arc::new(GaugeState::new()?);
    let server = start_metrics_server(settings.exporter_port, gauges.clone())?;

    let alerter: Box<dyn AlertSink> = match settings.telegram() {
        Some(telegram) => Box::new(TelegramAlerter::new(telegram)?),
        None => {
            tracing::warn!("Telegram not configured, alerts go to the log only");
            Box::new(LoggingAlerter)
        }
    };

    let fetcher = BrowserFetcher::new(settings.browser_config());
    let sampler = SamplingLoop::new(
        fetcher,
        alerter,
        gauges,
        settings.fetch_interval(),
        settings.main_url.as_str(),
    );

    sampler.run_until(tokio::signal::ctrl_c()).await;

    server.shutdown();
    Ok(())
}
