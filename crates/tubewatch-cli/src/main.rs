mod cli;
mod fetch;
mod logging;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{info, warn};
use tubewatch_api::OEmbedClient;
use tubewatch_core::scheduler;
use tubewatch_core::{
    AppConfig, CoreError, Detector, DetectorHandle, DetectorMessage, ExtractionRequest,
    PassOutcome, SchedulerState,
};
use tubewatch_detect::{LivePage, PageSnapshot};

use crate::cli::{Cli, Commands};
use crate::fetch::PageFetcher;

/// How long `watch` lets pending work finish once input ends.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<(), CoreError> {
    let cli = Cli::parse();
    let _guard = logging::init(cli.verbose, cli.log_dir.as_deref());

    let config_path = cli.config.clone().unwrap_or_else(AppConfig::config_path);
    let config = AppConfig::load_from(&config_path)?;

    match cli.command {
        Commands::Detect {
            url,
            html,
            extraction,
        } => detect(&config, &url, html, extraction).await,
        Commands::Watch => watch(&config).await,
        Commands::Config { init } => show_config(&config, &config_path, init),
    }
}

fn oembed_client(config: &AppConfig) -> Result<OEmbedClient, CoreError> {
    Ok(OEmbedClient::new(config.lookup_timeout())?
        .with_endpoint(config.lookup.endpoint.clone())
        .with_cache(config.lookup.cache_responses)
        .with_cache_capacity(config.lookup.cache_capacity))
}

fn page_fetcher(config: &AppConfig) -> Result<PageFetcher, CoreError> {
    PageFetcher::new(config.lookup_timeout(), Arc::new(config.selector_catalog()?))
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CoreError> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

async fn detect(
    config: &AppConfig,
    url: &str,
    html: Option<PathBuf>,
    extraction: bool,
) -> Result<(), CoreError> {
    let mut detector = Detector::from_config(config, oembed_client(config)?)?;
    let fetcher = page_fetcher(config)?;
    let page = match html {
        Some(path) => fetcher.from_file(url, &path)?,
        None => fetcher.fetch(url).await?,
    };

    let record = match detector.run_pass(&page).await {
        PassOutcome::Detected(record) => record,
        PassOutcome::CacheHit(record) | PassOutcome::Refreshed(record) => Some(record),
        outcome => {
            info!(?outcome, "Nothing detected");
            None
        }
    };

    if extraction {
        match record.as_ref().and_then(ExtractionRequest::from_record) {
            Some(request) => print_json(&request),
            None => {
                warn!("No valid video to request extraction for");
                Ok(())
            }
        }
    } else {
        print_json(&DetectorMessage::detected(record))
    }
}

async fn watch(config: &AppConfig) -> Result<(), CoreError> {
    let detector = Detector::from_config(config, oembed_client(config)?)?;
    let fetcher = page_fetcher(config)?;
    let page = Arc::new(LivePage::new(PageSnapshot::blank("about:blank")));
    let (handle, task) = scheduler::spawn(detector, page.clone(), config.timings());
    let printer = tokio::spawn(print_messages(handle.subscribe()));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        };
        let Some(line) = line else {
            drain(&handle).await?;
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if line.starts_with('{') {
            match serde_json::from_str::<DetectorMessage>(line) {
                Ok(message) => {
                    if let Some(reply) = handle.handle_message(message).await? {
                        print_json(&reply)?;
                    }
                }
                Err(e) => warn!(error = %e, "Ignoring malformed message"),
            }
            continue;
        }

        match fetcher.fetch(line).await {
            Ok(snapshot) => {
                page.replace(snapshot);
                handle.navigated();
            }
            Err(e) => warn!(error = %e, "Could not load page"),
        }
    }

    handle.shutdown();
    if let Err(e) = task.await {
        warn!(error = %e, "Scheduler task failed");
    }
    drop(handle);
    let _ = printer.await;
    Ok(())
}

/// Wait for the scheduler to go idle after the last navigation.
async fn drain(handle: &DetectorHandle) -> Result<(), CoreError> {
    // Round trip so every queued navigation has been seen.
    handle.current_video().await?;
    let mut state = handle.watch_state();
    if tokio::time::timeout(DRAIN_TIMEOUT, state.wait_for(|s| *s == SchedulerState::Idle))
        .await
        .is_err()
    {
        warn!("Gave up waiting for pending detection");
    }
    Ok(())
}

async fn print_messages(mut rx: broadcast::Receiver<DetectorMessage>) {
    loop {
        match rx.recv().await {
            Ok(message) => {
                if let Err(e) = print_json(&message) {
                    warn!(error = %e, "Could not print message");
                }
            }
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "Output fell behind"),
            Err(RecvError::Closed) => break,
        }
    }
}

fn show_config(config: &AppConfig, path: &Path, init: bool) -> Result<(), CoreError> {
    if init {
        config.save_to(path)?;
        info!(path = %path.display(), "Wrote config");
    }
    let body = toml::to_string_pretty(config).map_err(|e| CoreError::Config(e.to_string()))?;
    println!("# {}", path.display());
    print!("{body}");
    Ok(())
}
