pub mod config;
pub mod dom;
pub mod engine;
pub mod errors;
pub mod table;

use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;
use crate::dom::page::HtmlPage;
use crate::dom::UiTree;
use crate::engine::monitor::{Monitor, SessionSummary};
use crate::errors::{AutoProcessorError, AutoProcessorResult};

pub fn run() -> AutoProcessorResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Load .env file if present (ignore error if not found)
    let _ = dotenvy::dotenv();

    let config = config::load_config()?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let summary = runtime.block_on(replay(config))?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

/// Runs one monitoring session over a saved results page: loads the page,
/// commits a scan in its scan input, and lets the session run for
/// `replay.session_secs` before shutting it down.
pub async fn replay(config: AppConfig) -> AutoProcessorResult<SessionSummary> {
    let path = config.replay.page.clone().ok_or_else(|| {
        AutoProcessorError::Config(format!(
            "no page to replay: set replay.page or {}",
            config::PAGE_ENV
        ))
    })?;
    let page = Arc::new(HtmlPage::from_file(&path)?);
    tracing::info!(page = %path.display(), "replaying saved page");

    let events = page.subscribe();
    let handle = Monitor::new(page.clone(), config.clone()).start(events);

    match page.query(None, &config.selectors.scan_input).await? {
        Some(input) => page.press_key(input, &config.labels.commit_key)?,
        None => {
            tracing::warn!(selector = %config.selectors.scan_input, "scan input missing, relying on row signals");
            handle.request_scan();
        }
    }

    tokio::time::sleep(Duration::from_secs(config.replay.session_secs)).await;
    Ok(handle.shutdown().await)
}
