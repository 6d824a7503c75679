use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::dom::events::PageEvent;
use crate::dom::traits::UiTree;
use crate::dom::wait::wait_for_element;
use crate::engine::processor::Processor;
use crate::engine::scanner::Scanner;
use crate::engine::signals::SignalRouter;
use crate::engine::state::{ProcessOutcome, SessionState};
use crate::engine::trigger::ScanTrigger;

/// What one monitoring session did.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub ended_at: chrono::DateTime<chrono::Utc>,
    pub completed: Vec<String>,
    pub in_flight: Vec<String>,
    pub outcomes: Vec<ProcessOutcome>,
}

/// One monitoring session over one page. State lives as long as the
/// session; nothing survives it.
pub struct Monitor {
    tree: Arc<dyn UiTree>,
    config: AppConfig,
    session: Arc<SessionState>,
    session_id: Uuid,
}

impl Monitor {
    pub fn new(tree: Arc<dyn UiTree>, config: AppConfig) -> Self {
        Self {
            tree,
            config,
            session: Arc::new(SessionState::new()),
            session_id: Uuid::new_v4(),
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Starts the scan trigger right away, and the signal producers once the
    /// scan input and a table body exist. Page events raised before that are
    /// buffered in `events`.
    pub fn start(self, events: broadcast::Receiver<PageEvent>) -> MonitorHandle {
        let span = tracing::info_span!("monitor", session = %self.session_id);
        let _entered = span.enter();
        tracing::info!("initializing auto-processor");

        let processor = Arc::new(Processor::new(
            self.tree.clone(),
            self.session.clone(),
            &self.config,
        ));
        let scanner = Arc::new(Scanner::new(
            self.tree.clone(),
            self.session.clone(),
            processor,
            &self.config,
        ));
        let (trigger, debounce_task) = ScanTrigger::spawn(scanner, self.config.timing.debounce());

        let stop = Arc::new(AtomicBool::new(false));
        let router = SignalRouter::with_default_sources(self.tree.clone(), trigger.clone(), &self.config);
        let bootstrap = {
            let tree = self.tree.clone();
            let stop = stop.clone();
            let input_selector = self.config.selectors.scan_input.clone();
            let table_selector = self.config.selectors.table_body.clone();
            let retry = self.config.timing.bootstrap_retry();
            async move {
                for (what, selector) in [("scan input", input_selector), ("table body", table_selector)] {
                    match wait_for_element(tree.as_ref(), &selector, retry, &stop).await {
                        Ok(Some(_)) => tracing::info!(what, "found, monitoring"),
                        Ok(None) => return,
                        Err(e) => {
                            tracing::error!(what, error = %e, "cannot locate element, signals disabled");
                            return;
                        }
                    }
                }
                router.run(events, stop).await;
            }
        };
        let router_task = tokio::spawn(bootstrap.instrument(span.clone()));

        MonitorHandle {
            session_id: self.session_id,
            started_at: chrono::Utc::now(),
            session: self.session,
            trigger,
            stop,
            tasks: vec![router_task, debounce_task],
            grace: self.config.timing.dialog_render()
                + self.config.timing.option_settle()
                + self.config.timing.dialog_close()
                + Duration::from_secs(1),
        }
    }
}

pub struct MonitorHandle {
    session_id: Uuid,
    started_at: chrono::DateTime<chrono::Utc>,
    session: Arc<SessionState>,
    trigger: ScanTrigger,
    stop: Arc<AtomicBool>,
    tasks: Vec<JoinHandle<()>>,
    grace: Duration,
}

impl MonitorHandle {
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn session(&self) -> &Arc<SessionState> {
        &self.session
    }

    pub fn request_scan(&self) {
        self.trigger.request_scan();
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            session_id: self.session_id,
            started_at: self.started_at,
            ended_at: chrono::Utc::now(),
            completed: self.session.completed(),
            in_flight: self.session.in_flight(),
            outcomes: self.session.outcomes(),
        }
    }

    /// Stops signal handling and scanning, lets a running sequence finish
    /// (bounded by the sum of its waits plus a second), and summarises.
    pub async fn shutdown(self) -> SessionSummary {
        self.stop.store(true, Ordering::Relaxed);
        for task in &self.tasks {
            task.abort();
        }

        let session = self.session.clone();
        let settled = tokio::time::timeout(self.grace, async move {
            while session.is_busy() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        if settled.is_err() {
            tracing::warn!(session = %self.session_id, "processing still running at shutdown");
        }

        let summary = self.summary();
        tracing::info!(
            session = %self.session_id,
            completed = summary.completed.len(),
            outcomes = summary.outcomes.len(),
            "monitor stopped"
        );
        summary
    }
}
