//! Inbound signal producers.
//!
//! Three independent sources watch the page's event stream and turn the
//! events they care about into scan requests:
//!
//! - a scan commit (the commit key pressed in the scan input),
//! - activation of the "Check-in" control,
//! - rows added to a results table.
//!
//! Each source is optional; the row-mutation source alone is enough for
//! correctness, the others only make scans happen sooner.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use crate::config::AppConfig;
use crate::dom::events::PageEvent;
use crate::dom::traits::UiTree;
use crate::engine::trigger::ScanTrigger;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    ScanCommitted,
    CheckInActivated,
    RowsAdded,
}

#[async_trait]
pub trait SignalSource: Send + Sync {
    fn kind(&self) -> SignalKind;

    /// Whether `event` is one this source reports.
    async fn accepts(&self, tree: &dyn UiTree, event: &PageEvent) -> bool;
}

/// Commit key pressed while the scan input has focus.
pub struct KeyCommitSource {
    input_selector: String,
    commit_key: String,
}

impl KeyCommitSource {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            input_selector: config.selectors.scan_input.clone(),
            commit_key: config.labels.commit_key.clone(),
        }
    }
}

#[async_trait]
impl SignalSource for KeyCommitSource {
    fn kind(&self) -> SignalKind {
        SignalKind::ScanCommitted
    }

    async fn accepts(&self, tree: &dyn UiTree, event: &PageEvent) -> bool {
        let PageEvent::KeyDown { target, key } = event else {
            return false;
        };
        if *key != self.commit_key {
            return false;
        }
        match tree.matches(*target, &self.input_selector).await {
            Ok(true) => {
                let scanned = tree.value(*target).await.ok().flatten().unwrap_or_default();
                tracing::info!(scanned = %scanned.trim(), "scan detected");
                true
            }
            Ok(false) => false,
            Err(e) => {
                tracing::debug!(error = %e, "key target no longer resolvable");
                false
            }
        }
    }
}

/// Activation of the control labelled "Check-in", seen from anywhere on the page.
pub struct CheckInSource {
    label: String,
}

impl CheckInSource {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            label: config.labels.check_in.clone(),
        }
    }
}

#[async_trait]
impl SignalSource for CheckInSource {
    fn kind(&self) -> SignalKind {
        SignalKind::CheckInActivated
    }

    async fn accepts(&self, _tree: &dyn UiTree, event: &PageEvent) -> bool {
        let PageEvent::Activated { control_label, .. } = event else {
            return false;
        };
        let hit = control_label.as_deref() == Some(self.label.as_str());
        if hit {
            tracing::info!("check-in activation detected");
        }
        hit
    }
}

/// New elements that are table rows.
pub struct RowMutationSource {
    row_selector: String,
}

impl RowMutationSource {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            row_selector: config.selectors.row.clone(),
        }
    }
}

#[async_trait]
impl SignalSource for RowMutationSource {
    fn kind(&self) -> SignalKind {
        SignalKind::RowsAdded
    }

    async fn accepts(&self, tree: &dyn UiTree, event: &PageEvent) -> bool {
        let PageEvent::NodesAdded { added } = event else {
            return false;
        };
        for &node in added {
            if let Ok(true) = tree.matches(node, &self.row_selector).await {
                tracing::info!("new row detected in table");
                return true;
            }
        }
        false
    }
}

/// Routes page events through the registered sources and schedules the
/// follow-up scan requests of every source that fires.
pub struct SignalRouter {
    tree: Arc<dyn UiTree>,
    trigger: ScanTrigger,
    sources: Vec<Box<dyn SignalSource>>,
    commit_followups: Vec<Duration>,
    checkin_followups: Vec<Duration>,
    mutation_followups: Vec<Duration>,
}

impl SignalRouter {
    pub fn new(tree: Arc<dyn UiTree>, trigger: ScanTrigger, config: &AppConfig) -> Self {
        let millis = |v: &[u64]| -> Vec<Duration> {
            v.iter().copied().map(Duration::from_millis).collect()
        };
        Self {
            tree,
            trigger,
            sources: Vec::new(),
            commit_followups: millis(&config.timing.commit_followups_ms),
            checkin_followups: millis(&config.timing.checkin_followups_ms),
            mutation_followups: millis(&config.timing.mutation_followups_ms),
        }
    }

    /// Router with all three sources registered.
    pub fn with_default_sources(
        tree: Arc<dyn UiTree>,
        trigger: ScanTrigger,
        config: &AppConfig,
    ) -> Self {
        Self::new(tree, trigger, config)
            .with_source(KeyCommitSource::from_config(config))
            .with_source(CheckInSource::from_config(config))
            .with_source(RowMutationSource::from_config(config))
    }

    pub fn with_source<S: SignalSource + 'static>(mut self, source: S) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    fn followups(&self, kind: SignalKind) -> &[Duration] {
        match kind {
            SignalKind::ScanCommitted => &self.commit_followups,
            SignalKind::CheckInActivated => &self.checkin_followups,
            SignalKind::RowsAdded => &self.mutation_followups,
        }
    }

    /// Returns the kinds of every source that accepted the event.
    pub async fn handle(&self, event: &PageEvent) -> Vec<SignalKind> {
        let mut fired = Vec::new();
        for source in &self.sources {
            if source.accepts(self.tree.as_ref(), event).await {
                let kind = source.kind();
                for &after in self.followups(kind) {
                    self.trigger.request_scan_after(after);
                }
                fired.push(kind);
            }
        }
        fired
    }

    pub async fn run(self, mut events: broadcast::Receiver<PageEvent>, stop: Arc<AtomicBool>) {
        loop {
            if stop.load(Ordering::Relaxed) {
                break;
            }
            match events.recv().await {
                Ok(event) => {
                    let fired = self.handle(&event).await;
                    if !fired.is_empty() {
                        tracing::debug!(?fired, "signals raised");
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    // Whatever was missed may have added rows.
                    tracing::warn!(missed, "page events dropped, requesting a scan");
                    self.trigger.request_scan();
                }
                Err(RecvError::Closed) => break,
            }
        }
        tracing::debug!("signal router stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::fixtures::{page_markup, row};
    use crate::dom::page::HtmlPage;
    use crate::engine::trigger::ScanTarget;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct Counter(AtomicUsize);

    #[async_trait]
    impl ScanTarget for Counter {
        async fn run_scan(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn page() -> Arc<HtmlPage> {
        Arc::new(HtmlPage::new(&page_markup(&[vec![row("A", "0", "x")]], None)))
    }

    fn router(page: &Arc<HtmlPage>, counter: &Arc<Counter>) -> SignalRouter {
        let config = AppConfig::default();
        let (trigger, _task) = ScanTrigger::spawn(counter.clone(), config.timing.debounce());
        SignalRouter::with_default_sources(page.clone(), trigger, &config)
    }

    #[tokio::test(start_paused = true)]
    async fn enter_in_scan_input_schedules_three_scans() {
        let page = page();
        let counter = Arc::new(Counter::default());
        let router = router(&page, &counter);
        let input = page.query(None, "#trackingNumber").await.unwrap().unwrap();
        page.type_into(input, " TRK-77 ").unwrap();

        let event = PageEvent::KeyDown { target: input, key: "Enter".into() };
        assert_eq!(router.handle(&event).await, vec![SignalKind::ScanCommitted]);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(counter.0.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn other_keys_and_targets_are_ignored() {
        let page = page();
        let counter = Arc::new(Counter::default());
        let router = router(&page, &counter);
        let input = page.query(None, "#trackingNumber").await.unwrap().unwrap();
        let td = page.query(None, "td").await.unwrap().unwrap();

        let tab = PageEvent::KeyDown { target: input, key: "Tab".into() };
        let elsewhere = PageEvent::KeyDown { target: td, key: "Enter".into() };
        assert!(router.handle(&tab).await.is_empty());
        assert!(router.handle(&elsewhere).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn check_in_activation_schedules_two_scans() {
        let page = page();
        let counter = Arc::new(Counter::default());
        let router = router(&page, &counter);
        let button = page.query(None, "body > button").await.unwrap().unwrap();

        let event = PageEvent::Activated {
            target: button,
            tag: "button".into(),
            label: "Check-in".into(),
            control_label: Some("Check-in".into()),
        };
        assert_eq!(router.handle(&event).await, vec![SignalKind::CheckInActivated]);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(counter.0.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn only_row_additions_count_as_mutations() {
        let page = page();
        let counter = Arc::new(Counter::default());
        let router = router(&page, &counter);
        let td = page.query(None, "td").await.unwrap().unwrap();
        let tr = page.query(None, "tr").await.unwrap().unwrap();

        let cell_only = PageEvent::NodesAdded { added: vec![td] };
        assert!(router.handle(&cell_only).await.is_empty());

        let with_row = PageEvent::NodesAdded { added: vec![td, tr] };
        assert_eq!(router.handle(&with_row).await, vec![SignalKind::RowsAdded]);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn sources_left_out_never_fire() {
        let page = page();
        let counter = Arc::new(Counter::default());
        let config = AppConfig::default();
        let (trigger, _task) = ScanTrigger::spawn(counter.clone(), config.timing.debounce());
        let router = SignalRouter::new(page.clone(), trigger, &config)
            .with_source(RowMutationSource::from_config(&config));
        let input = page.query(None, "#trackingNumber").await.unwrap().unwrap();

        let event = PageEvent::KeyDown { target: input, key: "Enter".into() };
        assert!(router.handle(&event).await.is_empty());
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(counter.0.load(Ordering::SeqCst), 0);
    }
}
