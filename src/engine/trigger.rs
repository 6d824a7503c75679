use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Whatever a debounced scan request eventually runs.
#[async_trait]
pub trait ScanTarget: Send + Sync {
    async fn run_scan(&self);
}

/// Entry point for every scan request. Requests are coalesced with a
/// trailing-edge debounce: a burst of any length produces exactly one scan,
/// fired `delay` after the last request of the burst.
///
/// Scans run one after another on the trigger's own task, so two scan
/// passes never interleave.
#[derive(Clone)]
pub struct ScanTrigger {
    tx: mpsc::UnboundedSender<()>,
}

impl ScanTrigger {
    pub fn spawn(target: Arc<dyn ScanTarget>, delay: Duration) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(debounce_loop(rx, target, delay));
        (Self { tx }, task)
    }

    pub fn request_scan(&self) {
        if self.tx.send(()).is_err() {
            tracing::debug!("scan trigger stopped, request dropped");
        }
    }

    /// Issues a request once `after` has elapsed.
    pub fn request_scan_after(&self, after: Duration) -> JoinHandle<()> {
        let trigger = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            trigger.request_scan();
        })
    }
}

async fn debounce_loop(
    mut rx: mpsc::UnboundedReceiver<()>,
    target: Arc<dyn ScanTarget>,
    delay: Duration,
) {
    // Each turn of the outer loop is one burst.
    while rx.recv().await.is_some() {
        let quiet = tokio::time::sleep(delay);
        tokio::pin!(quiet);
        let mut requests = 1usize;

        loop {
            tokio::select! {
                _ = &mut quiet => break,
                next = rx.recv() => match next {
                    Some(()) => {
                        requests += 1;
                        quiet.as_mut().reset(Instant::now() + delay);
                    }
                    None => {
                        tracing::debug!("scan trigger closed with a pending scan");
                        return;
                    }
                },
            }
        }

        tracing::debug!(requests, "debounce window elapsed, scanning");
        target.run_scan().await;
    }
    tracing::debug!("scan trigger stopped");
}
