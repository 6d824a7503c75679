use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;

use crate::config::AppConfig;
use crate::dom::traits::UiTree;
use crate::engine::processor::Processor;
use crate::engine::state::{ProcessOutcome, SessionState};
use crate::engine::trigger::ScanTarget;
use crate::table::eligibility;
use crate::table::RowExtractor;

/// Result of one scan pass.
#[derive(Debug)]
pub enum ScanOutcome {
    /// A processing run was active; nothing was read.
    Busy,
    /// Every row was read and none was selected.
    NoCandidate { rows_seen: usize },
    /// One row was selected and handed to the processor.
    Dispatched {
        identity: String,
        run: JoinHandle<ProcessOutcome>,
    },
}

pub struct Scanner {
    tree: Arc<dyn UiTree>,
    session: Arc<SessionState>,
    processor: Arc<Processor>,
    extractor: RowExtractor,
    table_body_selector: String,
    row_selector: String,
}

impl Scanner {
    pub fn new(
        tree: Arc<dyn UiTree>,
        session: Arc<SessionState>,
        processor: Arc<Processor>,
        config: &AppConfig,
    ) -> Self {
        Self {
            tree,
            session,
            processor,
            extractor: RowExtractor::from_config(config),
            table_body_selector: config.selectors.table_body.clone(),
            row_selector: config.selectors.row.clone(),
        }
    }

    /// Sweeps every table body in document order and dispatches the first
    /// eligible, actionable row that is neither completed nor in flight.
    /// Later candidates wait for the next pass.
    pub async fn scan(&self) -> ScanOutcome {
        if self.session.is_busy() {
            tracing::debug!("already processing a row, skipping row check");
            return ScanOutcome::Busy;
        }

        let bodies = match self.tree.query_all(None, &self.table_body_selector).await {
            Ok(bodies) => bodies,
            Err(e) => {
                tracing::warn!(error = %e, "table lookup failed");
                return ScanOutcome::NoCandidate { rows_seen: 0 };
            }
        };
        tracing::debug!(tables = bodies.len(), "scanning tables");

        let mut rows_seen = 0;
        for (table_idx, body) in bodies.into_iter().enumerate() {
            let rows = match self.tree.query_all(Some(body), &self.row_selector).await {
                Ok(rows) => rows,
                Err(e) => {
                    tracing::debug!(table = table_idx, error = %e, "row lookup failed, skipping table");
                    continue;
                }
            };

            for (row_idx, row) in rows.into_iter().enumerate() {
                rows_seen += 1;
                let record = match self.extractor.extract(self.tree.as_ref(), row).await {
                    Ok(Some(record)) => record,
                    Ok(None) => continue,
                    Err(e) => {
                        tracing::debug!(table = table_idx, row = row_idx, error = %e, "could not extract row");
                        continue;
                    }
                };

                if !self.session.is_processable(&record.identity) {
                    tracing::debug!(
                        table = table_idx,
                        row = row_idx,
                        identity = %record.identity,
                        "already processed or in flight, skipping"
                    );
                    continue;
                }

                let Some(trigger) =
                    eligibility::evaluate(&record.reason_text, record.attempt_count)
                else {
                    tracing::debug!(
                        table = table_idx,
                        row = row_idx,
                        identity = %record.identity,
                        "conditions not met"
                    );
                    continue;
                };

                if record.action_control.is_none() {
                    tracing::warn!(
                        identity = %record.identity,
                        %trigger,
                        "eligible row is not actionable: edit control not found"
                    );
                    continue;
                }

                // Mark before anything can suspend, so an overlapping pass
                // cannot pick the same row.
                if !self.session.try_mark_in_flight(&record.identity) {
                    continue;
                }
                let Some(guard) = self.session.busy().try_acquire() else {
                    self.session.unmark(&record.identity);
                    return ScanOutcome::Busy;
                };

                tracing::info!(
                    table = table_idx,
                    row = row_idx,
                    identity = %record.identity,
                    %trigger,
                    "trigger condition met, dispatching"
                );
                let identity = record.identity.clone();
                let processor = Arc::clone(&self.processor);
                let run = tokio::spawn(async move { processor.run_guarded(record, guard).await });
                return ScanOutcome::Dispatched { identity, run };
            }
        }

        tracing::debug!(rows_seen, "no matching rows found in any table");
        ScanOutcome::NoCandidate { rows_seen }
    }
}

#[async_trait]
impl ScanTarget for Scanner {
    async fn run_scan(&self) {
        if let ScanOutcome::Dispatched { identity, .. } = self.scan().await {
            tracing::debug!(identity = %identity, "processing started in background");
        }
    }
}
