//! Drives the host page's edit dialog for one row:
//! activate the edit control, pick "No", submit, then hand focus back to the
//! scan input.
//!
//! The host page gives no signal when its dialog has rendered or closed, so
//! each step is preceded by a fixed, configurable wait.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;

use crate::config::{AppConfig, SelectorsConfig, TimingConfig};
use crate::dom::traits::UiTree;
use crate::engine::state::{BusyGuard, OutcomeStatus, ProcessOutcome, ProcessorStage, SessionState};
use crate::errors::{AutoProcessorError, AutoProcessorResult};
use crate::table::RowRecord;

pub struct Processor {
    tree: Arc<dyn UiTree>,
    session: Arc<SessionState>,
    timing: TimingConfig,
    selectors: SelectorsConfig,
    require_submit: bool,
}

impl Processor {
    pub fn new(tree: Arc<dyn UiTree>, session: Arc<SessionState>, config: &AppConfig) -> Self {
        Self {
            tree,
            session,
            timing: config.timing.clone(),
            selectors: config.selectors.clone(),
            require_submit: config.processing.require_submit,
        }
    }

    /// Processes `record`, taking the busy flag for the duration. Returns
    /// `None` without touching anything when another run holds the flag.
    pub async fn process(&self, record: RowRecord) -> Option<ProcessOutcome> {
        let Some(guard) = self.session.busy().try_acquire() else {
            tracing::info!(identity = %record.identity, "already processing a row, skipping");
            return None;
        };
        Some(self.run_guarded(record, guard).await)
    }

    /// Runs the sequence under a busy guard the caller already holds. The
    /// guard is dropped on every exit path, panics included.
    pub async fn run_guarded(&self, record: RowRecord, guard: BusyGuard) -> ProcessOutcome {
        tracing::info!(
            identity = %record.identity,
            reason = %record.reason_text,
            attempts = record.attempt_count,
            "processing row"
        );

        let mut stage = ProcessorStage::Idle;
        let result = AssertUnwindSafe(self.drive(&record, &mut stage))
            .catch_unwind()
            .await;

        let status = match result {
            Ok(Ok(submitted)) => {
                tracing::info!(identity = %record.identity, submitted, "row processed");
                OutcomeStatus::Completed { submitted }
            }
            Ok(Err(e)) => {
                tracing::warn!(identity = %record.identity, ?stage, error = %e, "processing failed");
                self.session.unmark(&record.identity);
                OutcomeStatus::Failed {
                    stage,
                    reason: e.to_string(),
                }
            }
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                tracing::error!(identity = %record.identity, ?stage, reason = %reason, "processing panicked");
                self.session.unmark(&record.identity);
                OutcomeStatus::Failed { stage, reason }
            }
        };
        drop(guard);

        let outcome = ProcessOutcome {
            identity: record.identity,
            status,
            finished_at: chrono::Utc::now(),
        };
        self.session.record_outcome(outcome.clone());
        outcome
    }

    async fn drive(
        &self,
        record: &RowRecord,
        stage: &mut ProcessorStage,
    ) -> AutoProcessorResult<bool> {
        enter(stage, ProcessorStage::Invoking, &record.identity);
        let control = record
            .action_control
            .ok_or_else(|| AutoProcessorError::Step("row has no edit control".into()))?;
        self.tree.activate(control).await?;
        self.wait_for_dialog_render().await;

        enter(stage, ProcessorStage::AwaitingOption, &record.identity);
        self.select_no_option().await?;

        enter(stage, ProcessorStage::AwaitingSubmit, &record.identity);
        self.wait_for_option_settle().await;
        let submitted = self.submit().await?;
        if !submitted && self.require_submit {
            return Err(AutoProcessorError::Step("submit control not found".into()));
        }
        self.session.mark_completed(&record.identity);

        enter(stage, ProcessorStage::Refocusing, &record.identity);
        self.wait_for_dialog_close().await;
        self.refocus_input().await;

        enter(stage, ProcessorStage::Done, &record.identity);
        Ok(submitted)
    }

    async fn wait_for_dialog_render(&self) {
        tokio::time::sleep(self.timing.dialog_render()).await;
    }

    async fn wait_for_option_settle(&self) {
        tokio::time::sleep(self.timing.option_settle()).await;
    }

    async fn wait_for_dialog_close(&self) {
        tokio::time::sleep(self.timing.dialog_close()).await;
    }

    /// The option group lists Yes then No; the second option is "No".
    async fn select_no_option(&self) -> AutoProcessorResult<()> {
        let group = self
            .tree
            .query(None, &self.selectors.option_group)
            .await?
            .ok_or_else(|| AutoProcessorError::Step("option group not found".into()))?;

        let wrappers = self
            .tree
            .query_all(Some(group), &self.selectors.option_wrapper)
            .await?;
        let Some(&no_wrapper) = wrappers.get(1) else {
            return Err(AutoProcessorError::Step(format!(
                "expected at least 2 options, found {}",
                wrappers.len()
            )));
        };

        let no_input = self
            .tree
            .query(Some(no_wrapper), &self.selectors.option_input)
            .await?
            .ok_or_else(|| AutoProcessorError::Step("\"No\" option input not found".into()))?;

        tracing::debug!(input = %no_input, "selecting \"No\"");
        // Some host builds bind the handler to the input, others to its label.
        self.tree.activate(no_input).await?;
        // The input click may already have re-rendered the dialog.
        if let Err(e) = self.tree.activate(no_wrapper).await {
            tracing::warn!(wrapper = %no_wrapper, error = %e, "option label click failed, keeping input selection");
        }
        Ok(())
    }

    /// Activates the dialog's primary control. `Ok(false)` when the footer
    /// or the control is missing.
    async fn submit(&self) -> AutoProcessorResult<bool> {
        let Some(footer) = self.tree.query(None, &self.selectors.dialog_footer).await? else {
            tracing::warn!("dialog footer not found");
            return Ok(false);
        };
        let Some(primary) = self
            .tree
            .query(Some(footer), &self.selectors.primary_control)
            .await?
        else {
            tracing::warn!("submit control not found");
            return Ok(false);
        };
        tracing::debug!(control = %primary, "submitting");
        self.tree.activate(primary).await?;
        Ok(true)
    }

    async fn refocus_input(&self) {
        match self.tree.query(None, &self.selectors.scan_input).await {
            Ok(Some(input)) => match self.tree.focus(input, true).await {
                Ok(()) => tracing::info!("scan input refocused, ready for next scan"),
                Err(e) => tracing::warn!(error = %e, "could not refocus scan input"),
            },
            Ok(None) => tracing::debug!("scan input not present, focus left as is"),
            Err(e) => tracing::warn!(error = %e, "scan input lookup failed"),
        }
    }
}

fn enter(stage: &mut ProcessorStage, next: ProcessorStage, identity: &str) {
    tracing::debug!(identity, from = ?*stage, to = ?next, "processor stage");
    *stage = next;
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
