use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use crate::engine::ledger::DedupLedger;

/// Steps of one processing run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessorStage {
    Idle,
    Invoking,
    AwaitingOption,
    AwaitingSubmit,
    Refocusing,
    Done,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutcomeStatus {
    Completed {
        /// The submit control was found and activated.
        submitted: bool,
    },
    Failed {
        /// Stage the run was in when it gave up.
        stage: ProcessorStage,
        reason: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessOutcome {
    pub identity: String,
    #[serde(flatten)]
    pub status: OutcomeStatus,
    pub finished_at: chrono::DateTime<chrono::Utc>,
}

impl ProcessOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self.status, OutcomeStatus::Completed { .. })
    }
}

/// The single system-wide "a row is being processed" flag.
#[derive(Debug, Clone, Default)]
pub struct BusyFlag(Arc<AtomicBool>);

impl BusyFlag {
    pub fn is_busy(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Takes the flag if it is free. The flag is released when the guard drops.
    pub fn try_acquire(&self) -> Option<BusyGuard> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BusyGuard(Arc::clone(&self.0)))
    }
}

#[derive(Debug)]
pub struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Process-wide state of one monitoring session, shared by the scanner and
/// the processor. Every accessor takes and releases the lock internally, so
/// no guard is ever held across a suspension point.
#[derive(Debug, Default)]
pub struct SessionState {
    ledger: Mutex<DedupLedger>,
    busy: BusyFlag,
    outcomes: Mutex<Vec<ProcessOutcome>>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn busy(&self) -> &BusyFlag {
        &self.busy
    }

    pub fn is_busy(&self) -> bool {
        self.busy.is_busy()
    }

    pub fn is_processable(&self, identity: &str) -> bool {
        lock(&self.ledger).is_processable(identity)
    }

    pub fn try_mark_in_flight(&self, identity: &str) -> bool {
        lock(&self.ledger).mark_in_flight(identity)
    }

    pub fn mark_completed(&self, identity: &str) {
        lock(&self.ledger).mark_completed(identity);
    }

    pub fn unmark(&self, identity: &str) {
        lock(&self.ledger).unmark(identity);
    }

    pub fn completed(&self) -> Vec<String> {
        lock(&self.ledger).completed()
    }

    pub fn in_flight(&self) -> Vec<String> {
        lock(&self.ledger).in_flight()
    }

    pub fn record_outcome(&self, outcome: ProcessOutcome) {
        lock(&self.outcomes).push(outcome);
    }

    pub fn outcomes(&self) -> Vec<ProcessOutcome> {
        lock(&self.outcomes).clone()
    }
}
