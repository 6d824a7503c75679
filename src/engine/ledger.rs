use std::collections::HashSet;

/// Identities that finished the automation sequence or are in the middle
/// of it. An identity is never in both sets.
#[derive(Debug, Default)]
pub struct DedupLedger {
    completed: HashSet<String>,
    in_flight: HashSet<String>,
}

impl DedupLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_processable(&self, identity: &str) -> bool {
        !self.completed.contains(identity) && !self.in_flight.contains(identity)
    }

    /// Check-then-mark in one step. Returns false (and changes nothing) when
    /// the identity is already completed or in flight.
    pub fn mark_in_flight(&mut self, identity: &str) -> bool {
        if !self.is_processable(identity) {
            return false;
        }
        self.in_flight.insert(identity.to_string())
    }

    pub fn mark_completed(&mut self, identity: &str) {
        self.in_flight.remove(identity);
        self.completed.insert(identity.to_string());
    }

    /// Releases an in-flight identity so a later scan can retry it.
    pub fn unmark(&mut self, identity: &str) {
        self.in_flight.remove(identity);
    }

    pub fn is_completed(&self, identity: &str) -> bool {
        self.completed.contains(identity)
    }

    pub fn is_in_flight(&self, identity: &str) -> bool {
        self.in_flight.contains(identity)
    }

    pub fn completed(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.completed.iter().cloned().collect();
        ids.sort();
        ids
    }

    pub fn in_flight(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.in_flight.iter().cloned().collect();
        ids.sort();
        ids
    }
}
