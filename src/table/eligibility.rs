/// Substrings of the lower-cased reason text that make a row eligible.
const REASON_MARKERS: [&str; 2] = ["refuse", "cancelled"];

/// Attempt count at which a row is eligible whatever its reason.
pub const ATTEMPT_THRESHOLD: u32 = 2;

/// Which clause of the predicate matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Reason(&'static str),
    Attempts(u32),
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trigger::Reason(marker) => write!(f, "reason contains '{marker}'"),
            Trigger::Attempts(n) => write!(f, "{n} attempts"),
        }
    }
}

pub fn evaluate(reason_text: &str, attempt_count: u32) -> Option<Trigger> {
    let reason = reason_text.to_lowercase();
    if let Some(marker) = REASON_MARKERS.iter().find(|m| reason.contains(*m)) {
        return Some(Trigger::Reason(marker));
    }
    (attempt_count >= ATTEMPT_THRESHOLD).then_some(Trigger::Attempts(attempt_count))
}

pub fn is_eligible(reason_text: &str, attempt_count: u32) -> bool {
    evaluate(reason_text, attempt_count).is_some()
}
