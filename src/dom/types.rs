use serde::{Deserialize, Serialize};

/// Handle to one element of one rendered document generation.
///
/// `ordinal` is the element's position in document order. A re-render bumps
/// the generation, and handles from older generations are rejected as stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeHandle {
    pub generation: u64,
    pub ordinal: usize,
}

impl NodeHandle {
    pub fn new(generation: u64, ordinal: usize) -> Self {
        Self { generation, ordinal }
    }
}

impl std::fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "g{}#{}", self.generation, self.ordinal)
    }
}

/// One synthetic activation dispatched against the page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivationRecord {
    pub node: NodeHandle,
    pub tag: String,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element_id: Option<String>,
    pub classes: Vec<String>,
}

/// Where keyboard focus currently sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FocusState {
    pub node: NodeHandle,
    /// The control's contents were selected along with the focus.
    pub selected: bool,
}
