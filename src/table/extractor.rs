use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::config::{AppConfig, ProcessingConfig};
use crate::dom::locate::resolve_by_label;
use crate::dom::traits::UiTree;
use crate::dom::types::NodeHandle;
use crate::errors::AutoProcessorResult;

/// One shipment row as read during a single scan pass. Never cached.
#[derive(Debug, Clone, Serialize)]
pub struct RowRecord {
    pub identity: String,
    pub reason_text: String,
    pub attempt_count: u32,
    /// The row's edit control, if the last cell carries one.
    pub action_control: Option<NodeHandle>,
    /// The row element itself; diagnostics only.
    pub source: NodeHandle,
}

const LEADING_INT_PATTERN: &str = r"^\s*([+-]?)(\d+)";

/// Parses a leading integer the way lenient form parsers do: leading
/// whitespace and a sign are accepted, trailing text is ignored, and
/// anything without leading digits reads as zero. Negative counts clamp to zero.
pub fn parse_attempts(text: &str) -> u32 {
    static LEADING_INT: OnceLock<Option<Regex>> = OnceLock::new();
    let Some(re) = LEADING_INT
        .get_or_init(|| Regex::new(LEADING_INT_PATTERN).ok())
        .as_ref()
    else {
        tracing::error!(pattern = LEADING_INT_PATTERN, "attempt pattern failed to compile");
        return 0;
    };

    let Some(caps) = re.captures(text) else {
        return 0;
    };
    if &caps[1] == "-" {
        return 0;
    }
    caps[2].parse().unwrap_or(u32::MAX)
}

pub struct RowExtractor {
    cell_selector: String,
    control_selector: String,
    edit_label: String,
    columns: ProcessingConfig,
}

impl RowExtractor {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            cell_selector: config.selectors.cell.clone(),
            control_selector: config.selectors.control.clone(),
            edit_label: config.labels.edit.clone(),
            columns: config.processing.clone(),
        }
    }

    /// Reads one row. `Ok(None)` means the row is not fully rendered yet and
    /// should be skipped for this pass.
    pub async fn extract(
        &self,
        tree: &dyn UiTree,
        row: NodeHandle,
    ) -> AutoProcessorResult<Option<RowRecord>> {
        let cells = tree.query_all(Some(row), &self.cell_selector).await?;
        if cells.len() < self.columns.min_cells {
            tracing::debug!(row = %row, cells = cells.len(), "not enough cells in row");
            return Ok(None);
        }

        let identity = tree.text(cells[self.columns.identity_column]).await?.trim().to_string();
        let reason_text = tree.text(cells[self.columns.reason_column]).await?.trim().to_string();
        let attempt_count = parse_attempts(&tree.text(cells[self.columns.attempts_column]).await?);

        let action_control = match cells.last() {
            Some(&action_cell) => {
                let controls = tree.query_all(Some(action_cell), &self.control_selector).await?;
                let edit_label = self.edit_label.as_str();
                resolve_by_label(tree, &controls, |label| label.contains(edit_label)).await?
            }
            None => None,
        };

        tracing::debug!(
            identity = %identity,
            reason = %reason_text,
            attempts = attempt_count,
            actionable = action_control.is_some(),
            "row extracted"
        );

        Ok(Some(RowRecord {
            identity,
            reason_text,
            attempt_count,
            action_control,
            source: row,
        }))
    }
}
