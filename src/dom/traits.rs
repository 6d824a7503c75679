use async_trait::async_trait;

use crate::dom::types::NodeHandle;
use crate::errors::AutoProcessorResult;

/// The host page as the engine sees it: structural queries, text reads, and
/// synthetic activation. Implementations never expose direct mutation.
#[async_trait]
pub trait UiTree: Send + Sync {
    /// All elements matching `selector` in document order, searched below
    /// `scope` (exclusive) or across the whole document.
    async fn query_all(
        &self,
        scope: Option<NodeHandle>,
        selector: &str,
    ) -> AutoProcessorResult<Vec<NodeHandle>>;

    async fn query(
        &self,
        scope: Option<NodeHandle>,
        selector: &str,
    ) -> AutoProcessorResult<Option<NodeHandle>> {
        Ok(self.query_all(scope, selector).await?.into_iter().next())
    }

    /// Concatenated text content, untrimmed.
    async fn text(&self, node: NodeHandle) -> AutoProcessorResult<String>;

    /// Current value of an input control.
    async fn value(&self, node: NodeHandle) -> AutoProcessorResult<Option<String>>;

    async fn matches(&self, node: NodeHandle, selector: &str) -> AutoProcessorResult<bool>;

    /// Dispatches a synthetic activation (a click) against the element.
    async fn activate(&self, node: NodeHandle) -> AutoProcessorResult<()>;

    async fn focus(&self, node: NodeHandle, select_contents: bool) -> AutoProcessorResult<()>;
}
