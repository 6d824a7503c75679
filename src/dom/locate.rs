use crate::dom::traits::UiTree;
use crate::dom::types::NodeHandle;
use crate::errors::AutoProcessorResult;

/// Resolves a control by a predicate over its visible (trimmed) label.
///
/// Every candidate is inspected; when several match, the last one in
/// document order wins. Position among siblings is never relied on.
pub async fn resolve_by_label<P>(
    tree: &dyn UiTree,
    candidates: &[NodeHandle],
    predicate: P,
) -> AutoProcessorResult<Option<NodeHandle>>
where
    P: Fn(&str) -> bool + Send + Sync,
{
    let mut found = None;
    for (idx, &candidate) in candidates.iter().enumerate() {
        let label = tree.text(candidate).await?;
        let label = label.trim();
        tracing::trace!(idx, label, "inspecting control");
        if predicate(label) {
            found = Some(candidate);
        }
    }
    Ok(found)
}
