use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::dom::traits::UiTree;
use crate::dom::types::NodeHandle;
use crate::errors::AutoProcessorResult;

/// Polls until an element matching `selector` exists. Returns `Ok(None)` if
/// `stop` is raised first. There is no attempt limit: the host page may take
/// arbitrarily long to render the element.
pub async fn wait_for_element(
    tree: &dyn UiTree,
    selector: &str,
    retry: Duration,
    stop: &AtomicBool,
) -> AutoProcessorResult<Option<NodeHandle>> {
    let retry = retry.max(Duration::from_millis(1));
    let mut attempts = 0u32;
    loop {
        if stop.load(Ordering::Relaxed) {
            return Ok(None);
        }
        if let Some(found) = tree.query(None, selector).await? {
            tracing::debug!(selector, attempts, "element present");
            return Ok(Some(found));
        }
        attempts += 1;
        if attempts == 1 {
            tracing::info!(selector, "element not found, retrying");
        }
        tokio::time::sleep(retry).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::page::HtmlPage;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn resolves_once_element_appears() {
        let page = Arc::new(HtmlPage::new("<html><body></body></html>"));
        let stop = AtomicBool::new(false);

        let renderer = {
            let page = page.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(2500)).await;
                page.rerender(r#"<html><body><input id="trackingNumber"></body></html>"#);
            })
        };

        let found = wait_for_element(page.as_ref(), "#trackingNumber", Duration::from_secs(1), &stop)
            .await
            .unwrap();
        renderer.await.unwrap();
        assert_eq!(found.map(|h| h.generation), Some(1));
    }

    #[tokio::test]
    async fn stop_flag_ends_the_wait() {
        let page = HtmlPage::new("<html><body></body></html>");
        let stop = AtomicBool::new(true);
        let found = wait_for_element(&page, "#missing", Duration::from_millis(10), &stop)
            .await
            .unwrap();
        assert!(found.is_none());
    }
}
