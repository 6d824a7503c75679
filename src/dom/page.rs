//! In-process host page backed by a parsed HTML document.
//!
//! The document is immutable between renders. Activating a control runs the
//! optional host reaction, which may hand back new markup; the page is then
//! re-rendered, the generation bumps, and every element that did not exist
//! in the previous render is announced as added.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use tokio::sync::broadcast;

use crate::dom::events::{EventBus, PageEvent};
use crate::dom::traits::UiTree;
use crate::dom::types::{ActivationRecord, FocusState, NodeHandle};
use crate::errors::{AutoProcessorError, AutoProcessorResult};

/// Plays the host page's own event handlers: given the document and the
/// activated element, returns replacement markup when the page re-renders.
pub type HostReaction = Box<dyn Fn(&Html, ElementRef<'_>) -> Option<String> + Send + Sync>;

/// Element name treated as an activatable control.
const CONTROL_TAG: &str = "button";

struct Rendered {
    html: Html,
    generation: u64,
}

impl Rendered {
    fn element(&self, handle: NodeHandle) -> AutoProcessorResult<ElementRef<'_>> {
        if handle.generation != self.generation {
            return Err(AutoProcessorError::StaleNode {
                handle: handle.generation,
                current: self.generation,
            });
        }
        elements(&self.html).nth(handle.ordinal).ok_or_else(|| {
            AutoProcessorError::UiTree(format!("no element at {handle}"))
        })
    }

    fn handles_of<'a, I>(&'a self, found: I) -> Vec<NodeHandle>
    where
        I: Iterator<Item = ElementRef<'a>>,
    {
        let index: HashMap<_, usize> = elements(&self.html)
            .enumerate()
            .map(|(ordinal, el)| (el.id(), ordinal))
            .collect();
        found
            .filter_map(|el| index.get(&el.id()).copied())
            .map(|ordinal| NodeHandle::new(self.generation, ordinal))
            .collect()
    }
}

fn elements(html: &Html) -> impl Iterator<Item = ElementRef<'_>> {
    html.root_element().descendants().filter_map(ElementRef::wrap)
}

fn parse_selector(selector: &str) -> AutoProcessorResult<Selector> {
    Selector::parse(selector).map_err(|e| AutoProcessorError::Selector {
        selector: selector.to_string(),
        reason: format!("{e:?}"),
    })
}

fn label_of(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct HtmlPage {
    doc: Mutex<Rendered>,
    /// Values typed into inputs since the last render, keyed by handle.
    values: Mutex<HashMap<NodeHandle, String>>,
    focus: Mutex<Option<FocusState>>,
    activations: Mutex<Vec<ActivationRecord>>,
    reaction: Option<HostReaction>,
    bus: EventBus,
}

impl HtmlPage {
    pub fn new(markup: &str) -> Self {
        Self {
            doc: Mutex::new(Rendered {
                html: Html::parse_document(markup),
                generation: 0,
            }),
            values: Mutex::new(HashMap::new()),
            focus: Mutex::new(None),
            activations: Mutex::new(Vec::new()),
            reaction: None,
            bus: EventBus::default(),
        }
    }

    pub fn from_file(path: &Path) -> AutoProcessorResult<Self> {
        let markup = std::fs::read_to_string(path)?;
        tracing::info!(path = %path.display(), bytes = markup.len(), "page snapshot loaded");
        Ok(Self::new(&markup))
    }

    pub fn with_host_reaction<F>(mut self, reaction: F) -> Self
    where
        F: Fn(&Html, ElementRef<'_>) -> Option<String> + Send + Sync + 'static,
    {
        self.reaction = Some(Box::new(reaction));
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PageEvent> {
        self.bus.subscribe()
    }

    pub fn generation(&self) -> u64 {
        lock(&self.doc).generation
    }

    pub fn activations(&self) -> Vec<ActivationRecord> {
        lock(&self.activations).clone()
    }

    pub fn focused(&self) -> Option<FocusState> {
        *lock(&self.focus)
    }

    /// Replaces the document, as the host page does when it re-renders.
    pub fn rerender(&self, markup: &str) {
        let added = {
            let mut doc = lock(&self.doc);
            let mut previous: HashMap<String, usize> = HashMap::new();
            for el in elements(&doc.html) {
                *previous.entry(el.html()).or_default() += 1;
            }

            doc.html = Html::parse_document(markup);
            doc.generation += 1;

            let fresh = elements(&doc.html).filter(|el| match previous.get_mut(&el.html()) {
                Some(count) if *count > 0 => {
                    *count -= 1;
                    false
                }
                _ => true,
            });
            doc.handles_of(fresh)
        };

        lock(&self.values).clear();
        *lock(&self.focus) = None;
        tracing::debug!(generation = self.generation(), added = added.len(), "page re-rendered");
        if !added.is_empty() {
            self.bus.publish(PageEvent::NodesAdded { added });
        }
    }

    /// Types `value` into an input, replacing its current contents.
    pub fn type_into(&self, node: NodeHandle, value: &str) -> AutoProcessorResult<()> {
        lock(&self.doc).element(node)?;
        lock(&self.values).insert(node, value.to_string());
        Ok(())
    }

    pub fn press_key(&self, node: NodeHandle, key: &str) -> AutoProcessorResult<()> {
        lock(&self.doc).element(node)?;
        self.bus.publish(PageEvent::KeyDown {
            target: node,
            key: key.to_string(),
        });
        Ok(())
    }

    fn query_all_sync(
        &self,
        scope: Option<NodeHandle>,
        selector: &str,
    ) -> AutoProcessorResult<Vec<NodeHandle>> {
        let selector = parse_selector(selector)?;
        let doc = lock(&self.doc);
        let found = match scope {
            Some(handle) => {
                let root = doc.element(handle)?;
                doc.handles_of(root.select(&selector))
            }
            None => doc.handles_of(doc.html.select(&selector)),
        };
        Ok(found)
    }

    fn text_sync(&self, node: NodeHandle) -> AutoProcessorResult<String> {
        let doc = lock(&self.doc);
        Ok(doc.element(node)?.text().collect())
    }

    fn value_sync(&self, node: NodeHandle) -> AutoProcessorResult<Option<String>> {
        let doc = lock(&self.doc);
        let el = doc.element(node)?;
        if let Some(typed) = lock(&self.values).get(&node) {
            return Ok(Some(typed.clone()));
        }
        Ok(el.value().attr("value").map(str::to_string))
    }

    fn matches_sync(&self, node: NodeHandle, selector: &str) -> AutoProcessorResult<bool> {
        let selector = parse_selector(selector)?;
        let doc = lock(&self.doc);
        Ok(selector.matches(&doc.element(node)?))
    }

    fn activate_sync(&self, node: NodeHandle) -> AutoProcessorResult<()> {
        let (record, control_label, markup) = {
            let doc = lock(&self.doc);
            let el = doc.element(node)?;
            let record = ActivationRecord {
                node,
                tag: el.value().name().to_string(),
                label: label_of(el),
                element_id: el.value().id().map(str::to_string),
                classes: el.value().classes().map(str::to_string).collect(),
            };
            let control_label = std::iter::once(el)
                .chain(el.ancestors().filter_map(ElementRef::wrap))
                .find(|candidate| candidate.value().name() == CONTROL_TAG)
                .map(label_of);
            let markup = self.reaction.as_ref().and_then(|react| react(&doc.html, el));
            (record, control_label, markup)
        };

        tracing::debug!(node = %node, tag = %record.tag, label = %record.label, "activated");
        self.bus.publish(PageEvent::Activated {
            target: node,
            tag: record.tag.clone(),
            label: record.label.clone(),
            control_label,
        });
        lock(&self.activations).push(record);

        if let Some(markup) = markup {
            self.rerender(&markup);
        }
        Ok(())
    }

    fn focus_sync(&self, node: NodeHandle, select_contents: bool) -> AutoProcessorResult<()> {
        lock(&self.doc).element(node)?;
        *lock(&self.focus) = Some(FocusState {
            node,
            selected: select_contents,
        });
        Ok(())
    }
}

#[async_trait]
impl UiTree for HtmlPage {
    async fn query_all(
        &self,
        scope: Option<NodeHandle>,
        selector: &str,
    ) -> AutoProcessorResult<Vec<NodeHandle>> {
        self.query_all_sync(scope, selector)
    }

    async fn text(&self, node: NodeHandle) -> AutoProcessorResult<String> {
        self.text_sync(node)
    }

    async fn value(&self, node: NodeHandle) -> AutoProcessorResult<Option<String>> {
        self.value_sync(node)
    }

    async fn matches(&self, node: NodeHandle, selector: &str) -> AutoProcessorResult<bool> {
        self.matches_sync(node, selector)
    }

    async fn activate(&self, node: NodeHandle) -> AutoProcessorResult<()> {
        self.activate_sync(node)
    }

    async fn focus(&self, node: NodeHandle, select_contents: bool) -> AutoProcessorResult<()> {
        self.focus_sync(node, select_contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
          <input id="trackingNumber" value="TRK-1">
          <ul class="list">
            <li class="item">one</li>
            <li class="item"><span>two</span></li>
          </ul>
          <button class="go">Go <i>now</i></button>
        </body></html>"#;

    #[tokio::test]
    async fn queries_return_document_order() {
        let page = HtmlPage::new(PAGE);
        let items = page.query_all(None, "li.item").await.unwrap();
        assert_eq!(items.len(), 2);
        assert!(items[0].ordinal < items[1].ordinal);
        assert_eq!(page.text(items[1]).await.unwrap(), "two");
    }

    #[tokio::test]
    async fn scoped_query_only_sees_descendants() {
        let page = HtmlPage::new(PAGE);
        let list = page.query(None, "ul.list").await.unwrap().unwrap();
        assert_eq!(page.query_all(Some(list), "span").await.unwrap().len(), 1);
        assert!(page.query(Some(list), "button").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn invalid_selector_is_reported() {
        let page = HtmlPage::new(PAGE);
        let err = page.query_all(None, "li[").await.unwrap_err();
        assert!(matches!(err, AutoProcessorError::Selector { .. }));
    }

    #[tokio::test]
    async fn typed_value_shadows_attribute() {
        let page = HtmlPage::new(PAGE);
        let input = page.query(None, "#trackingNumber").await.unwrap().unwrap();
        assert_eq!(page.value(input).await.unwrap().as_deref(), Some("TRK-1"));
        page.type_into(input, "TRK-2").unwrap();
        assert_eq!(page.value(input).await.unwrap().as_deref(), Some("TRK-2"));
    }

    #[tokio::test]
    async fn activation_reports_enclosing_control_label() {
        let page = HtmlPage::new(PAGE);
        let mut events = page.subscribe();
        let inner = page.query(None, "button.go i").await.unwrap().unwrap();
        page.activate(inner).await.unwrap();

        match events.recv().await.unwrap() {
            PageEvent::Activated { tag, control_label, .. } => {
                assert_eq!(tag, "i");
                assert_eq!(control_label.as_deref(), Some("Go now"));
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(page.activations().len(), 1);
    }

    #[tokio::test]
    async fn rerender_invalidates_old_handles_and_announces_new_nodes() {
        let page = HtmlPage::new(PAGE).with_host_reaction(|_, el| {
            (el.value().name() == "button").then(|| {
                PAGE.replace(
                    r#"<li class="item"><span>two</span></li>"#,
                    r#"<li class="item"><span>two</span></li><li class="item fresh">three</li>"#,
                )
            })
        });
        let mut events = page.subscribe();
        let button = page.query(None, "button.go").await.unwrap().unwrap();
        page.activate(button).await.unwrap();
        assert_eq!(page.generation(), 1);

        let err = page.text(button).await.unwrap_err();
        assert!(matches!(err, AutoProcessorError::StaleNode { handle: 0, current: 1 }));

        let _activated = events.recv().await.unwrap();
        match events.recv().await.unwrap() {
            PageEvent::NodesAdded { added } => {
                let mut fresh = Vec::new();
                for node in added {
                    if page.matches(node, "li.fresh").await.unwrap() {
                        fresh.push(node);
                    }
                }
                assert_eq!(fresh.len(), 1);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn focus_is_tracked_until_rerender() {
        let page = HtmlPage::new(PAGE);
        let input = page.query(None, "#trackingNumber").await.unwrap().unwrap();
        page.focus(input, true).await.unwrap();
        assert_eq!(page.focused(), Some(FocusState { node: input, selected: true }));
        page.rerender(PAGE);
        assert!(page.focused().is_none());
    }
}
