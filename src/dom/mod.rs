//! Read-mostly view of the host page.
//!
//! The engine never touches the page directly: it goes through [`UiTree`],
//! which exposes structural queries, text/value reads, and synthetic
//! activation. [`page::HtmlPage`] is the in-process implementation over a
//! parsed HTML document.

pub mod events;
pub mod locate;
pub mod page;
pub mod traits;
pub mod types;
pub mod wait;

#[cfg(test)]
pub(crate) mod fixtures;

pub use traits::UiTree;
pub use types::NodeHandle;
