//! Detection and automation engine.
//!
//! Signals feed the [`trigger::ScanTrigger`], which debounces them into
//! scan passes. A [`scanner::Scanner`] pass selects at most one eligible row
//! and hands it to the [`processor::Processor`], which drives the host
//! page's edit dialog. [`monitor::Monitor`] wires it all together for one
//! session.

pub mod ledger;
pub mod monitor;
pub mod processor;
pub mod scanner;
pub mod signals;
pub mod state;
pub mod trigger;
