//! Library root for the `nebula_log` crate
//!
//! A small persisted action log: an append-only event store, a report builder
//! that snapshots it, and exporters to text, spreadsheet and PDF.

// Core error handling
pub mod errors;

// Event log
pub mod event;
pub mod event_store;
pub mod recorder;

// Reporting & export
pub mod report;
pub mod exporter;
pub mod export_text;
#[cfg(feature = "spreadsheet")]
pub mod export_xlsx;
#[cfg(feature = "document")]
pub mod export_pdf;

// Action sources
pub mod actions;

// Configuration & CLI
pub mod cli;
pub mod config;

// Logging
pub mod log_sink;


pub use errors::{NebulaError, NebulaResult};
pub use event::EventRecord;
pub use event_store::{AppendHandle, EventStore};
pub use recorder::Recorder;
pub use report::{ReportBuilder, Snapshot, SnapshotSource};
