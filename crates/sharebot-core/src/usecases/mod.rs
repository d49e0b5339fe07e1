//! Use cases (interactors) for ShareBot
//!
//! Use cases orchestrate domain types and port interfaces. Business rules
//! stay in the domain; I/O goes through the ports.
//!
//! ## Use Cases
//!
//! - [`RemoteShareClient`] - Cached, self-healing session to the share
//! - [`TransferPipeline`] - Relays one inbound file onto the share
//! - [`StatusReporter`] - Share health plus pipeline counters

pub mod report_status;
pub mod share_client;
pub mod tracker;
pub mod transfer_file;

pub use report_status::{ShareSummary, StatusReport, StatusReporter};
pub use share_client::{RemoteShareClient, ShareHealth};
pub use tracker::{OutcomeTracker, RecordedOutcome, TrackerSnapshot};
pub use transfer_file::{TransferPipeline, TransferSettings};
