//! Port definitions (hexagonal architecture interfaces)
//!
//! Ports are the interfaces the core depends on; their implementations
//! live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IShareConnector`] / [`IShareSession`] / [`IShareSink`] - Remote share access
//! - [`IFileSource`] - Re-openable byte source for an inbound file

pub mod file_source;
pub mod remote_share;

pub use file_source::{ByteStream, IFileSource, SourceRejected};
pub use remote_share::{IShareConnector, IShareSession, IShareSink, ShareError, ShareErrorKind};
