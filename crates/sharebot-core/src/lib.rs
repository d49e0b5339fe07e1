//! ShareBot Core - Domain logic and the file transfer pipeline
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `InboundFile`, `TargetPath`, `TransferOutcome`, `FileNamer`
//! - **Use cases** - `RemoteShareClient`, `TransferPipeline`, `StatusReporter`
//! - **Port definitions** - Traits for adapters: `IShareConnector`, `IShareSession`,
//!   `IShareSink`, `IFileSource`
//!
//! # Architecture
//!
//! The domain module contains pure business logic with no I/O.
//! Ports define trait interfaces that adapter crates implement (the SMB and
//! mounted-share backends in `sharebot-share`, the Telegram file source in
//! `sharebot-telegram`). Use cases orchestrate domain values through the ports.

pub mod config;
pub mod domain;
pub mod ports;
pub mod usecases;

#[cfg(test)]
pub(crate) mod testing;
