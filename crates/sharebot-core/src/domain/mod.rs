//! Domain entities and business logic
//!
//! This module contains the core domain types for ShareBot:
//! - Newtypes for identifiers, share paths and file names
//! - Inbound file events and the outcome of relaying them
//! - Target naming with collision avoidance
//! - Sender authorization
//! - Retry schedules
//! - Domain-specific error types

pub mod authorization;
pub mod errors;
pub mod inbound;
pub mod naming;
pub mod newtypes;
pub mod outcome;
pub mod retry;
pub mod target_path;

// Re-export commonly used types
pub use authorization::{Authorizer, SingleUserAuthorizer};
pub use errors::DomainError;
pub use inbound::{InboundFile, MediaKind};
pub use naming::FileNamer;
pub use newtypes::*;
pub use outcome::{TransferErrorKind, TransferOutcome};
pub use retry::RetryPolicy;
pub use target_path::TargetPath;
