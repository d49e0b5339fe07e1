//! Sender authorization
//!
//! The relay serves a single principal. Authorization is an injectable
//! predicate so the messaging adapter and tests can swap it freely.

use super::newtypes::SenderId;

/// Decides whether a sender may use the relay
pub trait Authorizer: Send + Sync {
    fn is_authorized(&self, sender: SenderId) -> bool;
}

impl<F> Authorizer for F
where
    F: Fn(SenderId) -> bool + Send + Sync,
{
    fn is_authorized(&self, sender: SenderId) -> bool {
        self(sender)
    }
}

/// Allows exactly one configured sender
///
/// With no sender configured every request is denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SingleUserAuthorizer {
    allowed: Option<SenderId>,
}

impl SingleUserAuthorizer {
    pub fn new(allowed: Option<SenderId>) -> Self {
        Self { allowed }
    }

    pub fn allowed(&self) -> Option<SenderId> {
        self.allowed
    }
}

impl Authorizer for SingleUserAuthorizer {
    fn is_authorized(&self, sender: SenderId) -> bool {
        self.allowed == Some(sender)
    }
}
