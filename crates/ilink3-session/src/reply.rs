//! One-shot initiator reply.
//!
//! The initiator of a connection learns exactly once whether the session
//! reached Established or failed during Negotiate/Establish. The session
//! holds the write side ([`InitiateReply`]); the initiator polls the read
//! side ([`InitiateHandle`]) between duty cycles. Single-threaded by the
//! session's concurrency contract, so plain `Rc` sharing suffices.

use std::{cell::RefCell, rc::Rc};

use crate::error::SessionError;

type Slot = Rc<RefCell<Option<Result<u64, SessionError>>>>;

/// Write side: resolved by the session at most once.
#[derive(Debug)]
pub(crate) struct InitiateReply {
    slot: Slot,
}

/// Read side: polled by the initiator.
#[derive(Debug, Clone)]
pub struct InitiateHandle {
    slot: Slot,
}

/// Create a connected reply/handle pair.
pub(crate) fn initiate_reply_pair() -> (InitiateReply, InitiateHandle) {
    let slot: Slot = Rc::new(RefCell::new(None));
    (InitiateReply { slot: Rc::clone(&slot) }, InitiateHandle { slot })
}

impl InitiateReply {
    /// Resolve with the established session's uuid.
    ///
    /// Resolving twice is a bug in the state machine; debug builds assert.
    pub(crate) fn succeed(&mut self, uuid: u64) {
        let mut slot = self.slot.borrow_mut();
        debug_assert!(slot.is_none(), "initiate reply resolved twice");
        if slot.is_none() {
            *slot = Some(Ok(uuid));
        }
    }

    /// Resolve with a failure unless already resolved.
    ///
    /// Returns whether this call delivered the error. A failure arriving
    /// after Established is legitimate and is routed to the handler by the
    /// caller instead.
    pub(crate) fn try_fail(&mut self, error: SessionError) -> bool {
        let mut slot = self.slot.borrow_mut();
        if slot.is_some() {
            return false;
        }
        *slot = Some(Err(error));
        true
    }
}

impl InitiateHandle {
    /// The outcome, once resolved. `None` while the handshake is in flight.
    #[must_use]
    pub fn try_outcome(&self) -> Option<Result<u64, SessionError>> {
        self.slot.borrow().clone()
    }

    /// Whether the reply has been resolved either way.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.slot.borrow().is_some()
    }
}
