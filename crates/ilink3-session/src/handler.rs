//! Caller-facing handler surface.
//!
//! The session dispatches inbound traffic and fatal errors to a
//! [`SessionHandler`] supplied at construction. All callbacks run on the
//! poller thread. A callback must not re-enter `try_claim` or `terminate`;
//! the one documented exception is `on_not_applied`, which records its choice
//! on the [`NotAppliedResponse`] and returns.

use crate::error::SessionError;

/// Callbacks consumed by the session core.
pub trait SessionHandler {
    /// An in-order or retransmitted business message.
    ///
    /// `body` is the SBE message body (after the SBE header). `poss_retrans`
    /// is true when the message is a retransmission.
    fn on_business_message(
        &mut self,
        template_id: u16,
        body: &[u8],
        block_length: u16,
        version: u16,
        poss_retrans: bool,
    );

    /// The exchange did not apply outbound messages
    /// `[from_seq_no, from_seq_no + msg_count)`.
    ///
    /// Record the choice on `response`: [`NotAppliedResponse::retransmit`] to
    /// replay the run from the archive, [`NotAppliedResponse::gap_fill`] to
    /// skip it with a Sequence message. The default is gap fill.
    fn on_not_applied(&mut self, from_seq_no: u64, msg_count: u64, response: &mut NotAppliedResponse) {
        let _ = (from_seq_no, msg_count);
        response.gap_fill();
    }

    /// The exchange rejected a retransmit request.
    fn on_retransmit_reject(&mut self, reason: &str, request_timestamp: i64, error_codes: u16) {
        let _ = (reason, request_timestamp, error_codes);
    }

    /// A Sequence message arrived from the peer.
    fn on_sequence(&mut self, uuid: u64, next_seq_no: u64) {
        let _ = (uuid, next_seq_no);
    }

    /// A fatal session error after the session was established.
    fn on_error(&mut self, error: &SessionError);

    /// The session unbound or asked the owner to drop the connection.
    fn on_disconnect(&mut self);
}

/// Mutable response record for [`SessionHandler::on_not_applied`].
///
/// The handler sets a choice synchronously; the session acts on it after the
/// callback returns.
#[derive(Debug)]
pub struct NotAppliedResponse {
    retransmit: bool,
}

impl NotAppliedResponse {
    pub(crate) fn new() -> Self {
        Self { retransmit: false }
    }

    /// Replay the unapplied messages from the gateway archive.
    pub fn retransmit(&mut self) {
        self.retransmit = true;
    }

    /// Skip the unapplied messages with a Sequence message.
    pub fn gap_fill(&mut self) {
        self.retransmit = false;
    }

    /// Whether the handler chose to retransmit.
    #[must_use]
    pub fn should_retransmit(&self) -> bool {
        self.retransmit
    }
}
