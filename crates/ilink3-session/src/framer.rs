//! Outbound message framing.
//!
//! Every outbound message is one claim in the reliable log, laid out as:
//!
//! ```text
//! [gateway envelope: connection id, 8 bytes LE]
//! [SOFH: 6 bytes BE]
//! [SBE header: 8 bytes LE]
//! [payload: block_length bytes and up]
//! ```
//!
//! The SOFH length counts itself, the SBE header, and the payload. It never
//! counts the gateway envelope, which is stripped by the gateway before the
//! bytes reach the exchange.

use tracing::debug;

use ilink3_proto::{
    messages::{Establish, Negotiate, RetransmitRequest, Sequence, Terminate},
    template_name, ProtocolError, SbeHeader, Sofh, TemplateMeta,
};

use crate::transport::{ClaimOutcome, Publication};

/// Length of the gateway envelope in front of the SOFH.
pub const GATEWAY_HEADER_LENGTH: usize = 8;

/// Combined length of gateway envelope, SOFH, and SBE header.
pub const HEADER_LENGTH: usize = GATEWAY_HEADER_LENGTH + Sofh::SIZE + SbeHeader::SIZE;

/// Frames outbound messages into the session's exclusive publication.
#[derive(Debug)]
pub struct Framer<P> {
    publication: P,
    connection_id: u64,
}

impl<P: Publication> Framer<P> {
    /// Create a framer over the session's publication.
    pub fn new(publication: P, connection_id: u64) -> Self {
        Self { publication, connection_id }
    }

    /// Connection id written into every gateway envelope.
    #[must_use]
    pub fn connection_id(&self) -> u64 {
        self.connection_id
    }

    /// Claim space for a message with `payload_length` bytes of payload and
    /// write all three headers.
    ///
    /// On success the payload region is zeroed and the caller fills it via
    /// [`Framer::payload_mut`] before committing. Back-pressure and close are
    /// forwarded unchanged.
    pub fn claim(&mut self, payload_length: usize, meta: &TemplateMeta) -> ClaimOutcome {
        let outcome = self.publication.try_claim(HEADER_LENGTH + payload_length);
        let ClaimOutcome::Claimed(_) = outcome else {
            return outcome;
        };

        let buffer = self.publication.claimed_buffer();
        buffer[..GATEWAY_HEADER_LENGTH].copy_from_slice(&self.connection_id.to_le_bytes());

        // INVARIANT: the claim is sized HEADER_LENGTH + payload_length, so
        // both header writes and the zeroing fit.
        #[allow(clippy::expect_used)]
        Sofh::new(payload_length)
            .write_to(&mut buffer[GATEWAY_HEADER_LENGTH..])
            .expect("invariant: claimed buffer sized for headers");
        #[allow(clippy::expect_used)]
        SbeHeader::new(meta)
            .write_to(&mut buffer[GATEWAY_HEADER_LENGTH + Sofh::SIZE..])
            .expect("invariant: claimed buffer sized for headers");

        for slot in &mut buffer[HEADER_LENGTH..] {
            *slot = 0;
        }

        outcome
    }

    /// Payload region of the outstanding claim.
    pub fn payload_mut(&mut self) -> &mut [u8] {
        &mut self.publication.claimed_buffer()[HEADER_LENGTH..]
    }

    /// Publish the outstanding claim.
    pub fn commit(&mut self) {
        self.publication.commit();
    }

    /// Release the outstanding claim without publishing.
    pub fn abort(&mut self) {
        self.publication.abort();
    }

    /// Claim, encode, and commit one fixed session-layer message.
    fn send(
        &mut self,
        meta: &TemplateMeta,
        encode: impl FnOnce(&mut [u8]) -> Result<(), ProtocolError>,
    ) -> Result<ClaimOutcome, ProtocolError> {
        let outcome = self.claim(meta.block_length as usize, meta);
        let ClaimOutcome::Claimed(position) = outcome else {
            return Ok(outcome);
        };

        if let Err(error) = encode(self.payload_mut()) {
            self.abort();
            return Err(error);
        }
        self.commit();

        debug!(
            template = template_name(meta.template_id),
            position, "sent session message"
        );
        Ok(outcome)
    }

    /// Send a Negotiate message.
    ///
    /// # Errors
    ///
    /// - `ProtocolError` if a configured text field overflows its wire width
    pub fn send_negotiate(&mut self, message: &Negotiate) -> Result<ClaimOutcome, ProtocolError> {
        self.send(&Negotiate::TEMPLATE, |body| message.encode(body))
    }

    /// Send an Establish message.
    ///
    /// # Errors
    ///
    /// - `ProtocolError` if a configured text field overflows its wire width
    pub fn send_establish(&mut self, message: &Establish) -> Result<ClaimOutcome, ProtocolError> {
        self.send(&Establish::TEMPLATE, |body| message.encode(body))
    }

    /// Send a Terminate message.
    ///
    /// # Errors
    ///
    /// - `ProtocolError` if encoding fails
    pub fn send_terminate(&mut self, message: &Terminate) -> Result<ClaimOutcome, ProtocolError> {
        self.send(&Terminate::TEMPLATE, |body| message.encode(body))
    }

    /// Send a Sequence message.
    ///
    /// # Errors
    ///
    /// - `ProtocolError` if encoding fails
    pub fn send_sequence(&mut self, message: &Sequence) -> Result<ClaimOutcome, ProtocolError> {
        self.send(&Sequence::TEMPLATE, |body| message.encode(body))
    }

    /// Send a RetransmitRequest message.
    ///
    /// # Errors
    ///
    /// - `ProtocolError` if encoding fails
    pub fn send_retransmit_request(
        &mut self,
        message: &RetransmitRequest,
    ) -> Result<ClaimOutcome, ProtocolError> {
        self.send(&RetransmitRequest::TEMPLATE, |body| message.encode(body))
    }
}
