//! Session state machine.
//!
//! Drives the Negotiate -> Establish -> Established lifecycle for one iLink3
//! session, including keepalive, sequence-gap handling with bounded chunked
//! retransmit requests, back-pressure retry, and the terminate handshake.
//! Methods take time as input and perform sends through the [`Framer`]; all
//! suspension is expressed as state observed on successive [`Session::poll`]
//! calls. Single-threaded by contract: every method runs on the poller
//! thread.
//!
//! # State machine
//!
//! ```text
//! Connected ──Negotiate──> SentNegotiate ──resend──> RetryNegotiate
//!     │                         │ NegotiationResponse      │ timeout
//!     │ (re-establish)          v                          v
//!     │                     Negotiated ──Establish──> SentEstablish ──resend──> RetryEstablish
//!     │                                                    │ EstablishmentAck        │ timeout
//!     └────────────────────────────────────────────────────┤                         v
//!                                                          v                      Unbound
//!            AwaitingKeepalive <──interval lapsed── Established ──NotApplied──> Retransmitting
//!                   │ 2nd lapse                          │ terminate
//!                   v                                    v
//!               Unbinding <──(parked on pressure: ResendTerminate / ResendTerminateAck)
//!                   │ Terminate ack or timeout
//!                   v
//!                Unbound
//! ```

use std::collections::VecDeque;

use tracing::{debug, warn};

use ilink3_crypto::{establish_canonical_request, negotiate_canonical_request, UserKey};
use ilink3_proto::{
    field_offsets,
    messages::{
        Establish, EstablishmentAck, EstablishmentReject, FaultToleranceIndicator, KeepAliveLapsed,
        Negotiate, NegotiationReject, NegotiationResponse, NotApplied, RetransmitReject,
        RetransmitRequest, Retransmission, Sequence, Terminate,
    },
    template_name, ProtocolError, SbeHeader, Sofh, TemplateMeta, MISSING_OFFSET, SCHEMA_ID,
};

use crate::{
    config::{InitialSequenceNumber, SessionConfig, WrongUuidPolicy},
    error::{DisconnectReason, SessionError},
    framer::Framer,
    handler::{NotAppliedResponse, SessionHandler},
    reply::{initiate_reply_pair, InitiateHandle, InitiateReply},
    transport::{ClaimOutcome, CloseReason, Publication, Replayer},
};

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Transport connected, nothing sent yet.
    Connected,
    /// Negotiate sent, awaiting NegotiationResponse.
    SentNegotiate,
    /// Negotiate resent once; the next timeout fails the initiator.
    RetryNegotiate,
    /// NegotiationResponse accepted, Establish not yet sent.
    Negotiated,
    /// Exchange rejected the Negotiate.
    NegotiateRejected,
    /// Establish sent, awaiting EstablishmentAck.
    SentEstablish,
    /// Establish resent once; the next timeout fails the initiator.
    RetryEstablish,
    /// Session established, application traffic flowing.
    Established,
    /// Our keepalive interval lapsed without inbound traffic; one Sequence
    /// probe sent. A second lapse terminates.
    AwaitingKeepalive,
    /// NotApplied being serviced; awaiting replay completion.
    Retransmitting,
    /// A locally-initiated Terminate is parked on back-pressure.
    ResendTerminate,
    /// A Terminate acknowledgement is parked on back-pressure.
    ResendTerminateAck,
    /// Terminate sent, awaiting the peer's Terminate.
    Unbinding,
    /// Session over; the owner destroys it.
    Unbound,
    /// Exchange rejected the Establish.
    EstablishRejected,
}

/// Identifiers and recovery inputs assigned by the owning gateway at
/// connection time.
#[derive(Debug, Clone, Copy)]
pub struct SessionContext {
    /// 64-bit session uuid chosen by the client for this logical session.
    pub uuid: u64,
    /// Transport connection id written into every gateway envelope.
    pub connection_id: u64,
    /// Whether the uuid was freshly allocated (no prior session to resume).
    pub newly_allocated: bool,
    /// Last sequence number sent under this uuid, if any.
    pub last_sent_seq_no: Option<u64>,
    /// Last sequence number received under this uuid, if any.
    pub last_received_seq_no: Option<u64>,
}

/// Outcome of processing one inbound event.
///
/// `Applied` covers parked-for-retry outcomes too: once a send is parked the
/// session completes it on later polls without outside help. `BackPressured`
/// means nothing was mutated and the transport should redeliver the event on
/// the next poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum Handled {
    /// Event fully processed (including parked-for-retry outcomes).
    Applied,
    /// Transport back-pressure with nothing parked; redeliver the event.
    BackPressured,
}

/// A pending retransmit range not yet requested.
///
/// The in-flight chunk is never stored here; only chunks waiting behind it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RetransmitChunk {
    from_seq_no: u64,
    msg_count: u64,
}

/// A Terminate that could not be sent because the transport was pressured.
#[derive(Debug, Clone)]
struct ParkedTerminate {
    reason: String,
    error_codes: u16,
}

/// Choice recorded by `on_not_applied`, kept for retry when the send it
/// implies was back-pressured.
#[derive(Debug, Clone, Copy)]
struct PendingNotApplied {
    from_seq_no: u64,
    msg_count: u64,
    retransmit: bool,
}

/// Negotiate/Establish are each sent at most twice before timing out.
const HANDSHAKE_ATTEMPTS: u32 = 2;

/// Client-side iLink3 session.
pub struct Session<P, H, R> {
    config: SessionConfig,
    user_key: UserKey,
    framer: Framer<P>,
    handler: H,
    replayer: R,

    state: SessionState,
    uuid: u64,
    can_re_establish: bool,

    next_sent_seq_no: u64,
    next_recv_seq_no: u64,
    retransmit_fill_seq_no: Option<u64>,
    retransmit_queue: VecDeque<RetransmitChunk>,
    retransmit_limit: u64,

    last_negotiate_request_timestamp: i64,
    last_establish_request_timestamp: i64,

    resend_time_ms: i64,
    next_receive_message_time_ms: i64,
    next_send_message_time_ms: i64,

    backpressured_not_applied: Option<PendingNotApplied>,
    resend_terminate: Option<ParkedTerminate>,

    initiate_reply: InitiateReply,
    disconnect_reason: Option<DisconnectReason>,
}

impl<P, H, R> Session<P, H, R>
where
    P: Publication,
    H: SessionHandler,
    R: Replayer,
{
    /// Create a session over a freshly connected transport.
    ///
    /// Validates configured text fields against their wire widths and decodes
    /// the user key once. The returned [`InitiateHandle`] resolves exactly
    /// once, on Established or on Negotiate/Establish failure.
    ///
    /// # Errors
    ///
    /// - `SessionError::Protocol` if a configured field overflows its width
    /// - `SessionError::Signature` if the user key cannot be decoded
    pub fn new(
        config: SessionConfig,
        publication: P,
        handler: H,
        replayer: R,
        context: SessionContext,
        now_ms: i64,
    ) -> Result<(Self, InitiateHandle), SessionError> {
        validate_width("session", &config.session_id, 3)?;
        validate_width("firm", &config.firm_id, 5)?;
        validate_width("accessKeyId", &config.access_key_id, 20)?;
        validate_width("tradingSystemName", &config.trading_system_name, 30)?;
        validate_width("tradingSystemVersion", &config.trading_system_version, 10)?;
        validate_width("tradingSystemVendor", &config.trading_system_vendor, 10)?;

        let user_key = UserKey::decode(&config.user_key)?;

        let re_establish = config.re_establish_last_session;
        let next_sent_seq_no = initial_sequence_number(
            config.initial_sent_sequence_number,
            context.last_sent_seq_no,
            re_establish,
        );
        let next_recv_seq_no = initial_sequence_number(
            config.initial_received_sequence_number,
            context.last_received_seq_no,
            re_establish,
        );

        // The wire field is a u16 and a request for zero is meaningless.
        let retransmit_limit =
            u64::from(config.retransmit_request_message_limit.clamp(1, u32::from(u16::MAX)));

        let (initiate_reply, initiate_handle) = initiate_reply_pair();

        let session = Self {
            can_re_establish: re_establish && !context.newly_allocated,
            user_key,
            framer: Framer::new(publication, context.connection_id),
            handler,
            replayer,
            state: SessionState::Connected,
            uuid: context.uuid,
            next_sent_seq_no,
            next_recv_seq_no,
            retransmit_fill_seq_no: None,
            retransmit_queue: VecDeque::new(),
            retransmit_limit,
            last_negotiate_request_timestamp: 0,
            last_establish_request_timestamp: 0,
            resend_time_ms: now_ms,
            next_receive_message_time_ms: 0,
            next_send_message_time_ms: 0,
            backpressured_not_applied: None,
            resend_terminate: None,
            initiate_reply,
            disconnect_reason: None,
            config,
        };
        Ok((session, initiate_handle))
    }

    /// Session uuid.
    #[must_use]
    pub fn uuid(&self) -> u64 {
        self.uuid
    }

    /// Transport connection id.
    #[must_use]
    pub fn connection_id(&self) -> u64 {
        self.framer.connection_id()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Sequence number stamped on the next outbound application message.
    #[must_use]
    pub fn next_sent_seq_no(&self) -> u64 {
        self.next_sent_seq_no
    }

    /// Sequence number expected on the next in-order inbound message.
    #[must_use]
    pub fn next_recv_seq_no(&self) -> u64 {
        self.next_recv_seq_no
    }

    /// Last sequence number of the retransmit currently in flight. `None`
    /// when no retransmit is awaited.
    #[must_use]
    pub fn retransmit_fill_seq_no(&self) -> Option<u64> {
        self.retransmit_fill_seq_no
    }

    /// Number of retransmit chunks queued behind the in-flight request.
    #[must_use]
    pub fn retransmit_queue_len(&self) -> usize {
        self.retransmit_queue.len()
    }

    /// Why the session asked the owner to drop the connection, if it has.
    #[must_use]
    pub fn disconnect_reason(&self) -> Option<DisconnectReason> {
        self.disconnect_reason
    }

    // ---------------------------------------------------------------- poll

    /// Drive timers and retries. Returns the number of work items performed.
    pub fn poll(&mut self, now_ms: i64, now_ns: i64) -> i32 {
        match self.state {
            SessionState::Connected => {
                let sent = if self.can_re_establish {
                    self.send_establish(now_ms, now_ns)
                } else {
                    self.send_negotiate(now_ms, now_ns)
                };
                work(sent)
            }
            SessionState::SentNegotiate => {
                if now_ms > self.resend_time_ms {
                    work(self.send_negotiate(now_ms, now_ns))
                } else {
                    0
                }
            }
            SessionState::RetryNegotiate => {
                if now_ms > self.resend_time_ms {
                    self.report_error(SessionError::NegotiateTimeout {
                        attempts: HANDSHAKE_ATTEMPTS,
                    });
                    self.fully_unbind();
                    1
                } else {
                    0
                }
            }
            SessionState::Negotiated => work(self.send_establish(now_ms, now_ns)),
            SessionState::SentEstablish => {
                if now_ms > self.resend_time_ms {
                    work(self.send_establish(now_ms, now_ns))
                } else {
                    0
                }
            }
            SessionState::RetryEstablish => {
                if now_ms > self.resend_time_ms {
                    self.report_error(SessionError::EstablishTimeout {
                        attempts: HANDSHAKE_ATTEMPTS,
                    });
                    self.fully_unbind();
                    1
                } else {
                    0
                }
            }
            SessionState::Established => self.poll_established(now_ms),
            SessionState::AwaitingKeepalive => {
                if now_ms > self.next_receive_message_time_ms {
                    let reason = format!(
                        "{}ms expired without message",
                        2 * self.config.keep_alive_interval_ms
                    );
                    let _ = self.send_terminate(
                        reason,
                        0,
                        now_ms,
                        now_ns,
                        SessionState::ResendTerminate,
                        SessionState::Unbinding,
                    );
                    1
                } else {
                    0
                }
            }
            SessionState::Retransmitting => {
                if let Some(pending) = self.backpressured_not_applied.take() {
                    // Retry without re-entering the handler
                    let _ = self.apply_not_applied_choice(
                        pending.from_seq_no,
                        pending.msg_count,
                        pending.retransmit,
                        now_ms,
                    );
                    1
                } else {
                    0
                }
            }
            SessionState::ResendTerminate => {
                self.retry_parked_terminate(now_ms, now_ns, SessionState::Unbinding)
            }
            SessionState::ResendTerminateAck => {
                self.retry_parked_terminate(now_ms, now_ns, SessionState::Unbound)
            }
            SessionState::Unbinding => {
                if now_ms > self.next_send_message_time_ms {
                    self.fully_unbind();
                    1
                } else {
                    0
                }
            }
            SessionState::Unbound
            | SessionState::NegotiateRejected
            | SessionState::EstablishRejected => 0,
        }
    }

    fn poll_established(&mut self, now_ms: i64) -> i32 {
        if now_ms > self.next_receive_message_time_ms {
            if self.send_sequence(KeepAliveLapsed::Lapsed, now_ms) == Handled::Applied {
                self.next_receive_message_time_ms = now_ms + self.config.keep_alive_interval_ms;
                self.state = SessionState::AwaitingKeepalive;
                1
            } else {
                0
            }
        } else if now_ms > self.next_send_message_time_ms {
            work(self.send_sequence(KeepAliveLapsed::NotLapsed, now_ms))
        } else {
            0
        }
    }

    // ------------------------------------------------------- claim/commit

    /// Reserve space for an outbound application message.
    ///
    /// Valid only in `Established` or `AwaitingKeepalive`. On success the
    /// payload's `seqNum` (when the template carries one) is stamped with the
    /// current send sequence number, which is then incremented;
    /// `sendingTimeEpoch` is stamped with `now_ns`; `possRetrans` is left at
    /// its zeroed false value. Fill the rest via [`Session::payload_mut`] and
    /// call [`Session::commit`].
    ///
    /// On back-pressure no session state changes; a later retry stamps the
    /// same sequence number.
    ///
    /// # Errors
    ///
    /// - `SessionError::InvalidState` outside `Established` /
    ///   `AwaitingKeepalive`; session state is not mutated
    pub fn try_claim(
        &mut self,
        meta: &TemplateMeta,
        payload_length: usize,
        now_ns: i64,
    ) -> Result<ClaimOutcome, SessionError> {
        if !matches!(self.state, SessionState::Established | SessionState::AwaitingKeepalive) {
            return Err(SessionError::InvalidState { state: self.state, operation: "try_claim" });
        }

        let outcome = self.framer.claim(payload_length, meta);
        if let ClaimOutcome::Claimed(_) = outcome {
            let offsets = field_offsets(meta.template_id);
            let seq_no = self.next_sent_seq_no;
            let payload = self.framer.payload_mut();
            if offsets.seq_num != MISSING_OFFSET {
                let at = offsets.seq_num as usize;
                payload[at..at + 4].copy_from_slice(&(seq_no as u32).to_le_bytes());
            }
            if offsets.sending_time_epoch != MISSING_OFFSET {
                let at = offsets.sending_time_epoch as usize;
                payload[at..at + 8].copy_from_slice(&(now_ns as u64).to_le_bytes());
            }
            if offsets.seq_num != MISSING_OFFSET {
                self.next_sent_seq_no += 1;
            }
        }
        Ok(outcome)
    }

    /// Payload region of the claim opened by [`Session::try_claim`].
    pub fn payload_mut(&mut self) -> &mut [u8] {
        self.framer.payload_mut()
    }

    /// Publish the claimed message and push out the send keepalive deadline.
    pub fn commit(&mut self, now_ms: i64) {
        self.framer.commit();
        self.next_send_message_time_ms = now_ms + self.config.keep_alive_interval_ms;
    }

    /// Release the claim opened by [`Session::try_claim`] without publishing.
    ///
    /// The stamped sequence number is rolled back so the next claim reuses
    /// it.
    pub fn abort(&mut self, meta: &TemplateMeta) {
        self.framer.abort();
        if field_offsets(meta.template_id).seq_num != MISSING_OFFSET {
            self.next_sent_seq_no -= 1;
        }
    }

    /// Terminate the session with a reason and error codes.
    ///
    /// On back-pressure the Terminate is parked and retried on the next poll.
    ///
    /// # Errors
    ///
    /// - `SessionError::InvalidState` outside `Established` /
    ///   `AwaitingKeepalive`; session state is not mutated
    pub fn terminate(
        &mut self,
        reason: &str,
        error_codes: u16,
        now_ms: i64,
        now_ns: i64,
    ) -> Result<Handled, SessionError> {
        if !matches!(self.state, SessionState::Established | SessionState::AwaitingKeepalive) {
            return Err(SessionError::InvalidState { state: self.state, operation: "terminate" });
        }
        Ok(self.send_terminate(
            reason.to_string(),
            error_codes,
            now_ms,
            now_ns,
            SessionState::ResendTerminate,
            SessionState::Unbinding,
        ))
    }

    /// Ask the owner to drop the transport connection.
    pub fn request_disconnect(&mut self, reason: DisconnectReason) {
        warn!(uuid = self.uuid, ?reason, "requesting disconnect");
        self.disconnect_reason = Some(reason);
        self.handler.on_disconnect();
    }

    // ------------------------------------------------------ inbound frames

    /// Parse one SOFH-framed inbound message and dispatch it.
    ///
    /// `frame` starts at the SOFH. `Handled::BackPressured` means the frame
    /// must be redelivered on the next poll.
    ///
    /// # Errors
    ///
    /// - `SessionError::Protocol` on truncated or malformed framing
    pub fn on_frame(
        &mut self,
        frame: &[u8],
        now_ms: i64,
        now_ns: i64,
    ) -> Result<Handled, SessionError> {
        let sofh = Sofh::from_bytes(frame)?;
        let total = sofh.message_length() as usize;
        if frame.len() < total {
            return Err(ProtocolError::FrameTruncated { expected: total, actual: frame.len() }
                .into());
        }

        let after_sofh = &frame[Sofh::SIZE..total];
        let header = SbeHeader::from_bytes(after_sofh)?;
        if header.schema_id() != SCHEMA_ID {
            warn!(schema_id = header.schema_id(), "foreign schema id on inbound message");
        }

        let body = &after_sofh[SbeHeader::SIZE..];
        let block = header.block_length() as usize;
        if body.len() < block {
            return Err(ProtocolError::FrameTruncated { expected: block, actual: body.len() }
                .into());
        }

        match header.template_id() {
            501 => Ok(self.on_negotiation_response(&NegotiationResponse::decode(body)?, now_ms, now_ns)),
            502 => Ok(self.on_negotiation_reject(&NegotiationReject::decode(body)?)),
            504 => Ok(self.on_establishment_ack(&EstablishmentAck::decode(body)?, now_ms, now_ns)),
            505 => Ok(self.on_establishment_reject(&EstablishmentReject::decode(body)?)),
            506 => Ok(self.on_sequence(&Sequence::decode(body)?, now_ms, now_ns)),
            507 => Ok(self.on_terminate(&Terminate::decode(body)?, now_ms, now_ns)),
            509 => Ok(self.on_retransmission(&Retransmission::decode(body)?, now_ms)),
            510 => Ok(self.on_retransmit_reject(&RetransmitReject::decode(body)?, now_ms, now_ns)),
            513 => Ok(self.on_not_applied(&NotApplied::decode(body)?, now_ms, now_ns)),
            id @ (500 | 503 | 508) => {
                warn!(template = template_name(id), "client-side template arrived inbound");
                Ok(Handled::Applied)
            }
            id if id < 500 => Err(ProtocolError::UnknownTemplate(id).into()),
            id => Ok(self.on_message(body, id, header.block_length(), header.version(), now_ms, now_ns)),
        }
    }

    /// NegotiationResponse: echo-check, then move to Negotiated and send
    /// Establish immediately.
    ///
    /// Discarded outside `SentNegotiate`/`RetryNegotiate`: a response to a
    /// request this session has not outstanding proves nothing.
    pub fn on_negotiation_response(
        &mut self,
        response: &NegotiationResponse,
        now_ms: i64,
        now_ns: i64,
    ) -> Handled {
        if !matches!(self.state, SessionState::SentNegotiate | SessionState::RetryNegotiate) {
            debug!(state = ?self.state, "discarding NegotiationResponse outside negotiation");
            return Handled::Applied;
        }

        if response.uuid != self.uuid
            || response.request_timestamp as i64 != self.last_negotiate_request_timestamp
        {
            self.fail_authentication(SessionError::IllegalResponse {
                message: "NegotiationResponse",
                expected_uuid: self.uuid,
                received_uuid: response.uuid,
                expected_timestamp: self.last_negotiate_request_timestamp,
                received_timestamp: response.request_timestamp as i64,
            });
            return Handled::Applied;
        }

        self.state = SessionState::Negotiated;
        // Pressure here is fine: the Negotiated poll branch retries.
        let _ = self.send_establish(now_ms, now_ns);
        Handled::Applied
    }

    /// NegotiationReject: report to the initiator and disconnect.
    pub fn on_negotiation_reject(&mut self, reject: &NegotiationReject) -> Handled {
        if !matches!(self.state, SessionState::SentNegotiate | SessionState::RetryNegotiate) {
            debug!(state = ?self.state, "discarding NegotiationReject outside negotiation");
            return Handled::Applied;
        }

        warn!(uuid = self.uuid, reason = %reject.reason, "negotiate rejected");
        self.state = SessionState::NegotiateRejected;
        self.report_error(SessionError::NegotiateRejected {
            reason: reject.reason.clone(),
            error_codes: reject.error_codes,
        });
        self.request_disconnect(DisconnectReason::NegotiateRejected);
        Handled::Applied
    }

    /// EstablishmentAck: echo-check, establish, resolve the initiator, and
    /// recover any gap against the previous session.
    pub fn on_establishment_ack(
        &mut self,
        ack: &EstablishmentAck,
        now_ms: i64,
        now_ns: i64,
    ) -> Handled {
        if !matches!(
            self.state,
            SessionState::SentEstablish
                | SessionState::RetryEstablish
                | SessionState::Established
                | SessionState::AwaitingKeepalive
        ) {
            debug!(state = ?self.state, "discarding EstablishmentAck outside establishment");
            return Handled::Applied;
        }

        if ack.uuid != self.uuid
            || ack.request_timestamp as i64 != self.last_establish_request_timestamp
        {
            self.fail_authentication(SessionError::IllegalResponse {
                message: "EstablishmentAck",
                expected_uuid: self.uuid,
                received_uuid: ack.uuid,
                expected_timestamp: self.last_establish_request_timestamp,
                received_timestamp: ack.request_timestamp as i64,
            });
            return Handled::Applied;
        }

        let already_established =
            matches!(self.state, SessionState::Established | SessionState::AwaitingKeepalive);
        self.state = SessionState::Established;
        self.next_receive_message_time_ms = now_ms + self.config.keep_alive_interval_ms;
        self.next_send_message_time_ms = now_ms + self.config.keep_alive_interval_ms;
        if !already_established {
            self.initiate_reply.succeed(self.uuid);
            debug!(uuid = self.uuid, next_seq_no = ack.next_seq_no, "session established");
        }

        // Messages sent under the same uuid before this establish that we
        // never received.
        if ack.previous_uuid == self.uuid && ack.previous_seq_no + 1 > self.next_recv_seq_no {
            let end = ack.previous_seq_no + 1;
            let handled = self.request_retransmit_range(self.next_recv_seq_no, end, end, now_ns);
            if handled == Handled::BackPressured {
                // The gap reappears on the next out-of-order business message
                warn!(uuid = self.uuid, "establish-time retransmit request pressured; deferring");
            }
        }

        if let Some(handled) = self.check_low_sequence_number(ack.next_seq_no, now_ms, now_ns) {
            return handled;
        }
        Handled::Applied
    }

    /// EstablishmentReject: report to the initiator and disconnect.
    pub fn on_establishment_reject(&mut self, reject: &EstablishmentReject) -> Handled {
        if !matches!(self.state, SessionState::SentEstablish | SessionState::RetryEstablish) {
            debug!(state = ?self.state, "discarding EstablishmentReject outside establishment");
            return Handled::Applied;
        }

        warn!(uuid = self.uuid, reason = %reject.reason, "establish rejected");
        self.state = SessionState::EstablishRejected;
        self.report_error(SessionError::EstablishRejected {
            reason: reject.reason.clone(),
            error_codes: reject.error_codes,
        });
        self.request_disconnect(DisconnectReason::EstablishRejected);
        Handled::Applied
    }

    /// Terminate from the peer: finish our unbind, or acknowledge and unbind.
    pub fn on_terminate(&mut self, terminate: &Terminate, now_ms: i64, now_ns: i64) -> Handled {
        if self.is_over() {
            debug!(state = ?self.state, "discarding Terminate on a finished session");
            return Handled::Applied;
        }

        if terminate.uuid != self.uuid {
            warn!(
                uuid = self.uuid,
                received = terminate.uuid,
                "terminate carried a foreign uuid"
            );
        }
        debug!(reason = %terminate.reason, error_codes = terminate.error_codes, "peer terminate");

        if self.state == SessionState::Unbinding {
            self.fully_unbind();
            return Handled::Applied;
        }

        self.send_terminate(
            terminate.reason.clone(),
            terminate.error_codes,
            now_ms,
            now_ns,
            SessionState::ResendTerminateAck,
            SessionState::Unbound,
        )
    }

    /// Sequence from the peer.
    ///
    /// A `next_seq_no` above the expected value jumps the receive counter
    /// forward WITHOUT a retransmit request; only business messages open the
    /// gap workflow. A value below it terminates the session.
    pub fn on_sequence(&mut self, sequence: &Sequence, now_ms: i64, now_ns: i64) -> Handled {
        if self.is_over() {
            debug!(state = ?self.state, "discarding Sequence on a finished session");
            return Handled::Applied;
        }

        if sequence.uuid != self.uuid {
            warn!(uuid = self.uuid, received = sequence.uuid, "sequence carried a foreign uuid");
            return Handled::Applied;
        }

        self.refresh_receive_timer(now_ms);
        self.handler.on_sequence(sequence.uuid, sequence.next_seq_no);

        if let Some(handled) = self.check_low_sequence_number(sequence.next_seq_no, now_ms, now_ns)
        {
            return handled;
        }
        self.next_recv_seq_no = sequence.next_seq_no;

        if sequence.keep_alive_lapsed == KeepAliveLapsed::Lapsed {
            return self.send_sequence(KeepAliveLapsed::NotLapsed, now_ms);
        }
        Handled::Applied
    }

    /// NotApplied: let the handler choose between replaying the run and
    /// gap-filling it with a Sequence.
    pub fn on_not_applied(&mut self, not_applied: &NotApplied, now_ms: i64, now_ns: i64) -> Handled {
        if self.is_over() {
            debug!(state = ?self.state, "discarding NotApplied on a finished session");
            return Handled::Applied;
        }

        if not_applied.uuid != self.uuid {
            return match self.config.wrong_uuid_policy {
                WrongUuidPolicy::Terminate => {
                    let reason = format!(
                        "NotApplied uuid mismatch: received={},expected={}",
                        not_applied.uuid, self.uuid
                    );
                    self.send_terminate(
                        reason,
                        0,
                        now_ms,
                        now_ns,
                        SessionState::ResendTerminate,
                        SessionState::Unbinding,
                    )
                }
                WrongUuidPolicy::Ignore => {
                    warn!(
                        uuid = self.uuid,
                        received = not_applied.uuid,
                        "ignoring NotApplied with foreign uuid"
                    );
                    Handled::Applied
                }
            };
        }

        self.refresh_receive_timer(now_ms);
        self.state = SessionState::Retransmitting;

        let mut response = NotAppliedResponse::new();
        self.handler.on_not_applied(
            not_applied.from_seq_no,
            u64::from(not_applied.msg_count),
            &mut response,
        );
        self.apply_not_applied_choice(
            not_applied.from_seq_no,
            u64::from(not_applied.msg_count),
            response.should_retransmit(),
            now_ms,
        )
    }

    /// An application (business) message.
    pub fn on_message(
        &mut self,
        body: &[u8],
        template_id: u16,
        block_length: u16,
        version: u16,
        now_ms: i64,
        now_ns: i64,
    ) -> Handled {
        if self.is_over() {
            debug!(state = ?self.state, "discarding message on a finished session");
            return Handled::Applied;
        }

        self.refresh_receive_timer(now_ms);

        if self.state != SessionState::Established {
            debug!(
                template = template_name(template_id),
                state = ?self.state,
                "discarding message outside established state"
            );
            return Handled::Applied;
        }

        let offsets = field_offsets(template_id);
        let Some(seq_num) = offsets.read_seq_num(body) else {
            // Control message without a sequence number
            return Handled::Applied;
        };

        if offsets.is_poss_retrans(body) {
            self.handler.on_business_message(template_id, body, block_length, version, true);
            if Some(seq_num) == self.retransmit_fill_seq_no {
                return self.retransmit_filled(now_ns);
            }
            return Handled::Applied;
        }

        if let Some(handled) = self.check_low_sequence_number(seq_num, now_ms, now_ns) {
            return handled;
        }

        if seq_num == self.next_recv_seq_no {
            self.next_recv_seq_no += 1;
            self.handler.on_business_message(template_id, body, block_length, version, false);
            return Handled::Applied;
        }

        // Gap: the messages [next_recv_seq_no, seq_num) are missing. This
        // message itself is consumed, so in-order traffic resumes after it.
        let handled =
            self.request_retransmit_range(self.next_recv_seq_no, seq_num, seq_num + 1, now_ns);
        if handled == Handled::Applied {
            self.handler.on_business_message(template_id, body, block_length, version, false);
        }
        handled
    }

    /// Retransmission announcement preceding a replayed run.
    pub fn on_retransmission(&mut self, retransmission: &Retransmission, now_ms: i64) -> Handled {
        if self.is_over() {
            return Handled::Applied;
        }

        self.refresh_receive_timer(now_ms);
        debug!(
            from = retransmission.from_seq_no,
            count = retransmission.msg_count,
            "retransmission run announced"
        );
        Handled::Applied
    }

    /// The replay requested after NotApplied has completed.
    pub fn on_replay_complete(&mut self, now_ms: i64) -> Handled {
        if self.is_over() {
            return Handled::Applied;
        }

        self.refresh_receive_timer(now_ms);
        if self.state == SessionState::Retransmitting {
            self.state = SessionState::Established;
        }
        Handled::Applied
    }

    /// RetransmitReject: notify the handler and move on to the next queued
    /// chunk.
    pub fn on_retransmit_reject(
        &mut self,
        reject: &RetransmitReject,
        now_ms: i64,
        now_ns: i64,
    ) -> Handled {
        if self.is_over() {
            debug!(state = ?self.state, "discarding RetransmitReject on a finished session");
            return Handled::Applied;
        }

        if reject.uuid != self.uuid {
            warn!(
                uuid = self.uuid,
                received = reject.uuid,
                "retransmit reject carried a foreign uuid"
            );
            return Handled::Applied;
        }

        self.refresh_receive_timer(now_ms);
        self.handler.on_retransmit_reject(
            &reject.reason,
            reject.request_timestamp as i64,
            reject.error_codes,
        );
        self.retransmit_filled(now_ns)
    }

    // ------------------------------------------------------- gap workflow

    /// Request retransmission of `[from, to_exclusive)` in chunks bounded by
    /// the configured limit, advancing the receive counter to
    /// `new_next_recv`.
    fn request_retransmit_range(
        &mut self,
        from: u64,
        to_exclusive: u64,
        new_next_recv: u64,
        now_ns: i64,
    ) -> Handled {
        debug_assert!(to_exclusive > from);
        let total = to_exclusive - from;

        if self.retransmit_fill_seq_no.is_some() {
            // One request in flight at most: everything queues behind it.
            self.enqueue_chunks(from, total);
            self.next_recv_seq_no = new_next_recv;
            return Handled::Applied;
        }

        let msg_count = total.min(self.retransmit_limit);
        match self.send_retransmit_request(from, msg_count, now_ns) {
            Handled::Applied => {
                self.enqueue_chunks(from + msg_count, total - msg_count);
                self.next_recv_seq_no = new_next_recv;
                self.retransmit_fill_seq_no = Some(from + msg_count - 1);
                Handled::Applied
            }
            Handled::BackPressured => Handled::BackPressured,
        }
    }

    fn enqueue_chunks(&mut self, mut from: u64, mut remaining: u64) {
        while remaining > 0 {
            let msg_count = remaining.min(self.retransmit_limit);
            self.retransmit_queue.push_back(RetransmitChunk { from_seq_no: from, msg_count });
            from += msg_count;
            remaining -= msg_count;
        }
    }

    /// The in-flight retransmit finished: request the next queued chunk or
    /// return to not-awaiting.
    fn retransmit_filled(&mut self, now_ns: i64) -> Handled {
        let Some(chunk) = self.retransmit_queue.front().copied() else {
            self.retransmit_fill_seq_no = None;
            return Handled::Applied;
        };

        match self.send_retransmit_request(chunk.from_seq_no, chunk.msg_count, now_ns) {
            Handled::Applied => {
                self.retransmit_queue.pop_front();
                self.retransmit_fill_seq_no = Some(chunk.from_seq_no + chunk.msg_count - 1);
                Handled::Applied
            }
            // Chunk stays at the head for the retried delivery
            Handled::BackPressured => Handled::BackPressured,
        }
    }

    fn send_retransmit_request(&mut self, from_seq_no: u64, msg_count: u64, now_ns: i64) -> Handled {
        let message = RetransmitRequest {
            uuid: self.uuid,
            request_timestamp: now_ns as u64,
            from_seq_no,
            msg_count: msg_count as u16,
        };
        match self.framer.send_retransmit_request(&message) {
            Ok(ClaimOutcome::Claimed(_)) => Handled::Applied,
            Ok(ClaimOutcome::Pressured) => Handled::BackPressured,
            Ok(ClaimOutcome::Closed(reason)) => {
                self.on_transport_closed(reason);
                Handled::Applied
            }
            Err(error) => {
                self.report_error(error.into());
                self.fully_unbind();
                Handled::Applied
            }
        }
    }

    // ------------------------------------------------------------- sends

    fn send_negotiate(&mut self, now_ms: i64, now_ns: i64) -> Handled {
        let request_timestamp = now_ns;
        let canonical = negotiate_canonical_request(
            request_timestamp,
            self.uuid,
            &self.config.session_id,
            &self.config.firm_id,
        );
        let message = Negotiate {
            hmac_signature: self.user_key.sign(&canonical),
            access_key_id: self.config.access_key_id.clone(),
            uuid: self.uuid,
            request_timestamp: request_timestamp as u64,
            session_id: self.config.session_id.clone(),
            firm_id: self.config.firm_id.clone(),
        };

        match self.framer.send_negotiate(&message) {
            Ok(ClaimOutcome::Claimed(_)) => {
                self.last_negotiate_request_timestamp = request_timestamp;
                self.resend_time_ms = now_ms + self.config.keep_alive_interval_ms;
                self.state = match self.state {
                    SessionState::SentNegotiate => SessionState::RetryNegotiate,
                    _ => SessionState::SentNegotiate,
                };
                Handled::Applied
            }
            Ok(ClaimOutcome::Pressured) => Handled::BackPressured,
            Ok(ClaimOutcome::Closed(reason)) => {
                self.on_transport_closed(reason);
                Handled::Applied
            }
            Err(error) => {
                self.report_error(error.into());
                self.fully_unbind();
                Handled::Applied
            }
        }
    }

    fn send_establish(&mut self, now_ms: i64, now_ns: i64) -> Handled {
        let request_timestamp = now_ns;
        let keep_alive_wire =
            self.config.keep_alive_interval_ms.clamp(0, i64::from(u16::MAX)) as u16;
        let canonical = establish_canonical_request(
            request_timestamp,
            self.uuid,
            &self.config.session_id,
            &self.config.firm_id,
            &self.config.trading_system_name,
            &self.config.trading_system_version,
            &self.config.trading_system_vendor,
            self.next_sent_seq_no,
            self.config.keep_alive_interval_ms,
        );
        let message = Establish {
            hmac_signature: self.user_key.sign(&canonical),
            access_key_id: self.config.access_key_id.clone(),
            trading_system_name: self.config.trading_system_name.clone(),
            trading_system_version: self.config.trading_system_version.clone(),
            trading_system_vendor: self.config.trading_system_vendor.clone(),
            uuid: self.uuid,
            request_timestamp: request_timestamp as u64,
            next_seq_no: self.next_sent_seq_no,
            session_id: self.config.session_id.clone(),
            firm_id: self.config.firm_id.clone(),
            keep_alive_interval: keep_alive_wire,
        };

        match self.framer.send_establish(&message) {
            Ok(ClaimOutcome::Claimed(_)) => {
                self.last_establish_request_timestamp = request_timestamp;
                self.resend_time_ms = now_ms + self.config.keep_alive_interval_ms;
                self.state = match self.state {
                    SessionState::SentEstablish => SessionState::RetryEstablish,
                    _ => SessionState::SentEstablish,
                };
                Handled::Applied
            }
            Ok(ClaimOutcome::Pressured) => Handled::BackPressured,
            Ok(ClaimOutcome::Closed(reason)) => {
                self.on_transport_closed(reason);
                Handled::Applied
            }
            Err(error) => {
                self.report_error(error.into());
                self.fully_unbind();
                Handled::Applied
            }
        }
    }

    fn send_sequence(&mut self, keep_alive_lapsed: KeepAliveLapsed, now_ms: i64) -> Handled {
        let message = Sequence {
            uuid: self.uuid,
            next_seq_no: self.next_sent_seq_no,
            fault_tolerance_indicator: FaultToleranceIndicator::Primary,
            keep_alive_lapsed,
        };
        match self.framer.send_sequence(&message) {
            Ok(ClaimOutcome::Claimed(_)) => {
                self.next_send_message_time_ms = now_ms + self.config.keep_alive_interval_ms;
                Handled::Applied
            }
            Ok(ClaimOutcome::Pressured) => Handled::BackPressured,
            Ok(ClaimOutcome::Closed(reason)) => {
                self.on_transport_closed(reason);
                Handled::Applied
            }
            Err(error) => {
                self.report_error(error.into());
                self.fully_unbind();
                Handled::Applied
            }
        }
    }

    /// Send a Terminate, parking it for poll-retry when pressured.
    fn send_terminate(
        &mut self,
        reason: String,
        error_codes: u16,
        now_ms: i64,
        now_ns: i64,
        on_pressure: SessionState,
        on_success: SessionState,
    ) -> Handled {
        let message = Terminate {
            uuid: self.uuid,
            request_timestamp: now_ns as u64,
            error_codes,
            reason: reason.clone(),
        };
        match self.framer.send_terminate(&message) {
            Ok(ClaimOutcome::Claimed(_)) => {
                if on_success == SessionState::Unbinding {
                    self.state = SessionState::Unbinding;
                    self.next_send_message_time_ms = now_ms + self.config.keep_alive_interval_ms;
                } else {
                    self.fully_unbind();
                }
                Handled::Applied
            }
            Ok(ClaimOutcome::Pressured) => {
                // Parked: the poll loop owns the retry from here
                self.resend_terminate = Some(ParkedTerminate { reason, error_codes });
                self.state = on_pressure;
                Handled::Applied
            }
            Ok(ClaimOutcome::Closed(close_reason)) => {
                self.on_transport_closed(close_reason);
                Handled::Applied
            }
            Err(error) => {
                self.report_error(error.into());
                self.fully_unbind();
                Handled::Applied
            }
        }
    }

    fn retry_parked_terminate(
        &mut self,
        now_ms: i64,
        now_ns: i64,
        on_success: SessionState,
    ) -> i32 {
        let Some(parked) = self.resend_terminate.take() else {
            return 0;
        };
        let on_pressure = self.state;
        let _ = self.send_terminate(
            parked.reason,
            parked.error_codes,
            now_ms,
            now_ns,
            on_pressure,
            on_success,
        );
        1
    }

    // ----------------------------------------------------------- helpers

    fn check_low_sequence_number(
        &mut self,
        received: u64,
        now_ms: i64,
        now_ns: i64,
    ) -> Option<Handled> {
        if received >= self.next_recv_seq_no {
            return None;
        }
        let error =
            SessionError::LowSequenceNumber { received, expecting: self.next_recv_seq_no };
        warn!(uuid = self.uuid, %error, "terminating");
        let reason = error.to_string();
        self.report_error(error);
        Some(self.send_terminate(
            reason,
            0,
            now_ms,
            now_ns,
            SessionState::ResendTerminate,
            SessionState::Unbinding,
        ))
    }

    /// Whether the session has reached a state it never leaves. Inbound
    /// traffic on a finished session is discarded; the owner destroys it.
    fn is_over(&self) -> bool {
        matches!(
            self.state,
            SessionState::Unbound
                | SessionState::NegotiateRejected
                | SessionState::EstablishRejected
        )
    }

    /// Renew the receive deadline; inbound traffic during AwaitingKeepalive
    /// proves the peer alive and re-establishes.
    fn refresh_receive_timer(&mut self, now_ms: i64) {
        self.next_receive_message_time_ms = now_ms + self.config.keep_alive_interval_ms;
        if self.state == SessionState::AwaitingKeepalive {
            self.state = SessionState::Established;
        }
    }

    fn apply_not_applied_choice(
        &mut self,
        from_seq_no: u64,
        msg_count: u64,
        retransmit: bool,
        now_ms: i64,
    ) -> Handled {
        if retransmit {
            match self.replayer.request_replay(self.uuid, from_seq_no, msg_count) {
                ClaimOutcome::Claimed(_) => {
                    self.backpressured_not_applied = None;
                    Handled::Applied
                }
                ClaimOutcome::Pressured => {
                    self.backpressured_not_applied =
                        Some(PendingNotApplied { from_seq_no, msg_count, retransmit: true });
                    Handled::Applied
                }
                ClaimOutcome::Closed(reason) => {
                    self.on_transport_closed(reason);
                    Handled::Applied
                }
            }
        } else {
            match self.send_sequence(KeepAliveLapsed::NotLapsed, now_ms) {
                Handled::Applied => {
                    self.backpressured_not_applied = None;
                    self.state = SessionState::Established;
                    Handled::Applied
                }
                Handled::BackPressured => {
                    self.backpressured_not_applied =
                        Some(PendingNotApplied { from_seq_no, msg_count, retransmit: false });
                    Handled::Applied
                }
            }
        }
    }

    /// Echo mismatch on a handshake response: fatal, authentication failed.
    fn fail_authentication(&mut self, error: SessionError) {
        warn!(uuid = self.uuid, %error, "authentication echo check failed");
        self.report_error(error);
        self.request_disconnect(DisconnectReason::FailedAuthentication);
    }

    /// Deliver a fatal error to the initiator if the handshake is still in
    /// flight, otherwise to the handler.
    fn report_error(&mut self, error: SessionError) {
        if !self.initiate_reply.try_fail(error.clone()) {
            self.handler.on_error(&error);
        }
    }

    fn on_transport_closed(&mut self, reason: CloseReason) {
        self.report_error(SessionError::TransportClosed(reason));
        self.fully_unbind();
    }

    fn fully_unbind(&mut self) {
        if self.state == SessionState::Unbound {
            return;
        }
        debug!(uuid = self.uuid, "session unbound");
        self.state = SessionState::Unbound;
        self.handler.on_disconnect();
    }
}

fn work(handled: Handled) -> i32 {
    match handled {
        Handled::Applied => 1,
        Handled::BackPressured => 0,
    }
}

fn initial_sequence_number(
    configured: InitialSequenceNumber,
    last: Option<u64>,
    re_establish: bool,
) -> u64 {
    if !re_establish {
        return 1;
    }
    match configured {
        InitialSequenceNumber::Explicit(value) => value,
        InitialSequenceNumber::Automatic => last.map_or(1, |value| value + 1),
    }
}

fn validate_width(field: &'static str, value: &str, max: usize) -> Result<(), SessionError> {
    if value.len() > max {
        return Err(ProtocolError::FieldTooLong { field, max }.into());
    }
    Ok(())
}
