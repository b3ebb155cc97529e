//! Fuzz target for the session state machine
//!
//! Drive structured multi-step operation sequences against a live session
//! and check the sequencing invariants after every step.
//!
//! # Strategy
//!
//! - Structured ops: well-formed session-layer frames with selectively
//!   correct or corrupted echo fields, interleaved with polls, local
//!   claims/terminates, injected back-pressure, and raw bytes for the parser
//! - Echo capture: request timestamps are read back from the committed
//!   Negotiate/Establish frames, so the fuzzer can actually reach
//!   Established instead of bouncing off the echo check
//! - Time only moves forward, driven by an op
//!
//! # Invariants
//!
//! - `next_recv_seq_no` and `next_sent_seq_no` never decrease
//! - Retransmit chunks queue only behind an in-flight request, whose fill
//!   target stays below the receive counter
//! - Finished states (Unbound, NegotiateRejected, EstablishRejected) are
//!   never left

#![no_main]

use std::{cell::RefCell, rc::Rc};

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use ilink3_proto::{
    messages::{
        Establish, EstablishmentAck, EstablishmentReject, FaultToleranceIndicator,
        KeepAliveLapsed, Negotiate, NegotiationReject, NegotiationResponse, NotApplied,
        RetransmitReject, Sequence, Terminate,
    },
    templates, SbeHeader, Sofh, TemplateMeta,
};
use ilink3_session::{
    ClaimOutcome, NotAppliedResponse, Publication, Replayer, Session, SessionConfig,
    SessionContext, SessionError, SessionHandler, SessionState,
};

const UUID: u64 = 42;

// base64url("fuzz-secret-key!")
const USER_KEY: &str = "ZnV6ei1zZWNyZXQta2V5IQ";

#[derive(Debug, Clone, Arbitrary)]
enum SessionOp {
    Poll { advance_ms: u16 },
    NegotiationResponse { correct_echo: bool },
    NegotiationReject,
    EstablishmentAck { correct_echo: bool, next_seq_no: u8, previous_seq_no: u8 },
    EstablishmentReject,
    Sequence { next_seq_no: u32, lapsed: bool, wrong_uuid: bool },
    Business { seq_no: u32, poss_retrans: bool },
    NotApplied { from_seq_no: u8, msg_count: u8, wrong_uuid: bool },
    PeerTerminate { wrong_uuid: bool },
    RetransmitReject,
    ReplayComplete,
    ClaimCommit,
    LocalTerminate,
    Pressure { claims: u8 },
    RawFrame(Vec<u8>),
}

/// Shared with the publication and replayer: injected back-pressure plus the
/// request timestamps harvested from committed handshake frames.
#[derive(Default)]
struct SinkState {
    pressured: usize,
    last_negotiate_timestamp: u64,
    last_establish_timestamp: u64,
}

struct SinkPublication {
    claim: Option<Vec<u8>>,
    state: Rc<RefCell<SinkState>>,
}

impl Publication for SinkPublication {
    fn try_claim(&mut self, length: usize) -> ClaimOutcome {
        let mut state = self.state.borrow_mut();
        if state.pressured > 0 {
            state.pressured -= 1;
            return ClaimOutcome::Pressured;
        }
        self.claim = Some(vec![0u8; length]);
        ClaimOutcome::Claimed(length as i64)
    }

    fn claimed_buffer(&mut self) -> &mut [u8] {
        match self.claim.as_mut() {
            Some(buffer) => buffer,
            None => &mut [],
        }
    }

    fn commit(&mut self) {
        let Some(frame) = self.claim.take() else { return };

        // Harvest the echoed timestamps from outbound handshake frames.
        // Layout: [gateway 8][SOFH 6][SBE 8][body]
        let header_len = 8 + Sofh::SIZE + SbeHeader::SIZE;
        if frame.len() < header_len {
            return;
        }
        let Ok(header) = SbeHeader::from_bytes(&frame[8 + Sofh::SIZE..]) else { return };
        let body = &frame[header_len..];
        let mut state = self.state.borrow_mut();
        match header.template_id() {
            500 => {
                if let Ok(negotiate) = Negotiate::decode(body) {
                    state.last_negotiate_timestamp = negotiate.request_timestamp;
                }
            }
            503 => {
                if let Ok(establish) = Establish::decode(body) {
                    state.last_establish_timestamp = establish.request_timestamp;
                }
            }
            _ => {}
        }
    }

    fn abort(&mut self) {
        self.claim = None;
    }
}

struct SinkHandler;

impl SessionHandler for SinkHandler {
    fn on_business_message(&mut self, _: u16, _: &[u8], _: u16, _: u16, _: bool) {}
    fn on_not_applied(&mut self, from_seq_no: u64, _: u64, response: &mut NotAppliedResponse) {
        // Exercise both choices, steered by the fuzzed from value
        if from_seq_no % 2 == 0 {
            response.retransmit();
        } else {
            response.gap_fill();
        }
    }
    fn on_error(&mut self, _: &SessionError) {}
    fn on_disconnect(&mut self) {}
}

struct SinkReplayer {
    state: Rc<RefCell<SinkState>>,
}

impl Replayer for SinkReplayer {
    fn request_replay(&mut self, _: u64, _: u64, _: u64) -> ClaimOutcome {
        let mut state = self.state.borrow_mut();
        if state.pressured > 0 {
            state.pressured -= 1;
            return ClaimOutcome::Pressured;
        }
        ClaimOutcome::Claimed(1)
    }
}

type FuzzedSession = Session<SinkPublication, SinkHandler, SinkReplayer>;

/// Session counters captured after the previous op.
struct Tracked {
    recv: u64,
    sent: u64,
    state: SessionState,
    finished: bool,
}

impl Tracked {
    fn capture(session: &FuzzedSession) -> Self {
        let state = session.state();
        Self {
            recv: session.next_recv_seq_no(),
            sent: session.next_sent_seq_no(),
            state,
            finished: matches!(
                state,
                SessionState::Unbound
                    | SessionState::NegotiateRejected
                    | SessionState::EstablishRejected
            ),
        }
    }
}

fuzz_target!(|ops: Vec<SessionOp>| {
    let state = Rc::new(RefCell::new(SinkState::default()));
    let publication = SinkPublication { claim: None, state: Rc::clone(&state) };
    let replayer = SinkReplayer { state: Rc::clone(&state) };
    let context = SessionContext {
        uuid: UUID,
        connection_id: 7,
        newly_allocated: true,
        last_sent_seq_no: None,
        last_received_seq_no: None,
    };
    let Ok((mut session, _handle)) = Session::new(
        SessionConfig::new("S1", "F1", "KEY", USER_KEY),
        publication,
        SinkHandler,
        replayer,
        context,
        0,
    ) else {
        return;
    };

    let mut now_ms: i64 = 0;
    let mut prev = Tracked::capture(&session);

    for op in ops {
        let now_ns = now_ms * 1_000_000;
        match op {
            SessionOp::Poll { advance_ms } => {
                now_ms += i64::from(advance_ms);
                let _ = session.poll(now_ms, now_ms * 1_000_000);
            }

            SessionOp::NegotiationResponse { correct_echo } => {
                let request_timestamp = if correct_echo {
                    state.borrow().last_negotiate_timestamp
                } else {
                    99
                };
                let response = NegotiationResponse {
                    uuid: UUID,
                    request_timestamp,
                    fault_tolerance_indicator: FaultToleranceIndicator::Primary,
                    previous_seq_no: 0,
                    secret_key_expiration: 365,
                };
                let frame = build_frame(&NegotiationResponse::TEMPLATE, |body| {
                    let _ = response.encode(body);
                });
                let _ = session.on_frame(&frame, now_ms, now_ns);
            }

            SessionOp::NegotiationReject => {
                let reject = NegotiationReject {
                    uuid: UUID,
                    request_timestamp: state.borrow().last_negotiate_timestamp,
                    error_codes: 20,
                    reason: "fuzz".to_string(),
                };
                let frame = build_frame(&NegotiationReject::TEMPLATE, |body| {
                    let _ = reject.encode(body);
                });
                let _ = session.on_frame(&frame, now_ms, now_ns);
            }

            SessionOp::EstablishmentAck { correct_echo, next_seq_no, previous_seq_no } => {
                let request_timestamp = if correct_echo {
                    state.borrow().last_establish_timestamp
                } else {
                    77
                };
                let ack = EstablishmentAck {
                    uuid: UUID,
                    request_timestamp,
                    next_seq_no: u64::from(next_seq_no),
                    previous_seq_no: u64::from(previous_seq_no),
                    previous_uuid: if previous_seq_no > 0 { UUID } else { 0 },
                    keep_alive_interval: 500,
                    fault_tolerance_indicator: FaultToleranceIndicator::Primary,
                };
                let frame = build_frame(&EstablishmentAck::TEMPLATE, |body| {
                    let _ = ack.encode(body);
                });
                let _ = session.on_frame(&frame, now_ms, now_ns);
            }

            SessionOp::EstablishmentReject => {
                let reject = EstablishmentReject {
                    uuid: UUID,
                    request_timestamp: state.borrow().last_establish_timestamp,
                    next_seq_no: 1,
                    error_codes: 13,
                    reason: "fuzz".to_string(),
                };
                let frame = build_frame(&EstablishmentReject::TEMPLATE, |body| {
                    let _ = reject.encode(body);
                });
                let _ = session.on_frame(&frame, now_ms, now_ns);
            }

            SessionOp::Sequence { next_seq_no, lapsed, wrong_uuid } => {
                let sequence = Sequence {
                    uuid: if wrong_uuid { UUID + 1 } else { UUID },
                    next_seq_no: u64::from(next_seq_no),
                    fault_tolerance_indicator: FaultToleranceIndicator::Primary,
                    keep_alive_lapsed: if lapsed {
                        KeepAliveLapsed::Lapsed
                    } else {
                        KeepAliveLapsed::NotLapsed
                    },
                };
                let frame = build_frame(&Sequence::TEMPLATE, |body| {
                    let _ = sequence.encode(body);
                });
                let _ = session.on_frame(&frame, now_ms, now_ns);
            }

            SessionOp::Business { seq_no, poss_retrans } => {
                let frame = build_frame(&templates::EXECUTION_REPORT_NEW, |body| {
                    body[..4].copy_from_slice(&seq_no.to_le_bytes());
                    body[4..12].copy_from_slice(&UUID.to_le_bytes());
                    if poss_retrans {
                        body[20] = 0x01;
                    }
                });
                let _ = session.on_frame(&frame, now_ms, now_ns);
            }

            SessionOp::NotApplied { from_seq_no, msg_count, wrong_uuid } => {
                let not_applied = NotApplied {
                    uuid: if wrong_uuid { UUID + 1 } else { UUID },
                    from_seq_no: u64::from(from_seq_no),
                    msg_count: u32::from(msg_count),
                };
                let frame = build_frame(&NotApplied::TEMPLATE, |body| {
                    let _ = not_applied.encode(body);
                });
                let _ = session.on_frame(&frame, now_ms, now_ns);
            }

            SessionOp::PeerTerminate { wrong_uuid } => {
                let terminate = Terminate {
                    uuid: if wrong_uuid { UUID + 1 } else { UUID },
                    request_timestamp: 0,
                    error_codes: 0,
                    reason: "fuzz".to_string(),
                };
                let frame = build_frame(&Terminate::TEMPLATE, |body| {
                    let _ = terminate.encode(body);
                });
                let _ = session.on_frame(&frame, now_ms, now_ns);
            }

            SessionOp::RetransmitReject => {
                let reject = RetransmitReject {
                    uuid: UUID,
                    request_timestamp: 0,
                    error_codes: 9,
                    reason: "fuzz".to_string(),
                };
                let frame = build_frame(&RetransmitReject::TEMPLATE, |body| {
                    let _ = reject.encode(body);
                });
                let _ = session.on_frame(&frame, now_ms, now_ns);
            }

            SessionOp::ReplayComplete => {
                let _ = session.on_replay_complete(now_ms);
            }

            SessionOp::ClaimCommit => {
                let meta = &templates::NEW_ORDER_SINGLE;
                if let Ok(ClaimOutcome::Claimed(_)) =
                    session.try_claim(meta, meta.block_length as usize, now_ns)
                {
                    session.commit(now_ms);
                }
            }

            SessionOp::LocalTerminate => {
                let _ = session.terminate("fuzz", 0, now_ms, now_ns);
            }

            SessionOp::Pressure { claims } => {
                let mut state = state.borrow_mut();
                state.pressured = state.pressured.saturating_add(usize::from(claims));
            }

            SessionOp::RawFrame(bytes) => {
                let _ = session.on_frame(&bytes, now_ms, now_ns);
            }
        }

        check_invariants(&session, &mut prev);
    }
});

fn check_invariants(session: &FuzzedSession, prev: &mut Tracked) {
    let recv = session.next_recv_seq_no();
    let sent = session.next_sent_seq_no();
    assert!(recv >= prev.recv, "receive counter went backwards: {} -> {recv}", prev.recv);
    assert!(sent >= prev.sent, "send counter went backwards: {} -> {sent}", prev.sent);

    if session.retransmit_queue_len() > 0 {
        assert!(
            session.retransmit_fill_seq_no().is_some(),
            "chunks queued with no retransmit request in flight"
        );
    }
    if let Some(fill) = session.retransmit_fill_seq_no() {
        assert!(fill < recv, "fill target {fill} not below receive counter {recv}");
    }

    if prev.finished {
        assert_eq!(session.state(), prev.state, "finished session changed state");
    }

    *prev = Tracked::capture(session);
}

fn build_frame(meta: &TemplateMeta, encode: impl FnOnce(&mut [u8])) -> Vec<u8> {
    let body_length = meta.block_length as usize;
    let mut frame = vec![0u8; Sofh::SIZE + SbeHeader::SIZE + body_length];
    let _ = Sofh::new(body_length).write_to(&mut frame);
    let _ = SbeHeader::new(meta).write_to(&mut frame[Sofh::SIZE..]);
    encode(&mut frame[Sofh::SIZE + SbeHeader::SIZE..]);
    frame
}
