//! Shared doubles for session scenario tests: a recording publication with
//! injectable back-pressure, a recording handler, a recording replayer, and
//! frame builders for inbound traffic.

#![allow(clippy::unwrap_used, clippy::expect_used, dead_code)]

use std::{cell::RefCell, rc::Rc};

use bytes::{Bytes, BytesMut};

use ilink3_proto::{
    messages::{
        Establish, EstablishmentAck, FaultToleranceIndicator, KeepAliveLapsed, Negotiate,
        NegotiationResponse, RetransmitRequest, Sequence, Terminate,
    },
    templates, SbeHeader, Sofh, TemplateMeta,
};
use ilink3_session::{
    ClaimOutcome, GATEWAY_HEADER_LENGTH, InitiateHandle, NotAppliedResponse, Publication,
    Replayer, Session, SessionConfig, SessionContext, SessionError, SessionHandler,
};

/// base64url("0123456789abcdef0123456789abcdef")
pub const USER_KEY: &str = "MDEyMzQ1Njc4OWFiY2RlZjAxMjM0NTY3ODlhYmNkZWY";

pub const UUID: u64 = 42;
pub const CONNECTION_ID: u64 = 7;

/// Observable side of the recording publication.
#[derive(Default)]
pub struct PublicationSink {
    pub committed: Vec<Bytes>,
    pub pressured_claims: usize,
}

impl PublicationSink {
    /// Make the next `count` claims fail with back-pressure.
    pub fn pressure_next(&mut self, count: usize) {
        self.pressured_claims = count;
    }
}

/// Publication that stores committed frames in a shared sink.
#[derive(Default)]
pub struct RecordingPublication {
    claim: Option<BytesMut>,
    position: i64,
    sink: Rc<RefCell<PublicationSink>>,
}

impl RecordingPublication {
    pub fn new() -> (Self, Rc<RefCell<PublicationSink>>) {
        let publication = Self::default();
        let sink = Rc::clone(&publication.sink);
        (publication, sink)
    }
}

impl Publication for RecordingPublication {
    fn try_claim(&mut self, length: usize) -> ClaimOutcome {
        let mut sink = self.sink.borrow_mut();
        if sink.pressured_claims > 0 {
            sink.pressured_claims -= 1;
            return ClaimOutcome::Pressured;
        }
        self.claim = Some(BytesMut::zeroed(length));
        self.position += length as i64;
        ClaimOutcome::Claimed(self.position)
    }

    fn claimed_buffer(&mut self) -> &mut [u8] {
        match self.claim.as_mut() {
            Some(buffer) => buffer,
            None => &mut [],
        }
    }

    fn commit(&mut self) {
        if let Some(claim) = self.claim.take() {
            self.sink.borrow_mut().committed.push(claim.freeze());
        }
    }

    fn abort(&mut self) {
        self.claim = None;
    }
}

/// Everything the handler observed.
#[derive(Default)]
pub struct HandlerState {
    pub business: Vec<BusinessRecord>,
    pub errors: Vec<SessionError>,
    pub disconnects: usize,
    pub sequences: Vec<(u64, u64)>,
    pub retransmit_rejects: Vec<(String, u16)>,
    pub not_applied: Vec<(u64, u64)>,
    /// Choice recorded into the next `on_not_applied` response.
    pub retransmit_on_not_applied: bool,
}

pub struct BusinessRecord {
    pub template_id: u16,
    pub seq_num: u64,
    pub poss_retrans: bool,
}

#[derive(Default)]
pub struct RecordingHandler {
    state: Rc<RefCell<HandlerState>>,
}

impl RecordingHandler {
    pub fn new() -> (Self, Rc<RefCell<HandlerState>>) {
        let handler = Self::default();
        let state = Rc::clone(&handler.state);
        (handler, state)
    }
}

impl SessionHandler for RecordingHandler {
    fn on_business_message(
        &mut self,
        template_id: u16,
        body: &[u8],
        _block_length: u16,
        _version: u16,
        poss_retrans: bool,
    ) {
        let seq_num = ilink3_proto::field_offsets(template_id).read_seq_num(body).unwrap_or(0);
        self.state.borrow_mut().business.push(BusinessRecord { template_id, seq_num, poss_retrans });
    }

    fn on_not_applied(&mut self, from_seq_no: u64, msg_count: u64, response: &mut NotAppliedResponse) {
        let mut state = self.state.borrow_mut();
        state.not_applied.push((from_seq_no, msg_count));
        if state.retransmit_on_not_applied {
            response.retransmit();
        }
    }

    fn on_retransmit_reject(&mut self, reason: &str, _request_timestamp: i64, error_codes: u16) {
        self.state.borrow_mut().retransmit_rejects.push((reason.to_string(), error_codes));
    }

    fn on_sequence(&mut self, uuid: u64, next_seq_no: u64) {
        self.state.borrow_mut().sequences.push((uuid, next_seq_no));
    }

    fn on_error(&mut self, error: &SessionError) {
        self.state.borrow_mut().errors.push(error.clone());
    }

    fn on_disconnect(&mut self) {
        self.state.borrow_mut().disconnects += 1;
    }
}

/// Replay requests observed, plus injectable back-pressure.
#[derive(Default)]
pub struct ReplayState {
    pub requests: Vec<(u64, u64, u64)>,
    pub pressured: usize,
}

#[derive(Default)]
pub struct RecordingReplayer {
    state: Rc<RefCell<ReplayState>>,
}

impl RecordingReplayer {
    pub fn new() -> (Self, Rc<RefCell<ReplayState>>) {
        let replayer = Self::default();
        let state = Rc::clone(&replayer.state);
        (replayer, state)
    }
}

impl Replayer for RecordingReplayer {
    fn request_replay(&mut self, uuid: u64, from_seq_no: u64, msg_count: u64) -> ClaimOutcome {
        let mut state = self.state.borrow_mut();
        if state.pressured > 0 {
            state.pressured -= 1;
            return ClaimOutcome::Pressured;
        }
        state.requests.push((uuid, from_seq_no, msg_count));
        ClaimOutcome::Claimed(1)
    }
}

pub type TestSession = Session<RecordingPublication, RecordingHandler, RecordingReplayer>;

/// A session wired to recording doubles.
pub struct Harness {
    pub session: TestSession,
    pub handle: InitiateHandle,
    pub sink: Rc<RefCell<PublicationSink>>,
    pub handler: Rc<RefCell<HandlerState>>,
    pub replays: Rc<RefCell<ReplayState>>,
}

pub fn test_config(keep_alive_ms: i64, retransmit_limit: u32) -> SessionConfig {
    let mut config = SessionConfig::new("S1", "F1", "KEY", USER_KEY);
    config.keep_alive_interval_ms = keep_alive_ms;
    config.retransmit_request_message_limit = retransmit_limit;
    config
}

pub fn ns(now_ms: i64) -> i64 {
    now_ms * 1_000_000
}

impl Harness {
    pub fn connect(config: SessionConfig) -> Self {
        let (publication, sink) = RecordingPublication::new();
        let (handler, handler_state) = RecordingHandler::new();
        let (replayer, replays) = RecordingReplayer::new();
        let context = SessionContext {
            uuid: UUID,
            connection_id: CONNECTION_ID,
            newly_allocated: true,
            last_sent_seq_no: None,
            last_received_seq_no: None,
        };
        let (session, handle) =
            Session::new(config, publication, handler, replayer, context, 0).unwrap();
        Self { session, handle, sink, handler: handler_state, replays }
    }

    /// Drive the Negotiate/Establish handshake to Established at `now_ms`.
    pub fn establish(&mut self, now_ms: i64) {
        assert_eq!(self.session.poll(now_ms, ns(now_ms)), 1);
        let negotiate = Negotiate::decode(&self.last_body()).unwrap();

        let response = NegotiationResponse {
            uuid: UUID,
            request_timestamp: negotiate.request_timestamp,
            fault_tolerance_indicator: FaultToleranceIndicator::Primary,
            previous_seq_no: 0,
            secret_key_expiration: 365,
        };
        self.feed(&encode_frame(&NegotiationResponse::TEMPLATE, |body| {
            response.encode(body).unwrap();
        }), now_ms);

        let establish = Establish::decode(&self.last_body()).unwrap();
        let ack = EstablishmentAck {
            uuid: UUID,
            request_timestamp: establish.request_timestamp,
            next_seq_no: self.session.next_recv_seq_no(),
            previous_seq_no: 0,
            previous_uuid: 0,
            keep_alive_interval: establish.keep_alive_interval,
            fault_tolerance_indicator: FaultToleranceIndicator::Primary,
        };
        self.feed(&encode_frame(&EstablishmentAck::TEMPLATE, |body| {
            ack.encode(body).unwrap();
        }), now_ms);
    }

    /// Dispatch an inbound frame at `now_ms`, asserting it applied.
    pub fn feed(&mut self, frame: &[u8], now_ms: i64) {
        let handled = self.session.on_frame(frame, now_ms, ns(now_ms)).unwrap();
        assert_eq!(handled, ilink3_session::Handled::Applied);
    }

    /// Committed frames so far.
    pub fn committed(&self) -> Vec<Bytes> {
        self.sink.borrow().committed.clone()
    }

    /// SBE body of the most recent committed frame.
    pub fn last_body(&self) -> Vec<u8> {
        let committed = self.sink.borrow();
        let frame = committed.committed.last().expect("no committed frames");
        body_of(frame).to_vec()
    }

    /// Template id of the most recent committed frame.
    pub fn last_template(&self) -> u16 {
        let committed = self.sink.borrow();
        template_id_of(committed.committed.last().expect("no committed frames"))
    }

    /// All committed RetransmitRequests, in commit order.
    pub fn retransmit_requests(&self) -> Vec<RetransmitRequest> {
        self.committed()
            .iter()
            .filter(|frame| template_id_of(frame) == 508)
            .map(|frame| RetransmitRequest::decode(body_of(frame)).unwrap())
            .collect()
    }
}

/// Template id of a committed outbound frame (gateway envelope included).
pub fn template_id_of(frame: &[u8]) -> u16 {
    let header = SbeHeader::from_bytes(&frame[GATEWAY_HEADER_LENGTH + Sofh::SIZE..]).unwrap();
    header.template_id()
}

/// SBE body of a committed outbound frame.
pub fn body_of(frame: &[u8]) -> &[u8] {
    &frame[GATEWAY_HEADER_LENGTH + Sofh::SIZE + SbeHeader::SIZE..]
}

/// Build an inbound frame (SOFH + SBE header + body) for a session template.
pub fn encode_frame(meta: &TemplateMeta, encode: impl FnOnce(&mut [u8])) -> Vec<u8> {
    let body_length = meta.block_length as usize;
    let mut frame = vec![0u8; Sofh::SIZE + SbeHeader::SIZE + body_length];
    Sofh::new(body_length).write_to(&mut frame).unwrap();
    SbeHeader::new(meta).write_to(&mut frame[Sofh::SIZE..]).unwrap();
    encode(&mut frame[Sofh::SIZE + SbeHeader::SIZE..]);
    frame
}

/// Build an inbound business message (ExecutionReportNew) with the given
/// sequence number and retransmission flag.
pub fn business_frame(seq_num: u32, poss_retrans: bool) -> Vec<u8> {
    encode_frame(&templates::EXECUTION_REPORT_NEW, |body| {
        body[..4].copy_from_slice(&seq_num.to_le_bytes());
        body[4..12].copy_from_slice(&UUID.to_le_bytes());
        if poss_retrans {
            body[20] = 0x01;
        }
    })
}

/// Build an inbound Sequence frame.
pub fn sequence_frame(next_seq_no: u64, lapsed: KeepAliveLapsed) -> Vec<u8> {
    let sequence = Sequence {
        uuid: UUID,
        next_seq_no,
        fault_tolerance_indicator: FaultToleranceIndicator::Primary,
        keep_alive_lapsed: lapsed,
    };
    encode_frame(&Sequence::TEMPLATE, |body| sequence.encode(body).unwrap())
}

/// Build an inbound Terminate frame.
pub fn terminate_frame(reason: &str, error_codes: u16) -> Vec<u8> {
    let terminate = Terminate {
        uuid: UUID,
        request_timestamp: 0,
        error_codes,
        reason: reason.to_string(),
    };
    encode_frame(&Terminate::TEMPLATE, |body| terminate.encode(body).unwrap())
}

/// Hand-driven clock for poller tests. Clones share the same time source.
#[derive(Clone, Default)]
pub struct ManualClock {
    now_ms: Rc<std::cell::Cell<i64>>,
}

impl ManualClock {
    pub fn advance_to(&self, now_ms: i64) {
        self.now_ms.set(now_ms);
    }
}

impl ilink3_session::Clock for ManualClock {
    fn time_ms(&self) -> i64 {
        self.now_ms.get()
    }

    fn time_ns(&self) -> i64 {
        self.now_ms.get() * 1_000_000
    }
}
