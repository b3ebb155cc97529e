//! The duty-cycle poller: clock injection, idle/busy reporting, and frame
//! forwarding.

mod common;

use common::{
    encode_frame, test_config, ManualClock, RecordingHandler, RecordingPublication,
    RecordingReplayer, CONNECTION_ID, UUID,
};
use ilink3_proto::messages::{
    Establish, EstablishmentAck, FaultToleranceIndicator, Negotiate, NegotiationResponse,
};
use ilink3_session::{Session, SessionContext, SessionPoller, SessionState};

#[test]
fn poller_drives_the_handshake_and_reports_idle() {
    let (publication, sink) = RecordingPublication::new();
    let (handler, _handler_state) = RecordingHandler::new();
    let (replayer, _replays) = RecordingReplayer::new();
    let context = SessionContext {
        uuid: UUID,
        connection_id: CONNECTION_ID,
        newly_allocated: true,
        last_sent_seq_no: None,
        last_received_seq_no: None,
    };
    let (session, handle) =
        Session::new(test_config(500, 2_500), publication, handler, replayer, context, 0).unwrap();

    let clock = ManualClock::default();
    let mut poller = SessionPoller::new(session, clock.clone());

    // First cycle sends the Negotiate; the next is idle
    assert_eq!(poller.poll_once(), 1);
    assert_eq!(poller.session().state(), SessionState::SentNegotiate);
    assert_eq!(poller.poll_once(), 0);

    let body = {
        let committed = sink.borrow();
        common::body_of(committed.committed.last().unwrap()).to_vec()
    };
    let negotiate = Negotiate::decode(&body).unwrap();

    let response = NegotiationResponse {
        uuid: UUID,
        request_timestamp: negotiate.request_timestamp,
        fault_tolerance_indicator: FaultToleranceIndicator::Primary,
        previous_seq_no: 0,
        secret_key_expiration: 365,
    };
    let frame =
        encode_frame(&NegotiationResponse::TEMPLATE, |body| response.encode(body).unwrap());
    let handled = poller.on_frame(&frame).unwrap();
    assert_eq!(handled, ilink3_session::Handled::Applied);

    let body = {
        let committed = sink.borrow();
        common::body_of(committed.committed.last().unwrap()).to_vec()
    };
    let establish = Establish::decode(&body).unwrap();
    let ack = EstablishmentAck {
        uuid: UUID,
        request_timestamp: establish.request_timestamp,
        next_seq_no: 1,
        previous_seq_no: 0,
        previous_uuid: 0,
        keep_alive_interval: 500,
        fault_tolerance_indicator: FaultToleranceIndicator::Primary,
    };
    let frame = encode_frame(&EstablishmentAck::TEMPLATE, |body| ack.encode(body).unwrap());
    let _ = poller.on_frame(&frame).unwrap();

    assert_eq!(poller.session().state(), SessionState::Established);
    assert_eq!(handle.try_outcome(), Some(Ok(UUID)));

    // Time passing through the injected clock drives the keepalive
    clock.advance_to(501);
    assert_eq!(poller.poll_once(), 1);
    assert_eq!(poller.session().state(), SessionState::AwaitingKeepalive);
}

#[test]
fn poller_rejects_malformed_frames() {
    let (publication, _sink) = RecordingPublication::new();
    let (handler, _state) = RecordingHandler::new();
    let (replayer, _replays) = RecordingReplayer::new();
    let context = SessionContext {
        uuid: UUID,
        connection_id: CONNECTION_ID,
        newly_allocated: true,
        last_sent_seq_no: None,
        last_received_seq_no: None,
    };
    let (session, _handle) =
        Session::new(test_config(500, 2_500), publication, handler, replayer, context, 0).unwrap();
    let mut poller = SessionPoller::new(session, ManualClock::default());

    let result = poller.on_frame(&[0x00, 0x01]);
    assert!(result.is_err());
}
