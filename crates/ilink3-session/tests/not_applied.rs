//! NotApplied handling: the handler's retransmit-or-gap-fill choice, the
//! back-pressure retry that never re-enters the handler, and the wrong-uuid
//! policy.

mod common;

use common::{encode_frame, ns, test_config, Harness, UUID};
use ilink3_proto::messages::{KeepAliveLapsed, NotApplied, Sequence, Terminate};
use ilink3_session::{SessionState, WrongUuidPolicy};

fn not_applied_frame(uuid: u64, from_seq_no: u64, msg_count: u32) -> Vec<u8> {
    let message = NotApplied { uuid, from_seq_no, msg_count };
    encode_frame(&NotApplied::TEMPLATE, |body| message.encode(body).unwrap())
}

#[test]
fn gap_fill_by_default() {
    let mut harness = Harness::connect(test_config(500, 2_500));
    harness.establish(0);

    harness.feed(&not_applied_frame(UUID, 3, 2), 100);

    assert_eq!(harness.handler.borrow().not_applied, vec![(3, 2)]);
    // Gap fill: Sequence(NotLapsed), straight back to Established
    assert_eq!(harness.last_template(), 506);
    let sequence = Sequence::decode(&harness.last_body()).unwrap();
    assert_eq!(sequence.keep_alive_lapsed, KeepAliveLapsed::NotLapsed);
    assert_eq!(harness.session.state(), SessionState::Established);
    assert!(harness.replays.borrow().requests.is_empty());
}

#[test]
fn retransmit_choice_replays_and_awaits_completion() {
    let mut harness = Harness::connect(test_config(500, 2_500));
    harness.establish(0);
    harness.handler.borrow_mut().retransmit_on_not_applied = true;

    harness.feed(&not_applied_frame(UUID, 3, 2), 100);

    assert_eq!(harness.replays.borrow().requests, vec![(UUID, 3, 2)]);
    assert_eq!(harness.session.state(), SessionState::Retransmitting);

    // Application sends are rejected while retransmitting
    let result = harness.session.try_claim(
        &ilink3_proto::templates::NEW_ORDER_SINGLE,
        60,
        ns(101),
    );
    assert!(result.is_err());

    let _ = harness.session.on_replay_complete(150);
    assert_eq!(harness.session.state(), SessionState::Established);
}

#[test]
fn backpressured_gap_fill_retries_without_reentering_handler() {
    let mut harness = Harness::connect(test_config(500, 2_500));
    harness.establish(0);

    harness.sink.borrow_mut().pressure_next(1);
    harness.feed(&not_applied_frame(UUID, 3, 2), 100);
    assert_eq!(harness.session.state(), SessionState::Retransmitting);
    assert_eq!(harness.handler.borrow().not_applied.len(), 1);

    // The poll retries the Sequence send; the handler is not consulted again
    assert_eq!(harness.session.poll(101, ns(101)), 1);
    assert_eq!(harness.session.state(), SessionState::Established);
    assert_eq!(harness.handler.borrow().not_applied.len(), 1);
    assert_eq!(harness.last_template(), 506);
}

#[test]
fn backpressured_replay_request_retries_without_reentering_handler() {
    let mut harness = Harness::connect(test_config(500, 2_500));
    harness.establish(0);
    harness.handler.borrow_mut().retransmit_on_not_applied = true;
    harness.replays.borrow_mut().pressured = 1;

    harness.feed(&not_applied_frame(UUID, 7, 4), 100);
    assert_eq!(harness.session.state(), SessionState::Retransmitting);
    assert!(harness.replays.borrow().requests.is_empty());

    assert_eq!(harness.session.poll(101, ns(101)), 1);
    assert_eq!(harness.replays.borrow().requests, vec![(UUID, 7, 4)]);
    assert_eq!(harness.handler.borrow().not_applied.len(), 1);
}

#[test]
fn wrong_uuid_terminates_by_default() {
    let mut harness = Harness::connect(test_config(500, 2_500));
    harness.establish(0);

    harness.feed(&not_applied_frame(UUID + 1, 3, 2), 100);

    assert_eq!(harness.last_template(), 507);
    let terminate = Terminate::decode(&harness.last_body()).unwrap();
    assert!(terminate.reason.contains("uuid mismatch"));
    assert_eq!(harness.session.state(), SessionState::Unbinding);
    // The handler never sees a NotApplied it cannot act on
    assert!(harness.handler.borrow().not_applied.is_empty());
}

#[test]
fn wrong_uuid_ignored_under_the_lenient_policy() {
    let mut config = test_config(500, 2_500);
    config.wrong_uuid_policy = WrongUuidPolicy::Ignore;
    let mut harness = Harness::connect(config);
    harness.establish(0);
    let committed_before = harness.committed().len();

    harness.feed(&not_applied_frame(UUID + 1, 3, 2), 100);

    assert_eq!(harness.committed().len(), committed_before);
    assert_eq!(harness.session.state(), SessionState::Established);
    assert!(harness.handler.borrow().not_applied.is_empty());
}
