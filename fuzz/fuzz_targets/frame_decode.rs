//! Fuzz the wire-layer decoders: SOFH, SBE header, and every session-layer
//! message view. Decoding untrusted bytes must never panic.

#![no_main]

use libfuzzer_sys::fuzz_target;

use ilink3_proto::{
    messages::{
        Establish, EstablishmentAck, EstablishmentReject, Negotiate, NegotiationReject,
        NegotiationResponse, NotApplied, RetransmitReject, RetransmitRequest, Retransmission,
        Sequence, Terminate,
    },
    SbeHeader, Sofh,
};

fuzz_target!(|data: &[u8]| {
    let _ = Sofh::from_bytes(data);
    let _ = SbeHeader::from_bytes(data);

    let _ = Negotiate::decode(data);
    let _ = NegotiationResponse::decode(data);
    let _ = NegotiationReject::decode(data);
    let _ = Establish::decode(data);
    let _ = EstablishmentAck::decode(data);
    let _ = EstablishmentReject::decode(data);
    let _ = Sequence::decode(data);
    let _ = Terminate::decode(data);
    let _ = RetransmitRequest::decode(data);
    let _ = Retransmission::decode(data);
    let _ = RetransmitReject::decode(data);
    let _ = NotApplied::decode(data);
});
