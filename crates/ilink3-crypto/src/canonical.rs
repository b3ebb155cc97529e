//! Canonical request strings.
//!
//! The exchange verifies session signatures over a canonical multi-line
//! rendition of the request: fields in a fixed order, joined by LF, with no
//! trailing LF. Both sides must produce the identical byte string or the
//! signature check fails.

use std::fmt::Write as _;

/// Canonical request for a Negotiate message.
///
/// Layout: `timestamp LF uuid LF sessionId LF firmId`.
#[must_use]
pub fn negotiate_canonical_request(
    request_timestamp: i64,
    uuid: u64,
    session_id: &str,
    firm_id: &str,
) -> String {
    format!("{request_timestamp}\n{uuid}\n{session_id}\n{firm_id}")
}

/// Canonical request for an Establish message.
///
/// Layout: `timestamp LF uuid LF sessionId LF firmId LF tradingSystemName LF
/// tradingSystemVersion LF tradingSystemVendor LF nextSentSeqNo LF
/// keepAliveInterval`.
#[must_use]
#[allow(clippy::too_many_arguments)]
pub fn establish_canonical_request(
    request_timestamp: i64,
    uuid: u64,
    session_id: &str,
    firm_id: &str,
    trading_system_name: &str,
    trading_system_version: &str,
    trading_system_vendor: &str,
    next_sent_seq_no: u64,
    keep_alive_interval_ms: i64,
) -> String {
    let mut canonical = String::with_capacity(96);
    let _ = write!(
        canonical,
        "{request_timestamp}\n{uuid}\n{session_id}\n{firm_id}\n{trading_system_name}\n{trading_system_version}\n{trading_system_vendor}\n{next_sent_seq_no}\n{keep_alive_interval_ms}"
    );
    canonical
}
