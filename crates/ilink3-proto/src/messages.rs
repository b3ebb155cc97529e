//! Fixed-layout views for the session-layer templates.
//!
//! Every message here is a flat little-endian block: scalar fields in wire
//! order, text fields as fixed-width ASCII padded with NUL. Writers fill a
//! caller-supplied body sized to the template's block length; readers borrow
//! the body and return owned values. Business-message bodies are opaque to
//! this module beyond the shared sequencing prefix (see
//! [`crate::field_offsets`]).

use crate::{
    errors::{ProtocolError, Result},
    templates,
    templates::TemplateMeta,
};

/// Failover Trading Indicator on Sequence messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultToleranceIndicator {
    /// Sent by the backup leg.
    Backup,
    /// Sent by the primary leg.
    Primary,
}

impl FaultToleranceIndicator {
    /// Wire byte for this indicator.
    #[must_use]
    pub fn to_u8(self) -> u8 {
        match self {
            Self::Backup => 0,
            Self::Primary => 1,
        }
    }

    /// Parse a wire byte. Unknown values read as `Backup`.
    #[must_use]
    pub fn from_u8(value: u8) -> Self {
        if value == 1 { Self::Primary } else { Self::Backup }
    }
}

/// Whether the sender's keepalive interval lapsed since its last message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepAliveLapsed {
    /// Interval has not lapsed.
    NotLapsed,
    /// Interval lapsed; the receiver should answer with a Sequence.
    Lapsed,
}

impl KeepAliveLapsed {
    /// Wire byte for this flag.
    #[must_use]
    pub fn to_u8(self) -> u8 {
        match self {
            Self::NotLapsed => 0,
            Self::Lapsed => 1,
        }
    }

    /// Parse a wire byte. Unknown values read as `NotLapsed`.
    #[must_use]
    pub fn from_u8(value: u8) -> Self {
        if value == 1 { Self::Lapsed } else { Self::NotLapsed }
    }
}

/// Width of the HMAC signature field.
pub const HMAC_SIGNATURE_LENGTH: usize = 32;
/// Width of the access key id field.
pub const ACCESS_KEY_ID_LENGTH: usize = 20;
/// Width of the session id field.
pub const SESSION_ID_LENGTH: usize = 3;
/// Width of the firm id field.
pub const FIRM_ID_LENGTH: usize = 5;
/// Width of every reason field.
pub const REASON_LENGTH: usize = 48;

fn check_len(body: &[u8], meta: &TemplateMeta) -> Result<()> {
    let needed = meta.block_length as usize;
    if body.len() < needed {
        return Err(ProtocolError::BufferTooSmall { needed, actual: body.len() });
    }
    Ok(())
}

fn put_u16(body: &mut [u8], at: usize, value: u16) {
    body[at..at + 2].copy_from_slice(&value.to_le_bytes());
}

fn put_u64(body: &mut [u8], at: usize, value: u64) {
    body[at..at + 8].copy_from_slice(&value.to_le_bytes());
}

fn put_u32(body: &mut [u8], at: usize, value: u32) {
    body[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

fn get_u16(body: &[u8], at: usize) -> u16 {
    let mut bytes = [0u8; 2];
    bytes.copy_from_slice(&body[at..at + 2]);
    u16::from_le_bytes(bytes)
}

fn get_u32(body: &[u8], at: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&body[at..at + 4]);
    u32::from_le_bytes(bytes)
}

fn get_u64(body: &[u8], at: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&body[at..at + 8]);
    u64::from_le_bytes(bytes)
}

/// Write a text field that must fit its fixed width.
fn put_text(body: &mut [u8], at: usize, width: usize, field: &'static str, value: &str) -> Result<()> {
    let bytes = value.as_bytes();
    if bytes.len() > width {
        return Err(ProtocolError::FieldTooLong { field, max: width });
    }
    body[at..at + bytes.len()].copy_from_slice(bytes);
    for slot in &mut body[at + bytes.len()..at + width] {
        *slot = 0;
    }
    Ok(())
}

/// Write a free-text field, clipping to the fixed width.
///
/// Reason fields carry formatted diagnostics; clipping beats failing the send.
fn put_text_clipped(body: &mut [u8], at: usize, width: usize, value: &str) {
    let mut end = value.len().min(width);
    // Never split a UTF-8 sequence
    while end > 0 && !value.is_char_boundary(end) {
        end -= 1;
    }
    let bytes = &value.as_bytes()[..end];
    body[at..at + bytes.len()].copy_from_slice(bytes);
    for slot in &mut body[at + bytes.len()..at + width] {
        *slot = 0;
    }
}

/// Read a NUL-padded text field.
fn get_text(body: &[u8], at: usize, width: usize) -> String {
    let raw = &body[at..at + width];
    let end = raw.iter().position(|&b| b == 0).unwrap_or(width);
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

/// Negotiate, template 500.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Negotiate {
    /// HMAC-SHA256 over the canonical negotiate request.
    pub hmac_signature: [u8; HMAC_SIGNATURE_LENGTH],
    /// Access key id the signature belongs to.
    pub access_key_id: String,
    /// Session uuid chosen by the client.
    pub uuid: u64,
    /// Nanosecond timestamp echoed back by the exchange.
    pub request_timestamp: u64,
    /// Three-character session id.
    pub session_id: String,
    /// Five-character firm id.
    pub firm_id: String,
}

impl Negotiate {
    /// Template metadata.
    pub const TEMPLATE: TemplateMeta = templates::NEGOTIATE;

    /// Encode into a body of at least the block length.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::BufferTooSmall` if the body is short
    /// - `ProtocolError::FieldTooLong` if a text field overflows its width
    pub fn encode(&self, body: &mut [u8]) -> Result<()> {
        check_len(body, &Self::TEMPLATE)?;
        body[0..32].copy_from_slice(&self.hmac_signature);
        put_text(body, 32, ACCESS_KEY_ID_LENGTH, "accessKeyId", &self.access_key_id)?;
        put_u64(body, 52, self.uuid);
        put_u64(body, 60, self.request_timestamp);
        put_text(body, 68, SESSION_ID_LENGTH, "session", &self.session_id)?;
        put_text(body, 71, FIRM_ID_LENGTH, "firm", &self.firm_id)?;
        Ok(())
    }

    /// Decode from a body of at least the block length.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::BufferTooSmall` if the body is short
    pub fn decode(body: &[u8]) -> Result<Self> {
        check_len(body, &Self::TEMPLATE)?;
        let mut hmac_signature = [0u8; HMAC_SIGNATURE_LENGTH];
        hmac_signature.copy_from_slice(&body[0..32]);
        Ok(Self {
            hmac_signature,
            access_key_id: get_text(body, 32, ACCESS_KEY_ID_LENGTH),
            uuid: get_u64(body, 52),
            request_timestamp: get_u64(body, 60),
            session_id: get_text(body, 68, SESSION_ID_LENGTH),
            firm_id: get_text(body, 71, FIRM_ID_LENGTH),
        })
    }
}

/// NegotiationResponse, template 501.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NegotiationResponse {
    /// Session uuid, echoed.
    pub uuid: u64,
    /// Negotiate request timestamp, echoed.
    pub request_timestamp: u64,
    /// Which leg answered.
    pub fault_tolerance_indicator: FaultToleranceIndicator,
    /// Last sequence number of the previous uuid, 0 if none.
    pub previous_seq_no: u64,
    /// Days until the secret key expires.
    pub secret_key_expiration: u16,
}

impl NegotiationResponse {
    /// Template metadata.
    pub const TEMPLATE: TemplateMeta = templates::NEGOTIATION_RESPONSE;

    /// Encode into a body of at least the block length.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::BufferTooSmall` if the body is short
    pub fn encode(&self, body: &mut [u8]) -> Result<()> {
        check_len(body, &Self::TEMPLATE)?;
        put_u64(body, 0, self.uuid);
        put_u64(body, 8, self.request_timestamp);
        body[16] = self.fault_tolerance_indicator.to_u8();
        put_u64(body, 17, self.previous_seq_no);
        put_u16(body, 25, self.secret_key_expiration);
        Ok(())
    }

    /// Decode from a body of at least the block length.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::BufferTooSmall` if the body is short
    pub fn decode(body: &[u8]) -> Result<Self> {
        check_len(body, &Self::TEMPLATE)?;
        Ok(Self {
            uuid: get_u64(body, 0),
            request_timestamp: get_u64(body, 8),
            fault_tolerance_indicator: FaultToleranceIndicator::from_u8(body[16]),
            previous_seq_no: get_u64(body, 17),
            secret_key_expiration: get_u16(body, 25),
        })
    }
}

/// NegotiationReject, template 502.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiationReject {
    /// Session uuid, echoed.
    pub uuid: u64,
    /// Negotiate request timestamp, echoed.
    pub request_timestamp: u64,
    /// Exchange error codes.
    pub error_codes: u16,
    /// Reject reason text.
    pub reason: String,
}

impl NegotiationReject {
    /// Template metadata.
    pub const TEMPLATE: TemplateMeta = templates::NEGOTIATION_REJECT;

    /// Encode into a body of at least the block length.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::BufferTooSmall` if the body is short
    pub fn encode(&self, body: &mut [u8]) -> Result<()> {
        check_len(body, &Self::TEMPLATE)?;
        put_u64(body, 0, self.uuid);
        put_u64(body, 8, self.request_timestamp);
        put_u16(body, 16, self.error_codes);
        put_text_clipped(body, 18, REASON_LENGTH, &self.reason);
        Ok(())
    }

    /// Decode from a body of at least the block length.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::BufferTooSmall` if the body is short
    pub fn decode(body: &[u8]) -> Result<Self> {
        check_len(body, &Self::TEMPLATE)?;
        Ok(Self {
            uuid: get_u64(body, 0),
            request_timestamp: get_u64(body, 8),
            error_codes: get_u16(body, 16),
            reason: get_text(body, 18, REASON_LENGTH),
        })
    }
}

/// Establish, template 503.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Establish {
    /// HMAC-SHA256 over the canonical establish request.
    pub hmac_signature: [u8; HMAC_SIGNATURE_LENGTH],
    /// Access key id the signature belongs to.
    pub access_key_id: String,
    /// Trading system name.
    pub trading_system_name: String,
    /// Trading system version.
    pub trading_system_version: String,
    /// Trading system vendor.
    pub trading_system_vendor: String,
    /// Session uuid.
    pub uuid: u64,
    /// Nanosecond timestamp echoed back by the exchange.
    pub request_timestamp: u64,
    /// Next sequence number the client will send.
    pub next_seq_no: u64,
    /// Three-character session id.
    pub session_id: String,
    /// Five-character firm id.
    pub firm_id: String,
    /// Keepalive interval in milliseconds.
    pub keep_alive_interval: u16,
}

impl Establish {
    /// Template metadata.
    pub const TEMPLATE: TemplateMeta = templates::ESTABLISH;

    /// Encode into a body of at least the block length.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::BufferTooSmall` if the body is short
    /// - `ProtocolError::FieldTooLong` if a text field overflows its width
    pub fn encode(&self, body: &mut [u8]) -> Result<()> {
        check_len(body, &Self::TEMPLATE)?;
        body[0..32].copy_from_slice(&self.hmac_signature);
        put_text(body, 32, ACCESS_KEY_ID_LENGTH, "accessKeyId", &self.access_key_id)?;
        put_text(body, 52, 30, "tradingSystemName", &self.trading_system_name)?;
        put_text(body, 82, 10, "tradingSystemVersion", &self.trading_system_version)?;
        put_text(body, 92, 10, "tradingSystemVendor", &self.trading_system_vendor)?;
        put_u64(body, 102, self.uuid);
        put_u64(body, 110, self.request_timestamp);
        put_u64(body, 118, self.next_seq_no);
        put_text(body, 126, SESSION_ID_LENGTH, "session", &self.session_id)?;
        put_text(body, 129, FIRM_ID_LENGTH, "firm", &self.firm_id)?;
        put_u16(body, 134, self.keep_alive_interval);
        Ok(())
    }

    /// Decode from a body of at least the block length.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::BufferTooSmall` if the body is short
    pub fn decode(body: &[u8]) -> Result<Self> {
        check_len(body, &Self::TEMPLATE)?;
        let mut hmac_signature = [0u8; HMAC_SIGNATURE_LENGTH];
        hmac_signature.copy_from_slice(&body[0..32]);
        Ok(Self {
            hmac_signature,
            access_key_id: get_text(body, 32, ACCESS_KEY_ID_LENGTH),
            trading_system_name: get_text(body, 52, 30),
            trading_system_version: get_text(body, 82, 10),
            trading_system_vendor: get_text(body, 92, 10),
            uuid: get_u64(body, 102),
            request_timestamp: get_u64(body, 110),
            next_seq_no: get_u64(body, 118),
            session_id: get_text(body, 126, SESSION_ID_LENGTH),
            firm_id: get_text(body, 129, FIRM_ID_LENGTH),
            keep_alive_interval: get_u16(body, 134),
        })
    }
}

/// EstablishmentAck, template 504.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EstablishmentAck {
    /// Session uuid, echoed.
    pub uuid: u64,
    /// Establish request timestamp, echoed.
    pub request_timestamp: u64,
    /// Next sequence number the exchange will send.
    pub next_seq_no: u64,
    /// Last sequence number sent under the previous uuid, 0 if none.
    pub previous_seq_no: u64,
    /// Previous session uuid, 0 if none.
    pub previous_uuid: u64,
    /// Granted keepalive interval in milliseconds.
    pub keep_alive_interval: u16,
    /// Which leg answered.
    pub fault_tolerance_indicator: FaultToleranceIndicator,
}

impl EstablishmentAck {
    /// Template metadata.
    pub const TEMPLATE: TemplateMeta = templates::ESTABLISHMENT_ACK;

    /// Encode into a body of at least the block length.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::BufferTooSmall` if the body is short
    pub fn encode(&self, body: &mut [u8]) -> Result<()> {
        check_len(body, &Self::TEMPLATE)?;
        put_u64(body, 0, self.uuid);
        put_u64(body, 8, self.request_timestamp);
        put_u64(body, 16, self.next_seq_no);
        put_u64(body, 24, self.previous_seq_no);
        put_u64(body, 32, self.previous_uuid);
        put_u16(body, 40, self.keep_alive_interval);
        body[42] = self.fault_tolerance_indicator.to_u8();
        Ok(())
    }

    /// Decode from a body of at least the block length.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::BufferTooSmall` if the body is short
    pub fn decode(body: &[u8]) -> Result<Self> {
        check_len(body, &Self::TEMPLATE)?;
        Ok(Self {
            uuid: get_u64(body, 0),
            request_timestamp: get_u64(body, 8),
            next_seq_no: get_u64(body, 16),
            previous_seq_no: get_u64(body, 24),
            previous_uuid: get_u64(body, 32),
            keep_alive_interval: get_u16(body, 40),
            fault_tolerance_indicator: FaultToleranceIndicator::from_u8(body[42]),
        })
    }
}

/// EstablishmentReject, template 505.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EstablishmentReject {
    /// Session uuid, echoed.
    pub uuid: u64,
    /// Establish request timestamp, echoed.
    pub request_timestamp: u64,
    /// Next sequence number the exchange would expect.
    pub next_seq_no: u64,
    /// Exchange error codes.
    pub error_codes: u16,
    /// Reject reason text.
    pub reason: String,
}

impl EstablishmentReject {
    /// Template metadata.
    pub const TEMPLATE: TemplateMeta = templates::ESTABLISHMENT_REJECT;

    /// Encode into a body of at least the block length.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::BufferTooSmall` if the body is short
    pub fn encode(&self, body: &mut [u8]) -> Result<()> {
        check_len(body, &Self::TEMPLATE)?;
        put_u64(body, 0, self.uuid);
        put_u64(body, 8, self.request_timestamp);
        put_u64(body, 16, self.next_seq_no);
        put_u16(body, 24, self.error_codes);
        put_text_clipped(body, 26, REASON_LENGTH, &self.reason);
        Ok(())
    }

    /// Decode from a body of at least the block length.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::BufferTooSmall` if the body is short
    pub fn decode(body: &[u8]) -> Result<Self> {
        check_len(body, &Self::TEMPLATE)?;
        Ok(Self {
            uuid: get_u64(body, 0),
            request_timestamp: get_u64(body, 8),
            next_seq_no: get_u64(body, 16),
            error_codes: get_u16(body, 24),
            reason: get_text(body, 26, REASON_LENGTH),
        })
    }
}

/// Sequence, template 506.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sequence {
    /// Session uuid.
    pub uuid: u64,
    /// Next sequence number the sender will use.
    pub next_seq_no: u64,
    /// Which leg sent this.
    pub fault_tolerance_indicator: FaultToleranceIndicator,
    /// Whether the sender's keepalive interval lapsed.
    pub keep_alive_lapsed: KeepAliveLapsed,
}

impl Sequence {
    /// Template metadata.
    pub const TEMPLATE: TemplateMeta = templates::SEQUENCE;

    /// Encode into a body of at least the block length.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::BufferTooSmall` if the body is short
    pub fn encode(&self, body: &mut [u8]) -> Result<()> {
        check_len(body, &Self::TEMPLATE)?;
        put_u64(body, 0, self.uuid);
        put_u64(body, 8, self.next_seq_no);
        body[16] = self.fault_tolerance_indicator.to_u8();
        body[17] = self.keep_alive_lapsed.to_u8();
        Ok(())
    }

    /// Decode from a body of at least the block length.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::BufferTooSmall` if the body is short
    pub fn decode(body: &[u8]) -> Result<Self> {
        check_len(body, &Self::TEMPLATE)?;
        Ok(Self {
            uuid: get_u64(body, 0),
            next_seq_no: get_u64(body, 8),
            fault_tolerance_indicator: FaultToleranceIndicator::from_u8(body[16]),
            keep_alive_lapsed: KeepAliveLapsed::from_u8(body[17]),
        })
    }
}

/// Terminate, template 507.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Terminate {
    /// Session uuid.
    pub uuid: u64,
    /// Nanosecond timestamp of the request.
    pub request_timestamp: u64,
    /// Error codes, 0 for a clean termination.
    pub error_codes: u16,
    /// Termination reason text.
    pub reason: String,
}

impl Terminate {
    /// Template metadata.
    pub const TEMPLATE: TemplateMeta = templates::TERMINATE;

    /// Encode into a body of at least the block length.
    ///
    /// Reason text longer than the wire field is clipped.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::BufferTooSmall` if the body is short
    pub fn encode(&self, body: &mut [u8]) -> Result<()> {
        check_len(body, &Self::TEMPLATE)?;
        put_u64(body, 0, self.uuid);
        put_u64(body, 8, self.request_timestamp);
        put_u16(body, 16, self.error_codes);
        put_text_clipped(body, 18, REASON_LENGTH, &self.reason);
        Ok(())
    }

    /// Decode from a body of at least the block length.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::BufferTooSmall` if the body is short
    pub fn decode(body: &[u8]) -> Result<Self> {
        check_len(body, &Self::TEMPLATE)?;
        Ok(Self {
            uuid: get_u64(body, 0),
            request_timestamp: get_u64(body, 8),
            error_codes: get_u16(body, 16),
            reason: get_text(body, 18, REASON_LENGTH),
        })
    }
}

/// RetransmitRequest, template 508.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetransmitRequest {
    /// Session uuid.
    pub uuid: u64,
    /// Nanosecond timestamp of the request.
    pub request_timestamp: u64,
    /// First sequence number to retransmit.
    pub from_seq_no: u64,
    /// Number of messages to retransmit.
    pub msg_count: u16,
}

impl RetransmitRequest {
    /// Template metadata.
    pub const TEMPLATE: TemplateMeta = templates::RETRANSMIT_REQUEST;

    /// Encode into a body of at least the block length.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::BufferTooSmall` if the body is short
    pub fn encode(&self, body: &mut [u8]) -> Result<()> {
        check_len(body, &Self::TEMPLATE)?;
        put_u64(body, 0, self.uuid);
        put_u64(body, 8, self.request_timestamp);
        put_u64(body, 16, self.from_seq_no);
        put_u16(body, 24, self.msg_count);
        Ok(())
    }

    /// Decode from a body of at least the block length.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::BufferTooSmall` if the body is short
    pub fn decode(body: &[u8]) -> Result<Self> {
        check_len(body, &Self::TEMPLATE)?;
        Ok(Self {
            uuid: get_u64(body, 0),
            request_timestamp: get_u64(body, 8),
            from_seq_no: get_u64(body, 16),
            msg_count: get_u16(body, 24),
        })
    }
}

/// Retransmission, template 509. Announces a run of retransmitted messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Retransmission {
    /// Session uuid.
    pub uuid: u64,
    /// RetransmitRequest timestamp, echoed.
    pub request_timestamp: u64,
    /// First sequence number being retransmitted.
    pub from_seq_no: u64,
    /// Number of messages that will follow.
    pub msg_count: u16,
}

impl Retransmission {
    /// Template metadata.
    pub const TEMPLATE: TemplateMeta = templates::RETRANSMISSION;

    /// Encode into a body of at least the block length.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::BufferTooSmall` if the body is short
    pub fn encode(&self, body: &mut [u8]) -> Result<()> {
        check_len(body, &Self::TEMPLATE)?;
        put_u64(body, 0, self.uuid);
        put_u64(body, 8, self.request_timestamp);
        put_u64(body, 16, self.from_seq_no);
        put_u16(body, 24, self.msg_count);
        Ok(())
    }

    /// Decode from a body of at least the block length.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::BufferTooSmall` if the body is short
    pub fn decode(body: &[u8]) -> Result<Self> {
        check_len(body, &Self::TEMPLATE)?;
        Ok(Self {
            uuid: get_u64(body, 0),
            request_timestamp: get_u64(body, 8),
            from_seq_no: get_u64(body, 16),
            msg_count: get_u16(body, 24),
        })
    }
}

/// RetransmitReject, template 510.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetransmitReject {
    /// Session uuid.
    pub uuid: u64,
    /// RetransmitRequest timestamp, echoed.
    pub request_timestamp: u64,
    /// Exchange error codes.
    pub error_codes: u16,
    /// Reject reason text.
    pub reason: String,
}

impl RetransmitReject {
    /// Template metadata.
    pub const TEMPLATE: TemplateMeta = templates::RETRANSMIT_REJECT;

    /// Encode into a body of at least the block length.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::BufferTooSmall` if the body is short
    pub fn encode(&self, body: &mut [u8]) -> Result<()> {
        check_len(body, &Self::TEMPLATE)?;
        put_u64(body, 0, self.uuid);
        put_u64(body, 8, self.request_timestamp);
        put_u16(body, 16, self.error_codes);
        put_text_clipped(body, 18, REASON_LENGTH, &self.reason);
        Ok(())
    }

    /// Decode from a body of at least the block length.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::BufferTooSmall` if the body is short
    pub fn decode(body: &[u8]) -> Result<Self> {
        check_len(body, &Self::TEMPLATE)?;
        Ok(Self {
            uuid: get_u64(body, 0),
            request_timestamp: get_u64(body, 8),
            error_codes: get_u16(body, 16),
            reason: get_text(body, 18, REASON_LENGTH),
        })
    }
}

/// NotApplied, template 513. The exchange did not apply a run of our
/// outbound messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotApplied {
    /// Session uuid.
    pub uuid: u64,
    /// First sequence number not applied.
    pub from_seq_no: u64,
    /// Number of messages not applied.
    pub msg_count: u32,
}

impl NotApplied {
    /// Template metadata.
    pub const TEMPLATE: TemplateMeta = templates::NOT_APPLIED;

    /// Encode into a body of at least the block length.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::BufferTooSmall` if the body is short
    pub fn encode(&self, body: &mut [u8]) -> Result<()> {
        check_len(body, &Self::TEMPLATE)?;
        put_u64(body, 0, self.uuid);
        put_u64(body, 8, self.from_seq_no);
        put_u32(body, 16, self.msg_count);
        Ok(())
    }

    /// Decode from a body of at least the block length.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::BufferTooSmall` if the body is short
    pub fn decode(body: &[u8]) -> Result<Self> {
        check_len(body, &Self::TEMPLATE)?;
        Ok(Self {
            uuid: get_u64(body, 0),
            from_seq_no: get_u64(body, 8),
            msg_count: get_u32(body, 16),
        })
    }
}
