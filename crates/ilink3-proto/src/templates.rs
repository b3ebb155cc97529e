//! Template registry and field-offset table.
//!
//! Static metadata for every template the session layer touches: ids, block
//! lengths, and the byte offsets of the three sequencing fields the engine
//! stamps into outbound business messages and reads back from inbound ones
//! (`seqNum`, `sendingTimeEpoch`, `possRetrans`). Lookup is a dense array
//! indexed by template id, not dynamic dispatch.

/// Schema id shared by all session and business templates.
pub const SCHEMA_ID: u16 = 8;

/// Schema version this engine encodes with.
pub const SCHEMA_VERSION: u16 = 9;

/// Sentinel for a field a template does not carry.
pub const MISSING_OFFSET: i32 = -1;

/// Wire value of a boolean flag byte that is true. Any other value is false.
pub const BOOLEAN_FLAG_TRUE: u8 = 0x01;

/// Static per-template metadata written into the SBE header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemplateMeta {
    /// Template id.
    pub template_id: u16,
    /// Schema the template belongs to.
    pub schema_id: u16,
    /// Schema version.
    pub version: u16,
    /// Fixed root block length of the message body.
    pub block_length: u16,
}

const fn meta(template_id: u16, block_length: u16) -> TemplateMeta {
    TemplateMeta { template_id, schema_id: SCHEMA_ID, version: SCHEMA_VERSION, block_length }
}

/// Negotiate (client -> exchange).
pub const NEGOTIATE: TemplateMeta = meta(500, 76);
/// NegotiationResponse (exchange -> client).
pub const NEGOTIATION_RESPONSE: TemplateMeta = meta(501, 27);
/// NegotiationReject (exchange -> client).
pub const NEGOTIATION_REJECT: TemplateMeta = meta(502, 66);
/// Establish (client -> exchange).
pub const ESTABLISH: TemplateMeta = meta(503, 136);
/// EstablishmentAck (exchange -> client).
pub const ESTABLISHMENT_ACK: TemplateMeta = meta(504, 43);
/// EstablishmentReject (exchange -> client).
pub const ESTABLISHMENT_REJECT: TemplateMeta = meta(505, 74);
/// Sequence (both directions).
pub const SEQUENCE: TemplateMeta = meta(506, 18);
/// Terminate (both directions).
pub const TERMINATE: TemplateMeta = meta(507, 66);
/// RetransmitRequest (client -> exchange).
pub const RETRANSMIT_REQUEST: TemplateMeta = meta(508, 26);
/// Retransmission (exchange -> client).
pub const RETRANSMISSION: TemplateMeta = meta(509, 26);
/// RetransmitReject (exchange -> client).
pub const RETRANSMIT_REJECT: TemplateMeta = meta(510, 66);
/// NotApplied (exchange -> client).
pub const NOT_APPLIED: TemplateMeta = meta(513, 20);

/// NewOrderSingle (business, client -> exchange).
pub const NEW_ORDER_SINGLE: TemplateMeta = meta(514, 60);
/// OrderCancelReplaceRequest (business, client -> exchange).
pub const ORDER_CANCEL_REPLACE_REQUEST: TemplateMeta = meta(515, 64);
/// OrderCancelRequest (business, client -> exchange).
pub const ORDER_CANCEL_REQUEST: TemplateMeta = meta(516, 44);
/// BusinessReject (business, exchange -> client).
pub const BUSINESS_REJECT: TemplateMeta = meta(521, 58);
/// ExecutionReportNew (business, exchange -> client).
pub const EXECUTION_REPORT_NEW: TemplateMeta = meta(522, 76);
/// ExecutionReportTradeOutright (business, exchange -> client).
pub const EXECUTION_REPORT_TRADE_OUTRIGHT: TemplateMeta = meta(525, 96);

/// Byte offsets of the sequencing fields within a message body.
///
/// Offsets are non-negative byte positions, or [`MISSING_OFFSET`] when the
/// template does not carry the field. `seqNum` is a little-endian `u32`,
/// `sendingTimeEpoch` a little-endian `u64` of nanoseconds, `possRetrans` a
/// single flag byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldOffsets {
    /// Offset of the `seqNum` field.
    pub seq_num: i32,
    /// Offset of the `sendingTimeEpoch` field.
    pub sending_time_epoch: i32,
    /// Offset of the `possRetrans` flag byte.
    pub poss_retrans: i32,
}

impl FieldOffsets {
    /// Offsets for a template that carries none of the sequencing fields.
    pub const NONE: Self = Self {
        seq_num: MISSING_OFFSET,
        sending_time_epoch: MISSING_OFFSET,
        poss_retrans: MISSING_OFFSET,
    };

    /// Whether the template carries a `seqNum` field at all.
    ///
    /// Templates without one are session-control messages and are never
    /// sequenced.
    #[must_use]
    pub fn has_seq_num(&self) -> bool {
        self.seq_num != MISSING_OFFSET
    }

    /// Read `seqNum` out of a message body. `None` if the field is absent or
    /// the body is too short.
    #[must_use]
    pub fn read_seq_num(&self, body: &[u8]) -> Option<u64> {
        if !self.has_seq_num() {
            return None;
        }
        let at = self.seq_num as usize;
        let raw = body.get(at..at + 4)?;
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(raw);
        Some(u64::from(u32::from_le_bytes(bytes)))
    }

    /// Whether the `possRetrans` flag byte of a message body is set.
    ///
    /// Absent field or short body reads as false, matching the zero default.
    #[must_use]
    pub fn is_poss_retrans(&self, body: &[u8]) -> bool {
        if self.poss_retrans == MISSING_OFFSET {
            return false;
        }
        body.get(self.poss_retrans as usize) == Some(&BOOLEAN_FLAG_TRUE)
    }
}

/// Shared prefix of every business-message body: `seqNum` at 0, `uuid` at 4,
/// `sendingTimeEpoch` at 12, `possRetrans` at 20.
const BUSINESS_OFFSETS: FieldOffsets =
    FieldOffsets { seq_num: 0, sending_time_epoch: 12, poss_retrans: 20 };

const LOWEST_TEMPLATE_ID: u16 = 500;
const HIGHEST_TEMPLATE_ID: u16 = 525;
const TABLE_LEN: usize = (HIGHEST_TEMPLATE_ID - LOWEST_TEMPLATE_ID + 1) as usize;

static OFFSET_TABLE: [FieldOffsets; TABLE_LEN] = build_offset_table();

const fn build_offset_table() -> [FieldOffsets; TABLE_LEN] {
    let mut table = [FieldOffsets::NONE; TABLE_LEN];
    let business = [
        NEW_ORDER_SINGLE.template_id,
        ORDER_CANCEL_REPLACE_REQUEST.template_id,
        ORDER_CANCEL_REQUEST.template_id,
        BUSINESS_REJECT.template_id,
        EXECUTION_REPORT_NEW.template_id,
        EXECUTION_REPORT_TRADE_OUTRIGHT.template_id,
    ];
    let mut i = 0;
    while i < business.len() {
        table[(business[i] - LOWEST_TEMPLATE_ID) as usize] = BUSINESS_OFFSETS;
        i += 1;
    }
    table
}

/// Sequencing-field offsets for a template id.
///
/// Ids outside the registered range resolve to [`FieldOffsets::NONE`], so an
/// unknown template reads as an unsequenced control message.
#[must_use]
pub fn field_offsets(template_id: u16) -> FieldOffsets {
    if !(LOWEST_TEMPLATE_ID..=HIGHEST_TEMPLATE_ID).contains(&template_id) {
        return FieldOffsets::NONE;
    }
    OFFSET_TABLE[(template_id - LOWEST_TEMPLATE_ID) as usize]
}

/// Human-readable message name for logs and diagnostics.
#[must_use]
pub fn template_name(template_id: u16) -> &'static str {
    match template_id {
        500 => "Negotiate",
        501 => "NegotiationResponse",
        502 => "NegotiationReject",
        503 => "Establish",
        504 => "EstablishmentAck",
        505 => "EstablishmentReject",
        506 => "Sequence",
        507 => "Terminate",
        508 => "RetransmitRequest",
        509 => "Retransmission",
        510 => "RetransmitReject",
        513 => "NotApplied",
        514 => "NewOrderSingle",
        515 => "OrderCancelReplaceRequest",
        516 => "OrderCancelRequest",
        521 => "BusinessReject",
        522 => "ExecutionReportNew",
        525 => "ExecutionReportTradeOutright",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_templates_carry_no_sequencing_fields() {
        for id in [500, 501, 502, 503, 504, 505, 506, 507, 508, 509, 510, 513] {
            assert_eq!(field_offsets(id), FieldOffsets::NONE, "template {id}");
        }
    }

    #[test]
    fn business_templates_share_the_prefix() {
        for id in [514, 515, 516, 521, 522, 525] {
            let offsets = field_offsets(id);
            assert_eq!(offsets.seq_num, 0, "template {id}");
            assert_eq!(offsets.sending_time_epoch, 12, "template {id}");
            assert_eq!(offsets.poss_retrans, 20, "template {id}");
        }
    }

    #[test]
    fn unknown_templates_read_as_unsequenced() {
        assert_eq!(field_offsets(499), FieldOffsets::NONE);
        assert_eq!(field_offsets(526), FieldOffsets::NONE);
        assert_eq!(field_offsets(0), FieldOffsets::NONE);
    }

    #[test]
    fn read_seq_num_little_endian() {
        let offsets = field_offsets(522);
        let mut body = vec![0u8; 76];
        body[..4].copy_from_slice(&42u32.to_le_bytes());
        assert_eq!(offsets.read_seq_num(&body), Some(42));
    }

    #[test]
    fn read_seq_num_missing_or_short() {
        assert_eq!(field_offsets(506).read_seq_num(&[0u8; 18]), None);
        assert_eq!(field_offsets(522).read_seq_num(&[0u8; 2]), None);
    }

    #[test]
    fn poss_retrans_flag_byte() {
        let offsets = field_offsets(522);
        let mut body = vec![0u8; 76];
        assert!(!offsets.is_poss_retrans(&body));

        body[20] = BOOLEAN_FLAG_TRUE;
        assert!(offsets.is_poss_retrans(&body));

        // Only 0x01 is true
        body[20] = 0x02;
        assert!(!offsets.is_poss_retrans(&body));
    }
}
