//! Session configuration.

/// Default keepalive interval requested on Establish.
pub const DEFAULT_KEEP_ALIVE_INTERVAL_MS: i64 = 10_000;

/// Default upper bound on a single RetransmitRequest's message count.
pub const DEFAULT_RETRANSMIT_REQUEST_MESSAGE_LIMIT: u32 = 2_500;

/// Initial sequence number selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InitialSequenceNumber {
    /// Derive from the last-seen value: `last + 1` when a prior value exists,
    /// otherwise 1.
    #[default]
    Automatic,
    /// Use this exact value.
    Explicit(u64),
}

/// What to do when a NotApplied message carries a uuid this session never
/// used.
///
/// The conservative choice is to terminate: a foreign uuid on a sequencing
/// message means the two sides disagree about which session this is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WrongUuidPolicy {
    /// Terminate the session.
    #[default]
    Terminate,
    /// Log and drop the message.
    Ignore,
}

/// Configuration consumed by the session core.
///
/// Identity fields are bounded by their wire widths: `session_id` 3 bytes,
/// `firm_id` 5, `access_key_id` 20, trading system name/version/vendor
/// 30/10/10. Violations are rejected at session construction.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Three-character session id assigned by the exchange.
    pub session_id: String,
    /// Five-character firm id assigned by the exchange.
    pub firm_id: String,
    /// Access key id paired with the user key.
    pub access_key_id: String,
    /// base64url-encoded HMAC secret.
    pub user_key: String,
    /// Trading system name sent on Establish.
    pub trading_system_name: String,
    /// Trading system version sent on Establish.
    pub trading_system_version: String,
    /// Trading system vendor sent on Establish.
    pub trading_system_vendor: String,
    /// Keepalive interval requested on Establish, in milliseconds.
    pub keep_alive_interval_ms: i64,
    /// Establish straight away, skipping Negotiate, when a prior session for
    /// this uuid exists.
    pub re_establish_last_session: bool,
    /// First sequence number to send.
    pub initial_sent_sequence_number: InitialSequenceNumber,
    /// First sequence number to expect.
    pub initial_received_sequence_number: InitialSequenceNumber,
    /// Upper bound on a single RetransmitRequest's message count.
    pub retransmit_request_message_limit: u32,
    /// Policy for NotApplied messages carrying a foreign uuid.
    pub wrong_uuid_policy: WrongUuidPolicy,
}

impl SessionConfig {
    /// Configuration with the given credentials and default tunables.
    #[must_use]
    pub fn new(session_id: &str, firm_id: &str, access_key_id: &str, user_key: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            firm_id: firm_id.to_string(),
            access_key_id: access_key_id.to_string(),
            user_key: user_key.to_string(),
            trading_system_name: "ilink3-session".to_string(),
            trading_system_version: env!("CARGO_PKG_VERSION").to_string(),
            trading_system_vendor: "unknown".to_string(),
            keep_alive_interval_ms: DEFAULT_KEEP_ALIVE_INTERVAL_MS,
            re_establish_last_session: false,
            initial_sent_sequence_number: InitialSequenceNumber::Automatic,
            initial_received_sequence_number: InitialSequenceNumber::Automatic,
            retransmit_request_message_limit: DEFAULT_RETRANSMIT_REQUEST_MESSAGE_LIMIT,
            wrong_uuid_policy: WrongUuidPolicy::default(),
        }
    }
}
