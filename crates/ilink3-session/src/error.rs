//! Error types for the session engine.
//!
//! Strongly-typed errors per the failure taxonomy: transient back-pressure is
//! not an error (it is [`crate::transport::ClaimOutcome::Pressured`]);
//! everything here is either local misuse or fatal to the session.

use thiserror::Error;

use ilink3_crypto::SignatureError;
use ilink3_proto::ProtocolError;

use crate::{session::SessionState, transport::CloseReason};

/// Errors produced by the session state machine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Operation attempted in a state that does not permit it
    #[error("invalid state: cannot {operation} from {state:?}")]
    InvalidState {
        /// Current state when the error occurred
        state: SessionState,
        /// Operation that was attempted
        operation: &'static str,
    },

    /// Response carried a uuid or request timestamp that was never sent
    #[error(
        "illegal {message} response: uuid={received_uuid} (expected {expected_uuid}), \
         requestTimestamp={received_timestamp} (expected {expected_timestamp})"
    )]
    IllegalResponse {
        /// Message that failed the echo check
        message: &'static str,
        /// Uuid this session sent
        expected_uuid: u64,
        /// Uuid the response carried
        received_uuid: u64,
        /// Request timestamp this session sent
        expected_timestamp: i64,
        /// Request timestamp the response carried
        received_timestamp: i64,
    },

    /// Exchange rejected the Negotiate request
    #[error("negotiate rejected: {reason} (errorCodes={error_codes})")]
    NegotiateRejected {
        /// Reject reason from the exchange
        reason: String,
        /// Exchange error codes
        error_codes: u16,
    },

    /// Exchange rejected the Establish request
    #[error("establish rejected: {reason} (errorCodes={error_codes})")]
    EstablishRejected {
        /// Reject reason from the exchange
        reason: String,
        /// Exchange error codes
        error_codes: u16,
    },

    /// No NegotiationResponse arrived within the resend interval, twice
    #[error("negotiate timed out after {attempts} attempts")]
    NegotiateTimeout {
        /// Negotiate messages sent before giving up
        attempts: u32,
    },

    /// No EstablishmentAck arrived within the resend interval, twice
    #[error("establish timed out after {attempts} attempts")]
    EstablishTimeout {
        /// Establish messages sent before giving up
        attempts: u32,
    },

    /// Peer sent a sequence number below what this session expects
    #[error("sequence number too low: seqNo={received},expecting={expecting}")]
    LowSequenceNumber {
        /// Sequence number the peer sent
        received: u64,
        /// Sequence number this session expects
        expecting: u64,
    },

    /// Outbound publication closed underneath the session
    #[error("transport closed: {0:?}")]
    TransportClosed(CloseReason),

    /// Session signing failed
    #[error(transparent)]
    Signature(#[from] SignatureError),

    /// Wire-level encode or decode failed
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Why the session asked its owner to drop the transport connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Authentication echo check failed or the exchange refused credentials.
    FailedAuthentication,
    /// Negotiate was rejected by the exchange.
    NegotiateRejected,
    /// Establish was rejected by the exchange.
    EstablishRejected,
    /// The peer or transport terminated the connection.
    RemoteDisconnect,
    /// The local application asked for the disconnect.
    LocalRequest,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_sequence_message_carries_both_numbers() {
        let error = SessionError::LowSequenceNumber { received: 5, expecting: 10 };
        assert_eq!(error.to_string(), "sequence number too low: seqNo=5,expecting=10");
    }

    #[test]
    fn invalid_state_names_the_operation() {
        let error =
            SessionError::InvalidState { state: SessionState::Connected, operation: "try_claim" };
        assert!(error.to_string().contains("try_claim"));
        assert!(error.to_string().contains("Connected"));
    }
}
