//! Error types for session signing.

use thiserror::Error;

/// Errors that can occur while preparing or computing a session signature.
///
/// Any of these is fatal to the session that hit it: a key that cannot be
/// decoded will never authenticate, and retrying changes nothing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignatureError {
    /// User key is not valid base64url
    #[error("user key is not valid base64url: {0}")]
    InvalidUserKey(String),

    /// User key decoded to zero bytes
    #[error("user key is empty")]
    EmptyUserKey,
}
