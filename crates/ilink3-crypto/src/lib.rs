//! Session authentication for the iLink3 protocol.
//!
//! Negotiate and Establish requests carry an HMAC-SHA256 signature over a
//! canonical multi-line request string. This crate builds the canonical
//! strings and computes the signatures from a base64url-encoded user key.
//! Decoded key material is zeroized on drop.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod canonical;
mod error;
mod signature;

pub use canonical::{establish_canonical_request, negotiate_canonical_request};
pub use error::SignatureError;
pub use signature::{sign, UserKey, SIGNATURE_LENGTH};
