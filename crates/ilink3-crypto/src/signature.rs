//! HMAC-SHA256 session signatures.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::Zeroize;

use crate::error::SignatureError;

type HmacSha256 = Hmac<Sha256>;

/// Length of a session signature in bytes.
pub const SIGNATURE_LENGTH: usize = 32;

/// Decoded HMAC secret.
///
/// Decode once at configuration time and reuse for every Negotiate and
/// Establish of the session. The raw secret is zeroized on drop.
pub struct UserKey {
    secret: Vec<u8>,
}

impl UserKey {
    /// Decode a base64url-encoded user key (URL-safe alphabet, no padding).
    ///
    /// # Errors
    ///
    /// - `SignatureError::InvalidUserKey` if the encoding is malformed
    /// - `SignatureError::EmptyUserKey` if the key decodes to zero bytes
    pub fn decode(user_key_base64url: &str) -> Result<Self, SignatureError> {
        let secret = URL_SAFE_NO_PAD
            .decode(user_key_base64url)
            .map_err(|e| SignatureError::InvalidUserKey(e.to_string()))?;
        if secret.is_empty() {
            return Err(SignatureError::EmptyUserKey);
        }
        Ok(Self { secret })
    }

    /// Sign a canonical request string.
    ///
    /// The canonical request is hashed as its UTF-8 bytes.
    #[must_use]
    pub fn sign(&self, canonical_request: &str) -> [u8; SIGNATURE_LENGTH] {
        let Ok(mut mac) = HmacSha256::new_from_slice(&self.secret) else {
            unreachable!("HMAC-SHA256 accepts any key size");
        };
        mac.update(canonical_request.as_bytes());
        let result = mac.finalize().into_bytes();

        let mut signature = [0u8; SIGNATURE_LENGTH];
        signature.copy_from_slice(&result);
        signature
    }
}

impl Drop for UserKey {
    fn drop(&mut self) {
        self.secret.zeroize();
    }
}

/// Decode `user_key_base64url` and sign `canonical_request` in one step.
///
/// # Errors
///
/// - `SignatureError` if the key cannot be decoded
pub fn sign(
    user_key_base64url: &str,
    canonical_request: &str,
) -> Result<[u8; SIGNATURE_LENGTH], SignatureError> {
    Ok(UserKey::decode(user_key_base64url)?.sign(canonical_request))
}
