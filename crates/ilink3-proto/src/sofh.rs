//! Simple Open Framing Header.
//!
//! Every iLink3 message is prefixed by a six-byte framing header: a four-byte
//! big-endian message length followed by a two-byte big-endian encoding type.
//! The length counts the SOFH itself, the SBE message header, and the message
//! body. It never counts any transport envelope written in front of it.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::{
    errors::{ProtocolError, Result},
    sbe::SbeHeader,
};

/// SOFH encoding type for SBE little-endian payloads.
pub const SOFH_ENCODING_SBE_LITTLE_ENDIAN: u16 = 0xEB50;

/// Six-byte Simple Open Framing Header (big-endian).
///
/// Fields are stored as raw byte arrays to avoid alignment issues; accessors
/// convert from network byte order.
///
/// # Invariants
///
/// - `message_length()` >= [`Sofh::SIZE`] + [`SbeHeader::SIZE`]. Enforced by
///   [`Sofh::new`] (callers pass only the body length) and verified by
///   [`Sofh::from_bytes`].
#[repr(C, packed)]
#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct Sofh {
    message_length: [u8; 4],
    encoding_type: [u8; 2],
}

impl Sofh {
    /// Size of the serialized header (6 bytes).
    pub const SIZE: usize = 6;

    /// Create a header for a message whose SBE body (after the SBE header) is
    /// `body_length` bytes long.
    #[must_use]
    pub fn new(body_length: usize) -> Self {
        let message_length = (Self::SIZE + SbeHeader::SIZE + body_length) as u32;
        Self {
            message_length: message_length.to_be_bytes(),
            encoding_type: SOFH_ENCODING_SBE_LITTLE_ENDIAN.to_be_bytes(),
        }
    }

    /// Parse a header from the front of `bytes` (zero-copy).
    ///
    /// # Errors
    ///
    /// - `ProtocolError::FrameTruncated` if fewer than 6 bytes are available
    /// - `ProtocolError::InvalidEncodingType` if the encoding type is not SBE
    ///   little-endian
    /// - `ProtocolError::LengthTooSmall` if the length cannot cover the SOFH
    ///   and SBE headers
    pub fn from_bytes(bytes: &[u8]) -> Result<&Self> {
        let sofh = Self::ref_from_prefix(bytes)
            .map_err(|_| ProtocolError::FrameTruncated {
                expected: Self::SIZE,
                actual: bytes.len(),
            })?
            .0;

        if sofh.encoding_type() != SOFH_ENCODING_SBE_LITTLE_ENDIAN {
            return Err(ProtocolError::InvalidEncodingType(sofh.encoding_type()));
        }

        if (sofh.message_length() as usize) < Self::SIZE + SbeHeader::SIZE {
            return Err(ProtocolError::LengthTooSmall(sofh.message_length()));
        }

        Ok(sofh)
    }

    /// Serialize the header into the first 6 bytes of `buf`.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::BufferTooSmall` if `buf` is shorter than 6 bytes
    pub fn write_to(&self, buf: &mut [u8]) -> Result<()> {
        let actual = buf.len();
        let dst = buf.get_mut(..Self::SIZE).ok_or(ProtocolError::BufferTooSmall {
            needed: Self::SIZE,
            actual,
        })?;
        dst.copy_from_slice(IntoBytes::as_bytes(self));
        Ok(())
    }

    /// Total framed length: SOFH + SBE header + body.
    #[must_use]
    pub fn message_length(&self) -> u32 {
        u32::from_be_bytes(self.message_length)
    }

    /// Encoding type discriminator.
    #[must_use]
    pub fn encoding_type(&self) -> u16 {
        u16::from_be_bytes(self.encoding_type)
    }

    /// Length of everything after the SOFH (SBE header + body).
    #[must_use]
    pub fn trailing_length(&self) -> usize {
        self.message_length() as usize - Self::SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_counts_both_headers_and_body() {
        let sofh = Sofh::new(76);
        assert_eq!(sofh.message_length(), 6 + 8 + 76);
        assert_eq!(sofh.encoding_type(), SOFH_ENCODING_SBE_LITTLE_ENDIAN);
        assert_eq!(sofh.trailing_length(), 8 + 76);
    }

    #[test]
    fn round_trip() {
        let sofh = Sofh::new(18);
        let mut buf = [0u8; Sofh::SIZE];
        sofh.write_to(&mut buf).unwrap();

        let parsed = Sofh::from_bytes(&buf).unwrap();
        assert_eq!(parsed.message_length(), sofh.message_length());
    }

    #[test]
    fn wire_format_is_big_endian() {
        let sofh = Sofh::new(0);
        let mut buf = [0u8; Sofh::SIZE];
        sofh.write_to(&mut buf).unwrap();

        assert_eq!(buf, [0x00, 0x00, 0x00, 0x0E, 0xEB, 0x50]);
    }

    #[test]
    fn reject_truncated() {
        let result = Sofh::from_bytes(&[0u8; 3]);
        assert!(matches!(result, Err(ProtocolError::FrameTruncated { expected: 6, actual: 3 })));
    }

    #[test]
    fn reject_wrong_encoding_type() {
        let buf = [0x00, 0x00, 0x00, 0x20, 0x50, 0x00];
        let result = Sofh::from_bytes(&buf);
        assert!(matches!(result, Err(ProtocolError::InvalidEncodingType(0x5000))));
    }

    #[test]
    fn reject_length_below_headers() {
        let buf = [0x00, 0x00, 0x00, 0x0D, 0xEB, 0x50];
        let result = Sofh::from_bytes(&buf);
        assert!(matches!(result, Err(ProtocolError::LengthTooSmall(13))));
    }
}
