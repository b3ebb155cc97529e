//! SBE message header.
//!
//! Eight bytes of little-endian metadata in front of every message body:
//! block length, template id, schema id, schema version. The header is what
//! lets a receiver route on template id without decoding the body.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::{
    errors::{ProtocolError, Result},
    templates::TemplateMeta,
};

/// Eight-byte SBE message header (little-endian).
///
/// Fields are stored as raw byte arrays to avoid alignment issues; accessors
/// convert from wire byte order.
#[repr(C, packed)]
#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct SbeHeader {
    block_length: [u8; 2],
    template_id: [u8; 2],
    schema_id: [u8; 2],
    version: [u8; 2],
}

impl SbeHeader {
    /// Size of the serialized header (8 bytes).
    pub const SIZE: usize = 8;

    /// Create a header from template metadata.
    #[must_use]
    pub fn new(meta: &TemplateMeta) -> Self {
        Self {
            block_length: meta.block_length.to_le_bytes(),
            template_id: meta.template_id.to_le_bytes(),
            schema_id: meta.schema_id.to_le_bytes(),
            version: meta.version.to_le_bytes(),
        }
    }

    /// Parse a header from the front of `bytes` (zero-copy).
    ///
    /// Structural only: template id validation happens at dispatch, where the
    /// receiver knows which ids it understands.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::FrameTruncated` if fewer than 8 bytes are available
    pub fn from_bytes(bytes: &[u8]) -> Result<&Self> {
        Ok(Self::ref_from_prefix(bytes)
            .map_err(|_| ProtocolError::FrameTruncated {
                expected: Self::SIZE,
                actual: bytes.len(),
            })?
            .0)
    }

    /// Serialize the header into the first 8 bytes of `buf`.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::BufferTooSmall` if `buf` is shorter than 8 bytes
    pub fn write_to(&self, buf: &mut [u8]) -> Result<()> {
        let actual = buf.len();
        let dst = buf.get_mut(..Self::SIZE).ok_or(ProtocolError::BufferTooSmall {
            needed: Self::SIZE,
            actual,
        })?;
        dst.copy_from_slice(IntoBytes::as_bytes(self));
        Ok(())
    }

    /// Length of the fixed root block of the message body.
    #[must_use]
    pub fn block_length(&self) -> u16 {
        u16::from_le_bytes(self.block_length)
    }

    /// Template id identifying the message type.
    #[must_use]
    pub fn template_id(&self) -> u16 {
        u16::from_le_bytes(self.template_id)
    }

    /// Schema id the template belongs to.
    #[must_use]
    pub fn schema_id(&self) -> u16 {
        u16::from_le_bytes(self.schema_id)
    }

    /// Schema version the sender encoded with.
    #[must_use]
    pub fn version(&self) -> u16 {
        u16::from_le_bytes(self.version)
    }
}
