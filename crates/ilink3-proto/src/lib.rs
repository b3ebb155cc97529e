//! Wire layer for the iLink3 session protocol.
//!
//! iLink3 messages are Simple Binary Encoding (SBE) blocks framed by a Simple
//! Open Framing Header (SOFH). This crate owns everything that touches raw
//! bytes: the two fixed headers, the template id registry with per-template
//! block lengths, the field-offset table used to stamp and read sequencing
//! fields inside business messages, and fixed-layout views for the
//! session-layer templates (Negotiate through NotApplied).
//!
//! # Components
//!
//! - [`Sofh`]: 6-byte framing header (big-endian length + encoding type)
//! - [`SbeHeader`]: 8-byte SBE message header (little-endian)
//! - [`TemplateMeta`] and [`field_offsets`]: static per-template metadata
//! - [`messages`]: typed encode/decode views for session-layer templates
//!
//! The crate performs no I/O and allocates only when decoding text fields.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod errors;
pub mod messages;
mod sbe;
mod sofh;
pub mod templates;

pub use errors::{ProtocolError, Result};
pub use sbe::SbeHeader;
pub use sofh::{Sofh, SOFH_ENCODING_SBE_LITTLE_ENDIAN};
pub use templates::{
    field_offsets, template_name, FieldOffsets, TemplateMeta, BOOLEAN_FLAG_TRUE, MISSING_OFFSET,
    SCHEMA_ID, SCHEMA_VERSION,
};
