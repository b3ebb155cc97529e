//! Client-side iLink3 session engine.
//!
//! A single-threaded, cooperatively-polled state machine that authenticates
//! via HMAC-SHA256, negotiates and establishes a session with explicit uuid
//! and request-timestamp binding, manages monotonic sent/received sequence
//! numbers with gap detection and bounded retransmit fan-out, enforces
//! bidirectional keepalive with the two-interval liveness rule, and frames
//! outbound messages into the transport's buffer with a zero-copy
//! claim/commit discipline.
//!
//! # Architecture
//!
//! The engine is sans-io. It owns no sockets and spawns no tasks: the
//! reliable ordered transport is the [`Publication`] seam, time is the
//! [`Clock`] seam, and replay of archived outbound messages is the
//! [`Replayer`] seam. Back-pressure is a [`ClaimOutcome::Pressured`] value,
//! never a blocked thread; every would-block condition is retried on a later
//! [`Session::poll`].
//!
//! # Components
//!
//! - [`Session`]: the state machine (lifecycle, sequencing, keepalive,
//!   retransmission, terminate handshake)
//! - [`Framer`]: outbound framing via claim/commit
//! - [`SessionPoller`]: thin duty-cycle wrapper owning the clock
//! - [`SessionHandler`]: callbacks to the embedding application
//! - [`InitiateHandle`]: one-shot outcome of the connection attempt

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod clock;
mod config;
mod error;
mod framer;
mod handler;
mod poller;
mod reply;
mod session;
mod transport;

pub use clock::{Clock, SystemClock};
pub use config::{
    InitialSequenceNumber, SessionConfig, WrongUuidPolicy, DEFAULT_KEEP_ALIVE_INTERVAL_MS,
    DEFAULT_RETRANSMIT_REQUEST_MESSAGE_LIMIT,
};
pub use error::{DisconnectReason, SessionError};
pub use framer::{Framer, GATEWAY_HEADER_LENGTH, HEADER_LENGTH};
pub use handler::{NotAppliedResponse, SessionHandler};
pub use poller::SessionPoller;
pub use reply::InitiateHandle;
pub use session::{Handled, Session, SessionContext, SessionState};
pub use transport::{ClaimOutcome, CloseReason, Publication, Replayer};
