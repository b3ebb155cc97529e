//! Duty-cycle wrapper around a session.
//!
//! The poller is the only component that reads the clock. Each call reads
//! both time scales once and hands them to the state machine; all
//! suspension, timeouts, and retries are state transitions observed on
//! successive calls. Embed `poll_once` in the owning gateway's duty cycle
//! and feed inbound frames through `on_frame`.

use crate::{
    clock::Clock,
    error::SessionError,
    handler::SessionHandler,
    session::{Handled, Session},
    transport::{Publication, Replayer},
};

/// Polls one session with a clock.
pub struct SessionPoller<P, H, R, C> {
    session: Session<P, H, R>,
    clock: C,
}

impl<P, H, R, C> SessionPoller<P, H, R, C>
where
    P: Publication,
    H: SessionHandler,
    R: Replayer,
    C: Clock,
{
    /// Wrap a session and a clock.
    pub fn new(session: Session<P, H, R>, clock: C) -> Self {
        Self { session, clock }
    }

    /// Drive timers and retries once. Returns the number of work items
    /// performed; zero means idle.
    pub fn poll_once(&mut self) -> i32 {
        let now_ms = self.clock.time_ms();
        let now_ns = self.clock.time_ns();
        self.session.poll(now_ms, now_ns)
    }

    /// Dispatch one inbound SOFH-framed message.
    ///
    /// `Handled::BackPressured` means the frame must be redelivered on the
    /// next cycle.
    ///
    /// # Errors
    ///
    /// - `SessionError::Protocol` on malformed framing
    pub fn on_frame(&mut self, frame: &[u8]) -> Result<Handled, SessionError> {
        let now_ms = self.clock.time_ms();
        let now_ns = self.clock.time_ns();
        self.session.on_frame(frame, now_ms, now_ns)
    }

    /// The wrapped session.
    pub fn session(&self) -> &Session<P, H, R> {
        &self.session
    }

    /// The wrapped session, mutably.
    pub fn session_mut(&mut self) -> &mut Session<P, H, R> {
        &mut self.session
    }
}
