//! Seam between the driver state machine and the native capture facility.
//!
//! The driver only ever talks to libpcap through these two traits, which
//! keeps the state machine testable without capture privileges.

use std::fmt;
use std::sync::Arc;

use pcap::Linktype;

/// Parameters used to open a live capture session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenParams {
    pub device: String,
    pub snapshot_length: i32,
    pub promiscuous: bool,
    pub timeout_ms: i32,
    pub filter: Option<String>,
}

/// A frame as read from the session, before the driver tags it with the
/// session's link-layer type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub wire_length: u32,
    pub captured_length: u32,
    pub ts_sec: i64,
    pub ts_usec: i64,
    pub data: Vec<u8>,
}

/// Outcome of a single read on a non-blocking session.
#[derive(Debug)]
pub enum SessionRead {
    Frame(RawFrame),
    /// Nothing buffered right now.
    Idle,
    /// The source is exhausted or was stopped out-of-band.
    Ended,
}

/// Receive and drop counters as reported by the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub received: u32,
    pub dropped: u32,
}

/// Out-of-band request to end a running capture on a session.
///
/// Safe to clone and trigger from any thread. Triggering it after the session
/// has been closed has no effect on other sessions.
#[derive(Clone)]
pub struct StopHandle(Arc<dyn Fn() + Send + Sync>);

impl StopHandle {
    pub fn new<F>(stop: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        StopHandle(Arc::new(stop))
    }

    pub fn stop(&self) {
        (self.0)()
    }
}

impl fmt::Debug for StopHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StopHandle")
    }
}

/// Opens sessions and enumerates devices.
pub trait CaptureEngine {
    type Session: CaptureSession;

    fn open_live(&self, params: &OpenParams) -> Result<Self::Session, pcap::Error>;

    fn list_devices(&self) -> Result<Vec<String>, pcap::Error>;
}

/// An open, non-reentrant capture session. Dropping it closes it.
pub trait CaptureSession: Sized {
    /// Switches the session to non-blocking reads. On failure the session is
    /// consumed, which closes it.
    fn into_nonblocking(self) -> Result<Self, pcap::Error>;

    fn link_type(&self) -> Linktype;

    /// Compiles `expression` and installs it. The compiled program is freed
    /// whether or not the install succeeds.
    fn apply_filter(&mut self, expression: &str) -> Result<(), pcap::Error>;

    fn stats(&mut self) -> Result<SessionStats, pcap::Error>;

    fn next_frame(&mut self) -> Result<SessionRead, pcap::Error>;

    fn stop_handle(&mut self) -> StopHandle;
}
