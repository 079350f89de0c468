//! Per-packet delivery from an open session to a host-supplied sink.

use std::thread;

use log::{debug, warn};

use crate::driver::Driver;
use crate::engine::{CaptureSession, SessionRead};
use crate::error::{DriverError, Result, SinkError};

/// Name of the per-packet callback a handler must expose.
pub const HANDLER_METHOD_NAME: &str = "handlePacket";
/// Shape of the callback: five integers and a byte array, returning nothing.
pub const HANDLER_METHOD_SIGNATURE: &str = "(IIIII[B)V";

/// Most packets one non-loop call hands over, whatever the requested count.
///
/// Stands in for libpcap's one-buffer-per-dispatch rule so that a busy link
/// cannot keep a non-loop call running.
pub const DISPATCH_BATCH_LIMIT: usize = 1024;

/// One captured frame, tagged with the link type of its session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketRecord {
    pub link_type: i32,
    pub wire_length: u32,
    pub captured_length: u32,
    pub ts_sec: i64,
    pub ts_usec: i64,
    /// Exactly `captured_length` bytes, owned by the receiver.
    pub payload: Vec<u8>,
}

/// Receives packets synchronously, in capture order.
///
/// Returning an error stops the capture that is delivering to this sink.
pub trait PacketSink {
    fn handle_packet(&mut self, packet: PacketRecord) -> std::result::Result<(), SinkError>;
}

/// Something the host hands to `capture`, which may or may not expose the
/// packet callback.
pub trait PacketHandler {
    fn callback(&mut self, name: &str, signature: &str) -> Option<&mut dyn PacketSink>;
}

impl<T: PacketSink> PacketHandler for T {
    fn callback(&mut self, name: &str, signature: &str) -> Option<&mut dyn PacketSink> {
        if name == HANDLER_METHOD_NAME && signature == HANDLER_METHOD_SIGNATURE {
            Some(self as &mut dyn PacketSink)
        } else {
            None
        }
    }
}

/// Draining policy for a capture call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureMode {
    /// Keep waiting for packets until the count is reached or the session ends.
    Loop,
    /// Only process packets already buffered.
    Dispatch,
}

impl From<bool> for CaptureMode {
    fn from(looping: bool) -> Self {
        if looping { CaptureMode::Loop } else { CaptureMode::Dispatch }
    }
}

/// Runs one capture call on `driver`, delivering up to `count` packets.
///
/// A non-positive `count` is unbounded in loop mode; in dispatch mode every
/// call stops after `DISPATCH_BATCH_LIMIT` packets. Returns the number of
/// packets the sink accepted.
pub fn capture<S, H>(driver: &mut Driver<S>, count: i32, handler: &mut H, mode: CaptureMode) -> Result<usize>
where
    S: CaptureSession,
    H: PacketHandler + ?Sized,
{
    if !driver.is_live() {
        return Err(DriverError::InvalidDriver);
    }
    let (session, link_type) = driver
        .session_mut()
        .ok_or_else(|| DriverError::Io("No device created".to_string()))?;

    let sink = handler
        .callback(HANDLER_METHOD_NAME, HANDLER_METHOD_SIGNATURE)
        .ok_or(DriverError::BadHandler)?;

    let requested = usize::try_from(count).ok().filter(|&n| n > 0);
    let limit = match mode {
        CaptureMode::Loop => requested,
        CaptureMode::Dispatch => Some(requested.map_or(DISPATCH_BATCH_LIMIT, |n| n.min(DISPATCH_BATCH_LIMIT))),
    };
    let mut delivered = 0usize;

    while limit.is_none_or(|n| delivered < n) {
        let frame = match session.next_frame() {
            Ok(SessionRead::Frame(frame)) => frame,
            Ok(SessionRead::Idle) => match mode {
                CaptureMode::Dispatch => break,
                CaptureMode::Loop => {
                    thread::yield_now();
                    continue;
                }
            },
            Ok(SessionRead::Ended) => break,
            Err(e) => {
                warn!("Capture aborted after {} packets: {}", delivered, e);
                return Err(e.into());
            }
        };

        let packet = PacketRecord {
            link_type: link_type.0,
            wire_length: frame.wire_length,
            captured_length: frame.captured_length,
            ts_sec: frame.ts_sec,
            ts_usec: frame.ts_usec,
            payload: frame.data,
        };

        if let Err(e) = sink.handle_packet(packet) {
            debug!("Packet sink failed on packet {}: {}", delivered + 1, e);
            return Err(DriverError::Sink(e));
        }
        delivered += 1;
    }

    debug!("Capture delivered {} packets ({:?})", delivered, mode);
    Ok(delivered)
}
