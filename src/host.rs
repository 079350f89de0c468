//! Process-wide entry points for the host runtime.
//!
//! Each function mirrors one exported native call and resolves its handle in
//! a single registry backed by libpcap. A capture only occupies its own
//! handle: other handles stay usable from any thread, and `close` or
//! `destroy_driver` on the capturing handle breaks its loop.

use std::sync::LazyLock;

use crate::capture::PcapEngine;
use crate::dispatch::{CaptureMode, PacketHandler};
use crate::engine::{OpenParams, StopHandle};
use crate::error::Result;
use crate::registry::{DriverRegistry, Handle};

/// Captures the headers of most protocols.
pub const DEFAULT_SNAPSHOT_LENGTH: i32 = 96;

/// Captures whole frames.
pub const MAX_SNAPSHOT_LENGTH: i32 = 65536;

/// Read timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: i32 = 1000;

static REGISTRY: LazyLock<DriverRegistry<PcapEngine>> = LazyLock::new(|| DriverRegistry::new(PcapEngine));

pub fn create_driver() -> Handle {
    REGISTRY.create()
}

pub fn destroy_driver(handle: Handle) {
    REGISTRY.destroy(handle)
}

pub fn is_valid_driver(handle: Handle) -> bool {
    REGISTRY.is_valid(handle)
}

/// Opens `device` on the driver. A missing device name is an invalid argument.
pub fn open_live_device(
    handle: Handle,
    device: Option<&str>,
    snapshot_length: i32,
    promiscuous: bool,
    timeout_ms: i32,
    filter: Option<&str>,
) -> Result<()> {
    let params = OpenParams {
        device: device.unwrap_or_default().to_string(),
        snapshot_length,
        promiscuous,
        timeout_ms,
        filter: filter.map(str::to_string),
    };
    REGISTRY.open(handle, &params)
}

pub fn close(handle: Handle) {
    REGISTRY.close(handle)
}

pub fn get_receive_count(handle: Handle) -> Result<u32> {
    REGISTRY.receive_count(handle)
}

pub fn get_drop_count(handle: Handle) -> Result<u32> {
    REGISTRY.drop_count(handle)
}

pub fn stop_handle(handle: Handle) -> Result<StopHandle> {
    REGISTRY.stop_handle(handle)
}

pub fn capture<H>(handle: Handle, count: i32, handler: &mut H, looping: bool) -> Result<usize>
where
    H: PacketHandler + ?Sized,
{
    REGISTRY.capture(handle, count, handler, CaptureMode::from(looping))
}

pub fn lookup_all_devices() -> Result<Vec<String>> {
    REGISTRY.list_devices()
}

/// Owns one driver handle for its lifetime and destroys it on drop.
#[derive(Debug)]
pub struct CaptureDriver {
    handle: Handle,
}

impl CaptureDriver {
    pub fn new() -> Self {
        CaptureDriver {
            handle: create_driver(),
        }
    }

    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// Opens a live device, closing any device already open on this driver.
    ///
    /// `filter` selects packets using libpcap's filter syntax; `None`
    /// captures everything.
    pub fn open(
        &self,
        device: &str,
        snapshot_length: i32,
        promiscuous: bool,
        timeout_ms: i32,
        filter: Option<&str>,
    ) -> Result<()> {
        open_live_device(self.handle, Some(device), snapshot_length, promiscuous, timeout_ms, filter)
    }

    /// Waits for up to `count` packets and hands each to `handler`.
    pub fn capture<H>(&self, count: i32, handler: &mut H) -> Result<usize>
    where
        H: PacketHandler + ?Sized,
    {
        capture(self.handle, count, handler, true)
    }

    /// Hands over up to `count` packets that are already buffered, without waiting.
    pub fn dispatch<H>(&self, count: i32, handler: &mut H) -> Result<usize>
    where
        H: PacketHandler + ?Sized,
    {
        capture(self.handle, count, handler, false)
    }

    pub fn dropped_count(&self) -> Result<u32> {
        get_drop_count(self.handle)
    }

    pub fn received_count(&self) -> Result<u32> {
        get_receive_count(self.handle)
    }

    pub fn stop_handle(&self) -> Result<StopHandle> {
        stop_handle(self.handle)
    }

    pub fn close(&self) {
        close(self.handle)
    }

    pub fn lookup_devices() -> Result<Vec<String>> {
        lookup_all_devices()
    }
}

impl Default for CaptureDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CaptureDriver {
    fn drop(&mut self) {
        destroy_driver(self.handle);
    }
}
