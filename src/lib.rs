//! Handle-based driver exposing libpcap capture sessions to a host runtime.
mod capture;
mod dispatch;
mod driver;
mod engine;
mod error;
pub mod host;
mod registry;
mod settings;
mod sink;

#[cfg(test)]
mod mock;

pub use capture::{PcapEngine, PcapSession};
pub use dispatch::{
    capture, CaptureMode, PacketHandler, PacketRecord, PacketSink, DISPATCH_BATCH_LIMIT, HANDLER_METHOD_NAME,
    HANDLER_METHOD_SIGNATURE,
};
pub use driver::Driver;
pub use engine::{CaptureEngine, CaptureSession, OpenParams, RawFrame, SessionRead, SessionStats, StopHandle};
pub use error::{DriverError, Result, SinkError};
pub use host::CaptureDriver;
pub use registry::{DriverRegistry, Handle};
pub use settings::Settings;
pub use sink::ChannelSink;
