use thiserror::Error;

/// Error raised by a packet sink while handling a packet.
pub type SinkError = Box<dyn std::error::Error + Send + Sync>;

pub type Result<T> = std::result::Result<T, DriverError>;

/// Failures surfaced by every boundary operation of the driver.
#[derive(Error, Debug)]
pub enum DriverError {
    /// The handle is unknown, stale or destroyed.
    #[error("Invalid Driver ID")]
    InvalidDriver,

    /// The capture engine reported an error. Carries the engine's own text.
    #[error("{0}")]
    Io(String),

    /// The handler does not expose the per-packet callback.
    #[error("Unable to locate call back method for handler")]
    BadHandler,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Raised by the packet sink and passed through untouched.
    #[error("{0}")]
    Sink(#[source] SinkError),
}

impl From<pcap::Error> for DriverError {
    fn from(err: pcap::Error) -> Self {
        DriverError::Io(err.to_string())
    }
}
