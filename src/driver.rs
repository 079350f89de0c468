use log::{debug, info, warn};
use pcap::Linktype;

use crate::engine::{CaptureEngine, CaptureSession, OpenParams, StopHandle};
use crate::error::{DriverError, Result};

/// Liveness tag of a driver record.
pub enum DriverState<S> {
    /// Alive, no session.
    Fresh,
    /// Alive with an open session.
    Open { session: S, link_type: Linktype },
    /// Tombstoned. Never handed out again.
    Destroyed,
}

/// The owner of at most one capture session.
pub struct Driver<S> {
    state: DriverState<S>,
}

impl<S: CaptureSession> Driver<S> {
    pub fn new() -> Self {
        Driver {
            state: DriverState::Fresh,
        }
    }

    pub fn is_live(&self) -> bool {
        !matches!(self.state, DriverState::Destroyed)
    }

    pub fn has_session(&self) -> bool {
        matches!(self.state, DriverState::Open { .. })
    }

    pub fn link_type(&self) -> Option<Linktype> {
        match &self.state {
            DriverState::Open { link_type, .. } => Some(*link_type),
            _ => None,
        }
    }

    pub(crate) fn session_mut(&mut self) -> Option<(&mut S, Linktype)> {
        match &mut self.state {
            DriverState::Open { session, link_type } => Some((session, *link_type)),
            _ => None,
        }
    }

    /// Opens a live session, replacing any session already open.
    ///
    /// On any failure the driver is left without a session.
    pub fn open<E>(&mut self, engine: &E, params: &OpenParams) -> Result<()>
    where
        E: CaptureEngine<Session = S>,
    {
        if !self.is_live() {
            return Err(DriverError::InvalidDriver);
        }
        validate(params)?;

        self.close();

        let session = engine.open_live(params).map_err(|e| {
            warn!("Unable to open device '{}': {}", params.device, e);
            DriverError::from(e)
        })?;

        // A failed switch consumes the session, closing it.
        let mut session = session.into_nonblocking().map_err(|e| {
            warn!("Unable to set non-blocking mode on '{}': {}", params.device, e);
            DriverError::from(e)
        })?;

        let link_type = session.link_type();

        if let Some(expression) = params.filter.as_deref() {
            if let Err(e) = session.apply_filter(expression) {
                warn!("Filter '{}' rejected on '{}': {}", expression, params.device, e);
                return Err(e.into());
            }
            debug!("Installed filter '{}'", expression);
        }

        info!(
            "Opened '{}' (snaplen {}, promisc {}, timeout {}ms, linktype {})",
            params.device, params.snapshot_length, params.promiscuous, params.timeout_ms, link_type.0
        );
        self.state = DriverState::Open { session, link_type };
        Ok(())
    }

    /// Closes the session if one is open. Never fails.
    pub fn close(&mut self) {
        if self.has_session() {
            // Dropping the session releases the native handle.
            self.state = DriverState::Fresh;
            info!("Closed capture session");
        }
    }

    /// Closes any session and tombstones the record.
    pub fn destroy(&mut self) {
        self.close();
        self.state = DriverState::Destroyed;
    }

    pub fn receive_count(&mut self) -> Result<u32> {
        Ok(self.session_stats()?.received)
    }

    pub fn drop_count(&mut self) -> Result<u32> {
        Ok(self.session_stats()?.dropped)
    }

    fn session_stats(&mut self) -> Result<crate::engine::SessionStats> {
        if !self.is_live() {
            return Err(DriverError::InvalidDriver);
        }
        let (session, _) = self
            .session_mut()
            .ok_or_else(|| DriverError::Io("No device created".to_string()))?;
        Ok(session.stats()?)
    }

    pub fn stop_handle(&mut self) -> Result<StopHandle> {
        if !self.is_live() {
            return Err(DriverError::InvalidDriver);
        }
        let (session, _) = self
            .session_mut()
            .ok_or_else(|| DriverError::Io("No device created".to_string()))?;
        Ok(session.stop_handle())
    }
}

impl<S: CaptureSession> Default for Driver<S> {
    fn default() -> Self {
        Self::new()
    }
}

fn validate(params: &OpenParams) -> Result<()> {
    if params.device.is_empty() {
        return Err(DriverError::InvalidArgument("deviceName".to_string()));
    }
    if params.snapshot_length <= 0 {
        return Err(DriverError::InvalidArgument(format!(
            "snapshot length must be positive, got {}",
            params.snapshot_length
        )));
    }
    if params.timeout_ms < 0 {
        return Err(DriverError::InvalidArgument(format!(
            "timeout must not be negative, got {}",
            params.timeout_ms
        )));
    }
    Ok(())
}
