//! Scripted stand-in for libpcap used by the unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use pcap::{Error, Linktype};

use crate::engine::{CaptureEngine, CaptureSession, OpenParams, RawFrame, SessionRead, SessionStats, StopHandle};

/// One scripted read.
#[derive(Debug, Clone)]
pub enum Step {
    Frame(Vec<u8>),
    Idle,
    Fail(String),
}

/// What a session reports once its script runs out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Drained {
    Ended,
    Idle,
    Traffic,
}

/// Shared record of what the engine did to its sessions.
#[derive(Debug, Default)]
pub struct Tracker {
    opened: AtomicUsize,
    closed: Mutex<Vec<String>>,
    nonblocking: AtomicUsize,
    filters_applied: AtomicUsize,
}

impl Tracker {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed_devices().len()
    }

    pub fn closed_devices(&self) -> Vec<String> {
        self.closed.lock().unwrap().clone()
    }

    pub fn nonblocking_sessions(&self) -> usize {
        self.nonblocking.load(Ordering::SeqCst)
    }

    pub fn filters_applied(&self) -> usize {
        self.filters_applied.load(Ordering::SeqCst)
    }
}

pub struct MockEngine {
    tracker: Arc<Tracker>,
    script: Vec<Step>,
    devices: Result<Vec<String>, String>,
    open_error: Option<String>,
    nonblock_error: Option<String>,
    fail_install: bool,
    dropped: u32,
    drained: Drained,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::with_tracker(Arc::new(Tracker::default()))
    }

    pub fn with_tracker(tracker: Arc<Tracker>) -> Self {
        MockEngine {
            tracker,
            script: Vec::new(),
            devices: Ok(Vec::new()),
            open_error: None,
            nonblock_error: None,
            fail_install: false,
            dropped: 0,
            drained: Drained::Ended,
        }
    }

    pub fn tracker(&self) -> Arc<Tracker> {
        Arc::clone(&self.tracker)
    }

    pub fn script(mut self, steps: Vec<Step>) -> Self {
        self.script = steps;
        self
    }

    /// `count` frames of increasing size, the n-th frame filled with byte n.
    pub fn frames(self, count: usize) -> Self {
        let steps = (0..count).map(|n| Step::Frame(vec![n as u8; 60 + n * 40])).collect();
        self.script(steps)
    }

    pub fn devices(mut self, names: &[&str]) -> Self {
        self.devices = Ok(names.iter().map(|n| n.to_string()).collect());
        self
    }

    pub fn fail_list(mut self, msg: &str) -> Self {
        self.devices = Err(msg.to_string());
        self
    }

    pub fn fail_open(mut self, msg: &str) -> Self {
        self.open_error = Some(msg.to_string());
        self
    }

    pub fn fail_nonblock(mut self, msg: &str) -> Self {
        self.nonblock_error = Some(msg.to_string());
        self
    }

    pub fn fail_install(mut self) -> Self {
        self.fail_install = true;
        self
    }

    pub fn dropped(mut self, dropped: u32) -> Self {
        self.dropped = dropped;
        self
    }

    /// Report `Idle` instead of `Ended` once the script runs out, like a
    /// quiet live interface.
    pub fn idle_when_drained(mut self) -> Self {
        self.drained = Drained::Idle;
        self
    }

    /// Keep producing 64-byte frames once the script runs out, like a busy
    /// link that never goes idle.
    pub fn endless_traffic(mut self) -> Self {
        self.drained = Drained::Traffic;
        self
    }
}

pub struct MockSession {
    tracker: Arc<Tracker>,
    device: String,
    snapshot_length: usize,
    steps: VecDeque<Step>,
    nonblock_error: Option<String>,
    fail_install: bool,
    stopped: Arc<AtomicBool>,
    received: u32,
    dropped: u32,
    drained: Drained,
}

impl CaptureEngine for MockEngine {
    type Session = MockSession;

    fn open_live(&self, params: &OpenParams) -> Result<MockSession, Error> {
        if let Some(msg) = &self.open_error {
            return Err(Error::PcapError(msg.clone()));
        }
        self.tracker.opened.fetch_add(1, Ordering::SeqCst);
        Ok(MockSession {
            tracker: Arc::clone(&self.tracker),
            device: params.device.clone(),
            snapshot_length: params.snapshot_length as usize,
            steps: self.script.iter().cloned().collect(),
            nonblock_error: self.nonblock_error.clone(),
            fail_install: self.fail_install,
            stopped: Arc::new(AtomicBool::new(false)),
            received: 0,
            dropped: self.dropped,
            drained: self.drained,
        })
    }

    fn list_devices(&self) -> Result<Vec<String>, Error> {
        self.devices.clone().map_err(Error::PcapError)
    }
}

impl MockSession {
    fn frame(&mut self, data: Vec<u8>) -> SessionRead {
        self.received = self.received.wrapping_add(1);
        let wire_length = data.len() as u32;
        let captured: Vec<u8> = data.into_iter().take(self.snapshot_length).collect();
        SessionRead::Frame(RawFrame {
            wire_length,
            captured_length: captured.len() as u32,
            ts_sec: 1_700_000_000 + self.received as i64,
            ts_usec: (self.received as i64) * 10,
            data: captured,
        })
    }
}

impl CaptureSession for MockSession {
    fn into_nonblocking(self) -> Result<Self, Error> {
        if let Some(msg) = &self.nonblock_error {
            return Err(Error::PcapError(msg.clone()));
        }
        self.tracker.nonblocking.fetch_add(1, Ordering::SeqCst);
        Ok(self)
    }

    fn link_type(&self) -> Linktype {
        Linktype::ETHERNET
    }

    fn apply_filter(&mut self, expression: &str) -> Result<(), Error> {
        if expression.starts_with("!!") {
            return Err(Error::PcapError(format!("syntax error in filter expression: {}", expression)));
        }
        if self.fail_install {
            return Err(Error::PcapError("setfilter: invalid argument".to_string()));
        }
        self.tracker.filters_applied.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn stats(&mut self) -> Result<SessionStats, Error> {
        Ok(SessionStats {
            received: self.received,
            dropped: self.dropped,
        })
    }

    fn next_frame(&mut self) -> Result<SessionRead, Error> {
        if self.stopped.swap(false, Ordering::SeqCst) {
            return Ok(SessionRead::Ended);
        }
        match self.steps.pop_front() {
            Some(Step::Frame(data)) => Ok(self.frame(data)),
            Some(Step::Idle) => Ok(SessionRead::Idle),
            Some(Step::Fail(msg)) => Err(Error::PcapError(msg)),
            None => match self.drained {
                Drained::Ended => Ok(SessionRead::Ended),
                Drained::Idle => Ok(SessionRead::Idle),
                Drained::Traffic => Ok(self.frame(vec![0xab; 64])),
            },
        }
    }

    fn stop_handle(&mut self) -> StopHandle {
        let stopped = Arc::clone(&self.stopped);
        StopHandle::new(move || stopped.store(true, Ordering::SeqCst))
    }
}

impl Drop for MockSession {
    fn drop(&mut self) {
        if let Ok(mut closed) = self.tracker.closed.lock() {
            closed.push(self.device.clone());
        }
    }
}
