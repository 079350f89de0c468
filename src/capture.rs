use log::debug;
use pcap::{Active, Capture, Device, Error, Linktype};

use crate::engine::{CaptureEngine, CaptureSession, OpenParams, RawFrame, SessionRead, SessionStats, StopHandle};

/// Capture engine backed by libpcap.
#[derive(Debug, Default, Clone, Copy)]
pub struct PcapEngine;

/// A live libpcap session. Dropping it closes the underlying `pcap_t`.
pub struct PcapSession {
    cap: Capture<Active>,
}

impl CaptureEngine for PcapEngine {
    type Session = PcapSession;

    fn open_live(&self, params: &OpenParams) -> Result<PcapSession, Error> {
        let cap = Capture::from_device(params.device.as_str())?
            .promisc(params.promiscuous)
            .snaplen(params.snapshot_length)
            .timeout(params.timeout_ms)
            .open()?;

        Ok(PcapSession { cap })
    }

    // Names come back in the order libpcap reports them.
    fn list_devices(&self) -> Result<Vec<String>, Error> {
        let devices = Device::list()?;
        Ok(devices.into_iter().map(|device| device.name).collect())
    }
}

impl CaptureSession for PcapSession {
    fn into_nonblocking(self) -> Result<Self, Error> {
        let cap = self.cap.setnonblock()?;
        Ok(PcapSession { cap })
    }

    fn link_type(&self) -> Linktype {
        self.cap.get_datalink()
    }

    fn apply_filter(&mut self, expression: &str) -> Result<(), Error> {
        // pcap compiles into a BpfProgram that frees itself once installed.
        self.cap.filter(expression, true)
    }

    fn stats(&mut self) -> Result<SessionStats, Error> {
        let stat = self.cap.stats()?;
        Ok(SessionStats {
            received: stat.received,
            dropped: stat.dropped,
        })
    }

    fn next_frame(&mut self) -> Result<SessionRead, Error> {
        match self.cap.next_packet() {
            Ok(packet) => Ok(SessionRead::Frame(RawFrame {
                wire_length: packet.header.len,
                captured_length: packet.header.caplen,
                ts_sec: packet.header.ts.tv_sec as i64,
                ts_usec: packet.header.ts.tv_usec as i64,
                // Owned copy; the borrowed buffer is reused by libpcap on the next read.
                data: packet.data.to_vec(),
            })),
            Err(Error::TimeoutExpired) => Ok(SessionRead::Idle),
            Err(Error::NoMorePackets) => {
                debug!("Capture source exhausted or loop broken");
                Ok(SessionRead::Ended)
            }
            Err(e) => Err(e),
        }
    }

    fn stop_handle(&mut self) -> StopHandle {
        let breaker = self.cap.breakloop_handle();
        StopHandle::new(move || breaker.breakloop())
    }
}
