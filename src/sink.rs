use crossbeam_channel::Sender;
use log::info;

use crate::dispatch::{PacketRecord, PacketSink};
use crate::error::SinkError;

/// Forwards every captured packet to worker threads over a channel.
///
/// Once every receiver is gone the send fails, which stops the capture.
pub struct ChannelSink {
    tx: Sender<PacketRecord>,
    sent: u64,
}

impl ChannelSink {
    pub fn new(tx: Sender<PacketRecord>) -> Self {
        ChannelSink { tx, sent: 0 }
    }

    pub fn sent(&self) -> u64 {
        self.sent
    }
}

impl PacketSink for ChannelSink {
    fn handle_packet(&mut self, packet: PacketRecord) -> Result<(), SinkError> {
        if self.tx.send(packet).is_err() {
            info!("Channel closed after {} packets, stopping capture.", self.sent);
            return Err("packet channel disconnected".into());
        }
        self.sent += 1;
        Ok(())
    }
}
