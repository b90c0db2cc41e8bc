//! Transport boundary
//!
//! The controller link is consumed through [`HciTransport`]: the host hands it
//! fully encoded packets and feeds whatever bytes it receives into the framer.
//! Opening and configuring the underlying UART, SPI or socket is left to the
//! implementor.

use super::packet::HciPacket;
use crate::error::HciError;
use log::trace;

/// Byte sink towards the controller
pub trait HciTransport {
    /// Write encoded packet bytes, type byte first
    fn write(&mut self, data: &[u8]) -> Result<(), HciError>;

    /// Encode and write one packet
    fn send_packet(&mut self, packet: &HciPacket) -> Result<(), HciError> {
        let bytes = packet.to_bytes()?;
        trace!("HCI tx: {}", hex::encode(&bytes));
        self.write(&bytes)
    }
}

impl<W: std::io::Write> HciTransport for W {
    fn write(&mut self, data: &[u8]) -> Result<(), HciError> {
        self.write_all(data)?;
        self.flush()?;
        Ok(())
    }
}
