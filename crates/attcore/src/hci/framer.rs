//! HCI byte-stream framer
//!
//! Cuts the byte stream coming from the transport into complete HCI packets.
//! The framer first reads the packet type, then the header fields that come
//! before the length (opcode, event code or handle), then the length itself,
//! and finally `length` payload bytes. An unknown type byte or an oversized
//! length discards the packet in progress and the framer starts over with
//! the next byte.

use super::constants::*;
use super::packet::{HciPacket, HciPacketType};
use crate::error::HciError;
use log::{trace, warn};

/// Framer limits
#[derive(Debug, Clone)]
pub struct FramerConfig {
    /// Largest accepted command parameter length
    pub max_command_len: usize,
    /// Largest accepted ACL data length
    pub max_data_len: usize,
}

impl Default for FramerConfig {
    fn default() -> Self {
        Self {
            max_command_len: HCI_MAX_CMD_PKT_SIZE,
            max_data_len: HCI_MAX_DATA_PKT_SIZE,
        }
    }
}

/// Framer state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramerState {
    AwaitingPacketType,
    /// Opcode, event code or connection handle
    AwaitingHeaderFields,
    AwaitingLength,
    AwaitingPayload,
}

/// Reassembles HCI packets from a byte stream
#[derive(Debug)]
pub struct HciFramer {
    config: FramerConfig,
    state: FramerState,
    packet_type: HciPacketType,
    buffer: Vec<u8>,
    expected_len: usize,
}

impl Default for HciFramer {
    fn default() -> Self {
        Self::new(FramerConfig::default())
    }
}

impl HciFramer {
    pub fn new(config: FramerConfig) -> Self {
        Self {
            config,
            state: FramerState::AwaitingPacketType,
            packet_type: HciPacketType::Event,
            buffer: Vec::with_capacity(HCI_EVENT_MIN_LENGTH + HCI_MAX_CMD_PKT_SIZE),
            expected_len: 0,
        }
    }

    pub fn state(&self) -> FramerState {
        self.state
    }

    /// Bytes of the packet in progress, type byte included
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Drop any packet in progress
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.expected_len = 0;
        self.state = FramerState::AwaitingPacketType;
    }

    fn max_len(&self) -> usize {
        match self.packet_type {
            HciPacketType::Command => self.config.max_command_len,
            HciPacketType::AclData => self.config.max_data_len,
            HciPacketType::ScoData | HciPacketType::Event => u8::MAX as usize,
        }
    }

    /// Feed one byte, returning a packet when it completes one.
    ///
    /// An error discards the packet in progress; the framer is then waiting
    /// for a new packet type.
    pub fn push(&mut self, byte: u8) -> Result<Option<HciPacket>, HciError> {
        match self.state {
            FramerState::AwaitingPacketType => {
                self.packet_type = HciPacketType::try_from(byte)?;
                self.buffer.clear();
                self.buffer.push(byte);
                self.state = FramerState::AwaitingHeaderFields;
                Ok(None)
            }
            FramerState::AwaitingHeaderFields => {
                self.buffer.push(byte);
                let fields_end = self.packet_type.min_length() - self.packet_type.length_field_size();
                if self.buffer.len() == fields_end {
                    self.state = FramerState::AwaitingLength;
                }
                Ok(None)
            }
            FramerState::AwaitingLength => {
                self.buffer.push(byte);
                let header_len = self.packet_type.min_length();
                if self.buffer.len() < header_len {
                    return Ok(None);
                }

                let len = if self.packet_type.length_field_size() == 2 {
                    u16::from_le_bytes([self.buffer[header_len - 2], self.buffer[header_len - 1]])
                        as usize
                } else {
                    self.buffer[header_len - 1] as usize
                };
                let max = self.max_len();
                if len > max {
                    self.reset();
                    return Err(HciError::PacketTooLong { len, max });
                }

                self.expected_len = header_len + len;
                if len == 0 {
                    return self.complete().map(Some);
                }
                self.state = FramerState::AwaitingPayload;
                Ok(None)
            }
            FramerState::AwaitingPayload => {
                self.buffer.push(byte);
                if self.buffer.len() == self.expected_len {
                    return self.complete().map(Some);
                }
                Ok(None)
            }
        }
    }

    fn complete(&mut self) -> Result<HciPacket, HciError> {
        trace!("HCI rx: {}", hex::encode(&self.buffer));
        let packet = HciPacket::parse(&self.buffer);
        self.reset();
        packet
    }

    /// Feed a chunk of bytes, returning every packet completed by it.
    ///
    /// Malformed packets are logged and skipped.
    pub fn extend(&mut self, data: &[u8]) -> Vec<HciPacket> {
        let mut packets = Vec::new();
        for &byte in data {
            match self.push(byte) {
                Ok(Some(packet)) => packets.push(packet),
                Ok(None) => {}
                Err(e) => warn!("HCI framer resync: {}", e),
            }
        }
        packets
    }
}
