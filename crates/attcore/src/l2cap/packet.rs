//! L2CAP Packet handling
//!
//! This module provides structures and functions for handling L2CAP packets.

use super::constants::*;
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

/// L2CAP Packet header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct L2capHeader {
    /// Length of the L2CAP payload in bytes
    pub length: u16,
    /// Channel Identifier
    pub channel_id: u16,
}

impl L2capHeader {
    /// Create a new L2CAP header
    pub fn new(length: u16, channel_id: u16) -> Self {
        Self { length, channel_id }
    }

    /// Parse an L2CAP header from raw bytes
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < L2CAP_BASIC_HEADER_SIZE {
            return None;
        }

        let mut cursor = Cursor::new(data);
        let length = cursor.read_u16::<LittleEndian>().ok()?;
        let channel_id = cursor.read_u16::<LittleEndian>().ok()?;

        Some(Self { length, channel_id })
    }

    /// Serialize the header to bytes
    pub fn to_bytes(&self) -> [u8; L2CAP_BASIC_HEADER_SIZE] {
        let mut result = [0u8; L2CAP_BASIC_HEADER_SIZE];
        result[..2].copy_from_slice(&self.length.to_le_bytes());
        result[2..].copy_from_slice(&self.channel_id.to_le_bytes());
        result
    }

    /// Total frame size, header included
    pub fn frame_len(&self) -> usize {
        L2CAP_BASIC_HEADER_SIZE + self.length as usize
    }
}

/// Basic information frame: header plus one complete payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicFrame {
    pub channel_id: u16,
    pub payload: Vec<u8>,
}

impl BasicFrame {
    pub fn new(channel_id: u16, payload: Vec<u8>) -> Self {
        Self {
            channel_id,
            payload,
        }
    }

    /// Parse a complete frame; the header length must match the payload exactly
    pub fn parse(data: &[u8]) -> Option<Self> {
        let header = L2capHeader::parse(data)?;
        if data.len() != header.frame_len() {
            return None;
        }

        Some(Self {
            channel_id: header.channel_id,
            payload: data[L2CAP_BASIC_HEADER_SIZE..].to_vec(),
        })
    }

    /// Serialize header and payload.
    ///
    /// Returns `None` when the payload does not fit the 16-bit length field.
    pub fn to_bytes(&self) -> Option<Vec<u8>> {
        let length = u16::try_from(self.payload.len()).ok()?;
        let header = L2capHeader::new(length, self.channel_id);

        let mut frame = Vec::with_capacity(header.frame_len());
        frame.extend_from_slice(&header.to_bytes());
        frame.extend_from_slice(&self.payload);
        Some(frame)
    }

    pub fn is_att(&self) -> bool {
        self.channel_id == L2CAP_CID_ATT
    }
}
