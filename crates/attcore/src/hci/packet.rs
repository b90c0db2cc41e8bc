//! HCI packet structures and parsing
//!
//! This module contains structures and methods for handling HCI packets.

use crate::error::HciError;
use crate::hci::constants::*;
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

/// HCI packet type indicator, the first byte of every packet on the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum HciPacketType {
    Command = HCI_COMMAND_PKT,
    AclData = HCI_ACL_PKT,
    ScoData = HCI_SCO_PKT,
    Event = HCI_EVENT_PKT,
}

impl HciPacketType {
    /// Minimum packet length including the type byte
    pub fn min_length(self) -> usize {
        match self {
            Self::Command => HCI_CMD_MIN_LENGTH,
            Self::AclData => HCI_DATA_MIN_LENGTH,
            Self::ScoData => HCI_SCO_MIN_LENGTH,
            Self::Event => HCI_EVENT_MIN_LENGTH,
        }
    }

    /// Width of the length field that closes the header
    pub fn length_field_size(self) -> usize {
        match self {
            Self::AclData => 2,
            _ => 1,
        }
    }
}

impl TryFrom<u8> for HciPacketType {
    type Error = HciError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            HCI_COMMAND_PKT => Ok(Self::Command),
            HCI_ACL_PKT => Ok(Self::AclData),
            HCI_SCO_PKT => Ok(Self::ScoData),
            HCI_EVENT_PKT => Ok(Self::Event),
            other => Err(HciError::InvalidPacketType(other)),
        }
    }
}

/// ACL packet boundary flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketBoundary {
    FirstNonFlushable,
    Continuing,
    FirstFlushable,
    /// 0b11, complete automatically-flushable PDU
    Complete,
}

impl PacketBoundary {
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            HCI_PB_FIRST_NON_FLUSHABLE => Self::FirstNonFlushable,
            HCI_PB_CONTINUING => Self::Continuing,
            HCI_PB_FIRST_FLUSHABLE => Self::FirstFlushable,
            _ => Self::Complete,
        }
    }

    pub fn bits(self) -> u8 {
        match self {
            Self::FirstNonFlushable => HCI_PB_FIRST_NON_FLUSHABLE,
            Self::Continuing => HCI_PB_CONTINUING,
            Self::FirstFlushable => HCI_PB_FIRST_FLUSHABLE,
            Self::Complete => 0b11,
        }
    }

    /// Whether this fragment starts a new higher-layer PDU
    pub fn is_start(self) -> bool {
        self != Self::Continuing
    }
}

/// HCI command packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HciCommand {
    pub opcode: u16,
    pub parameters: Vec<u8>,
}

impl HciCommand {
    /// Create a command for the controller.
    ///
    /// Application-only vendor opcodes are refused, as are parameter blocks
    /// longer than 255 bytes.
    pub fn new(opcode: u16, parameters: Vec<u8>) -> Result<Self, HciError> {
        if parameters.len() > HCI_MAX_CMD_PKT_SIZE {
            return Err(HciError::InvalidParamLength(parameters.len()));
        }
        if is_application_only(opcode) {
            return Err(HciError::Unsupported(opcode));
        }
        Ok(Self { opcode, parameters })
    }

    /// Create a command from its OGF and OCF
    pub fn from_parts(ogf: u8, ocf: u16, parameters: Vec<u8>) -> Result<Self, HciError> {
        Self::new(opcode_from_parts(ogf, ocf), parameters)
    }

    /// HCI_Reset
    pub fn reset() -> Self {
        Self {
            opcode: HCI_RESET,
            parameters: Vec::new(),
        }
    }

    /// HCI_Disconnect
    pub fn disconnect(handle: u16, reason: u8) -> Self {
        let mut parameters = Vec::with_capacity(3);
        parameters.extend_from_slice(&(handle & HCI_CONN_HANDLE_MASK).to_le_bytes());
        parameters.push(reason);
        Self {
            opcode: HCI_DISCONNECT,
            parameters,
        }
    }

    /// Opcode Group Field
    pub fn ogf(&self) -> u8 {
        (self.opcode >> 10) as u8
    }

    /// Opcode Command Field
    pub fn ocf(&self) -> u16 {
        self.opcode & 0x3FF
    }
}

/// Combine an OGF and OCF into a command opcode
pub fn opcode_from_parts(ogf: u8, ocf: u16) -> u16 {
    ((ogf as u16) << 10) | (ocf & 0x3FF)
}

/// ACL data packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AclData {
    /// Connection handle (12 bits)
    pub handle: u16,
    pub boundary: PacketBoundary,
    /// Broadcast flag (2 bits)
    pub broadcast: u8,
    pub data: Vec<u8>,
}

impl AclData {
    pub fn new(handle: u16, boundary: PacketBoundary, data: Vec<u8>) -> Self {
        Self {
            handle: handle & HCI_CONN_HANDLE_MASK,
            boundary,
            broadcast: 0,
            data,
        }
    }

    /// Handle field with the PB and BC flags packed into the top bits
    pub fn handle_field(&self) -> u16 {
        (self.handle & HCI_CONN_HANDLE_MASK)
            | ((self.boundary.bits() as u16) << HCI_PB_FLAG_SHIFT)
            | (((self.broadcast & 0b11) as u16) << HCI_BC_FLAG_SHIFT)
    }

    fn from_handle_field(field: u16, data: Vec<u8>) -> Self {
        Self {
            handle: field & HCI_CONN_HANDLE_MASK,
            boundary: PacketBoundary::from_bits((field >> HCI_PB_FLAG_SHIFT) as u8),
            broadcast: ((field >> HCI_BC_FLAG_SHIFT) & 0b11) as u8,
            data,
        }
    }
}

/// SCO data packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoData {
    /// Connection handle (12 bits)
    pub handle: u16,
    /// Packet status flags (2 bits)
    pub status: u8,
    pub data: Vec<u8>,
}

/// HCI Event packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HciEvent {
    pub event_code: u8,
    pub parameters: Vec<u8>,
}

impl HciEvent {
    /// Parse an HCI event from raw bytes, without the packet type byte
    pub fn parse(data: &[u8]) -> Result<Self, HciError> {
        if data.len() < 2 {
            return Err(HciError::InvalidPacketFormat);
        }

        let event_code = data[0];
        let parameter_total_length = data[1] as usize;

        if data.len() != parameter_total_length + 2 {
            return Err(HciError::InvalidPacketFormat);
        }

        Ok(HciEvent {
            event_code,
            parameters: data[2..].to_vec(),
        })
    }

    /// Sub-event code of an LE Meta event
    pub fn le_subevent(&self) -> Option<u8> {
        if self.event_code == EVT_LE_META_EVENT {
            self.parameters.first().copied()
        } else {
            None
        }
    }
}

/// LE Connection Complete event data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeConnectionComplete {
    pub status: u8,
    pub connection_handle: u16,
    pub role: u8,
    pub peer_address_type: u8,
    pub peer_address: [u8; 6],
    pub conn_interval: u16,
    pub conn_latency: u16,
    pub supervision_timeout: u16,
    pub master_clock_accuracy: u8,
}

impl LeConnectionComplete {
    /// Parse an LE Connection Complete event from an HCI Meta Event
    pub fn parse(event: &HciEvent) -> Option<Self> {
        if event.le_subevent() != Some(EVT_LE_CONN_COMPLETE) || event.parameters.len() < 19 {
            return None;
        }

        let p = &event.parameters;
        let mut peer_address = [0u8; 6];
        peer_address.copy_from_slice(&p[6..12]);

        Some(LeConnectionComplete {
            status: p[1],
            connection_handle: u16::from_le_bytes([p[2], p[3]]) & HCI_CONN_HANDLE_MASK,
            role: p[4],
            peer_address_type: p[5],
            peer_address,
            conn_interval: u16::from_le_bytes([p[12], p[13]]),
            conn_latency: u16::from_le_bytes([p[14], p[15]]),
            supervision_timeout: u16::from_le_bytes([p[16], p[17]]),
            master_clock_accuracy: p[18],
        })
    }
}

/// Disconnection Complete event data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisconnectionComplete {
    pub status: u8,
    pub connection_handle: u16,
    pub reason: u8,
}

impl DisconnectionComplete {
    /// Parse a Disconnection Complete event
    pub fn parse(event: &HciEvent) -> Option<Self> {
        if event.event_code != EVT_DISCONN_COMPLETE || event.parameters.len() < 4 {
            return None;
        }

        Some(DisconnectionComplete {
            status: event.parameters[0],
            connection_handle: u16::from_le_bytes([event.parameters[1], event.parameters[2]])
                & HCI_CONN_HANDLE_MASK,
            reason: event.parameters[3],
        })
    }
}

/// A complete HCI packet of any type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HciPacket {
    Command(HciCommand),
    AclData(AclData),
    ScoData(ScoData),
    Event(HciEvent),
}

impl HciPacket {
    /// Build a command packet
    pub fn command(opcode: u16, parameters: Vec<u8>) -> Result<Self, HciError> {
        HciCommand::new(opcode, parameters).map(HciPacket::Command)
    }

    /// Build an ACL data packet
    pub fn acl(handle: u16, boundary: PacketBoundary, data: Vec<u8>) -> Result<Self, HciError> {
        if data.len() > HCI_MAX_DATA_PKT_SIZE {
            return Err(HciError::PacketTooLong {
                len: data.len(),
                max: HCI_MAX_DATA_PKT_SIZE,
            });
        }
        Ok(HciPacket::AclData(AclData::new(handle, boundary, data)))
    }

    pub fn packet_type(&self) -> HciPacketType {
        match self {
            HciPacket::Command(_) => HciPacketType::Command,
            HciPacket::AclData(_) => HciPacketType::AclData,
            HciPacket::ScoData(_) => HciPacketType::ScoData,
            HciPacket::Event(_) => HciPacketType::Event,
        }
    }

    /// Convert the packet to its transport encoding, type byte first.
    ///
    /// Fails when a payload does not fit the packet type's length field.
    pub fn to_bytes(&self) -> Result<Vec<u8>, HciError> {
        let mut packet = vec![self.packet_type() as u8];
        match self {
            HciPacket::Command(cmd) => {
                let len = checked_len(cmd.parameters.len(), HCI_MAX_CMD_PKT_SIZE)?;
                packet.extend_from_slice(&cmd.opcode.to_le_bytes());
                packet.push(len as u8);
                packet.extend_from_slice(&cmd.parameters);
            }
            HciPacket::AclData(acl) => {
                let len = checked_len(acl.data.len(), HCI_MAX_DATA_PKT_SIZE)?;
                packet.extend_from_slice(&acl.handle_field().to_le_bytes());
                packet.extend_from_slice(&(len as u16).to_le_bytes());
                packet.extend_from_slice(&acl.data);
            }
            HciPacket::ScoData(sco) => {
                let len = checked_len(sco.data.len(), u8::MAX as usize)?;
                let field = (sco.handle & HCI_CONN_HANDLE_MASK)
                    | (((sco.status & 0b11) as u16) << HCI_PB_FLAG_SHIFT);
                packet.extend_from_slice(&field.to_le_bytes());
                packet.push(len as u8);
                packet.extend_from_slice(&sco.data);
            }
            HciPacket::Event(evt) => {
                let len = checked_len(evt.parameters.len(), u8::MAX as usize)?;
                packet.push(evt.event_code);
                packet.push(len as u8);
                packet.extend_from_slice(&evt.parameters);
            }
        }
        Ok(packet)
    }

    /// Parse one complete packet, type byte first.
    ///
    /// The buffer must hold exactly one packet.
    pub fn parse(data: &[u8]) -> Result<Self, HciError> {
        let (&type_byte, _) = data.split_first().ok_or(HciError::InvalidPacketFormat)?;
        let packet_type = HciPacketType::try_from(type_byte)?;
        if data.len() < packet_type.min_length() {
            return Err(HciError::InvalidPacketFormat);
        }

        let header_len = packet_type.min_length();
        let mut cursor = Cursor::new(&data[1..header_len]);
        let io = |_: std::io::Error| HciError::InvalidPacketFormat;

        let packet = match packet_type {
            HciPacketType::Command => {
                let opcode = cursor.read_u16::<LittleEndian>().map_err(io)?;
                let len = cursor.read_u8().map_err(io)? as usize;
                let body = payload(data, header_len, len)?;
                HciPacket::Command(HciCommand {
                    opcode,
                    parameters: body.to_vec(),
                })
            }
            HciPacketType::AclData => {
                let field = cursor.read_u16::<LittleEndian>().map_err(io)?;
                let len = cursor.read_u16::<LittleEndian>().map_err(io)? as usize;
                let body = payload(data, header_len, len)?;
                HciPacket::AclData(AclData::from_handle_field(field, body.to_vec()))
            }
            HciPacketType::ScoData => {
                let field = cursor.read_u16::<LittleEndian>().map_err(io)?;
                let len = cursor.read_u8().map_err(io)? as usize;
                let body = payload(data, header_len, len)?;
                HciPacket::ScoData(ScoData {
                    handle: field & HCI_CONN_HANDLE_MASK,
                    status: ((field >> HCI_PB_FLAG_SHIFT) & 0b11) as u8,
                    data: body.to_vec(),
                })
            }
            HciPacketType::Event => HciPacket::Event(HciEvent::parse(&data[1..])?),
        };

        Ok(packet)
    }
}

fn checked_len(len: usize, max: usize) -> Result<usize, HciError> {
    if len > max {
        return Err(HciError::PacketTooLong { len, max });
    }
    Ok(len)
}

fn payload(data: &[u8], header_len: usize, len: usize) -> Result<&[u8], HciError> {
    if data.len() != header_len + len {
        return Err(HciError::InvalidPacketFormat);
    }
    Ok(&data[header_len..])
}
