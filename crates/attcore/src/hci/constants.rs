//! HCI protocol constants
//!
//! This module contains constants used in the Bluetooth HCI protocol.

// HCI packet types
pub const HCI_COMMAND_PKT: u8 = 0x01;
pub const HCI_ACL_PKT: u8 = 0x02;
pub const HCI_SCO_PKT: u8 = 0x03;
pub const HCI_EVENT_PKT: u8 = 0x04;

// Minimum packet lengths, packet type byte included
pub const HCI_CMD_MIN_LENGTH: usize = 4;
pub const HCI_EVENT_MIN_LENGTH: usize = 3;
pub const HCI_DATA_MIN_LENGTH: usize = 5;
pub const HCI_SCO_MIN_LENGTH: usize = 4;

// Maximum size of HCI command parameters
pub const HCI_MAX_CMD_PKT_SIZE: usize = 0xFF;
// Maximum size of HCI ACL data payload
pub const HCI_MAX_DATA_PKT_SIZE: usize = 0xFFFF;
// Default LE ACL fragment size
pub const HCI_DATA_MAX_DATA_LENGTH: usize = 27;

// ACL connection handle is 12 bits; the top 4 bits carry PB and BC flags
pub const HCI_CONN_HANDLE_MASK: u16 = 0x0FFF;
pub const HCI_PB_FLAG_SHIFT: u16 = 12;
pub const HCI_BC_FLAG_SHIFT: u16 = 14;

// Packet boundary flags
pub const HCI_PB_FIRST_NON_FLUSHABLE: u8 = 0b00;
pub const HCI_PB_CONTINUING: u8 = 0b01;
pub const HCI_PB_FIRST_FLUSHABLE: u8 = 0b10;

// Common OGF (Opcode Group Field) values
pub const OGF_LINK_CTL: u8 = 0x01;
pub const OGF_HOST_CTL: u8 = 0x03;
pub const OGF_LE: u8 = 0x08;
pub const OGF_VENDOR_SPECIFIC: u8 = 0x3F;

// Command opcodes
pub const HCI_DISCONNECT: u16 = 0x0406;
pub const HCI_RESET: u16 = 0x0C03;
pub const HCI_LE_READ_BUFFER_SIZE: u16 = 0x2002;

// Vendor extension opcodes handled by the application, never sent to the controller
pub const HCI_EXT_ENABLE_PTM: u16 = 0xFC0E;
pub const HCI_EXT_PER_BY_CHAN: u16 = 0xFC15;
pub const HCI_EXT_ADV_EVENT_NOTICE: u16 = 0xFC17;
pub const HCI_EXT_CONN_EVENT_NOTICE: u16 = 0xFC18;

/// Whether `opcode` is a vendor extension that exists only as a local API
pub fn is_application_only(opcode: u16) -> bool {
    matches!(
        opcode,
        HCI_EXT_ENABLE_PTM | HCI_EXT_PER_BY_CHAN | HCI_EXT_ADV_EVENT_NOTICE | HCI_EXT_CONN_EVENT_NOTICE
    )
}

// HCI Events
pub const EVT_DISCONN_COMPLETE: u8 = 0x05;
pub const EVT_CMD_COMPLETE: u8 = 0x0E;
pub const EVT_CMD_STATUS: u8 = 0x0F;
pub const EVT_NUM_COMPLETED_PACKETS: u8 = 0x13;
pub const EVT_LE_META_EVENT: u8 = 0x3E;

// LE Meta Events
pub const EVT_LE_CONN_COMPLETE: u8 = 0x01;

// Status codes
pub const HCI_SUCCESS: u8 = 0x00;
pub const HCI_REMOTE_USER_TERMINATED: u8 = 0x13;
