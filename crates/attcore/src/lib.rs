//! attcore - Attribute Protocol core of a Bluetooth Low Energy host
//!
//! This library provides the ATT PDU codec, the per-connection transaction
//! and flow-control state machine, and the HCI byte-stream framing that
//! carries ATT traffic to and from a BLE controller. The bus driver itself is
//! supplied by the caller through [`hci::HciTransport`].

pub mod att;
pub mod error;
pub mod hci;
pub mod host;
pub mod l2cap;
pub mod uuid;

// Re-export common types for convenience
pub use att::{
    AttCallback, AttConfig, AttDispatcher, AttError, AttErrorCode, AttEvent, AttMessage,
    AttPacket, Disposition, OpcodeKind, Role, TransactionTracker,
};
pub use error::{Error, HciError, Result};
pub use hci::{HciCommand, HciEvent, HciFramer, HciPacket, HciTransport};
pub use host::{AttHost, HostConfig};
pub use l2cap::{BasicFrame, L2capHeader};
pub use uuid::Uuid;
