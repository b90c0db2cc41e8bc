//! Bluetooth HCI (Host Controller Interface) implementation
//!
//! This module provides the HCI packet types, the byte-stream framer that
//! recovers them from a transport, and ACL fragmentation and reassembly.

pub mod acl;
pub mod constants;
pub mod framer;
pub mod packet;
pub mod transport;

#[cfg(test)]
mod tests;

pub use acl::{fragment, AclReassembler};
pub use framer::{FramerConfig, FramerState, HciFramer};
pub use packet::{
    AclData, DisconnectionComplete, HciCommand, HciEvent, HciPacket, HciPacketType,
    LeConnectionComplete, PacketBoundary, ScoData,
};
pub use transport::HciTransport;
