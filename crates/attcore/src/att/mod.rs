//! Attribute Protocol (ATT) implementation
//!
//! This module provides the ATT PDU codec and the per-connection protocol
//! state on top of it: transaction sequencing with response timeouts, MTU
//! negotiation and routing of received PDUs to the server or client role.

pub mod constants;
pub mod dispatch;
pub mod error;
pub mod message;
pub mod packet;
pub mod transaction;
pub mod types;


// Re-export the public API
pub use self::constants::*;
pub use self::dispatch::{
    negotiate_mtu, AttCallback, AttConfig, AttDispatcher, AttEvent, AttEventCallback,
    ConnectionAttContext, Disposition, PendingTx,
};
pub use self::error::{AttError, AttErrorCode, AttResult};
pub use self::message::{reply_opcode, AttMessage, OpcodeKind, Role};
pub use self::packet::{AttPacket, OpcodeFlags, SignatureStatus};
pub use self::transaction::{Check, TransactionTracker, Violation};
pub use self::types::*;
