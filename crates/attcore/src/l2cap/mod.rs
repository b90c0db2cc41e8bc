//! L2CAP (Logical Link Control and Adaptation Protocol) basic frames
//!
//! Only the basic frame format carried over LE fixed channels is handled:
//! a 4-byte header followed by the payload of one upper-layer PDU.

pub mod constants;
pub mod packet;

pub use self::constants::*;
pub use self::packet::{BasicFrame, L2capHeader};
