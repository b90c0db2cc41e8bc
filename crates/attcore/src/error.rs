//! Error types for the attcore library
//!
//! This module defines the HCI error type and the crate-level error that
//! wraps both layers.

use crate::att::AttError;
use thiserror::Error;

/// Errors that can occur when framing or transporting HCI packets
#[derive(Error, Debug)]
pub enum HciError {
    #[error("HCI transport error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid parameter length: {0}")]
    InvalidParamLength(usize),

    #[error("Invalid HCI packet format")]
    InvalidPacketFormat,

    #[error("Invalid HCI packet type: {0:#04x}")]
    InvalidPacketType(u8),

    #[error("HCI packet length {len} exceeds maximum {max}")]
    PacketTooLong { len: usize, max: usize },

    #[error("Opcode {0:#06x} is not a controller command")]
    Unsupported(u16),

    #[error("ACL reassembly failed: {0}")]
    Reassembly(&'static str),
}

/// Errors surfaced by the host glue
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Hci(#[from] HciError),

    #[error(transparent)]
    Att(#[from] AttError),
}

pub type Result<T> = std::result::Result<T, Error>;
