//! Raw ATT packet framing
//!
//! Splits an ATT PDU into its opcode fields and parameters before any
//! per-kind decoding happens.

use super::constants::*;
use super::error::{AttError, AttResult};
use bitflags::bitflags;

bitflags! {
    /// Flag bits carried in the upper two bits of an ATT opcode.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct OpcodeFlags: u8 {
        /// PDU is a command (no response expected)
        const COMMAND = ATT_CMD_FLAG_BIT;
        /// PDU carries a trailing authentication signature
        const AUTH_SIGNATURE = ATT_AUTHEN_SIG_FLAG_BIT;
    }
}

/// Authentication signature status of a received packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureStatus {
    /// No signature included
    NotIncluded,
    /// Signature included and verified
    Valid,
    /// Signature included but not (yet) verified
    Invalid,
}

/// Attribute Protocol PDU split into its header fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttPacket {
    /// Authentication signature status
    pub signature: SignatureStatus,
    /// Command flag
    pub command: bool,
    /// Method (bits 5-0 of the opcode)
    pub method: u8,
    /// Attribute parameters, without the opcode and signature
    pub parameters: Vec<u8>,
    /// Trailing authentication signature, when the flag is set
    pub auth_signature: Option<[u8; ATT_AUTHEN_SIG_LEN]>,
}

/// Splits an opcode into its flag bits and method.
pub fn split_opcode(opcode: u8) -> (OpcodeFlags, u8) {
    (OpcodeFlags::from_bits_truncate(opcode), opcode & ATT_METHOD_BITS)
}

/// Joins flag bits and a method into an opcode.
pub fn join_opcode(flags: OpcodeFlags, method: u8) -> u8 {
    flags.bits() | (method & ATT_METHOD_BITS)
}

impl AttPacket {
    /// Parse the opcode, flags, parameters and optional signature.
    ///
    /// A packet with the signature flag set must be long enough to hold the
    /// 12-octet signature. Included signatures are reported as
    /// [`SignatureStatus::Invalid`] until [`AttPacket::verify_signature`]
    /// accepts them.
    pub fn parse(data: &[u8]) -> AttResult<Self> {
        let (&opcode, rest) = data.split_first().ok_or(AttError::InvalidPdu)?;
        let (flags, method) = split_opcode(opcode);

        let (parameters, auth_signature, signature) = if flags.contains(OpcodeFlags::AUTH_SIGNATURE)
        {
            if rest.len() < ATT_AUTHEN_SIG_LEN {
                return Err(AttError::InvalidPdu);
            }
            let split = rest.len() - ATT_AUTHEN_SIG_LEN;
            let mut sig = [0u8; ATT_AUTHEN_SIG_LEN];
            sig.copy_from_slice(&rest[split..]);
            (rest[..split].to_vec(), Some(sig), SignatureStatus::Invalid)
        } else {
            (rest.to_vec(), None, SignatureStatus::NotIncluded)
        };

        Ok(Self {
            signature,
            command: flags.contains(OpcodeFlags::COMMAND),
            method,
            parameters,
            auth_signature,
        })
    }

    /// Full opcode byte
    pub fn opcode(&self) -> u8 {
        join_opcode(self.flags(), self.method)
    }

    /// Flag bits of the opcode
    pub fn flags(&self) -> OpcodeFlags {
        let mut flags = OpcodeFlags::empty();
        flags.set(OpcodeFlags::COMMAND, self.command);
        flags.set(OpcodeFlags::AUTH_SIGNATURE, self.auth_signature.is_some());
        flags
    }

    /// Length of the attribute parameters
    pub fn parameter_length(&self) -> u16 {
        self.parameters.len() as u16
    }

    /// The bytes covered by the authentication signature: opcode and parameters.
    pub fn signed_data(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(ATT_OPCODE_SIZE + self.parameters.len());
        data.push(self.opcode());
        data.extend_from_slice(&self.parameters);
        data
    }

    /// Run `check` over the signed data and signature, recording the outcome.
    ///
    /// Returns false when no signature is included.
    pub fn verify_signature<F>(&mut self, check: F) -> bool
    where
        F: FnOnce(&[u8], &[u8; ATT_AUTHEN_SIG_LEN]) -> bool,
    {
        let Some(sig) = self.auth_signature else {
            return false;
        };
        let valid = check(&self.signed_data(), &sig);
        self.signature = if valid {
            SignatureStatus::Valid
        } else {
            SignatureStatus::Invalid
        };
        valid
    }

    /// Serialize back to wire form, signature last.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut data = self.signed_data();
        if let Some(sig) = &self.auth_signature {
            data.extend_from_slice(sig);
        }
        data
    }
}
