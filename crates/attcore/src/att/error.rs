//! Error handling for the ATT protocol
use super::constants::*;
use thiserror::Error;

/// ATT error codes carried by the Error Response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttErrorCode {
    /// Invalid handle
    InvalidHandle,
    /// Read not permitted
    ReadNotPermitted,
    /// Write not permitted
    WriteNotPermitted,
    /// Invalid PDU
    InvalidPdu,
    /// Insufficient authentication
    InsufficientAuthentication,
    /// Request not supported
    RequestNotSupported,
    /// Invalid offset
    InvalidOffset,
    /// Insufficient authorization
    InsufficientAuthorization,
    /// Prepare queue full
    PrepareQueueFull,
    /// Attribute not found
    AttributeNotFound,
    /// Attribute not long
    AttributeNotLong,
    /// Insufficient encryption key size
    InsufficientEncryptionKeySize,
    /// Invalid attribute value length
    InvalidAttributeValueLength,
    /// Unlikely error
    Unlikely,
    /// Insufficient encryption
    InsufficientEncryption,
    /// Unsupported group type
    UnsupportedGroupType,
    /// Insufficient resources
    InsufficientResources,
    /// Application error (0x80..=0x9F)
    ApplicationError(u8),
    /// Common profile error (0xE0..=0xFF)
    CommonProfileError(u8),
    /// Reserved or unknown error code
    Unknown(u8),
}

impl AttErrorCode {
    /// The attribute value is invalid for the operation.
    pub const INVALID_VALUE: AttErrorCode = AttErrorCode::ApplicationError(ATT_ERROR_INVALID_VALUE);
}

impl From<u8> for AttErrorCode {
    fn from(code: u8) -> Self {
        match code {
            ATT_ERROR_INVALID_HANDLE => AttErrorCode::InvalidHandle,
            ATT_ERROR_READ_NOT_PERMITTED => AttErrorCode::ReadNotPermitted,
            ATT_ERROR_WRITE_NOT_PERMITTED => AttErrorCode::WriteNotPermitted,
            ATT_ERROR_INVALID_PDU => AttErrorCode::InvalidPdu,
            ATT_ERROR_INSUFFICIENT_AUTHENTICATION => AttErrorCode::InsufficientAuthentication,
            ATT_ERROR_REQUEST_NOT_SUPPORTED => AttErrorCode::RequestNotSupported,
            ATT_ERROR_INVALID_OFFSET => AttErrorCode::InvalidOffset,
            ATT_ERROR_INSUFFICIENT_AUTHORIZATION => AttErrorCode::InsufficientAuthorization,
            ATT_ERROR_PREPARE_QUEUE_FULL => AttErrorCode::PrepareQueueFull,
            ATT_ERROR_ATTRIBUTE_NOT_FOUND => AttErrorCode::AttributeNotFound,
            ATT_ERROR_ATTRIBUTE_NOT_LONG => AttErrorCode::AttributeNotLong,
            ATT_ERROR_INSUFFICIENT_ENCRYPTION_KEY_SIZE => {
                AttErrorCode::InsufficientEncryptionKeySize
            }
            ATT_ERROR_INVALID_ATTRIBUTE_VALUE_LENGTH => AttErrorCode::InvalidAttributeValueLength,
            ATT_ERROR_UNLIKELY => AttErrorCode::Unlikely,
            ATT_ERROR_INSUFFICIENT_ENCRYPTION => AttErrorCode::InsufficientEncryption,
            ATT_ERROR_UNSUPPORTED_GROUP_TYPE => AttErrorCode::UnsupportedGroupType,
            ATT_ERROR_INSUFFICIENT_RESOURCES => AttErrorCode::InsufficientResources,
            ATT_ERROR_APPLICATION_ERROR_START..=ATT_ERROR_APPLICATION_ERROR_END => {
                AttErrorCode::ApplicationError(code)
            }
            ATT_ERROR_COMMON_PROFILE_ERROR_START..=ATT_ERROR_COMMON_PROFILE_ERROR_END => {
                AttErrorCode::CommonProfileError(code)
            }
            _ => AttErrorCode::Unknown(code),
        }
    }
}

impl From<AttErrorCode> for u8 {
    fn from(code: AttErrorCode) -> u8 {
        match code {
            AttErrorCode::InvalidHandle => ATT_ERROR_INVALID_HANDLE,
            AttErrorCode::ReadNotPermitted => ATT_ERROR_READ_NOT_PERMITTED,
            AttErrorCode::WriteNotPermitted => ATT_ERROR_WRITE_NOT_PERMITTED,
            AttErrorCode::InvalidPdu => ATT_ERROR_INVALID_PDU,
            AttErrorCode::InsufficientAuthentication => ATT_ERROR_INSUFFICIENT_AUTHENTICATION,
            AttErrorCode::RequestNotSupported => ATT_ERROR_REQUEST_NOT_SUPPORTED,
            AttErrorCode::InvalidOffset => ATT_ERROR_INVALID_OFFSET,
            AttErrorCode::InsufficientAuthorization => ATT_ERROR_INSUFFICIENT_AUTHORIZATION,
            AttErrorCode::PrepareQueueFull => ATT_ERROR_PREPARE_QUEUE_FULL,
            AttErrorCode::AttributeNotFound => ATT_ERROR_ATTRIBUTE_NOT_FOUND,
            AttErrorCode::AttributeNotLong => ATT_ERROR_ATTRIBUTE_NOT_LONG,
            AttErrorCode::InsufficientEncryptionKeySize => {
                ATT_ERROR_INSUFFICIENT_ENCRYPTION_KEY_SIZE
            }
            AttErrorCode::InvalidAttributeValueLength => ATT_ERROR_INVALID_ATTRIBUTE_VALUE_LENGTH,
            AttErrorCode::Unlikely => ATT_ERROR_UNLIKELY,
            AttErrorCode::InsufficientEncryption => ATT_ERROR_INSUFFICIENT_ENCRYPTION,
            AttErrorCode::UnsupportedGroupType => ATT_ERROR_UNSUPPORTED_GROUP_TYPE,
            AttErrorCode::InsufficientResources => ATT_ERROR_INSUFFICIENT_RESOURCES,
            AttErrorCode::ApplicationError(code) => code,
            AttErrorCode::CommonProfileError(code) => code,
            AttErrorCode::Unknown(code) => code,
        }
    }
}

/// ATT Error type
#[derive(Debug, Error)]
pub enum AttError {
    #[error("ATT error: {0:?} on handle {1:#06x}")]
    Protocol(AttErrorCode, u16),

    #[error("Invalid PDU")]
    InvalidPdu,

    #[error("Unsupported opcode: {0:#04x}")]
    UnsupportedOpcode(u8),

    #[error("PDU of {len} bytes exceeds MTU {mtu}")]
    PduTooLarge { len: usize, mtu: u16 },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Invalid state for operation")]
    InvalidState,

    #[error("Unknown connection handle: {0:#06x}")]
    UnknownConnection(u16),

    #[error("Flow control violated: opcode {opcode:#04x} while {pending_opcode:#04x} pending")]
    FlowControlViolated { opcode: u8, pending_opcode: u8 },

    #[error("Unexpected response opcode: {0:#04x}")]
    UnexpectedResponse(u8),

    #[error("ATT traffic disabled on this connection")]
    TrafficDisabled,
}

impl AttError {
    /// Convert to the ATT error code reported in an Error Response
    pub fn to_error_code(&self) -> AttErrorCode {
        match self {
            AttError::Protocol(code, _) => *code,
            AttError::InvalidPdu => AttErrorCode::InvalidPdu,
            AttError::UnsupportedOpcode(_) => AttErrorCode::RequestNotSupported,
            AttError::PduTooLarge { .. } => AttErrorCode::InvalidAttributeValueLength,
            AttError::InvalidParameter(_) => AttErrorCode::InvalidPdu,
            AttError::InvalidState => AttErrorCode::Unlikely,
            AttError::UnknownConnection(_) => AttErrorCode::Unlikely,
            AttError::FlowControlViolated { .. } => AttErrorCode::Unlikely,
            AttError::UnexpectedResponse(_) => AttErrorCode::Unlikely,
            AttError::TrafficDisabled => AttErrorCode::Unlikely,
        }
    }

    /// Get the attribute handle associated with this error, if any
    pub fn handle(&self) -> Option<u16> {
        match self {
            AttError::Protocol(_, handle) => Some(*handle),
            _ => None,
        }
    }
}

/// ATT Result type
pub type AttResult<T> = Result<T, AttError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_round_trip_ranges() {
        for raw in 0u8..=0xFF {
            let code = AttErrorCode::from(raw);
            assert_eq!(u8::from(code), raw);
        }
        assert_eq!(AttErrorCode::from(0x0A), AttErrorCode::AttributeNotFound);
        assert_eq!(AttErrorCode::from(0x85), AttErrorCode::ApplicationError(0x85));
        assert_eq!(AttErrorCode::from(0xFE), AttErrorCode::CommonProfileError(0xFE));
        assert_eq!(AttErrorCode::from(0x30), AttErrorCode::Unknown(0x30));
        assert_eq!(AttErrorCode::INVALID_VALUE, AttErrorCode::from(0x80));
    }

    #[test]
    fn test_error_to_code() {
        assert_eq!(AttError::InvalidPdu.to_error_code(), AttErrorCode::InvalidPdu);
        assert_eq!(
            AttError::UnsupportedOpcode(0x20).to_error_code(),
            AttErrorCode::RequestNotSupported
        );
        let err = AttError::Protocol(AttErrorCode::WriteNotPermitted, 0x0010);
        assert_eq!(err.handle(), Some(0x0010));
        assert_eq!(err.to_error_code(), AttErrorCode::WriteNotPermitted);
    }
}
