//! ATT Protocol constants

use std::time::Duration;

// ATT opcode values
pub const ATT_ERROR_RSP: u8 = 0x01;
pub const ATT_EXCHANGE_MTU_REQ: u8 = 0x02;
pub const ATT_EXCHANGE_MTU_RSP: u8 = 0x03;
pub const ATT_FIND_INFO_REQ: u8 = 0x04;
pub const ATT_FIND_INFO_RSP: u8 = 0x05;
pub const ATT_FIND_BY_TYPE_VALUE_REQ: u8 = 0x06;
pub const ATT_FIND_BY_TYPE_VALUE_RSP: u8 = 0x07;
pub const ATT_READ_BY_TYPE_REQ: u8 = 0x08;
pub const ATT_READ_BY_TYPE_RSP: u8 = 0x09;
pub const ATT_READ_REQ: u8 = 0x0A;
pub const ATT_READ_RSP: u8 = 0x0B;
pub const ATT_READ_BLOB_REQ: u8 = 0x0C;
pub const ATT_READ_BLOB_RSP: u8 = 0x0D;
pub const ATT_READ_MULTIPLE_REQ: u8 = 0x0E;
pub const ATT_READ_MULTIPLE_RSP: u8 = 0x0F;
pub const ATT_READ_BY_GROUP_TYPE_REQ: u8 = 0x10;
pub const ATT_READ_BY_GROUP_TYPE_RSP: u8 = 0x11;
pub const ATT_WRITE_REQ: u8 = 0x12;
pub const ATT_WRITE_RSP: u8 = 0x13;
pub const ATT_PREPARE_WRITE_REQ: u8 = 0x16;
pub const ATT_PREPARE_WRITE_RSP: u8 = 0x17;
pub const ATT_EXECUTE_WRITE_REQ: u8 = 0x18;
pub const ATT_EXECUTE_WRITE_RSP: u8 = 0x19;
pub const ATT_HANDLE_VALUE_NTF: u8 = 0x1B;
pub const ATT_HANDLE_VALUE_IND: u8 = 0x1D;
pub const ATT_HANDLE_VALUE_CONF: u8 = 0x1E;
pub const ATT_WRITE_CMD: u8 = 0x52;
pub const ATT_SIGNED_WRITE_CMD: u8 = 0xD2;

// Opcode bit layout: signature flag | command flag | method
pub const ATT_METHOD_BITS: u8 = 0x3F;
pub const ATT_CMD_FLAG_BIT: u8 = 0x40;
pub const ATT_AUTHEN_SIG_FLAG_BIT: u8 = 0x80;

// Authentication signature trailing a signed write command
pub const ATT_AUTHEN_SIG_LEN: usize = 12;

// ATT error codes
pub const ATT_ERROR_INVALID_HANDLE: u8 = 0x01;
pub const ATT_ERROR_READ_NOT_PERMITTED: u8 = 0x02;
pub const ATT_ERROR_WRITE_NOT_PERMITTED: u8 = 0x03;
pub const ATT_ERROR_INVALID_PDU: u8 = 0x04;
pub const ATT_ERROR_INSUFFICIENT_AUTHENTICATION: u8 = 0x05;
pub const ATT_ERROR_REQUEST_NOT_SUPPORTED: u8 = 0x06;
pub const ATT_ERROR_INVALID_OFFSET: u8 = 0x07;
pub const ATT_ERROR_INSUFFICIENT_AUTHORIZATION: u8 = 0x08;
pub const ATT_ERROR_PREPARE_QUEUE_FULL: u8 = 0x09;
pub const ATT_ERROR_ATTRIBUTE_NOT_FOUND: u8 = 0x0A;
pub const ATT_ERROR_ATTRIBUTE_NOT_LONG: u8 = 0x0B;
pub const ATT_ERROR_INSUFFICIENT_ENCRYPTION_KEY_SIZE: u8 = 0x0C;
pub const ATT_ERROR_INVALID_ATTRIBUTE_VALUE_LENGTH: u8 = 0x0D;
pub const ATT_ERROR_UNLIKELY: u8 = 0x0E;
pub const ATT_ERROR_INSUFFICIENT_ENCRYPTION: u8 = 0x0F;
pub const ATT_ERROR_UNSUPPORTED_GROUP_TYPE: u8 = 0x10;
pub const ATT_ERROR_INSUFFICIENT_RESOURCES: u8 = 0x11;
pub const ATT_ERROR_INVALID_VALUE: u8 = 0x80;
pub const ATT_ERROR_APPLICATION_ERROR_START: u8 = 0x80;
pub const ATT_ERROR_APPLICATION_ERROR_END: u8 = 0x9F;
pub const ATT_ERROR_COMMON_PROFILE_ERROR_START: u8 = 0xE0;
pub const ATT_ERROR_COMMON_PROFILE_ERROR_END: u8 = 0xFF;

// ATT MTU limits
pub const ATT_DEFAULT_MTU: u16 = 23;
pub const ATT_MAX_MTU: u16 = 517;

/// Request/Indication response timeout
pub const ATT_MSG_TIMEOUT: Duration = Duration::from_secs(30);

// PDU sizes, excluding the opcode unless noted
pub const ATT_OPCODE_SIZE: usize = 1;
pub const ATT_ERROR_RSP_SIZE: usize = 4;
pub const ATT_EXCHANGE_MTU_REQ_SIZE: usize = 2;
pub const ATT_EXCHANGE_MTU_RSP_SIZE: usize = 2;
pub const ATT_FIND_INFO_REQ_FIXED_SIZE: usize = 4;
pub const ATT_FIND_INFO_RSP_FIXED_SIZE: usize = 1;
pub const ATT_FIND_INFO_RSP_HDR_SIZE: usize = ATT_OPCODE_SIZE + ATT_FIND_INFO_RSP_FIXED_SIZE;
pub const ATT_FIND_BY_TYPE_VALUE_REQ_FIXED_SIZE: usize = 6;
pub const ATT_FIND_BY_TYPE_VALUE_REQ_HDR_SIZE: usize =
    ATT_OPCODE_SIZE + ATT_FIND_BY_TYPE_VALUE_REQ_FIXED_SIZE;
pub const ATT_READ_BY_TYPE_REQ_FIXED_SIZE: usize = 4;
pub const ATT_READ_BY_TYPE_RSP_FIXED_SIZE: usize = 1;
pub const ATT_READ_BY_TYPE_RSP_HDR_SIZE: usize = ATT_OPCODE_SIZE + ATT_READ_BY_TYPE_RSP_FIXED_SIZE;
pub const ATT_READ_REQ_SIZE: usize = 2;
pub const ATT_READ_BLOB_REQ_SIZE: usize = 4;
pub const ATT_READ_BY_GRP_TYPE_RSP_FIXED_SIZE: usize = 1;
pub const ATT_READ_BY_GRP_TYPE_RSP_HDR_SIZE: usize =
    ATT_OPCODE_SIZE + ATT_READ_BY_GRP_TYPE_RSP_FIXED_SIZE;
pub const ATT_WRITE_REQ_FIXED_SIZE: usize = 2;
pub const ATT_WRITE_REQ_HDR_SIZE: usize = ATT_OPCODE_SIZE + ATT_WRITE_REQ_FIXED_SIZE;
pub const ATT_PREPARE_WRITE_REQ_FIXED_SIZE: usize = 4;
pub const ATT_PREPARE_WRITE_REQ_HDR_SIZE: usize = ATT_OPCODE_SIZE + ATT_PREPARE_WRITE_REQ_FIXED_SIZE;
pub const ATT_PREPARE_WRITE_RSP_FIXED_SIZE: usize = 4;
pub const ATT_EXECUTE_WRITE_REQ_SIZE: usize = 1;
pub const ATT_HANDLE_VALUE_IND_FIXED_SIZE: usize = 2;
pub const ATT_HANDLE_VALUE_IND_HDR_SIZE: usize = ATT_OPCODE_SIZE + ATT_HANDLE_VALUE_IND_FIXED_SIZE;

// Find Information Response formats
pub const ATT_FIND_INFO_RSP_FORMAT_16BIT: u8 = 0x01;
pub const ATT_FIND_INFO_RSP_FORMAT_128BIT: u8 = 0x02;

// Per-item strides of the list-carrying responses
pub const ATT_BT_PAIR_SIZE: usize = 2 + crate::uuid::BT_UUID_SIZE;
pub const ATT_PAIR_SIZE: usize = 2 + crate::uuid::UUID_SIZE;
pub const ATT_HANDLES_INFO_SIZE: usize = 2 + 2;
pub const ATT_HANDLE_SIZE: usize = 2;

// Read Multiple Request needs at least this many handles
pub const ATT_MIN_NUM_HANDLES: usize = 2;

// Execute Write Request flags
pub const ATT_EXEC_WRITE_CANCEL: u8 = 0x00;
pub const ATT_EXEC_WRITE_COMMIT: u8 = 0x01;

// ATT handle values
pub const ATT_HANDLE_MIN: u16 = 0x0001;
pub const ATT_HANDLE_MAX: u16 = 0xFFFF;
