//! Decoded ATT messages
//!
//! [`AttMessage`] is the tagged variant the codec produces, one variant per
//! PDU kind, so routing never has to look at raw opcode values.

use super::constants::*;
use super::error::{AttError, AttResult};
use super::packet::AttPacket;
use super::types::*;

/// Role a PDU belongs to on the receiving or sending side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Attribute server
    Server,
    /// Attribute client
    Client,
}

/// Protocol class of an opcode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpcodeKind {
    Request,
    Response,
    Command,
    Notification,
    Indication,
    Confirmation,
}

impl OpcodeKind {
    /// Classify a known opcode
    pub fn of(opcode: u8) -> Option<Self> {
        let kind = match opcode {
            ATT_EXCHANGE_MTU_REQ
            | ATT_FIND_INFO_REQ
            | ATT_FIND_BY_TYPE_VALUE_REQ
            | ATT_READ_BY_TYPE_REQ
            | ATT_READ_REQ
            | ATT_READ_BLOB_REQ
            | ATT_READ_MULTIPLE_REQ
            | ATT_READ_BY_GROUP_TYPE_REQ
            | ATT_WRITE_REQ
            | ATT_PREPARE_WRITE_REQ
            | ATT_EXECUTE_WRITE_REQ => OpcodeKind::Request,
            ATT_ERROR_RSP
            | ATT_EXCHANGE_MTU_RSP
            | ATT_FIND_INFO_RSP
            | ATT_FIND_BY_TYPE_VALUE_RSP
            | ATT_READ_BY_TYPE_RSP
            | ATT_READ_RSP
            | ATT_READ_BLOB_RSP
            | ATT_READ_MULTIPLE_RSP
            | ATT_READ_BY_GROUP_TYPE_RSP
            | ATT_WRITE_RSP
            | ATT_PREPARE_WRITE_RSP
            | ATT_EXECUTE_WRITE_RSP => OpcodeKind::Response,
            ATT_WRITE_CMD | ATT_SIGNED_WRITE_CMD => OpcodeKind::Command,
            ATT_HANDLE_VALUE_NTF => OpcodeKind::Notification,
            ATT_HANDLE_VALUE_IND => OpcodeKind::Indication,
            ATT_HANDLE_VALUE_CONF => OpcodeKind::Confirmation,
            _ => return None,
        };
        Some(kind)
    }

    /// Role that handles a received PDU of this kind
    pub fn receiver(self) -> Role {
        match self {
            OpcodeKind::Request | OpcodeKind::Command | OpcodeKind::Confirmation => Role::Server,
            OpcodeKind::Response | OpcodeKind::Notification | OpcodeKind::Indication => {
                Role::Client
            }
        }
    }

    /// Role that sends a PDU of this kind
    pub fn sender(self) -> Role {
        match self.receiver() {
            Role::Server => Role::Client,
            Role::Client => Role::Server,
        }
    }
}

/// Opcode of the PDU that completes a request or indication.
pub fn reply_opcode(opcode: u8) -> u8 {
    if opcode == ATT_HANDLE_VALUE_IND {
        ATT_HANDLE_VALUE_CONF
    } else {
        opcode.wrapping_add(1)
    }
}

macro_rules! att_messages {
    ($($variant:ident($pdu:ty)),* $(,)?) => {
        /// A decoded ATT PDU of any kind
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub enum AttMessage {
            $($variant($pdu),)*
        }

        impl AttMessage {
            /// Opcode the message is sent with
            pub fn opcode(&self) -> u8 {
                match self {
                    $(AttMessage::$variant(pdu) => pdu.opcode(),)*
                }
            }

            /// Serialize the full PDU, opcode first
            pub fn serialize(&self) -> Vec<u8> {
                match self {
                    $(AttMessage::$variant(pdu) => pdu.serialize(),)*
                }
            }

            /// Serialize, failing when the PDU does not fit in `mtu` bytes
            pub fn to_bytes(&self, mtu: u16) -> AttResult<Vec<u8>> {
                match self {
                    $(AttMessage::$variant(pdu) => pdu.to_bytes(mtu),)*
                }
            }

            /// Build into `buf`, returning the number of bytes written
            pub fn build(&self, buf: &mut [u8]) -> AttResult<usize> {
                match self {
                    $(AttMessage::$variant(pdu) => pdu.build(buf),)*
                }
            }
        }

        $(
            impl From<$pdu> for AttMessage {
                fn from(pdu: $pdu) -> Self {
                    AttMessage::$variant(pdu)
                }
            }
        )*
    };
}

att_messages! {
    ErrorResponse(ErrorResponse),
    ExchangeMtuRequest(ExchangeMtuRequest),
    ExchangeMtuResponse(ExchangeMtuResponse),
    FindInformationRequest(FindInformationRequest),
    FindInformationResponse(FindInformationResponse),
    FindByTypeValueRequest(FindByTypeValueRequest),
    FindByTypeValueResponse(FindByTypeValueResponse),
    ReadByTypeRequest(ReadByTypeRequest),
    ReadByTypeResponse(ReadByTypeResponse),
    ReadRequest(ReadRequest),
    ReadResponse(ReadResponse),
    ReadBlobRequest(ReadBlobRequest),
    ReadBlobResponse(ReadBlobResponse),
    ReadMultipleRequest(ReadMultipleRequest),
    ReadMultipleResponse(ReadMultipleResponse),
    ReadByGroupTypeRequest(ReadByGroupTypeRequest),
    ReadByGroupTypeResponse(ReadByGroupTypeResponse),
    WriteRequest(WriteRequest),
    WriteResponse(WriteResponse),
    WriteCommand(WriteCommand),
    PrepareWriteRequest(PrepareWriteRequest),
    PrepareWriteResponse(PrepareWriteResponse),
    ExecuteWriteRequest(ExecuteWriteRequest),
    ExecuteWriteResponse(ExecuteWriteResponse),
    HandleValueNotification(HandleValueNotification),
    HandleValueIndication(HandleValueIndication),
    HandleValueConfirmation(HandleValueConfirmation),
}

impl AttMessage {
    /// Decode a complete PDU received over a link with the given MTU.
    ///
    /// PDUs longer than `mtu` are rejected as malformed.
    pub fn parse(data: &[u8], mtu: u16) -> AttResult<Self> {
        if data.len() > mtu as usize {
            return Err(AttError::InvalidPdu);
        }
        Self::from_packet(&AttPacket::parse(data)?)
    }

    /// Decode the parameters of an already split packet
    pub fn from_packet(packet: &AttPacket) -> AttResult<Self> {
        let opcode = packet.opcode();
        let params = packet.parameters.as_slice();

        let message = match opcode {
            ATT_ERROR_RSP => ErrorResponse::parse_params(params)?.into(),
            ATT_EXCHANGE_MTU_REQ => ExchangeMtuRequest::parse_params(params)?.into(),
            ATT_EXCHANGE_MTU_RSP => ExchangeMtuResponse::parse_params(params)?.into(),
            ATT_FIND_INFO_REQ => FindInformationRequest::parse_params(params)?.into(),
            ATT_FIND_INFO_RSP => FindInformationResponse::parse_params(params)?.into(),
            ATT_FIND_BY_TYPE_VALUE_REQ => FindByTypeValueRequest::parse_params(params)?.into(),
            ATT_FIND_BY_TYPE_VALUE_RSP => FindByTypeValueResponse::parse_params(params)?.into(),
            ATT_READ_BY_TYPE_REQ => ReadByTypeRequest::parse_params(params)?.into(),
            ATT_READ_BY_TYPE_RSP => ReadByTypeResponse::parse_params(params)?.into(),
            ATT_READ_REQ => ReadRequest::parse_params(params)?.into(),
            ATT_READ_RSP => ReadResponse::parse_params(params)?.into(),
            ATT_READ_BLOB_REQ => ReadBlobRequest::parse_params(params)?.into(),
            ATT_READ_BLOB_RSP => ReadBlobResponse::parse_params(params)?.into(),
            ATT_READ_MULTIPLE_REQ => ReadMultipleRequest::parse_params(params)?.into(),
            ATT_READ_MULTIPLE_RSP => ReadMultipleResponse::parse_params(params)?.into(),
            ATT_READ_BY_GROUP_TYPE_REQ => ReadByGroupTypeRequest::parse_params(params)?.into(),
            ATT_READ_BY_GROUP_TYPE_RSP => ReadByGroupTypeResponse::parse_params(params)?.into(),
            ATT_WRITE_REQ => WriteRequest::parse_params(params)?.into(),
            ATT_WRITE_RSP => WriteResponse::parse_params(params)?.into(),
            ATT_WRITE_CMD | ATT_SIGNED_WRITE_CMD => {
                let mut cmd = WriteCommand::parse_params(params)?;
                cmd.signature = packet.auth_signature;
                cmd.signature_status = packet.signature;
                cmd.into()
            }
            ATT_PREPARE_WRITE_REQ => PrepareWriteRequest::parse_params(params)?.into(),
            ATT_PREPARE_WRITE_RSP => PrepareWriteResponse::parse_params(params)?.into(),
            ATT_EXECUTE_WRITE_REQ => ExecuteWriteRequest::parse_params(params)?.into(),
            ATT_EXECUTE_WRITE_RSP => ExecuteWriteResponse::parse_params(params)?.into(),
            ATT_HANDLE_VALUE_NTF => HandleValueNotification::parse_params(params)?.into(),
            ATT_HANDLE_VALUE_IND => HandleValueIndication::parse_params(params)?.into(),
            ATT_HANDLE_VALUE_CONF => HandleValueConfirmation::parse_params(params)?.into(),
            _ => return Err(AttError::UnsupportedOpcode(opcode)),
        };

        Ok(message)
    }

    /// Protocol class of this message
    pub fn kind(&self) -> OpcodeKind {
        match self {
            AttMessage::ErrorResponse(_)
            | AttMessage::ExchangeMtuResponse(_)
            | AttMessage::FindInformationResponse(_)
            | AttMessage::FindByTypeValueResponse(_)
            | AttMessage::ReadByTypeResponse(_)
            | AttMessage::ReadResponse(_)
            | AttMessage::ReadBlobResponse(_)
            | AttMessage::ReadMultipleResponse(_)
            | AttMessage::ReadByGroupTypeResponse(_)
            | AttMessage::WriteResponse(_)
            | AttMessage::PrepareWriteResponse(_)
            | AttMessage::ExecuteWriteResponse(_) => OpcodeKind::Response,
            AttMessage::WriteCommand(_) => OpcodeKind::Command,
            AttMessage::HandleValueNotification(_) => OpcodeKind::Notification,
            AttMessage::HandleValueIndication(_) => OpcodeKind::Indication,
            AttMessage::HandleValueConfirmation(_) => OpcodeKind::Confirmation,
            _ => OpcodeKind::Request,
        }
    }

    /// For a response, the request opcode it answers
    pub fn answered_request(&self) -> Option<u8> {
        match self {
            AttMessage::ErrorResponse(rsp) => Some(rsp.request_opcode),
            msg if msg.kind() == OpcodeKind::Response => Some(msg.opcode() - 1),
            _ => None,
        }
    }
}
