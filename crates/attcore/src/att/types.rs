//! ATT PDU definitions and their wire encoding
//!
//! Each PDU kind is a struct implementing [`AttPdu`]. Parsing works on the
//! parameters that follow the opcode and is all-or-nothing: a PDU that is
//! shorter than its fixed part, longer than a fixed-size layout, or whose list
//! length is not a whole number of items is rejected with
//! [`AttError::InvalidPdu`].
//!
//! The list-carrying responses keep their items as raw bytes with a fixed
//! stride; item `i` starts at byte `i * stride`.

use super::constants::*;
use super::error::{AttError, AttErrorCode, AttResult};
use super::packet::SignatureStatus;
use crate::uuid::{Uuid, BT_UUID_SIZE};
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

/// Common encode/decode behaviour of every ATT PDU.
pub trait AttPdu: Sized {
    /// Opcode this PDU is sent with
    fn opcode(&self) -> u8;

    /// Parse the parameters that follow the opcode
    fn parse_params(params: &[u8]) -> AttResult<Self>;

    /// Append the parameters that follow the opcode
    fn write_params(&self, out: &mut Vec<u8>);

    /// Serialize the full PDU, opcode first
    fn serialize(&self) -> Vec<u8> {
        let mut packet = vec![self.opcode()];
        self.write_params(&mut packet);
        packet
    }

    /// Serialize the PDU, failing when it does not fit in `mtu` bytes
    fn to_bytes(&self, mtu: u16) -> AttResult<Vec<u8>> {
        let packet = self.serialize();
        if packet.len() > mtu as usize {
            return Err(AttError::PduTooLarge {
                len: packet.len(),
                mtu,
            });
        }
        Ok(packet)
    }

    /// Build the PDU into `buf` and return the number of bytes written.
    ///
    /// Fails without writing anything when `buf` is too small.
    fn build(&self, buf: &mut [u8]) -> AttResult<usize> {
        let packet = self.serialize();
        if packet.len() > buf.len() {
            return Err(AttError::PduTooLarge {
                len: packet.len(),
                mtu: buf.len().min(u16::MAX as usize) as u16,
            });
        }
        buf[..packet.len()].copy_from_slice(&packet);
        Ok(packet.len())
    }
}

fn expect_len(params: &[u8], len: usize) -> AttResult<()> {
    if params.len() != len {
        return Err(AttError::InvalidPdu);
    }
    Ok(())
}

fn expect_min_len(params: &[u8], len: usize) -> AttResult<()> {
    if params.len() < len {
        return Err(AttError::InvalidPdu);
    }
    Ok(())
}

fn read_u16(cursor: &mut Cursor<&[u8]>) -> AttResult<u16> {
    cursor
        .read_u16::<LittleEndian>()
        .map_err(|_| AttError::InvalidPdu)
}

fn u16_at(data: &[u8], offset: usize) -> Option<u16> {
    data.get(offset..offset + 2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
}

/// Validates a list of `stride`-sized items: non-empty and a whole number of items.
fn check_list(list: &[u8], stride: usize) -> AttResult<()> {
    if stride == 0 || list.is_empty() || list.len() % stride != 0 {
        return Err(AttError::InvalidPdu);
    }
    Ok(())
}

/// Reads a 2 or 16 octet attribute type filling the rest of `data`.
fn parse_type(data: &[u8]) -> AttResult<Uuid> {
    Uuid::try_from_slice_le(data).ok_or(AttError::InvalidPdu)
}

/// Error Response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorResponse {
    /// Request opcode in error
    pub request_opcode: u8,
    /// Attribute handle in error
    pub handle: u16,
    /// Error code
    pub error_code: AttErrorCode,
}

impl ErrorResponse {
    /// Create a new error response
    pub fn new(request_opcode: u8, handle: u16, error_code: AttErrorCode) -> Self {
        Self {
            request_opcode,
            handle,
            error_code,
        }
    }

    /// Create an error response describing `error`
    pub fn from_error(request_opcode: u8, error: &AttError) -> Self {
        Self::new(
            request_opcode,
            error.handle().unwrap_or(0),
            error.to_error_code(),
        )
    }
}

impl AttPdu for ErrorResponse {
    fn opcode(&self) -> u8 {
        ATT_ERROR_RSP
    }

    fn parse_params(params: &[u8]) -> AttResult<Self> {
        expect_len(params, ATT_ERROR_RSP_SIZE)?;

        let mut cursor = Cursor::new(&params[1..]);
        let handle = read_u16(&mut cursor)?;

        Ok(Self {
            request_opcode: params[0],
            handle,
            error_code: params[3].into(),
        })
    }

    fn write_params(&self, out: &mut Vec<u8>) {
        out.push(self.request_opcode);
        out.extend_from_slice(&self.handle.to_le_bytes());
        out.push(self.error_code.into());
    }
}

/// Exchange MTU Request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExchangeMtuRequest {
    /// Client receive MTU size
    pub client_rx_mtu: u16,
}

impl AttPdu for ExchangeMtuRequest {
    fn opcode(&self) -> u8 {
        ATT_EXCHANGE_MTU_REQ
    }

    fn parse_params(params: &[u8]) -> AttResult<Self> {
        expect_len(params, ATT_EXCHANGE_MTU_REQ_SIZE)?;
        let client_rx_mtu = read_u16(&mut Cursor::new(params))?;
        Ok(Self { client_rx_mtu })
    }

    fn write_params(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.client_rx_mtu.to_le_bytes());
    }
}

/// Exchange MTU Response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExchangeMtuResponse {
    /// Server receive MTU size
    pub server_rx_mtu: u16,
}

impl AttPdu for ExchangeMtuResponse {
    fn opcode(&self) -> u8 {
        ATT_EXCHANGE_MTU_RSP
    }

    fn parse_params(params: &[u8]) -> AttResult<Self> {
        expect_len(params, ATT_EXCHANGE_MTU_RSP_SIZE)?;
        let server_rx_mtu = read_u16(&mut Cursor::new(params))?;
        Ok(Self { server_rx_mtu })
    }

    fn write_params(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.server_rx_mtu.to_le_bytes());
    }
}

/// Find Information Request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FindInformationRequest {
    /// First requested handle
    pub start_handle: u16,
    /// Last requested handle
    pub end_handle: u16,
}

impl AttPdu for FindInformationRequest {
    fn opcode(&self) -> u8 {
        ATT_FIND_INFO_REQ
    }

    fn parse_params(params: &[u8]) -> AttResult<Self> {
        expect_len(params, ATT_FIND_INFO_REQ_FIXED_SIZE)?;

        let mut cursor = Cursor::new(params);
        let start_handle = read_u16(&mut cursor)?;
        let end_handle = read_u16(&mut cursor)?;

        Ok(Self {
            start_handle,
            end_handle,
        })
    }

    fn write_params(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.start_handle.to_le_bytes());
        out.extend_from_slice(&self.end_handle.to_le_bytes());
    }
}

/// Find Information Response
///
/// Holds handle/UUID pairs of a single format: 2-octet UUIDs (stride 4) or
/// 16-octet UUIDs (stride 18).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindInformationResponse {
    format: u8,
    info: Vec<u8>,
}

impl FindInformationResponse {
    /// Build from handle/UUID pairs. All UUIDs must share one wire length.
    pub fn from_pairs(pairs: &[(u16, Uuid)]) -> AttResult<Self> {
        let first = pairs
            .first()
            .ok_or_else(|| AttError::InvalidParameter("no handle-UUID pairs".into()))?;
        let uuid_len = first.1.len();
        if pairs.iter().any(|(_, uuid)| uuid.len() != uuid_len) {
            return Err(AttError::InvalidParameter(
                "mixed UUID sizes in one response".into(),
            ));
        }

        let format = if uuid_len == BT_UUID_SIZE {
            ATT_FIND_INFO_RSP_FORMAT_16BIT
        } else {
            ATT_FIND_INFO_RSP_FORMAT_128BIT
        };
        let mut info = Vec::with_capacity(pairs.len() * (2 + uuid_len));
        for (handle, uuid) in pairs {
            info.extend_from_slice(&handle.to_le_bytes());
            uuid.write_le(&mut info);
        }

        Ok(Self { format, info })
    }

    /// Format of the information data
    pub fn format(&self) -> u8 {
        self.format
    }

    fn stride(&self) -> usize {
        if self.format == ATT_FIND_INFO_RSP_FORMAT_16BIT {
            ATT_BT_PAIR_SIZE
        } else {
            ATT_PAIR_SIZE
        }
    }

    /// Number of handle/UUID pairs
    pub fn num_info(&self) -> usize {
        self.info.len() / self.stride()
    }

    /// Handle of pair `i`
    pub fn handle(&self, i: usize) -> Option<u16> {
        if i >= self.num_info() {
            return None;
        }
        u16_at(&self.info, i * self.stride())
    }

    /// UUID of pair `i`
    pub fn uuid(&self, i: usize) -> Option<Uuid> {
        if i >= self.num_info() {
            return None;
        }
        let start = i * self.stride() + 2;
        Uuid::try_from_slice_le(&self.info[start..start + self.stride() - 2])
    }

    /// Iterate over all pairs
    pub fn iter(&self) -> impl Iterator<Item = (u16, Uuid)> + '_ {
        (0..self.num_info()).filter_map(move |i| Some((self.handle(i)?, self.uuid(i)?)))
    }
}

impl AttPdu for FindInformationResponse {
    fn opcode(&self) -> u8 {
        ATT_FIND_INFO_RSP
    }

    fn parse_params(params: &[u8]) -> AttResult<Self> {
        expect_min_len(params, ATT_FIND_INFO_RSP_FIXED_SIZE)?;

        let format = params[0];
        let stride = match format {
            ATT_FIND_INFO_RSP_FORMAT_16BIT => ATT_BT_PAIR_SIZE,
            ATT_FIND_INFO_RSP_FORMAT_128BIT => ATT_PAIR_SIZE,
            _ => return Err(AttError::InvalidPdu),
        };
        let info = &params[1..];
        check_list(info, stride)?;

        Ok(Self {
            format,
            info: info.to_vec(),
        })
    }

    fn write_params(&self, out: &mut Vec<u8>) {
        out.push(self.format);
        out.extend_from_slice(&self.info);
    }
}

/// Find By Type Value Request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindByTypeValueRequest {
    /// First requested handle
    pub start_handle: u16,
    /// Last requested handle
    pub end_handle: u16,
    /// Attribute type (always a 2-octet UUID)
    pub attribute_type: u16,
    /// Attribute value to match
    pub attribute_value: Vec<u8>,
}

impl AttPdu for FindByTypeValueRequest {
    fn opcode(&self) -> u8 {
        ATT_FIND_BY_TYPE_VALUE_REQ
    }

    fn parse_params(params: &[u8]) -> AttResult<Self> {
        expect_min_len(params, ATT_FIND_BY_TYPE_VALUE_REQ_FIXED_SIZE)?;

        let mut cursor = Cursor::new(params);
        let start_handle = read_u16(&mut cursor)?;
        let end_handle = read_u16(&mut cursor)?;
        let attribute_type = read_u16(&mut cursor)?;

        Ok(Self {
            start_handle,
            end_handle,
            attribute_type,
            attribute_value: params[ATT_FIND_BY_TYPE_VALUE_REQ_FIXED_SIZE..].to_vec(),
        })
    }

    fn write_params(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.start_handle.to_le_bytes());
        out.extend_from_slice(&self.end_handle.to_le_bytes());
        out.extend_from_slice(&self.attribute_type.to_le_bytes());
        out.extend_from_slice(&self.attribute_value);
    }
}

/// Handle range in Find By Type Value Response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandleRange {
    /// Found handle
    pub found_handle: u16,
    /// Group end handle
    pub group_end_handle: u16,
}

/// Find By Type Value Response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindByTypeValueResponse {
    handles_info: Vec<u8>,
}

impl FindByTypeValueResponse {
    /// Build from one or more handle ranges
    pub fn from_ranges(ranges: &[HandleRange]) -> AttResult<Self> {
        if ranges.is_empty() {
            return Err(AttError::InvalidParameter("no handle ranges".into()));
        }
        let mut handles_info = Vec::with_capacity(ranges.len() * ATT_HANDLES_INFO_SIZE);
        for range in ranges {
            handles_info.extend_from_slice(&range.found_handle.to_le_bytes());
            handles_info.extend_from_slice(&range.group_end_handle.to_le_bytes());
        }
        Ok(Self { handles_info })
    }

    /// Number of handle ranges
    pub fn num_info(&self) -> usize {
        self.handles_info.len() / ATT_HANDLES_INFO_SIZE
    }

    /// Handle range `i`
    pub fn range(&self, i: usize) -> Option<HandleRange> {
        let offset = i * ATT_HANDLES_INFO_SIZE;
        Some(HandleRange {
            found_handle: u16_at(&self.handles_info, offset)?,
            group_end_handle: u16_at(&self.handles_info, offset + 2)?,
        })
    }

    /// Iterate over all ranges
    pub fn iter(&self) -> impl Iterator<Item = HandleRange> + '_ {
        (0..self.num_info()).filter_map(move |i| self.range(i))
    }
}

impl AttPdu for FindByTypeValueResponse {
    fn opcode(&self) -> u8 {
        ATT_FIND_BY_TYPE_VALUE_RSP
    }

    fn parse_params(params: &[u8]) -> AttResult<Self> {
        check_list(params, ATT_HANDLES_INFO_SIZE)?;
        Ok(Self {
            handles_info: params.to_vec(),
        })
    }

    fn write_params(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.handles_info);
    }
}

/// Read By Type Request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadByTypeRequest {
    /// First requested handle
    pub start_handle: u16,
    /// Last requested handle
    pub end_handle: u16,
    /// Attribute type UUID
    pub attribute_type: Uuid,
}

impl AttPdu for ReadByTypeRequest {
    fn opcode(&self) -> u8 {
        ATT_READ_BY_TYPE_REQ
    }

    fn parse_params(params: &[u8]) -> AttResult<Self> {
        expect_min_len(params, ATT_READ_BY_TYPE_REQ_FIXED_SIZE + BT_UUID_SIZE)?;

        let mut cursor = Cursor::new(params);
        let start_handle = read_u16(&mut cursor)?;
        let end_handle = read_u16(&mut cursor)?;
        let attribute_type = parse_type(&params[ATT_READ_BY_TYPE_REQ_FIXED_SIZE..])?;

        Ok(Self {
            start_handle,
            end_handle,
            attribute_type,
        })
    }

    fn write_params(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.start_handle.to_le_bytes());
        out.extend_from_slice(&self.end_handle.to_le_bytes());
        self.attribute_type.write_le(out);
    }
}

/// Handle and value in Read By Type Response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandleValue<'a> {
    /// Attribute handle
    pub handle: u16,
    /// Attribute value
    pub value: &'a [u8],
}

/// Read By Type Response
///
/// Every handle-value pair has the same length, given by `length()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadByTypeResponse {
    length: u8,
    data_list: Vec<u8>,
}

impl ReadByTypeResponse {
    /// Build from handle-value pairs whose values all have the same length
    pub fn from_pairs(pairs: &[HandleValue<'_>]) -> AttResult<Self> {
        let first = pairs
            .first()
            .ok_or_else(|| AttError::InvalidParameter("no handle-value pairs".into()))?;
        let value_len = first.value.len();
        if pairs.iter().any(|p| p.value.len() != value_len) {
            return Err(AttError::InvalidParameter("values differ in length".into()));
        }
        let length = u8::try_from(2 + value_len)
            .map_err(|_| AttError::InvalidParameter("value too long".into()))?;

        let mut data_list = Vec::with_capacity(pairs.len() * length as usize);
        for pair in pairs {
            data_list.extend_from_slice(&pair.handle.to_le_bytes());
            data_list.extend_from_slice(pair.value);
        }
        Ok(Self { length, data_list })
    }

    /// Size of each handle-value pair
    pub fn length(&self) -> u8 {
        self.length
    }

    /// Number of handle-value pairs
    pub fn num_pairs(&self) -> usize {
        self.data_list.len() / self.length as usize
    }

    /// Pair `i`
    pub fn pair(&self, i: usize) -> Option<HandleValue<'_>> {
        if i >= self.num_pairs() {
            return None;
        }
        let offset = i * self.length as usize;
        Some(HandleValue {
            handle: u16_at(&self.data_list, offset)?,
            value: &self.data_list[offset + 2..offset + self.length as usize],
        })
    }

    /// Iterate over all pairs
    pub fn iter(&self) -> impl Iterator<Item = HandleValue<'_>> + '_ {
        (0..self.num_pairs()).filter_map(move |i| self.pair(i))
    }
}

impl AttPdu for ReadByTypeResponse {
    fn opcode(&self) -> u8 {
        ATT_READ_BY_TYPE_RSP
    }

    fn parse_params(params: &[u8]) -> AttResult<Self> {
        expect_min_len(params, ATT_READ_BY_TYPE_RSP_FIXED_SIZE)?;

        let length = params[0];
        if (length as usize) < 2 {
            return Err(AttError::InvalidPdu);
        }
        let data_list = &params[1..];
        check_list(data_list, length as usize)?;

        Ok(Self {
            length,
            data_list: data_list.to_vec(),
        })
    }

    fn write_params(&self, out: &mut Vec<u8>) {
        out.push(self.length);
        out.extend_from_slice(&self.data_list);
    }
}

/// Read Request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadRequest {
    /// Handle to read
    pub handle: u16,
}

impl AttPdu for ReadRequest {
    fn opcode(&self) -> u8 {
        ATT_READ_REQ
    }

    fn parse_params(params: &[u8]) -> AttResult<Self> {
        expect_len(params, ATT_READ_REQ_SIZE)?;
        let handle = read_u16(&mut Cursor::new(params))?;
        Ok(Self { handle })
    }

    fn write_params(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.handle.to_le_bytes());
    }
}

/// Read Response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadResponse {
    /// Attribute value, possibly empty
    pub value: Vec<u8>,
}

impl AttPdu for ReadResponse {
    fn opcode(&self) -> u8 {
        ATT_READ_RSP
    }

    fn parse_params(params: &[u8]) -> AttResult<Self> {
        Ok(Self {
            value: params.to_vec(),
        })
    }

    fn write_params(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.value);
    }
}

/// Read Blob Request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadBlobRequest {
    /// Handle to read
    pub handle: u16,
    /// Offset of the first octet to read
    pub offset: u16,
}

impl AttPdu for ReadBlobRequest {
    fn opcode(&self) -> u8 {
        ATT_READ_BLOB_REQ
    }

    fn parse_params(params: &[u8]) -> AttResult<Self> {
        expect_len(params, ATT_READ_BLOB_REQ_SIZE)?;

        let mut cursor = Cursor::new(params);
        let handle = read_u16(&mut cursor)?;
        let offset = read_u16(&mut cursor)?;

        Ok(Self { handle, offset })
    }

    fn write_params(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.handle.to_le_bytes());
        out.extend_from_slice(&self.offset.to_le_bytes());
    }
}

/// Read Blob Response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadBlobResponse {
    /// Part of the attribute value
    pub value: Vec<u8>,
}

impl AttPdu for ReadBlobResponse {
    fn opcode(&self) -> u8 {
        ATT_READ_BLOB_RSP
    }

    fn parse_params(params: &[u8]) -> AttResult<Self> {
        Ok(Self {
            value: params.to_vec(),
        })
    }

    fn write_params(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.value);
    }
}

/// Read Multiple Request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadMultipleRequest {
    /// Two or more handles to read
    pub handles: Vec<u16>,
}

impl AttPdu for ReadMultipleRequest {
    fn opcode(&self) -> u8 {
        ATT_READ_MULTIPLE_REQ
    }

    fn parse_params(params: &[u8]) -> AttResult<Self> {
        expect_min_len(params, ATT_MIN_NUM_HANDLES * ATT_HANDLE_SIZE)?;
        check_list(params, ATT_HANDLE_SIZE)?;

        let handles = params
            .chunks_exact(ATT_HANDLE_SIZE)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();

        Ok(Self { handles })
    }

    fn write_params(&self, out: &mut Vec<u8>) {
        for handle in &self.handles {
            out.extend_from_slice(&handle.to_le_bytes());
        }
    }
}

/// Read Multiple Response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadMultipleResponse {
    /// Concatenated values
    pub values: Vec<u8>,
}

impl AttPdu for ReadMultipleResponse {
    fn opcode(&self) -> u8 {
        ATT_READ_MULTIPLE_RSP
    }

    fn parse_params(params: &[u8]) -> AttResult<Self> {
        Ok(Self {
            values: params.to_vec(),
        })
    }

    fn write_params(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.values);
    }
}

/// Read By Group Type Request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadByGroupTypeRequest {
    /// First requested handle
    pub start_handle: u16,
    /// Last requested handle
    pub end_handle: u16,
    /// Group type UUID
    pub group_type: Uuid,
}

impl AttPdu for ReadByGroupTypeRequest {
    fn opcode(&self) -> u8 {
        ATT_READ_BY_GROUP_TYPE_REQ
    }

    fn parse_params(params: &[u8]) -> AttResult<Self> {
        expect_min_len(params, ATT_READ_BY_TYPE_REQ_FIXED_SIZE + BT_UUID_SIZE)?;

        let mut cursor = Cursor::new(params);
        let start_handle = read_u16(&mut cursor)?;
        let end_handle = read_u16(&mut cursor)?;
        let group_type = parse_type(&params[ATT_READ_BY_TYPE_REQ_FIXED_SIZE..])?;

        Ok(Self {
            start_handle,
            end_handle,
            group_type,
        })
    }

    fn write_params(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.start_handle.to_le_bytes());
        out.extend_from_slice(&self.end_handle.to_le_bytes());
        self.group_type.write_le(out);
    }
}

/// Attribute data in Read By Group Type Response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeData<'a> {
    /// Attribute handle
    pub handle: u16,
    /// Group end handle
    pub end_group_handle: u16,
    /// Attribute value
    pub value: &'a [u8],
}

/// Read By Group Type Response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadByGroupTypeResponse {
    length: u8,
    data_list: Vec<u8>,
}

impl ReadByGroupTypeResponse {
    /// Build from groups whose values all have the same length
    pub fn from_groups(groups: &[AttributeData<'_>]) -> AttResult<Self> {
        let first = groups
            .first()
            .ok_or_else(|| AttError::InvalidParameter("no attribute groups".into()))?;
        let value_len = first.value.len();
        if groups.iter().any(|g| g.value.len() != value_len) {
            return Err(AttError::InvalidParameter("values differ in length".into()));
        }
        let length = u8::try_from(4 + value_len)
            .map_err(|_| AttError::InvalidParameter("value too long".into()))?;

        let mut data_list = Vec::with_capacity(groups.len() * length as usize);
        for group in groups {
            data_list.extend_from_slice(&group.handle.to_le_bytes());
            data_list.extend_from_slice(&group.end_group_handle.to_le_bytes());
            data_list.extend_from_slice(group.value);
        }
        Ok(Self { length, data_list })
    }

    /// Size of each group entry
    pub fn length(&self) -> u8 {
        self.length
    }

    /// Number of groups
    pub fn num_groups(&self) -> usize {
        self.data_list.len() / self.length as usize
    }

    /// Group `i`
    pub fn group(&self, i: usize) -> Option<AttributeData<'_>> {
        if i >= self.num_groups() {
            return None;
        }
        let offset = i * self.length as usize;
        Some(AttributeData {
            handle: u16_at(&self.data_list, offset)?,
            end_group_handle: u16_at(&self.data_list, offset + 2)?,
            value: &self.data_list[offset + 4..offset + self.length as usize],
        })
    }

    /// Iterate over all groups
    pub fn iter(&self) -> impl Iterator<Item = AttributeData<'_>> + '_ {
        (0..self.num_groups()).filter_map(move |i| self.group(i))
    }
}

impl AttPdu for ReadByGroupTypeResponse {
    fn opcode(&self) -> u8 {
        ATT_READ_BY_GROUP_TYPE_RSP
    }

    fn parse_params(params: &[u8]) -> AttResult<Self> {
        expect_min_len(params, ATT_READ_BY_GRP_TYPE_RSP_FIXED_SIZE)?;

        let length = params[0];
        if (length as usize) < 4 {
            return Err(AttError::InvalidPdu);
        }
        let data_list = &params[1..];
        check_list(data_list, length as usize)?;

        Ok(Self {
            length,
            data_list: data_list.to_vec(),
        })
    }

    fn write_params(&self, out: &mut Vec<u8>) {
        out.push(self.length);
        out.extend_from_slice(&self.data_list);
    }
}

/// Write Request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRequest {
    /// Handle to write
    pub handle: u16,
    /// Value to write
    pub value: Vec<u8>,
}

impl AttPdu for WriteRequest {
    fn opcode(&self) -> u8 {
        ATT_WRITE_REQ
    }

    fn parse_params(params: &[u8]) -> AttResult<Self> {
        expect_min_len(params, ATT_WRITE_REQ_FIXED_SIZE)?;
        let handle = read_u16(&mut Cursor::new(params))?;
        Ok(Self {
            handle,
            value: params[ATT_WRITE_REQ_FIXED_SIZE..].to_vec(),
        })
    }

    fn write_params(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.handle.to_le_bytes());
        out.extend_from_slice(&self.value);
    }
}

/// Write Response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteResponse;

impl AttPdu for WriteResponse {
    fn opcode(&self) -> u8 {
        ATT_WRITE_RSP
    }

    fn parse_params(params: &[u8]) -> AttResult<Self> {
        expect_len(params, 0)?;
        Ok(Self)
    }

    fn write_params(&self, _out: &mut Vec<u8>) {}
}

/// Write Command, optionally signed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteCommand {
    /// Handle to write
    pub handle: u16,
    /// Value to write
    pub value: Vec<u8>,
    /// Authentication signature; present makes this a Signed Write Command
    pub signature: Option<[u8; ATT_AUTHEN_SIG_LEN]>,
    /// Verification status of a received signature
    pub signature_status: SignatureStatus,
}

impl WriteCommand {
    /// Unsigned write command
    pub fn new(handle: u16, value: Vec<u8>) -> Self {
        Self {
            handle,
            value,
            signature: None,
            signature_status: SignatureStatus::NotIncluded,
        }
    }

    /// Signed write command with a signature computed by the caller.
    ///
    /// The status is `Invalid` until a receiver verifies it, matching a
    /// decoded command.
    pub fn signed(handle: u16, value: Vec<u8>, signature: [u8; ATT_AUTHEN_SIG_LEN]) -> Self {
        Self {
            handle,
            value,
            signature: Some(signature),
            signature_status: SignatureStatus::Invalid,
        }
    }
}

impl AttPdu for WriteCommand {
    fn opcode(&self) -> u8 {
        if self.signature.is_some() {
            ATT_SIGNED_WRITE_CMD
        } else {
            ATT_WRITE_CMD
        }
    }

    fn parse_params(params: &[u8]) -> AttResult<Self> {
        let request = WriteRequest::parse_params(params)?;
        Ok(Self::new(request.handle, request.value))
    }

    fn write_params(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.handle.to_le_bytes());
        out.extend_from_slice(&self.value);
        if let Some(sig) = &self.signature {
            out.extend_from_slice(sig);
        }
    }
}

/// Prepare Write Request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrepareWriteRequest {
    /// Handle to write
    pub handle: u16,
    /// Offset to write at
    pub offset: u16,
    /// Part of the value to write
    pub value: Vec<u8>,
}

impl AttPdu for PrepareWriteRequest {
    fn opcode(&self) -> u8 {
        ATT_PREPARE_WRITE_REQ
    }

    fn parse_params(params: &[u8]) -> AttResult<Self> {
        expect_min_len(params, ATT_PREPARE_WRITE_REQ_FIXED_SIZE)?;

        let mut cursor = Cursor::new(params);
        let handle = read_u16(&mut cursor)?;
        let offset = read_u16(&mut cursor)?;

        Ok(Self {
            handle,
            offset,
            value: params[ATT_PREPARE_WRITE_REQ_FIXED_SIZE..].to_vec(),
        })
    }

    fn write_params(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.handle.to_le_bytes());
        out.extend_from_slice(&self.offset.to_le_bytes());
        out.extend_from_slice(&self.value);
    }
}

/// Prepare Write Response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrepareWriteResponse {
    /// Handle being written
    pub handle: u16,
    /// Offset being written
    pub offset: u16,
    /// Part of the value being written
    pub value: Vec<u8>,
}

impl AttPdu for PrepareWriteResponse {
    fn opcode(&self) -> u8 {
        ATT_PREPARE_WRITE_RSP
    }

    fn parse_params(params: &[u8]) -> AttResult<Self> {
        let request = PrepareWriteRequest::parse_params(params)?;
        Ok(Self {
            handle: request.handle,
            offset: request.offset,
            value: request.value,
        })
    }

    fn write_params(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.handle.to_le_bytes());
        out.extend_from_slice(&self.offset.to_le_bytes());
        out.extend_from_slice(&self.value);
    }
}

/// Execute Write Request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecuteWriteRequest {
    /// `ATT_EXEC_WRITE_CANCEL` or `ATT_EXEC_WRITE_COMMIT`
    pub flags: u8,
}

impl ExecuteWriteRequest {
    /// Whether the prepared values should be written
    pub fn commit(&self) -> bool {
        self.flags == ATT_EXEC_WRITE_COMMIT
    }
}

impl AttPdu for ExecuteWriteRequest {
    fn opcode(&self) -> u8 {
        ATT_EXECUTE_WRITE_REQ
    }

    fn parse_params(params: &[u8]) -> AttResult<Self> {
        expect_len(params, ATT_EXECUTE_WRITE_REQ_SIZE)?;
        match params[0] {
            flags @ (ATT_EXEC_WRITE_CANCEL | ATT_EXEC_WRITE_COMMIT) => Ok(Self { flags }),
            _ => Err(AttError::InvalidPdu),
        }
    }

    fn write_params(&self, out: &mut Vec<u8>) {
        out.push(self.flags);
    }
}

/// Execute Write Response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecuteWriteResponse;

impl AttPdu for ExecuteWriteResponse {
    fn opcode(&self) -> u8 {
        ATT_EXECUTE_WRITE_RSP
    }

    fn parse_params(params: &[u8]) -> AttResult<Self> {
        expect_len(params, 0)?;
        Ok(Self)
    }

    fn write_params(&self, _out: &mut Vec<u8>) {}
}

/// Handle Value Notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandleValueNotification {
    /// Handle of the attribute
    pub handle: u16,
    /// Attribute value
    pub value: Vec<u8>,
}

impl AttPdu for HandleValueNotification {
    fn opcode(&self) -> u8 {
        ATT_HANDLE_VALUE_NTF
    }

    fn parse_params(params: &[u8]) -> AttResult<Self> {
        expect_min_len(params, ATT_HANDLE_VALUE_IND_FIXED_SIZE)?;
        let handle = read_u16(&mut Cursor::new(params))?;
        Ok(Self {
            handle,
            value: params[ATT_HANDLE_VALUE_IND_FIXED_SIZE..].to_vec(),
        })
    }

    fn write_params(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.handle.to_le_bytes());
        out.extend_from_slice(&self.value);
    }
}

/// Handle Value Indication
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandleValueIndication {
    /// Handle of the attribute
    pub handle: u16,
    /// Attribute value
    pub value: Vec<u8>,
}

impl AttPdu for HandleValueIndication {
    fn opcode(&self) -> u8 {
        ATT_HANDLE_VALUE_IND
    }

    fn parse_params(params: &[u8]) -> AttResult<Self> {
        let notification = HandleValueNotification::parse_params(params)?;
        Ok(Self {
            handle: notification.handle,
            value: notification.value,
        })
    }

    fn write_params(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.handle.to_le_bytes());
        out.extend_from_slice(&self.value);
    }
}

/// Handle Value Confirmation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandleValueConfirmation;

impl AttPdu for HandleValueConfirmation {
    fn opcode(&self) -> u8 {
        ATT_HANDLE_VALUE_CONF
    }

    fn parse_params(params: &[u8]) -> AttResult<Self> {
        expect_len(params, 0)?;
        Ok(Self)
    }

    fn write_params(&self, _out: &mut Vec<u8>) {}
}
