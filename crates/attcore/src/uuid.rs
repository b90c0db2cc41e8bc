use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use thiserror::Error;

/// Size of a 2-octet Bluetooth UUID on the wire.
pub const BT_UUID_SIZE: usize = 2;

/// Size of a full 16-octet UUID on the wire.
pub const UUID_SIZE: usize = 16;

/// The Bluetooth base UUID "00000000-0000-1000-8000-00805F9B34FB" in
/// little-endian (wire) order.
pub const BASE_UUID_BYTES: [u8; UUID_SIZE] = [
    0xFB, 0x34, 0x9B, 0x5F, 0x80, 0x00, 0x00, 0x80, 0x00, 0x10, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

/// Offset within the base UUID where a 2-octet value is spliced in.
const BASE_OFFSET: usize = 12;

/// Attribute type as carried in ATT PDUs.
///
/// The wire form is tagged by its length, which is always exactly 2 or 16
/// octets. Two UUIDs compare equal when their 16-octet canonical forms are
/// equal, so `Uuid::Bt(0x180D)` equals its base-UUID expansion.
#[derive(Clone, Copy)]
pub enum Uuid {
    /// 2-octet Bluetooth SIG assigned UUID
    Bt(u16),
    /// 16-octet UUID, little-endian
    Full([u8; UUID_SIZE]),
}

impl Uuid {
    /// Creates a UUID from a 16-bit SIG-assigned value.
    pub const fn from_u16(uuid16: u16) -> Self {
        Uuid::Bt(uuid16)
    }

    /// Creates a 16-octet UUID from little-endian bytes.
    pub const fn from_bytes_le(bytes: [u8; UUID_SIZE]) -> Self {
        Uuid::Full(bytes)
    }

    /// Creates a 16-octet UUID from big-endian (textual order) bytes.
    pub fn from_bytes_be(mut bytes: [u8; UUID_SIZE]) -> Self {
        bytes.reverse();
        Uuid::Full(bytes)
    }

    /// Reads a UUID from a little-endian slice of length 2 or 16.
    ///
    /// Returns `None` for any other length.
    pub fn try_from_slice_le(slice: &[u8]) -> Option<Self> {
        match slice.len() {
            BT_UUID_SIZE => Some(Uuid::Bt(u16::from_le_bytes([slice[0], slice[1]]))),
            UUID_SIZE => {
                let mut bytes = [0u8; UUID_SIZE];
                bytes.copy_from_slice(slice);
                Some(Uuid::Full(bytes))
            }
            _ => None,
        }
    }

    /// Length of the wire representation (2 or 16).
    pub const fn len(&self) -> usize {
        match self {
            Uuid::Bt(_) => BT_UUID_SIZE,
            Uuid::Full(_) => UUID_SIZE,
        }
    }

    /// Always false: a UUID is never zero-length on the wire.
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Appends the wire representation to `out`.
    pub fn write_le(&self, out: &mut Vec<u8>) {
        match self {
            Uuid::Bt(value) => out.extend_from_slice(&value.to_le_bytes()),
            Uuid::Full(bytes) => out.extend_from_slice(bytes),
        }
    }

    /// Wire representation as an owned buffer.
    pub fn to_le_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len());
        self.write_le(&mut out);
        out
    }

    /// Canonical 16-octet form, expanding 2-octet values with the base UUID.
    pub const fn to_uuid128(&self) -> [u8; UUID_SIZE] {
        match *self {
            Uuid::Bt(value) => {
                let mut bytes = BASE_UUID_BYTES;
                bytes[BASE_OFFSET] = value as u8;
                bytes[BASE_OFFSET + 1] = (value >> 8) as u8;
                bytes
            }
            Uuid::Full(bytes) => bytes,
        }
    }

    /// The 2-octet value, if this UUID is derived from the Bluetooth base UUID.
    pub fn to_uuid16(&self) -> Option<u16> {
        match *self {
            Uuid::Bt(value) => Some(value),
            Uuid::Full(bytes) => {
                let base_derived = bytes[..BASE_OFFSET] == BASE_UUID_BYTES[..BASE_OFFSET]
                    && bytes[BASE_OFFSET + 2..] == BASE_UUID_BYTES[BASE_OFFSET + 2..];
                if base_derived {
                    Some(u16::from_le_bytes([bytes[BASE_OFFSET], bytes[BASE_OFFSET + 1]]))
                } else {
                    None
                }
            }
        }
    }

    /// Shortest wire form: 2 octets when base-derived, otherwise 16.
    pub fn compact(&self) -> Self {
        self.to_uuid16().map_or(*self, Uuid::Bt)
    }

    /// Big-endian bytes, for display.
    pub fn as_bytes_be(&self) -> [u8; UUID_SIZE] {
        let mut bytes = self.to_uuid128();
        bytes.reverse();
        bytes
    }
}

/// Compares two UUIDs given as raw little-endian buffers of length 2 or 16.
///
/// Returns false when either length is invalid. Neither buffer is modified.
pub fn compare_uuid(uuid1: &[u8], uuid2: &[u8]) -> bool {
    match (Uuid::try_from_slice_le(uuid1), Uuid::try_from_slice_le(uuid2)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

impl PartialEq for Uuid {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Uuid::Bt(a), Uuid::Bt(b)) => a == b,
            _ => self.to_uuid128() == other.to_uuid128(),
        }
    }
}

impl Eq for Uuid {}

impl Hash for Uuid {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.to_uuid128().hash(state);
    }
}

impl From<u16> for Uuid {
    fn from(uuid16: u16) -> Self {
        Uuid::Bt(uuid16)
    }
}

impl From<[u8; UUID_SIZE]> for Uuid {
    /// Assumes bytes are in little-endian order.
    fn from(bytes: [u8; UUID_SIZE]) -> Self {
        Uuid::Full(bytes)
    }
}

impl PartialEq<u16> for Uuid {
    fn eq(&self, other: &u16) -> bool {
        self.to_uuid16() == Some(*other)
    }
}

impl fmt::Display for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.as_bytes_be();
        write!(
            f,
            "{}-{}-{}-{}-{}",
            hex::encode(&b[0..4]),
            hex::encode(&b[4..6]),
            hex::encode(&b[6..8]),
            hex::encode(&b[8..10]),
            hex::encode(&b[10..16])
        )
    }
}

impl fmt::Debug for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Uuid::Bt(value) => write!(f, "Uuid(0x{:04X})", value),
            Uuid::Full(_) => write!(f, "Uuid({})", self),
        }
    }
}

#[derive(Debug, Error)]
pub enum UuidParseError {
    #[error("invalid UUID length")]
    InvalidLength,

    #[error("invalid UUID hex: {0}")]
    HexError(#[from] hex::FromHexError),
}

impl FromStr for Uuid {
    type Err = UuidParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let cleaned: String = s.chars().filter(|c| *c != '-').collect();

        match cleaned.len() {
            4 => {
                let mut be = [0u8; 2];
                hex::decode_to_slice(&cleaned, &mut be)?;
                Ok(Uuid::Bt(u16::from_be_bytes(be)))
            }
            32 => {
                let mut bytes_be = [0u8; UUID_SIZE];
                hex::decode_to_slice(&cleaned, &mut bytes_be)?;
                Ok(Uuid::from_bytes_be(bytes_be))
            }
            _ => Err(UuidParseError::InvalidLength),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bt_uuid_equals_base_expansion() {
        let short = Uuid::Bt(0x180D);
        let mut expanded = BASE_UUID_BYTES;
        expanded[12] = 0x0D;
        expanded[13] = 0x18;

        assert_eq!(short, Uuid::Full(expanded));
        assert!(compare_uuid(&[0x0D, 0x18], &expanded));
    }

    #[test]
    fn test_full_uuids_differing_in_last_byte() {
        let a = [0x11u8; 16];
        let mut b = a;
        b[15] = 0x12;

        assert_ne!(Uuid::Full(a), Uuid::Full(b));
        assert!(!compare_uuid(&a, &b));
        // inputs untouched
        assert_eq!(a, [0x11u8; 16]);
    }

    #[test]
    fn test_invalid_lengths_rejected() {
        assert!(Uuid::try_from_slice_le(&[0x01, 0x02, 0x03, 0x04]).is_none());
        assert!(Uuid::try_from_slice_le(&[]).is_none());
        assert!(!compare_uuid(&[0x0D, 0x18, 0x00], &[0x0D, 0x18]));
    }

    #[test]
    fn test_to_uuid16() {
        let expanded = Uuid::Bt(0x2A37).to_uuid128();
        assert_eq!(Uuid::Full(expanded).to_uuid16(), Some(0x2A37));
        assert_eq!(Uuid::Full(expanded).compact().len(), BT_UUID_SIZE);

        let vendor = Uuid::Full([0xAA; 16]);
        assert_eq!(vendor.to_uuid16(), None);
        assert_eq!(vendor.compact().len(), UUID_SIZE);
    }

    #[test]
    fn test_parse_and_display() {
        let uuid: Uuid = "0000180d-0000-1000-8000-00805f9b34fb".parse().unwrap();
        assert_eq!(uuid, Uuid::Bt(0x180D));
        assert_eq!(uuid.to_string(), "0000180d-0000-1000-8000-00805f9b34fb");

        let short: Uuid = "2A37".parse().unwrap();
        assert_eq!(short, 0x2A37u16);

        assert!("12345".parse::<Uuid>().is_err());
    }
}
