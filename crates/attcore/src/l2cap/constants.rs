//! L2CAP constants

/// Basic L2CAP header: length (2) + channel id (2)
pub const L2CAP_BASIC_HEADER_SIZE: usize = 4;

// Fixed channel identifiers on an LE-U logical link
pub const L2CAP_CID_NULL: u16 = 0x0000;
pub const L2CAP_CID_ATT: u16 = 0x0004;
pub const L2CAP_CID_LE_SIGNALING: u16 = 0x0005;
pub const L2CAP_CID_SMP: u16 = 0x0006;
