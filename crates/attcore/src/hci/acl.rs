//! ACL fragmentation and reassembly
//!
//! Upper-layer traffic travels in L2CAP basic frames that may be split over
//! several ACL data packets. The first fragment carries a start boundary flag,
//! the rest carry `Continuing`. A frame is complete once the buffered bytes
//! reach the length announced by its L2CAP header.

use super::packet::{AclData, PacketBoundary};
use crate::error::HciError;
use crate::l2cap::{BasicFrame, L2capHeader, L2CAP_BASIC_HEADER_SIZE};
use log::warn;
use std::collections::HashMap;

/// Per-connection ACL reassembly buffers
#[derive(Debug, Default)]
pub struct AclReassembler {
    partial: HashMap<u16, Vec<u8>>,
}

impl AclReassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one ACL fragment, returning the L2CAP frame it completes, if any.
    pub fn push(&mut self, acl: AclData) -> Result<Option<BasicFrame>, HciError> {
        let handle = acl.handle;

        let buffer = if acl.boundary.is_start() {
            if let Some(stale) = self.partial.remove(&handle) {
                warn!(
                    "ACL {:#06x}: discarding {} bytes of incomplete frame",
                    handle,
                    stale.len()
                );
            }
            acl.data
        } else {
            let mut buffer = self
                .partial
                .remove(&handle)
                .ok_or(HciError::Reassembly("continuation without start fragment"))?;
            buffer.extend_from_slice(&acl.data);
            buffer
        };

        if buffer.len() < L2CAP_BASIC_HEADER_SIZE {
            self.partial.insert(handle, buffer);
            return Ok(None);
        }

        let frame_len = L2capHeader::parse(&buffer)
            .map(|h| h.frame_len())
            .ok_or(HciError::Reassembly("bad L2CAP header"))?;

        if buffer.len() < frame_len {
            self.partial.insert(handle, buffer);
            return Ok(None);
        }
        if buffer.len() > frame_len {
            return Err(HciError::Reassembly("fragments exceed L2CAP length"));
        }

        BasicFrame::parse(&buffer)
            .map(Some)
            .ok_or(HciError::Reassembly("bad L2CAP frame"))
    }

    /// Bytes buffered for an incomplete frame on `handle`
    pub fn pending(&self, handle: u16) -> usize {
        self.partial.get(&handle).map_or(0, Vec::len)
    }

    /// Drop any incomplete frame for `handle`
    pub fn discard(&mut self, handle: u16) -> bool {
        self.partial.remove(&handle).is_some()
    }
}

/// Split an encoded L2CAP frame into ACL packets of at most `max_len` bytes.
pub fn fragment(handle: u16, frame: &[u8], max_len: usize, flushable: bool) -> Vec<AclData> {
    let first = if flushable {
        PacketBoundary::FirstFlushable
    } else {
        PacketBoundary::FirstNonFlushable
    };

    frame
        .chunks(max_len.max(1))
        .enumerate()
        .map(|(i, chunk)| {
            let boundary = if i == 0 { first } else { PacketBoundary::Continuing };
            AclData::new(handle, boundary, chunk.to_vec())
        })
        .collect()
}
