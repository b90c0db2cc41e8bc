//! Host glue between the HCI transport and the ATT dispatcher
//!
//! Bytes from the controller go through the framer, ACL reassembly and L2CAP
//! demultiplexing before ATT payloads reach the [`AttDispatcher`]. Outbound
//! ATT PDUs take the reverse path. Connection lifecycle follows the LE
//! Connection Complete and Disconnection Complete events.

use crate::att::{AttDispatcher, AttEvent, AttMessage, Disposition};
use crate::error::{Error, HciError, Result};
use crate::hci::constants::*;
use crate::hci::{
    fragment, AclReassembler, DisconnectionComplete, FramerConfig, HciEvent, HciFramer,
    HciPacket, HciTransport, LeConnectionComplete,
};
use crate::l2cap::{BasicFrame, L2CAP_CID_ATT};
use log::{debug, trace, warn};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

/// Host configuration
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Largest ACL payload sent to the controller
    pub acl_fragment_len: usize,
    /// Framer limits
    pub framer: FramerConfig,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            acl_fragment_len: HCI_DATA_MAX_DATA_LENGTH,
            framer: FramerConfig::default(),
        }
    }
}

/// Drives one ATT dispatcher over one HCI transport
pub struct AttHost<T: HciTransport> {
    transport: T,
    framer: HciFramer,
    reassembler: AclReassembler,
    dispatcher: Arc<AttDispatcher>,
    config: RwLock<HostConfig>,
}

impl<T: HciTransport> AttHost<T> {
    pub fn new(transport: T, dispatcher: Arc<AttDispatcher>) -> Self {
        Self::with_config(transport, dispatcher, HostConfig::default())
    }

    pub fn with_config(transport: T, dispatcher: Arc<AttDispatcher>, config: HostConfig) -> Self {
        Self {
            transport,
            framer: HciFramer::new(config.framer.clone()),
            reassembler: AclReassembler::new(),
            dispatcher,
            config: RwLock::new(config),
        }
    }

    /// Replace the configuration; framer limits only apply to a new host
    pub fn set_config(&self, config: HostConfig) {
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = config;
    }

    pub fn config(&self) -> HostConfig {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn dispatcher(&self) -> &Arc<AttDispatcher> {
        &self.dispatcher
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Process bytes read from the transport.
    ///
    /// Packets that fail at the ATT or reassembly level are logged and
    /// skipped; transport write failures are returned.
    pub fn receive_bytes(&mut self, data: &[u8], now: Instant) -> Result<usize> {
        let packets = self.framer.extend(data);
        let count = packets.len();

        for packet in packets {
            match self.handle_packet(packet, now) {
                Ok(()) => {}
                Err(Error::Hci(HciError::Io(e))) => return Err(HciError::Io(e).into()),
                Err(e) => warn!("Host: packet skipped: {}", e),
            }
        }
        Ok(count)
    }

    /// Process one complete HCI packet
    pub fn handle_packet(&mut self, packet: HciPacket, now: Instant) -> Result<()> {
        match packet {
            HciPacket::Event(event) => {
                self.handle_event(&event);
                Ok(())
            }
            HciPacket::AclData(acl) => {
                let handle = acl.handle;
                let Some(frame) = self.reassembler.push(acl)? else {
                    return Ok(());
                };
                if !frame.is_att() {
                    debug!(
                        "Host: ignoring L2CAP channel {:#06x} on {:#06x}",
                        frame.channel_id, handle
                    );
                    return Ok(());
                }

                if let Disposition::Respond(rsp) =
                    self.dispatcher.receive(handle, &frame.payload, now)?
                {
                    self.send(handle, &rsp.into(), now)?;
                }
                Ok(())
            }
            other => {
                trace!("Host: ignoring {:?} packet", other.packet_type());
                Ok(())
            }
        }
    }

    fn handle_event(&mut self, event: &HciEvent) {
        if let Some(complete) = LeConnectionComplete::parse(event) {
            if complete.status == HCI_SUCCESS {
                self.dispatcher.connect(complete.connection_handle);
            } else {
                debug!("Host: LE connection failed, status {:#04x}", complete.status);
            }
        } else if let Some(disconnected) = DisconnectionComplete::parse(event) {
            if disconnected.status == HCI_SUCCESS {
                let handle = disconnected.connection_handle;
                self.reassembler.discard(handle);
                self.dispatcher.disconnect(handle);
                debug!(
                    "Host: {:#06x} disconnected, reason {:#04x}",
                    handle, disconnected.reason
                );
            }
        }
    }

    /// Encode `message` and write it to the transport as ACL fragments.
    ///
    /// The transaction state only changes once every fragment is written.
    pub fn send(&mut self, connection: u16, message: &AttMessage, now: Instant) -> Result<()> {
        let tx = self.dispatcher.prepare(connection, message, now)?;
        match self.transmit(connection, tx.bytes()) {
            Ok(()) => {
                self.dispatcher.commit(tx);
                Ok(())
            }
            Err(e) => {
                self.dispatcher.abort(tx);
                Err(e)
            }
        }
    }

    fn transmit(&mut self, connection: u16, pdu: &[u8]) -> Result<()> {
        let frame = BasicFrame::new(L2CAP_CID_ATT, pdu.to_vec())
            .to_bytes()
            .ok_or(HciError::PacketTooLong {
                len: pdu.len(),
                max: u16::MAX as usize,
            })?;

        let max_len = self.config().acl_fragment_len;
        for acl in fragment(connection, &frame, max_len, false) {
            self.transport.send_packet(&HciPacket::AclData(acl))?;
        }
        Ok(())
    }

    /// Fire expired ATT deadlines
    pub fn poll_timeouts(&self, now: Instant) -> Vec<AttEvent> {
        self.dispatcher.poll_timeouts(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::att::*;

    fn att_acl(handle: u16, pdu: &[u8]) -> Vec<u8> {
        let frame = BasicFrame::new(L2CAP_CID_ATT, pdu.to_vec()).to_bytes().unwrap();
        HciPacket::acl(handle, crate::hci::PacketBoundary::FirstFlushable, frame)
            .unwrap()
            .to_bytes()
            .unwrap()
    }

    fn connection_complete(handle: u16) -> Vec<u8> {
        let mut bytes = vec![HCI_EVENT_PKT, EVT_LE_META_EVENT, 19, EVT_LE_CONN_COMPLETE, HCI_SUCCESS];
        bytes.extend_from_slice(&handle.to_le_bytes());
        bytes.extend_from_slice(&[0x01, 0x00, 1, 2, 3, 4, 5, 6, 0x0A, 0x00, 0x00, 0x00, 0x80, 0x0C, 0x00]);
        bytes
    }

    /// Link whose writes fail while `down` is set
    #[derive(Default)]
    struct FlakyLink {
        down: bool,
        written: Vec<u8>,
    }

    impl std::io::Write for FlakyLink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if self.down {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "link down",
                ));
            }
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_connection_lifecycle() {
        let dispatcher = Arc::new(AttDispatcher::new());
        let mut host = AttHost::new(Vec::new(), dispatcher.clone());
        let now = Instant::now();

        assert_eq!(host.receive_bytes(&connection_complete(0x0040), now).unwrap(), 1);
        assert!(dispatcher.is_connected(0x0040));

        let disconnect = [HCI_EVENT_PKT, EVT_DISCONN_COMPLETE, 4, HCI_SUCCESS, 0x40, 0x00, 0x13];
        host.receive_bytes(&disconnect, now).unwrap();
        assert!(!dispatcher.is_connected(0x0040));
    }

    #[test]
    fn test_unsupported_request_answered() {
        let dispatcher = Arc::new(AttDispatcher::new());
        let mut host = AttHost::new(Vec::new(), dispatcher);
        let now = Instant::now();

        host.receive_bytes(&connection_complete(0x0040), now).unwrap();
        host.receive_bytes(&att_acl(0x0040, &[0x20, 0x01, 0x00]), now).unwrap();

        let expected = HciPacket::acl(
            0x0040,
            crate::hci::PacketBoundary::FirstNonFlushable,
            vec![0x05, 0x00, 0x04, 0x00, ATT_ERROR_RSP, 0x20, 0x00, 0x00, 0x06],
        )
        .unwrap()
        .to_bytes()
        .unwrap();
        assert_eq!(host.transport(), &expected);
    }

    #[test]
    fn test_send_fragments_and_mtu_exchange() {
        let dispatcher = Arc::new(AttDispatcher::new());
        let mut host = AttHost::new(Vec::new(), dispatcher.clone());
        let now = Instant::now();
        host.receive_bytes(&connection_complete(0x0040), now).unwrap();

        host.send(0x0040, &ExchangeMtuRequest { client_rx_mtu: 200 }.into(), now)
            .unwrap();
        host.receive_bytes(&att_acl(0x0040, &[ATT_EXCHANGE_MTU_RSP, 0x96, 0x00]), now)
            .unwrap();
        assert_eq!(dispatcher.mtu(0x0040).unwrap(), 150);

        host.transport_mut().clear();
        let value = vec![0x33; 100];
        host.send(
            0x0040,
            &HandleValueNotification {
                handle: 0x0012,
                value,
            }
            .into(),
            now,
        )
        .unwrap();

        // 4 + 3 + 100 bytes of L2CAP frame over 27-byte fragments
        let mut framer = HciFramer::default();
        let fragments = framer.extend(host.transport());
        assert_eq!(fragments.len(), 4);

        let mut reassembler = AclReassembler::new();
        let frame = fragments
            .into_iter()
            .filter_map(|p| match p {
                HciPacket::AclData(acl) => reassembler.push(acl).unwrap(),
                _ => None,
            })
            .next()
            .unwrap();
        assert_eq!(frame.payload.len(), 103);
        assert_eq!(frame.payload[0], ATT_HANDLE_VALUE_NTF);
    }

    #[test]
    fn test_fragment_len_config() {
        let dispatcher = Arc::new(AttDispatcher::new());
        let mut host = AttHost::new(Vec::new(), dispatcher);
        let now = Instant::now();
        host.receive_bytes(&connection_complete(0x0040), now).unwrap();

        host.set_config(HostConfig {
            acl_fragment_len: 4,
            ..HostConfig::default()
        });
        assert_eq!(host.config().acl_fragment_len, 4);

        // 4-byte L2CAP header + 3-byte Read Request
        host.send(0x0040, &ReadRequest { handle: 3 }.into(), now).unwrap();
        let packets = HciFramer::default().extend(host.transport());
        assert_eq!(packets.len(), 2);
    }

    #[test]
    fn test_failed_write_leaves_no_transaction() {
        let dispatcher = Arc::new(AttDispatcher::new());
        let mut host = AttHost::new(FlakyLink::default(), dispatcher.clone());
        let now = Instant::now();
        host.receive_bytes(&connection_complete(0x0040), now).unwrap();

        host.transport_mut().down = true;
        assert!(matches!(
            host.send(0x0040, &ReadRequest { handle: 3 }.into(), now),
            Err(Error::Hci(HciError::Io(_)))
        ));
        assert_eq!(dispatcher.next_deadline(), None);
        assert!(host.poll_timeouts(now + ATT_MSG_TIMEOUT).is_empty());
        assert!(!dispatcher.is_flow_control_violated(0x0040).unwrap());

        // The Error Response for this request cannot be written either
        assert!(host
            .receive_bytes(&att_acl(0x0040, &[0x20, 0x01, 0x00]), now)
            .is_err());

        host.transport_mut().down = false;
        host.send(0x0040, &ReadRequest { handle: 3 }.into(), now).unwrap();
        // Still owed, so the response is accepted
        let rsp = ErrorResponse::new(0x20, 0x0000, AttErrorCode::RequestNotSupported);
        host.send(0x0040, &rsp.into(), now).unwrap();

        // ACL header + L2CAP header + PDU, for both PDUs
        assert_eq!(host.transport().written.len(), (5 + 4 + 3) + (5 + 4 + 5));
    }

    #[test]
    fn test_unknown_connection_is_skipped() {
        let dispatcher = Arc::new(AttDispatcher::new());
        let mut host = AttHost::new(Vec::new(), dispatcher);
        let now = Instant::now();

        assert_eq!(host.receive_bytes(&att_acl(0x0041, &[ATT_READ_REQ, 0x03, 0x00]), now).unwrap(), 1);
        assert!(host.transport().is_empty());
        assert!(matches!(
            host.send(0x0041, &ReadRequest { handle: 3 }.into(), now),
            Err(Error::Att(AttError::UnknownConnection(0x0041)))
        ));
    }
}
