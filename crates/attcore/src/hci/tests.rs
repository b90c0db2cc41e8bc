//! Unit tests for HCI packet parsing, framing and ACL reassembly

use super::acl::*;
use super::constants::*;
use super::framer::*;
use super::packet::*;
use crate::error::HciError;
use crate::l2cap::L2CAP_CID_ATT;
use rand::Rng;

#[test]
fn test_hci_command_serialization() {
    let packet = HciPacket::Command(HciCommand::reset()).to_bytes().unwrap();
    assert_eq!(packet, vec![HCI_COMMAND_PKT, 0x03, 0x0C, 0x00]);

    let command = HciCommand::disconnect(0x0040, HCI_REMOTE_USER_TERMINATED);
    assert_eq!(command.ogf(), OGF_LINK_CTL);
    assert_eq!(command.ocf(), 0x0006);

    let packet = HciPacket::Command(command).to_bytes().unwrap();
    assert_eq!(packet[0], HCI_COMMAND_PKT);

    // Opcode: Disconnect (0x0406)
    assert_eq!(u16::from_le_bytes([packet[1], packet[2]]), HCI_DISCONNECT);

    // Param length: 3
    assert_eq!(packet[3], 3);

    // Parameters
    assert_eq!(u16::from_le_bytes([packet[4], packet[5]]), 0x0040); // handle
    assert_eq!(packet[6], 0x13); // reason

    let command = HciCommand::from_parts(OGF_LE, 0x0002, vec![]).unwrap();
    assert_eq!(command.opcode, HCI_LE_READ_BUFFER_SIZE);
}

#[test]
fn test_command_builder_limits() {
    assert!(HciPacket::command(HCI_RESET, vec![0; 255]).is_ok());
    assert!(matches!(
        HciPacket::command(HCI_RESET, vec![0; 256]),
        Err(HciError::InvalidParamLength(256))
    ));

    // Application-only vendor opcodes never reach the wire
    for opcode in [
        HCI_EXT_ENABLE_PTM,
        HCI_EXT_PER_BY_CHAN,
        HCI_EXT_ADV_EVENT_NOTICE,
        HCI_EXT_CONN_EVENT_NOTICE,
    ] {
        assert!(matches!(
            HciPacket::command(opcode, vec![]),
            Err(HciError::Unsupported(op)) if op == opcode
        ));
    }
    // Other vendor commands are fine
    assert!(HciPacket::command(0xFC13, vec![0x40, 0x00]).is_ok());
}

#[test]
fn test_oversized_fields_are_not_truncated() {
    // Structs built field by field bypass the checked constructors
    let command = HciPacket::Command(HciCommand {
        opcode: HCI_RESET,
        parameters: vec![0; 256],
    });
    assert!(matches!(
        command.to_bytes(),
        Err(HciError::PacketTooLong { len: 256, max: 255 })
    ));

    let acl = HciPacket::AclData(AclData::new(
        0x0040,
        PacketBoundary::FirstFlushable,
        vec![0; HCI_MAX_DATA_PKT_SIZE + 1],
    ));
    assert!(matches!(
        acl.to_bytes(),
        Err(HciError::PacketTooLong { len: 0x10000, .. })
    ));

    let sco = HciPacket::ScoData(ScoData {
        handle: 0x0005,
        status: 0,
        data: vec![0; 300],
    });
    assert!(sco.to_bytes().is_err());

    let event = HciPacket::Event(HciEvent {
        event_code: EVT_CMD_COMPLETE,
        parameters: vec![0; 255],
    });
    assert_eq!(event.to_bytes().unwrap().len(), 3 + 255);
}

#[test]
fn test_hci_event_parsing() {
    // Command Complete for HCI_Reset
    let data = [
        EVT_CMD_COMPLETE, // Event code
        4,                // Parameter length
        1,                // Num_HCI_Command_Packets
        0x03,             // Command_Opcode (low byte)
        0x0C,             // Command_Opcode (high byte)
        0x00,             // Status
    ];

    let event = HciEvent::parse(&data).unwrap();
    assert_eq!(event.event_code, EVT_CMD_COMPLETE);
    assert_eq!(event.parameters, vec![1, 0x03, 0x0C, 0x00]);
    assert_eq!(event.le_subevent(), None);

    // Invalid data tests
    assert!(HciEvent::parse(&[]).is_err());
    assert!(HciEvent::parse(&[EVT_CMD_COMPLETE, 10, 1, 2]).is_err());
}

fn le_connection_complete(handle: u16) -> Vec<u8> {
    let mut params = vec![EVT_LE_CONN_COMPLETE, HCI_SUCCESS];
    params.extend_from_slice(&handle.to_le_bytes());
    params.push(0x01); // Role (peripheral)
    params.push(0x00); // Peer_Address_Type
    params.extend_from_slice(&[0x01, 0x02, 0x03, 0x04, 0x05, 0x06]); // Peer_Address
    params.extend_from_slice(&0x000Au16.to_le_bytes()); // Conn_Interval
    params.extend_from_slice(&0x0000u16.to_le_bytes()); // Conn_Latency
    params.extend_from_slice(&0x0C80u16.to_le_bytes()); // Supervision_Timeout
    params.push(0x00); // Master_Clock_Accuracy
    params
}

#[test]
fn test_connection_events() {
    let event = HciEvent {
        event_code: EVT_LE_META_EVENT,
        parameters: le_connection_complete(0x0040),
    };
    assert_eq!(event.le_subevent(), Some(EVT_LE_CONN_COMPLETE));

    let complete = LeConnectionComplete::parse(&event).unwrap();
    assert_eq!(complete.status, HCI_SUCCESS);
    assert_eq!(complete.connection_handle, 0x0040);
    assert_eq!(complete.role, 0x01);
    assert_eq!(complete.peer_address, [0x01, 0x02, 0x03, 0x04, 0x05, 0x06]);
    assert_eq!(complete.supervision_timeout, 0x0C80);
    assert!(DisconnectionComplete::parse(&event).is_none());

    let event = HciEvent {
        event_code: EVT_DISCONN_COMPLETE,
        parameters: vec![HCI_SUCCESS, 0x40, 0x00, HCI_REMOTE_USER_TERMINATED],
    };
    let disconnected = DisconnectionComplete::parse(&event).unwrap();
    assert_eq!(disconnected.connection_handle, 0x0040);
    assert_eq!(disconnected.reason, HCI_REMOTE_USER_TERMINATED);
    assert!(LeConnectionComplete::parse(&event).is_none());
}

#[test]
fn test_acl_packet_round_trip() {
    let packet = HciPacket::acl(0x0040, PacketBoundary::FirstFlushable, vec![0xAA, 0xBB]).unwrap();
    let bytes = packet.to_bytes().unwrap();
    // Handle 0x040 with PB = 0b10
    assert_eq!(bytes, vec![HCI_ACL_PKT, 0x40, 0x20, 0x02, 0x00, 0xAA, 0xBB]);
    assert_eq!(HciPacket::parse(&bytes).unwrap(), packet);

    let sco = HciPacket::ScoData(ScoData {
        handle: 0x0005,
        status: 0,
        data: vec![1, 2, 3],
    });
    let bytes = sco.to_bytes().unwrap();
    assert_eq!(bytes, vec![HCI_SCO_PKT, 0x05, 0x00, 0x03, 1, 2, 3]);
    assert_eq!(HciPacket::parse(&bytes).unwrap(), sco);

    assert!(matches!(
        HciPacket::parse(&[0x07, 0x00]),
        Err(HciError::InvalidPacketType(0x07))
    ));
    assert!(HciPacket::parse(&[HCI_ACL_PKT, 0x40, 0x00, 0x02]).is_err());
    assert!(HciPacket::parse(&[HCI_ACL_PKT, 0x40, 0x00, 0x02, 0x00, 0xAA]).is_err());
}

#[test]
fn test_framer_waits_for_long_command() {
    let mut framer = HciFramer::default();

    // Command declaring 0xFF parameter bytes, only 6 of them available
    let data = [HCI_COMMAND_PKT, 0x03, 0x0C, 0xFF, 1, 2, 3, 4, 5, 6];
    assert!(framer.extend(&data).is_empty());
    assert_eq!(framer.state(), FramerState::AwaitingPayload);
    assert_eq!(framer.buffered(), 10);

    let rest = vec![0u8; 0xFF - 6];
    let packets = framer.extend(&rest);
    assert_eq!(packets.len(), 1);
    match &packets[0] {
        HciPacket::Command(cmd) => assert_eq!(cmd.parameters.len(), 0xFF),
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(framer.state(), FramerState::AwaitingPacketType);
}

#[test]
fn test_framer_completes_acl_packet_once() {
    let mut framer = HciFramer::default();
    let data = [HCI_ACL_PKT, 0x40, 0x00, 0x02, 0x00, 0xAA, 0xBB];

    let mut completed = Vec::new();
    let mut states = Vec::new();
    for &byte in &data {
        if let Some(packet) = framer.push(byte).unwrap() {
            completed.push(packet);
        }
        states.push(framer.state());
    }

    assert_eq!(
        states,
        vec![
            FramerState::AwaitingHeaderFields,
            FramerState::AwaitingHeaderFields,
            FramerState::AwaitingLength,
            FramerState::AwaitingLength,
            FramerState::AwaitingPayload,
            FramerState::AwaitingPayload,
            FramerState::AwaitingPacketType,
        ]
    );
    assert_eq!(completed.len(), 1);
    match &completed[0] {
        HciPacket::AclData(acl) => {
            assert_eq!(acl.handle, 0x0040);
            assert_eq!(acl.boundary, PacketBoundary::FirstNonFlushable);
            assert_eq!(acl.data, vec![0xAA, 0xBB]);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_framer_empty_event() {
    let mut framer = HciFramer::default();
    let packets = framer.extend(&[HCI_EVENT_PKT, 0xFF, 0x00]);
    assert_eq!(
        packets,
        vec![HciPacket::Event(HciEvent {
            event_code: 0xFF,
            parameters: vec![],
        })]
    );
    assert_eq!(framer.state(), FramerState::AwaitingPacketType);
}

#[test]
fn test_framer_resyncs() {
    let mut framer = HciFramer::new(FramerConfig {
        max_command_len: HCI_MAX_CMD_PKT_SIZE,
        max_data_len: 64,
    });

    // Garbage type byte
    assert!(matches!(
        framer.push(0x09),
        Err(HciError::InvalidPacketType(0x09))
    ));
    assert_eq!(framer.state(), FramerState::AwaitingPacketType);

    // Oversized ACL length is discarded
    for &byte in &[HCI_ACL_PKT, 0x40, 0x00, 0x00] {
        assert!(framer.push(byte).unwrap().is_none());
    }
    assert!(matches!(
        framer.push(0x01),
        Err(HciError::PacketTooLong { len: 256, max: 64 })
    ));
    assert_eq!(framer.state(), FramerState::AwaitingPacketType);
    assert_eq!(framer.buffered(), 0);

    // Next packet frames normally
    let reset_complete = [HCI_EVENT_PKT, EVT_CMD_COMPLETE, 4, 1, 0x03, 0x0C, 0x00];
    assert_eq!(framer.extend(&reset_complete).len(), 1);
}

#[test]
fn test_framer_random_chunks() {
    let mut rng = rand::thread_rng();

    let packets = vec![
        HciPacket::Event(HciEvent {
            event_code: EVT_LE_META_EVENT,
            parameters: le_connection_complete(0x0001),
        }),
        HciPacket::acl(0x0001, PacketBoundary::FirstFlushable, (0..40).collect()).unwrap(),
        HciPacket::Command(HciCommand::reset()),
        HciPacket::acl(0x0001, PacketBoundary::Continuing, vec![]).unwrap(),
        HciPacket::Event(HciEvent {
            event_code: EVT_NUM_COMPLETED_PACKETS,
            parameters: vec![1, 0x01, 0x00, 0x02, 0x00],
        }),
    ];
    let stream: Vec<u8> = packets.iter().flat_map(|p| p.to_bytes().unwrap()).collect();

    for _ in 0..50 {
        let mut framer = HciFramer::default();
        let mut received = Vec::new();
        let mut offset = 0;
        while offset < stream.len() {
            let end = (offset + rng.gen_range(1..=9)).min(stream.len());
            received.extend(framer.extend(&stream[offset..end]));
            offset = end;
        }
        assert_eq!(received, packets);
        assert_eq!(framer.state(), FramerState::AwaitingPacketType);
    }
}

#[test]
fn test_acl_fragment_and_reassemble() {
    let payload: Vec<u8> = (0..60).collect();
    let frame = crate::l2cap::BasicFrame::new(L2CAP_CID_ATT, payload.clone());
    let bytes = frame.to_bytes().unwrap();

    let fragments = fragment(0x0040, &bytes, HCI_DATA_MAX_DATA_LENGTH, false);
    assert_eq!(fragments.len(), 3);
    assert_eq!(fragments[0].boundary, PacketBoundary::FirstNonFlushable);
    assert!(fragments[1..]
        .iter()
        .all(|f| f.boundary == PacketBoundary::Continuing));
    assert!(fragments.iter().all(|f| f.data.len() <= HCI_DATA_MAX_DATA_LENGTH));

    let mut reassembler = AclReassembler::new();
    let mut done = None;
    for acl in fragments {
        assert!(done.is_none());
        done = reassembler.push(acl).unwrap();
    }
    let done = done.unwrap();
    assert_eq!(done.channel_id, L2CAP_CID_ATT);
    assert_eq!(done.payload, payload);
    assert_eq!(reassembler.pending(0x0040), 0);
}

#[test]
fn test_acl_reassembly_errors() {
    let mut reassembler = AclReassembler::new();

    // Continuation with nothing started
    assert!(reassembler
        .push(AclData::new(0x0040, PacketBoundary::Continuing, vec![1, 2]))
        .is_err());

    // Start split inside the L2CAP header
    assert!(reassembler
        .push(AclData::new(0x0040, PacketBoundary::FirstFlushable, vec![0x02, 0x00]))
        .unwrap()
        .is_none());
    assert_eq!(reassembler.pending(0x0040), 2);

    // New start discards the stale partial frame
    let start = AclData::new(
        0x0040,
        PacketBoundary::FirstFlushable,
        vec![0x01, 0x00, 0x04, 0x00, 0x1E],
    );
    let frame = reassembler.push(start).unwrap().unwrap();
    assert_eq!(frame.payload, vec![0x1E]);

    // Fragments overshooting the announced length
    reassembler
        .push(AclData::new(0x0041, PacketBoundary::FirstFlushable, vec![0x02, 0x00, 0x04, 0x00, 0x01]))
        .unwrap();
    assert!(reassembler
        .push(AclData::new(0x0041, PacketBoundary::Continuing, vec![0x02, 0x03]))
        .is_err());
    assert_eq!(reassembler.pending(0x0041), 0);

    reassembler
        .push(AclData::new(0x0042, PacketBoundary::FirstFlushable, vec![0x02, 0x00]))
        .unwrap();
    assert!(reassembler.discard(0x0042));
    assert!(!reassembler.discard(0x0042));
}
