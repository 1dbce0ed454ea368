//! Integration tests for the frame codec
//!
//! Covers the wire-layout scenarios, the little-endian law and the
//! encode/decode round trip for every opcode in the table.

use proptest::prelude::*;
use protocol::{
    Address, AppKeyIndex, Command, DeviceUuid, Direction, Event, Inbound, MAX_FRAME_LEN, Opcode,
    ProtocolError, SceneNumber, SceneOp, StateValue, decode_inbound,
};

fn arb_uuid() -> impl Strategy<Value = DeviceUuid> {
    any::<[u8; 16]>().prop_map(DeviceUuid)
}

fn arb_command() -> impl Strategy<Value = Command> {
    let addr = any::<u16>().prop_map(Address);
    let app_idx = any::<u16>().prop_map(AppKeyIndex);
    let scene_op = prop_oneof![
        Just(SceneOp::Recall),
        Just(SceneOp::Store),
        Just(SceneOp::Delete),
        Just(SceneOp::Bind),
    ];

    prop_oneof![
        Just(Command::Setup),
        Just(Command::Reset),
        Just(Command::Reboot),
        app_idx.clone().prop_map(|app_idx| Command::AddKey { app_idx }),
        arb_uuid().prop_map(|uuid| Command::Provision { uuid }),
        (addr.clone(), app_idx.clone())
            .prop_map(|(addr, app_idx)| Command::ConfigureNode { addr, app_idx }),
        (any::<u8>(), addr.clone(), app_idx.clone()).prop_map(|(state, addr, app_idx)| {
            Command::SendMessage {
                state: StateValue(state),
                addr,
                app_idx,
            }
        }),
        addr.clone().prop_map(|addr| Command::ResetNode { addr }),
        (addr.clone(), addr.clone(), addr.clone(), app_idx.clone()).prop_map(
            |(group_addr, node_addr, elem_addr, app_idx)| Command::ConfigureElement {
                group_addr,
                node_addr,
                elem_addr,
                app_idx,
            }
        ),
        (scene_op, any::<u16>(), addr, app_idx).prop_map(|(op, scene, addr, app_idx)| {
            Command::Scene {
                op,
                scene: SceneNumber(scene),
                addr,
                app_idx,
            }
        }),
    ]
}

fn arb_event() -> impl Strategy<Value = Event> {
    let addr = any::<u16>().prop_map(Address);

    prop_oneof![
        Just(Event::SetupStatus),
        Just(Event::ConfigureNodeStatus),
        Just(Event::ConfigureElementStatus),
        any::<u16>().prop_map(|idx| Event::AddKeyStatus {
            app_idx: AppKeyIndex(idx)
        }),
        arb_uuid().prop_map(|uuid| Event::UnprovisionedBeacon { uuid }),
        addr.clone().prop_map(|addr| Event::NodeAdded { addr }),
        (addr.clone(), any::<u8>()).prop_map(|(addr, state)| Event::State {
            addr,
            state: StateValue(state),
        }),
        addr.prop_map(|addr| Event::NodeEvent { addr }),
    ]
}

mod scenarios {
    use super::*;

    #[test]
    fn test_send_message_scenario() {
        let frame = Command::SendMessage {
            state: StateValue(0x00),
            addr: Address(0x000A),
            app_idx: AppKeyIndex(0x0000),
        }
        .encode();
        assert_eq!(frame.as_ref(), &[0x09, 0x00, 0x0A, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_provision_scenario() {
        let uuid = DeviceUuid([
            0x19, 0x8a, 0x1d, 0x0d, 0x7e, 0xd1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
        ]);
        let frame = Command::Provision { uuid }.encode();
        assert_eq!(
            frame.as_ref(),
            &[
                0x05, 0x19, 0x8a, 0x1d, 0x0d, 0x7e, 0xd1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0
            ]
        );
        assert_eq!(frame.len(), 17);
    }

    #[test]
    fn test_event_with_address_ten() {
        let mut packet = [0u8; 64];
        packet[0] = 0x20;
        packet[1..3].copy_from_slice(&[0x0A, 0x00]);

        match decode_inbound(&packet).expect("decode") {
            Inbound::Event(Event::NodeEvent { addr }) => assert_eq!(addr, Address(10)),
            other => panic!("unexpected decode: {:?}", other),
        }
    }

    #[test]
    fn test_beacon_in_full_packet() {
        let mut packet = [0xEEu8; 64];
        packet[0] = 0x04;
        packet[1..17].copy_from_slice(&[7u8; 16]);

        assert_eq!(
            decode_inbound(&packet).unwrap(),
            Inbound::Event(Event::UnprovisionedBeacon {
                uuid: DeviceUuid([7u8; 16])
            })
        );
    }

    #[test]
    fn test_every_opcode_frame_fits_max() {
        for opcode in Opcode::ALL {
            assert!(opcode.frame_len() <= MAX_FRAME_LEN);
        }
    }

    #[test]
    fn test_truncated_known_frame_is_an_error() {
        assert!(matches!(
            decode_inbound(&[0x13, 0x01]),
            Err(ProtocolError::Truncated {
                opcode: Opcode::State,
                ..
            })
        ));
    }
}

mod serialization {
    use super::*;

    #[test]
    fn test_event_json_shape() {
        let json = serde_json::to_value(Event::NodeAdded { addr: Address(8) }).unwrap();
        assert_eq!(json["event"], "node_added");
        assert_eq!(json["addr"], 8);
    }

    #[test]
    fn test_uuid_serializes_as_hex() {
        let json = serde_json::to_value(Event::UnprovisionedBeacon {
            uuid: DeviceUuid([0xAB; 16]),
        })
        .unwrap();
        assert_eq!(json["uuid"], "ab".repeat(16));
    }
}

proptest! {
    #[test]
    fn prop_u16_fields_are_little_endian(v in any::<u16>()) {
        let frame = Command::AddKey { app_idx: AppKeyIndex(v) }.encode();
        prop_assert_eq!(frame.as_ref(), &[0x02, (v & 0xFF) as u8, (v >> 8) as u8]);

        let frame = Command::ResetNode { addr: Address(v) }.encode();
        prop_assert_eq!(&frame[1..], &[(v & 0xFF) as u8, (v >> 8) as u8]);
    }

    #[test]
    fn prop_command_round_trip(command in arb_command()) {
        let frame = command.encode();
        prop_assert_eq!(frame.len(), command.opcode().frame_len());
        prop_assert_eq!(command.opcode().direction(), Direction::Outbound);

        let decoded = Command::decode(&frame).expect("decode command");
        prop_assert_eq!(decoded, command);
        prop_assert_eq!(decoded.encode(), frame);
    }

    #[test]
    fn prop_event_round_trip(event in arb_event(), padding in proptest::collection::vec(any::<u8>(), 0..48)) {
        let mut packet = event.encode().to_vec();
        prop_assert_eq!(packet.len(), event.opcode().frame_len());
        packet.extend_from_slice(&padding);

        let decoded = decode_inbound(&packet).expect("decode event");
        prop_assert_eq!(decoded, Inbound::Event(event));
    }

    #[test]
    fn prop_unassigned_opcodes_decode_as_unknown(byte in any::<u8>(), tail in proptest::collection::vec(any::<u8>(), 0..20)) {
        prop_assume!(Opcode::from_byte(byte).is_none_or(|op| op.direction() == Direction::Outbound));
        let mut packet = vec![byte];
        packet.extend_from_slice(&tail);
        prop_assert_eq!(decode_inbound(&packet).unwrap(), Inbound::Unknown { opcode: byte });
    }
}
