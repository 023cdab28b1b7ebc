//! Shared builders for tests and benchmarks.
//!
//! Produces wire-exact frames and payloads so unit, integration, and bench
//! code all exercise the same byte layouts.

use crate::codec::{Agent, CombatEvent, CombatPayload};
use crate::wire::{FrameHeader, MessageType};

/// A representative Ev record with recognizable field values.
pub fn sample_event(id_seed: u64) -> CombatEvent {
    CombatEvent {
        time: 1_000_000 + id_seed,
        src_agent: 2000,
        dst_agent: 3000,
        value: 812,
        buff_damage: 0,
        overstack_value: 0,
        skill_id: 9100,
        src_inst_id: 1,
        dst_inst_id: 2,
        src_master_inst_id: 0,
        dst_master_inst_id: 0,
        iff: 1,
        is_buff: false,
        result: 0,
        is_activation: 0,
        is_buff_remove: 0,
        is_ninety: 1,
        is_fifty: 0,
        is_moving: 0,
        is_state_change: 0,
        is_flanking: 0,
        is_shields: 0,
        is_off_cycle: 0,
    }
}

/// A full composite payload (Ev + both agents + skill name) with the given id.
pub fn sample_payload(id: u64) -> CombatPayload {
    CombatPayload {
        ev: Some(sample_event(id)),
        src: Some(Agent {
            name: "Source".to_string(),
            id: 2000,
            profession: 4,
            elite: 0,
            is_self: true,
            team: 1,
        }),
        dst: Some(Agent {
            name: "Target".to_string(),
            id: 3000,
            profession: 0,
            elite: 0,
            is_self: false,
            team: 2,
        }),
        skill_name: Some("Test Skill".to_string()),
        id,
        revision: 1,
    }
}

/// Encoded bytes of a full composite payload with the given id.
pub fn combat_payload_bytes(id: u64) -> Vec<u8> {
    sample_payload(id).encode()
}

/// Encoded payload carrying only a skill name (bitmask 0x08).
pub fn skill_only_payload(skill: &str) -> Vec<u8> {
    CombatPayload {
        ev: None,
        src: None,
        dst: None,
        skill_name: Some(skill.to_string()),
        id: 0,
        revision: 0,
    }
    .encode()
}

/// A complete wire frame: header plus payload.
pub fn frame_bytes(message_type: u8, payload: &[u8]) -> Vec<u8> {
    let mut bytes = FrameHeader::new(payload.len() as u32, message_type).encode().to_vec();
    bytes.extend_from_slice(payload);
    bytes
}

/// A complete combat-event frame with the given id.
pub fn combat_frame(id: u64) -> Vec<u8> {
    frame_bytes(MessageType::CombatEvent.as_byte(), &combat_payload_bytes(id))
}

/// A complete heartbeat frame.
pub fn heartbeat_frame(active: bool) -> Vec<u8> {
    frame_bytes(MessageType::Heartbeat.as_byte(), &[0x00, u8::from(active)])
}
