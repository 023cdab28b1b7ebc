//! Combat-event payload layout.
//!
//! A combat frame carries a composite value: a presence bitmask followed by
//! the optional sub-structures it announces (fixed order: Ev, source Ag,
//! destination Ag, skill name), then a mandatory id/revision pair. Everything
//! decodes into owned values with no lifetime coupling to the pooled payload
//! buffer, so listeners may hold events long after the buffer is recycled.

use serde::{Deserialize, Serialize};

use super::{Reader, Writer};
use crate::error::Result;

/// Presence bit: the fixed-layout Ev record follows the bitmask.
const HAS_EV: u8 = 0x01;
/// Presence bit: source agent record.
const HAS_SRC_AGENT: u8 = 0x02;
/// Presence bit: destination agent record.
const HAS_DST_AGENT: u8 = 0x04;
/// Presence bit: length-prefixed skill name string.
const HAS_SKILL_NAME: u8 = 0x08;

/// Size of the fixed-layout Ev record in bytes.
pub const EV_RECORD_SIZE: usize = 64;

/// Trailing padding inside an Ev record.
const EV_PADDING: usize = 4;

/// A combat participant snapshot (Ag).
///
/// Immutable value at event time; no identity beyond its fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    /// Participant display name.
    pub name: String,
    /// Source-assigned agent id.
    pub id: u64,
    /// Profession id.
    pub profession: u32,
    /// Elite specialization id.
    pub elite: u32,
    /// Whether this agent is the local player (boolean-as-int on the wire).
    pub is_self: bool,
    /// Team id.
    pub team: u16,
}

impl Agent {
    fn decode(reader: &mut Reader<'_>) -> Result<Self> {
        Ok(Self {
            name: reader.read_string("ag.name")?,
            id: reader.read_u64("ag.id")?,
            profession: reader.read_u32("ag.profession")?,
            elite: reader.read_u32("ag.elite")?,
            is_self: reader.read_u32("ag.self")? != 0,
            team: reader.read_u16("ag.team")?,
        })
    }

    fn encode(&self, writer: &mut Writer) {
        writer.write_string(&self.name);
        writer.write_u64(self.id);
        writer.write_u32(self.profession);
        writer.write_u32(self.elite);
        writer.write_u32(u32::from(self.is_self));
        writer.write_u16(self.team);
    }
}

/// The fixed-layout combat event record (Ev).
///
/// Exactly [`EV_RECORD_SIZE`] bytes on the wire; a shorter buffer is a
/// corrupt frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatEvent {
    /// Monotonic source timestamp.
    pub time: u64,
    /// Source agent id, cross-referenced against the composite's src Ag.
    pub src_agent: u64,
    /// Destination agent id.
    pub dst_agent: u64,
    /// Damage or context-dependent magnitude.
    pub value: i32,
    /// Buff damage component.
    pub buff_damage: i32,
    /// Overstack amount for buff applications.
    pub overstack_value: u32,
    /// Skill id.
    pub skill_id: u32,
    pub src_inst_id: u16,
    pub dst_inst_id: u16,
    pub src_master_inst_id: u16,
    pub dst_master_inst_id: u16,
    /// Friend/foe indicator.
    pub iff: u8,
    /// Whether this is a buff event; changes the meaning of `result`.
    pub is_buff: bool,
    /// Result code; semantics depend on `is_buff`.
    pub result: u8,
    pub is_activation: u8,
    pub is_buff_remove: u8,
    pub is_ninety: u8,
    pub is_fifty: u8,
    pub is_moving: u8,
    pub is_state_change: u8,
    pub is_flanking: u8,
    pub is_shields: u8,
    pub is_off_cycle: u8,
}

impl CombatEvent {
    fn decode(reader: &mut Reader<'_>) -> Result<Self> {
        let event = Self {
            time: reader.read_u64("ev.time")?,
            src_agent: reader.read_u64("ev.src_agent")?,
            dst_agent: reader.read_u64("ev.dst_agent")?,
            value: reader.read_i32("ev.value")?,
            buff_damage: reader.read_i32("ev.buff_damage")?,
            overstack_value: reader.read_u32("ev.overstack_value")?,
            skill_id: reader.read_u32("ev.skill_id")?,
            src_inst_id: reader.read_u16("ev.src_inst_id")?,
            dst_inst_id: reader.read_u16("ev.dst_inst_id")?,
            src_master_inst_id: reader.read_u16("ev.src_master_inst_id")?,
            dst_master_inst_id: reader.read_u16("ev.dst_master_inst_id")?,
            iff: reader.read_u8("ev.iff")?,
            is_buff: reader.read_bool("ev.is_buff")?,
            result: reader.read_u8("ev.result")?,
            is_activation: reader.read_u8("ev.is_activation")?,
            is_buff_remove: reader.read_u8("ev.is_buff_remove")?,
            is_ninety: reader.read_u8("ev.is_ninety")?,
            is_fifty: reader.read_u8("ev.is_fifty")?,
            is_moving: reader.read_u8("ev.is_moving")?,
            is_state_change: reader.read_u8("ev.is_state_change")?,
            is_flanking: reader.read_u8("ev.is_flanking")?,
            is_shields: reader.read_u8("ev.is_shields")?,
            is_off_cycle: reader.read_u8("ev.is_off_cycle")?,
        };
        reader.skip(EV_PADDING, "ev.pad")?;
        Ok(event)
    }

    fn encode(&self, writer: &mut Writer) {
        writer.write_u64(self.time);
        writer.write_u64(self.src_agent);
        writer.write_u64(self.dst_agent);
        writer.write_i32(self.value);
        writer.write_i32(self.buff_damage);
        writer.write_u32(self.overstack_value);
        writer.write_u32(self.skill_id);
        writer.write_u16(self.src_inst_id);
        writer.write_u16(self.dst_inst_id);
        writer.write_u16(self.src_master_inst_id);
        writer.write_u16(self.dst_master_inst_id);
        writer.write_u8(self.iff);
        writer.write_bool(self.is_buff);
        writer.write_u8(self.result);
        writer.write_u8(self.is_activation);
        writer.write_u8(self.is_buff_remove);
        writer.write_u8(self.is_ninety);
        writer.write_u8(self.is_fifty);
        writer.write_u8(self.is_moving);
        writer.write_u8(self.is_state_change);
        writer.write_u8(self.is_flanking);
        writer.write_u8(self.is_shields);
        writer.write_u8(self.is_off_cycle);
        writer.write_zeros(EV_PADDING);
    }
}

/// The fully decoded composite combat event.
///
/// Owned and self-contained: safe to pass across tasks and hold after the
/// payload buffer has returned to the pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatPayload {
    /// The fixed-layout event record, when present.
    pub ev: Option<CombatEvent>,
    /// Source participant snapshot, when present.
    pub src: Option<Agent>,
    /// Destination participant snapshot, when present.
    pub dst: Option<Agent>,
    /// Human-readable skill name, when present.
    pub skill_name: Option<String>,
    /// Sequential event id assigned by the source.
    pub id: u64,
    /// Protocol revision the source encoded with.
    pub revision: u64,
}

impl CombatPayload {
    /// Decode a composite combat event from a frame payload.
    ///
    /// Pure function of the bytes; a buffer shorter than the presence
    /// bitmask declares is a per-frame decode failure, never a panic.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(payload, "CombatPayload");
        let mask = reader.read_u8("bitmask")?;

        let ev = if mask & HAS_EV != 0 { Some(CombatEvent::decode(&mut reader)?) } else { None };
        let src =
            if mask & HAS_SRC_AGENT != 0 { Some(Agent::decode(&mut reader)?) } else { None };
        let dst =
            if mask & HAS_DST_AGENT != 0 { Some(Agent::decode(&mut reader)?) } else { None };
        let skill_name = if mask & HAS_SKILL_NAME != 0 {
            Some(reader.read_string("skill_name")?)
        } else {
            None
        };

        let id = reader.read_u64("id")?;
        let revision = reader.read_u64("revision")?;

        Ok(Self { ev, src, dst, skill_name, id, revision })
    }

    /// Encode this composite event to wire bytes.
    ///
    /// The presence bitmask is derived from which optional fields are set,
    /// so `decode(encode(x)) == x` and the bytes round-trip exactly.
    pub fn encode(&self) -> Vec<u8> {
        let mut writer = Writer::new();

        let mut mask = 0u8;
        if self.ev.is_some() {
            mask |= HAS_EV;
        }
        if self.src.is_some() {
            mask |= HAS_SRC_AGENT;
        }
        if self.dst.is_some() {
            mask |= HAS_DST_AGENT;
        }
        if self.skill_name.is_some() {
            mask |= HAS_SKILL_NAME;
        }
        writer.write_u8(mask);

        if let Some(ev) = &self.ev {
            ev.encode(&mut writer);
        }
        if let Some(src) = &self.src {
            src.encode(&mut writer);
        }
        if let Some(dst) = &self.dst {
            dst.encode(&mut writer);
        }
        if let Some(name) = &self.skill_name {
            writer.write_string(name);
        }

        writer.write_u64(self.id);
        writer.write_u64(self.revision);
        writer.into_bytes()
    }
}
