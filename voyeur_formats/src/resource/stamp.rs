//! Resources of the script library: pointer lists, controls, states and
//! threads. Script execution itself lives with the game logic.

use std::io::{Read, Seek};

use super::{InitContext, Link, le_u16, le_u32};
use crate::error::Result;
use crate::id::MemberId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PtrResource {
    pub entries: Vec<Link>,
}

impl PtrResource {
    pub(crate) fn parse<R: Read + Seek>(ctx: &mut InitContext<'_, R>, data: &[u8]) -> Self {
        let count = data.len() / 4;
        let entries = (0..count)
            .map(|i| ctx.resolve_it(le_u32(data, i * 4), i))
            .collect();
        PtrResource { entries }
    }
}

const CONTROL_SIZE: usize = 0x36;
const SLOT_CONTROL_PTR: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlResource {
    pub member_ids: [u16; 8],
    pub entries: [Link; 8],
    pub state: Option<MemberId>,
    pub ptr: Link,
}

impl ControlResource {
    pub(crate) fn parse<R: Read + Seek>(ctx: &mut InitContext<'_, R>, data: &[u8]) -> Result<Self> {
        ctx.require(data, CONTROL_SIZE, "control block")?;

        let mut member_ids = [0u16; 8];
        let mut entries = [Link::Null; 8];
        for i in 0..8 {
            member_ids[i] = le_u16(data, i * 2);
            entries[i] = ctx.resolve_it(le_u32(data, 0x10 + i * 4), i);
        }

        let state = match le_u16(data, 0x30) {
            0xFFFF => None,
            raw => Some(MemberId(raw)),
        };
        let ptr = ctx.resolve_it(le_u32(data, 0x32), SLOT_CONTROL_PTR);

        Ok(ControlResource {
            member_ids,
            entries,
            state,
            ptr,
        })
    }

    pub(crate) fn link_mut(&mut self, slot: usize) -> Option<&mut Link> {
        if slot == SLOT_CONTROL_PTR {
            Some(&mut self.ptr)
        } else {
            self.entries.get_mut(slot)
        }
    }

    pub(crate) fn links(&self) -> Vec<Link> {
        let mut links = self.entries.to_vec();
        links.push(self.ptr);
        links
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateResource {
    pub vals: [u32; 4],
}

impl StateResource {
    pub(crate) fn parse<R: Read + Seek>(ctx: &InitContext<'_, R>, data: &[u8]) -> Result<Self> {
        ctx.require(data, 16, "state block")?;
        let mut vals = [0u32; 4];
        for (i, val) in vals.iter_mut().enumerate() {
            *val = le_u32(data, i * 4);
        }
        Ok(StateResource { vals })
    }

    pub fn victim_index(&self) -> u32 {
        self.vals[1]
    }

    pub fn victim_evidence_index(&self) -> u32 {
        self.vals[2]
    }

    pub fn victim_murder_index(&self) -> u32 {
        self.vals[3]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadResource {
    pub state_id: u16,
    pub stack_id: u16,
    /// Script bytecode following the header.
    pub script: Vec<u8>,
}

impl ThreadResource {
    pub(crate) fn parse<R: Read + Seek>(ctx: &InitContext<'_, R>, data: &[u8]) -> Result<Self> {
        ctx.require(data, 4, "thread header")?;
        Ok(ThreadResource {
            state_id: le_u16(data, 0),
            stack_id: le_u16(data, 2),
            script: data[4..].to_vec(),
        })
    }
}
