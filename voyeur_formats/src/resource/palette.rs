use std::io::{Read, Seek};

use serde::Serialize;

use super::{InitContext, Link, le_i16, le_u16, le_u32};
use crate::error::Result;

/// Fade status bit: every colour in the range fades towards the first RGB
/// triple instead of one triple per index.
pub const FADE_SINGLE_COLOR: u8 = 0x01;
/// Fade status bit: hold the fade until it is resumed.
pub const FADE_SKIP: u8 = 0x02;

/// Palette delta table used for immediate palette loads and fades.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CMapResource {
    pub steps: u8,
    pub fade_status: u8,
    pub start: u16,
    pub end: u16,
    /// RGB triples for the declared range, before clamping.
    pub entries: Vec<u8>,
}

impl CMapResource {
    pub(crate) fn parse<R: Read + Seek>(
        ctx: &InitContext<'_, R>,
        data: &[u8],
        pal_index: u16,
    ) -> Result<Self> {
        ctx.require(data, 6, "colour map header")?;
        let start = le_u16(data, 2);
        let end = le_u16(data, 4);
        if end < start {
            return Err(ctx.invalid(format!("colour map range {start}..={end} is empty")));
        }

        let count = (end - start) as usize + 1;
        ctx.require(data, 6 + count * 3, "colour map entries")?;

        let mut cmap = CMapResource {
            steps: data[0],
            fade_status: data[1],
            start,
            end,
            entries: data[6..6 + count * 3].to_vec(),
        };
        cmap.clamp_to(pal_index);
        if cmap.end != end {
            log::warn!(
                "colour map {} clamped from {start}..={end} to {}..={}",
                ctx.id,
                cmap.start,
                cmap.end
            );
        }
        Ok(cmap)
    }

    /// Limits the range to the palette indices actually available.
    pub fn clamp_to(&mut self, pal_index: u16) {
        self.end = self.end.min(pal_index);
        self.start = self.start.min(pal_index);
    }

    /// RGB triple applied to palette index `start + offset`.
    pub fn color(&self, offset: usize) -> [u8; 3] {
        let index = if self.fade_status & FADE_SINGLE_COLOR != 0 {
            0
        } else {
            offset * 3
        };
        match self.entries.get(index..index + 3) {
            Some(rgb) => [rgb[0], rgb[1], rgb[2]],
            None => [0, 0, 0],
        }
    }
}

/// Palette cycling description: up to four independent cycles, each
/// pointing at its own data block in another member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleResource {
    /// 0 disables the slot, 1 rotates a palette range, anything else steps
    /// through a list of palette writes.
    pub types: [u16; 4],
    pub ptrs: [Link; 4],
}

impl CycleResource {
    pub(crate) fn parse<R: Read + Seek>(ctx: &mut InitContext<'_, R>, data: &[u8]) -> Result<Self> {
        ctx.require(data, 24, "cycle list")?;
        let mut types = [0u16; 4];
        let mut ptrs = [Link::Null; 4];
        for slot in 0..4 {
            types[slot] = le_u16(data, slot * 2);
            ptrs[slot] = ctx.resolve_it(le_u32(data, 8 + slot * 4), slot);
        }
        Ok(CycleResource { types, ptrs })
    }
}

/// One fade accumulator of a viewport list palette, in 8.8 fixed point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ViewPortPalEntry {
    pub r_entry: i32,
    pub g_entry: i32,
    pub b_entry: i32,
    pub r_change: i32,
    pub g_change: i32,
    pub b_change: i32,
    pub pal_index: u16,
}

impl ViewPortPalEntry {
    pub const RECORD_SIZE: usize = 16;

    pub fn parse(bytes: &[u8]) -> Self {
        ViewPortPalEntry {
            r_entry: le_u16(bytes, 0) as i32,
            g_entry: le_u16(bytes, 2) as i32,
            b_entry: le_u16(bytes, 4) as i32,
            r_change: le_i16(bytes, 6) as i32,
            g_change: le_i16(bytes, 8) as i32,
            b_change: le_i16(bytes, 10) as i32,
            pal_index: le_u16(bytes, 12),
        }
    }

    /// Parses up to 256 records.
    pub fn parse_table(bytes: &[u8]) -> Vec<Self> {
        bytes
            .chunks_exact(Self::RECORD_SIZE)
            .take(256)
            .map(Self::parse)
            .collect()
    }
}
