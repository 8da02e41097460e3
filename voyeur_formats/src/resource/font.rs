use std::io::{Read, Seek};

use serde::Serialize;

use super::{InitContext, Link, le_u16, le_u32};
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontResource {
    pub min_char: u8,
    pub max_char: u8,
    pub font_depth: u8,
    pub padding: u8,
    pub font_height: u8,
    pub top_padding: i8,
    pub char_widths: Vec<u16>,
    pub char_offsets: Vec<u16>,
    /// Glyph bitmaps; `char_offsets` index into this.
    pub char_images: Vec<u8>,
}

impl FontResource {
    pub(crate) fn parse<R: Read + Seek>(ctx: &InitContext<'_, R>, data: &[u8]) -> Result<Self> {
        ctx.require(data, 8, "font header")?;
        let min_char = data[0];
        let max_char = data[1];
        if max_char < min_char {
            return Err(ctx.invalid(format!(
                "font character range {min_char}..={max_char} is empty"
            )));
        }

        let total = (max_char - min_char) as usize + 1;
        let widths_at = 8;
        let offsets_at = widths_at + total * 2;
        let images_at = offsets_at + total * 2;
        ctx.require(data, images_at, "font tables")?;

        Ok(FontResource {
            min_char,
            max_char,
            font_depth: data[2],
            padding: data[3],
            font_height: data[5],
            top_padding: data[6] as i8,
            char_widths: (0..total).map(|i| le_u16(data, widths_at + i * 2)).collect(),
            char_offsets: (0..total).map(|i| le_u16(data, offsets_at + i * 2)).collect(),
            char_images: data[images_at..].to_vec(),
        })
    }

    pub fn char_width(&self, ch: u8) -> Option<u16> {
        self.index_of(ch).map(|idx| self.char_widths[idx])
    }

    /// Glyph bitmap for `ch`, running to the next glyph or the end of data.
    pub fn glyph(&self, ch: u8) -> Option<&[u8]> {
        let idx = self.index_of(ch)?;
        let start = self.char_offsets[idx] as usize;
        let end = self
            .char_offsets
            .get(idx + 1)
            .map(|&next| next as usize)
            .filter(|&next| next >= start)
            .unwrap_or(self.char_images.len());
        self.char_images.get(start..end.min(self.char_images.len()))
    }

    fn index_of(&self, ch: u8) -> Option<usize> {
        (self.min_char..=self.max_char)
            .contains(&ch)
            .then(|| (ch - self.min_char) as usize)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FontJustify {
    Left,
    Center,
    Right,
}

impl From<u8> for FontJustify {
    fn from(value: u8) -> Self {
        match value {
            1 => FontJustify::Center,
            2 => FontJustify::Right,
            _ => FontJustify::Left,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontInfoResource {
    pub font: Link,
    pub pic_flags: u8,
    pub pic_select: u8,
    pub pic_pick: u8,
    pub pic_on_off: u8,
    pub font_flags: u8,
    pub justify: FontJustify,
    pub font_save_back: u16,
    pub pos: (i16, i16),
    pub justify_width: u16,
    pub justify_height: u16,
    pub shadow: (i16, i16),
    pub fore_color: u16,
    pub back_color: u16,
    pub shadow_color: u16,
}

impl FontInfoResource {
    pub(crate) fn parse<R: Read + Seek>(ctx: &mut InitContext<'_, R>, data: &[u8]) -> Result<Self> {
        ctx.require(data, 30, "font info")?;
        let font = ctx.resolve_it(le_u32(data, 0), 0);

        Ok(FontInfoResource {
            font,
            pic_flags: data[4],
            pic_select: data[5],
            pic_pick: data[6],
            pic_on_off: data[7],
            font_flags: data[8],
            justify: FontJustify::from(data[9]),
            font_save_back: le_u16(data, 10),
            pos: (le_u16(data, 12) as i16, le_u16(data, 14) as i16),
            justify_width: le_u16(data, 16),
            justify_height: le_u16(data, 18),
            shadow: (le_u16(data, 20) as i16, le_u16(data, 22) as i16),
            fore_color: le_u16(data, 24),
            back_color: le_u16(data, 26),
            shadow_color: le_u16(data, 28),
        })
    }
}
