use std::io::{Read, Seek};

use super::rect::Rect;
use super::{InitContext, Link, le_i16, le_u16, le_u32};
use crate::error::Result;
use crate::id::{LongId, MemberId};

const VIEWPORT_SIZE: usize = 0x4A;

pub const SLOT_PARENT: usize = 0;
pub const SLOT_CURRENT_PIC: usize = 1;
pub const SLOT_ACTIVE_PAGE: usize = 2;
pub const SLOT_PAGES: usize = 3;
pub const SLOT_RECT_LISTS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewPortResource {
    pub flags: u16,
    pub page_count: u16,
    pub page_index: u16,
    pub last_page: u16,
    pub bounds: Rect,
    pub clip_rect: Rect,
    /// May point back at this viewport.
    pub parent: Link,
    pub current_pic: Link,
    pub active_page: Link,
    pub pages: [Link; 2],
    /// Per-page rect accumulation lists.
    pub rect_lists: [Link; 3],
    /// `-1` when the page has no list.
    pub rect_list_counts: [i16; 3],
}

impl ViewPortResource {
    pub(crate) fn parse<R: Read + Seek>(ctx: &mut InitContext<'_, R>, data: &[u8]) -> Result<Self> {
        ctx.require(data, VIEWPORT_SIZE, "viewport header")?;

        let x = le_u16(data, 0x0C) as i32;
        let y = le_u16(data, 0x0E) as i32;
        let bounds = Rect::from_origin(x, y, le_u16(data, 0x10) as i32, le_u16(data, 0x12) as i32);

        // The parent goes through the deferred list even when it is this very
        // entry, which is only resident once construction has finished.
        let parent = ctx.resolve_it(le_u32(data, 0x02), SLOT_PARENT);
        let current_pic =
            ctx.resolve_long(LongId::from_resource_field(le_u32(data, 0x20)), SLOT_CURRENT_PIC);
        let active_page =
            ctx.resolve_long(LongId::from_resource_field(le_u32(data, 0x24)), SLOT_ACTIVE_PAGE);
        let pages = [
            ctx.resolve_long(LongId::from_resource_field(le_u32(data, 0x28)), SLOT_PAGES),
            ctx.resolve_long(LongId::from_resource_field(le_u32(data, 0x2C)), SLOT_PAGES + 1),
        ];

        let mut rect_lists = [Link::Null; 3];
        let mut rect_list_counts = [-1i16; 3];
        for page in 0..3 {
            rect_list_counts[page] = le_i16(data, 0x3C + page * 2);
            rect_lists[page] = ctx.resolve_it(le_u32(data, 0x30 + page * 4), SLOT_RECT_LISTS + page);
        }

        Ok(ViewPortResource {
            flags: le_u16(data, 0),
            page_count: le_u16(data, 0x06),
            page_index: le_u16(data, 0x08),
            last_page: le_u16(data, 0x0A),
            bounds,
            clip_rect: Rect::read_edges(data, 0x42),
            parent,
            current_pic,
            active_page,
            pages,
            rect_lists,
            rect_list_counts,
        })
    }

    pub(crate) fn link_mut(&mut self, slot: usize) -> Option<&mut Link> {
        match slot {
            SLOT_PARENT => Some(&mut self.parent),
            SLOT_CURRENT_PIC => Some(&mut self.current_pic),
            SLOT_ACTIVE_PAGE => Some(&mut self.active_page),
            3..=4 => self.pages.get_mut(slot - SLOT_PAGES),
            5..=7 => self.rect_lists.get_mut(slot - SLOT_RECT_LISTS),
            _ => None,
        }
    }

    pub(crate) fn links(&self) -> [Link; 8] {
        [
            self.parent,
            self.current_pic,
            self.active_page,
            self.pages[0],
            self.pages[1],
            self.rect_lists[0],
            self.rect_lists[1],
            self.rect_lists[2],
        ]
    }

    /// Decodes the rect list for `page` from the bytes its link points at.
    pub fn decode_rect_list(&self, page: usize, bytes: &[u8]) -> Vec<Rect> {
        let Some(&count) = self.rect_list_counts.get(page) else {
            return Vec::new();
        };
        let count = (count.max(0) as usize).min(bytes.len() / 8);
        (0..count).map(|i| Rect::read_edges(bytes, i * 8)).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewPortListResource {
    /// Highest palette index available to colour maps.
    pub pal_index: u16,
    /// Member holding the 16-byte palette records.
    pub palette: Option<MemberId>,
    pub view_ports: Vec<Link>,
}

impl ViewPortListResource {
    pub(crate) fn parse<R: Read + Seek>(ctx: &mut InitContext<'_, R>, data: &[u8]) -> Result<Self> {
        ctx.require(data, 8, "viewport list header")?;
        let count = le_u16(data, 0) as usize;
        ctx.require(data, 8 + count * 4, "viewport list")?;

        let view_ports = (0..count)
            .map(|i| ctx.resolve_it(le_u32(data, 8 + i * 4), i))
            .collect();

        Ok(ViewPortListResource {
            pal_index: le_u16(data, 2),
            palette: MemberId::from_field(le_u32(data, 4)),
            view_ports,
        })
    }
}
